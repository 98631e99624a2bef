//! HTTP client for the Recall JSON API.
//!
//! [`HttpRepository`] implements the core storage traits against a remote
//! `recall-api` server, so the owning stores in `recall-core` can run
//! unchanged on top of it.

mod client;
mod config;

pub mod error;

pub use client::HttpRepository;
pub use config::{ClientConfig, DEFAULT_TIMEOUT, RetryPolicy};
pub use error::{Error, Result};
