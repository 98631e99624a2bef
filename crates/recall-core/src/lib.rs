//! Core types, scheduling rules and owning stores for Recall.
//!
//! This crate is deliberately free of HTTP and database dependencies. Storage
//! backends implement the traits in [`repository`]; everything else here is
//! either pure (rule table, due set, outcome processing, statistics) or an
//! owning store that routes mutation through those traits.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod calendar;
pub mod card;
pub mod cards;
pub mod due;
pub mod error;
pub mod local;
pub mod memory;
pub mod notice;
pub mod progress;
pub mod repository;
pub mod rules;
pub mod schedule;
pub mod session;
pub mod settings;
pub mod sync;

pub use error::{Error, Result, ValidationError};
