//! Storage traits the core consumes, and their query types.
//!
//! The traits are implemented by storage backends (`recall-store-sqlite`) and
//! by the HTTP client (`recall-client`). The owning stores in this crate
//! depend on these abstractions, never on a concrete backend.
//!
//! Every implementor's error type converts into [`crate::Error`] so the stores
//! can tell "not found" and "invalid" apart from transport failures.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  card::{Card, CardContent},
  rules::ReviewRule,
};

// ─── Query types ─────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// One page of a paginated listing. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
  pub page:     u32,
  pub per_page: u32,
}

impl Default for PageRequest {
  fn default() -> Self { Self { page: 1, per_page: DEFAULT_PAGE_SIZE } }
}

impl PageRequest {
  pub fn new(page: u32, per_page: u32) -> Self {
    Self { page: page.max(1), per_page: per_page.max(1) }
  }

  pub fn next(self) -> Self { Self { page: self.page + 1, ..self } }

  /// Row offset of the first item on this page.
  pub fn offset(&self) -> u64 {
    u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
  }
}

/// Parameters for [`CardRepository::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardQuery {
  pub page:   PageRequest,
  /// Free-text filter over question and answer.
  pub search: Option<String>,
}

/// A page of results together with the total number of matching items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub total:    u64,
  pub page:     u32,
  pub per_page: u32,
  pub items:    Vec<T>,
}

impl<T> Page<T> {
  /// Cut one page out of an already-filtered, ordered collection.
  pub fn slice(items: Vec<T>, page: PageRequest) -> Self {
    let total = items.len() as u64;
    let items = items
      .into_iter()
      .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
      .take(page.per_page as usize)
      .collect();
    Self { total, page: page.page, per_page: page.per_page, items }
  }

  /// Whether pages after this one can still hold items.
  pub fn has_more(&self) -> bool {
    u64::from(self.page) * u64::from(self.per_page) < self.total
      && !self.items.is_empty()
  }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Durable storage of cards.
///
/// `apply_outcome` and `set_next_review` are the backend's own scheduling
/// operations. A backend that schedules must use
/// [`crate::schedule::apply_outcome`] so the result matches the local
/// prediction bit for bit.
pub trait CardRepository: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  /// List cards, newest last, optionally filtered by free text.
  fn list<'a>(
    &'a self,
    query: &'a CardQuery,
  ) -> impl Future<Output = Result<Page<Card>, Self::Error>> + Send + 'a;

  /// Persist a new card. The backend assigns the durable id.
  fn create(
    &self,
    content: CardContent,
  ) -> impl Future<Output = Result<Card, Self::Error>> + Send + '_;

  /// Replace a card's text. Fails with a not-found error for unknown ids.
  fn update(
    &self,
    id: Uuid,
    content: CardContent,
  ) -> impl Future<Output = Result<Card, Self::Error>> + Send + '_;

  fn delete(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Retrieve a card by id. Returns `None` if not found.
  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Card>, Self::Error>> + Send + '_;

  /// The backend's own view of which cards are due now.
  fn fetch_due(
    &self,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<Card>, Self::Error>> + Send + '_;

  /// Set the next-review time directly, bypassing the rule table.
  fn set_next_review(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Card, Self::Error>> + Send + '_;

  /// Apply a review outcome using the backend's rule table and clock.
  fn apply_outcome(
    &self,
    id: Uuid,
    remembered: bool,
  ) -> impl Future<Output = Result<Card, Self::Error>> + Send + '_;
}

/// Durable storage of the review rule table.
pub trait RuleTableBackend: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  fn get_rules(
    &self,
  ) -> impl Future<Output = Result<Vec<ReviewRule>, Self::Error>> + Send + '_;

  /// Replace the whole table in one unit.
  fn replace_rules(
    &self,
    rules: Vec<ReviewRule>,
  ) -> impl Future<Output = Result<Vec<ReviewRule>, Self::Error>> + Send + '_;

  fn reset_rules(
    &self,
  ) -> impl Future<Output = Result<Vec<ReviewRule>, Self::Error>> + Send + '_;
}

/// Durable key-value persistence for progress, settings and local mirrors.
pub trait KeyValueStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  fn get_item<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<serde_json::Value>, Self::Error>> + Send + 'a;

  fn set_item<'a>(
    &'a self,
    key: &'a str,
    value: serde_json::Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
