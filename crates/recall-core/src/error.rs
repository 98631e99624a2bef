//! Error types for `recall-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::card::Card;

/// Input rejected before any state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("rule table must contain at least one rule")]
  EmptyRuleTable,

  #[error("duplicate rule for review count {0}")]
  DuplicateTier(u32),

  #[error("interval for review count {review_count} must be at least 1 day, got {interval_days}")]
  NonPositiveInterval { review_count: u32, interval_days: i64 },

  #[error("interval for review count {review_count} must be at most {max} days, got {interval_days}")]
  IntervalTooLong { review_count: u32, interval_days: i64, max: u32 },

  #[error("cannot reschedule card {0} to before its creation")]
  RescheduleBeforeCreation(Uuid),

  #[error("card {0} has no next-review time to persist")]
  MissingNextReview(Uuid),

  #[error("card question must not be empty")]
  EmptyQuestion,

  /// A remote backend refused the input with its own message.
  #[error("rejected by backend: {0}")]
  Rejected(String),
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("card not found: {0}")]
  CardNotFound(Uuid),

  /// The backend's result disagrees with the local prediction. Both versions
  /// are carried so the caller can decide; nothing is merged.
  #[error("conflicting versions of card {}", .local.card_id)]
  Conflict { local: Box<Card>, remote: Box<Card> },

  #[error("transport error: {0}")]
  Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Wrap any backend failure as a transport error.
  pub fn transport(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Transport(Box::new(e))
  }

  pub fn is_not_found(&self) -> bool { matches!(self, Self::CardNotFound(_)) }
}

impl From<std::convert::Infallible> for Error {
  fn from(e: std::convert::Infallible) -> Self { match e {} }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
