//! Error type for `recall-store-sqlite`.

use recall_core::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("card not found: {0}")]
  CardNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for recall_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::CardNotFound(id) => Self::CardNotFound(id),
      Error::Validation(v) => Self::Validation(v),
      other => Self::transport(other),
    }
  }
}
