//! Error type for `recall-client`.

use recall_core::ValidationError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("card not found: {0}")]
  CardNotFound(Uuid),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("server returned {status}: {message}")]
  Status { status: u16, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for recall_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::CardNotFound(id) => Self::CardNotFound(id),
      Error::BadRequest(m) => Self::Validation(ValidationError::Rejected(m)),
      other => Self::transport(other),
    }
  }
}
