//! Error type for `baseline-store-sqlite`.

use baseline_core::ValidationError;
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

  /// The `(account, display_name)` uniqueness constraint rejected a write.
  #[error("A baseline with this name already exists: {0}")]
  DuplicateDisplayName(String),

  #[error("baseline not found: {0}")]
  BaselineNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for baseline_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::DuplicateDisplayName(name) => {
        ValidationError::DuplicateDisplayName(name).into()
      }
      Error::BaselineNotFound(id) => Self::BaselinesNotFound(vec![id]),
      other => Self::store(other),
    }
  }
}

/// True if `err` is a SQLite UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &tokio_rusqlite::Error) -> bool {
  matches!(
    err,
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}
