//! Error type for `omate-store-sqlite`.

use omate_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("repository not initialised: call connect() and ensure_schema() first")]
  NotInitialized,

  #[error("core error: {0}")]
  Core(#[from] omate_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The existing `content_type` constraint lacks values this code writes.
  #[error("schema is missing content types {0:?}; migrate the database before starting")]
  MissingContentTypes(Vec<String>),

  #[error("schema version {found} is newer than supported version {supported}")]
  UnsupportedSchemaVersion { found: u32, supported: u32 },

  #[error("site settings row is missing; run ensure_schema()")]
  MissingSettings,
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::NotInitialized | Self::MissingSettings => ErrorKind::NotInitialized,
      Self::Core(e) => e.kind(),
      Self::Database(e) if is_constraint_violation(e) => {
        ErrorKind::ConstraintViolation
      }
      Self::MissingContentTypes(_) | Self::UnsupportedSchemaVersion { .. } => {
        ErrorKind::ConstraintViolation
      }
      Self::Database(_) | Self::Io(_) | Self::Json(_) | Self::DateParse(_) => {
        ErrorKind::Internal
      }
    }
  }
}

fn is_constraint_violation(e: &tokio_rusqlite::Error) -> bool {
  matches!(
    e,
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(f, _))
      if f.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
