//! Error type for `omate-store-postgres`.

use omate_core::{Classify, ErrorKind};
use thiserror::Error;

/// SQLSTATE codes reported as [`ErrorKind::ConstraintViolation`]:
/// integrity violations (class 23), invalid enum text, out-of-range numbers
/// and over-long strings.
const CONSTRAINT_CODES: [&str; 7] =
  ["23505", "23514", "23503", "23502", "22P02", "22003", "22001"];

#[derive(Debug, Error)]
pub enum Error {
  #[error("repository not initialised: call connect() and ensure_schema() first")]
  NotInitialized,

  #[error("core error: {0}")]
  Core(#[from] omate_core::Error),

  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// The existing `content_type` enum lacks values this code writes.
  #[error("schema is missing content types {0:?}; migrate the database before starting")]
  MissingContentTypes(Vec<String>),

  #[error("schema version {found} is newer than supported version {supported}")]
  UnsupportedSchemaVersion { found: u32, supported: u32 },

  #[error("site settings row is missing; run ensure_schema()")]
  MissingSettings,

  #[error("{column} is NULL")]
  MissingTimestamp { column: &'static str },
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::NotInitialized | Self::MissingSettings => ErrorKind::NotInitialized,
      Self::Core(e) => e.kind(),
      Self::Database(e) if is_constraint_violation(e) => ErrorKind::ConstraintViolation,
      Self::MissingContentTypes(_) | Self::UnsupportedSchemaVersion { .. } => {
        ErrorKind::ConstraintViolation
      }
      Self::Database(_) | Self::MissingTimestamp { .. } => ErrorKind::Internal,
    }
  }
}

fn is_constraint_violation(e: &sqlx::Error) -> bool {
  match e {
    sqlx::Error::Database(db) => db
      .code()
      .is_some_and(|code| CONSTRAINT_CODES.contains(&code.as_ref())),
    _ => false,
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
