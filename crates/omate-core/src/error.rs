//! Error types for `omate-core`, and the error taxonomy shared by every
//! backend.

use thiserror::Error;

// ─── Taxonomy ────────────────────────────────────────────────────────────────

/// Coarse classification of a failure, independent of which backend raised
/// it. The thin HTTP layer maps these to status codes; callers branch on them
/// instead of matching backend-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  /// The repository was used before `connect()` + `ensure_schema()`.
  NotInitialized,
  NotFound,
  /// Unique key, enum/check constraint or input validation failure.
  ConstraintViolation,
  /// The object store could not be reached or refused the request.
  StorageUnavailable,
  /// A best-effort enrichment was skipped; the result is partial.
  Degraded,
  Internal,
}

impl ErrorKind {
  /// Stable identifier carried in response bodies.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::NotInitialized => "not_initialized",
      Self::NotFound => "not_found",
      Self::ConstraintViolation => "constraint_violation",
      Self::StorageUnavailable => "storage_unavailable",
      Self::Degraded => "degraded",
      Self::Internal => "internal",
    }
  }

  /// HTTP status the surrounding handlers report for this kind.
  pub fn http_status(self) -> u16 {
    match self {
      Self::NotFound => 404,
      Self::ConstraintViolation => 400,
      _ => 500,
    }
  }
}

impl std::fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Implemented by every error type in the workspace.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

// ─── Core error ──────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown content type: {0:?}")]
  UnknownContentType(String),

  #[error("invalid metadata: {0}")]
  InvalidMetadata(String),

  #[error("invalid content: {0}")]
  InvalidContent(String),

  #[error("unsupported database url: {0:?}")]
  UnsupportedDatabaseUrl(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::UnknownContentType(_)
      | Self::InvalidMetadata(_)
      | Self::InvalidContent(_) => ErrorKind::ConstraintViolation,
      Self::UnsupportedDatabaseUrl(_) | Self::Serialization(_) => {
        ErrorKind::Internal
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kinds_map_to_http_statuses() {
    assert_eq!(ErrorKind::NotFound.http_status(), 404);
    assert_eq!(ErrorKind::ConstraintViolation.http_status(), 400);
    assert_eq!(ErrorKind::NotInitialized.http_status(), 500);
    assert_eq!(ErrorKind::StorageUnavailable.http_status(), 500);
  }

  #[test]
  fn validation_errors_are_constraint_violations() {
    let err = Error::InvalidMetadata("intro must be a string".into());
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert_eq!(err.kind().to_string(), "constraint_violation");
  }
}
