//! Error type for `omate-catalog`.

use omate_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("content {0} not found")]
  NotFound(i64),

  /// Any backend's repository error, with its classification captured.
  #[error("repository error: {source}")]
  Repository {
    kind:   ErrorKind,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error("object store error: {0}")]
  Storage(#[from] omate_blob::Error),

  #[error("core error: {0}")]
  Core(#[from] omate_core::Error),
}

impl Error {
  pub fn repository<E>(e: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    Self::Repository { kind: e.kind(), source: Box::new(e) }
  }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::NotFound(_) => ErrorKind::NotFound,
      Self::Repository { kind, .. } => *kind,
      Self::Storage(e) => e.kind(),
      Self::Core(e) => e.kind(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
