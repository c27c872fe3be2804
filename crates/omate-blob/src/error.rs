//! Error type for `omate-blob`.

use omate_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("s3 error: {0}")]
  S3(#[from] object_store::Error),

  #[error("object store answered {status} for {key:?}")]
  Status { status: u16, key: String },

  /// The key is empty, absolute, or escapes the storage root.
  #[error("invalid object key: {0:?}")]
  InvalidKey(String),

  /// The URL does not belong to this backend.
  #[error("url is not served by this backend: {0:?}")]
  UnknownUrl(String),

  #[error("image error: {0}")]
  Image(#[from] image::ImageError),

  #[error("thumbnail worker failed: {0}")]
  Join(#[from] tokio::task::JoinError),

  #[error("storage misconfigured: {0}")]
  Config(String),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Io(_) | Self::Http(_) | Self::S3(_) | Self::Status { .. } => {
        ErrorKind::StorageUnavailable
      }
      Self::InvalidKey(_) | Self::UnknownUrl(_) => ErrorKind::ConstraintViolation,
      Self::Image(_) | Self::Join(_) | Self::Config(_) => ErrorKind::Internal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
