//! Object storage for OMateShare content payloads.
//!
//! [`ObjectStore`] decides key names, extensions and thumbnails; an
//! [`ObjectBackend`] only moves bytes. Three backends ship here:
//!
//! - [`LocalBackend`] writes under a directory served by the web tier.
//! - [`S3Backend`] signs requests to an S3-compatible bucket such as R2.
//! - [`HttpBackend`] talks to a plain HTTP bucket endpoint.
//!
//! [`AnyBackend`] picks one of them from [`StorageSettings`] at runtime.

pub mod backend;
pub mod error;
pub mod http;
pub mod local;
pub mod s3;
pub mod settings;
pub mod store;
pub mod thumbnail;

pub use backend::{AnyBackend, ObjectBackend};
pub use error::{Error, Result};
pub use http::HttpBackend;
pub use local::LocalBackend;
pub use s3::S3Backend;
pub use settings::{S3Settings, StorageKind, StorageSettings};
pub use store::{ObjectStore, UploadRequest, Uploaded};
