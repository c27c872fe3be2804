//! PostgreSQL backend for the OMateShare content store.
//!
//! Uses a small [`sqlx::PgPool`]. Content types are a native enum,
//! metadata is `JSONB` and tags are `TEXT[]`; all of it is decoded into the
//! typed domain model here so callers never see driver values.

mod decode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::PostgresRepository;

#[cfg(test)]
mod tests;
