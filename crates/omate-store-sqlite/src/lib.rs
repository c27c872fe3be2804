//! SQLite backend for the OMateShare content store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. SQLite serialises writers, so
//! concurrent edits of one row are last-write-wins.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteRepository;

#[cfg(test)]
mod tests;
