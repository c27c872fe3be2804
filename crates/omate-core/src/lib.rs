//! Core types and trait definitions for the OMateShare content store.
//!
//! This crate is deliberately free of HTTP, object-storage and database
//! dependencies. Backends and the catalog layer depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod access_keys;
pub mod config;
pub mod content;
pub mod error;
pub mod metadata;
pub mod repository;
pub mod settings;

pub use error::{Classify, Error, ErrorKind, Result};
