//! Test utilities for the OMateShare storage crates.
//!
//! - [`conformance`]: one behavioural suite every
//!   [`ContentRepository`](omate_core::repository::ContentRepository) backend
//!   must pass.
//! - [`MemoryBackend`]: an in-memory [`ObjectBackend`](omate_blob::ObjectBackend)
//!   that records every call for assertions.
//! - [`CountingRepository`]: a repository wrapper that counts calls.

pub mod conformance;
pub mod counting;
pub mod memory;

pub use counting::CountingRepository;
pub use memory::MemoryBackend;
