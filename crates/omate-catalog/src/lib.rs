//! Content workflows for OMateShare built on a [`ContentRepository`] and an
//! [`ObjectStore`].
//!
//! - [`relations`] attaches related content to character cards in two
//!   repository round trips, whatever the number of cards.
//! - [`ordering`] applies manual sort orders item by item.
//! - [`feed`] shapes enriched cards into the public `cards` feed.
//! - [`Catalog`] ties those to blob upload and cleanup.
//! - [`AnyRepository`] picks a backend from the configured database URL.
//!
//! [`ContentRepository`]: omate_core::repository::ContentRepository
//! [`ObjectStore`]: omate_blob::ObjectStore

pub mod backend;
pub mod catalog;
pub mod error;
pub mod feed;
pub mod ordering;
pub mod relations;

pub use backend::{AnyRepository, RepositoryError};
pub use catalog::{Catalog, NewUpload};
pub use error::{Error, Result};
pub use feed::{Feed, FeedCard, format_cards};
pub use ordering::{SortItem, SortOrderMaintainer, SortOutcome};
pub use relations::{EnrichedCard, RelatedItem, Relations, RelationResolver, Resolved};
