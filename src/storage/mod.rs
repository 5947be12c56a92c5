//! Storage layer abstraction.
//!
//! Three families of seams:
//! - **Owned stores** ([`ScoreStore`], [`FeedStore`], [`NotificationStore`]):
//!   rows this engine creates and prunes. The `SQLite` backend in
//!   [`sqlite`] implements all three.
//! - **Collaborator reads** ([`SocialGraph`], [`ContentCatalog`]): follow
//!   edges, interest profiles, and content cards owned elsewhere, consumed
//!   read-only.
//! - **In-memory collaborators** ([`memory`]): `HashMap`-backed implementations
//!   used by tests, demos, and the CLI's snapshot-dump ingestion.

// Allow cast precision loss for score calculations where exact precision is not critical.
#![allow(clippy::cast_precision_loss)]
// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::{InMemoryCatalog, InMemorySocialGraph};
pub use sqlite::SqliteStore;
pub use traits::{ContentCatalog, FeedStore, NotificationStore, ScoreStore, SocialGraph};
