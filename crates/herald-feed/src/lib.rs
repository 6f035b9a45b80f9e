//! Cached content feed for Herald.
//!
//! Posts and comments from followed authors are cached locally so they can
//! be listed, read, and re-read without a round trip to the discovery
//! service. The cache is a flat list ordered by `published` (newest first)
//! rather than a keyed table, because display is chronological.
//!
//! - [`FeedState`] is the pure in-memory list: merging, pruning, read state.
//! - [`FeedCache`] wraps it with persistence in a tenant [`herald_store::Store`].
//!
//! Item ids are a truncated hash of `author_url|url`, so republishing the
//! same content never creates a second item and a read mark survives later
//! merges.

mod cache;
mod error;
mod item;
mod state;

pub use cache::FeedCache;
pub use error::FeedError;
pub use item::{item_id, CachedFeedItem, FeedCandidate, FeedConfig, FeedItemType};
pub use state::{FeedQuery, FeedState};
