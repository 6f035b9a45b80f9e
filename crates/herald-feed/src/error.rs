//! Error types for the feed cache.

use herald_store::StoreError;

/// Errors that can occur during feed cache operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// No cached item with the given id exists.
    #[error("feed item not found: {0}")]
    ItemNotFound(String),

    /// Reading or writing the cache failed.
    #[error("feed storage error: {0}")]
    Store(#[from] StoreError),
}
