//! Error types for the sync driver and agent startup.

use std::path::PathBuf;

use herald_discovery::{FetchError, SignatureError};
use herald_store::StoreError;
use herald_types::ProjectionKind;

use crate::config::ConfigError;

/// Why one projection failed to sync.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The event fetch failed; cursor and state are unchanged.
    #[error("{projection}: fetch failed: {source}")]
    Fetch {
        projection: ProjectionKind,
        #[source]
        source: FetchError,
    },

    /// Local state could not be read or written. Ends the sync cycle.
    #[error("{projection}: storage failed: {source}")]
    Storage {
        projection: ProjectionKind,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    pub fn projection(&self) -> ProjectionKind {
        match self {
            Self::Fetch { projection, .. } | Self::Storage { projection, .. } => *projection,
        }
    }

    /// Transport failures are retried next cycle; storage failures stop the
    /// current one.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    pub(crate) fn storage(projection: ProjectionKind) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Storage { projection, source }
    }
}

/// Errors reading the followed-domains list.
#[derive(Debug, thiserror::Error)]
pub enum FollowingError {
    #[error("failed to read following list {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse following list {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that prevent the agent from starting.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to load signing key: {0}")]
    SigningKey(#[from] SignatureError),

    #[error("failed to create discovery client: {0}")]
    Client(#[from] FetchError),

    #[error(transparent)]
    Following(#[from] FollowingError),
}
