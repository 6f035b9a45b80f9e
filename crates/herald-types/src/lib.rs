//! Shared types for the Herald event-projection layer.
//!
//! This crate provides the foundational types used across all Herald crates:
//! the event model received from a discovery service, the opaque event
//! ordinal, the projection key that selects which fold a sync step runs, and
//! small helpers for domains and timestamps.
//!
//! No crate in the workspace depends on anything *except* `herald-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

mod domain;
mod event;

pub use domain::{
    domain_from_url, is_stale, normalize_domain, normalize_timestamp, now_rfc3339,
    retention_cutoff, to_rfc3339,
};
pub use event::{event_types, Event, EventId};

use serde::{Deserialize, Serialize};

/// The materialized views Herald derives from the event log.
///
/// Each variant owns one typed state value and one cursor entry per
/// discovery service. The variant name doubles as the on-disk state file name
/// and the cursor key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionKind {
    /// The set of domains following the local domain.
    Followers,
    /// Comment blessings addressed to the local domain.
    Blessings,
    /// The deduplicated notification log.
    Notifications,
    /// Cached posts and comments from followed authors.
    Feed,
}

impl ProjectionKind {
    /// All projections, in the order a sync cycle runs them.
    pub const ALL: [ProjectionKind; 4] = [
        Self::Followers,
        Self::Blessings,
        Self::Notifications,
        Self::Feed,
    ];

    /// Returns the canonical string label for this projection.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Followers => "followers",
            Self::Blessings => "blessings",
            Self::Notifications => "notifications",
            Self::Feed => "feed",
        }
    }
}

impl std::fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProjectionKind {
    type Err = ParseProjectionKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "followers" => Ok(Self::Followers),
            "blessings" => Ok(Self::Blessings),
            "notifications" => Ok(Self::Notifications),
            "feed" => Ok(Self::Feed),
            _ => Err(ParseProjectionKindError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown projection name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown projection: {0}")]
pub struct ParseProjectionKindError(pub String);
