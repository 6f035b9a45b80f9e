//! Herald agent: configuration and the sync driver.
//!
//! The driver is the only place where projections meet I/O. It pulls pages
//! from an [`herald_discovery::EventSource`], folds them with the pure
//! functions of `herald-projections`, `herald-notify`, and `herald-feed`, and
//! commits state then cursor through a [`herald_store::Store`].
//!
//! Retry and scheduling are left to the caller; the `herald-agent` binary
//! runs one cycle or repeats on a fixed interval.

pub mod config;
pub mod error;
pub mod following;
pub mod sync;

pub use config::{load_config, load_config_with, AgentConfig, ConfigError};
pub use error::{AgentError, FollowingError, SyncError};
pub use following::load_following;
pub use sync::{ProjectionOutcome, ProjectionSync, SyncDriver, SyncReport, DEFAULT_PAGE_LIMIT};
