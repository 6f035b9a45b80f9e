//! Cursor and state storage for Herald projections.
//!
//! Every projection persists two things per discovery service: its
//! materialized value and the position of the last event it consumed. This
//! crate owns both, plus the user-authored configuration that sits next to
//! them.
//!
//! # Layout
//!
//! ```text
//! <data_dir>/<discovery-domain>/
//!     state/
//!         cursors.json        projection name -> { position, last_updated }
//!         followers.json
//!         blessings.json
//!         notifications.json
//!         feed.json
//!     config/
//!         notifications.json  rules, muted domains, retention
//!         feed.json           retention, staleness
//! ```
//!
//! # Design decisions
//!
//! - **One directory per discovery service**: a single agent can follow
//!   several independent event sources without their cursors or derived
//!   state ever mixing.
//! - **`state/` and `config/` are siblings**: [`Store::reset_state`] removes
//!   derived state wholesale and never touches user configuration.
//! - **Whole-value writes through a temp file and rename**: a crash mid-write
//!   leaves the previous value in place.
//! - **Reads before the first write return zero values**: an
//!   un-initialized projection is indistinguishable from an empty one.
//!
//! The store assumes a single writer per tenant directory; callers that allow
//! concurrent sync cycles must serialize them externally.

mod error;
mod store;

pub use error::StoreError;
pub use store::{list_tenants, CursorEntry, Store, CURSOR_START};

#[cfg(test)]
mod tests;
