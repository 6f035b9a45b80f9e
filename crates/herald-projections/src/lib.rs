//! Follower and blessing projections for Herald.
//!
//! Both projections are pure folds over a batch of events:
//! `fold(events, prior, local_domain) -> next`. They hold no I/O and no
//! clock; the sync driver loads the prior value from the store and persists
//! the result.
//!
//! Each fold enforces a visibility boundary: an event whose recipient is not
//! the local domain is dropped, even when a shared discovery feed delivers
//! it. A node never materializes state about traffic addressed to someone
//! else.
//!
//! Folds are idempotent under redelivery. Replaying a batch against the
//! state it already produced yields the same state.

mod blessings;
mod followers;

pub use blessings::{fold_blessings, BlessingCounts, BlessingEntry, BlessingLedger, BlessingStatus};
pub use followers::{fold_followers, FollowerState};
