//! Notification rule engine for Herald.
//!
//! Turns raw discovery events into short, human-readable notifications.
//! Which events notify, and how, is declared in a user-editable rule table
//! persisted alongside the rest of the tenant's configuration.
//!
//! # Default rules
//!
//! | Rule | Event type | Relevance | Enabled |
//! |------|------------|-----------|---------|
//! | `new-follower` | `follow.announced` | `target_domain` | yes |
//! | `lost-follower` | `follow.removed` | `target_domain` | yes |
//! | `blessing-requested` | `blessing.requested` | `target_domain` | yes |
//! | `blessing-granted` | `blessing.granted` | `source_domain` | yes |
//! | `blessing-denied` | `blessing.denied` | `source_domain` | yes |
//! | `new-comment` | `comment.published` | `target_domain` | yes |
//! | `comment-republished` | `comment.republished` | `target_domain` | no |
//! | `new-post` | `post.published` | `followed_author` | yes |
//! | `post-republished` | `post.republished` | `followed_author` | no |
//!
//! # Deduplication
//!
//! Every notification carries a deterministic id,
//! `<rule id>:<content identifier>`. The engine checks that id against every
//! stored entry before appending, so re-ingesting an event (redelivery, a
//! replayed cursor, an overlapping sync window) never produces a second
//! notification.
//!
//! # Usage
//!
//! ```rust,ignore
//! use herald_notify::{process_events, NotificationConfig, NotificationContext, NotificationLog};
//!
//! let config = NotificationConfig::default();
//! let mut log = NotificationLog::default();
//! let ctx = NotificationContext::new("bob.com");
//! let added = process_events(&events, &config, &ctx, &mut log);
//! ```

mod engine;
mod entry;
mod error;
mod rule;
mod template;

pub use engine::{build_variables, content_identifier, dedupe_key, process_events, NotificationContext};
pub use entry::{NotificationEntry, NotificationLog, NotificationQuery};
pub use error::NotifyError;
pub use rule::{default_rules, NotificationConfig, Relevance, Rule, RuleFilter, Template};
pub use template::{render, Variables};
