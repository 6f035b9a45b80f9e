//! Blessings projection: comment approvals addressed to the local domain.
//!
//! A blessing tracks one comment (`source_url`) on one of the local domain's
//! posts (`target_url`). The discovery log may be truncated to a recent
//! window, so a terminal `granted`/`denied` event must stand on its own even
//! when the `requested` event that preceded it was never observed.

use std::collections::BTreeMap;

use herald_types::{domain_from_url, event_types, normalize_domain, Event};
use serde::{Deserialize, Serialize};

/// Moderation state of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlessingStatus {
    Pending,
    Granted,
    Denied,
}

impl BlessingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for BlessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlessingEntry {
    /// URL of the comment asking to be blessed. Unique key.
    pub source_url: String,
    /// URL of the local post the comment replies to.
    #[serde(default)]
    pub target_url: String,
    pub status: BlessingStatus,
    /// Domain of the commenter.
    pub actor: String,
    /// Timestamp of the event that last changed this entry.
    pub updated_at: String,
}

/// Number of entries in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlessingCounts {
    pub pending: usize,
    pub granted: usize,
    pub denied: usize,
}

/// Materialized blessing ledger keyed by `source_url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlessingLedger {
    #[serde(default)]
    pub entries: BTreeMap<String, BlessingEntry>,
}

impl BlessingLedger {
    pub fn get(&self, source_url: &str) -> Option<&BlessingEntry> {
        self.entries.get(source_url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries still awaiting a decision, oldest first.
    pub fn pending(&self) -> Vec<&BlessingEntry> {
        let mut pending: Vec<&BlessingEntry> = self
            .entries
            .values()
            .filter(|entry| entry.status == BlessingStatus::Pending)
            .collect();
        pending.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        pending
    }

    pub fn counts(&self) -> BlessingCounts {
        self.entries
            .values()
            .fold(BlessingCounts::default(), |mut counts, entry| {
                match entry.status {
                    BlessingStatus::Pending => counts.pending += 1,
                    BlessingStatus::Granted => counts.granted += 1,
                    BlessingStatus::Denied => counts.denied += 1,
                }
                counts
            })
    }

    /// Applies one event. Returns `true` if the ledger changed.
    ///
    /// - `blessing.requested` inserts a pending entry unless `source_url` is
    ///   already tracked.
    /// - `blessing.granted` / `blessing.denied` set the terminal status,
    ///   creating the entry if it was never requested.
    ///
    /// Events whose resolved target domain is not `local_domain` are dropped.
    pub fn apply(&mut self, event: &Event, local_domain: &str) -> bool {
        let status = match event.event_type.as_str() {
            event_types::BLESSING_REQUESTED => BlessingStatus::Pending,
            event_types::BLESSING_GRANTED => BlessingStatus::Granted,
            event_types::BLESSING_DENIED => BlessingStatus::Denied,
            _ => return false,
        };

        match resolve_target_domain(event) {
            Some(target) if target == normalize_domain(local_domain) => {}
            _ => return false,
        }

        let Some(source_url) = event.payload_str("source_url") else {
            tracing::warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                "skipping blessing event without source_url"
            );
            return false;
        };

        let target_url = event.payload_str("target_url").unwrap_or_default();

        if !status.is_terminal() {
            if self.entries.contains_key(source_url) {
                return false;
            }
            self.entries.insert(
                source_url.to_string(),
                BlessingEntry {
                    source_url: source_url.to_string(),
                    target_url: target_url.to_string(),
                    status,
                    actor: normalize_domain(&event.actor),
                    updated_at: event.timestamp.clone(),
                },
            );
            return true;
        }

        match self.entries.get_mut(source_url) {
            Some(entry) => {
                let changed = entry.status != status
                    || entry.updated_at != event.timestamp
                    || (entry.target_url.is_empty() && !target_url.is_empty());
                entry.status = status;
                entry.updated_at = event.timestamp.clone();
                if entry.target_url.is_empty() {
                    entry.target_url = target_url.to_string();
                }
                changed
            }
            None => {
                self.entries.insert(
                    source_url.to_string(),
                    BlessingEntry {
                        source_url: source_url.to_string(),
                        target_url: target_url.to_string(),
                        status,
                        actor: commenter_domain(event, source_url),
                        updated_at: event.timestamp.clone(),
                    },
                );
                true
            }
        }
    }
}

/// Folds `events` into `prior`, returning the updated ledger.
pub fn fold_blessings(events: &[Event], prior: BlessingLedger, local_domain: &str) -> BlessingLedger {
    events.iter().fold(prior, |mut ledger, event| {
        ledger.apply(event, local_domain);
        ledger
    })
}

/// The explicit `target_domain`, falling back to the host of `target_url`.
fn resolve_target_domain(event: &Event) -> Option<String> {
    if let Some(domain) = event.payload_str("target_domain") {
        return Some(normalize_domain(domain));
    }
    event.payload_str("target_url").and_then(domain_from_url)
}

/// A terminal event is emitted by the post owner, so the commenter is taken
/// from the payload rather than the event actor.
fn commenter_domain(event: &Event, source_url: &str) -> String {
    event
        .payload_str("source_domain")
        .map(normalize_domain)
        .or_else(|| domain_from_url(source_url))
        .unwrap_or_else(|| normalize_domain(&event.actor))
}
