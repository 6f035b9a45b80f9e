//! Notification entries and the persisted notification log.

use chrono::{DateTime, Utc};
use herald_types::{retention_cutoff, to_rfc3339, EventId};
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;
use crate::rule::NotificationConfig;

/// A rendered notification.
///
/// Everything except `read_at` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEntry {
    /// Dedupe key: `<rule id>:<content identifier>`.
    pub id: String,
    pub rule_id: String,
    pub actor: String,
    #[serde(default)]
    pub icon: String,
    pub message: String,
    #[serde(default)]
    pub link: String,
    /// Events that produced this notification.
    #[serde(default)]
    pub event_ids: Vec<EventId>,
    /// Timestamp of the originating event (RFC 3339).
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<String>,
}

impl NotificationEntry {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Listing parameters for [`NotificationLog::list`].
#[derive(Debug, Clone, Default)]
pub struct NotificationQuery {
    /// Only entries produced by this rule.
    pub rule_id: Option<String>,
    /// Only entries not yet read.
    pub unread_only: bool,
    pub offset: usize,
    /// Maximum number of entries returned (unbounded when `None`).
    pub limit: Option<usize>,
}

/// The materialized notification view, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationLog {
    #[serde(default)]
    pub entries: Vec<NotificationEntry>,
}

impl NotificationLog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&NotificationEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.is_read()).count()
    }

    /// Returns a page of entries, newest first.
    pub fn list(&self, query: &NotificationQuery) -> Vec<&NotificationEntry> {
        self.entries
            .iter()
            .filter(|entry| {
                query
                    .rule_id
                    .as_deref()
                    .map_or(true, |rule_id| entry.rule_id == rule_id)
            })
            .filter(|entry| !query.unread_only || !entry.is_read())
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Marks one entry read. Already-read entries keep their first read time.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::EntryNotFound` if `id` is absent.
    pub fn mark_read(&mut self, id: &str, now: DateTime<Utc>) -> Result<(), NotifyError> {
        let entry = self.entry_mut(id)?;
        if entry.read_at.is_none() {
            entry.read_at = Some(to_rfc3339(now));
        }
        Ok(())
    }

    /// Clears the read mark of one entry.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::EntryNotFound` if `id` is absent.
    pub fn mark_unread(&mut self, id: &str) -> Result<(), NotifyError> {
        self.entry_mut(id)?.read_at = None;
        Ok(())
    }

    /// Marks every unread entry read. Returns how many changed.
    pub fn mark_all_read(&mut self, now: DateTime<Utc>) -> usize {
        let stamp = to_rfc3339(now);
        let mut changed = 0;
        for entry in self.entries.iter_mut().filter(|entry| entry.read_at.is_none()) {
            entry.read_at = Some(stamp.clone());
            changed += 1;
        }
        changed
    }

    /// Applies retention: drops entries older than `max_age_days`, then keeps
    /// only the newest `max_items`. Returns how many were removed.
    pub fn prune(&mut self, config: &NotificationConfig, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();

        if let Some(cutoff) = retention_cutoff(config.max_age_days, now) {
            self.entries.retain(|entry| entry.created_at.as_str() >= cutoff.as_str());
        }
        self.entries.truncate(config.max_items);

        before - self.entries.len()
    }

    /// Restores newest-first order after appends.
    pub(crate) fn sort(&mut self) {
        self.entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    fn entry_mut(&mut self, id: &str) -> Result<&mut NotificationEntry, NotifyError> {
        self.entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .ok_or_else(|| NotifyError::EntryNotFound(id.to_string()))
    }
}
