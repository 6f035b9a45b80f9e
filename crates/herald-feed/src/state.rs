//! In-memory feed list: merge, retention, and read state.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use herald_types::{normalize_timestamp, retention_cutoff, to_rfc3339};
use serde::{Deserialize, Serialize};

use crate::error::FeedError;
use crate::item::{CachedFeedItem, FeedCandidate, FeedConfig, FeedItemType};

/// Listing parameters for [`FeedState::list`].
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub item_type: Option<FeedItemType>,
    pub unread_only: bool,
    pub offset: usize,
    /// Maximum number of items returned (unbounded when `None`).
    pub limit: Option<usize>,
}

/// The cached feed, sorted by `published` descending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedState {
    #[serde(default)]
    pub items: Vec<CachedFeedItem>,
}

impl FeedState {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CachedFeedItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_read()).count()
    }

    /// Appends candidates whose id is not yet cached. Existing items are left
    /// untouched, including their read mark. Returns the number added.
    pub fn merge(&mut self, candidates: impl IntoIterator<Item = FeedCandidate>, now: DateTime<Utc>) -> usize {
        let mut known: HashSet<String> = self.items.iter().map(|item| item.id.clone()).collect();
        let cached_at = to_rfc3339(now);
        let mut added = 0;

        for candidate in candidates {
            let id = candidate.id();
            if !known.insert(id.clone()) {
                continue;
            }
            self.items.push(CachedFeedItem {
                id,
                item_type: candidate.item_type,
                title: candidate.title,
                url: candidate.url,
                published: normalize_timestamp(&candidate.published, now),
                hash: candidate.hash,
                author_url: candidate.author_url,
                author_domain: candidate.author_domain,
                target_url: candidate.target_url,
                target_domain: candidate.target_domain,
                cached_at: cached_at.clone(),
                read_at: None,
            });
            added += 1;
        }

        self.sort();
        added
    }

    /// Drops items published more than `max_age_days` ago, then keeps only
    /// the newest `max_items`. Returns how many were removed.
    pub fn prune(&mut self, config: &FeedConfig, now: DateTime<Utc>) -> usize {
        let before = self.items.len();

        if let Some(cutoff) = retention_cutoff(config.max_age_days, now) {
            self.items.retain(|item| item.published.as_str() >= cutoff.as_str());
        }
        self.items.truncate(config.max_items);

        before - self.items.len()
    }

    /// # Errors
    ///
    /// Returns `FeedError::ItemNotFound` if `id` is absent.
    pub fn mark_read(&mut self, id: &str, now: DateTime<Utc>) -> Result<(), FeedError> {
        let item = self.item_mut(id)?;
        if item.read_at.is_none() {
            item.read_at = Some(to_rfc3339(now));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `FeedError::ItemNotFound` if `id` is absent.
    pub fn mark_unread(&mut self, id: &str) -> Result<(), FeedError> {
        self.item_mut(id)?.read_at = None;
        Ok(())
    }

    /// Marks every unread item read. Returns how many changed.
    pub fn mark_all_read(&mut self, now: DateTime<Utc>) -> usize {
        let stamp = to_rfc3339(now);
        let mut changed = 0;
        for item in self.items.iter_mut().filter(|item| item.read_at.is_none()) {
            item.read_at = Some(stamp.clone());
            changed += 1;
        }
        changed
    }

    /// Re-opens `id` and every item published at or after it. Returns how
    /// many items changed from read to unread.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::ItemNotFound` if `id` is absent.
    pub fn mark_unread_from(&mut self, id: &str) -> Result<usize, FeedError> {
        let published = self
            .get(id)
            .map(|item| item.published.clone())
            .ok_or_else(|| FeedError::ItemNotFound(id.to_string()))?;

        let mut changed = 0;
        for item in self
            .items
            .iter_mut()
            .filter(|item| item.published >= published)
        {
            if item.read_at.take().is_some() {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Returns a page of items, newest first.
    pub fn list(&self, query: &FeedQuery) -> Vec<&CachedFeedItem> {
        self.items
            .iter()
            .filter(|item| query.item_type.map_or(true, |kind| item.item_type == kind))
            .filter(|item| !query.unread_only || !item.is_read())
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect()
    }

    fn sort(&mut self) {
        self.items.sort_by(|a, b| b.published.cmp(&a.published));
    }

    fn item_mut(&mut self, id: &str) -> Result<&mut CachedFeedItem, FeedError> {
        self.items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| FeedError::ItemNotFound(id.to_string()))
    }
}

