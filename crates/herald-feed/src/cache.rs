//! Persistent feed cache backed by a tenant store.

use chrono::{DateTime, Utc};
use herald_store::{Store, StoreError};
use herald_types::{is_stale, ProjectionKind};

use crate::error::FeedError;
use crate::item::{FeedCandidate, FeedConfig};
use crate::state::FeedState;

const FEED: &str = ProjectionKind::Feed.as_str();

/// Feed operations that load, mutate, and persist in one step.
///
/// Each call re-reads the state file, so a `FeedCache` never holds stale
/// data between calls.
#[derive(Debug, Clone, Copy)]
pub struct FeedCache<'a> {
    store: &'a Store,
}

impl<'a> FeedCache<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn config(&self) -> Result<FeedConfig, FeedError> {
        Ok(self.store.load_config(FEED)?)
    }

    pub fn save_config(&self, config: &FeedConfig) -> Result<(), FeedError> {
        Ok(self.store.save_config(FEED, config)?)
    }

    pub fn load(&self) -> Result<FeedState, FeedError> {
        Ok(self.store.load_state(FEED)?)
    }

    /// Merges `candidates`, persists, then applies retention. Returns the
    /// number of new items (including any that retention removed again).
    ///
    /// Merging never references an existing item, so only the store can fail.
    pub fn merge_items(
        &self,
        candidates: impl IntoIterator<Item = FeedCandidate>,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut state: FeedState = self.store.load_state(FEED)?;
        let added = state.merge(candidates, now);
        self.store.save_state(FEED, &state)?;

        let config: FeedConfig = self.store.load_config(FEED)?;
        let removed = state.prune(&config, now);
        if removed > 0 {
            self.store.save_state(FEED, &state)?;
        }

        tracing::debug!(
            tenant = %self.store.tenant(),
            added,
            removed,
            total = state.len(),
            "merged feed items"
        );
        Ok(added)
    }

    /// Applies retention to the persisted feed. Returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>) -> Result<usize, FeedError> {
        let mut state = self.load()?;
        let removed = state.prune(&self.config()?, now);
        if removed > 0 {
            self.save(&state)?;
            tracing::info!(tenant = %self.store.tenant(), removed, "pruned feed items");
        }
        Ok(removed)
    }

    pub fn mark_read(&self, id: &str, now: DateTime<Utc>) -> Result<(), FeedError> {
        self.update(|state| state.mark_read(id, now))
    }

    pub fn mark_unread(&self, id: &str) -> Result<(), FeedError> {
        self.update(|state| state.mark_unread(id))
    }

    pub fn mark_all_read(&self, now: DateTime<Utc>) -> Result<usize, FeedError> {
        self.update(|state| Ok(state.mark_all_read(now)))
    }

    pub fn mark_unread_from(&self, id: &str) -> Result<usize, FeedError> {
        self.update(|state| state.mark_unread_from(id))
    }

    pub fn unread_count(&self) -> Result<usize, FeedError> {
        Ok(self.load()?.unread_count())
    }

    /// Whether the feed should be refreshed before display: true if it was
    /// never synced, or if the last sync is older than `staleness_minutes`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> Result<bool, FeedError> {
        let config = self.config()?;
        let entry = self.store.cursor_entry(FEED)?;
        Ok(is_stale(
            entry.as_ref().map(|entry| entry.last_updated.as_str()),
            config.staleness_minutes,
            now,
        ))
    }

    fn save(&self, state: &FeedState) -> Result<(), FeedError> {
        Ok(self.store.save_state(FEED, state)?)
    }

    fn update<T>(
        &self,
        op: impl FnOnce(&mut FeedState) -> Result<T, FeedError>,
    ) -> Result<T, FeedError> {
        let mut state = self.load()?;
        let out = op(&mut state)?;
        self.save(&state)?;
        Ok(out)
    }
}
