//! The sync driver: pulls pages from an event source and folds them into
//! each projection.
//!
//! Per page, derived state is persisted before the cursor moves. A crash
//! between the two replays the page on the next cycle, which every fold
//! tolerates. A fetch failure leaves both untouched.

use std::collections::BTreeSet;

use chrono::Utc;
use herald_discovery::{EventPage, EventQuery, EventSource};
use herald_feed::{FeedCache, FeedCandidate};
use herald_notify::{process_events, NotificationConfig, NotificationContext, NotificationLog};
use herald_projections::{fold_blessings, fold_followers, BlessingLedger, FollowerState};
use herald_store::Store;
use herald_types::{event_types, normalize_domain, Event, ProjectionKind};

use crate::error::SyncError;

const FOLLOW_TYPES: [&str; 2] = [event_types::FOLLOW_ANNOUNCED, event_types::FOLLOW_REMOVED];

const BLESSING_TYPES: [&str; 3] = [
    event_types::BLESSING_REQUESTED,
    event_types::BLESSING_GRANTED,
    event_types::BLESSING_DENIED,
];

const CONTENT_TYPES: [&str; 4] = [
    event_types::POST_PUBLISHED,
    event_types::POST_REPUBLISHED,
    event_types::COMMENT_PUBLISHED,
    event_types::COMMENT_REPUBLISHED,
];

/// Default number of events requested per page.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// What one projection's sync achieved.
#[derive(Debug)]
pub enum ProjectionOutcome {
    Synced {
        /// Events folded into state.
        events: usize,
        /// Events that failed to decode and were stepped over.
        skipped: usize,
        /// Cursor position after the sync.
        cursor: String,
    },
    Failed {
        error: SyncError,
    },
}

impl ProjectionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of one sync cycle, in the order projections ran.
///
/// A storage failure ends the cycle, so projections after it are absent.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<(ProjectionKind, ProjectionOutcome)>,
}

impl SyncReport {
    pub fn outcome(&self, kind: ProjectionKind) -> Option<&ProjectionOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| outcome)
    }

    /// Projections that failed, in run order.
    pub fn failed(&self) -> Vec<ProjectionKind> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_failed())
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// True when no projection synced: "no new data synced".
    pub fn is_total_failure(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_failed())
    }

    /// Events folded across all projections.
    pub fn total_events(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                ProjectionOutcome::Synced { events, .. } => *events,
                ProjectionOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_total_failure() {
            return f.write_str("no new data synced");
        }
        let mut first = true;
        for (kind, outcome) in &self.outcomes {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            match outcome {
                ProjectionOutcome::Synced { events, .. } => write!(f, "{kind}: {events} events")?,
                ProjectionOutcome::Failed { .. } => write!(f, "{kind}: failed")?,
            }
        }
        Ok(())
    }
}

/// Counts for one successful projection sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionSync {
    pub events: usize,
    pub skipped: usize,
    pub cursor: String,
}

/// Drives incremental sync of every projection from one event source into
/// one tenant store.
pub struct SyncDriver<S> {
    source: S,
    store: Store,
    local_domain: String,
    followed: Option<BTreeSet<String>>,
    page_limit: u32,
}

impl<S: EventSource> SyncDriver<S> {
    pub fn new(source: S, store: Store, local_domain: &str) -> Self {
        Self {
            source,
            store,
            local_domain: normalize_domain(local_domain),
            followed: None,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }

    /// Sets the domains whose content feeds the feed cache and whose events
    /// `followed_author` notification rules accept.
    pub fn with_followed(mut self, followed: BTreeSet<String>) -> Self {
        self.followed = Some(followed);
        self
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit.max(1);
        self
    }

    pub fn set_followed(&mut self, followed: Option<BTreeSet<String>>) {
        self.followed = followed;
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs every projection once, in [`ProjectionKind::ALL`] order.
    ///
    /// Fetch failures are recorded and the next projection still runs.
    /// A storage failure is recorded and ends the cycle.
    pub async fn sync_all(&self) -> SyncReport {
        let mut report = SyncReport::default();

        for kind in ProjectionKind::ALL {
            match self.sync_projection(kind).await {
                Ok(done) => {
                    tracing::info!(
                        tenant = %self.store.tenant(),
                        projection = %kind,
                        events = done.events,
                        skipped = done.skipped,
                        cursor = %done.cursor,
                        "projection synced"
                    );
                    report.outcomes.push((
                        kind,
                        ProjectionOutcome::Synced {
                            events: done.events,
                            skipped: done.skipped,
                            cursor: done.cursor,
                        },
                    ));
                }
                Err(error) => {
                    let fatal = error.is_storage();
                    if fatal {
                        tracing::error!(projection = %kind, error = %error, "projection storage failed");
                    } else {
                        tracing::warn!(projection = %kind, error = %error, "projection fetch failed");
                    }
                    report.outcomes.push((kind, ProjectionOutcome::Failed { error }));
                    if fatal {
                        break;
                    }
                }
            }
        }

        report
    }

    /// Pulls every available page for `kind` and folds it in.
    ///
    /// # Errors
    ///
    /// `SyncError::Fetch` if a page could not be fetched; state and cursor
    /// keep whatever earlier pages of this call committed.
    /// `SyncError::Storage` if state or cursor could not be read or written.
    pub async fn sync_projection(&self, kind: ProjectionKind) -> Result<ProjectionSync, SyncError> {
        let name = kind.as_str();
        let storage = || SyncError::storage(kind);
        let mut cursor = self.store.get_cursor(name).map_err(storage())?;
        let mut done = ProjectionSync::default();

        loop {
            let Some(query) = self.query_for(kind, &cursor)? else {
                // Nothing to ask for; still record that the view is fresh.
                self.store.set_cursor(name, &cursor).map_err(storage())?;
                break;
            };

            let page = self
                .source
                .fetch(&query)
                .await
                .map_err(|source| SyncError::Fetch {
                    projection: kind,
                    source,
                })?;

            self.apply(kind, &page)?;

            let next = page.next_cursor(&cursor);
            let entry = self.store.set_cursor(name, &next).map_err(storage())?;

            done.events += page.events.len();
            done.skipped += page.skipped;

            let advanced = entry.position != cursor;
            cursor = entry.position;

            if !page.has_more {
                break;
            }
            if !advanced {
                tracing::warn!(
                    projection = %kind,
                    cursor = %cursor,
                    "source reported more events without advancing the cursor"
                );
                break;
            }
        }

        done.cursor = cursor;
        Ok(done)
    }

    /// The fetch for `kind`, or `None` when the projection currently wants
    /// no events at all.
    fn query_for(&self, kind: ProjectionKind, cursor: &str) -> Result<Option<EventQuery>, SyncError> {
        let query = EventQuery::since(cursor).with_limit(self.page_limit);

        let query = match kind {
            ProjectionKind::Followers => query.with_types(FOLLOW_TYPES),
            ProjectionKind::Blessings => query.with_types(BLESSING_TYPES),
            ProjectionKind::Notifications => {
                let types = self.notification_config()?.enabled_event_types();
                if types.is_empty() {
                    return Ok(None);
                }
                query.with_types(types)
            }
            ProjectionKind::Feed => match &self.followed {
                Some(followed) if !followed.is_empty() => query
                    .with_types(CONTENT_TYPES)
                    .with_actors(followed.iter().cloned()),
                _ => return Ok(None),
            },
        };

        Ok(Some(query))
    }

    fn apply(&self, kind: ProjectionKind, page: &EventPage) -> Result<(), SyncError> {
        let name = kind.as_str();
        let storage = || SyncError::storage(kind);
        let events: &[Event] = &page.events;

        match kind {
            ProjectionKind::Followers => {
                let prior: FollowerState = self.store.load_state(name).map_err(storage())?;
                let next = fold_followers(events, prior, &self.local_domain);
                self.store.save_state(name, &next).map_err(storage())?;
            }
            ProjectionKind::Blessings => {
                let prior: BlessingLedger = self.store.load_state(name).map_err(storage())?;
                let next = fold_blessings(events, prior, &self.local_domain);
                self.store.save_state(name, &next).map_err(storage())?;
            }
            ProjectionKind::Notifications => {
                let config = self.notification_config()?;
                let mut log: NotificationLog = self.store.load_state(name).map_err(storage())?;

                let mut ctx = NotificationContext::new(&self.local_domain);
                if let Some(followed) = &self.followed {
                    ctx = ctx.with_followed(followed);
                }
                let added = process_events(events, &config, &ctx, &mut log);
                let pruned = log.prune(&config, Utc::now());
                if added > 0 || pruned > 0 {
                    tracing::debug!(added, pruned, total = log.len(), "updated notifications");
                }

                self.store.save_state(name, &log).map_err(storage())?;
            }
            ProjectionKind::Feed => {
                let candidates: Vec<FeedCandidate> =
                    events.iter().filter_map(FeedCandidate::from_event).collect();
                FeedCache::new(&self.store)
                    .merge_items(candidates, Utc::now())
                    .map_err(storage())?;
            }
        }

        Ok(())
    }

    fn notification_config(&self) -> Result<NotificationConfig, SyncError> {
        self.store
            .load_config(ProjectionKind::Notifications.as_str())
            .map_err(SyncError::storage(ProjectionKind::Notifications))
    }
}
