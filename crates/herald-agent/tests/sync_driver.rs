//! Sync driver behavior against an in-memory event source.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Mutex;

use herald_agent::{ProjectionOutcome, SyncDriver, SyncError};
use herald_discovery::{EventPage, EventQuery, EventSource, FetchError};
use herald_feed::{FeedCache, FeedState};
use herald_notify::{NotificationConfig, NotificationLog};
use herald_projections::{BlessingLedger, BlessingStatus, FollowerState};
use herald_store::Store;
use herald_types::{event_types, ProjectionKind};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Serves a fixed log, honoring the cursor, limit, and filters of each query.
#[derive(Default)]
struct FakeSource {
    log: Vec<Value>,
    /// Projections whose fetches fail, by the first type in their filter.
    failing_types: Mutex<BTreeSet<String>>,
    /// Per-fetch script consumed in order: `Some(status)` fails that fetch,
    /// `None` lets it through. Fetches past the end succeed.
    script: Mutex<VecDeque<Option<u16>>>,
    queries: Mutex<Vec<EventQuery>>,
}

impl FakeSource {
    fn new(log: Vec<Value>) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    fn fail_type(&self, event_type: &str) {
        self.failing_types.lock().unwrap().insert(event_type.to_string());
    }

    fn script(&self, steps: impl IntoIterator<Item = Option<u16>>) {
        self.script.lock().unwrap().extend(steps);
    }

    fn heal(&self) {
        self.failing_types.lock().unwrap().clear();
    }

    fn queries(&self) -> Vec<EventQuery> {
        self.queries.lock().unwrap().clone()
    }

    fn page_for(&self, query: &EventQuery) -> Result<EventPage, FetchError> {
        self.queries.lock().unwrap().push(query.clone());

        if let Some(Some(status)) = self.script.lock().unwrap().pop_front() {
            return Err(FetchError::Status {
                status,
                body: "unavailable".to_string(),
            });
        }
        let failing = self.failing_types.lock().unwrap();
        if query.types.first().is_some_and(|t| failing.contains(t)) {
            return Err(FetchError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        drop(failing);

        let after: u64 = query.cursor.parse().unwrap_or(0);
        let matching: Vec<&Value> = self
            .log
            .iter()
            .filter(|raw| raw["id"].as_u64().unwrap_or(0) > after)
            .filter(|raw| {
                query.types.is_empty()
                    || raw["type"]
                        .as_str()
                        .is_some_and(|t| query.types.iter().any(|q| q == t))
            })
            .filter(|raw| {
                query.actors.is_empty()
                    || raw["actor"]
                        .as_str()
                        .is_some_and(|a| query.actors.iter().any(|q| q == a))
            })
            .collect();

        let limit = query.limit.unwrap_or(u32::MAX) as usize;
        let page: Vec<Value> = matching.iter().take(limit).map(|raw| (*raw).clone()).collect();
        let has_more = matching.len() > page.len();
        let cursor = page.last().and_then(|raw| raw["id"].as_u64()).map(|id| id.to_string());

        Ok(EventPage::from_raw(page, cursor, has_more))
    }
}

impl EventSource for FakeSource {
    async fn fetch(&self, query: &EventQuery) -> Result<EventPage, FetchError> {
        self.page_for(query)
    }
}

fn event(id: u64, event_type: &str, actor: &str, payload: Value) -> Value {
    json!({
        "id": id,
        "type": event_type,
        "actor": actor,
        "payload": payload,
        "timestamp": format!("{}T12:00:{:02}Z", chrono::Utc::now().format("%Y-%m-%d"), id % 60),
    })
}

fn follow(id: u64, actor: &str, target: &str) -> Value {
    event(id, event_types::FOLLOW_ANNOUNCED, actor, json!({ "target_domain": target }))
}

fn post(id: u64, actor: &str, path: &str) -> Value {
    event(
        id,
        event_types::POST_PUBLISHED,
        actor,
        json!({
            "url": format!("https://{actor}/{path}"),
            "metadata": { "title": path },
        }),
    )
}

fn sample_log() -> Vec<Value> {
    vec![
        follow(1, "alice.com", "bob.com"),
        follow(2, "alice.com", "bob.com"),
        follow(3, "carol.com", "dave.org"),
        event(
            4,
            event_types::BLESSING_REQUESTED,
            "carol.com",
            json!({
                "source_url": "https://carol.com/re.md",
                "target_url": "https://bob.com/post.md",
                "target_domain": "bob.com",
            }),
        ),
        post(5, "alice.com", "hello.md"),
        post(6, "eve.net", "spam.md"),
        event(
            7,
            event_types::BLESSING_GRANTED,
            "bob.com",
            json!({
                "source_url": "https://carol.com/re.md",
                "target_url": "https://bob.com/post.md",
                "target_domain": "bob.com",
            }),
        ),
    ]
}

fn driver(source: FakeSource) -> (TempDir, SyncDriver<FakeSource>) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let store = Store::open(dir.path(), "discover.example");
    let followed = BTreeSet::from(["alice.com".to_string()]);
    let driver = SyncDriver::new(source, store, "bob.com")
        .with_followed(followed)
        .with_page_limit(2);
    (dir, driver)
}

#[tokio::test]
async fn full_cycle_materializes_every_projection() {
    let (_dir, driver) = driver(FakeSource::new(sample_log()));

    let report = driver.sync_all().await;
    assert!(report.failed().is_empty(), "report: {report}");
    assert!(!report.is_total_failure());

    let store = driver.store();
    let followers: FollowerState = store.load_state("followers").unwrap();
    assert_eq!(followers.followers, BTreeSet::from(["alice.com".to_string()]));

    let blessings: BlessingLedger = store.load_state("blessings").unwrap();
    let entry = blessings.get("https://carol.com/re.md").expect("blessing tracked");
    assert_eq!(entry.status, BlessingStatus::Granted);
    assert_eq!(entry.actor, "carol.com");

    let log: NotificationLog = store.load_state("notifications").unwrap();
    assert!(log.contains("new-follower:bob.com"));
    assert!(log.contains("blessing-requested:https://carol.com/re.md"));
    assert!(log.contains("new-post:https://alice.com/hello.md"));
    assert!(
        !log.entries.iter().any(|entry| entry.actor == "eve.net"),
        "unfollowed authors must not notify"
    );

    let feed: FeedState = store.load_state("feed").unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed.items[0].url, "https://alice.com/hello.md");

    assert_eq!(store.get_cursor("followers").unwrap(), "3");
    assert_eq!(store.get_cursor("blessings").unwrap(), "7");
    assert_eq!(store.get_cursor("feed").unwrap(), "5");
}

#[tokio::test]
async fn pages_until_exhausted() {
    let (_dir, driver) = driver(FakeSource::new(sample_log()));

    let done = driver
        .sync_projection(ProjectionKind::Followers)
        .await
        .expect("sync should succeed");

    assert_eq!(done.events, 3);
    assert_eq!(done.cursor, "3");
    let cursors: Vec<String> = driver
        .source()
        .queries()
        .iter()
        .map(|q| q.cursor.clone())
        .collect();
    assert_eq!(cursors, vec!["", "2"], "second page resumes after the first");
}

#[tokio::test]
async fn second_cycle_is_incremental_and_idempotent() {
    let (_dir, driver) = driver(FakeSource::new(sample_log()));
    driver.sync_all().await;

    let store = driver.store();
    let followers: FollowerState = store.load_state("followers").unwrap();
    let log: NotificationLog = store.load_state("notifications").unwrap();
    let feed: FeedState = store.load_state("feed").unwrap();

    let report = driver.sync_all().await;
    assert_eq!(report.total_events(), 0);

    assert_eq!(store.load_state::<FollowerState>("followers").unwrap(), followers);
    assert_eq!(store.load_state::<NotificationLog>("notifications").unwrap(), log);
    assert_eq!(store.load_state::<FeedState>("feed").unwrap(), feed);
}

#[tokio::test]
async fn replay_after_cursor_loss_preserves_read_state() {
    let (_dir, driver) = driver(FakeSource::new(sample_log()));
    driver.sync_all().await;

    let store = driver.store();
    let cache = FeedCache::new(store);
    let item_id = cache.load().unwrap().items[0].id.clone();
    cache.mark_read(&item_id, chrono::Utc::now()).unwrap();

    let mut log: NotificationLog = store.load_state("notifications").unwrap();
    log.mark_all_read(chrono::Utc::now());
    store.save_state("notifications", &log).unwrap();

    // Simulate a crash after state was saved but before cursors moved.
    std::fs::remove_file(store.state_dir().join("cursors.json")).unwrap();
    driver.sync_all().await;

    let feed = cache.load().unwrap();
    assert_eq!(feed.len(), 1);
    assert!(feed.items[0].is_read());

    let replayed: NotificationLog = store.load_state("notifications").unwrap();
    assert_eq!(replayed.len(), log.len());
    assert_eq!(replayed.unread_count(), 0);
}

#[tokio::test]
async fn fetch_failure_leaves_cursor_and_state_untouched() {
    let (_dir, driver) = driver(FakeSource::new(sample_log()));
    driver.source().fail_type(event_types::BLESSING_REQUESTED);

    let report = driver.sync_all().await;
    assert_eq!(report.failed(), vec![ProjectionKind::Blessings]);
    assert!(!report.is_total_failure());
    assert!(matches!(
        report.outcome(ProjectionKind::Blessings),
        Some(ProjectionOutcome::Failed {
            error: SyncError::Fetch { .. }
        })
    ));
    assert!(matches!(
        report.outcome(ProjectionKind::Feed),
        Some(ProjectionOutcome::Synced { .. })
    ));

    let store = driver.store();
    assert_eq!(store.get_cursor("blessings").unwrap(), "");
    assert!(store.load_state::<BlessingLedger>("blessings").unwrap().is_empty());

    driver.source().heal();
    let report = driver.sync_all().await;
    assert!(report.failed().is_empty());
    assert_eq!(store.get_cursor("blessings").unwrap(), "7");
}

#[tokio::test]
async fn failure_on_a_later_page_keeps_earlier_pages() {
    let (_dir, driver) = driver(FakeSource::new(sample_log()));
    driver.source().script([None, Some(503)]);

    let failed = driver.sync_projection(ProjectionKind::Followers).await;
    assert!(matches!(failed, Err(SyncError::Fetch { .. })));

    let store = driver.store();
    assert_eq!(store.get_cursor("followers").unwrap(), "2");
    let followers: FollowerState = store.load_state("followers").unwrap();
    assert!(followers.contains("alice.com"));

    let done = driver
        .sync_projection(ProjectionKind::Followers)
        .await
        .expect("retry should succeed");
    assert_eq!(done.events, 1);
    assert_eq!(done.cursor, "3");
}

#[tokio::test]
async fn every_fetch_failing_reports_no_new_data() {
    let source = FakeSource::new(sample_log());
    source.script([Some(500); 4]);
    let (_dir, driver) = driver(source);

    let report = driver.sync_all().await;
    assert!(report.is_total_failure());
    assert_eq!(report.to_string(), "no new data synced");
    assert_eq!(report.failed().len(), 4);
    assert!(driver.store().cursors().unwrap().is_empty());
}

#[tokio::test]
async fn storage_failure_names_projection_and_ends_cycle() {
    let (_dir, driver) = driver(FakeSource::new(sample_log()));
    let store = driver.store();
    std::fs::create_dir_all(store.root()).unwrap();
    // A file where the state directory belongs makes every read fail.
    std::fs::write(store.state_dir(), b"not a directory").unwrap();

    let report = driver.sync_all().await;
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.failed(), vec![ProjectionKind::Followers]);
    assert!(matches!(
        report.outcome(ProjectionKind::Followers),
        Some(ProjectionOutcome::Failed {
            error: SyncError::Storage { .. }
        })
    ));
    assert!(driver.source().queries().is_empty());
}

#[tokio::test]
async fn feed_cache_write_failure_is_a_storage_error() {
    let (_dir, driver) = driver(FakeSource::new(sample_log()));
    // A directory where the feed state file belongs fails the merge only.
    std::fs::create_dir_all(driver.store().state_dir().join("feed.json")).unwrap();

    let err = driver
        .sync_projection(ProjectionKind::Feed)
        .await
        .expect_err("merge should fail");

    assert!(err.is_storage());
    assert_eq!(err.projection(), ProjectionKind::Feed);
    assert_eq!(driver.store().get_cursor("feed").unwrap(), "");
}

#[tokio::test]
async fn malformed_events_are_skipped_and_passed() {
    let mut log = sample_log();
    log.insert(1, json!({ "id": 2, "type": "follow.announced" }));
    log.remove(2);
    let (_dir, driver) = driver(FakeSource::new(log));

    let done = driver
        .sync_projection(ProjectionKind::Followers)
        .await
        .expect("sync should succeed");

    assert_eq!(done.skipped, 1);
    assert_eq!(done.events, 2);
    assert_eq!(done.cursor, "3");
}

#[tokio::test]
async fn feed_without_followed_authors_only_refreshes() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path(), "discover.example");
    let driver = SyncDriver::new(FakeSource::new(sample_log()), store, "bob.com");

    let done = driver
        .sync_projection(ProjectionKind::Feed)
        .await
        .expect("sync should succeed");

    assert_eq!(done.events, 0);
    assert!(driver.source().queries().is_empty());
    let entry = driver.store().cursor_entry("feed").unwrap().expect("cursor stamped");
    assert_eq!(entry.position, "");
    assert!(!FeedCache::new(driver.store()).is_stale(chrono::Utc::now()).unwrap());
}

#[tokio::test]
async fn notification_query_uses_enabled_rule_types() {
    let (_dir, driver) = driver(FakeSource::new(sample_log()));
    let mut config = NotificationConfig::default();
    for rule in &mut config.rules {
        rule.enabled = rule.event_type == event_types::FOLLOW_ANNOUNCED;
    }
    driver.store().save_config("notifications", &config).unwrap();

    driver
        .sync_projection(ProjectionKind::Notifications)
        .await
        .expect("sync should succeed");

    let queries = driver.source().queries();
    assert!(!queries.is_empty());
    assert!(queries
        .iter()
        .all(|q| q.types == vec![event_types::FOLLOW_ANNOUNCED.to_string()]));
}
