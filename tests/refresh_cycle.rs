// tests/refresh_cycle.rs
//! Refresh cycle contract: publish on success, leave the cache untouched on
//! any failure, persist best-effort, and never run twice concurrently for
//! the same feed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use agrifeed::feed::{FeedId, Snapshot};
use agrifeed::fetch::FetchClient;
use agrifeed::persist::{MemoryGateway, PersistenceGateway};
use agrifeed::refresh::RefreshJob;
use agrifeed::store::FeedStore;
use agrifeed::RefreshOutcome;

struct StaticFetch {
    feed: FeedId,
    payload: Value,
    calls: AtomicUsize,
}

impl StaticFetch {
    fn new(feed: FeedId, payload: Value) -> Self {
        Self {
            feed,
            payload,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FetchClient for StaticFetch {
    async fn fetch(&self) -> anyhow::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }

    fn feed(&self) -> FeedId {
        self.feed
    }
}

struct FailingFetch(FeedId);

#[async_trait]
impl FetchClient for FailingFetch {
    async fn fetch(&self) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("connection refused"))
    }

    fn feed(&self) -> FeedId {
        self.0
    }
}

/// Fetch that blocks until released, to hold a run in flight.
struct GatedFetch {
    feed: FeedId,
    started: Arc<Notify>,
    release: Arc<Notify>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl FetchClient for GatedFetch {
    async fn fetch(&self) -> anyhow::Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(json!({"rice": 32.5}))
    }

    fn feed(&self) -> FeedId {
        self.feed
    }
}

/// Gateway whose writes always fail; reads stay empty.
struct BrokenGateway;

#[async_trait]
impl PersistenceGateway for BrokenGateway {
    async fn put(&self, _feed: FeedId, _snapshot: &Snapshot) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("disk full"))
    }

    async fn get(&self, _feed: FeedId) -> anyhow::Result<Option<Snapshot>> {
        Ok(None)
    }
}

fn job_with(client: impl FetchClient + 'static, gateway: Arc<dyn PersistenceGateway>) -> (RefreshJob, Arc<FeedStore>) {
    let store = Arc::new(FeedStore::new());
    let feed = client.feed();
    let job = RefreshJob::new(feed, Arc::new(client), gateway, store.clone());
    (job, store)
}

#[tokio::test]
async fn successful_cycle_persists_and_publishes() {
    let gateway = Arc::new(MemoryGateway::new());
    let (job, store) = job_with(
        StaticFetch::new(FeedId::Market, json!({"rice": 32.5})),
        gateway.clone(),
    );

    let outcome = job.run().await;
    assert!(outcome.is_published());

    let snap = store.get(FeedId::Market).expect("snapshot published");
    assert_eq!(snap.payload, json!({"rice": 32.5}));
    assert_eq!(gateway.put_count(FeedId::Market), 1);
    assert!(store.last_error(FeedId::Market).is_none());
}

#[tokio::test]
async fn fetch_failure_leaves_previous_snapshot_servable() {
    let gateway: Arc<dyn PersistenceGateway> = Arc::new(MemoryGateway::new());
    let (job, store) = job_with(FailingFetch(FeedId::Weather), gateway.clone());

    // Seed a previous good snapshot.
    store.publish(Snapshot::fresh(
        FeedId::Weather,
        json!({"temp_c": 21}),
        chrono::Utc::now(),
    ));

    let outcome = job.run().await;
    assert!(matches!(outcome, RefreshOutcome::Failed(_)));

    let snap = store.get(FeedId::Weather).expect("old snapshot still there");
    assert_eq!(snap.payload, json!({"temp_c": 21}));
    assert!(store
        .last_error(FeedId::Weather)
        .unwrap()
        .contains("connection refused"));
}

#[tokio::test]
async fn invalid_payload_is_treated_like_a_failed_fetch() {
    let gateway = Arc::new(MemoryGateway::new());
    // Market payload without a single numeric price.
    let (job, store) = job_with(
        StaticFetch::new(FeedId::Market, json!({"rice": "n/a"})),
        gateway.clone(),
    );

    let outcome = job.run().await;
    assert!(matches!(outcome, RefreshOutcome::Failed(_)));
    assert!(store.get(FeedId::Market).is_none());
    assert_eq!(gateway.put_count(FeedId::Market), 0);
}

#[tokio::test]
async fn persistence_failure_does_not_block_publish() {
    let (job, store) = job_with(
        StaticFetch::new(FeedId::News, json!([{"title": "rain ahead"}])),
        Arc::new(BrokenGateway),
    );

    let outcome = job.run().await;
    assert!(outcome.is_published());

    let snap = store.get(FeedId::News).expect("published despite put failure");
    assert_eq!(snap.payload, json!([{"title": "rain ahead"}]));
    // The persistence failure stays visible for diagnostics.
    assert!(store.last_error(FeedId::News).unwrap().contains("disk full"));
}

#[tokio::test]
async fn cycle_losing_the_monotonicity_race_reports_suppression() {
    let gateway = Arc::new(MemoryGateway::new());
    let (job, store) = job_with(
        StaticFetch::new(FeedId::Market, json!({"rice": 32.5})),
        gateway.clone(),
    );

    // The store already holds a snapshot stamped after this cycle's
    // started_at (clock skew against a seeded value).
    store.publish(Snapshot::fresh(
        FeedId::Market,
        json!({"rice": 40.0}),
        chrono::Utc::now() + chrono::Duration::hours(1),
    ));

    let outcome = job.run().await;
    assert!(matches!(outcome, RefreshOutcome::Suppressed));
    assert!(!outcome.is_published());

    // The newer snapshot was kept.
    let snap = store.get(FeedId::Market).unwrap();
    assert_eq!(snap.payload, json!({"rice": 40.0}));
}

#[tokio::test]
async fn overlapping_run_is_skipped_without_a_second_fetch() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let client = GatedFetch {
        feed: FeedId::Market,
        started: started.clone(),
        release: release.clone(),
        calls: calls.clone(),
    };
    let store = Arc::new(FeedStore::new());
    let job = Arc::new(RefreshJob::new(
        FeedId::Market,
        Arc::new(client),
        Arc::new(MemoryGateway::new()),
        store.clone(),
    ));

    let first = {
        let job = job.clone();
        tokio::spawn(async move { job.run().await })
    };
    started.notified().await;

    // Second invocation while the first is held in flight.
    let second = job.run().await;
    assert!(second.is_skipped());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    release.notify_one();
    let first = first.await.unwrap();
    assert!(first.is_published());
    assert!(store.get(FeedId::Market).is_some());
}
