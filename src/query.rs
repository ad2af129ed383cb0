// src/query.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::feed::{FeedId, FeedStatus, Snapshot};
use crate::persist::PersistenceGateway;
use crate::store::FeedStore;

/// What a reader gets back: the last published payload with a freshness
/// label, or an explicit `unavailable` — never a null/undefined ambiguity.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotView {
    pub feed: FeedId,
    pub status: FeedStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl SnapshotView {
    fn unavailable(feed: FeedId) -> Self {
        Self {
            feed,
            status: FeedStatus::Unavailable,
            payload: None,
            fetched_at: None,
        }
    }
}

/// Read-only facade over the FeedStore. Never blocks on an in-flight
/// refresh: it reads the last-published value only, with a single gateway
/// read as cold-start fallback.
pub struct QueryService {
    store: Arc<FeedStore>,
    gateway: Arc<dyn PersistenceGateway>,
    freshness: Duration,
}

impl QueryService {
    pub fn new(
        store: Arc<FeedStore>,
        gateway: Arc<dyn PersistenceGateway>,
        freshness: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            freshness,
        }
    }

    pub async fn get_snapshot(&self, feed: FeedId) -> SnapshotView {
        if let Some(snapshot) = self.store.get(feed) {
            return self.view(&snapshot);
        }

        // Cold start: one best-effort read through the durable store. A hit
        // is seeded back into the FeedStore (the monotonic publish guard
        // makes racing with a concurrent refresh safe) so later reads are
        // memory hits.
        match self.gateway.get(feed).await {
            Ok(Some(mut snapshot)) => {
                snapshot.status = FeedStatus::Stale;
                let view = self.view(&snapshot);
                self.store.publish(snapshot);
                view
            }
            Ok(None) => SnapshotView::unavailable(feed),
            Err(e) => {
                tracing::warn!(feed = %feed, error = ?e, "cold-start persistence read failed");
                SnapshotView::unavailable(feed)
            }
        }
    }

    /// Relabel against the freshness threshold at read time; the stored
    /// snapshot itself is never mutated.
    fn view(&self, snapshot: &Snapshot) -> SnapshotView {
        let age = Utc::now().signed_duration_since(snapshot.fetched_at);
        let status = if age.num_seconds() > self.freshness.as_secs() as i64 {
            FeedStatus::Stale
        } else {
            snapshot.status
        };
        SnapshotView {
            feed: snapshot.feed,
            status,
            payload: Some(snapshot.payload.clone()),
            fetched_at: Some(snapshot.fetched_at),
        }
    }
}
