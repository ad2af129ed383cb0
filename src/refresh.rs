// src/refresh.rs
//! One refresh cycle per feed: fetch, validate, persist (best-effort),
//! publish. Every failure is caught here and recorded; nothing propagates
//! to the scheduler, so one feed's broken provider never touches another.

use std::sync::Arc;

use metrics::{counter, gauge};

use crate::error::{RefreshError, RefreshOutcome};
use crate::feed::{validate_payload, FeedId, Snapshot};
use crate::fetch::FetchClient;
use crate::persist::PersistenceGateway;
use crate::store::FeedStore;

pub struct RefreshJob {
    feed: FeedId,
    client: Arc<dyn FetchClient>,
    gateway: Arc<dyn PersistenceGateway>,
    store: Arc<FeedStore>,
    /// Held for the duration of a run; `try_lock` failing means a prior run
    /// is still in flight and this tick is skipped, not queued.
    busy: tokio::sync::Mutex<()>,
}

impl RefreshJob {
    pub fn new(
        feed: FeedId,
        client: Arc<dyn FetchClient>,
        gateway: Arc<dyn PersistenceGateway>,
        store: Arc<FeedStore>,
    ) -> Self {
        Self {
            feed,
            client,
            gateway,
            store,
            busy: tokio::sync::Mutex::new(()),
        }
    }

    pub fn feed(&self) -> FeedId {
        self.feed
    }

    /// Execute one cycle. At most one run per feed is in flight at a time;
    /// overlapping invocations return `Skipped` immediately without calling
    /// the fetch client.
    pub async fn run(&self) -> RefreshOutcome {
        let Ok(_guard) = self.busy.try_lock() else {
            tracing::info!(feed = %self.feed, "refresh tick skipped, previous run in flight");
            counter!("refresh_skipped_total", "feed" => self.feed.as_str()).increment(1);
            return RefreshOutcome::Skipped;
        };

        counter!("refresh_runs_total", "feed" => self.feed.as_str()).increment(1);
        let started_at = chrono::Utc::now();

        let payload = match self.client.fetch().await {
            Ok(payload) => payload,
            Err(e) => {
                return self.fail(RefreshError::Fetch {
                    feed: self.feed,
                    source: e,
                });
            }
        };

        if let Err(e) = validate_payload(self.feed, &payload) {
            return self.fail(RefreshError::Validation(e));
        }

        let snapshot = Snapshot::fresh(self.feed, payload, started_at);

        // Durability is best-effort; the in-memory cache is authoritative
        // for serving, so a put failure is logged and publish proceeds.
        let persist_err = self
            .gateway
            .put(self.feed, &snapshot)
            .await
            .err()
            .map(|e| RefreshError::Persistence {
                feed: self.feed,
                source: e,
            });

        let published = self.store.publish(snapshot);
        if published {
            gauge!("feed_last_refresh_ts", "feed" => self.feed.as_str())
                .set(started_at.timestamp() as f64);
            tracing::info!(feed = %self.feed, fetched_at = %started_at, "snapshot published");
        }

        if let Some(err) = persist_err {
            tracing::warn!(feed = %self.feed, error = %err, "snapshot not persisted");
            counter!("refresh_errors_total", "feed" => self.feed.as_str(), "kind" => err.kind())
                .increment(1);
            self.store.record_error(self.feed, err.to_string());
        }

        if published {
            RefreshOutcome::Published
        } else {
            RefreshOutcome::Suppressed
        }
    }

    fn fail(&self, err: RefreshError) -> RefreshOutcome {
        tracing::warn!(feed = %self.feed, kind = err.kind(), error = %err, "refresh cycle failed");
        counter!("refresh_errors_total", "feed" => self.feed.as_str(), "kind" => err.kind())
            .increment(1);
        self.store.record_error(self.feed, err.to_string());
        RefreshOutcome::Failed(err)
    }
}
