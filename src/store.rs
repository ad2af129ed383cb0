// src/store.rs
//! # FeedStore
//! Owns the last-known-good snapshot for each feed.
//!
//! One slot per `FeedId`, each behind its own `RwLock`, so readers run
//! concurrently with each other and with the writer, and a slow feed never
//! stalls another. Publishing swaps an `Arc`, so a reader either sees the
//! old snapshot or the new one in full, never a torn value.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::feed::{FeedId, Snapshot};

#[derive(Debug, Default)]
struct FeedState {
    current: Option<Arc<Snapshot>>,
    last_error: Option<String>,
}

#[derive(Debug)]
pub struct FeedStore {
    slots: [RwLock<FeedState>; FeedId::ALL.len()],
}

impl Default for FeedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedStore {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| RwLock::new(FeedState::default())),
        }
    }

    /// Replace the current snapshot iff it is not older than what is already
    /// published. An out-of-order completion is discarded and logged, which
    /// keeps `fetched_at` monotonically non-decreasing per feed.
    ///
    /// Returns `true` when the snapshot was accepted.
    pub fn publish(&self, snapshot: Snapshot) -> bool {
        let feed = snapshot.feed;
        let mut state = self.slots[feed.index()]
            .write()
            .expect("feed store lock poisoned");

        if let Some(current) = &state.current {
            if snapshot.fetched_at < current.fetched_at {
                tracing::warn!(
                    feed = %feed,
                    incoming = %snapshot.fetched_at,
                    current = %current.fetched_at,
                    "suppressed overwrite by older snapshot"
                );
                counter!("publish_suppressed_total", "feed" => feed.as_str()).increment(1);
                return false;
            }
        }

        state.current = Some(Arc::new(snapshot));
        state.last_error = None;
        true
    }

    /// Current snapshot by shared reference. `None` means the feed was never
    /// fetched (and never seeded from persistence).
    pub fn get(&self, feed: FeedId) -> Option<Arc<Snapshot>> {
        self.slots[feed.index()]
            .read()
            .expect("feed store lock poisoned")
            .current
            .clone()
    }

    /// Timestamp of the current snapshot, for diagnostics.
    pub fn fetched_at(&self, feed: FeedId) -> Option<DateTime<Utc>> {
        self.get(feed).map(|s| s.fetched_at)
    }

    /// Record the most recent refresh failure for a feed. Diagnostics only;
    /// never exposed on the read API.
    pub fn record_error(&self, feed: FeedId, message: impl Into<String>) {
        let mut state = self.slots[feed.index()]
            .write()
            .expect("feed store lock poisoned");
        state.last_error = Some(message.into());
    }

    pub fn last_error(&self, feed: FeedId) -> Option<String> {
        self.slots[feed.index()]
            .read()
            .expect("feed store lock poisoned")
            .last_error
            .clone()
    }
}
