// src/error.rs
use crate::feed::FeedId;

/// A payload that parsed but does not match the feed's minimal schema.
#[derive(Debug, thiserror::Error)]
#[error("invalid {feed} payload: {reason}")]
pub struct ValidationError {
    pub feed: FeedId,
    pub reason: String,
}

impl ValidationError {
    pub fn new(feed: FeedId, reason: impl Into<String>) -> Self {
        Self {
            feed,
            reason: reason.into(),
        }
    }
}

/// Failure of one refresh cycle. All variants are non-fatal; the next
/// scheduled tick is the retry.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// Network error, timeout, or bad upstream status.
    #[error("fetch failed for {feed}: {source}")]
    Fetch {
        feed: FeedId,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Durable-store read/write failure. Best-effort: a put failure is
    /// logged at the job boundary and never blocks publishing.
    #[error("persistence failed for {feed}: {source}")]
    Persistence {
        feed: FeedId,
        #[source]
        source: anyhow::Error,
    },
}

impl RefreshError {
    pub fn feed(&self) -> FeedId {
        match self {
            RefreshError::Fetch { feed, .. } => *feed,
            RefreshError::Validation(e) => e.feed,
            RefreshError::Persistence { feed, .. } => *feed,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RefreshError::Fetch { .. } => "fetch",
            RefreshError::Validation(_) => "validation",
            RefreshError::Persistence { .. } => "persistence",
        }
    }
}

/// Result of invoking a feed's RefreshJob once.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// A new snapshot was published into the FeedStore.
    Published,
    /// The cycle completed but the FeedStore already held a newer snapshot,
    /// so the monotonicity guard discarded this one.
    Suppressed,
    /// A prior run for the same feed was still in flight; this invocation
    /// returned immediately without fetching. Informational, not a failure.
    Skipped,
    Failed(RefreshError),
}

impl RefreshOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, RefreshOutcome::Published)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RefreshOutcome::Skipped)
    }
}
