// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod metrics;
pub mod persist;
pub mod query;
pub mod refresh;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::error::{RefreshError, RefreshOutcome};
pub use crate::feed::{FeedId, FeedStatus, Snapshot};
pub use crate::query::{QueryService, SnapshotView};
pub use crate::scheduler::{ScheduleSpec, Scheduler};
pub use crate::store::FeedStore;
