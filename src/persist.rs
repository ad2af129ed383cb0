// src/persist.rs
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::feed::{FeedId, Snapshot};

/// Abstract durable backing store. Writes are best-effort: a failed `put`
/// is logged at the job boundary and never blocks publishing to the
/// in-memory cache, which stays authoritative for serving.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn put(&self, feed: FeedId, snapshot: &Snapshot) -> Result<()>;
    async fn get(&self, feed: FeedId) -> Result<Option<Snapshot>>;
}

/// One JSON file per feed under `data_dir`. Writes go through a temp file
/// and rename so a crash mid-write never leaves a half-written snapshot.
pub struct JsonFileGateway {
    dir: PathBuf,
}

impl JsonFileGateway {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating data dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, feed: FeedId) -> PathBuf {
        self.dir.join(format!("{}.json", feed.as_str()))
    }
}

#[async_trait]
impl PersistenceGateway for JsonFileGateway {
    async fn put(&self, feed: FeedId, snapshot: &Snapshot) -> Result<()> {
        let path = self.path_for(feed);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(snapshot).context("serializing snapshot")?;
        std::fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }

    async fn get(&self, feed: FeedId) -> Result<Option<Snapshot>> {
        let path = self.path_for(feed);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(snapshot))
    }
}

/// In-memory gateway. Used in tests and as a null store when no data dir is
/// configured; records each `put` so call counts can be asserted.
#[derive(Default)]
pub struct MemoryGateway {
    inner: Mutex<HashMap<FeedId, Snapshot>>,
    puts: Mutex<Vec<FeedId>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load a snapshot, e.g. to model a warm durable store on cold start.
    pub fn seed(&self, snapshot: Snapshot) {
        self.inner
            .lock()
            .expect("memory gateway mutex poisoned")
            .insert(snapshot.feed, snapshot);
    }

    pub fn put_count(&self, feed: FeedId) -> usize {
        self.puts
            .lock()
            .expect("memory gateway mutex poisoned")
            .iter()
            .filter(|f| **f == feed)
            .count()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn put(&self, feed: FeedId, snapshot: &Snapshot) -> Result<()> {
        self.inner
            .lock()
            .expect("memory gateway mutex poisoned")
            .insert(feed, snapshot.clone());
        self.puts
            .lock()
            .expect("memory gateway mutex poisoned")
            .push(feed);
        Ok(())
    }

    async fn get(&self, feed: FeedId) -> Result<Option<Snapshot>> {
        Ok(self
            .inner
            .lock()
            .expect("memory gateway mutex poisoned")
            .get(&feed)
            .cloned())
    }
}
