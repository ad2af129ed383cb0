// src/config.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::feed::FeedId;
use crate::scheduler::ScheduleSpec;

const ENV_PATH: &str = "AGRIFEED_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/agrifeed.toml";

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_freshness() -> u64 {
    900
}
fn default_fetch_timeout() -> u64 {
    10
}
fn default_shutdown_grace() -> u64 {
    5
}
fn default_interval() -> u64 {
    600
}

/// Schedule + provider endpoint for one feed. `url` is optional so the
/// service can run (and be tested) without live providers configured.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub jitter_secs: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            jitter_secs: None,
            url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FeedsConfig {
    #[serde(default)]
    weather: FeedConfig,
    #[serde(default)]
    market: FeedConfig,
    #[serde(default)]
    news: FeedConfig,
    #[serde(default)]
    alerts: FeedConfig,
    #[serde(default)]
    crop_plan: FeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Snapshot directory for the file gateway; `None` keeps persistence
    /// in-memory only.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_freshness")]
    pub freshness_secs: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
    #[serde(default)]
    feeds: FeedsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config must deserialize via defaults")
    }
}

impl AppConfig {
    /// Load configuration using env var + fallback:
    /// 1) $AGRIFEED_CONFIG_PATH
    /// 2) config/agrifeed.toml
    /// 3) built-in defaults
    pub fn load() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let fallback = PathBuf::from(DEFAULT_PATH);
        if fallback.exists() {
            return Self::load_from(&fallback);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config from {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        for feed in FeedId::ALL {
            if self.feed(feed).interval_secs == 0 {
                return Err(anyhow!("{feed}: interval_secs must be positive"));
            }
        }
        Ok(())
    }

    pub fn feed(&self, feed: FeedId) -> &FeedConfig {
        match feed {
            FeedId::Weather => &self.feeds.weather,
            FeedId::Market => &self.feeds.market,
            FeedId::News => &self.feeds.news,
            FeedId::Alerts => &self.feeds.alerts,
            FeedId::CropPlan => &self.feeds.crop_plan,
        }
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// One spec per feed, in `FeedId::ALL` order.
    pub fn schedule_specs(&self) -> Vec<ScheduleSpec> {
        FeedId::ALL
            .iter()
            .map(|&feed| {
                let fc = self.feed(feed);
                ScheduleSpec {
                    feed,
                    interval: Duration::from_secs(fc.interval_secs),
                    jitter: fc.jitter_secs.map(Duration::from_secs),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_cover_all_feeds() {
        let cfg = AppConfig::default();
        for feed in FeedId::ALL {
            assert_eq!(cfg.feed(feed).interval_secs, 600);
            assert!(cfg.feed(feed).url.is_none());
        }
        assert_eq!(cfg.freshness_secs, 900);
    }

    #[test]
    fn toml_overrides_apply_per_feed() {
        let cfg: AppConfig = toml::from_str(
            r#"
            freshness_secs = 120

            [feeds.market]
            interval_secs = 60
            url = "http://localhost:9000/market"

            [feeds.crop_plan]
            interval_secs = 3600
            jitter_secs = 300
            "#,
        )
        .unwrap();

        assert_eq!(cfg.freshness_secs, 120);
        assert_eq!(cfg.feed(FeedId::Market).interval_secs, 60);
        assert_eq!(
            cfg.feed(FeedId::Market).url.as_deref(),
            Some("http://localhost:9000/market")
        );
        assert_eq!(cfg.feed(FeedId::CropPlan).jitter_secs, Some(300));
        // Untouched feeds keep defaults
        assert_eq!(cfg.feed(FeedId::Weather).interval_secs, 600);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agrifeed.toml");
        fs::write(&path, "[feeds.news]\ninterval_secs = 0\n").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[serial_test::serial]
    #[test]
    fn env_path_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "freshness_secs = 42\n").unwrap();

        std::env::set_var(ENV_PATH, path.display().to_string());
        let cfg = AppConfig::load().unwrap();
        assert_eq!(cfg.freshness_secs, 42);
        std::env::remove_var(ENV_PATH);
    }

    #[test]
    fn schedule_specs_follow_feed_order() {
        let specs = AppConfig::default().schedule_specs();
        let feeds: Vec<FeedId> = specs.iter().map(|s| s.feed).collect();
        assert_eq!(feeds, FeedId::ALL.to_vec());
    }
}
