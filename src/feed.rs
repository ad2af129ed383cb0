// src/feed.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Closed set of feeds this service refreshes. Not extensible at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedId {
    Weather,
    Market,
    News,
    Alerts,
    CropPlan,
}

impl FeedId {
    pub const ALL: [FeedId; 5] = [
        FeedId::Weather,
        FeedId::Market,
        FeedId::News,
        FeedId::Alerts,
        FeedId::CropPlan,
    ];

    /// Stable name used in URLs, persistence keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedId::Weather => "weather",
            FeedId::Market => "market",
            FeedId::News => "news",
            FeedId::Alerts => "alerts",
            FeedId::CropPlan => "crop-plan",
        }
    }

    /// Index into fixed-size per-feed arrays (FeedStore slots).
    pub(crate) fn index(&self) -> usize {
        match self {
            FeedId::Weather => 0,
            FeedId::Market => 1,
            FeedId::News => 2,
            FeedId::Alerts => 3,
            FeedId::CropPlan => 4,
        }
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weather" => Ok(FeedId::Weather),
            "market" => Ok(FeedId::Market),
            "news" => Ok(FeedId::News),
            "alerts" => Ok(FeedId::Alerts),
            // crop_plan accepted for config keys, crop-plan for URLs
            "crop-plan" | "crop_plan" => Ok(FeedId::CropPlan),
            _ => Err(()),
        }
    }
}

/// Freshness label attached to a served snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    Fresh,
    Stale,
    Unavailable,
}

/// Immutable cached result of one successful refresh cycle.
///
/// Once published into the FeedStore a snapshot is never mutated; a later
/// refresh builds a new one that atomically replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub feed: FeedId,
    pub payload: Value,
    pub fetched_at: DateTime<Utc>,
    pub status: FeedStatus,
}

impl Snapshot {
    pub fn fresh(feed: FeedId, payload: Value, fetched_at: DateTime<Utc>) -> Self {
        Self {
            feed,
            payload,
            fetched_at,
            status: FeedStatus::Fresh,
        }
    }
}

/// Minimal per-feed shape check. An invalid payload is treated the same as
/// a failed fetch: the previous good snapshot stays servable.
pub fn validate_payload(feed: FeedId, payload: &Value) -> Result<(), ValidationError> {
    match feed {
        FeedId::Market => {
            // Market data must carry at least one commodity price.
            let has_price = payload
                .as_object()
                .is_some_and(|m| m.values().any(|v| v.is_number()));
            if !has_price {
                return Err(ValidationError::new(
                    feed,
                    "market payload has no numeric commodity price",
                ));
            }
        }
        FeedId::Weather => {
            if !payload.as_object().is_some_and(|m| !m.is_empty()) {
                return Err(ValidationError::new(feed, "weather payload is not a non-empty object"));
            }
        }
        FeedId::News | FeedId::Alerts => {
            // Item feeds: an array (possibly empty) or an object with an items array.
            let ok = payload.is_array()
                || payload
                    .as_object()
                    .is_some_and(|m| m.get("items").is_some_and(Value::is_array));
            if !ok {
                return Err(ValidationError::new(feed, "expected an item list"));
            }
        }
        FeedId::CropPlan => {
            if !payload.is_object() {
                return Err(ValidationError::new(feed, "crop plan payload is not an object"));
            }
        }
    }
    Ok(())
}
