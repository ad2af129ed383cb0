// src/fetch.rs
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde_json::Value;

use crate::feed::FeedId;

/// Abstract upstream data source for one feed: returns structured data or
/// fails. The concrete provider and protocol are behind this seam.
#[async_trait]
pub trait FetchClient: Send + Sync {
    async fn fetch(&self) -> Result<Value>;
    fn feed(&self) -> FeedId;
}

/// JSON-over-HTTP provider with a per-request timeout.
pub struct HttpFetchClient {
    feed: FeedId,
    url: String,
    client: reqwest::Client,
}

impl HttpFetchClient {
    pub fn new(feed: FeedId, url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self {
            feed,
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl FetchClient for HttpFetchClient {
    async fn fetch(&self) -> Result<Value> {
        let t0 = std::time::Instant::now();

        let resp = match self.client.get(&self.url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = ?e, feed = %self.feed, "provider http error");
                counter!("fetch_errors_total", "feed" => self.feed.as_str()).increment(1);
                return Err(e).with_context(|| format!("{} http get", self.feed));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            counter!("fetch_errors_total", "feed" => self.feed.as_str()).increment(1);
            return Err(anyhow!("{} provider returned {status}", self.feed));
        }

        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("{} provider body is not json", self.feed))?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("refresh_fetch_ms", "feed" => self.feed.as_str()).record(ms);
        Ok(body)
    }

    fn feed(&self) -> FeedId {
        self.feed
    }
}
