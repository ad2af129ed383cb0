//! agrifeed — Binary Entrypoint
//! Boots the refresh scheduler and the Axum read API, wiring shared state.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use agrifeed::api::{create_router, AppState};
use agrifeed::config::AppConfig;
use agrifeed::feed::FeedId;
use agrifeed::fetch::{FetchClient, HttpFetchClient};
use agrifeed::metrics::Metrics;
use agrifeed::persist::{JsonFileGateway, MemoryGateway, PersistenceGateway};
use agrifeed::query::QueryService;
use agrifeed::refresh::RefreshJob;
use agrifeed::scheduler::Scheduler;
use agrifeed::store::FeedStore;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agrifeed=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load().context("loading configuration")?;
    let metrics = Metrics::init();

    let store = Arc::new(FeedStore::new());
    let gateway: Arc<dyn PersistenceGateway> = match &cfg.data_dir {
        Some(dir) => Arc::new(JsonFileGateway::new(dir)?),
        None => {
            tracing::warn!("no data_dir configured, snapshots are not persisted");
            Arc::new(MemoryGateway::new())
        }
    };

    // One job per feed that has a provider endpoint configured.
    let mut entries = Vec::new();
    for spec in cfg.schedule_specs() {
        let Some(url) = cfg.feed(spec.feed).url.clone() else {
            tracing::warn!(feed = %spec.feed, "no provider url configured, feed not scheduled");
            continue;
        };
        let client: Arc<dyn FetchClient> =
            Arc::new(HttpFetchClient::new(spec.feed, url, cfg.fetch_timeout())?);
        let job = Arc::new(RefreshJob::new(
            spec.feed,
            client,
            gateway.clone(),
            store.clone(),
        ));
        entries.push((spec, job));
    }
    let scheduler = Scheduler::start(entries);

    let query = Arc::new(QueryService::new(
        store.clone(),
        gateway.clone(),
        cfg.freshness(),
    ));
    let app = create_router(AppState {
        query,
        store: store.clone(),
    })
    .merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.bind)
        .await
        .with_context(|| format!("binding {}", cfg.bind))?;
    tracing::info!(bind = %cfg.bind, feeds = FeedId::ALL.len(), "agrifeed up");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("http server")?;

    scheduler.shutdown(cfg.shutdown_grace()).await;
    Ok(())
}
