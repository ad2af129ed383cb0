// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;

use crate::feed::{FeedId, FeedStatus};
use crate::query::QueryService;
use crate::store::FeedStore;

#[derive(Clone)]
pub struct AppState {
    pub query: Arc<QueryService>,
    pub store: Arc<FeedStore>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/{feed}", get(get_feed))
        .route("/debug/feeds", get(debug_feeds))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn get_feed(State(state): State<AppState>, Path(feed): Path<String>) -> Response {
    let Ok(feed) = feed.parse::<FeedId>() else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "unknown feed"})),
        )
            .into_response();
    };

    let view = state.query.get_snapshot(feed).await;
    let status = match view.status {
        FeedStatus::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(view)).into_response()
}

#[derive(serde::Serialize)]
struct FeedDebug {
    feed: FeedId,
    has_snapshot: bool,
    fetched_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Operator view of per-feed state, including last refresh errors that the
/// read API deliberately hides.
async fn debug_feeds(State(state): State<AppState>) -> Json<Vec<FeedDebug>> {
    let out = FeedId::ALL
        .iter()
        .map(|&feed| FeedDebug {
            feed,
            has_snapshot: state.store.get(feed).is_some(),
            fetched_at: state.store.fetched_at(feed),
            last_error: state.store.last_error(feed),
        })
        .collect();
    Json(out)
}
