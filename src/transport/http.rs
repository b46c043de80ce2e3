//! Read-only HTTP API: health, stats and one-shot search.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::broker::Relay;
use crate::broker::engine::lock;
use crate::broker::event::SearchItem;
use crate::broker::stats::{GlobalStats, TopicStats};
use crate::upstream::{Upstream, search_once};
use crate::utils::error::RelayError;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Mutex<Relay>>,
    pub upstream: Arc<dyn Upstream>,
    pub search_limit: usize,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/stats", get(server_stats))
        .route("/room/{topic}/stats", get(room_stats))
        .route("/api/{term}/tweets", get(search))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(addr: String, state: AppState) -> Result<(), RelayError> {
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| RelayError::Bind {
            addr: addr.clone(),
            source,
        })?;

    info!("HTTP server listening on http://{addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "health": "OK" }))
}

async fn server_stats(State(state): State<AppState>) -> Json<GlobalStats> {
    Json(lock(&state.relay).global_stats())
}

async fn room_stats(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Json<TopicStats>, StatusCode> {
    lock(&state.relay)
        .topic_stats(&topic)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn search(
    State(state): State<AppState>,
    Path(term): Path<String>,
) -> Result<Json<Vec<SearchItem>>, StatusCode> {
    if term.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }
    let items = search_once(state.upstream.as_ref(), &term, state.search_limit).await;
    Ok(Json(items))
}
