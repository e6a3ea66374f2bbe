//! HTTP API
//!
//! Serves the latest snapshot to presentation clients: a pull endpoint,
//! an SSE stream that re-emits the latest snapshot at the tick cadence
//! (latest-only, no per-subscriber backlog), and a health probe.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use futures_util::stream::Stream;
use futures_util::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::buffer::TradeBuffer;
use crate::snapshot::SnapshotStore;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: SnapshotStore,
    pub buffer: Arc<TradeBuffer>,
    pub session_start_ms: i64,
    /// Re-emit cadence for the SSE stream, matching the aggregator tick
    pub stream_secs: u64,
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/data", get(get_data))
        .route("/api/stream", get(stream_data))
        .route("/api/health", get(get_health))
        .with_state(state)
        // CORS for the chart frontend
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// GET /api/data - latest published snapshot (empty sentinel before the
/// first successful tick)
async fn get_data(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.get().await)
}

/// GET /api/stream - SSE stream of the latest snapshot at tick cadence
async fn stream_data(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let store = state.store.clone();
    let interval = tokio::time::interval(Duration::from_secs(state.stream_secs));
    let stream = IntervalStream::new(interval).then(move |_| {
        let store = store.clone();
        async move {
            let snapshot = store.get().await;
            Event::default().json_data(&snapshot)
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_sec: i64,
    trades_count: usize,
}

/// GET /api/health - liveness plus basic ingest stats
async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    let uptime_sec = (Utc::now().timestamp_millis() - state.session_start_ms) / 1000;
    let trades_count = state.buffer.len().await;
    Json(HealthResponse {
        status: "ok",
        uptime_sec,
        trades_count,
    })
}

/// Bind and serve the API until shutdown
pub async fn serve(bind: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {bind}"))?;
    info!(addr = %bind, "HTTP API listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    info!("Shutdown signal received");
}
