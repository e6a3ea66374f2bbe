//! CvdScope entrypoint
//!
//! Wires the trade feed, the aggregation loop and the HTTP API together
//! around one shared trade buffer and one snapshot store.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cvdscope::aggregator::Aggregator;
use cvdscope::buffer::TradeBuffer;
use cvdscope::config::AppConfig;
use cvdscope::engine::FrameParams;
use cvdscope::feed::TradeFeed;
use cvdscope::persistence::CsvSink;
use cvdscope::server::{self, AppState};
use cvdscope::snapshot::SnapshotStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(config = %config.digest(), "Starting CvdScope");

    let session_start_ms = Utc::now().timestamp_millis();
    let buffer = Arc::new(TradeBuffer::new());
    let store = SnapshotStore::new();
    let sink = CsvSink::new(&config.persistence).context("Failed to set up CSV persistence")?;

    let feed = TradeFeed::new(&config.feed, Arc::clone(&buffer));
    tokio::spawn(feed.run());

    let aggregator = Aggregator::new(
        Arc::clone(&buffer),
        store.clone(),
        sink,
        FrameParams::from(&config.engine),
        &config.aggregator,
        session_start_ms,
    );
    tokio::spawn(aggregator.run());

    let state = AppState {
        store,
        buffer,
        session_start_ms,
        stream_secs: config.aggregator.tick_secs,
    };
    server::serve(&config.server.bind, state).await
}
