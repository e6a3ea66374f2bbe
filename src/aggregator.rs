//! Aggregation loop
//!
//! Drives the recompute cadence: every tick it copies the trade buffer,
//! rebuilds all frames from full history, publishes a fresh snapshot and
//! appends to the CSV sinks. A failed tick is logged and the previous
//! snapshot stays authoritative; the cadence never dies. Retention
//! pruning runs every N ticks on the same buffer.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::buffer::TradeBuffer;
use crate::config::AggregatorConfig;
use crate::engine::{build_frames, FrameParams};
use crate::persistence::CsvSink;
use crate::snapshot::{assemble_snapshot, SnapshotStore};

pub struct Aggregator {
    buffer: Arc<TradeBuffer>,
    store: SnapshotStore,
    sink: CsvSink,
    params: FrameParams,
    tick: Duration,
    retention_max_age: Duration,
    retention_check_ticks: u64,
    session_start_ms: i64,
}

impl Aggregator {
    pub fn new(
        buffer: Arc<TradeBuffer>,
        store: SnapshotStore,
        sink: CsvSink,
        params: FrameParams,
        cfg: &AggregatorConfig,
        session_start_ms: i64,
    ) -> Self {
        Self {
            buffer,
            store,
            sink,
            params,
            tick: Duration::from_secs(cfg.tick_secs),
            retention_max_age: Duration::from_secs(cfg.retention_max_age_secs),
            retention_check_ticks: cfg.retention_check_ticks,
            session_start_ms,
        }
    }

    /// Run the aggregation cadence forever
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick_count: u64 = 0;

        info!(
            tick_secs = self.tick.as_secs(),
            retention_secs = self.retention_max_age.as_secs(),
            "Aggregator started"
        );

        loop {
            interval.tick().await;
            tick_count += 1;

            if let Err(e) = self.run_tick().await {
                error!(error = %e, "Aggregation tick failed; previous snapshot retained");
            }

            if tick_count % self.retention_check_ticks == 0 {
                self.prune().await;
            }
        }
    }

    /// One recompute pass. Only the buffer copy happens under the lock;
    /// everything else runs on the local copy.
    async fn run_tick(&mut self) -> Result<()> {
        let trades = self.buffer.snapshot().await;
        if trades.is_empty() {
            debug!("No trades buffered yet; snapshot unchanged");
            return Ok(());
        }

        let now_ms = Utc::now().timestamp_millis();
        let Some(frames) = build_frames(&trades, &self.params) else {
            return Ok(());
        };

        let snapshot = assemble_snapshot(&frames, trades.len(), self.session_start_ms, now_ms);
        self.store.publish(snapshot.clone()).await;
        debug!(
            trades = trades.len(),
            candles = frames.price.len(),
            "Snapshot updated"
        );

        // Persistence failures must not take the published snapshot back.
        if let Err(e) = self
            .sink
            .record_tick(&trades, &frames, &snapshot)
            .context("CSV persistence failed")
        {
            warn!(error = %e, "Skipping CSV output for this tick");
        }

        Ok(())
    }

    async fn prune(&self) {
        let cutoff_ms = Utc::now().timestamp_millis() - self.retention_max_age.as_millis() as i64;
        let stats = self.buffer.prune_older_than(cutoff_ms).await;
        if stats.removed > 0 {
            info!(
                removed = stats.removed,
                kept = stats.kept,
                max_age_secs = self.retention_max_age.as_secs(),
                "Pruned old trades"
            );
        }
    }
}
