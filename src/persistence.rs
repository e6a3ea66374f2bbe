//! CSV session persistence
//!
//! Appends raw trades, closed candles, signal rows and KPI snapshots to
//! per-session CSV files for offline analysis. Each run gets its own
//! session directory. Rows are appended incrementally across ticks:
//! the sink remembers the last timestamps it wrote so the full-history
//! recompute never duplicates output.

use anyhow::{Context, Result};
use chrono::Utc;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::PersistenceConfig;
use crate::engine::Frames;
use crate::snapshot::{format_index_ts, Snapshot};
use crate::types::Trade;

const TRADES_FILE: &str = "trades_raw.csv";
const CANDLES_FILE: &str = "candles.csv";
const SIGNALS_FILE: &str = "signals.csv";
const KPI_FILE: &str = "kpi_snapshots.csv";

#[derive(Debug, Serialize)]
struct TradeRow {
    ts: String,
    price: f64,
    vol: f64,
    side: String,
}

#[derive(Debug, Serialize)]
struct CandleRow {
    ts: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    cvd_close: f64,
}

#[derive(Debug, Serialize)]
struct SignalRow {
    ts: String,
    ratio: f64,
    signal: i64,
}

#[derive(Debug, Serialize)]
struct KpiRow {
    ts: String,
    volume_24h: f64,
    trades_per_min: f64,
    cvd_net: f64,
    last_signal: i64,
    uptime_sec: i64,
}

/// Append-only CSV writer for one session.
///
/// A disabled sink is a no-op so callers never need to branch.
#[derive(Debug)]
pub struct CsvSink {
    enabled: bool,
    session_dir: PathBuf,
    last_trade_ts: i64,
    last_candle_ts: i64,
}

impl CsvSink {
    pub fn new(cfg: &PersistenceConfig) -> Result<Self> {
        if !cfg.csv_enabled {
            return Ok(Self {
                enabled: false,
                session_dir: PathBuf::new(),
                last_trade_ts: i64::MIN,
                last_candle_ts: i64::MIN,
            });
        }

        let session_dir = Path::new(&cfg.data_dir)
            .join(format!("session_{}", Utc::now().format("%Y%m%d_%H%M%S")));
        fs::create_dir_all(&session_dir)
            .with_context(|| format!("Failed to create session dir {}", session_dir.display()))?;
        info!(dir = %session_dir.display(), "CSV persistence enabled");

        Ok(Self {
            enabled: true,
            session_dir,
            last_trade_ts: i64::MIN,
            last_candle_ts: i64::MIN,
        })
    }

    /// Append this tick's new rows to all session files
    pub fn record_tick(
        &mut self,
        trades: &[Trade],
        frames: &Frames,
        snapshot: &Snapshot,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.append_trades(trades)?;
        self.append_candles(frames)?;
        self.append_kpi(snapshot)?;
        Ok(())
    }

    /// Raw trades newer than anything already written
    fn append_trades(&mut self, trades: &[Trade]) -> Result<()> {
        let mut fresh: Vec<&Trade> = trades.iter().filter(|t| t.ts > self.last_trade_ts).collect();
        if fresh.is_empty() {
            return Ok(());
        }
        fresh.sort_by_key(|t| t.ts);

        let rows: Vec<TradeRow> = fresh
            .iter()
            .map(|t| TradeRow {
                ts: format_index_ts(t.ts),
                price: t.price,
                vol: t.volume,
                side: t.side.to_string(),
            })
            .collect();
        self.append(TRADES_FILE, &rows)?;

        if let Some(last) = fresh.last() {
            self.last_trade_ts = last.ts;
        }
        Ok(())
    }

    /// Closed candles plus their signal rows. The final candle is still
    /// forming and is skipped until a later bucket closes it.
    fn append_candles(&mut self, frames: &Frames) -> Result<()> {
        let n = frames.price.len();
        if n < 2 {
            return Ok(());
        }

        let mut candle_rows = Vec::new();
        let mut signal_rows = Vec::new();
        for i in 0..n - 1 {
            let candle = frames.price[i];
            if candle.bucket_start <= self.last_candle_ts {
                continue;
            }
            candle_rows.push(CandleRow {
                ts: format_index_ts(candle.bucket_start),
                open: candle.open,
                high: candle.high,
                low: candle.low,
                close: candle.close,
                cvd_close: frames.cvd[i].close,
            });
            // Signals are grid-indexed, so silent buckets sit between
            // candles; look the signal up by bucket timestamp.
            signal_rows.push(SignalRow {
                ts: format_index_ts(candle.bucket_start),
                ratio: frames.ratio[i],
                signal: frames.signal_at(candle.bucket_start).unwrap_or(0),
            });
        }
        if candle_rows.is_empty() {
            return Ok(());
        }

        self.append(CANDLES_FILE, &candle_rows)?;
        self.append(SIGNALS_FILE, &signal_rows)?;
        self.last_candle_ts = frames.price[n - 2].bucket_start;
        Ok(())
    }

    fn append_kpi(&self, snapshot: &Snapshot) -> Result<()> {
        let ts = snapshot.timestamp.clone().unwrap_or_default();
        let row = KpiRow {
            ts,
            volume_24h: snapshot.kpi.volume_24h,
            trades_per_min: snapshot.kpi.trades_per_min,
            cvd_net: snapshot.kpi.cvd_net,
            last_signal: snapshot.kpi.last_signal,
            uptime_sec: snapshot.kpi.uptime_sec,
        };
        self.append(KPI_FILE, &[row])
    }

    fn append<R: Serialize>(&self, file: &str, rows: &[R]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let path = self.session_dir.join(file);
        let write_headers = !path.exists();
        let handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut writer = WriterBuilder::new().has_headers(write_headers).from_writer(handle);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
