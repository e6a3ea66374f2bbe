//! Snapshot assembly and publication
//!
//! One immutable [`Snapshot`] is assembled per successful tick from the
//! engine outputs plus KPIs, and replaces the previous one wholesale in
//! the shared [`SnapshotStore`]. Series are serialized in the
//! `{index, values}` / `{index, data}` form the frontend consumes; empty
//! series serialize as `{index: [], values: []}`, never as absent keys.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::{calculate_cumulative, Frames};
use crate::types::Candle;

/// Timestamp format used for series indexes
const INDEX_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A time-indexed scalar series in serialized form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesJson {
    pub index: Vec<String>,
    pub values: Vec<f64>,
}

/// Column-oriented OHLC values of a candle series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OhlcColumns {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
}

/// A time-indexed OHLC frame in serialized form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameJson {
    pub index: Vec<String>,
    pub data: OhlcColumns,
}

/// Headline KPIs published with every snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    /// Total buy + sell volume over the retained window
    pub volume_24h: f64,
    /// Retained-window trade count per minute of uptime
    pub trades_per_min: f64,
    /// Close of the most recent CVD candle
    pub cvd_net: f64,
    /// Most recent signal value
    pub last_signal: i64,
    pub uptime_sec: i64,
}

/// Immutable aggregate of all derived series plus KPIs.
///
/// `timestamp` is `None` only in the empty-state sentinel served before
/// the first successful tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: Option<String>,
    pub price_ohlc: FrameJson,
    pub cvd_ohlc: FrameJson,
    pub ratio: SeriesJson,
    pub signals: SeriesJson,
    pub vol_buy: SeriesJson,
    pub vol_sell: SeriesJson,
    pub cumulative_segments: Vec<SeriesJson>,
    pub kpi: Kpi,
}

/// Shared slot holding the latest published snapshot.
///
/// Consumers always see either the empty sentinel or a complete past
/// publication; there are no partial updates.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<RwLock<Snapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest published snapshot (or the empty sentinel)
    pub async fn get(&self) -> Snapshot {
        self.inner.read().await.clone()
    }

    /// Replace the published snapshot wholesale
    pub async fn publish(&self, snapshot: Snapshot) {
        *self.inner.write().await = snapshot;
    }
}

/// Format a millisecond timestamp for a series index
pub fn format_index_ts(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms) {
        chrono::LocalResult::Single(dt) => dt.format(INDEX_FORMAT).to_string(),
        _ => ms.to_string(),
    }
}

fn frame_json(candles: &[Candle]) -> FrameJson {
    FrameJson {
        index: candles.iter().map(|c| format_index_ts(c.bucket_start)).collect(),
        data: OhlcColumns {
            open: candles.iter().map(|c| c.open).collect(),
            high: candles.iter().map(|c| c.high).collect(),
            low: candles.iter().map(|c| c.low).collect(),
            close: candles.iter().map(|c| c.close).collect(),
        },
    }
}

fn series_json(index: &[i64], values: Vec<f64>) -> SeriesJson {
    SeriesJson {
        index: index.iter().map(|&ts| format_index_ts(ts)).collect(),
        values,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Assemble one snapshot from engine frames and session context.
///
/// Pure with respect to its arguments: the same frames, counts and clock
/// values always produce an identical snapshot.
pub fn assemble_snapshot(
    frames: &Frames,
    trade_count: usize,
    session_start_ms: i64,
    now_ms: i64,
) -> Snapshot {
    // Ratio rides the price-candle index; signals and volume ride the
    // contiguous grid, so silent buckets serialize as explicit zero rows.
    let index = frames.index();
    let segments = calculate_cumulative(&frames.grid, &frames.signals);

    let volume_24h: f64 =
        frames.vol_buy.iter().sum::<f64>() + frames.vol_sell.iter().sum::<f64>();
    let uptime_sec = (now_ms - session_start_ms) / 1000;
    let trades_per_min = if uptime_sec > 0 {
        trade_count as f64 / (uptime_sec as f64 / 60.0)
    } else {
        0.0
    };
    let cvd_net = frames.cvd.last().map(|c| c.close).unwrap_or(0.0);
    let last_signal = frames.signals.last().copied().unwrap_or(0);

    let timestamp = match Utc.timestamp_millis_opt(now_ms) {
        chrono::LocalResult::Single(dt) => Some(dt.to_rfc3339()),
        _ => None,
    };

    Snapshot {
        timestamp,
        price_ohlc: frame_json(&frames.price),
        cvd_ohlc: frame_json(&frames.cvd),
        ratio: series_json(&index, frames.ratio.clone()),
        signals: series_json(&frames.grid, frames.signals.iter().map(|&s| s as f64).collect()),
        vol_buy: series_json(&frames.grid, frames.vol_buy.clone()),
        vol_sell: series_json(&frames.grid, frames.vol_sell.clone()),
        cumulative_segments: segments
            .iter()
            .map(|seg| SeriesJson {
                index: seg.points.iter().map(|p| format_index_ts(p.ts)).collect(),
                values: seg.points.iter().map(|p| p.value).collect(),
            })
            .collect(),
        kpi: Kpi {
            volume_24h: round2(volume_24h),
            trades_per_min: round1(trades_per_min),
            cvd_net: round2(cvd_net),
            last_signal,
            uptime_sec,
        },
    }
}
