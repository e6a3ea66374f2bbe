//! Streaming aggregation engine
//!
//! The full pipeline is recomputed from complete trade history on every
//! tick: resample -> ratio/signal classification -> cumulative
//! segmentation. No state is carried between ticks, which keeps the
//! output correct under trade reordering and backfill at the cost of
//! O(n) work per tick.

pub mod classify;
pub mod cumulative;
pub mod resample;

pub use classify::{classify as classify_signal, ratio_and_signals, CLIP, CVD_EPS, EPS, ROLLING_WINDOW};
pub use cumulative::{calculate_cumulative, CumulativeSegment, SegmentPoint, RESET_EXTREME};
pub use resample::{bucket_start, resample, BucketSeries};

use crate::config::EngineConfig;
use crate::types::{Candle, Trade};

/// Engine parameters resolved from configuration
#[derive(Debug, Clone, Copy)]
pub struct FrameParams {
    pub interval_secs: u64,
    pub shift_sec: u64,
    pub ratio_strong: f64,
    pub ratio_weak: f64,
}

impl From<&EngineConfig> for FrameParams {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            interval_secs: cfg.interval_secs,
            shift_sec: cfg.shift_sec,
            ratio_strong: cfg.ratio_strong,
            ratio_weak: cfg.ratio_weak,
        }
    }
}

/// All per-bucket series derived from one pass over the trade history.
///
/// Two indexes coexist: `price`, `ratio` and (with shifted timestamps)
/// `cvd` cover only trade-bearing buckets, while `signals`, `vol_buy` and
/// `vol_sell` are aligned with `grid`, the contiguous bucket index from
/// the first to the last trade. Silent buckets carry signal 0 and volume
/// 0 on the grid but produce no candle and no ratio row. The `cvd`
/// timestamps are shifted backward by `shift_sec` to realign CVD
/// confirmation with the price candles that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frames {
    pub price: Vec<Candle>,
    pub cvd: Vec<Candle>,
    pub ratio: Vec<f64>,
    /// Contiguous bucket-start index for `signals` / `vol_buy` / `vol_sell`
    pub grid: Vec<i64>,
    pub signals: Vec<i64>,
    pub vol_buy: Vec<f64>,
    pub vol_sell: Vec<f64>,
}

impl Frames {
    /// Bucket timestamps of the price-candle index
    pub fn index(&self) -> Vec<i64> {
        self.price.iter().map(|c| c.bucket_start).collect()
    }

    /// Signal of the bucket starting at `bucket_ts`, if it is on the grid
    pub fn signal_at(&self, bucket_ts: i64) -> Option<i64> {
        self.grid
            .binary_search(&bucket_ts)
            .ok()
            .map(|i| self.signals[i])
    }
}

/// Build all derived frames from raw trades.
///
/// Input order is not assumed; trades are sorted by timestamp before
/// bucketing. Empty input returns `None` (the declared-empty result),
/// never an error.
pub fn build_frames(trades: &[Trade], params: &FrameParams) -> Option<Frames> {
    if trades.is_empty() {
        return None;
    }

    let mut sorted: Vec<Trade> = trades.to_vec();
    sorted.sort_by_key(|t| t.ts);

    let interval_ms = params.interval_secs as i64 * 1000;
    let series = resample(&sorted, interval_ms);

    // Classification runs on the grid-aligned, pre-shift CVD candles.
    let (ratio, signals) =
        ratio_and_signals(&series.price, &series.cvd, params.ratio_strong, params.ratio_weak);

    let shift_ms = params.shift_sec as i64 * 1000;
    let price: Vec<Candle> = series.price.into_iter().flatten().collect();
    let cvd: Vec<Candle> = series
        .cvd
        .into_iter()
        .flatten()
        .map(|c| Candle {
            bucket_start: c.bucket_start - shift_ms,
            ..c
        })
        .collect();

    Some(Frames {
        price,
        cvd,
        ratio,
        grid: series.grid,
        signals,
        vol_buy: series.vol_buy,
        vol_sell: series.vol_sell,
    })
}
