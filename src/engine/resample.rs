//! Fixed-interval resampler
//!
//! Buckets a sorted trade sequence into fixed-width intervals over a
//! contiguous grid from the first to the last trade-bearing bucket.
//! Buckets with no trades stay on the grid as empty slots: they carry no
//! candle but are zero-filled in the buy/sell volume series. Price and
//! CVD candles exist only for trade-bearing slots.

use crate::types::{Candle, Side, Trade};

/// Per-bucket series produced by one resampling pass.
///
/// All fields are aligned with `grid`: entry `i` of each describes the
/// bucket starting at `grid[i]`. `price[i]`/`cvd[i]` are `None` for
/// silent buckets; `vol_buy[i]`/`vol_sell[i]` are 0 there.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketSeries {
    /// Contiguous bucket-start timestamps, first to last trade
    pub grid: Vec<i64>,
    pub price: Vec<Option<Candle>>,
    /// CVD candles with unshifted bucket timestamps
    pub cvd: Vec<Option<Candle>>,
    pub vol_buy: Vec<f64>,
    pub vol_sell: Vec<f64>,
}

impl BucketSeries {
    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }
}

/// Align a timestamp to the start of its bucket
pub fn bucket_start(ts: i64, interval_ms: i64) -> i64 {
    ts - ts.rem_euclid(interval_ms)
}

/// Resample sorted trades into per-bucket series on a contiguous grid.
///
/// The CVD candle for a bucket summarizes the running cumulative sum, not
/// the bucket-local delta: its open is the cumulative value at the first
/// trade of the bucket (that trade included).
pub fn resample(sorted: &[Trade], interval_ms: i64) -> BucketSeries {
    let mut grid: Vec<i64> = Vec::new();
    let mut price: Vec<Option<Candle>> = Vec::new();
    let mut cvd: Vec<Option<Candle>> = Vec::new();
    let mut vol_buy: Vec<f64> = Vec::new();
    let mut vol_sell: Vec<f64> = Vec::new();

    let mut cumulative = 0.0;
    for trade in sorted {
        let bucket = bucket_start(trade.ts, interval_ms);
        cumulative += trade.signed_volume();

        let same_bucket = matches!(grid.last(), Some(&b) if b == bucket);
        if same_bucket {
            if let (Some(Some(pc)), Some(Some(cc))) = (price.last_mut(), cvd.last_mut()) {
                pc.update(trade.price);
                cc.update(cumulative);
            }
        } else {
            // Materialize silent buckets between the previous slot and
            // this one so the grid stays contiguous.
            let mut next = match grid.last() {
                Some(&b) => b + interval_ms,
                None => bucket,
            };
            while next < bucket {
                grid.push(next);
                price.push(None);
                cvd.push(None);
                vol_buy.push(0.0);
                vol_sell.push(0.0);
                next += interval_ms;
            }
            grid.push(bucket);
            price.push(Some(Candle::seed(bucket, trade.price)));
            cvd.push(Some(Candle::seed(bucket, cumulative)));
            vol_buy.push(0.0);
            vol_sell.push(0.0);
        }

        match trade.side {
            Side::Buy => {
                if let Some(v) = vol_buy.last_mut() {
                    *v += trade.volume;
                }
            }
            Side::Sell => {
                if let Some(v) = vol_sell.last_mut() {
                    *v += trade.volume;
                }
            }
        }
    }

    BucketSeries {
        grid,
        price,
        cvd,
        vol_buy,
        vol_sell,
    }
}
