//! Core types used throughout CvdScope
//!
//! Defines the trade event and candle structures shared by the feed,
//! the aggregation engine, and persistence.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Taker side of a trade, using the exchange convention:
/// "B" = aggressive buy, "A" = aggressive sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "B")]
    Buy,
    #[serde(rename = "A")]
    Sell,
}

impl Side {
    /// Parse from the wire representation
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "B" => Some(Side::Buy),
            "A" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "B"),
            Side::Sell => write!(f, "A"),
        }
    }
}

/// A single executed trade as received from the trade source.
///
/// Immutable once created. `ts` is milliseconds since the Unix epoch and is
/// the ordering key; arrival order is not guaranteed monotonic, so consumers
/// must sort before bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Exchange timestamp in milliseconds
    pub ts: i64,
    /// Execution price
    pub price: f64,
    /// Executed volume in base units (>= 0)
    pub volume: f64,
    /// Taker side
    pub side: Side,
}

impl Trade {
    /// Volume signed by side: +volume for buys, -volume for sells.
    pub fn signed_volume(&self) -> f64 {
        match self.side {
            Side::Buy => self.volume,
            Side::Sell => -self.volume,
        }
    }
}

/// OHLC summary of some series over one fixed-width time bucket.
///
/// Derived data: never mutated after the computation pass that built it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start timestamp in milliseconds
    pub bucket_start: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    /// Seed a candle from the first observation of its bucket
    pub fn seed(bucket_start: i64, value: f64) -> Self {
        Self {
            bucket_start,
            open: value,
            high: value,
            low: value,
            close: value,
        }
    }

    /// Fold another observation into the candle
    pub fn update(&mut self, value: f64) {
        self.high = self.high.max(value);
        self.low = self.low.min(value);
        self.close = value;
    }

    /// Close-minus-open movement within the bucket
    pub fn delta(&self) -> f64 {
        self.close - self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_volume() {
        let buy = Trade {
            ts: 0,
            price: 100.0,
            volume: 2.5,
            side: Side::Buy,
        };
        let sell = Trade { side: Side::Sell, ..buy };
        assert_eq!(buy.signed_volume(), 2.5);
        assert_eq!(sell.signed_volume(), -2.5);
    }

    #[test]
    fn test_candle_fold() {
        let mut candle = Candle::seed(0, 100.0);
        candle.update(101.0);
        candle.update(99.0);
        candle.update(100.5);
        assert_eq!(candle.open, 100.0);
        assert_eq!(candle.high, 101.0);
        assert_eq!(candle.low, 99.0);
        assert_eq!(candle.close, 100.5);
        assert_eq!(candle.delta(), 0.5);
    }

    #[test]
    fn test_side_wire_roundtrip() {
        assert_eq!(Side::from_wire("B"), Some(Side::Buy));
        assert_eq!(Side::from_wire("A"), Some(Side::Sell));
        assert_eq!(Side::from_wire("X"), None);
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"B\"");
    }
}
