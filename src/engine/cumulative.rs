//! Cumulative signal segmentation
//!
//! Accumulates per-bucket signals into a running total and cuts the
//! history into disjoint segments at +-4 extremes with one-sided
//! hysteresis: after a +4 reset only a -4 crossing can fire again (and
//! vice versa), so oscillating near one extreme never re-triggers.

use serde::Serialize;

/// Reset threshold for the cumulative total
pub const RESET_EXTREME: f64 = 4.0;
/// Leading signal count forced to zero before accumulation begins
pub const STARTUP_DAMPING: usize = 2;

/// One point of a cumulative segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentPoint {
    /// Bucket timestamp in milliseconds
    pub ts: i64,
    /// Running cumulative signal value at this bucket
    pub value: f64,
}

/// A maximal run of the cumulative history between resets.
///
/// Segments are disjoint in time; each reset opens the next segment with a
/// synthetic zero point at the reset timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativeSegment {
    pub points: Vec<SegmentPoint>,
}

/// Which extreme fired last
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extreme {
    High,
    Low,
}

/// Segment the signal sequence, resetting the running total at extremes.
///
/// `index` and `signals` must be the same length and in time order. The
/// first [`STARTUP_DAMPING`] signals are zeroed on a local copy so partial
/// initial data cannot fire a spurious reset; the caller's signal series
/// is untouched.
pub fn calculate_cumulative(index: &[i64], signals: &[i64]) -> Vec<CumulativeSegment> {
    debug_assert_eq!(index.len(), signals.len());
    let n = index.len().min(signals.len());

    let mut damped: Vec<f64> = signals[..n].iter().map(|&s| s as f64).collect();
    for v in damped.iter_mut().take(STARTUP_DAMPING) {
        *v = 0.0;
    }

    let mut segments: Vec<CumulativeSegment> = Vec::new();
    let mut current: Vec<SegmentPoint> = Vec::new();
    let mut cumulative = 0.0;
    let mut last_extreme: Option<Extreme> = None;

    for (i, &val) in damped.iter().enumerate() {
        cumulative += val;
        current.push(SegmentPoint {
            ts: index[i],
            value: cumulative,
        });

        if cumulative >= RESET_EXTREME && last_extreme != Some(Extreme::High) {
            segments.push(CumulativeSegment {
                points: std::mem::take(&mut current),
            });
            cumulative = 0.0;
            last_extreme = Some(Extreme::High);
            current.push(SegmentPoint {
                ts: index[i],
                value: 0.0,
            });
        } else if cumulative <= -RESET_EXTREME && last_extreme != Some(Extreme::Low) {
            segments.push(CumulativeSegment {
                points: std::mem::take(&mut current),
            });
            cumulative = 0.0;
            last_extreme = Some(Extreme::Low);
            current.push(SegmentPoint {
                ts: index[i],
                value: 0.0,
            });
        }
    }

    if !current.is_empty() {
        segments.push(CumulativeSegment { points: current });
    }

    segments
}
