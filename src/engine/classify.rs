//! Efficiency ratio and signal classification
//!
//! Derives one normalized price/CVD efficiency ratio per bucket and maps
//! it to a bounded signal in {-3..=3}:
//! - +3/-3: price and CVD move together, strongly (coherent trend)
//! - +2/-2: price and CVD move in opposite directions (divergence)
//! - +1/-1: price moves much more than CVD (absorption)
//! -  0:    CVD move too small to matter, or the ambiguous middle zone
//!
//! In the divergence and absorption branches the signal sign is the
//! opposite of the price-move sign: it flags the CVD-implied pressure,
//! not the price direction. The boundary operators are load-bearing and
//! must not be "normalized" (`>` strong, strict `<` weak, `>= 0`).
//!
//! Both the rolling windows and the classification run over the full
//! contiguous bucket grid: a silent bucket occupies a window slot but
//! contributes no delta, yields no ratio row, and classifies as the
//! neutral signal 0.

use crate::types::Candle;

/// Division guard for flat recent history
pub const EPS: f64 = 1e-8;
/// CVD moves below this magnitude are noise and classify as 0
pub const CVD_EPS: f64 = 0.1;
/// Efficiency ratio is clipped to [-CLIP, CLIP]
pub const CLIP: f64 = 20.0;
/// Trailing grid-slot count for the rolling |delta| means
pub const ROLLING_WINDOW: usize = 10;

/// Classify one bucket from its deltas and efficiency ratio.
///
/// Pure function of its arguments; no hidden state.
pub fn classify(delta_p: f64, delta_cvd: f64, ratio: f64, ratio_strong: f64, ratio_weak: f64) -> i64 {
    if delta_cvd.abs() < CVD_EPS {
        return 0;
    }
    if ratio > ratio_strong {
        if delta_p > 0.0 {
            3
        } else {
            -3
        }
    } else if ratio < 0.0 {
        if delta_p > 0.0 {
            -2
        } else {
            2
        }
    } else if ratio >= 0.0 && ratio < ratio_weak {
        // The `>= 0` guard is redundant after the `ratio < 0` branch; it
        // is kept so the branch reads as the published rule it implements.
        if delta_p > 0.0 {
            -1
        } else {
            1
        }
    } else {
        0
    }
}

/// Compute per-bucket efficiency ratios and signals over the bucket grid.
///
/// `price` and `cvd` are the grid-aligned, pre-shift candle series from the
/// resampler, with `None` at silent buckets. Deltas are normalized by
/// trailing rolling means of their absolute values over [`ROLLING_WINDOW`]
/// grid slots (minimum window 1, current bucket included); silent slots
/// stay in the window positionally but are skipped by the mean.
///
/// Returns one ratio per trade-bearing bucket, in grid order, and one
/// signal per grid slot (0 at silent buckets).
pub fn ratio_and_signals(
    price: &[Option<Candle>],
    cvd: &[Option<Candle>],
    ratio_strong: f64,
    ratio_weak: f64,
) -> (Vec<f64>, Vec<i64>) {
    debug_assert_eq!(price.len(), cvd.len());
    let n = price.len().min(cvd.len());

    let delta_price: Vec<Option<f64>> =
        price[..n].iter().map(|c| c.as_ref().map(Candle::delta)).collect();
    let delta_cvd: Vec<Option<f64>> =
        cvd[..n].iter().map(|c| c.as_ref().map(Candle::delta)).collect();

    let avg_abs_price = trailing_abs_mean(&delta_price);
    let avg_abs_cvd = trailing_abs_mean(&delta_cvd);

    let mut ratios = Vec::new();
    let mut signals = Vec::with_capacity(n);
    for i in 0..n {
        let (Some(dp), Some(dcvd)) = (delta_price[i], delta_cvd[i]) else {
            // Silent bucket: no deltas to rate, but the slot still carries
            // a neutral signal row.
            signals.push(0);
            continue;
        };
        // Both means are Some here: the current slot is in its own window.
        let norm_dp = dp / (avg_abs_price[i].unwrap_or(0.0) + EPS);
        let norm_dcvd = dcvd / (avg_abs_cvd[i].unwrap_or(0.0) + EPS);
        let ratio = (norm_dp / (norm_dcvd + EPS)).clamp(-CLIP, CLIP);
        ratios.push(ratio);
        signals.push(classify(dp, dcvd, ratio, ratio_strong, ratio_weak));
    }
    (ratios, signals)
}

/// Rolling mean of |values| over the trailing [`ROLLING_WINDOW`] grid
/// slots, current slot included, shrinking at the start of the series.
/// Slots holding `None` count toward the window span but not the mean;
/// a window with no present values yields `None`.
fn trailing_abs_mean(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = i.saturating_sub(ROLLING_WINDOW - 1);
        let present: Vec<f64> = values[start..=i].iter().flatten().map(|v| v.abs()).collect();
        if present.is_empty() {
            out.push(None);
        } else {
            out.push(Some(present.iter().sum::<f64>() / present.len() as f64));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRONG: f64 = 1.5;
    const WEAK: f64 = 0.5;

    #[test]
    fn test_small_cvd_move_is_always_neutral() {
        // |delta_cvd| below CVD_EPS wins over every other branch.
        assert_eq!(classify(10.0, 0.05, 19.0, STRONG, WEAK), 0);
        assert_eq!(classify(-10.0, -0.099, -5.0, STRONG, WEAK), 0);
        assert_eq!(classify(0.0, 0.0, 0.0, STRONG, WEAK), 0);
    }

    #[test]
    fn test_strong_coherent_branch() {
        assert_eq!(classify(2.0, 5.0, 1.6, STRONG, WEAK), 3);
        assert_eq!(classify(-2.0, -5.0, 1.6, STRONG, WEAK), -3);
        // Boundary: ratio == ratio_strong is NOT strong (strict >).
        assert_eq!(classify(2.0, 5.0, STRONG, STRONG, WEAK), 0);
    }

    #[test]
    fn test_divergence_branch_flags_opposite_sign() {
        assert_eq!(classify(2.0, -5.0, -0.7, STRONG, WEAK), -2);
        assert_eq!(classify(-2.0, 5.0, -0.7, STRONG, WEAK), 2);
        // Boundary: ratio == 0 falls through to the absorption check.
        assert_eq!(classify(2.0, 5.0, 0.0, STRONG, WEAK), -1);
    }

    #[test]
    fn test_absorption_branch_flags_opposite_sign() {
        assert_eq!(classify(3.0, 5.0, 0.3, STRONG, WEAK), -1);
        assert_eq!(classify(-3.0, -5.0, 0.3, STRONG, WEAK), 1);
        // Boundary: ratio == ratio_weak lands in the neutral zone
        // (strict <), unlike the strong threshold comparison.
        assert_eq!(classify(3.0, 5.0, WEAK, STRONG, WEAK), 0);
    }

    #[test]
    fn test_neutral_zone() {
        assert_eq!(classify(1.0, 5.0, 1.0, STRONG, WEAK), 0);
        assert_eq!(classify(-1.0, -5.0, 0.5, STRONG, WEAK), 0);
    }

    #[test]
    fn test_classification_is_pure() {
        for _ in 0..3 {
            assert_eq!(classify(2.0, -5.0, -0.7, STRONG, WEAK), -2);
        }
    }

    fn candle(open: f64, close: f64) -> Option<Candle> {
        Some(Candle {
            bucket_start: 0,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
        })
    }

    #[test]
    fn test_ratio_is_clipped() {
        // A steady price move against a CVD move that collapses versus its
        // own recent history drives the raw ratio far past the clip bound.
        let price = vec![candle(100.0, 110.0), candle(110.0, 120.0)];
        let cvd = vec![candle(0.0, 100.0), candle(100.0, 100.001)];
        let (ratios, _) = ratio_and_signals(&price, &cvd, STRONG, WEAK);
        for r in &ratios {
            assert!(*r <= CLIP && *r >= -CLIP);
        }
        assert_eq!(ratios[1], CLIP);
    }

    #[test]
    fn test_single_bucket_normalizes_to_unit_ratio() {
        // With one bucket, each rolling mean equals the bucket's own |delta|,
        // so both normalized moves are ~1 and the ratio is ~1 (neutral).
        let price = vec![candle(100.0, 102.0)];
        let cvd = vec![candle(0.0, 5.0)];
        let (ratios, signals) = ratio_and_signals(&price, &cvd, STRONG, WEAK);
        assert!((ratios[0] - 1.0).abs() < 1e-6);
        assert_eq!(signals[0], 0);
    }

    #[test]
    fn test_silent_buckets_yield_neutral_signals_but_no_ratio() {
        // Grid of four slots with silent buckets in the middle: signals
        // cover every slot, ratios only the trade-bearing ones.
        let price = vec![candle(100.0, 101.0), None, None, candle(101.0, 103.0)];
        let cvd = vec![candle(0.0, 2.0), None, None, candle(2.0, 4.0)];
        let (ratios, signals) = ratio_and_signals(&price, &cvd, STRONG, WEAK);
        assert_eq!(ratios.len(), 2);
        assert_eq!(signals.len(), 4);
        assert_eq!(signals[1], 0);
        assert_eq!(signals[2], 0);
    }

    #[test]
    fn test_rolling_window_is_positional_over_the_grid() {
        // Eleven silent slots push the first bucket's deltas out of the
        // trailing window: at the last slot each rolling mean equals that
        // slot's own |delta|, so the ratio normalizes back to ~1.
        let mut price = vec![candle(100.0, 110.0)];
        let mut cvd = vec![candle(0.0, 50.0)];
        for _ in 0..ROLLING_WINDOW + 1 {
            price.push(None);
            cvd.push(None);
        }
        price.push(candle(110.0, 112.0));
        cvd.push(candle(50.0, 55.0));

        let (ratios, signals) = ratio_and_signals(&price, &cvd, STRONG, WEAK);
        assert_eq!(ratios.len(), 2);
        assert!((ratios[1] - 1.0).abs() < 1e-6);
        assert_eq!(signals.len(), ROLLING_WINDOW + 3);
        assert_eq!(signals[signals.len() - 1], 0);
    }

    #[test]
    fn test_trailing_mean_window() {
        let values: Vec<Option<f64>> = (1..=12).map(|v| Some(v as f64)).collect();
        let means = trailing_abs_mean(&values);
        // First entry: window of 1.
        assert_eq!(means[0], Some(1.0));
        // Second entry: mean of 1, 2.
        assert_eq!(means[1], Some(1.5));
        // Entry 11 (12th): trailing 10 of 3..=12.
        assert_eq!(means[11], Some(7.5));
    }

    #[test]
    fn test_trailing_mean_skips_absent_slots() {
        // The silent slot spans a window position but is excluded from
        // the mean; its own mean still averages what the window holds.
        let values = vec![Some(2.0), None, Some(4.0)];
        let means = trailing_abs_mean(&values);
        assert_eq!(means[0], Some(2.0));
        assert_eq!(means[1], Some(2.0));
        assert_eq!(means[2], Some(3.0));
    }

    #[test]
    fn test_divergent_bucket_flags_reversal() {
        // Flat history, then price up while CVD falls: ratio < 0 and the
        // signal is -2 (down-pressure flagged despite the up move).
        let price = vec![candle(100.0, 101.0), candle(101.0, 103.0)];
        let cvd = vec![candle(0.0, 2.0), candle(2.0, -1.0)];
        let (ratios, signals) = ratio_and_signals(&price, &cvd, STRONG, WEAK);
        assert!(ratios[1] < 0.0);
        assert_eq!(signals[1], -2);
    }
}
