//! Indicator helpers shared by the strategies.
//!
//! All functions work on the tail of the input: a window of `period` values
//! ending at the last element. They return `None` when there are fewer than
//! `period` values or the period is zero.

use crate::domain::ohlcv::Bar;

/// Simple moving average of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    let window = tail(values, period)?;
    Some(window.iter().sum::<f64>() / period as f64)
}

pub fn highest(values: &[f64], period: usize) -> Option<f64> {
    tail(values, period).map(|w| w.iter().copied().fold(f64::MIN, f64::max))
}

pub fn lowest(values: &[f64], period: usize) -> Option<f64> {
    tail(values, period).map(|w| w.iter().copied().fold(f64::MAX, f64::min))
}

/// Percentage change over `period` bars: (C[i] / C[i-period] - 1) * 100.
pub fn roc(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() <= period {
        return None;
    }
    let last = values[values.len() - 1];
    let base = values[values.len() - 1 - period];
    if base == 0.0 {
        return None;
    }
    Some((last / base - 1.0) * 100.0)
}

/// Wilder-smoothed average true range, one entry per bar.
///
/// The first `period - 1` entries are `None`; entry `period - 1` is the
/// plain average of the first `period` true ranges (the first bar uses
/// high - low).
pub fn atr_series(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    if period == 0 || bars.len() < period {
        return vec![None; bars.len()];
    }

    let tr_values: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();

    let mut results: Vec<Option<f64>> = Vec::with_capacity(bars.len());
    let mut prev_atr = 0.0;
    for i in 0..bars.len() {
        if i < period - 1 {
            results.push(None);
        } else if i == period - 1 {
            prev_atr = tr_values[0..=i].iter().sum::<f64>() / period as f64;
            results.push(Some(prev_atr));
        } else {
            prev_atr = (prev_atr * (period - 1) as f64 + tr_values[i]) / period as f64;
            results.push(Some(prev_atr));
        }
    }
    results
}

/// ATR at the last bar.
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    atr_series(bars, period).last().copied().flatten()
}

fn tail(values: &[f64], period: usize) -> Option<&[f64]> {
    if period == 0 || values.len() < period {
        return None;
    }
    Some(&values[values.len() - period..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_bar(i: i64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            ticker: "TEST".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 21, 0, 0).unwrap() + Duration::days(i),
            open: close,
            high,
            low,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn sma_uses_tail_window() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&values, 3), Some(4.0));
        assert_eq!(sma(&values, 5), Some(3.0));
        assert_eq!(sma(&values, 6), None);
        assert_eq!(sma(&values, 0), None);
    }

    #[test]
    fn highest_and_lowest() {
        let values = [5.0, 1.0, 9.0, 3.0, 4.0];
        assert_eq!(highest(&values, 3), Some(9.0));
        assert_eq!(lowest(&values, 3), Some(3.0));
        assert_eq!(highest(&values, 2), Some(4.0));
        assert_eq!(lowest(&values, 10), None);
    }

    #[test]
    fn roc_percentage() {
        let values = [100.0, 97.0];
        let r = roc(&values, 1).unwrap();
        assert!((r - (-3.0)).abs() < 1e-9);
        assert_eq!(roc(&values, 2), None);
    }

    #[test]
    fn atr_warmup() {
        let bars: Vec<Bar> = (0..5).map(|i| make_bar(i, 110.0, 90.0, 100.0)).collect();
        let series = atr_series(&bars, 3);
        assert_eq!(series.len(), 5);
        assert!(series[0].is_none());
        assert!(series[1].is_none());
        assert!(series[2].is_some());
        assert!(series[4].is_some());
    }

    #[test]
    fn atr_seed_is_average() {
        let bars = vec![
            make_bar(0, 110.0, 100.0, 105.0),
            make_bar(1, 115.0, 105.0, 110.0),
            make_bar(2, 120.0, 110.0, 115.0),
        ];
        let expected = (10.0 + 10.0 + 10.0) / 3.0;
        assert!((atr(&bars, 3).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn atr_wilder_smoothing() {
        let bars = vec![
            make_bar(0, 110.0, 100.0, 105.0),
            make_bar(1, 115.0, 105.0, 110.0),
            make_bar(2, 120.0, 110.0, 115.0),
            make_bar(3, 125.0, 115.0, 120.0),
        ];
        let expected = (10.0 * 2.0 + 10.0) / 3.0;
        assert!((atr(&bars, 3).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn atr_insufficient_bars() {
        let bars: Vec<Bar> = (0..2).map(|i| make_bar(i, 110.0, 90.0, 100.0)).collect();
        assert!(atr(&bars, 5).is_none());
        assert_eq!(atr_series(&bars, 5), vec![None, None]);
    }
}
