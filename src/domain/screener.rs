//! Trend-pullback stock screener.
//!
//! A long needs three things on the latest bar:
//!
//! - an uptrend: close above its moving average and a rising close channel
//!   (both bounds of the prior channel above the channel a few bars earlier);
//! - a pullback: close retraced from the recent high by more than the
//!   configured fraction while staying above the average floor;
//! - sane liquidity and volatility: volume within a band of its average and
//!   ATR within a band of price.
//!
//! The short side mirrors the first two conditions. Every comparison is
//! strict, so values exactly at a threshold give no signal.

use crate::domain::config::ScreenerParams;
use crate::domain::error::TraderError;
use crate::domain::indicator::{atr, highest, lowest, sma};
use crate::domain::ohlcv::{Bar, closes, volumes};
use crate::domain::signal::{Direction, Intent, Signal, new_signal_id};
use crate::domain::strategy::Strategy;

#[derive(Debug, Clone)]
pub struct TrendPullback {
    params: ScreenerParams,
    profit_threshold: f64,
    allow_shorting: bool,
}

/// Indicator values for the latest bar, shared by both sides.
#[derive(Debug, Clone, Copy)]
struct Readings {
    close: f64,
    ma: f64,
    channel_high: f64,
    channel_low: f64,
    earlier_high: f64,
    earlier_low: f64,
    recent_high: f64,
    recent_low: f64,
    volume_ratio: f64,
    avg_volume: f64,
    atr: f64,
}

impl TrendPullback {
    pub fn new(params: ScreenerParams, profit_threshold: f64, allow_shorting: bool) -> Self {
        TrendPullback {
            params,
            profit_threshold,
            allow_shorting,
        }
    }

    pub fn params(&self) -> &ScreenerParams {
        &self.params
    }

    fn readings(&self, bars: &[Bar]) -> Option<Readings> {
        let p = &self.params;
        let closes = closes(bars);
        let volumes = volumes(bars);
        let last = closes.len() - 1;
        let prior = &closes[..last];
        let earlier = &closes[..last - p.channel_rise_lookback];
        let avg_volume = sma(&volumes, p.volume_period)?;

        Some(Readings {
            close: closes[last],
            ma: sma(&closes, p.ma_period)?,
            channel_high: highest(prior, p.channel_period)?,
            channel_low: lowest(prior, p.channel_period)?,
            earlier_high: highest(earlier, p.channel_period)?,
            earlier_low: lowest(earlier, p.channel_period)?,
            recent_high: highest(prior, p.pullback_window)?,
            recent_low: lowest(prior, p.pullback_window)?,
            volume_ratio: if avg_volume > 0.0 {
                volumes[last] / avg_volume
            } else {
                0.0
            },
            avg_volume,
            atr: atr(bars, p.atr_period)?,
        })
    }

    fn passes_filters(&self, r: &Readings) -> bool {
        let p = &self.params;
        let volume_ok = r.volume_ratio > p.min_volume_ratio
            && r.volume_ratio < p.max_volume_ratio
            && r.avg_volume >= p.min_avg_volume;
        let atr_pct = if r.close > 0.0 { r.atr / r.close } else { 0.0 };
        let volatility_ok = atr_pct > p.min_atr_pct && atr_pct < p.max_atr_pct;
        volume_ok && volatility_ok
    }

    /// Pullback depth for a long, or `None` when the long rule fails.
    fn long_setup(&self, r: &Readings) -> Option<f64> {
        let p = &self.params;
        let uptrend = r.close > r.ma
            && r.channel_high > r.earlier_high
            && r.channel_low > r.earlier_low;
        if !uptrend || r.recent_high <= 0.0 {
            return None;
        }
        let depth = (r.recent_high - r.close) / r.recent_high;
        let above_floor = r.close > r.ma * (1.0 + p.ma_floor_pct);
        (depth > p.min_pullback_pct && above_floor).then_some(depth)
    }

    /// Rally height for a short, or `None` when the short rule fails.
    fn short_setup(&self, r: &Readings) -> Option<f64> {
        let p = &self.params;
        let downtrend = r.close < r.ma
            && r.channel_high < r.earlier_high
            && r.channel_low < r.earlier_low;
        if !downtrend || r.recent_low <= 0.0 {
            return None;
        }
        let height = (r.close - r.recent_low) / r.recent_low;
        let below_ceiling = r.close < r.ma * (1.0 - p.ma_floor_pct);
        (height > p.min_pullback_pct && below_ceiling).then_some(height)
    }

    /// Mean of pullback depth, trend margin and volume normality, each
    /// scaled to [0, 1].
    fn strength(&self, r: &Readings, depth: f64) -> f64 {
        let p = &self.params;
        let depth_score = if p.min_pullback_pct > 0.0 {
            depth / (2.0 * p.min_pullback_pct)
        } else {
            1.0
        };
        let margin = if r.ma > 0.0 {
            (r.close / r.ma - 1.0).abs()
        } else {
            0.0
        };
        let trend_score = if p.max_atr_pct > 0.0 {
            margin / p.max_atr_pct
        } else {
            0.0
        };
        let volume_score = 1.0 - (r.volume_ratio - 1.0).abs();
        let mean = (depth_score.clamp(0.0, 1.0)
            + trend_score.clamp(0.0, 1.0)
            + volume_score.clamp(0.0, 1.0))
            / 3.0;
        mean.clamp(0.0, 1.0)
    }
}

pub fn required_bars(params: &ScreenerParams) -> usize {
    params
        .ma_period
        .max(params.channel_period + params.channel_rise_lookback + 1)
        .max(params.volume_period)
        .max(params.atr_period + 1)
        .max(params.pullback_window + 1)
}

impl Strategy for TrendPullback {
    fn name(&self) -> &'static str {
        "trend_pullback"
    }

    fn required_bars(&self) -> usize {
        required_bars(&self.params)
    }

    fn generate_signal(&self, ticker: &str, bars: &[Bar]) -> Result<Signal, TraderError> {
        let minimum = self.required_bars();
        if bars.len() < minimum {
            return Err(TraderError::InsufficientHistory {
                ticker: ticker.to_string(),
                bars: bars.len(),
                minimum,
            });
        }

        let latest = &bars[bars.len() - 1];
        let none = || Signal::none(ticker, latest.close, latest.timestamp);

        let Some(r) = self.readings(bars) else {
            return Ok(none());
        };
        if !self.passes_filters(&r) {
            return Ok(none());
        }

        let pct = self.profit_threshold / 100.0;
        let stop_distance = self.params.atr_stop_multiple * r.atr;
        let (direction, depth, stop_price, target_price) =
            if let Some(depth) = self.long_setup(&r) {
                (Direction::Long, depth, r.close - stop_distance, r.close * (1.0 + pct))
            } else if self.allow_shorting {
                match self.short_setup(&r) {
                    Some(height) => (
                        Direction::Short,
                        height,
                        r.close + stop_distance,
                        r.close * (1.0 - pct),
                    ),
                    None => return Ok(none()),
                }
            } else {
                return Ok(none());
            };

        Ok(Signal {
            id: new_signal_id(),
            ticker: ticker.to_string(),
            direction,
            intent: Intent::Open,
            strength: self.strength(&r, depth),
            reference_price: r.close,
            limit_price: r.close,
            stop_price,
            target_price,
            timestamp: latest.timestamp,
        })
    }
}
