//! Buy-zone strategy.
//!
//! Buys a sharp one-bar drop into the lower three quarters of the long
//! close channel, shortly after the channel was broken to the upside. The
//! entry rests below the market: prior low minus a multiple of prior ATR.
//! Long only.

use crate::domain::config::BuyZoneParams;
use crate::domain::error::TraderError;
use crate::domain::indicator::{atr_series, highest, lowest, roc, sma};
use crate::domain::ohlcv::{Bar, closes, volumes};
use crate::domain::signal::{Direction, Intent, Signal, new_signal_id};
use crate::domain::strategy::Strategy;

const VOLUME_MA_PERIOD: usize = 20;

#[derive(Debug, Clone)]
pub struct BuyZone {
    params: BuyZoneParams,
    profit_threshold: f64,
    min_price: f64,
}

/// LLV + 3/4 of the channel height.
pub fn buy_zone_level(highest_close: f64, lowest_close: f64) -> f64 {
    lowest_close + 3.0 * (highest_close - lowest_close) / 4.0
}

impl BuyZone {
    pub fn new(params: BuyZoneParams, profit_threshold: f64, min_price: f64) -> Self {
        BuyZone {
            params,
            profit_threshold,
            min_price,
        }
    }

    /// True when some close in the last `channel_break_window` bars closed
    /// above the highest close of the `channel_period` bars before it.
    fn recent_breakout(&self, closes: &[f64]) -> bool {
        let p = &self.params;
        let last = closes.len() - 1;
        (0..p.channel_break_window)
            .map(|k| last - k)
            .filter(|&j| j >= p.channel_period)
            .any(|j| {
                highest(&closes[..j], p.channel_period).is_some_and(|prior_high| closes[j] > prior_high)
            })
    }
}

impl Strategy for BuyZone {
    fn name(&self) -> &'static str {
        "buy_zone"
    }

    fn required_bars(&self) -> usize {
        let p = &self.params;
        (p.channel_period + p.channel_break_window)
            .max(p.atr_period + 1)
            .max(VOLUME_MA_PERIOD)
            .max(2)
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

        let p = &self.params;
        let last = bars.len() - 1;
        let bar = &bars[last];
        let prev = &bars[last - 1];
        let closes = closes(bars);
        let none = || Signal::none(ticker, bar.close, bar.timestamp);

        let atrs = atr_series(bars, p.atr_period);
        let (Some(hhv), Some(llv), Some(change), Some(avg_volume), Some(prev_atr), Some(atr)) = (
            highest(&closes, p.channel_period),
            lowest(&closes, p.channel_period),
            roc(&closes, 1),
            sma(&volumes(bars), VOLUME_MA_PERIOD),
            atrs[last - 1],
            atrs[last],
        ) else {
            return Ok(none());
        };

        let zone = buy_zone_level(hhv, llv);
        let entry = change < -p.roc_threshold
            && bar.close < zone
            && self.recent_breakout(&closes)
            && !bar.gaps_down_from(prev)
            && avg_volume > p.min_volume
            && bar.close > self.min_price;
        if !entry {
            return Ok(none());
        }

        let limit_price = prev.low - prev_atr * p.atr_multiple;
        if limit_price <= 0.0 {
            return Ok(none());
        }
        let stop_price = (limit_price - atr).max(0.0);
        let target_price = zone * (1.0 + self.profit_threshold / 100.0);
        let strength = (-change / (2.0 * p.roc_threshold.max(f64::EPSILON))).clamp(0.0, 1.0);

        Ok(Signal {
            id: new_signal_id(),
            ticker: ticker.to_string(),
            direction: Direction::Long,
            intent: Intent::Open,
            strength,
            reference_price: bar.close,
            limit_price,
            stop_price,
            target_price,
            timestamp: bar.timestamp,
        })
    }
}
