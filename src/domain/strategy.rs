//! Strategy interface and configuration-selected variants.

use crate::domain::buy_zone::BuyZone;
use crate::domain::config::{StrategyKind, TradingConfig};
use crate::domain::error::TraderError;
use crate::domain::market::MarketSnapshot;
use crate::domain::ohlcv::Bar;
use crate::domain::position_manager::PositionManager;
use crate::domain::screener::TrendPullback;
use crate::domain::signal::{Direction, Signal};

pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Fewest bars `generate_signal` accepts.
    fn required_bars(&self) -> usize;

    /// Pure function of the bars; fails with `InsufficientHistory` when
    /// there are fewer than `required_bars`.
    fn generate_signal(&self, ticker: &str, bars: &[Bar]) -> Result<Signal, TraderError>;

    /// Whether the signal still makes sense against the live quote: the
    /// price has not already run through the stop or the target.
    fn validate_signal(&self, signal: &Signal, snapshot: &MarketSnapshot) -> bool {
        let price = snapshot.last_price;
        if !(price > 0.0 && price.is_finite()) {
            return false;
        }
        match signal.direction {
            Direction::Long => {
                price > signal.stop_price
                    && (signal.target_price == 0.0 || price < signal.target_price)
            }
            Direction::Short => {
                (signal.stop_price == 0.0 || price < signal.stop_price)
                    && price > signal.target_price
            }
            Direction::None => false,
        }
    }

    fn calculate_position_size(
        &self,
        signal: &Signal,
        allocation: f64,
        positions: &PositionManager,
    ) -> i64 {
        positions.size_order(signal, allocation, signal.entry_price())
    }
}

pub fn build_strategy(config: &TradingConfig) -> Box<dyn Strategy> {
    match config.strategy {
        StrategyKind::TrendPullback => Box::new(TrendPullback::new(
            config.screener.clone(),
            config.profit_threshold,
            config.allow_shorting,
        )),
        StrategyKind::BuyZone => Box::new(BuyZone::new(
            config.buy_zone.clone(),
            config.profit_threshold,
            config.risk.min_price,
        )),
    }
}
