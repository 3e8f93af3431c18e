//! Open positions and their exit levels.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::signal::ExitReason;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub ticker: String,
    /// Signed; positive is long.
    pub quantity: i64,
    pub entry_price: f64,
    /// 0.0 disables the stop.
    pub stop_price: f64,
    /// 0.0 disables the target.
    pub target_price: f64,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity.unsigned_abs() as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.entry_price)
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        if self.stop_price == 0.0 {
            return false;
        }
        if self.is_long() {
            price <= self.stop_price
        } else {
            price >= self.stop_price
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        if self.target_price == 0.0 {
            return false;
        }
        if self.is_long() {
            price >= self.target_price
        } else {
            price <= self.target_price
        }
    }

    /// Stop takes precedence when a gap crosses both levels.
    pub fn exit_reason(&self, price: f64) -> Option<ExitReason> {
        if self.quantity == 0 {
            None
        } else if self.should_stop_loss(price) {
            Some(ExitReason::StopLoss)
        } else if self.should_take_profit(price) {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_long_position() -> Position {
        Position {
            ticker: "AAPL".into(),
            quantity: 100,
            entry_price: 50.0,
            stop_price: 45.0,
            target_price: 60.0,
            opened_at: Utc.with_ymd_and_hms(2024, 1, 15, 15, 0, 0).unwrap(),
        }
    }

    fn sample_short_position() -> Position {
        Position {
            ticker: "MSFT".into(),
            quantity: -100,
            entry_price: 100.0,
            stop_price: 110.0,
            target_price: 80.0,
            opened_at: Utc.with_ymd_and_hms(2024, 1, 15, 15, 0, 0).unwrap(),
        }
    }

    #[test]
    fn is_long_positive_quantity() {
        let pos = sample_long_position();
        assert!(pos.is_long());
        assert!(!pos.is_short());
    }

    #[test]
    fn is_short_negative_quantity() {
        let pos = sample_short_position();
        assert!(pos.is_short());
        assert!(!pos.is_long());
    }

    #[test]
    fn market_value_is_absolute() {
        assert!((sample_long_position().market_value(55.0) - 5500.0).abs() < f64::EPSILON);
        assert!((sample_short_position().market_value(95.0) - 9500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_long_and_short() {
        assert!((sample_long_position().unrealized_pnl(45.0) - (-500.0)).abs() < f64::EPSILON);
        assert!((sample_short_position().unrealized_pnl(90.0) - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_loss_long_triggered() {
        let pos = sample_long_position();
        assert!(pos.should_stop_loss(44.0));
        assert!(pos.should_stop_loss(45.0));
        assert!(!pos.should_stop_loss(46.0));
    }

    #[test]
    fn stop_loss_short_triggered() {
        let pos = sample_short_position();
        assert!(pos.should_stop_loss(111.0));
        assert!(!pos.should_stop_loss(109.0));
    }

    #[test]
    fn take_profit_long_triggered() {
        let pos = sample_long_position();
        assert!(pos.should_take_profit(60.0));
        assert!(!pos.should_take_profit(59.0));
    }

    #[test]
    fn take_profit_short_triggered() {
        let pos = sample_short_position();
        assert!(pos.should_take_profit(79.0));
        assert!(!pos.should_take_profit(81.0));
    }

    #[test]
    fn zero_levels_disable_exits() {
        let mut pos = sample_long_position();
        pos.stop_price = 0.0;
        pos.target_price = 0.0;
        assert!(pos.exit_reason(0.01).is_none());
        assert!(pos.exit_reason(1_000_000.0).is_none());
    }

    #[test]
    fn exit_reason_picks_crossed_level() {
        let pos = sample_long_position();
        assert_eq!(pos.exit_reason(44.0), Some(ExitReason::StopLoss));
        assert_eq!(pos.exit_reason(61.0), Some(ExitReason::TakeProfit));
        assert_eq!(pos.exit_reason(52.0), None);
    }

    #[test]
    fn stop_wins_when_levels_overlap() {
        let mut pos = sample_long_position();
        pos.stop_price = 60.0;
        pos.target_price = 55.0;
        assert_eq!(pos.exit_reason(58.0), Some(ExitReason::StopLoss));
    }
}
