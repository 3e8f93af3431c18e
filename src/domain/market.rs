//! Account, position and quote snapshots as reported by the gateway.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccountSummary {
    pub equity: f64,
    pub buying_power: f64,
    pub realized_pnl: f64,
}

/// One row of the broker's position list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerPosition {
    pub ticker: String,
    pub quantity: i64,
    pub avg_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub last_price: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: i64,
}

impl MarketSnapshot {
    /// Price a marketable order on `side` should be limited at. Falls back to
    /// the last price when the book side is missing.
    pub fn marketable_price(&self, buying: bool) -> f64 {
        let quote = if buying { self.ask } else { self.bid };
        if quote > 0.0 { quote } else { self.last_price }
    }
}
