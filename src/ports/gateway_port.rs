//! Broker gateway port.
//!
//! Every call is a blocking request/response with a bounded timeout. A
//! timeout surfaces as a transient [`GatewayError`].

use crate::domain::error::GatewayError;
use crate::domain::market::{AccountSummary, BrokerPosition, MarketSnapshot};
use crate::domain::ohlcv::Bar;
use crate::domain::order::{OrderReport, OrderSide};

pub trait GatewayPort {
    fn get_account_summary(&self) -> Result<AccountSummary, GatewayError>;

    fn get_positions(&self) -> Result<Vec<BrokerPosition>, GatewayError>;

    fn get_market_snapshot(&self, ticker: &str) -> Result<MarketSnapshot, GatewayError>;

    /// Up to `lookback` most recent bars, oldest first.
    fn get_history(&self, ticker: &str, lookback: usize) -> Result<Vec<Bar>, GatewayError>;

    /// Place a limit order and return the broker's order id.
    fn place_order(
        &self,
        client_id: &str,
        ticker: &str,
        side: OrderSide,
        quantity: i64,
        limit_price: f64,
    ) -> Result<String, GatewayError>;

    fn get_order_status(&self, order_id: &str) -> Result<OrderReport, GatewayError>;
}
