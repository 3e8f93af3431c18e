#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use tmrtrader::adapters::file_config_adapter::FileConfigAdapter;
use tmrtrader::domain::config::TradingConfig;
use tmrtrader::domain::error::GatewayError;
use tmrtrader::domain::market::{AccountSummary, BrokerPosition, MarketSnapshot};
pub use tmrtrader::domain::ohlcv::Bar;
use tmrtrader::domain::order::{BrokerOrderState, OrderReport, OrderSide};
use tmrtrader::ports::clock_port::{Clock, Sleeper};
use tmrtrader::ports::gateway_port::GatewayPort;

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub client_id: String,
    pub ticker: String,
    pub side: OrderSide,
    pub quantity: i64,
    pub limit_price: f64,
}

/// Scripted broker. Queued responses are consumed in order; when a queue
/// is empty the default applies.
pub struct MockGateway {
    pub accounts: RefCell<VecDeque<Result<AccountSummary, GatewayError>>>,
    pub default_account: AccountSummary,
    pub positions: RefCell<Vec<BrokerPosition>>,
    pub snapshots: RefCell<HashMap<String, MarketSnapshot>>,
    pub history: RefCell<HashMap<String, Vec<Bar>>>,
    pub placements: RefCell<VecDeque<Result<String, GatewayError>>>,
    pub placed: RefCell<Vec<PlacedOrder>>,
    pub statuses: RefCell<HashMap<String, OrderReport>>,
    next_id: Cell<u64>,
}

impl MockGateway {
    pub fn new(equity: f64) -> Self {
        Self {
            accounts: RefCell::new(VecDeque::new()),
            default_account: AccountSummary {
                equity,
                buying_power: equity,
                realized_pnl: 0.0,
            },
            positions: RefCell::new(Vec::new()),
            snapshots: RefCell::new(HashMap::new()),
            history: RefCell::new(HashMap::new()),
            placements: RefCell::new(VecDeque::new()),
            placed: RefCell::new(Vec::new()),
            statuses: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        }
    }

    /// A ticker whose history produces a long signal and whose quote sits
    /// at the signal's close.
    pub fn with_long_setup(self, ticker: &str) -> Self {
        let bars = pullback_bars(ticker);
        let last = bars[bars.len() - 1].close;
        self.history.borrow_mut().insert(ticker.to_string(), bars);
        self.snapshots.borrow_mut().insert(ticker.to_string(), quote(last));
        self
    }

    pub fn with_quote(self, ticker: &str, last: f64) -> Self {
        self.snapshots.borrow_mut().insert(ticker.to_string(), quote(last));
        self
    }

    pub fn with_position(self, ticker: &str, quantity: i64, avg_price: f64) -> Self {
        self.positions.borrow_mut().push(BrokerPosition {
            ticker: ticker.to_string(),
            quantity,
            avg_price,
        });
        self
    }

    pub fn push_account(&self, equity: f64) {
        self.accounts.borrow_mut().push_back(Ok(AccountSummary {
            equity,
            buying_power: equity,
            realized_pnl: 0.0,
        }));
    }

    pub fn push_account_error(&self, err: GatewayError) {
        self.accounts.borrow_mut().push_back(Err(err));
    }

    pub fn set_status(&self, broker_id: &str, state: BrokerOrderState, filled: i64, price: f64) {
        self.statuses.borrow_mut().insert(
            broker_id.to_string(),
            OrderReport {
                state,
                filled_quantity: filled,
                avg_fill_price: price,
                message: None,
            },
        );
    }

    pub fn placed_for(&self, ticker: &str) -> Vec<PlacedOrder> {
        self.placed
            .borrow()
            .iter()
            .filter(|p| p.ticker == ticker)
            .cloned()
            .collect()
    }
}

impl GatewayPort for MockGateway {
    fn get_account_summary(&self) -> Result<AccountSummary, GatewayError> {
        self.accounts
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(self.default_account))
    }

    fn get_positions(&self) -> Result<Vec<BrokerPosition>, GatewayError> {
        Ok(self.positions.borrow().clone())
    }

    fn get_market_snapshot(&self, ticker: &str) -> Result<MarketSnapshot, GatewayError> {
        self.snapshots
            .borrow()
            .get(ticker)
            .cloned()
            .ok_or_else(|| GatewayError::transient(format!("no quote for {}", ticker)))
    }

    fn get_history(&self, ticker: &str, lookback: usize) -> Result<Vec<Bar>, GatewayError> {
        let history = self.history.borrow();
        let bars = history.get(ticker).cloned().unwrap_or_default();
        let start = bars.len().saturating_sub(lookback);
        Ok(bars[start..].to_vec())
    }

    fn place_order(
        &self,
        client_id: &str,
        ticker: &str,
        side: OrderSide,
        quantity: i64,
        limit_price: f64,
    ) -> Result<String, GatewayError> {
        self.placed.borrow_mut().push(PlacedOrder {
            client_id: client_id.to_string(),
            ticker: ticker.to_string(),
            side,
            quantity,
            limit_price,
        });
        self.placements.borrow_mut().pop_front().unwrap_or_else(|| {
            let id = self.next_id.get();
            self.next_id.set(id + 1);
            Ok(format!("B{}", id))
        })
    }

    fn get_order_status(&self, order_id: &str) -> Result<OrderReport, GatewayError> {
        Ok(self
            .statuses
            .borrow()
            .get(order_id)
            .cloned()
            .unwrap_or(OrderReport {
                state: BrokerOrderState::Working,
                filled_quantity: 0,
                avg_fill_price: 0.0,
                message: None,
            }))
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn new() -> Self {
        FixedClock(Utc.with_ymd_and_hms(2024, 2, 1, 15, 0, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Records requested delays without waiting.
pub struct RecordingSleeper {
    pub delays: RefCell<Vec<std::time::Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self {
            delays: RefCell::new(Vec::new()),
        }
    }

    pub fn secs(&self) -> Vec<u64> {
        self.delays.borrow().iter().map(|d| d.as_secs()).collect()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: std::time::Duration) -> bool {
        self.delays.borrow_mut().push(duration);
        true
    }
}

pub fn quote(last: f64) -> MarketSnapshot {
    MarketSnapshot {
        last_price: last,
        bid: last,
        ask: last,
        volume: 1_000_000,
    }
}

pub fn make_bar(ticker: &str, day: i64, close: f64) -> Bar {
    Bar {
        ticker: ticker.to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap() + Duration::days(day),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1_000_000,
    }
}

/// Twenty rising closes from 100 followed by a 5% pullback to 113.05.
pub fn pullback_bars(ticker: &str) -> Vec<Bar> {
    let mut closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
    closes.push(119.0 * 0.95);
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(ticker, i as i64, c))
        .collect()
}

pub fn config_from(ini: &str) -> TradingConfig {
    let port = FileConfigAdapter::from_string(ini).unwrap();
    TradingConfig::from_port(&port).unwrap()
}

/// Minimal valid INI for `tickers` with `extra` appended.
pub fn base_ini(tickers: &str, extra: &str) -> String {
    format!(
        "[account]\nid = DU1234567\n\n[trading]\ntickers = {}\ncheck_interval_secs = 60\n\n{}",
        tickers, extra
    )
}
