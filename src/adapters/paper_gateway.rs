//! Simulated broker driven by historical daily bars.
//!
//! The first `warmup_bars` bars of every ticker are visible at start. Each
//! account summary request after the first reveals one more bar, so one
//! engine cycle corresponds to one trading day. Marketable limit orders
//! fill immediately at the last price; other orders rest until a later bar
//! trades through the limit.

use crate::adapters::csv_adapter::CsvHistory;
use crate::domain::error::{GatewayError, TraderError};
use crate::domain::market::{AccountSummary, BrokerPosition, MarketSnapshot};
use crate::domain::ohlcv::Bar;
use crate::domain::order::{BrokerOrderState, OrderReport, OrderSide};
use crate::ports::gateway_port::GatewayPort;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone)]
struct PaperOrder {
    ticker: String,
    side: OrderSide,
    quantity: i64,
    limit_price: f64,
    state: BrokerOrderState,
    fill_price: f64,
    message: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Holding {
    quantity: i64,
    avg_price: f64,
}

pub struct PaperGateway {
    bars: BTreeMap<String, Vec<Bar>>,
    visible: Cell<usize>,
    started: Cell<bool>,
    cash: Cell<f64>,
    realized_pnl: Cell<f64>,
    holdings: RefCell<BTreeMap<String, Holding>>,
    orders: RefCell<HashMap<String, PaperOrder>>,
    next_order: Cell<u64>,
}

impl PaperGateway {
    pub fn new(bars: BTreeMap<String, Vec<Bar>>, starting_cash: f64, warmup_bars: usize) -> Self {
        Self {
            bars,
            visible: Cell::new(warmup_bars.max(1)),
            started: Cell::new(false),
            cash: Cell::new(starting_cash),
            realized_pnl: Cell::new(0.0),
            holdings: RefCell::new(BTreeMap::new()),
            orders: RefCell::new(HashMap::new()),
            next_order: Cell::new(1),
        }
    }

    /// Load `<TICKER>.csv` for every ticker from `history`.
    pub fn from_csv(
        history: &CsvHistory,
        tickers: &[String],
        starting_cash: f64,
        warmup_bars: usize,
    ) -> Result<Self, TraderError> {
        let mut bars = BTreeMap::new();
        for ticker in tickers {
            let series = history.load(ticker)?;
            if series.is_empty() {
                return Err(TraderError::Data {
                    reason: format!("no bars for {}", ticker),
                });
            }
            bars.insert(ticker.clone(), series);
        }
        Ok(Self::new(bars, starting_cash, warmup_bars))
    }

    fn longest_series(&self) -> usize {
        self.bars.values().map(Vec::len).max().unwrap_or(0)
    }

    /// Bars not yet revealed.
    pub fn remaining_bars(&self) -> usize {
        self.longest_series().saturating_sub(self.visible.get())
    }

    pub fn cash(&self) -> f64 {
        self.cash.get()
    }

    fn visible_bars(&self, ticker: &str) -> Option<&[Bar]> {
        let series = self.bars.get(ticker)?;
        let n = self.visible.get().min(series.len());
        Some(&series[..n])
    }

    fn current_bar(&self, ticker: &str) -> Option<&Bar> {
        self.visible_bars(ticker)?.last()
    }

    fn last_price(&self, ticker: &str) -> Option<f64> {
        self.current_bar(ticker).map(|b| b.close)
    }

    fn equity(&self) -> f64 {
        let holdings = self.holdings.borrow();
        let marked: f64 = holdings
            .iter()
            .map(|(ticker, h)| {
                let price = self.last_price(ticker).unwrap_or(h.avg_price);
                h.quantity as f64 * price
            })
            .sum();
        self.cash.get() + marked
    }

    fn advance(&self) {
        if self.remaining_bars() == 0 {
            return;
        }
        self.visible.set(self.visible.get() + 1);
        debug!(visible = self.visible.get(), "paper gateway advanced one bar");

        let mut orders = self.orders.borrow_mut();
        for order in orders.values_mut() {
            if order.state != BrokerOrderState::Working {
                continue;
            }
            let Some(bar) = self.current_bar(&order.ticker) else {
                continue;
            };
            let price = match order.side {
                OrderSide::Buy if bar.low <= order.limit_price => order.limit_price.min(bar.open),
                OrderSide::Sell if bar.high >= order.limit_price => order.limit_price.max(bar.open),
                _ => continue,
            };
            if order.side == OrderSide::Buy && order.quantity as f64 * price > self.cash.get() {
                order.state = BrokerOrderState::Rejected;
                order.message = Some("insufficient buying power at fill".into());
                continue;
            }
            self.fill(&order.ticker, order.side, order.quantity, price);
            order.state = BrokerOrderState::Filled;
            order.fill_price = price;
        }
    }

    fn fill(&self, ticker: &str, side: OrderSide, quantity: i64, price: f64) {
        let signed = side.sign() * quantity;
        self.cash.set(self.cash.get() - signed as f64 * price);

        let mut holdings = self.holdings.borrow_mut();
        let current = holdings.get(ticker).copied().unwrap_or(Holding {
            quantity: 0,
            avg_price: 0.0,
        });
        let new_qty = current.quantity + signed;

        let avg_price = if current.quantity == 0 || current.quantity.signum() == signed.signum() {
            (current.quantity as f64 * current.avg_price + signed as f64 * price) / new_qty as f64
        } else {
            let closed = signed.abs().min(current.quantity.abs());
            let pnl = (price - current.avg_price) * closed as f64 * current.quantity.signum() as f64;
            self.realized_pnl.set(self.realized_pnl.get() + pnl);
            if new_qty.signum() == current.quantity.signum() {
                current.avg_price
            } else {
                price
            }
        };

        if new_qty == 0 {
            holdings.remove(ticker);
        } else {
            holdings.insert(
                ticker.to_string(),
                Holding {
                    quantity: new_qty,
                    avg_price,
                },
            );
        }
    }
}

impl GatewayPort for PaperGateway {
    fn get_account_summary(&self) -> Result<AccountSummary, GatewayError> {
        if self.started.get() {
            self.advance();
        } else {
            self.started.set(true);
        }
        Ok(AccountSummary {
            equity: self.equity(),
            buying_power: self.cash.get().max(0.0),
            realized_pnl: self.realized_pnl.get(),
        })
    }

    fn get_positions(&self) -> Result<Vec<BrokerPosition>, GatewayError> {
        Ok(self
            .holdings
            .borrow()
            .iter()
            .map(|(ticker, h)| BrokerPosition {
                ticker: ticker.clone(),
                quantity: h.quantity,
                avg_price: h.avg_price,
            })
            .collect())
    }

    fn get_market_snapshot(&self, ticker: &str) -> Result<MarketSnapshot, GatewayError> {
        let bar = self
            .current_bar(ticker)
            .ok_or_else(|| GatewayError::permanent(format!("contract not found: {}", ticker)))?;
        Ok(MarketSnapshot {
            last_price: bar.close,
            bid: bar.close,
            ask: bar.close,
            volume: bar.volume,
        })
    }

    fn get_history(&self, ticker: &str, lookback: usize) -> Result<Vec<Bar>, GatewayError> {
        let bars = self
            .visible_bars(ticker)
            .ok_or_else(|| GatewayError::permanent(format!("contract not found: {}", ticker)))?;
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
        if quantity <= 0 {
            return Err(GatewayError::permanent(format!("invalid quantity {}", quantity)));
        }
        if !limit_price.is_finite() || limit_price <= 0.0 {
            return Err(GatewayError::permanent(format!("invalid price {}", limit_price)));
        }
        let last = self
            .last_price(ticker)
            .ok_or_else(|| GatewayError::permanent(format!("contract not found: {}", ticker)))?;
        if side == OrderSide::Buy && quantity as f64 * limit_price > self.cash.get() {
            return Err(GatewayError::permanent("insufficient buying power"));
        }

        let id = format!("paper-{}", self.next_order.get());
        self.next_order.set(self.next_order.get() + 1);

        let marketable = match side {
            OrderSide::Buy => limit_price >= last,
            OrderSide::Sell => limit_price <= last,
        };
        let mut order = PaperOrder {
            ticker: ticker.to_string(),
            side,
            quantity,
            limit_price,
            state: BrokerOrderState::Working,
            fill_price: 0.0,
            message: None,
        };
        if marketable {
            self.fill(ticker, side, quantity, last);
            order.state = BrokerOrderState::Filled;
            order.fill_price = last;
        }
        debug!(
            client_id,
            order_id = %id,
            ticker,
            %side,
            quantity,
            limit_price,
            filled = marketable,
            "paper order placed"
        );
        self.orders.borrow_mut().insert(id.clone(), order);
        Ok(id)
    }

    fn get_order_status(&self, order_id: &str) -> Result<OrderReport, GatewayError> {
        let orders = self.orders.borrow();
        let order = orders
            .get(order_id)
            .ok_or_else(|| GatewayError::permanent(format!("invalid order id {}", order_id)))?;
        let filled = order.state == BrokerOrderState::Filled;
        Ok(OrderReport {
            state: order.state,
            filled_quantity: if filled { order.quantity } else { 0 },
            avg_fill_price: order.fill_price,
            message: order.message.clone(),
        })
    }
}
