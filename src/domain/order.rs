//! Order lifecycle types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Signed multiplier applied to filled quantity.
    pub fn sign(&self) -> i64 {
        match self {
            OrderSide::Buy => 1,
            OrderSide::Sell => -1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Engine-side order state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum OrderStatus {
    Pending,
    Submitted,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected { retryable: bool },
    Abandoned,
}

impl OrderStatus {
    /// No further transitions happen from a terminal state, except a
    /// retryable rejection which is resubmitted by the executor.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected { retryable: false }
                | OrderStatus::Abandoned
        )
    }

    /// Still live at the broker and worth polling.
    pub fn is_working(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Submitted | OrderStatus::PartiallyFilled
        )
    }

    pub fn awaiting_retry(&self) -> bool {
        matches!(self, OrderStatus::Rejected { retryable: true })
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Submitted => write!(f, "submitted"),
            OrderStatus::PartiallyFilled => write!(f, "partially_filled"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
            OrderStatus::Rejected { retryable: true } => write!(f, "rejected (retryable)"),
            OrderStatus::Rejected { retryable: false } => write!(f, "rejected"),
            OrderStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Status as reported by the broker for one order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerOrderState {
    Working,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderReport {
    pub state: BrokerOrderState,
    pub filled_quantity: i64,
    pub avg_fill_price: f64,
    /// Broker's rejection text, if any.
    pub message: Option<String>,
}

/// What the engine wants placed.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub signal_id: String,
    pub ticker: String,
    pub side: OrderSide,
    pub quantity: i64,
    pub limit_price: f64,
    /// True when the order opens a new position.
    pub opening: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub client_id: String,
    pub broker_id: Option<String>,
    pub signal_id: String,
    pub ticker: String,
    pub side: OrderSide,
    pub requested_quantity: i64,
    pub filled_quantity: i64,
    /// Filled under earlier client ids before a resubmission.
    pub prior_filled: i64,
    pub avg_fill_price: f64,
    pub order_type: &'static str,
    pub limit_price: f64,
    pub status: OrderStatus,
    pub opening: bool,
    pub submitted_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl Order {
    pub fn new(request: &OrderRequest, now: DateTime<Utc>) -> Self {
        Order {
            client_id: new_client_id(),
            broker_id: None,
            signal_id: request.signal_id.clone(),
            ticker: request.ticker.clone(),
            side: request.side,
            requested_quantity: request.quantity,
            filled_quantity: 0,
            prior_filled: 0,
            avg_fill_price: 0.0,
            order_type: "LMT",
            limit_price: request.limit_price,
            status: OrderStatus::Pending,
            opening: request.opening,
            submitted_at: now,
            retry_count: 0,
            last_error: None,
        }
    }

    pub fn remaining_quantity(&self) -> i64 {
        (self.requested_quantity - self.filled_quantity).max(0)
    }

    /// Filled across every submission of this order.
    pub fn total_filled(&self) -> i64 {
        self.prior_filled + self.filled_quantity
    }

    /// Fold a broker report into this order. Returns the new status.
    pub fn apply_report(&mut self, report: &OrderReport) -> OrderStatus {
        if report.filled_quantity > 0 {
            self.filled_quantity = report.filled_quantity.min(self.requested_quantity);
            self.avg_fill_price = report.avg_fill_price;
        }
        self.status = match report.state {
            BrokerOrderState::Working if self.filled_quantity > 0 => OrderStatus::PartiallyFilled,
            BrokerOrderState::Working => OrderStatus::Submitted,
            BrokerOrderState::PartiallyFilled => OrderStatus::PartiallyFilled,
            BrokerOrderState::Filled => OrderStatus::Filled,
            BrokerOrderState::Cancelled => OrderStatus::Cancelled,
            BrokerOrderState::Rejected => {
                self.last_error = report.message.clone();
                OrderStatus::Rejected { retryable: false }
            }
        };
        self.status
    }
}

pub fn new_client_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
