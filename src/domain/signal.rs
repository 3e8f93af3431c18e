//! Trade signals and their per-cycle outcomes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
    None,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
            Direction::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TakeProfit => write!(f, "take_profit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum Intent {
    Open,
    Close(ExitReason),
}

/// A directional trade instruction for one ticker, valid for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub id: String,
    pub ticker: String,
    pub direction: Direction,
    pub intent: Intent,
    pub strength: f64,
    pub reference_price: f64,
    /// Price the entry order is placed at. Equal to `reference_price`
    /// unless the strategy asks for a resting limit below the market.
    pub limit_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// A "no trade" signal.
    pub fn none(ticker: &str, reference_price: f64, timestamp: DateTime<Utc>) -> Self {
        Signal {
            id: new_signal_id(),
            ticker: ticker.to_string(),
            direction: Direction::None,
            intent: Intent::Open,
            strength: 0.0,
            reference_price,
            limit_price: reference_price,
            stop_price: 0.0,
            target_price: 0.0,
            timestamp,
        }
    }

    /// An exit instruction for an existing position.
    pub fn close(
        ticker: &str,
        position_quantity: i64,
        reason: ExitReason,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        // Closing a long sells, closing a short buys; `direction` records
        // the side of the position being closed.
        let direction = if position_quantity >= 0 {
            Direction::Long
        } else {
            Direction::Short
        };
        Signal {
            id: new_signal_id(),
            ticker: ticker.to_string(),
            direction,
            intent: Intent::Close(reason),
            strength: 1.0,
            reference_price: price,
            limit_price: price,
            stop_price: 0.0,
            target_price: 0.0,
            timestamp,
        }
    }

    /// Price the order for this signal is sized and placed at.
    pub fn entry_price(&self) -> f64 {
        if self.limit_price > 0.0 {
            self.limit_price
        } else {
            self.reference_price
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.direction != Direction::None
    }

    pub fn is_entry(&self) -> bool {
        self.is_actionable() && self.intent == Intent::Open
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.intent, Intent::Close(_))
    }
}

pub fn new_signal_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Why the risk manager refused an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    DrawdownExceeded,
    PositionLimitReached,
    PriceTooLow,
    SizeBelowMinimum,
    SignalInvalidated,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::DrawdownExceeded => "drawdown exceeded",
            RejectReason::PositionLimitReached => "position limit reached",
            RejectReason::PriceTooLow => "price too low",
            RejectReason::SizeBelowMinimum => "size below minimum",
            RejectReason::SignalInvalidated => "signal invalidated",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SignalOutcome {
    Accepted { allocation: f64, quantity: i64 },
    Rejected { reason: RejectReason },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalRecord {
    pub signal: Signal,
    pub outcome: SignalOutcome,
}

/// Fixed-capacity history of signal decisions, oldest dropped first.
#[derive(Debug, Clone)]
pub struct SignalJournal {
    capacity: usize,
    records: VecDeque<SignalRecord>,
}

impl SignalJournal {
    pub fn new(capacity: usize) -> Self {
        SignalJournal {
            capacity: capacity.max(1),
            records: VecDeque::new(),
        }
    }

    pub fn record(&mut self, signal: Signal, outcome: SignalOutcome) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(SignalRecord { signal, outcome });
    }

    /// Re-label an earlier decision, e.g. when its order is abandoned.
    /// Returns false if the signal has already aged out.
    pub fn mark_skipped(&mut self, signal_id: &str, reason: &str) -> bool {
        match self.records.iter_mut().rev().find(|r| r.signal.id == signal_id) {
            Some(record) => {
                record.outcome = SignalOutcome::Skipped {
                    reason: reason.to_string(),
                };
                true
            }
            None => false,
        }
    }

    pub fn find(&self, signal_id: &str) -> Option<&SignalRecord> {
        self.records.iter().rev().find(|r| r.signal.id == signal_id)
    }

    pub fn records(&self) -> Vec<SignalRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
