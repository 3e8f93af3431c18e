//! Per-cycle portfolio read model.

use serde::Serialize;
use std::collections::BTreeSet;

use super::position::Position;

/// Derived from the gateway snapshot at the start of every cycle and
/// discarded at its end. Within a cycle it is only replaced, never mutated,
/// so each ticker sees the slots and buying power claimed by earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioState {
    pub equity: f64,
    pub buying_power: f64,
    pub realized_pnl: f64,
    /// High-water mark of equity over the process lifetime.
    pub peak_equity: f64,
    pub positions: Vec<Position>,
    /// Tickers with an entry order in flight but no position yet.
    pub pending_entries: BTreeSet<String>,
    pub entries_halted: bool,
}

impl PortfolioState {
    pub fn new(equity: f64, buying_power: f64, peak_equity: f64) -> Self {
        PortfolioState {
            equity,
            buying_power,
            realized_pnl: 0.0,
            peak_equity: peak_equity.max(equity),
            positions: Vec::new(),
            pending_entries: BTreeSet::new(),
            entries_halted: false,
        }
    }

    /// Fractional decline from the peak, 0 when at or above it.
    pub fn drawdown(&self) -> f64 {
        if self.peak_equity <= 0.0 {
            return 0.0;
        }
        ((self.peak_equity - self.equity) / self.peak_equity).max(0.0)
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions
            .iter()
            .find(|p| p.ticker == ticker && p.quantity != 0)
    }

    pub fn holds(&self, ticker: &str) -> bool {
        self.position(ticker).is_some()
    }

    pub fn has_pending_entry(&self, ticker: &str) -> bool {
        self.pending_entries.contains(ticker)
    }

    /// Held positions plus in-flight entries for tickers not yet held.
    pub fn open_count(&self) -> usize {
        let held = self.positions.iter().filter(|p| p.quantity != 0).count();
        let pending = self
            .pending_entries
            .iter()
            .filter(|t| !self.holds(t))
            .count();
        held + pending
    }

    /// Current notional of the ticker's position at `price`.
    pub fn exposure(&self, ticker: &str, price: f64) -> f64 {
        self.position(ticker)
            .map(|p| p.market_value(price))
            .unwrap_or(0.0)
    }

    /// A copy with `ticker` marked as having an entry in flight and
    /// `committed` deducted from buying power.
    pub fn with_pending_entry(&self, ticker: &str, committed: f64) -> Self {
        let mut next = self.clone();
        next.pending_entries.insert(ticker.to_string());
        next.buying_power = (next.buying_power - committed).max(0.0);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_position(ticker: &str, quantity: i64) -> Position {
        Position {
            ticker: ticker.into(),
            quantity,
            entry_price: 100.0,
            stop_price: 0.0,
            target_price: 0.0,
            opened_at: Utc.with_ymd_and_hms(2024, 1, 15, 15, 0, 0).unwrap(),
        }
    }

    #[test]
    fn new_state_clamps_peak() {
        let state = PortfolioState::new(120_000.0, 50_000.0, 100_000.0);
        assert_eq!(state.peak_equity, 120_000.0);
        assert_eq!(state.drawdown(), 0.0);
    }

    #[test]
    fn drawdown_from_peak() {
        let state = PortfolioState::new(80_000.0, 80_000.0, 100_000.0);
        assert!((state.drawdown() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn drawdown_zero_peak() {
        let state = PortfolioState::new(0.0, 0.0, 0.0);
        assert_eq!(state.drawdown(), 0.0);
    }

    #[test]
    fn open_count_includes_pending_entries() {
        let mut state = PortfolioState::new(100_000.0, 100_000.0, 100_000.0);
        state.positions.push(sample_position("AAPL", 10));
        state.positions.push(sample_position("FLAT", 0));
        assert_eq!(state.open_count(), 1);

        let next = state.with_pending_entry("MSFT", 1000.0);
        assert_eq!(next.open_count(), 2);
        assert!(next.has_pending_entry("MSFT"));
        assert_eq!(next.buying_power, 99_000.0);

        // Unchanged original.
        assert_eq!(state.open_count(), 1);
        assert_eq!(state.buying_power, 100_000.0);
    }

    #[test]
    fn pending_entry_for_held_ticker_not_double_counted() {
        let mut state = PortfolioState::new(100_000.0, 100_000.0, 100_000.0);
        state.positions.push(sample_position("AAPL", 10));
        let next = state.with_pending_entry("AAPL", 500.0);
        assert_eq!(next.open_count(), 1);
    }

    #[test]
    fn exposure_of_held_and_unheld() {
        let mut state = PortfolioState::new(100_000.0, 100_000.0, 100_000.0);
        state.positions.push(sample_position("AAPL", -10));
        assert_eq!(state.exposure("AAPL", 150.0), 1500.0);
        assert_eq!(state.exposure("MSFT", 150.0), 0.0);
        assert!(state.holds("AAPL"));
        assert!(!state.holds("FLAT"));
    }

    #[test]
    fn buying_power_never_negative() {
        let state = PortfolioState::new(1000.0, 500.0, 1000.0);
        assert_eq!(state.with_pending_entry("X", 800.0).buying_power, 0.0);
    }
}
