//! Portfolio and position level checks on proposed entries.
//!
//! [`evaluate`] is a pure function: it keeps no state between calls, so the
//! same signal, portfolio and config always give the same decision.

use crate::domain::config::RiskConfig;
use crate::domain::portfolio::PortfolioState;
use crate::domain::signal::{RejectReason, Signal};

/// Tolerance for the drawdown comparison; a decline of exactly the limit
/// is a breach even after float rounding.
const DRAWDOWN_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    Accept {
        /// Notional the entry may use.
        allocation: f64,
        /// True when the allocation was cut to respect the position limit.
        capped: bool,
    },
    Reject {
        reason: RejectReason,
        /// The values compared, for the audit log.
        detail: String,
    },
}

impl RiskDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, RiskDecision::Accept { .. })
    }

    fn reject(reason: RejectReason, detail: String) -> Self {
        RiskDecision::Reject { reason, detail }
    }
}

pub fn drawdown_breached(state: &PortfolioState, config: &RiskConfig) -> bool {
    state.drawdown() + DRAWDOWN_EPSILON >= config.max_drawdown
}

/// Run the entry checks in order, stopping at the first failure.
pub fn evaluate(signal: &Signal, state: &PortfolioState, config: &RiskConfig) -> RiskDecision {
    if !signal.is_entry() {
        return RiskDecision::reject(
            RejectReason::SignalInvalidated,
            format!("signal for {} is not an entry", signal.ticker),
        );
    }

    if state.entries_halted || drawdown_breached(state, config) {
        return RiskDecision::reject(
            RejectReason::DrawdownExceeded,
            format!(
                "drawdown {:.4} vs max {:.4} (halted={})",
                state.drawdown(),
                config.max_drawdown,
                state.entries_halted
            ),
        );
    }

    let held = state.holds(&signal.ticker);
    if !held && state.open_count() >= config.max_positions {
        return RiskDecision::reject(
            RejectReason::PositionLimitReached,
            format!(
                "open {} vs max {}",
                state.open_count(),
                config.max_positions
            ),
        );
    }

    if signal.reference_price < config.min_price {
        return RiskDecision::reject(
            RejectReason::PriceTooLow,
            format!(
                "price {:.4} vs min {:.4}",
                signal.reference_price, config.min_price
            ),
        );
    }

    let price = signal.entry_price();
    let mut allocation = config.allocation_per_trade.min(state.buying_power).max(0.0);
    let existing = state.exposure(&signal.ticker, price);
    let permitted = (config.max_position_size * state.equity - existing).max(0.0);
    let mut capped = false;
    if allocation > permitted {
        allocation = permitted;
        capped = true;
    }

    if price <= 0.0 || (allocation / price).floor() < 1.0 {
        return RiskDecision::reject(
            RejectReason::SizeBelowMinimum,
            format!(
                "allocation {:.2} at price {:.4} buys no shares (permitted {:.2})",
                allocation, price, permitted
            ),
        );
    }

    RiskDecision::Accept { allocation, capped }
}
