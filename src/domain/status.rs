//! Read-only engine snapshot for the dashboard.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::metrics::CycleMetrics;
use crate::domain::order::Order;
use crate::domain::portfolio::PortfolioState;
use crate::domain::signal::SignalRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub account_id: String,
    pub strategy: String,
    pub updated_at: DateTime<Utc>,
    pub cycles_completed: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub portfolio: Option<PortfolioState>,
    pub recent_signals: Vec<SignalRecord>,
    pub recent_orders: Vec<Order>,
    pub last_cycle: Option<CycleMetrics>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn serializes_to_json() {
        let status = EngineStatus {
            account_id: "DU123".into(),
            strategy: "trend_pullback".into(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            cycles_completed: 2,
            consecutive_failures: 0,
            last_error: None,
            portfolio: Some(PortfolioState::new(1000.0, 500.0, 1200.0)),
            recent_signals: Vec::new(),
            recent_orders: Vec::new(),
            last_cycle: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["account_id"], "DU123");
        assert_eq!(json["portfolio"]["peak_equity"], 1200.0);
        assert!(json["last_cycle"].is_null());
        assert_eq!(json["updated_at"], "2024-01-01T12:00:00Z");
    }
}
