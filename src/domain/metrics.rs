//! Per-cycle counters and timing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleMetrics {
    pub cycle: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub tickers_screened: u32,
    pub signals_generated: u32,
    pub signals_accepted: u32,
    pub signals_rejected: u32,
    pub orders_placed: u32,
    pub orders_failed: u32,
    pub exits_triggered: u32,
    /// Per-ticker errors that did not fail the cycle.
    pub errors: u32,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl CycleMetrics {
    pub fn start(cycle: u64, at: DateTime<Utc>) -> Self {
        CycleMetrics {
            cycle,
            started_at: Some(at),
            ..Default::default()
        }
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        if let Some(start) = self.started_at {
            self.duration = (at - start).to_std().unwrap_or(Duration::ZERO);
        }
    }

    pub fn log(&self) {
        info!(
            cycle = self.cycle,
            tickers = self.tickers_screened,
            signals = self.signals_generated,
            accepted = self.signals_accepted,
            rejected = self.signals_rejected,
            orders_placed = self.orders_placed,
            orders_failed = self.orders_failed,
            exits = self.exits_triggered,
            errors = self.errors,
            duration_ms = self.duration.as_millis() as u64,
            "cycle complete"
        );
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}
