//! Authoritative open-position view, order sizing and exit detection.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::domain::market::BrokerPosition;
use crate::domain::position::Position;
use crate::domain::signal::Signal;

/// Exit levels recorded when the engine opens a position, re-attached to
/// the broker's snapshot on every reconcile.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Protection {
    stop_price: f64,
    target_price: f64,
    opened_at: DateTime<Utc>,
}

impl Protection {
    /// Stop below target for a long, above it for a short. A disabled level
    /// (0.0) fits either side.
    fn fits(&self, quantity: i64) -> bool {
        if self.stop_price == 0.0 || self.target_price == 0.0 {
            return true;
        }
        if quantity > 0 {
            self.stop_price < self.target_price
        } else {
            self.stop_price > self.target_price
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositionManager {
    profit_threshold: f64,
    positions: Vec<Position>,
    protections: BTreeMap<String, Protection>,
}

impl PositionManager {
    /// `profit_threshold` is a percentage, used to default the target of
    /// positions the engine did not open itself.
    pub fn new(profit_threshold: f64) -> Self {
        PositionManager {
            profit_threshold,
            positions: Vec::new(),
            protections: BTreeMap::new(),
        }
    }

    /// Whole shares affordable with `allocation`; 0 means do not trade.
    pub fn size_order(&self, signal: &Signal, allocation: f64, current_price: f64) -> i64 {
        if current_price <= 0.0 || allocation <= 0.0 || !current_price.is_finite() {
            return 0;
        }
        let quantity = (allocation / current_price).floor() as i64;
        debug!(
            ticker = %signal.ticker,
            allocation,
            price = current_price,
            quantity,
            "sized order"
        );
        quantity.max(0)
    }

    pub fn register_protection(
        &mut self,
        ticker: &str,
        stop_price: f64,
        target_price: f64,
        opened_at: DateTime<Utc>,
    ) {
        self.protections.insert(
            ticker.to_string(),
            Protection {
                stop_price,
                target_price,
                opened_at,
            },
        );
    }

    /// Forget levels registered for an entry that ended without a fill.
    pub fn discard_protection(&mut self, ticker: &str) {
        if self.protections.remove(ticker).is_some() {
            debug!(ticker = %ticker, "protection discarded for unfilled entry");
        }
    }

    /// Replace the position view with the broker's snapshot.
    ///
    /// Protection for a ticker that was held last time and is now flat is
    /// dropped. Protection registered for an entry that has not filled yet is
    /// kept until the position appears.
    pub fn reconcile(&mut self, snapshot: &[BrokerPosition], now: DateTime<Utc>) {
        let held_now: Vec<&BrokerPosition> = snapshot.iter().filter(|p| p.quantity != 0).collect();

        for previous in &self.positions {
            if !held_now.iter().any(|p| p.ticker == previous.ticker) {
                info!(ticker = %previous.ticker, quantity = previous.quantity, "position closed");
                self.protections.remove(&previous.ticker);
            }
        }

        let mut positions = Vec::with_capacity(held_now.len());
        for broker in held_now {
            let protection = match self.protections.get(&broker.ticker) {
                Some(&p) if p.fits(broker.quantity) => p,
                Some(&p) => {
                    let replacement = self.default_protection(broker, now);
                    warn!(
                        ticker = %broker.ticker,
                        quantity = broker.quantity,
                        stop = p.stop_price,
                        target = p.target_price,
                        target_now = replacement.target_price,
                        "recorded levels do not match position side, using defaults"
                    );
                    self.protections.insert(broker.ticker.clone(), replacement);
                    replacement
                }
                None => {
                    let p = self.default_protection(broker, now);
                    info!(
                        ticker = %broker.ticker,
                        quantity = broker.quantity,
                        target = p.target_price,
                        "adopted position not opened by this engine"
                    );
                    self.protections.insert(broker.ticker.clone(), p);
                    p
                }
            };
            positions.push(Position {
                ticker: broker.ticker.clone(),
                quantity: broker.quantity,
                entry_price: broker.avg_price,
                stop_price: protection.stop_price,
                target_price: protection.target_price,
                opened_at: protection.opened_at,
            });
        }
        self.positions = positions;
    }

    fn default_protection(&self, broker: &BrokerPosition, now: DateTime<Utc>) -> Protection {
        let factor = if broker.quantity > 0 {
            1.0 + self.profit_threshold / 100.0
        } else {
            1.0 - self.profit_threshold / 100.0
        };
        Protection {
            stop_price: 0.0,
            target_price: broker.avg_price * factor,
            opened_at: now,
        }
    }

    /// A closing signal for every position whose stop or target has been
    /// crossed by its latest price. Positions without a price are skipped.
    pub fn check_exits(&self, prices: &HashMap<String, f64>, now: DateTime<Utc>) -> Vec<Signal> {
        self.positions
            .iter()
            .filter_map(|position| {
                let price = *prices.get(&position.ticker)?;
                let reason = position.exit_reason(price)?;
                info!(
                    ticker = %position.ticker,
                    quantity = position.quantity,
                    price,
                    stop = position.stop_price,
                    target = position.target_price,
                    unrealized = position.unrealized_pnl(price),
                    reason = %reason,
                    "exit triggered"
                );
                Some(Signal::close(
                    &position.ticker,
                    position.quantity,
                    reason,
                    price,
                    now,
                ))
            })
            .collect()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.ticker == ticker)
    }
}
