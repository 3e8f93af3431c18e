//! Order submission, lifecycle tracking and bounded retry.
//!
//! Orders move `Pending -> Submitted -> {PartiallyFilled -> Filled |
//! Cancelled | Rejected}`. A transient failure parks the order as
//! `Rejected { retryable: true }`; it is resubmitted with a fresh client id
//! by the next [`OrderExecutor::resubmit_due`], which the loop only calls in
//! a later execution phase. After `max_retries` resubmissions the next
//! transient failure abandons the order.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, VecDeque};
use tracing::{error, info, warn};

use crate::domain::error::GatewayError;
use crate::domain::order::{BrokerOrderState, Order, OrderRequest, OrderStatus, new_client_id};
use crate::ports::gateway_port::GatewayPort;

/// Something the loop needs to react to, produced as orders change state.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Filled {
        signal_id: String,
        ticker: String,
        quantity: i64,
        price: f64,
    },
    /// Cancelled at the broker. `filled` counts every submission.
    Cancelled {
        signal_id: String,
        ticker: String,
        opening: bool,
        filled: i64,
    },
    /// Retries exhausted on transient failures.
    Abandoned {
        signal_id: String,
        ticker: String,
        opening: bool,
        filled: i64,
        retries: u32,
        reason: String,
    },
    /// Permanent failure; not retried.
    Rejected {
        signal_id: String,
        ticker: String,
        opening: bool,
        filled: i64,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct OrderExecutor {
    max_retries: u32,
    /// Orders still working at the broker or waiting to be resubmitted.
    active: Vec<Order>,
    /// Terminal orders, most recent last.
    history: VecDeque<Order>,
    history_capacity: usize,
    outcomes: Vec<ExecutionOutcome>,
}

impl OrderExecutor {
    pub fn new(max_retries: u32, history_capacity: usize) -> Self {
        OrderExecutor {
            max_retries,
            active: Vec::new(),
            history: VecDeque::new(),
            history_capacity: history_capacity.max(1),
            outcomes: Vec::new(),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Place a new limit order. Placement failures are absorbed into the
    /// returned order's status.
    pub fn submit(
        &mut self,
        gateway: &dyn GatewayPort,
        request: &OrderRequest,
        now: DateTime<Utc>,
    ) -> Order {
        let mut order = Order::new(request, now);
        self.place(gateway, &mut order, now);
        let snapshot = order.clone();
        self.track(order);
        snapshot
    }

    /// Poll one tracked order by client id. Returns `None` for an unknown id.
    pub fn poll(&mut self, gateway: &dyn GatewayPort, client_id: &str) -> Option<OrderStatus> {
        let index = self.active.iter().position(|o| o.client_id == client_id)?;
        let mut order = self.active.remove(index);
        if order.status.is_working() {
            self.refresh(gateway, &mut order);
        }
        let status = order.status;
        self.track(order);
        Some(status)
    }

    /// [`Self::poll`] every order that is live at the broker.
    pub fn poll_open(&mut self, gateway: &dyn GatewayPort) {
        let live: Vec<String> = self
            .active
            .iter()
            .filter(|o| o.status.is_working() && o.broker_id.is_some())
            .map(|o| o.client_id.clone())
            .collect();
        for client_id in live {
            self.poll(gateway, &client_id);
        }
    }

    /// Resubmit every order parked after a transient failure, for its
    /// remaining quantity and under a new client id.
    pub fn resubmit_due(&mut self, gateway: &dyn GatewayPort, now: DateTime<Utc>) {
        let orders = std::mem::take(&mut self.active);
        for mut order in orders {
            if order.status.awaiting_retry() {
                order.retry_count += 1;
                order.client_id = new_client_id();
                order.broker_id = None;
                order.requested_quantity = order.remaining_quantity();
                order.prior_filled += order.filled_quantity;
                order.filled_quantity = 0;
                order.status = OrderStatus::Pending;
                info!(
                    ticker = %order.ticker,
                    side = %order.side,
                    qty = order.requested_quantity,
                    price = order.limit_price,
                    retry = order.retry_count,
                    "resubmitting order"
                );
                self.place(gateway, &mut order, now);
            }
            self.track(order);
        }
    }

    pub fn drain_outcomes(&mut self) -> Vec<ExecutionOutcome> {
        std::mem::take(&mut self.outcomes)
    }

    pub fn active_orders(&self) -> &[Order] {
        &self.active
    }

    /// Terminal orders followed by active ones.
    pub fn recent_orders(&self) -> Vec<Order> {
        self.history.iter().chain(self.active.iter()).cloned().collect()
    }

    /// Live or awaiting retry for this ticker.
    pub fn has_live_order(&self, ticker: &str) -> bool {
        self.active.iter().any(|o| o.ticker == ticker)
    }

    /// Tickers with an entry order not yet resolved.
    pub fn pending_entry_tickers(&self) -> BTreeSet<String> {
        self.active
            .iter()
            .filter(|o| o.opening)
            .map(|o| o.ticker.clone())
            .collect()
    }

    fn place(&mut self, gateway: &dyn GatewayPort, order: &mut Order, now: DateTime<Utc>) {
        order.submitted_at = now;
        match gateway.place_order(
            &order.client_id,
            &order.ticker,
            order.side,
            order.requested_quantity,
            order.limit_price,
        ) {
            Ok(broker_id) => {
                order.broker_id = Some(broker_id);
                order.status = OrderStatus::Submitted;
                info!(
                    ticker = %order.ticker,
                    side = %order.side,
                    qty = order.requested_quantity,
                    price = order.limit_price,
                    client_id = %order.client_id,
                    outcome = "submitted",
                    "order placed"
                );
            }
            Err(e) => self.fail(order, e),
        }
    }

    fn refresh(&mut self, gateway: &dyn GatewayPort, order: &mut Order) {
        let Some(broker_id) = order.broker_id.clone() else {
            return;
        };
        let report = match gateway.get_order_status(&broker_id) {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    ticker = %order.ticker,
                    client_id = %order.client_id,
                    error = %e,
                    "order status poll failed"
                );
                return;
            }
        };

        let before = order.status;
        if report.state == BrokerOrderState::Rejected {
            let reason = report
                .message
                .clone()
                .unwrap_or_else(|| "rejected by broker".to_string());
            if report.filled_quantity > 0 {
                order.filled_quantity = report.filled_quantity.min(order.requested_quantity);
                order.avg_fill_price = report.avg_fill_price;
            }
            self.fail(order, GatewayError::classify(reason));
            return;
        }

        let status = order.apply_report(&report);
        if status != before {
            info!(
                ticker = %order.ticker,
                side = %order.side,
                qty = order.requested_quantity,
                filled = order.filled_quantity,
                price = order.avg_fill_price,
                outcome = %status,
                "order status changed"
            );
        }
        if status == OrderStatus::Filled && before != OrderStatus::Filled {
            self.outcomes.push(ExecutionOutcome::Filled {
                signal_id: order.signal_id.clone(),
                ticker: order.ticker.clone(),
                quantity: order.filled_quantity,
                price: order.avg_fill_price,
            });
        }
        if status == OrderStatus::Cancelled && before != OrderStatus::Cancelled {
            self.outcomes.push(ExecutionOutcome::Cancelled {
                signal_id: order.signal_id.clone(),
                ticker: order.ticker.clone(),
                opening: order.opening,
                filled: order.total_filled(),
            });
        }
    }

    fn fail(&mut self, order: &mut Order, err: GatewayError) {
        order.last_error = Some(err.reason.clone());
        if !err.is_transient() {
            order.status = OrderStatus::Rejected { retryable: false };
            error!(
                ticker = %order.ticker,
                side = %order.side,
                qty = order.requested_quantity,
                price = order.limit_price,
                error = %err,
                outcome = "rejected",
                "order rejected permanently"
            );
            self.outcomes.push(ExecutionOutcome::Rejected {
                signal_id: order.signal_id.clone(),
                ticker: order.ticker.clone(),
                opening: order.opening,
                filled: order.total_filled(),
                reason: err.reason,
            });
        } else if order.retry_count >= self.max_retries {
            order.status = OrderStatus::Abandoned;
            error!(
                ticker = %order.ticker,
                side = %order.side,
                qty = order.remaining_quantity(),
                price = order.limit_price,
                retries = order.retry_count,
                error = %err,
                outcome = "abandoned",
                "order abandoned after exhausting retries"
            );
            self.outcomes.push(ExecutionOutcome::Abandoned {
                signal_id: order.signal_id.clone(),
                ticker: order.ticker.clone(),
                opening: order.opening,
                filled: order.total_filled(),
                retries: order.retry_count,
                reason: err.reason,
            });
        } else {
            order.status = OrderStatus::Rejected { retryable: true };
            warn!(
                ticker = %order.ticker,
                side = %order.side,
                qty = order.remaining_quantity(),
                price = order.limit_price,
                retry = order.retry_count,
                error = %err,
                outcome = "retry_scheduled",
                "transient order failure"
            );
        }
    }

    fn track(&mut self, order: Order) {
        if order.status.is_terminal() {
            if self.history.len() == self.history_capacity {
                self.history.pop_front();
            }
            self.history.push_back(order);
        } else {
            self.active.push(order);
        }
    }
}
