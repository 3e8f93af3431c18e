//! The trading cycle and its driver.
//!
//! One cycle runs `FetchMarketData -> RunScreenerAndRisk -> ExecuteOrders ->
//! EmitMetrics`. [`TradingLoop::run`] repeats cycles with a sleep between
//! them and moves to `ErrorBackoff` when a cycle fails. Tickers are handled
//! one at a time in configured order.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use chrono::{DateTime, Utc};

use crate::domain::backoff::Backoff;
use crate::domain::config::TradingConfig;
use crate::domain::error::TraderError;
use crate::domain::executor::{ExecutionOutcome, OrderExecutor};
use crate::domain::market::MarketSnapshot;
use crate::domain::metrics::CycleMetrics;
use crate::domain::order::{Order, OrderRequest, OrderSide};
use crate::domain::portfolio::PortfolioState;
use crate::domain::position_manager::PositionManager;
use crate::domain::risk::{self, RiskDecision};
use crate::domain::signal::{Direction, RejectReason, Signal, SignalJournal, SignalOutcome};
use crate::domain::status::EngineStatus;
use crate::domain::strategy::{Strategy, build_strategy};
use crate::ports::clock_port::{Clock, Sleeper};
use crate::ports::gateway_port::GatewayPort;
use crate::ports::status_port::StatusPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopPhase {
    Idle,
    FetchMarketData,
    RunScreenerAndRisk,
    ExecuteOrders,
    EmitMetrics,
    Sleep,
    ErrorBackoff,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles_attempted: u64,
    pub cycles_failed: u64,
}

/// An entry that passed risk, waiting for the execution phase.
struct PlannedEntry {
    signal: Signal,
    quantity: i64,
}

pub struct TradingLoop<'a> {
    config: &'a TradingConfig,
    strategy: Box<dyn Strategy>,
    positions: PositionManager,
    executor: OrderExecutor,
    journal: SignalJournal,
    backoff: Backoff,
    status_port: Option<Box<dyn StatusPort + 'a>>,
    phase: LoopPhase,
    peak_equity: f64,
    entries_halted: bool,
    cycles_completed: u64,
    last_state: Option<PortfolioState>,
    last_metrics: Option<CycleMetrics>,
    last_error: Option<String>,
}

impl<'a> TradingLoop<'a> {
    pub fn new(config: &'a TradingConfig) -> Self {
        Self::with_strategy(config, build_strategy(config))
    }

    pub fn with_strategy(config: &'a TradingConfig, strategy: Box<dyn Strategy>) -> Self {
        TradingLoop {
            config,
            strategy,
            positions: PositionManager::new(config.profit_threshold),
            executor: OrderExecutor::new(
                config.execution.max_retries,
                config.status.journal_capacity,
            ),
            journal: SignalJournal::new(config.status.journal_capacity),
            backoff: Backoff::new(config.execution.backoff_base, config.execution.backoff_cap),
            status_port: None,
            phase: LoopPhase::Idle,
            peak_equity: 0.0,
            entries_halted: false,
            cycles_completed: 0,
            last_state: None,
            last_metrics: None,
            last_error: None,
        }
    }

    pub fn with_status_port(mut self, port: Box<dyn StatusPort + 'a>) -> Self {
        self.status_port = Some(port);
        self
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn entries_halted(&self) -> bool {
        self.entries_halted
    }

    pub fn peak_equity(&self) -> f64 {
        self.peak_equity
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn journal(&self) -> &SignalJournal {
        &self.journal
    }

    pub fn executor(&self) -> &OrderExecutor {
        &self.executor
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    pub fn last_state(&self) -> Option<&PortfolioState> {
        self.last_state.as_ref()
    }

    /// Clear the drawdown latch and restart the high-water mark from the
    /// next observed equity.
    pub fn reset_drawdown_halt(&mut self) {
        if self.entries_halted {
            info!(peak = self.peak_equity, "drawdown halt reset");
        }
        self.entries_halted = false;
        self.peak_equity = 0.0;
    }

    /// Repeat cycles until `shutdown` is set or `max_cycles` have been
    /// attempted, then reconcile in-flight orders once.
    pub fn run(
        &mut self,
        gateway: &dyn GatewayPort,
        clock: &dyn Clock,
        sleeper: &dyn Sleeper,
        shutdown: &AtomicBool,
        max_cycles: Option<u64>,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        info!(
            strategy = self.strategy.name(),
            tickers = ?self.config.tickers,
            interval_secs = self.config.check_interval.as_secs(),
            "trading loop started"
        );

        while !shutdown.load(Ordering::SeqCst) {
            if max_cycles.is_some_and(|max| summary.cycles_attempted >= max) {
                break;
            }
            summary.cycles_attempted += 1;
            self.phase = LoopPhase::Idle;

            let delay = match self.run_cycle(gateway, clock) {
                Ok(_) => {
                    self.backoff.reset();
                    self.last_error = None;
                    self.phase = LoopPhase::Sleep;
                    self.config.check_interval
                }
                Err(e) => {
                    summary.cycles_failed += 1;
                    self.phase = LoopPhase::ErrorBackoff;
                    let delay = self.backoff.next_delay();
                    error!(
                        error = %e,
                        attempt = self.backoff.attempt(),
                        delay_secs = delay.as_secs_f64(),
                        "cycle failed, backing off"
                    );
                    self.last_error = Some(e.to_string());
                    self.publish_status(clock.now());
                    delay
                }
            };

            if max_cycles.is_some_and(|max| summary.cycles_attempted >= max) {
                break;
            }
            if !sleeper.sleep(delay) {
                break;
            }
        }

        self.phase = LoopPhase::Idle;
        self.shutdown(gateway);
        info!(
            cycles = summary.cycles_attempted,
            failed = summary.cycles_failed,
            "trading loop stopped"
        );
        summary
    }

    /// Poll in-flight orders once and report the ones that remain open.
    pub fn shutdown(&mut self, gateway: &dyn GatewayPort) -> Vec<Order> {
        self.executor.poll_open(gateway);
        let outcomes = self.executor.drain_outcomes();
        self.apply_outcomes(outcomes, None);
        let unresolved: Vec<Order> = self.executor.active_orders().to_vec();
        for order in &unresolved {
            warn!(
                ticker = %order.ticker,
                side = %order.side,
                qty = order.requested_quantity,
                filled = order.filled_quantity,
                price = order.limit_price,
                status = %order.status,
                client_id = %order.client_id,
                broker_id = order.broker_id.as_deref().unwrap_or("-"),
                "unresolved order at shutdown, reconcile manually"
            );
        }
        unresolved
    }

    /// Run one full cycle. Errors here are cycle-level: the caller backs off.
    pub fn run_cycle(
        &mut self,
        gateway: &dyn GatewayPort,
        clock: &dyn Clock,
    ) -> Result<CycleMetrics, TraderError> {
        let now = clock.now();
        let mut metrics = CycleMetrics::start(self.cycles_completed + 1, now);

        self.phase = LoopPhase::FetchMarketData;
        self.executor.poll_open(gateway);
        let outcomes = self.executor.drain_outcomes();
        self.apply_outcomes(outcomes, Some(&mut metrics));

        let account = gateway.get_account_summary()?;
        let broker_positions = gateway.get_positions()?;
        self.update_drawdown(account.equity);
        self.positions.reconcile(&broker_positions, now);

        let mut state = PortfolioState {
            equity: account.equity,
            buying_power: account.buying_power,
            realized_pnl: account.realized_pnl,
            peak_equity: self.peak_equity,
            positions: self.positions.positions().to_vec(),
            pending_entries: self.executor.pending_entry_tickers(),
            entries_halted: self.entries_halted,
        };

        let snapshots = self.fetch_snapshots(gateway, &mut metrics);

        self.phase = LoopPhase::RunScreenerAndRisk;
        let prices: HashMap<String, f64> = snapshots
            .iter()
            .map(|(t, s)| (t.clone(), s.last_price))
            .collect();
        let exits: Vec<Signal> = self
            .positions
            .check_exits(&prices, now)
            .into_iter()
            .filter(|s| {
                let live = self.executor.has_live_order(&s.ticker);
                if live {
                    debug!(ticker = %s.ticker, "exit already working");
                }
                !live
            })
            .collect();
        metrics.exits_triggered = exits.len() as u32;

        let config = self.config;
        let mut planned = Vec::new();
        for ticker in &config.tickers {
            metrics.tickers_screened += 1;
            if let Some(entry) =
                self.screen_ticker(gateway, ticker, &snapshots, &mut state, &mut metrics)
            {
                planned.push(entry);
            }
        }

        self.phase = LoopPhase::ExecuteOrders;
        self.executor.resubmit_due(gateway, now);
        for exit in exits {
            self.submit_exit(gateway, exit, &snapshots, now, &mut metrics);
        }
        for entry in planned {
            self.submit_entry(gateway, entry, now, &mut metrics);
        }
        let outcomes = self.executor.drain_outcomes();
        self.apply_outcomes(outcomes, Some(&mut metrics));

        self.phase = LoopPhase::EmitMetrics;
        metrics.finish(clock.now());
        metrics.log();
        self.cycles_completed += 1;
        self.last_state = Some(state);
        self.last_metrics = Some(metrics.clone());
        self.publish_status(clock.now());

        Ok(metrics)
    }

    pub fn status(&self, now: DateTime<Utc>) -> EngineStatus {
        EngineStatus {
            account_id: self.config.account_id.clone(),
            strategy: self.strategy.name().to_string(),
            updated_at: now,
            cycles_completed: self.cycles_completed,
            consecutive_failures: self.backoff.attempt(),
            last_error: self.last_error.clone(),
            portfolio: self.last_state.clone(),
            recent_signals: self.journal.records(),
            recent_orders: self.executor.recent_orders(),
            last_cycle: self.last_metrics.clone(),
        }
    }

    fn publish_status(&self, now: DateTime<Utc>) {
        if let Some(port) = &self.status_port {
            if let Err(e) = port.publish(&self.status(now)) {
                warn!(error = %e, "failed to publish status");
            }
        }
    }

    fn update_drawdown(&mut self, equity: f64) {
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        let state = PortfolioState::new(equity, 0.0, self.peak_equity);
        if !self.entries_halted && risk::drawdown_breached(&state, &self.config.risk) {
            self.entries_halted = true;
            error!(
                equity,
                peak = self.peak_equity,
                drawdown = state.drawdown(),
                max_drawdown = self.config.risk.max_drawdown,
                "max drawdown reached, new entries halted until reset"
            );
        }
    }

    /// Quotes for the universe in configured order, then for any other held
    /// ticker so its exits can still be checked.
    fn fetch_snapshots(
        &self,
        gateway: &dyn GatewayPort,
        metrics: &mut CycleMetrics,
    ) -> HashMap<String, MarketSnapshot> {
        let mut snapshots = HashMap::new();
        let held = self.positions.positions().iter().map(|p| &p.ticker);
        for ticker in self.config.tickers.iter().chain(held) {
            if snapshots.contains_key(ticker) {
                continue;
            }
            match gateway.get_market_snapshot(ticker) {
                Ok(snap) => {
                    snapshots.insert(ticker.clone(), snap);
                }
                Err(e) => {
                    metrics.errors += 1;
                    warn!(ticker = %ticker, error = %e, "market snapshot failed");
                }
            }
        }
        snapshots
    }

    fn screen_ticker(
        &mut self,
        gateway: &dyn GatewayPort,
        ticker: &str,
        snapshots: &HashMap<String, MarketSnapshot>,
        state: &mut PortfolioState,
        metrics: &mut CycleMetrics,
    ) -> Option<PlannedEntry> {
        if state.holds(ticker) || self.executor.has_live_order(ticker) {
            debug!(ticker = %ticker, "already held or order working, not screening");
            return None;
        }
        let snapshot = snapshots.get(ticker)?;

        let bars = match gateway.get_history(ticker, self.config.execution.history_lookback) {
            Ok(bars) => bars,
            Err(e) => {
                metrics.errors += 1;
                warn!(ticker = %ticker, error = %e, "history fetch failed");
                return None;
            }
        };
        let signal = match self.strategy.generate_signal(ticker, &bars) {
            Ok(signal) => signal,
            Err(e) => {
                metrics.errors += 1;
                warn!(ticker = %ticker, error = %e, "screening failed");
                return None;
            }
        };
        if !signal.is_actionable() {
            debug!(ticker = %ticker, close = signal.reference_price, "no signal");
            return None;
        }
        metrics.signals_generated += 1;
        info!(
            ticker = %ticker,
            direction = %signal.direction,
            strength = signal.strength,
            price = signal.reference_price,
            limit = signal.limit_price,
            stop = signal.stop_price,
            target = signal.target_price,
            "signal generated"
        );

        if !self.strategy.validate_signal(&signal, snapshot) {
            warn!(
                ticker = %ticker,
                last = snapshot.last_price,
                stop = signal.stop_price,
                target = signal.target_price,
                reason = %RejectReason::SignalInvalidated,
                "signal rejected"
            );
            self.reject(signal, RejectReason::SignalInvalidated, metrics);
            return None;
        }

        let allocation = match risk::evaluate(&signal, state, &self.config.risk) {
            RiskDecision::Accept { allocation, capped } => {
                if capped {
                    info!(ticker = %ticker, allocation, "allocation capped by position size limit");
                }
                allocation
            }
            RiskDecision::Reject { reason, detail } => {
                warn!(ticker = %ticker, reason = %reason, detail = %detail, "signal rejected");
                self.reject(signal, reason, metrics);
                return None;
            }
        };

        let quantity = self
            .strategy
            .calculate_position_size(&signal, allocation, &self.positions);
        if quantity <= 0 {
            warn!(
                ticker = %ticker,
                allocation,
                price = signal.entry_price(),
                reason = %RejectReason::SizeBelowMinimum,
                "signal rejected"
            );
            self.reject(signal, RejectReason::SizeBelowMinimum, metrics);
            return None;
        }

        metrics.signals_accepted += 1;
        *state = state.with_pending_entry(ticker, quantity as f64 * signal.entry_price());
        self.journal.record(
            signal.clone(),
            SignalOutcome::Accepted {
                allocation,
                quantity,
            },
        );
        Some(PlannedEntry { signal, quantity })
    }

    fn reject(&mut self, signal: Signal, reason: RejectReason, metrics: &mut CycleMetrics) {
        metrics.signals_rejected += 1;
        self.journal
            .record(signal, SignalOutcome::Rejected { reason });
    }

    fn submit_exit(
        &mut self,
        gateway: &dyn GatewayPort,
        exit: Signal,
        snapshots: &HashMap<String, MarketSnapshot>,
        now: DateTime<Utc>,
        metrics: &mut CycleMetrics,
    ) {
        let Some(position) = self.positions.position(&exit.ticker) else {
            return;
        };
        let quantity = position.quantity.unsigned_abs() as i64;
        let side = if position.is_short() {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        let limit_price = snapshots
            .get(&exit.ticker)
            .map(|s| s.marketable_price(side == OrderSide::Buy))
            .unwrap_or(exit.reference_price);

        let request = OrderRequest {
            signal_id: exit.id.clone(),
            ticker: exit.ticker.clone(),
            side,
            quantity,
            limit_price,
            opening: false,
        };
        self.journal.record(
            exit,
            SignalOutcome::Accepted {
                allocation: quantity as f64 * limit_price,
                quantity,
            },
        );
        let order = self.executor.submit(gateway, &request, now);
        if order.broker_id.is_some() {
            metrics.orders_placed += 1;
        }
    }

    fn submit_entry(
        &mut self,
        gateway: &dyn GatewayPort,
        entry: PlannedEntry,
        now: DateTime<Utc>,
        metrics: &mut CycleMetrics,
    ) {
        let signal = entry.signal;
        let side = if signal.direction == Direction::Short {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        let request = OrderRequest {
            signal_id: signal.id.clone(),
            ticker: signal.ticker.clone(),
            side,
            quantity: entry.quantity,
            limit_price: signal.entry_price(),
            opening: true,
        };
        let order = self.executor.submit(gateway, &request, now);
        if order.broker_id.is_some() {
            metrics.orders_placed += 1;
        }
        if !order.status.is_terminal() {
            self.positions.register_protection(
                &signal.ticker,
                signal.stop_price,
                signal.target_price,
                now,
            );
        }
    }

    fn apply_outcomes(
        &mut self,
        outcomes: Vec<ExecutionOutcome>,
        mut metrics: Option<&mut CycleMetrics>,
    ) {
        for outcome in outcomes {
            let (signal_id, ticker, opening, filled, reason) = match outcome {
                ExecutionOutcome::Filled {
                    ticker,
                    quantity,
                    price,
                    ..
                } => {
                    info!(ticker = %ticker, qty = quantity, price, "order filled");
                    continue;
                }
                ExecutionOutcome::Cancelled {
                    signal_id,
                    ticker,
                    opening,
                    filled,
                } => (signal_id, ticker, opening, filled, "cancelled by broker".to_string()),
                ExecutionOutcome::Abandoned {
                    signal_id,
                    ticker,
                    opening,
                    filled,
                    reason,
                    ..
                }
                | ExecutionOutcome::Rejected {
                    signal_id,
                    ticker,
                    opening,
                    filled,
                    reason,
                } => (signal_id, ticker, opening, filled, reason),
            };
            if let Some(m) = metrics.as_deref_mut() {
                m.orders_failed += 1;
            }
            if filled > 0 {
                warn!(ticker = %ticker, filled, reason = %reason, "order ended partially filled");
                continue;
            }
            self.journal.mark_skipped(&signal_id, &reason);
            if opening && self.positions.position(&ticker).is_none() {
                self.positions.discard_protection(&ticker);
            }
        }
    }
}
