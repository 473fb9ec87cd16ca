use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use common::{
    Bar, EngineState, ExchangeClient, Order, Position, Result, TradeError, TradingMode,
};
use strategy::{Decision, EntryIntent, SkipReason, Strategy};

use crate::executor::OrderExecutor;

/// What happened on one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum BarOutcome {
    Skipped(SkipReason),
    /// The host accepted the entry.
    Entered {
        order: Order,
        position: Option<Position>,
    },
    /// The host refused the entry; the runner is now stopped.
    Rejected(TradeError),
    /// The runner was already stopped; the bar was ignored.
    Halted,
}

/// Cleanup performed by `StrategyRunner::stop`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownSummary {
    pub positions_closed: usize,
    pub orders_cancelled: usize,
    /// Close or cancel requests the host refused.
    pub refused: usize,
}

/// Drives one strategy instance against a host.
///
/// `Running → Stopped`, nothing else. The runner stops on an order rejection,
/// on any host fault while evaluating a bar, or on an explicit `stop()`.
/// Once stopped it never submits another order.
pub struct StrategyRunner {
    strategy: Box<dyn Strategy>,
    client: Arc<dyn ExchangeClient>,
    executor: OrderExecutor,
    label: String,
    state: EngineState,
    halt_reason: Option<String>,
}

impl StrategyRunner {
    /// Start `strategy` on `client`. The position label is fixed here from the
    /// symbol, timeframe and host clock, so separate runs never share a label.
    pub async fn start(strategy: Box<dyn Strategy>, client: Arc<dyn ExchangeClient>) -> Result<Self> {
        let server_time = client.server_time().await?;
        let label = format!(
            "{}{}{}",
            strategy.symbol().code,
            strategy.timeframe(),
            server_time.timestamp_millis()
        );

        info!(
            name = %strategy.name(),
            label = %label,
            mode = %client.mode(),
            "Strategy started"
        );
        for line in strategy.describe_rules() {
            info!("{line}");
        }
        info!("*****************************************");

        Ok(Self {
            executor: OrderExecutor::new(client.clone()),
            strategy,
            client,
            label,
            state: EngineState::Running,
            halt_reason: None,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn halt_reason(&self) -> Option<&str> {
        self.halt_reason.as_deref()
    }

    pub fn orders_submitted(&self) -> usize {
        self.executor.submitted()
    }

    /// Handle one newly closed bar.
    ///
    /// A refused order stops the runner and returns `Ok(Rejected)`. A host
    /// fault stops the runner and is returned as the `Err`.
    pub async fn on_bar(&mut self, bar: &Bar) -> Result<BarOutcome> {
        if self.state == EngineState::Stopped {
            return Ok(BarOutcome::Halted);
        }

        self.strategy.on_bar(bar);

        match self.evaluate_and_trade().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(
                    label = %self.label,
                    open_time = %bar.open_time,
                    error = %e,
                    detail = ?e,
                    "Strategy fault while evaluating bar"
                );
                self.halt(format!("fault: {e}"));
                Err(e)
            }
        }
    }

    async fn evaluate_and_trade(&mut self) -> Result<BarOutcome> {
        let positions = self.client.open_positions().await?;
        let history = self.client.history().await?;

        let intent = match self.strategy.evaluate(&self.label, &positions, &history) {
            Decision::Skip(reason) => {
                debug!(label = %self.label, reason = %reason, "No entry");
                return Ok(BarOutcome::Skipped(reason));
            }
            Decision::Enter(intent) => intent,
        };

        let order = self.entry_order(&intent);
        let message = format!(
            "Order Executed | Data for Reference: SO PercentK: {:.2}, ATR: {:.2}",
            intent.percent_k, intent.atr_pips
        );
        let result = self.executor.execute(&order, &message).await?;

        if result.is_successful {
            return Ok(BarOutcome::Entered {
                order,
                position: result.position,
            });
        }

        let reason = result
            .error
            .unwrap_or_else(|| TradeError::Other("unspecified".into()));
        self.halt(format!("order rejected: {reason}"));
        Ok(BarOutcome::Rejected(reason))
    }

    fn entry_order(&self, intent: &EntryIntent) -> Order {
        Order::market(
            self.strategy.symbol().code.clone(),
            intent.trade_type,
            intent.volume,
            self.label.clone(),
        )
        .with_protection(intent.stop_loss_pips, intent.take_profit_pips)
    }

    fn halt(&mut self, reason: String) {
        if self.state == EngineState::Running {
            warn!(label = %self.label, reason = %reason, "Strategy halted");
            self.state = EngineState::Stopped;
            self.halt_reason = Some(reason);
        }
    }

    /// Stop the strategy and, when the host is a backtest, flatten the book:
    /// every open position is closed and every pending order cancelled,
    /// whatever their label. A close or cancel that fails is counted as
    /// refused and the rest of the book is still flattened.
    pub async fn stop(&mut self) -> Result<ShutdownSummary> {
        if self.state == EngineState::Running {
            info!(label = %self.label, "Strategy stopping");
            self.state = EngineState::Stopped;
        }

        let mut summary = ShutdownSummary::default();
        if self.client.mode() != TradingMode::Backtest {
            return Ok(summary);
        }

        for position in self.client.open_positions().await? {
            match self.client.close_position(&position.id).await {
                Ok(result) if result.is_successful => summary.positions_closed += 1,
                Ok(result) => {
                    summary.refused += 1;
                    warn!(id = %position.id, error = ?result.error, "Close refused on shutdown");
                }
                Err(e) => {
                    summary.refused += 1;
                    error!(id = %position.id, error = %e, "Close failed on shutdown");
                }
            }
        }

        for order in self.client.pending_orders().await? {
            match self.client.cancel_pending_order(&order.id).await {
                Ok(result) if result.is_successful => summary.orders_cancelled += 1,
                Ok(result) => {
                    summary.refused += 1;
                    warn!(id = %order.id, error = ?result.error, "Cancel refused on shutdown");
                }
                Err(e) => {
                    summary.refused += 1;
                    error!(id = %order.id, error = %e, "Cancel failed on shutdown");
                }
            }
        }

        info!(
            closed = summary.positions_closed,
            cancelled = summary.orders_cancelled,
            refused = summary.refused,
            "Backtest shutdown cleanup done"
        );
        Ok(summary)
    }
}
