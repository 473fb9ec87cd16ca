use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use common::{Bar, EngineState, ExchangeClient, Result, TradeRecord};
use paper::PaperClient;
use strategy::Strategy;

use crate::lifecycle::{BarOutcome, ShutdownSummary, StrategyRunner};

/// Replays bars through a strategy on the paper broker.
pub struct Backtest {
    runner: StrategyRunner,
    paper: Arc<PaperClient>,
}

/// Result of one backtest run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub label: String,
    pub bars_processed: usize,
    pub orders_submitted: usize,
    pub halt_reason: Option<String>,
    pub shutdown: ShutdownSummary,
    pub trades: Vec<TradeRecord>,
    pub wins: usize,
    /// Break-even trades count as neither wins nor losses.
    pub losses: usize,
    pub net_pips: f64,
    pub net_profit: f64,
    pub final_balance: f64,
}

impl BacktestReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Backtest {
    pub async fn new(strategy: Box<dyn Strategy>, paper: Arc<PaperClient>) -> Result<Self> {
        let client: Arc<dyn ExchangeClient> = paper.clone();
        let runner = StrategyRunner::start(strategy, client).await?;
        Ok(Self { runner, paper })
    }

    pub fn runner(&self) -> &StrategyRunner {
        &self.runner
    }

    /// Feed `bars` in order. The paper broker sees each bar before the
    /// strategy does, so protective exits on a bar settle before the entry
    /// decision for that bar. The run ends early once the strategy stops;
    /// shutdown cleanup always runs, and a strategy fault is returned after it
    /// even when the cleanup itself fails.
    pub async fn run(mut self, bars: &[Bar]) -> Result<BacktestReport> {
        info!(bars = bars.len(), label = %self.runner.label(), "Backtest starting");

        let mut bars_processed = 0;
        let mut fault = None;
        for bar in bars {
            for trade in self.paper.process_bar(bar).await {
                info!(
                    id = %trade.position_id,
                    side = %trade.trade_type,
                    reason = %trade.close_reason,
                    pips = trade.pips,
                    "Position closed"
                );
            }

            match self.runner.on_bar(bar).await {
                Ok(BarOutcome::Halted) => break,
                Ok(_) => bars_processed += 1,
                Err(e) => {
                    bars_processed += 1;
                    fault = Some(e);
                    break;
                }
            }

            if self.runner.state() == EngineState::Stopped {
                break;
            }
        }

        let shutdown = self.runner.stop().await;
        if let Some(e) = fault {
            if let Err(cleanup) = &shutdown {
                warn!(error = %cleanup, "Shutdown cleanup failed after strategy fault");
            }
            warn!(error = %e, "Backtest aborted by strategy fault");
            return Err(e);
        }
        let shutdown = shutdown?;

        let trades = self.paper.history().await?;
        let wins = trades.iter().filter(|t| t.net_profit > 0.0).count();
        let losses = trades.iter().filter(|t| t.net_profit < 0.0).count();
        let report = BacktestReport {
            label: self.runner.label().to_string(),
            bars_processed,
            orders_submitted: self.runner.orders_submitted(),
            halt_reason: self.runner.halt_reason().map(str::to_string),
            shutdown,
            wins,
            losses,
            net_pips: trades.iter().map(|t| t.pips).sum(),
            net_profit: trades.iter().map(|t| t.net_profit).sum(),
            final_balance: self.paper.balance().await,
            trades,
        };

        info!(
            bars = report.bars_processed,
            trades = report.trades.len(),
            net_pips = report.net_pips,
            balance = report.final_balance,
            "Backtest finished"
        );
        Ok(report)
    }
}
