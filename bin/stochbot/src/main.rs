use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::Config;
use engine::{load_bars_csv, write_trades_csv, Backtest};
use paper::PaperClient;
use strategy::{StochasticAtrStrategy, Strategy, StrategyFileConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // ── Config ───────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid environment configuration")?;
    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)?;
    info!(
        symbol = %strategy_file.symbol.code,
        timeframe = %strategy_file.timeframe,
        "StochBot starting"
    );

    // ── Market data ──────────────────────────────────────────────────────────
    let bars = load_bars_csv(&cfg.bars_path)?;
    let Some(first) = bars.first() else {
        bail!("no bars in '{}'", cfg.bars_path.display());
    };

    // ── Paper broker ─────────────────────────────────────────────────────────
    let paper = Arc::new(PaperClient::new(
        strategy_file.symbol.clone(),
        strategy_file.timeframe,
        cfg.paper_initial_balance,
        cfg.paper_slippage_pips,
        first.open_time,
    ));

    // ── Strategy ─────────────────────────────────────────────────────────────
    let strategy = StochasticAtrStrategy::from_config(&strategy_file)?;
    info!(strategy = strategy.name(), "Strategy loaded");

    // ── Run ──────────────────────────────────────────────────────────────────
    let report = Backtest::new(Box::new(strategy), paper).await?.run(&bars).await?;

    let json = report.to_json()?;
    match &cfg.report_path {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("failed to write report to '{}'", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => info!("Backtest report:\n{json}"),
    }

    if let Some(path) = &cfg.trades_csv_path {
        write_trades_csv(path, &report.trades)?;
        info!(path = %path.display(), trades = report.trades.len(), "Trades exported");
    }

    Ok(())
}
