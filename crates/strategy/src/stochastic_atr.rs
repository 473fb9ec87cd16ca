use chrono::{DateTime, Utc};
use tracing::trace;

use common::{Bar, Position, Result, Series, Symbol, Timeframe, TradeRecord};

use crate::config::{StrategyFileConfig, StrategyParams};
use crate::decision::{decide, Decision, DecisionInput};
use crate::indicators::{AverageTrueRange, BarIndicator, StochasticOscillator};
use crate::signal::Thresholds;
use crate::Strategy;

/// Buys oversold and sells overbought stochastic readings, once per signal
/// episode, while ATR is above a minimum.
pub struct StochasticAtrStrategy {
    name: String,
    params: StrategyParams,
    thresholds: Thresholds,
    symbol: Symbol,
    timeframe: Timeframe,
    stochastic: StochasticOscillator,
    atr: AverageTrueRange,
    open_times: Series<DateTime<Utc>>,
}

impl StochasticAtrStrategy {
    pub fn new(params: StrategyParams, symbol: Symbol, timeframe: Timeframe) -> Result<Self> {
        params.validate()?;
        let thresholds = Thresholds::from_params(&params.stochastic)?;
        let so = &params.stochastic;
        Ok(Self {
            name: format!("Stochastic/ATR {} {timeframe}", symbol.code),
            stochastic: StochasticOscillator::new(so.k_periods, so.slowing, so.d_periods),
            atr: AverageTrueRange::new(params.atr.periods),
            thresholds,
            params,
            symbol,
            timeframe,
            open_times: Series::new(),
        })
    }

    pub fn from_config(cfg: &StrategyFileConfig) -> Result<Self> {
        Self::new(cfg.strategy.clone(), cfg.symbol.clone(), cfg.timeframe)
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn stochastic(&self) -> &StochasticOscillator {
        &self.stochastic
    }

    pub fn atr(&self) -> &AverageTrueRange {
        &self.atr
    }

    pub fn bars_seen(&self) -> usize {
        self.open_times.len()
    }
}

impl Strategy for StochasticAtrStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    fn describe_rules(&self) -> Vec<String> {
        let so = &self.params.stochastic;
        vec![
            "Bot Rules:".to_string(),
            format!(
                "Buys below %K {} and sells above %K {} (stochastic {}/{}/{}), filtered by ATR({}) > {} pips.",
                so.oversold,
                so.overbought,
                so.k_periods,
                so.slowing,
                so.d_periods,
                self.params.atr.periods,
                self.params.atr.filter_pips
            ),
            format!(
                "Size {} lots, SL {} pips, TP {} pips, one position per signal episode.",
                self.params.lot_size, self.params.stop_loss_pips, self.params.take_profit_pips
            ),
        ]
    }

    fn on_bar(&mut self, bar: &Bar) {
        self.stochastic.update(bar);
        self.atr.update(bar);
        self.open_times.push(bar.open_time);
        trace!(
            open_time = %bar.open_time,
            percent_k = ?self.stochastic.percent_k().value(0),
            atr = ?self.atr.result().value(0),
            "Indicators updated"
        );
    }

    fn evaluate(&self, label: &str, positions: &[Position], history: &[TradeRecord]) -> Decision {
        decide(&DecisionInput {
            params: &self.params,
            thresholds: &self.thresholds,
            symbol: &self.symbol,
            timeframe: self.timeframe,
            label,
            percent_k: self.stochastic.percent_k(),
            atr: self.atr.result(),
            open_times: &self.open_times,
            positions,
            history,
        })
    }
}
