use std::path::Path;

use serde::{Deserialize, Serialize};

use common::{Error, Result, Symbol, Timeframe};

/// Top-level strategy config file (TOML).
///
/// Example `config/strategy.toml`:
/// ```toml
/// timeframe = "H1"
///
/// [symbol]
/// code = "EURUSD"
/// pip_size = 0.0001
///
/// [strategy]
/// lot_size = 0.01
/// stop_loss_pips = 10.0
/// take_profit_pips = 10.0
///
/// [strategy.stochastic]
/// k_periods = 9
/// d_periods = 9
/// slowing = 3
/// overbought = 80.0
/// oversold = 20.0
///
/// [strategy.atr]
/// periods = 14
/// filter_pips = 10.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    pub timeframe: Timeframe,
    pub symbol: Symbol,
    #[serde(default)]
    pub strategy: StrategyParams,
}

impl StrategyFileConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read strategy config at '{}': {e}",
                path.display()
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: StrategyFileConfig = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let symbol = &self.symbol;
        if symbol.code.trim().is_empty() {
            return Err(Error::Config("symbol.code must not be empty".into()));
        }
        if !positive(symbol.pip_size) {
            return Err(Error::Config(format!(
                "symbol.pip_size must be positive, got {}",
                symbol.pip_size
            )));
        }
        if !positive(symbol.lot_size) || !positive(symbol.volume_step) {
            return Err(Error::Config(
                "symbol.lot_size and symbol.volume_step must be positive".into(),
            ));
        }
        if !non_negative(symbol.volume_min)
            || symbol.volume_max.is_nan()
            || symbol.volume_min > symbol.volume_max
        {
            return Err(Error::Config(
                "symbol.volume_min must be within 0..=symbol.volume_max".into(),
            ));
        }
        self.strategy.validate()
    }
}

/// Parameters of the stochastic/ATR entry strategy. Immutable for a run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyParams {
    /// Position size in lots.
    pub lot_size: f64,
    pub stop_loss_pips: f64,
    pub take_profit_pips: f64,
    pub stochastic: StochasticParams,
    pub atr: AtrParams,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            lot_size: 0.01,
            stop_loss_pips: 10.0,
            take_profit_pips: 10.0,
            stochastic: StochasticParams::default(),
            atr: AtrParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StochasticParams {
    pub k_periods: usize,
    pub d_periods: usize,
    pub slowing: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for StochasticParams {
    fn default() -> Self {
        Self {
            k_periods: 9,
            d_periods: 9,
            slowing: 3,
            overbought: 80.0,
            oversold: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AtrParams {
    pub periods: usize,
    /// Minimum ATR, in pips, required before any entry.
    pub filter_pips: f64,
}

impl Default for AtrParams {
    fn default() -> Self {
        Self {
            periods: 14,
            filter_pips: 10.0,
        }
    }
}

impl StrategyParams {
    pub fn validate(&self) -> Result<()> {
        let so = &self.stochastic;
        if so.k_periods == 0 || so.d_periods == 0 || so.slowing == 0 {
            return Err(Error::Config(
                "stochastic k_periods, d_periods and slowing must be >= 1".into(),
            ));
        }
        if !so.oversold.is_finite() || !so.overbought.is_finite() || so.oversold >= so.overbought {
            return Err(Error::Config(format!(
                "stochastic oversold ({}) must be below overbought ({})",
                so.oversold, so.overbought
            )));
        }
        if self.atr.periods == 0 {
            return Err(Error::Config("atr periods must be >= 1".into()));
        }
        if !positive(self.lot_size) {
            return Err(Error::Config(format!(
                "lot_size must be positive, got {}",
                self.lot_size
            )));
        }
        if !non_negative(self.stop_loss_pips)
            || !non_negative(self.take_profit_pips)
            || !non_negative(self.atr.filter_pips)
        {
            return Err(Error::Config(
                "stop_loss_pips, take_profit_pips and atr filter_pips must not be negative".into(),
            ));
        }
        Ok(())
    }
}

// NaN fails both.
fn positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

fn non_negative(x: f64) -> bool {
    x.is_finite() && x >= 0.0
}
