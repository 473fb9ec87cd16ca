use std::path::PathBuf;

use crate::{Error, Result};

/// Run configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// CSV file of closed bars to replay.
    pub bars_path: PathBuf,

    /// Strategy parameter file (TOML).
    pub strategy_config_path: PathBuf,

    // Paper broker
    pub paper_initial_balance: f64,
    pub paper_slippage_pips: f64,

    // Outputs
    pub report_path: Option<PathBuf>,
    pub trades_csv_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        // ignore error if .env not present
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| {
                Error::Config(format!(
                    "Required environment variable '{key}' is not set. Check your .env file."
                ))
            })
        };

        let paper_initial_balance = parse_f64(&lookup, "PAPER_INITIAL_BALANCE", 10_000.0)?;
        if paper_initial_balance <= 0.0 {
            return Err(Error::Config(format!(
                "PAPER_INITIAL_BALANCE must be positive, got {paper_initial_balance}"
            )));
        }

        let paper_slippage_pips = parse_f64(&lookup, "PAPER_SLIPPAGE_PIPS", 0.0)?;
        if paper_slippage_pips < 0.0 {
            return Err(Error::Config(format!(
                "PAPER_SLIPPAGE_PIPS must not be negative, got {paper_slippage_pips}"
            )));
        }

        Ok(Config {
            bars_path: PathBuf::from(required("BARS_PATH")?),
            strategy_config_path: lookup("STRATEGY_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config/strategy.toml")),
            paper_initial_balance,
            paper_slippage_pips,
            report_path: lookup("REPORT_PATH").map(PathBuf::from),
            trades_csv_path: lookup("TRADES_CSV_PATH").map(PathBuf::from),
        })
    }
}

fn parse_f64<F>(lookup: &F, key: &str, default: f64) -> Result<f64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(Error::Config(format!("{key} must be a number, got: '{raw}'"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_bars_path_is_set() {
        let cfg = Config::from_lookup(lookup(&[("BARS_PATH", "data/eurusd_h1.csv")])).unwrap();
        assert_eq!(cfg.bars_path, PathBuf::from("data/eurusd_h1.csv"));
        assert_eq!(cfg.strategy_config_path, PathBuf::from("config/strategy.toml"));
        assert!((cfg.paper_initial_balance - 10_000.0).abs() < 1e-9);
        assert_eq!(cfg.paper_slippage_pips, 0.0);
        assert!(cfg.report_path.is_none());
    }

    #[test]
    fn missing_bars_path_is_a_config_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn non_numeric_balance_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("BARS_PATH", "bars.csv"),
            ("PAPER_INITIAL_BALANCE", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PAPER_INITIAL_BALANCE"));
    }

    #[test]
    fn negative_slippage_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("BARS_PATH", "bars.csv"),
            ("PAPER_SLIPPAGE_PIPS", "-1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn nan_slippage_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("BARS_PATH", "bars.csv"),
            ("PAPER_SLIPPAGE_PIPS", "NaN"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PAPER_SLIPPAGE_PIPS"));
    }
}
