use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{Error, Result, Series, TradeType};

use crate::config::StochasticParams;

/// Directional bias read from the oscillator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalState {
    /// Oscillator below the oversold threshold.
    Bullish,
    /// Oscillator above the overbought threshold.
    Bearish,
    /// Between the thresholds, or no reading. Never traded.
    Neutral,
}

impl SignalState {
    /// Order direction this signal calls for.
    pub fn trade_type(&self) -> Option<TradeType> {
        match self {
            SignalState::Bullish => Some(TradeType::Buy),
            SignalState::Bearish => Some(TradeType::Sell),
            SignalState::Neutral => None,
        }
    }
}

impl std::fmt::Display for SignalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalState::Bullish => write!(f, "bullish"),
            SignalState::Bearish => write!(f, "bearish"),
            SignalState::Neutral => write!(f, "neutral"),
        }
    }
}

/// Oversold/overbought pair. `oversold < overbought` always holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    oversold: f64,
    overbought: f64,
}

impl Thresholds {
    pub fn new(oversold: f64, overbought: f64) -> Result<Self> {
        if oversold.is_nan() || overbought.is_nan() || oversold >= overbought {
            return Err(Error::Config(format!(
                "oversold ({oversold}) must be below overbought ({overbought})"
            )));
        }
        Ok(Self {
            oversold,
            overbought,
        })
    }

    pub fn from_params(params: &StochasticParams) -> Result<Self> {
        Self::new(params.oversold, params.overbought)
    }

    pub fn oversold(&self) -> f64 {
        self.oversold
    }

    pub fn overbought(&self) -> f64 {
        self.overbought
    }

    pub fn classify(&self, value: f64) -> SignalState {
        if value < self.oversold {
            SignalState::Bullish
        } else if value > self.overbought {
            SignalState::Bearish
        } else {
            SignalState::Neutral
        }
    }

    /// An undefined reading is neutral.
    pub fn classify_reading(&self, reading: Option<f64>) -> SignalState {
        reading.map_or(SignalState::Neutral, |v| self.classify(v))
    }
}

/// Signal at `lag` bars back on the %K series.
pub fn signal_at(percent_k: &Series<Option<f64>>, lag: usize, thresholds: &Thresholds) -> SignalState {
    thresholds.classify_reading(percent_k.value(lag))
}

/// Start of the current signal episode.
///
/// Walks back from lag 0 while the signal keeps the lag-0 direction and
/// returns the open time of the first bar where it does not. `None` when the
/// current signal is neutral or the episode reaches back past recorded history.
///
/// `percent_k` and `open_times` must be aligned bar for bar.
pub fn signal_start_time(
    percent_k: &Series<Option<f64>>,
    open_times: &Series<DateTime<Utc>>,
    thresholds: &Thresholds,
) -> Option<DateTime<Utc>> {
    let current = signal_at(percent_k, 0, thresholds);
    if current == SignalState::Neutral {
        return None;
    }
    let breaking_lag = percent_k
        .lookback()
        .position(|reading| thresholds.classify_reading(reading) != current)?;
    open_times.last(breaking_lag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn thresholds() -> Thresholds {
        Thresholds::new(20.0, 80.0).unwrap()
    }

    fn hours(n: usize) -> Series<DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        (0..n).map(|i| start + Duration::hours(i as i64)).collect()
    }

    #[test]
    fn classify_boundaries_are_neutral() {
        let th = thresholds();
        assert_eq!(th.classify(19.99), SignalState::Bullish);
        assert_eq!(th.classify(20.0), SignalState::Neutral);
        assert_eq!(th.classify(50.0), SignalState::Neutral);
        assert_eq!(th.classify(80.0), SignalState::Neutral);
        assert_eq!(th.classify(80.01), SignalState::Bearish);
    }

    #[test]
    fn missing_reading_is_neutral() {
        assert_eq!(thresholds().classify_reading(None), SignalState::Neutral);
        assert_eq!(thresholds().classify(f64::NAN), SignalState::Neutral);
    }

    #[test]
    fn thresholds_must_be_ordered() {
        assert!(Thresholds::new(80.0, 20.0).is_err());
        assert!(Thresholds::new(50.0, 50.0).is_err());
    }

    #[test]
    fn signal_maps_to_trade_direction() {
        assert_eq!(SignalState::Bullish.trade_type(), Some(TradeType::Buy));
        assert_eq!(SignalState::Bearish.trade_type(), Some(TradeType::Sell));
        assert_eq!(SignalState::Neutral.trade_type(), None);
    }

    #[test]
    fn episode_starts_at_first_bar_outside_run() {
        let k: Series<Option<f64>> = [None, Some(50.0), Some(15.0), Some(12.0), Some(10.0)]
            .into_iter()
            .collect();
        let times = hours(5);
        // lags 0..=2 bullish, lag 3 neutral → open time of bar index 1
        assert_eq!(
            signal_start_time(&k, &times, &thresholds()),
            times.last(3)
        );
    }

    #[test]
    fn episode_breaks_on_direction_flip() {
        let k: Series<Option<f64>> = [Some(10.0), Some(90.0), Some(85.0)].into_iter().collect();
        let times = hours(3);
        assert_eq!(
            signal_start_time(&k, &times, &thresholds()),
            times.last(2)
        );
    }

    #[test]
    fn warmup_gap_ends_episode() {
        let k: Series<Option<f64>> = [None, None, Some(5.0)].into_iter().collect();
        let times = hours(3);
        assert_eq!(
            signal_start_time(&k, &times, &thresholds()),
            times.last(1)
        );
    }

    #[test]
    fn neutral_now_has_no_episode() {
        let k: Series<Option<f64>> = [Some(10.0), Some(50.0)].into_iter().collect();
        assert_eq!(signal_start_time(&k, &hours(2), &thresholds()), None);
    }

    #[test]
    fn episode_covering_all_history_has_no_start() {
        let k: Series<Option<f64>> = [Some(10.0), Some(11.0)].into_iter().collect();
        assert_eq!(signal_start_time(&k, &hours(2), &thresholds()), None);
    }
}
