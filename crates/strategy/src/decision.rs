//! Entry decision as a pure function of an explicit snapshot.
//!
//! Nothing here talks to the host: positions, history and indicator series
//! are passed in, so every gate can be exercised directly in tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{Position, Series, Symbol, Timeframe, TradeRecord, TradeType};

use crate::config::StrategyParams;
use crate::indicators::atr::atr_in_pips;
use crate::signal::{signal_at, signal_start_time, Thresholds};

/// Everything the entry decision reads for one bar.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub params: &'a StrategyParams,
    pub thresholds: &'a Thresholds,
    pub symbol: &'a Symbol,
    pub timeframe: Timeframe,
    pub label: &'a str,
    pub percent_k: &'a Series<Option<f64>>,
    pub atr: &'a Series<Option<f64>>,
    pub open_times: &'a Series<DateTime<Utc>>,
    pub positions: &'a [Position],
    pub history: &'a [TradeRecord],
}

/// What to submit when every gate passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryIntent {
    pub trade_type: TradeType,
    /// Volume in units, normalized to the symbol's step.
    pub volume: f64,
    pub stop_loss_pips: f64,
    pub take_profit_pips: f64,
    /// %K at decision time, for the execution log.
    pub percent_k: f64,
    pub atr_pips: f64,
    pub signal_start: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A position under this label is already open.
    PositionOpen,
    /// ATR has no value yet.
    IndicatorsWarmingUp,
    VolatilityBelowFilter,
    NoSignal,
    NoEpisodeStart,
    /// The bar that opened the current episode had closed by the last
    /// entry under this label.
    SignalAlreadyTraded,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::PositionOpen => write!(f, "position already open"),
            SkipReason::IndicatorsWarmingUp => write!(f, "indicators warming up"),
            SkipReason::VolatilityBelowFilter => write!(f, "ATR below filter"),
            SkipReason::NoSignal => write!(f, "no signal"),
            SkipReason::NoEpisodeStart => write!(f, "signal episode start unknown"),
            SkipReason::SignalAlreadyTraded => write!(f, "signal already traded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    Enter(EntryIntent),
    Skip(SkipReason),
}

/// No open position carries `label`.
pub fn zero_positions(positions: &[Position], label: &str) -> bool {
    !positions.iter().any(|p| p.label == label)
}

/// Latest entry time among closed trades carrying `label`.
pub fn last_trade_entry_time(history: &[TradeRecord], label: &str) -> Option<DateTime<Utc>> {
    history
        .iter()
        .filter(|t| t.label == label)
        .map(|t| t.entry_time)
        .max()
}

pub fn decide(input: &DecisionInput<'_>) -> Decision {
    if !zero_positions(input.positions, input.label) {
        return Decision::Skip(SkipReason::PositionOpen);
    }

    let Some(atr_pips) = atr_in_pips(input.atr, input.symbol) else {
        return Decision::Skip(SkipReason::IndicatorsWarmingUp);
    };
    if atr_pips <= input.params.atr.filter_pips {
        return Decision::Skip(SkipReason::VolatilityBelowFilter);
    }

    let signal = signal_at(input.percent_k, 0, input.thresholds);
    let (Some(trade_type), Some(percent_k)) = (signal.trade_type(), input.percent_k.value(0))
    else {
        return Decision::Skip(SkipReason::NoSignal);
    };

    let Some(signal_start) = signal_start_time(input.percent_k, input.open_times, input.thresholds)
    else {
        return Decision::Skip(SkipReason::NoEpisodeStart);
    };

    // Entries are stamped at the close of the bar they were decided on.
    if let Some(last_entry) = last_trade_entry_time(input.history, input.label) {
        if signal_start + input.timeframe.duration() <= last_entry {
            return Decision::Skip(SkipReason::SignalAlreadyTraded);
        }
    }

    let symbol = input.symbol;
    Decision::Enter(EntryIntent {
        trade_type,
        volume: symbol.normalize_volume(symbol.quantity_to_volume(input.params.lot_size)),
        stop_loss_pips: input.params.stop_loss_pips,
        take_profit_pips: input.params.take_profit_pips,
        percent_k,
        atr_pips,
        signal_start,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use common::CloseReason;

    const LABEL: &str = "EURUSDH1";

    fn symbol() -> Symbol {
        Symbol {
            code: "EURUSD".into(),
            pip_size: 0.0001,
            lot_size: 100_000.0,
            volume_step: 1_000.0,
            volume_min: 1_000.0,
            volume_max: 10_000_000.0,
        }
    }

    fn t(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    /// Five hourly bars: %K undefined, 50, then three at `k`; ATR constant.
    struct Fixture {
        params: StrategyParams,
        thresholds: Thresholds,
        symbol: Symbol,
        percent_k: Series<Option<f64>>,
        atr: Series<Option<f64>>,
        open_times: Series<DateTime<Utc>>,
        positions: Vec<Position>,
        history: Vec<TradeRecord>,
    }

    impl Fixture {
        fn new(k: f64, atr_pips: f64) -> Self {
            let params = StrategyParams::default();
            let thresholds = Thresholds::from_params(&params.stochastic).unwrap();
            let symbol = symbol();
            let atr_price = symbol.pips_to_price(atr_pips);
            Self {
                params,
                thresholds,
                percent_k: [None, Some(50.0), Some(k), Some(k), Some(k)]
                    .into_iter()
                    .collect(),
                atr: (0..5).map(|_| Some(atr_price)).collect(),
                open_times: (0..5).map(t).collect(),
                symbol,
                positions: Vec::new(),
                history: Vec::new(),
            }
        }

        fn decide(&self) -> Decision {
            decide(&DecisionInput {
                params: &self.params,
                thresholds: &self.thresholds,
                symbol: &self.symbol,
                timeframe: Timeframe::H1,
                label: LABEL,
                percent_k: &self.percent_k,
                atr: &self.atr,
                open_times: &self.open_times,
                positions: &self.positions,
                history: &self.history,
            })
        }
    }

    fn position(label: &str) -> Position {
        Position {
            id: "p1".into(),
            symbol: "EURUSD".into(),
            label: label.into(),
            trade_type: TradeType::Buy,
            volume: 1_000.0,
            entry_price: 1.1,
            entry_time: t(0),
            stop_loss: None,
            take_profit: None,
        }
    }

    fn trade(label: &str, entry_time: DateTime<Utc>) -> TradeRecord {
        TradeRecord {
            position_id: "p0".into(),
            symbol: "EURUSD".into(),
            label: label.into(),
            trade_type: TradeType::Buy,
            volume: 1_000.0,
            entry_price: 1.1,
            entry_time,
            exit_price: 1.101,
            exit_time: entry_time + Duration::hours(1),
            pips: 10.0,
            net_profit: 1.0,
            close_reason: CloseReason::TakeProfit,
        }
    }

    #[test]
    fn oversold_with_volatility_enters_long() {
        let fx = Fixture::new(15.0, 12.0);
        match fx.decide() {
            Decision::Enter(intent) => {
                assert_eq!(intent.trade_type, TradeType::Buy);
                assert!((intent.volume - 1_000.0).abs() < 1e-9);
                assert_eq!(intent.stop_loss_pips, 10.0);
                assert_eq!(intent.take_profit_pips, 10.0);
                assert_eq!(intent.percent_k, 15.0);
                assert_eq!(intent.signal_start, t(1));
            }
            other => panic!("expected entry, got {other:?}"),
        }
    }

    #[test]
    fn overbought_enters_short() {
        let fx = Fixture::new(85.0, 12.0);
        assert!(matches!(
            fx.decide(),
            Decision::Enter(EntryIntent { trade_type: TradeType::Sell, .. })
        ));
    }

    #[test]
    fn low_volatility_blocks_entry() {
        let fx = Fixture::new(15.0, 5.0);
        assert_eq!(fx.decide(), Decision::Skip(SkipReason::VolatilityBelowFilter));
    }

    #[test]
    fn volatility_equal_to_filter_blocks_entry() {
        let mut fx = Fixture::new(15.0, 12.0);
        fx.atr = (0..5).map(|_| Some(0.0012)).collect();
        fx.params.atr.filter_pips = fx.symbol.price_to_pips(0.0012);
        assert_eq!(fx.decide(), Decision::Skip(SkipReason::VolatilityBelowFilter));
    }

    #[test]
    fn open_position_under_label_blocks_entry() {
        let mut fx = Fixture::new(15.0, 12.0);
        fx.positions.push(position(LABEL));
        assert_eq!(fx.decide(), Decision::Skip(SkipReason::PositionOpen));
    }

    #[test]
    fn positions_under_other_labels_are_ignored() {
        let mut fx = Fixture::new(15.0, 12.0);
        fx.positions.push(position("manual"));
        assert!(matches!(fx.decide(), Decision::Enter(_)));
    }

    #[test]
    fn neutral_oscillator_is_no_signal() {
        let fx = Fixture::new(50.0, 12.0);
        assert_eq!(fx.decide(), Decision::Skip(SkipReason::NoSignal));
    }

    #[test]
    fn missing_atr_is_warmup() {
        let mut fx = Fixture::new(15.0, 12.0);
        fx.atr = (0..5).map(|_| None).collect();
        assert_eq!(fx.decide(), Decision::Skip(SkipReason::IndicatorsWarmingUp));
    }

    #[test]
    fn episode_already_traded_blocks_reentry() {
        // Entered on bar 3 of the episode, stamped at its close.
        let mut fx = Fixture::new(15.0, 12.0);
        fx.history.push(trade(LABEL, t(4)));
        assert_eq!(fx.decide(), Decision::Skip(SkipReason::SignalAlreadyTraded));
    }

    #[test]
    fn entry_on_the_breaking_bar_blocks_the_flip() {
        // Entered on bar 1, the bar the episode breaks at, closed at t(2).
        let mut fx = Fixture::new(15.0, 12.0);
        fx.history.push(trade(LABEL, t(2)));
        assert_eq!(fx.decide(), Decision::Skip(SkipReason::SignalAlreadyTraded));
    }

    #[test]
    fn entry_before_the_breaking_bar_allows_new_episode() {
        // Entered on bar 0 (closed at t(1)), then bar 1 was neutral.
        let mut fx = Fixture::new(15.0, 12.0);
        fx.history.push(trade(LABEL, t(1)));
        assert!(matches!(fx.decide(), Decision::Enter(_)));
    }

    #[test]
    fn older_trade_allows_new_episode() {
        let mut fx = Fixture::new(15.0, 12.0);
        fx.history.push(trade(LABEL, t(0)));
        assert!(matches!(fx.decide(), Decision::Enter(_)));
    }

    #[test]
    fn history_under_other_labels_is_ignored() {
        let mut fx = Fixture::new(15.0, 12.0);
        fx.history.push(trade("other", t(4)));
        assert!(matches!(fx.decide(), Decision::Enter(_)));
    }

    #[test]
    fn episode_spanning_all_history_has_no_start() {
        let mut fx = Fixture::new(15.0, 12.0);
        fx.percent_k = (0..5).map(|_| Some(15.0)).collect();
        assert_eq!(fx.decide(), Decision::Skip(SkipReason::NoEpisodeStart));
    }

    #[test]
    fn last_entry_time_takes_max_per_label() {
        let history = vec![trade(LABEL, t(1)), trade(LABEL, t(3)), trade("x", t(9))];
        assert_eq!(last_trade_entry_time(&history, LABEL), Some(t(3)));
        assert_eq!(last_trade_entry_time(&history, "missing"), None);
    }
}
