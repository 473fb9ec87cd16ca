//! Average True Range (ATR), simple-average variant.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! The first bar has no previous close, so its TR is high-low.

use std::collections::VecDeque;

use common::{Bar, Series, Symbol};

use super::{mean, BarIndicator};

#[derive(Debug, Clone)]
pub struct AverageTrueRange {
    periods: usize,
    name: String,
    prev_close: Option<f64>,
    window: VecDeque<f64>,
    result: Series<Option<f64>>,
}

impl AverageTrueRange {
    pub fn new(periods: usize) -> Self {
        assert!(periods >= 1, "ATR periods must be >= 1");
        Self {
            periods,
            name: format!("atr_{periods}"),
            prev_close: None,
            window: VecDeque::with_capacity(periods + 1),
            result: Series::new(),
        }
    }

    pub fn result(&self) -> &Series<Option<f64>> {
        &self.result
    }

    /// Latest ATR expressed in pips of `symbol`.
    pub fn last_in_pips(&self, symbol: &Symbol) -> Option<f64> {
        atr_in_pips(&self.result, symbol)
    }
}

/// True range of `bar` given the previous bar's close.
pub fn true_range(bar: &Bar, prev_close: Option<f64>) -> f64 {
    let span = bar.high - bar.low;
    match prev_close {
        None => span,
        Some(pc) => span.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
    }
}

/// Latest value of an ATR series divided by the symbol's pip size.
pub fn atr_in_pips(atr: &Series<Option<f64>>, symbol: &Symbol) -> Option<f64> {
    atr.value(0).map(|v| symbol.price_to_pips(v))
}

impl BarIndicator for AverageTrueRange {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup_bars(&self) -> usize {
        self.periods
    }

    fn update(&mut self, bar: &Bar) {
        let tr = true_range(bar, self.prev_close);
        self.prev_close = Some(bar.close);

        self.window.push_back(tr);
        if self.window.len() > self.periods {
            self.window.pop_front();
        }

        let value = (self.window.len() == self.periods).then(|| mean(self.window.iter()));
        self.result.push(value);
    }
}
