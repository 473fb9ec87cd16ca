use std::collections::VecDeque;

use common::{Bar, Series};

use super::{mean, BarIndicator};

/// Stochastic Oscillator with simple-average slowing.
///
/// Raw range over the last `k_periods` bars: HH = highest high, LL = lowest low.
/// %K = 100 · Σ(close − LL) / Σ(HH − LL) over the last `slowing` bars.
/// A flat market (Σ(HH − LL) = 0) reads 50.
/// %D = simple average of %K over `d_periods` bars.
#[derive(Debug, Clone)]
pub struct StochasticOscillator {
    k_periods: usize,
    slowing: usize,
    d_periods: usize,
    name: String,
    ranges: VecDeque<(f64, f64)>,
    slow_terms: VecDeque<(f64, f64)>,
    k_window: VecDeque<f64>,
    percent_k: Series<Option<f64>>,
    percent_d: Series<Option<f64>>,
}

impl StochasticOscillator {
    pub fn new(k_periods: usize, slowing: usize, d_periods: usize) -> Self {
        assert!(
            k_periods >= 1 && slowing >= 1 && d_periods >= 1,
            "Stochastic periods must be >= 1"
        );
        Self {
            k_periods,
            slowing,
            d_periods,
            name: format!("stoch_{k_periods}_{slowing}_{d_periods}"),
            ranges: VecDeque::with_capacity(k_periods + 1),
            slow_terms: VecDeque::with_capacity(slowing + 1),
            k_window: VecDeque::with_capacity(d_periods + 1),
            percent_k: Series::new(),
            percent_d: Series::new(),
        }
    }

    pub fn percent_k(&self) -> &Series<Option<f64>> {
        &self.percent_k
    }

    pub fn percent_d(&self) -> &Series<Option<f64>> {
        &self.percent_d
    }

    fn next_k(&mut self, close: f64) -> Option<f64> {
        if self.ranges.len() < self.k_periods {
            return None;
        }
        let highest = self
            .ranges
            .iter()
            .map(|&(high, _)| high)
            .fold(f64::MIN, f64::max);
        let lowest = self
            .ranges
            .iter()
            .map(|&(_, low)| low)
            .fold(f64::MAX, f64::min);

        self.slow_terms.push_back((close - lowest, highest - lowest));
        if self.slow_terms.len() > self.slowing {
            self.slow_terms.pop_front();
        }
        if self.slow_terms.len() < self.slowing {
            return None;
        }

        let (above_low, range): (f64, f64) = self
            .slow_terms
            .iter()
            .fold((0.0, 0.0), |(a, r), &(x, y)| (a + x, r + y));
        if range <= 0.0 {
            return Some(50.0);
        }
        Some(100.0 * above_low / range)
    }
}

impl BarIndicator for StochasticOscillator {
    fn name(&self) -> &str {
        &self.name
    }

    /// Bars until the first %K value.
    fn warmup_bars(&self) -> usize {
        self.k_periods + self.slowing - 1
    }

    fn update(&mut self, bar: &Bar) {
        self.ranges.push_back((bar.high, bar.low));
        if self.ranges.len() > self.k_periods {
            self.ranges.pop_front();
        }

        let k = self.next_k(bar.close);
        self.percent_k.push(k);

        let d = k.and_then(|k| {
            self.k_window.push_back(k);
            if self.k_window.len() > self.d_periods {
                self.k_window.pop_front();
            }
            (self.k_window.len() == self.d_periods).then(|| mean(self.k_window.iter()))
        });
        self.percent_d.push(d);
    }
}
