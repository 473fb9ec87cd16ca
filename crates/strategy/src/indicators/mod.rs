pub mod atr;
pub mod stochastic;

pub use atr::AverageTrueRange;
pub use stochastic::StochasticOscillator;

use common::Bar;

/// A streaming indicator fed one closed bar at a time.
///
/// Output at bar `t` depends only on bars `0..=t`; values are `None` until
/// `warmup_bars()` bars have been seen.
pub trait BarIndicator: Send + Sync {
    /// Human-readable name, e.g. "atr_14".
    fn name(&self) -> &str;

    /// Bars required before the first defined output value.
    fn warmup_bars(&self) -> usize;

    /// Consume the next closed bar.
    fn update(&mut self, bar: &Bar);
}

/// Mean of the values currently held in a window.
pub(crate) fn mean<'a>(values: impl ExactSizeIterator<Item = &'a f64>) -> f64 {
    let n = values.len();
    values.sum::<f64>() / n as f64
}

#[cfg(test)]
pub(crate) mod test_bars {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use common::Bar;

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    }

    /// Hourly bars from `(open, high, low, close)` tuples.
    pub fn ohlc(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                open_time: start() + Duration::hours(i as i64),
                open,
                high,
                low,
                close,
                volume: 1_000.0,
            })
            .collect()
    }
}
