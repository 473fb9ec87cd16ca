/// Append-only history with lag-indexed lookback.
///
/// Lag 0 is the most recently pushed value. Nothing is ever removed or
/// overwritten, so a lag lookup made on bar `n` stays valid for that bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Series<T> {
    values: Vec<T>,
}

impl<T> Default for Series<T> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

impl<T: Copy> Series<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: T) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value `lag` bars back from the most recent. `None` past the start of history.
    pub fn last(&self, lag: usize) -> Option<T> {
        let len = self.values.len();
        if lag >= len {
            return None;
        }
        Some(self.values[len - 1 - lag])
    }

    pub fn last_value(&self) -> Option<T> {
        self.last(0)
    }

    /// Most recent first, ending at the oldest value.
    pub fn lookback(&self) -> impl Iterator<Item = T> + '_ {
        self.values.iter().rev().copied()
    }
}

impl Series<Option<f64>> {
    /// Indicator value at `lag`; `None` both during warm-up and past history.
    pub fn value(&self, lag: usize) -> Option<f64> {
        self.last(lag).flatten()
    }
}

impl<T: Copy> FromIterator<T> for Series<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
