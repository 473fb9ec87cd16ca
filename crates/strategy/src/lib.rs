pub mod config;
pub mod decision;
pub mod indicators;
pub mod signal;
pub mod stochastic_atr;

pub use config::{AtrParams, StochasticParams, StrategyFileConfig, StrategyParams};
pub use decision::{decide, Decision, DecisionInput, EntryIntent, SkipReason};
pub use signal::{SignalState, Thresholds};
pub use stochastic_atr::StochasticAtrStrategy;

use common::{Bar, Position, Symbol, Timeframe, TradeRecord};

/// All strategy implementations must satisfy this trait.
pub trait Strategy: Send + Sync {
    /// Human-readable name of this strategy instance.
    fn name(&self) -> &str;

    /// The instrument this strategy trades.
    fn symbol(&self) -> &Symbol;

    /// The bar interval this strategy is evaluated on.
    fn timeframe(&self) -> Timeframe;

    /// Lines logged once when the strategy starts.
    fn describe_rules(&self) -> Vec<String>;

    /// Consume the next closed bar. Called exactly once per bar, in order.
    fn on_bar(&mut self, bar: &Bar);

    /// Decide whether to enter, given the host's current book for `label`.
    fn evaluate(&self, label: &str, positions: &[Position], history: &[TradeRecord]) -> Decision;
}
