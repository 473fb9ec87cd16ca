pub mod backtest;
pub mod data;
pub mod executor;
pub mod lifecycle;

pub use backtest::{Backtest, BacktestReport};
pub use data::{load_bars_csv, read_bars, write_trades_csv};
pub use executor::OrderExecutor;
pub use lifecycle::{BarOutcome, ShutdownSummary, StrategyRunner};
