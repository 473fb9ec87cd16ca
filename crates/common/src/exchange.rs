use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Order, PendingOrder, Position, Result, TradeRecord, TradeResult, TradingMode};

/// The host's execution, position and history surface.
///
/// `PaperClient` implements this for backtests.
///
/// Only the executor in `crates/engine` calls `submit_order`. A refused
/// operation comes back as `Ok(TradeResult { is_successful: false, .. })`;
/// `Err` is reserved for faults in the host itself.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Whether the host is replaying history.
    fn mode(&self) -> TradingMode;

    /// Current host clock.
    async fn server_time(&self) -> Result<DateTime<Utc>>;

    /// Submit a market order.
    async fn submit_order(&self, order: &Order) -> Result<TradeResult>;

    /// Currently open positions, all labels.
    async fn open_positions(&self) -> Result<Vec<Position>>;

    /// Closed positions, all labels, oldest first.
    async fn history(&self) -> Result<Vec<TradeRecord>>;

    /// Resting orders not yet triggered.
    async fn pending_orders(&self) -> Result<Vec<PendingOrder>>;

    async fn close_position(&self, position_id: &str) -> Result<TradeResult>;

    async fn cancel_pending_order(&self, order_id: &str) -> Result<TradeResult>;
}
