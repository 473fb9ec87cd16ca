use std::sync::Arc;

use tracing::{error, info};

use common::{ExchangeClient, Order, Result, TradeError, TradeResult};

/// Submits approved entries to the host and reports the outcome.
///
/// This is the ONLY component that calls `ExchangeClient::submit_order`.
/// It never retries: a refused order is returned to the caller as-is.
pub struct OrderExecutor {
    client: Arc<dyn ExchangeClient>,
    submitted: usize,
}

impl OrderExecutor {
    pub fn new(client: Arc<dyn ExchangeClient>) -> Self {
        Self {
            client,
            submitted: 0,
        }
    }

    /// Orders handed to the host so far, accepted or not.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Submit `order`; `message` is logged when the host accepts it.
    pub async fn execute(&mut self, order: &Order, message: &str) -> Result<TradeResult> {
        info!(
            symbol = %order.symbol,
            side = %order.trade_type,
            volume = order.volume,
            label = %order.label,
            "Executing order"
        );
        self.submitted += 1;
        let result = self.client.submit_order(order).await?;

        if result.is_successful {
            info!(order_id = %order.id, "{message}");
        } else {
            let reason = result
                .error
                .clone()
                .unwrap_or_else(|| TradeError::Other("unspecified".into()));
            error!(order_id = %order.id, error = %reason, "Error: {reason}");
        }
        Ok(result)
    }
}
