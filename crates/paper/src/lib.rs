use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use common::{
    Bar, CloseReason, ExchangeClient, Order, PendingOrder, PendingOrderKind, Position, Result,
    Symbol, Timeframe, TradeError, TradeRecord, TradeResult, TradeType, TradingMode,
};

/// Simulated execution venue for backtests.
///
/// Market orders fill at the latest bar close with configurable slippage.
/// Stop-loss, take-profit and pending orders are checked against each new
/// bar's range in `process_bar`. No real orders are ever sent anywhere.
pub struct PaperClient {
    symbol: Symbol,
    timeframe: Timeframe,
    /// Slippage in pips applied against the trader on every fill.
    slippage_pips: f64,
    book: RwLock<Book>,
}

struct Book {
    clock: DateTime<Utc>,
    last_bar: Option<Bar>,
    balance: f64,
    positions: Vec<Position>,
    history: Vec<TradeRecord>,
    pending: Vec<PendingOrder>,
}

impl PaperClient {
    pub fn new(
        symbol: Symbol,
        timeframe: Timeframe,
        initial_balance: f64,
        slippage_pips: f64,
        start_time: DateTime<Utc>,
    ) -> Self {
        info!(
            symbol = %symbol.code,
            balance = initial_balance,
            slippage_pips = slippage_pips,
            "PaperClient initialized"
        );
        Self {
            symbol,
            timeframe,
            slippage_pips,
            book: RwLock::new(Book {
                clock: start_time,
                last_bar: None,
                balance: initial_balance,
                positions: Vec::new(),
                history: Vec::new(),
                pending: Vec::new(),
            }),
        }
    }

    pub async fn balance(&self) -> f64 {
        self.book.read().await.balance
    }

    /// Advance the simulation by one closed bar.
    ///
    /// The clock moves to the bar's close. Open positions are checked for
    /// stop-loss then take-profit inside the bar's range; a bar touching both
    /// counts as a stop-loss. Pending orders whose price was reached become
    /// positions. Returns the trades closed on this bar.
    pub async fn process_bar(&self, bar: &Bar) -> Vec<TradeRecord> {
        let mut book = self.book.write().await;
        book.clock = bar.open_time + self.timeframe.duration();
        book.last_bar = Some(*bar);
        let now = book.clock;

        let mut closed = Vec::new();
        let mut still_open = Vec::with_capacity(book.positions.len());
        for position in std::mem::take(&mut book.positions) {
            match protective_exit(&position, bar) {
                Some((exit_price, reason)) => {
                    let trade = self.realize(&position, exit_price, now, reason);
                    debug!(
                        id = %trade.position_id,
                        reason = %reason,
                        exit = exit_price,
                        pips = trade.pips,
                        "Paper position closed"
                    );
                    closed.push(trade);
                }
                None => still_open.push(position),
            }
        }
        book.positions = still_open;
        for trade in &closed {
            book.balance += trade.net_profit;
        }
        book.history.extend(closed.iter().cloned());

        let mut waiting = Vec::with_capacity(book.pending.len());
        for order in std::mem::take(&mut book.pending) {
            match trigger_price(&order, bar) {
                Some(price) => {
                    let position = self.open(
                        &order.id,
                        &order.label,
                        order.trade_type,
                        order.volume,
                        price,
                        now,
                        order.stop_loss_pips,
                        order.take_profit_pips,
                    );
                    debug!(id = %order.id, price = price, "Paper pending order triggered");
                    book.positions.push(position);
                }
                None => waiting.push(order),
            }
        }
        book.pending = waiting;

        closed
    }

    /// Rest a limit or stop order on the simulated book.
    pub async fn place_pending_order(&self, order: PendingOrder) -> TradeResult {
        if !self.symbol.is_valid_volume(order.volume) {
            return TradeResult::failed(TradeError::BadVolume);
        }
        debug!(id = %order.id, kind = ?order.kind, target = order.target_price, "Paper pending order placed");
        self.book.write().await.pending.push(order);
        TradeResult::done()
    }

    fn slip(&self, trade_type: TradeType, price: f64) -> f64 {
        price + trade_type.sign() * self.symbol.pips_to_price(self.slippage_pips)
    }

    #[allow(clippy::too_many_arguments)]
    fn open(
        &self,
        id: &str,
        label: &str,
        trade_type: TradeType,
        volume: f64,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        stop_loss_pips: Option<f64>,
        take_profit_pips: Option<f64>,
    ) -> Position {
        let distance = |pips: Option<f64>| pips.filter(|p| *p > 0.0).map(|p| self.symbol.pips_to_price(p));
        Position {
            id: id.to_string(),
            symbol: self.symbol.code.clone(),
            label: label.to_string(),
            trade_type,
            volume,
            entry_price,
            entry_time,
            stop_loss: distance(stop_loss_pips).map(|d| entry_price - trade_type.sign() * d),
            take_profit: distance(take_profit_pips).map(|d| entry_price + trade_type.sign() * d),
        }
    }

    fn realize(
        &self,
        position: &Position,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        close_reason: CloseReason,
    ) -> TradeRecord {
        let gained = position.trade_type.sign() * (exit_price - position.entry_price);
        TradeRecord {
            position_id: position.id.clone(),
            symbol: position.symbol.clone(),
            label: position.label.clone(),
            trade_type: position.trade_type,
            volume: position.volume,
            entry_price: position.entry_price,
            entry_time: position.entry_time,
            exit_price,
            exit_time,
            pips: self.symbol.price_to_pips(gained),
            net_profit: gained * position.volume,
            close_reason,
        }
    }
}

/// Exit level hit by `bar`, if any. Gaps through a level fill at the open.
fn protective_exit(position: &Position, bar: &Bar) -> Option<(f64, CloseReason)> {
    match position.trade_type {
        TradeType::Buy => {
            if let Some(sl) = position.stop_loss.filter(|sl| bar.low <= *sl) {
                return Some((bar.open.min(sl), CloseReason::StopLoss));
            }
            if let Some(tp) = position.take_profit.filter(|tp| bar.high >= *tp) {
                return Some((bar.open.max(tp), CloseReason::TakeProfit));
            }
        }
        TradeType::Sell => {
            if let Some(sl) = position.stop_loss.filter(|sl| bar.high >= *sl) {
                return Some((bar.open.max(sl), CloseReason::StopLoss));
            }
            if let Some(tp) = position.take_profit.filter(|tp| bar.low <= *tp) {
                return Some((bar.open.min(tp), CloseReason::TakeProfit));
            }
        }
    }
    None
}

/// Fill price of a pending order reached by `bar`, if any.
fn trigger_price(order: &PendingOrder, bar: &Bar) -> Option<f64> {
    let target = order.target_price;
    match (order.kind, order.trade_type) {
        (PendingOrderKind::Limit, TradeType::Buy) => (bar.low <= target).then(|| bar.open.min(target)),
        (PendingOrderKind::Limit, TradeType::Sell) => (bar.high >= target).then(|| bar.open.max(target)),
        (PendingOrderKind::Stop, TradeType::Buy) => (bar.high >= target).then(|| bar.open.max(target)),
        (PendingOrderKind::Stop, TradeType::Sell) => (bar.low <= target).then(|| bar.open.min(target)),
    }
}

#[async_trait]
impl ExchangeClient for PaperClient {
    fn mode(&self) -> TradingMode {
        TradingMode::Backtest
    }

    async fn server_time(&self) -> Result<DateTime<Utc>> {
        Ok(self.book.read().await.clock)
    }

    async fn submit_order(&self, order: &Order) -> Result<TradeResult> {
        if order.symbol != self.symbol.code {
            warn!(symbol = %order.symbol, "PaperClient received order for unknown symbol");
            return Ok(TradeResult::failed(TradeError::Other(format!(
                "unknown symbol '{}'",
                order.symbol
            ))));
        }
        if !self.symbol.is_valid_volume(order.volume) {
            return Ok(TradeResult::failed(TradeError::BadVolume));
        }

        let mut book = self.book.write().await;
        let Some(bar) = book.last_bar else {
            return Ok(TradeResult::failed(TradeError::NoQuotes));
        };

        let fill_price = self.slip(order.trade_type, bar.close);
        let position = self.open(
            &order.id,
            &order.label,
            order.trade_type,
            order.volume,
            fill_price,
            book.clock,
            order.stop_loss_pips,
            order.take_profit_pips,
        );

        debug!(
            symbol = %order.symbol,
            side = %order.trade_type,
            close = bar.close,
            fill = fill_price,
            volume = order.volume,
            "Paper fill simulated"
        );

        book.positions.push(position.clone());
        Ok(TradeResult::opened(position))
    }

    async fn open_positions(&self) -> Result<Vec<Position>> {
        Ok(self.book.read().await.positions.clone())
    }

    async fn history(&self) -> Result<Vec<TradeRecord>> {
        Ok(self.book.read().await.history.clone())
    }

    async fn pending_orders(&self) -> Result<Vec<PendingOrder>> {
        Ok(self.book.read().await.pending.clone())
    }

    async fn close_position(&self, position_id: &str) -> Result<TradeResult> {
        let mut book = self.book.write().await;
        let Some(idx) = book.positions.iter().position(|p| p.id == position_id) else {
            return Ok(TradeResult::failed(TradeError::EntityNotFound));
        };
        let Some(bar) = book.last_bar else {
            return Ok(TradeResult::failed(TradeError::NoQuotes));
        };

        let position = book.positions.remove(idx);
        let exit_price = self.slip(position.trade_type.opposite(), bar.close);
        let trade = self.realize(&position, exit_price, book.clock, CloseReason::Manual);
        book.balance += trade.net_profit;
        book.history.push(trade.clone());
        debug!(id = %position_id, exit = exit_price, "Paper position closed manually");
        Ok(TradeResult::closed(trade))
    }

    async fn cancel_pending_order(&self, order_id: &str) -> Result<TradeResult> {
        let mut book = self.book.write().await;
        let before = book.pending.len();
        book.pending.retain(|o| o.id != order_id);
        if book.pending.len() == before {
            return Ok(TradeResult::failed(TradeError::EntityNotFound));
        }
        debug!(id = %order_id, "Paper pending order cancelled");
        Ok(TradeResult::done())
    }
}
