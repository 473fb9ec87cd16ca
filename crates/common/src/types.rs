use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One closed price bar. `open_time` is the bar's start; the bar closes at
/// `open_time + timeframe.duration()`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Bar {
    /// High must be the top of the range and every price must be finite.
    pub fn is_sane(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite())
            && self.high >= self.low
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
    }
}

/// Bar interval the strategy is evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::minutes(1),
            Timeframe::M5 => Duration::minutes(5),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::M30 => Duration::minutes(30),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::D1 => Duration::days(1),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        };
        f.write_str(code)
    }
}

/// Instrument specification: price step and volume granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Instrument code, e.g. "EURUSD".
    pub code: String,
    /// Size of one pip in price units (0.0001 for most FX majors).
    pub pip_size: f64,
    /// Units per 1.0 lot.
    #[serde(default = "default_lot_size")]
    pub lot_size: f64,
    /// Smallest volume increment in units.
    #[serde(default = "default_volume_step")]
    pub volume_step: f64,
    #[serde(default = "default_volume_step")]
    pub volume_min: f64,
    #[serde(default = "default_volume_max")]
    pub volume_max: f64,
}

fn default_lot_size() -> f64 {
    100_000.0
}

fn default_volume_step() -> f64 {
    1_000.0
}

fn default_volume_max() -> f64 {
    100_000_000.0
}

impl Symbol {
    pub fn quantity_to_volume(&self, lots: f64) -> f64 {
        lots * self.lot_size
    }

    /// Round to the nearest volume step, then clamp into `[volume_min, volume_max]`.
    pub fn normalize_volume(&self, volume: f64) -> f64 {
        if self.volume_step <= 0.0 {
            return volume.clamp(self.volume_min, self.volume_max);
        }
        let steps = (volume / self.volume_step).round();
        (steps * self.volume_step).clamp(self.volume_min, self.volume_max)
    }

    /// True when `volume` lies on the step grid and inside the allowed range.
    pub fn is_valid_volume(&self, volume: f64) -> bool {
        if volume.is_nan() || volume <= 0.0 || volume < self.volume_min || volume > self.volume_max {
            return false;
        }
        if self.volume_step <= 0.0 {
            return true;
        }
        let steps = volume / self.volume_step;
        (steps - steps.round()).abs() < 1e-9
    }

    pub fn pips_to_price(&self, pips: f64) -> f64 {
        pips * self.pip_size
    }

    pub fn price_to_pips(&self, distance: f64) -> f64 {
        distance / self.pip_size
    }
}

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn opposite(&self) -> Self {
        match self {
            TradeType::Buy => TradeType::Sell,
            TradeType::Sell => TradeType::Buy,
        }
    }

    /// +1 for buys, -1 for sells. Multiplies a price move into a signed P&L.
    pub fn sign(&self) -> f64 {
        match self {
            TradeType::Buy => 1.0,
            TradeType::Sell => -1.0,
        }
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeType::Buy => write!(f, "BUY"),
            TradeType::Sell => write!(f, "SELL"),
        }
    }
}

/// A market order to be submitted to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub trade_type: TradeType,
    /// Volume in units, already normalized to the symbol's step.
    pub volume: f64,
    pub label: String,
    /// Stop-loss distance from the fill price, in pips.
    pub stop_loss_pips: Option<f64>,
    /// Take-profit distance from the fill price, in pips.
    pub take_profit_pips: Option<f64>,
}

impl Order {
    pub fn market(
        symbol: impl Into<String>,
        trade_type: TradeType,
        volume: f64,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.into(),
            trade_type,
            volume,
            label: label.into(),
            stop_loss_pips: None,
            take_profit_pips: None,
        }
    }

    pub fn with_protection(mut self, stop_loss_pips: f64, take_profit_pips: f64) -> Self {
        self.stop_loss_pips = Some(stop_loss_pips);
        self.take_profit_pips = Some(take_profit_pips);
        self
    }
}

/// An open position held by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub label: String,
    pub trade_type: TradeType,
    pub volume: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    /// Absolute stop-loss price.
    pub stop_loss: Option<f64>,
    /// Absolute take-profit price.
    pub take_profit: Option<f64>,
}

/// Why a position left the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    Manual,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::StopLoss => write!(f, "stop_loss"),
            CloseReason::TakeProfit => write!(f, "take_profit"),
            CloseReason::Manual => write!(f, "manual"),
        }
    }
}

/// A closed position as recorded in the host's trade history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub position_id: String,
    pub symbol: String,
    pub label: String,
    pub trade_type: TradeType,
    pub volume: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub pips: f64,
    pub net_profit: f64,
    pub close_reason: CloseReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingOrderKind {
    Limit,
    Stop,
}

/// A resting order that becomes a position once price reaches `target_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub id: String,
    pub symbol: String,
    pub label: String,
    pub trade_type: TradeType,
    pub kind: PendingOrderKind,
    pub target_price: f64,
    pub volume: f64,
    pub stop_loss_pips: Option<f64>,
    pub take_profit_pips: Option<f64>,
}

/// Host-reported reason an operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeError {
    BadVolume,
    NoQuotes,
    EntityNotFound,
    Other(String),
}

impl std::fmt::Display for TradeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeError::BadVolume => write!(f, "bad volume"),
            TradeError::NoQuotes => write!(f, "no quotes available"),
            TradeError::EntityNotFound => write!(f, "entity not found"),
            TradeError::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Outcome of a trade operation. A refused operation is a successful call
/// with `is_successful == false`, not an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub is_successful: bool,
    pub error: Option<TradeError>,
    /// Position opened by the operation, if any.
    pub position: Option<Position>,
    /// History record produced by the operation, if any.
    pub trade: Option<TradeRecord>,
}

impl TradeResult {
    pub fn opened(position: Position) -> Self {
        Self {
            is_successful: true,
            error: None,
            position: Some(position),
            trade: None,
        }
    }

    pub fn closed(trade: TradeRecord) -> Self {
        Self {
            is_successful: true,
            error: None,
            position: None,
            trade: Some(trade),
        }
    }

    pub fn done() -> Self {
        Self {
            is_successful: true,
            error: None,
            position: None,
            trade: None,
        }
    }

    pub fn failed(error: TradeError) -> Self {
        Self {
            is_successful: false,
            error: Some(error),
            position: None,
            trade: None,
        }
    }
}

/// Whether the host is replaying history or trading a real account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Backtest,
    Live,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Backtest => write!(f, "backtest"),
            TradingMode::Live => write!(f, "live"),
        }
    }
}

/// Lifecycle of a strategy instance. Once stopped it never runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Running,
    Stopped,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Running => write!(f, "running"),
            EngineState::Stopped => write!(f, "stopped"),
        }
    }
}
