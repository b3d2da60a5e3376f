//! Core types used throughout signaltrack
//!
//! Defines the trade record data model plus the market data and
//! prediction structures consumed from external collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported instruments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    BTC,
    ETH,
    XRP,
}

impl Default for Symbol {
    fn default() -> Self {
        Symbol::ETH
    }
}

impl Symbol {
    /// Get the trading pair for exchange APIs (e.g., "BTCUSDT")
    pub fn trading_pair(&self) -> &'static str {
        match self {
            Symbol::BTC => "BTCUSDT",
            Symbol::ETH => "ETHUSDT",
            Symbol::XRP => "XRPUSDT",
        }
    }

    /// Parse from string (accepts both "BTC" and "BTCUSDT" forms)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BTC" | "BTCUSDT" => Some(Symbol::BTC),
            "ETH" | "ETHUSDT" => Some(Symbol::ETH),
            "XRP" | "XRPUSDT" => Some(Symbol::XRP),
            _ => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::BTC => write!(f, "BTC"),
            Symbol::ETH => write!(f, "ETH"),
            Symbol::XRP => write!(f, "XRP"),
        }
    }
}

/// Prediction horizons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    Min5,
    Min10,
}

impl Horizon {
    /// All horizons a prediction spawns trades for, in spawn order
    pub const ALL: [Horizon; 2] = [Horizon::Min5, Horizon::Min10];

    /// Get duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        match self {
            Horizon::Min5 => 5 * 60 * 1000,
            Horizon::Min10 => 10 * 60 * 1000,
        }
    }

    /// Short label used in trade ids ("5m" / "10m")
    pub fn label(&self) -> &'static str {
        match self {
            Horizon::Min5 => "5m",
            Horizon::Min10 => "10m",
        }
    }

    /// Parse from label
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "5m" | "5min" => Some(Horizon::Min5),
            "10m" | "10min" => Some(Horizon::Min10),
            _ => None,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Trade direction (only strict directional calls become trades)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

/// Direction as reported by the prediction model; `Flat` never trades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    /// Convert to a tradeable direction; `Flat` yields `None`
    pub fn as_trade_direction(&self) -> Option<Direction> {
        match self {
            TrendDirection::Up => Some(Direction::Up),
            TrendDirection::Down => Some(Direction::Down),
            TrendDirection::Flat => None,
        }
    }
}

/// Trade lifecycle status. Transitions one way only: Pending -> Win | Loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Win,
    Loss,
}

impl TradeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TradeStatus::Pending)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Pending => write!(f, "PENDING"),
            TradeStatus::Win => write!(f, "WIN"),
            TradeStatus::Loss => write!(f, "LOSS"),
        }
    }
}

/// Single OHLCV bar (consumed from the market data collaborator)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in milliseconds
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// 24h ticker snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ticker {
    pub last_price: f64,
    pub price_change_percent: f64,
}

/// Per-horizon directional forecast from the prediction model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendForecast {
    /// Missing or malformed directions deserialize to None and degrade
    /// the whole prediction at ingestion time.
    #[serde(default)]
    pub direction: Option<TrendDirection>,
    #[serde(default)]
    pub price_target: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// One scored analysis dimension (display-only telemetry)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimensionScore {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub insight: String,
    #[serde(default)]
    pub status: String,
}

/// Pattern-similarity block from the model (display-only telemetry)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimilarityAnalysis {
    #[serde(default)]
    pub matched_pattern: String,
    #[serde(default)]
    pub similarity_score: f64,
    #[serde(default)]
    pub historical_outcome: String,
    #[serde(default)]
    pub pattern_duration: String,
    #[serde(default)]
    pub trend_correlation: f64,
    #[serde(default)]
    pub key_level: String,
}

/// Raw prediction payload as returned by the model, before enrichment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// "BUY" or "SELL"; informational only, never drives resolution
    #[serde(default, rename = "actionSignal")]
    pub action_signal: String,
    #[serde(rename = "trend5m")]
    pub trend_5m: TrendForecast,
    #[serde(rename = "trend10m")]
    pub trend_10m: TrendForecast,
    #[serde(default)]
    pub dimensions: Vec<DimensionScore>,
    #[serde(default)]
    pub similarity: SimilarityAnalysis,
    #[serde(default)]
    pub summary: String,
}

impl AnalysisResponse {
    /// Attach the snapshot context the prediction was computed against.
    /// The snapshot price/time are captured at request time and never
    /// re-read afterwards, so entry prices cannot drift.
    pub fn enrich(self, symbol: Symbol, initial_price: f64, timestamp: i64) -> Analysis {
        Analysis {
            symbol,
            initial_price,
            timestamp,
            action_signal: self.action_signal,
            trend_5m: self.trend_5m,
            trend_10m: self.trend_10m,
            dimensions: self.dimensions,
            similarity: self.similarity,
            summary: self.summary,
        }
    }
}

/// Enriched prediction result: model output plus the originating symbol,
/// the instrument price at prediction time and the prediction timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub symbol: Symbol,
    pub initial_price: f64,
    /// Prediction timestamp in milliseconds
    pub timestamp: i64,
    #[serde(default)]
    pub action_signal: String,
    pub trend_5m: TrendForecast,
    pub trend_10m: TrendForecast,
    #[serde(default)]
    pub dimensions: Vec<DimensionScore>,
    #[serde(default)]
    pub similarity: SimilarityAnalysis,
    #[serde(default)]
    pub summary: String,
}

impl Analysis {
    pub fn forecast(&self, horizon: Horizon) -> &TrendForecast {
        match horizon {
            Horizon::Min5 => &self.trend_5m,
            Horizon::Min10 => &self.trend_10m,
        }
    }
}

/// The central entity: one directional call over one fixed horizon.
///
/// Created only by ingestion, mutated only by resolution (status and
/// final_price), never deleted. `end_time` is immutable once set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Deterministic id: "{timestamp_ms}-{symbol}-{horizon label}"
    pub id: String,
    /// Creation time (= prediction time) in milliseconds
    pub timestamp: i64,
    pub symbol: Symbol,
    pub horizon: Horizon,
    pub direction: Direction,
    /// Instrument price at creation time
    pub entry_price: f64,
    /// Predicted price level; informational, not used in resolution
    pub target_price: f64,
    /// timestamp + horizon duration
    pub end_time: i64,
    pub status: TradeStatus,
    /// Present iff status != Pending
    #[serde(default)]
    pub final_price: Option<f64>,
}

impl TradeRecord {
    /// Deterministic id shared by the trades spawned from one prediction
    /// event (one suffix per horizon), preventing duplicate spawn. The
    /// symbol is part of the id so events for different symbols landing in
    /// the same millisecond never collide.
    pub fn make_id(timestamp: i64, symbol: Symbol, horizon: Horizon) -> String {
        format!("{}-{}-{}", timestamp, symbol, horizon.label())
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Simulated per-trade PnL in percent, with the fixed 10x leverage
    /// multiplier baked in. Zero for records that are still pending.
    pub fn simulated_pnl_pct(&self) -> f64 {
        let Some(final_price) = self.final_price else {
            return 0.0;
        };
        if self.status == TradeStatus::Pending || self.entry_price == 0.0 {
            return 0.0;
        }
        let diff = match self.direction {
            Direction::Up => final_price - self.entry_price,
            Direction::Down => self.entry_price - final_price,
        };
        (diff / self.entry_price) * 100.0 * 10.0
    }
}
