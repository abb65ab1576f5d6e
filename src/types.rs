use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One OHLCV bar. Upstream guarantees `low <= min(open, close)` and
/// `max(open, close) <= high`; parsing rejects rows that violate this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// A candle whose body is at most 10% of its full range.
    pub fn is_doji(&self) -> bool {
        self.body() <= 0.1 * self.range()
    }

    /// (high + low + close) / 3 — the price volume-profile bins accumulate at.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn body_midpoint(&self) -> f64 {
        (self.open + self.close) / 2.0
    }
}

/// Current market state for a symbol, assembled from whichever source
/// answered. Fields the secondary source cannot supply stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PriceSnapshot {
    pub symbol: String,
    pub price: f64,
    pub change_24h: Option<f64>,
    pub change_24h_pct: Option<f64>,
    pub volume_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub rank: Option<u32>,
    pub percent_changes: PercentChanges,
    pub ath_price: Option<f64>,
    pub ath_date: Option<DateTime<Utc>>,
    /// Which upstream produced this snapshot ("coinpaprika" or "geckoterminal").
    pub source: String,
    /// Pool attribution when the snapshot came from the DEX aggregator.
    pub network: Option<String>,
    pub dex: Option<String>,
    pub pool_address: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

/// Percent price changes over the standard lookback horizons.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PercentChanges {
    pub m15: Option<f64>,
    pub m30: Option<f64>,
    pub h1: Option<f64>,
    pub h6: Option<f64>,
    pub h12: Option<f64>,
    pub h24: Option<f64>,
    pub d7: Option<f64>,
    pub d30: Option<f64>,
    pub y1: Option<f64>,
}

/// Per-indicator verdict. Total ordering of conviction, mapped to a numeric
/// score for composite aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TradingSignal {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl TradingSignal {
    pub fn numeric(self) -> f64 {
        match self {
            TradingSignal::StrongBuy => 2.0,
            TradingSignal::Buy => 1.0,
            TradingSignal::Hold => 0.0,
            TradingSignal::Sell => -1.0,
            TradingSignal::StrongSell => -2.0,
        }
    }

    pub fn is_buy(self) -> bool {
        matches!(self, TradingSignal::Buy | TradingSignal::StrongBuy)
    }

    pub fn is_sell(self) -> bool {
        matches!(self, TradingSignal::Sell | TradingSignal::StrongSell)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TradingSignal::StrongBuy => "strong_buy",
            TradingSignal::Buy => "buy",
            TradingSignal::Hold => "hold",
            TradingSignal::Sell => "sell",
            TradingSignal::StrongSell => "strong_sell",
        }
    }
}

impl fmt::Display for TradingSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One indicator emission for one bar.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndicatorValue {
    /// Indicator identity including its parameters, e.g. "RSI_14".
    pub name: String,
    pub value: f64,
    pub signal: TradingSignal,
    pub timestamp: DateTime<Utc>,
    /// Auxiliary outputs (band edges, %K/%D, histogram, ...).
    pub parameters: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Peak,
    Trough,
    Support,
    Resistance,
    Breakout,
}

/// A local price extremum (or other structurally significant point).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct PivotPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub kind: PointKind,
    /// Bar index within the series the pivot was extracted from.
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    HeadAndShoulders,
    InverseHeadAndShoulders,
    DoubleTop,
    DoubleBottom,
    TripleTop,
    TripleBottom,
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
    RisingWedge,
    FallingWedge,
    Rectangle,
    Hammer,
    ShootingStar,
    Doji,
    BullishEngulfing,
    BearishEngulfing,
    MorningStar,
    EveningStar,
}

impl PatternKind {
    /// Directional bias baked into the pattern kind.
    pub fn bias(self) -> TrendDirection {
        match self {
            PatternKind::InverseHeadAndShoulders
            | PatternKind::DoubleBottom
            | PatternKind::TripleBottom
            | PatternKind::AscendingTriangle
            | PatternKind::FallingWedge
            | PatternKind::Hammer
            | PatternKind::BullishEngulfing
            | PatternKind::MorningStar => TrendDirection::Bullish,
            PatternKind::HeadAndShoulders
            | PatternKind::DoubleTop
            | PatternKind::TripleTop
            | PatternKind::DescendingTriangle
            | PatternKind::RisingWedge
            | PatternKind::ShootingStar
            | PatternKind::BearishEngulfing
            | PatternKind::EveningStar => TrendDirection::Bearish,
            PatternKind::SymmetricalTriangle | PatternKind::Rectangle | PatternKind::Doji => {
                TrendDirection::Neutral
            }
        }
    }

    pub fn is_bullish(self) -> bool {
        self.bias() == TrendDirection::Bullish
    }

    pub fn is_reversal(self) -> bool {
        match self {
            PatternKind::HeadAndShoulders
            | PatternKind::InverseHeadAndShoulders
            | PatternKind::DoubleTop
            | PatternKind::DoubleBottom
            | PatternKind::TripleTop
            | PatternKind::TripleBottom
            | PatternKind::Hammer
            | PatternKind::ShootingStar
            | PatternKind::BullishEngulfing
            | PatternKind::BearishEngulfing
            | PatternKind::MorningStar
            | PatternKind::EveningStar => true,
            PatternKind::AscendingTriangle
            | PatternKind::DescendingTriangle
            | PatternKind::SymmetricalTriangle
            | PatternKind::RisingWedge
            | PatternKind::FallingWedge
            | PatternKind::Rectangle
            | PatternKind::Doji => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PatternKind::HeadAndShoulders => "head_and_shoulders",
            PatternKind::InverseHeadAndShoulders => "inverse_head_and_shoulders",
            PatternKind::DoubleTop => "double_top",
            PatternKind::DoubleBottom => "double_bottom",
            PatternKind::TripleTop => "triple_top",
            PatternKind::TripleBottom => "triple_bottom",
            PatternKind::AscendingTriangle => "ascending_triangle",
            PatternKind::DescendingTriangle => "descending_triangle",
            PatternKind::SymmetricalTriangle => "symmetrical_triangle",
            PatternKind::RisingWedge => "rising_wedge",
            PatternKind::FallingWedge => "falling_wedge",
            PatternKind::Rectangle => "rectangle",
            PatternKind::Hammer => "hammer",
            PatternKind::ShootingStar => "shooting_star",
            PatternKind::Doji => "doji",
            PatternKind::BullishEngulfing => "bullish_engulfing",
            PatternKind::BearishEngulfing => "bearish_engulfing",
            PatternKind::MorningStar => "morning_star",
            PatternKind::EveningStar => "evening_star",
        }
    }
}

/// A detected chart or candlestick pattern.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChartPattern {
    pub kind: PatternKind,
    /// Detection confidence in [0, 1].
    pub confidence: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub key_points: Vec<PivotPoint>,
    pub description: String,
    pub target: Option<f64>,
    pub stop_loss: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    Support,
    Resistance,
    Pivot,
    Fibonacci,
}

/// A horizontal support/resistance level with its evidence.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Level {
    pub price: f64,
    /// Strength in [0, 1], monotone in touches and recency.
    pub strength: f64,
    pub kind: LevelKind,
    pub touches: u32,
    pub last_touch: DateTime<Utc>,
    /// Within 10% of the current price.
    pub is_active: bool,
}

/// A sloped support/resistance line fitted through pivot points,
/// `price = slope * bar_index + intercept`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
    pub kind: LevelKind,
    /// Pivots lying within tolerance of the line.
    pub touches: u32,
}

/// One contributor's vote inside a composite signal.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Contribution {
    pub source: String,
    pub signal: TradingSignal,
}

/// The aggregated trading signal for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Signal {
    pub signal: TradingSignal,
    pub confidence: f64,
    pub entry_price: f64,
    /// Only set for directional verdicts.
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub reasoning: String,
    pub contributions: Vec<Contribution>,
}

/// Analysis timeframe. The closed set of bar sizes the engine understands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
pub enum Timeframe {
    #[serde(rename = "4h")]
    FourHour,
    #[default]
    #[serde(rename = "daily", alias = "1d")]
    Daily,
    #[serde(rename = "weekly", alias = "1w")]
    Weekly,
    #[serde(rename = "monthly", alias = "1M")]
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::FourHour,
        Timeframe::Daily,
        Timeframe::Weekly,
        Timeframe::Monthly,
    ];

    pub fn minutes(self) -> u32 {
        match self {
            Timeframe::FourHour => 240,
            Timeframe::Daily => 1_440,
            Timeframe::Weekly => 10_080,
            Timeframe::Monthly => 43_200,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::FourHour => "4h",
            Timeframe::Daily => "daily",
            Timeframe::Weekly => "weekly",
            Timeframe::Monthly => "monthly",
        }
    }

    /// True for bar sizes the primary source only serves on a paid plan.
    pub fn is_intraday(self) -> bool {
        matches!(self, Timeframe::FourHour)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller risk appetite. Selects the minimum confidence a pattern must meet
/// to influence the aggregated signal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[serde(alias = "low")]
    Conservative,
    #[default]
    #[serde(alias = "medium")]
    Moderate,
    #[serde(alias = "high")]
    Aggressive,
}

impl RiskLevel {
    pub fn signal_threshold(self) -> f64 {
        match self {
            RiskLevel::Conservative => 0.8,
            RiskLevel::Moderate => 0.6,
            RiskLevel::Aggressive => 0.4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Conservative => "conservative",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Aggressive => "aggressive",
        }
    }
}
