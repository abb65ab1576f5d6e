use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::geckoterminal::Pool;
use crate::types::{
    Candle, ChartPattern, Contribution, IndicatorValue, Level, PivotPoint, PriceSnapshot,
    TradingSignal, TrendDirection, TrendLine,
};

/// One detected pattern with its kind attributes spelled out for the caller.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PatternEntry {
    pub kind: String,
    pub confidence: f64,
    pub direction: TrendDirection,
    pub is_reversal: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub description: String,
    pub target: Option<f64>,
    pub stop_loss: Option<f64>,
    pub key_points: Vec<PivotPoint>,
}

impl From<&ChartPattern> for PatternEntry {
    fn from(p: &ChartPattern) -> Self {
        Self {
            kind: p.kind.label().to_string(),
            confidence: p.confidence,
            direction: p.kind.bias(),
            is_reversal: p.kind.is_reversal(),
            start_time: p.start_time,
            end_time: p.end_time,
            description: p.description.clone(),
            target: p.target,
            stop_loss: p.stop_loss,
            key_points: p.key_points.clone(),
        }
    }
}

/// Weighted verdict over the indicator suite.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompositeVerdict {
    pub signal: TradingSignal,
    /// Mean verdict score in [−2, +2].
    pub score: f64,
    pub confidence: f64,
}

/// Response for `get_technical_indicators`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndicatorsResponse {
    pub symbol: String,
    pub timeframe: String,
    pub data_points: usize,
    /// Latest emission of each requested indicator.
    pub indicators: Vec<IndicatorValue>,
    pub composite: CompositeVerdict,
}

/// Response for `detect_chart_patterns`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PatternsResponse {
    pub symbol: String,
    pub timeframe: String,
    pub data_points: usize,
    pub patterns: Vec<PatternEntry>,
}

/// Response for `get_support_resistance`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LevelsResponse {
    pub symbol: String,
    pub timeframe: String,
    pub current_price: f64,
    /// Levels below the current price, nearest first.
    pub support: Vec<Level>,
    /// Levels above the current price, nearest first.
    pub resistance: Vec<Level>,
    pub nearest_support: Option<Level>,
    pub nearest_resistance: Option<Level>,
    pub trend_lines: Vec<TrendLine>,
}

/// Response for `get_trading_signals`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SignalResponse {
    pub symbol: String,
    pub timeframe: String,
    pub risk_level: String,
    pub signal: TradingSignal,
    pub confidence: f64,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub reasoning: String,
    pub breakdown: Vec<Contribution>,
}

/// Response for `get_full_analysis`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FullAnalysisResponse {
    pub symbol: String,
    pub timeframe: String,
    pub risk_level: String,
    pub price: PriceSnapshot,
    pub composite: CompositeVerdict,
    pub indicators: Vec<IndicatorValue>,
    pub patterns: Vec<PatternEntry>,
    pub support: Vec<Level>,
    pub resistance: Vec<Level>,
    pub trend_lines: Vec<TrendLine>,
    pub signal: TradingSignal,
    pub confidence: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub reasoning: String,
    pub breakdown: Vec<Contribution>,
    pub summary: String,
    pub recommendations: Vec<String>,
}

/// One timeframe's slice of `multi_timeframe_analysis`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TimeframeSnapshot {
    pub trend: TrendDirection,
    pub overall_signal: TradingSignal,
    pub confidence: f64,
    pub indicators: Vec<IndicatorValue>,
    pub patterns: Vec<PatternEntry>,
    pub support: Vec<Level>,
    pub resistance: Vec<Level>,
}

/// Response for `multi_timeframe_analysis`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MultiTimeframeResponse {
    pub symbol: String,
    /// Keyed by timeframe label; timeframes that failed are omitted.
    pub timeframes: BTreeMap<String, TimeframeSnapshot>,
    pub summary: String,
}

/// A pool as reported by the DEX tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PoolSummary {
    pub network: String,
    pub address: String,
    pub name: String,
    pub dex: Option<String>,
    pub base_token_symbol: Option<String>,
    pub base_token_address: Option<String>,
    pub price_usd: Option<f64>,
    pub reserve_usd: Option<f64>,
    pub fdv_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
    pub price_change_24h_pct: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Pool> for PoolSummary {
    fn from(p: &Pool) -> Self {
        Self {
            network: p.network.clone(),
            address: p.address.clone(),
            name: p.name.clone(),
            dex: p.dex.clone(),
            base_token_symbol: p.base_token_symbol.clone(),
            base_token_address: p.base_token_address.clone(),
            price_usd: p.price_usd,
            reserve_usd: p.reserve_usd,
            fdv_usd: p.fdv_usd,
            volume_24h_usd: p.volume_24h_usd,
            price_change_24h_pct: p.price_change_24h_pct,
            created_at: p.created_at,
        }
    }
}

/// Response for `get_token_liquidity`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LiquidityResponse {
    pub symbol: String,
    pub network: Option<String>,
    pub pool_count: usize,
    pub total_liquidity_usd: f64,
    pub total_volume_24h_usd: f64,
    pub top_pools: Vec<PoolSummary>,
}

/// A token aggregated across its pools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TokenAggregate {
    pub symbol: String,
    pub network: String,
    pub pool_count: usize,
    pub total_liquidity_usd: f64,
    pub total_volume_24h_usd: f64,
    /// Price at the deepest pool.
    pub price_usd: Option<f64>,
}

/// Response for `search_tokens_by_network`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NetworkTokensResponse {
    pub network: String,
    pub query: Option<String>,
    pub tokens: Vec<TokenAggregate>,
}

/// Response for `search_tokens_advanced`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TokenSearchResponse {
    pub query: String,
    pub tokens: Vec<TokenAggregate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DexPrice {
    pub dex: String,
    pub price_usd: f64,
    pub pool_address: String,
    pub reserve_usd: Option<f64>,
}

/// Response for `compare_dex_prices`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DexPricesResponse {
    pub symbol: String,
    pub network: String,
    pub prices: Vec<DexPrice>,
    pub best_price_usd: f64,
    pub worst_price_usd: f64,
    pub average_price_usd: f64,
    pub spread_usd: f64,
    pub spread_pct: f64,
}

/// Response for `get_network_pools`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PoolsResponse {
    pub network: String,
    pub sort_by: String,
    pub pools: Vec<PoolSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DexEntry {
    pub id: String,
    pub name: String,
}

/// Response for `get_dex_info`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DexListResponse {
    pub network: String,
    pub dexes: Vec<DexEntry>,
}

/// Response for `get_pool_analytics`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PoolAnalyticsResponse {
    pub network: String,
    pub pool: PoolSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OhlcvStats {
    pub data_points: usize,
    pub high: f64,
    pub low: f64,
    pub average_close: f64,
    pub total_volume: f64,
    /// First-open to last-close percent change over the window.
    pub change_pct: f64,
}

/// Response for `get_pool_ohlcv`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PoolOhlcvResponse {
    pub network: String,
    pub pool_address: String,
    pub interval: String,
    pub candles: Vec<Candle>,
    pub statistics: OhlcvStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NetworkEntry {
    pub id: String,
    pub name: String,
}

/// Response for `get_available_networks`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NetworksResponse {
    pub networks: Vec<NetworkEntry>,
}
