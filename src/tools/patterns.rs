use anyhow::Result;

use crate::analytics::patterns::detect_patterns;
use crate::data::provider::MarketDataProvider;
use crate::types::Timeframe;

use super::response_types::{PatternEntry, PatternsResponse};
use super::DEFAULT_PERIODS;

pub async fn execute(
    provider: &MarketDataProvider,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<PatternsResponse> {
    let candles = provider
        .candles(symbol, timeframe, DEFAULT_PERIODS)
        .await?;
    let patterns = detect_patterns(&candles);

    Ok(PatternsResponse {
        symbol: MarketDataProvider::canonical_symbol(symbol),
        timeframe: timeframe.as_str().to_string(),
        data_points: candles.len(),
        patterns: patterns.iter().map(PatternEntry::from).collect(),
    })
}
