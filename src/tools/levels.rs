use anyhow::Result;

use crate::analytics::levels::analyze;
use crate::data::provider::MarketDataProvider;
use crate::types::{Level, Timeframe};

use super::response_types::LevelsResponse;
use super::DEFAULT_PERIODS;

pub async fn execute(
    provider: &MarketDataProvider,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<LevelsResponse> {
    let (snapshot, candles) = tokio::try_join!(
        provider.snapshot(symbol),
        provider.candles(symbol, timeframe, DEFAULT_PERIODS),
    )?;
    let current_price = snapshot.price;
    let analysis = analyze(&candles, current_price);
    let (support, resistance) = split_levels(analysis.levels, current_price);

    Ok(LevelsResponse {
        symbol: MarketDataProvider::canonical_symbol(symbol),
        timeframe: timeframe.as_str().to_string(),
        current_price,
        nearest_support: support.first().cloned(),
        nearest_resistance: resistance.first().cloned(),
        support,
        resistance,
        trend_lines: analysis.trend_lines,
    })
}

/// Split consolidated levels around the current price: supports below,
/// nearest first; resistances above, nearest first.
pub(crate) fn split_levels(levels: Vec<Level>, current_price: f64) -> (Vec<Level>, Vec<Level>) {
    let (mut support, mut resistance): (Vec<Level>, Vec<Level>) = levels
        .into_iter()
        .partition(|l| l.price <= current_price);
    support.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap_or(std::cmp::Ordering::Equal));
    resistance.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));
    (support, resistance)
}
