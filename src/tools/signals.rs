use anyhow::Result;

use crate::analytics::indicators::{latest_suite, IndicatorKind};
use crate::analytics::levels::analyze;
use crate::analytics::patterns::detect_patterns;
use crate::analytics::signals::aggregate;
use crate::data::provider::MarketDataProvider;
use crate::types::{RiskLevel, Timeframe};

use super::response_types::SignalResponse;
use super::DEFAULT_PERIODS;

pub async fn execute(
    provider: &MarketDataProvider,
    symbol: &str,
    timeframe: Timeframe,
    risk: RiskLevel,
) -> Result<SignalResponse> {
    let (snapshot, candles) = tokio::try_join!(
        provider.snapshot(symbol),
        provider.candles(symbol, timeframe, DEFAULT_PERIODS),
    )?;

    let indicator_values = latest_suite(&candles, &IndicatorKind::ALL);
    let patterns = detect_patterns(&candles);
    let level_analysis = analyze(&candles, snapshot.price);

    let signal = aggregate(
        &snapshot,
        &indicator_values,
        &patterns,
        &level_analysis.levels,
        risk,
    );

    Ok(SignalResponse {
        symbol: MarketDataProvider::canonical_symbol(symbol),
        timeframe: timeframe.as_str().to_string(),
        risk_level: risk.as_str().to_string(),
        signal: signal.signal,
        confidence: signal.confidence,
        entry_price: signal.entry_price,
        stop_loss: signal.stop_loss,
        take_profit: signal.take_profit,
        reasoning: signal.reasoning,
        breakdown: signal.contributions,
    })
}
