use anyhow::{bail, Result};

use crate::analytics::indicators::{
    composite_score, composite_signal, latest_suite, IndicatorKind,
};
use crate::data::provider::MarketDataProvider;
use crate::types::Timeframe;

use super::response_types::{CompositeVerdict, IndicatorsResponse};
use super::DEFAULT_PERIODS;

pub async fn execute(
    provider: &MarketDataProvider,
    symbol: &str,
    timeframe: Timeframe,
    requested: Option<&[String]>,
) -> Result<IndicatorsResponse> {
    let kinds = resolve_kinds(requested)?;
    let candles = provider
        .candles_min(symbol, timeframe, DEFAULT_PERIODS, 2)
        .await?;

    let latest = latest_suite(&candles, &kinds);
    let score = composite_score(&latest);
    let (signal, confidence) = composite_signal(&latest);

    Ok(IndicatorsResponse {
        symbol: MarketDataProvider::canonical_symbol(symbol),
        timeframe: timeframe.as_str().to_string(),
        data_points: candles.len(),
        indicators: latest,
        composite: CompositeVerdict {
            signal,
            score,
            confidence,
        },
    })
}

/// Map requested indicator names onto kinds; an empty or absent request
/// selects the full suite.
fn resolve_kinds(requested: Option<&[String]>) -> Result<Vec<IndicatorKind>> {
    match requested {
        None => Ok(IndicatorKind::ALL.to_vec()),
        Some(names) if names.is_empty() => Ok(IndicatorKind::ALL.to_vec()),
        Some(names) => {
            let mut kinds = Vec::with_capacity(names.len());
            for name in names {
                let kind = IndicatorKind::parse(name)
                    .ok_or_else(|| anyhow::anyhow!("unknown indicator: {name}"))?;
                if kinds.contains(&kind) {
                    bail!("duplicate indicator selection: {name}");
                }
                kinds.push(kind);
            }
            Ok(kinds)
        }
    }
}
