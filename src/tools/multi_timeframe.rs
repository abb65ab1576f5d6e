//! Multi-timeframe view: the full-analysis pipeline fanned out across all
//! four timeframes concurrently. A timeframe that fails is omitted rather
//! than failing the whole call.

use anyhow::{bail, Result};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::analytics::indicators::trend_from_score;
use crate::data::provider::MarketDataProvider;
use crate::types::{RiskLevel, Timeframe, TrendDirection};

use super::full_analysis::{self, AnalysisCache};
use super::response_types::{MultiTimeframeResponse, TimeframeSnapshot};

pub async fn execute(
    provider: Arc<MarketDataProvider>,
    cache: &AnalysisCache,
    symbol: &str,
) -> Result<MultiTimeframeResponse> {
    let symbol = MarketDataProvider::canonical_symbol(symbol);

    let runs = Timeframe::ALL.map(|tf| {
        let provider = provider.clone();
        let symbol = symbol.clone();
        async move {
            (
                tf,
                full_analysis::execute(provider, cache, &symbol, tf, RiskLevel::Moderate).await,
            )
        }
    });
    let results = join_all(runs).await;

    let mut timeframes = BTreeMap::new();
    let mut first_error = None;
    for (tf, result) in results {
        match result {
            Ok(full) => {
                timeframes.insert(
                    tf.as_str().to_string(),
                    TimeframeSnapshot {
                        trend: trend_from_score(full.composite.score),
                        overall_signal: full.signal,
                        confidence: full.confidence,
                        indicators: full.indicators,
                        patterns: full.patterns,
                        support: full.support,
                        resistance: full.resistance,
                    },
                );
            }
            Err(e) => {
                tracing::warn!(timeframe = %tf, symbol = %symbol, error = %e, "timeframe analysis failed, omitting");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    if timeframes.is_empty() {
        match first_error {
            Some(e) => return Err(e),
            None => bail!("no timeframe produced a result for {symbol}"),
        }
    }

    let summary = summarize(&symbol, &timeframes);
    Ok(MultiTimeframeResponse {
        symbol,
        timeframes,
        summary,
    })
}

fn summarize(symbol: &str, timeframes: &BTreeMap<String, TimeframeSnapshot>) -> String {
    let total = timeframes.len();
    let bullish = timeframes
        .values()
        .filter(|t| t.trend == TrendDirection::Bullish)
        .count();
    let bearish = timeframes
        .values()
        .filter(|t| t.trend == TrendDirection::Bearish)
        .count();

    let bias = if bullish > bearish && bullish * 2 >= total {
        "bullish"
    } else if bearish > bullish && bearish * 2 >= total {
        "bearish"
    } else {
        "mixed"
    };

    format!(
        "{symbol}: {bullish} of {total} timeframes lean bullish, {bearish} bearish; \
         overall bias is {bias}."
    )
}
