//! Full analysis: one pipeline run combining snapshot, indicators, patterns,
//! levels and the aggregated signal, memoized per (symbol, timeframe, risk).

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::analytics::indicators::{
    composite_score, composite_signal, latest_suite, IndicatorKind,
};
use crate::analytics::levels;
use crate::analytics::patterns::detect_patterns;
use crate::analytics::signals::aggregate;
use crate::data::cache::TtlCache;
use crate::data::error::ProviderError;
use crate::data::provider::MarketDataProvider;
use crate::types::{ChartPattern, Level, RiskLevel, Signal, Timeframe, TradingSignal};

use super::levels::split_levels;
use super::response_types::{CompositeVerdict, FullAnalysisResponse, PatternEntry};
use super::DEFAULT_PERIODS;

pub type AnalysisKey = (String, Timeframe, RiskLevel);
pub type AnalysisCache = TtlCache<AnalysisKey, FullAnalysisResponse>;

pub const ANALYSIS_TTL: Duration = Duration::from_secs(120);

pub fn new_cache() -> AnalysisCache {
    TtlCache::new(ANALYSIS_TTL)
}

pub async fn execute(
    provider: Arc<MarketDataProvider>,
    cache: &AnalysisCache,
    symbol: &str,
    timeframe: Timeframe,
    risk: RiskLevel,
) -> Result<FullAnalysisResponse> {
    let symbol = MarketDataProvider::canonical_symbol(symbol);
    let key = (symbol.clone(), timeframe, risk);
    Ok(cache
        .get_or_fetch(key, move || compute(provider, symbol, timeframe, risk))
        .await?)
}

async fn compute(
    provider: Arc<MarketDataProvider>,
    symbol: String,
    timeframe: Timeframe,
    risk: RiskLevel,
) -> Result<FullAnalysisResponse, ProviderError> {
    let (snapshot, candles) = tokio::try_join!(
        provider.snapshot(&symbol),
        provider.candles(&symbol, timeframe, DEFAULT_PERIODS),
    )?;

    let indicator_values = latest_suite(&candles, &IndicatorKind::ALL);
    let score = composite_score(&indicator_values);
    let (comp_signal, comp_confidence) = composite_signal(&indicator_values);
    let patterns = detect_patterns(&candles);
    let level_analysis = levels::analyze(&candles, snapshot.price);

    let signal = aggregate(
        &snapshot,
        &indicator_values,
        &patterns,
        &level_analysis.levels,
        risk,
    );
    let (support, resistance) = split_levels(level_analysis.levels, snapshot.price);

    let summary = format!(
        "{symbol} trades at {:.4} ({} data). The {timeframe} read is {} \
         with {:.0}% confidence.",
        snapshot.price,
        snapshot.source,
        signal.signal,
        signal.confidence * 100.0
    );
    let recommendations = build_recommendations(&signal, &patterns, &support, &resistance);

    Ok(FullAnalysisResponse {
        symbol,
        timeframe: timeframe.as_str().to_string(),
        risk_level: risk.as_str().to_string(),
        price: snapshot,
        composite: CompositeVerdict {
            signal: comp_signal,
            score,
            confidence: comp_confidence,
        },
        indicators: indicator_values,
        patterns: patterns.iter().map(PatternEntry::from).collect(),
        support,
        resistance,
        trend_lines: level_analysis.trend_lines,
        signal: signal.signal,
        confidence: signal.confidence,
        stop_loss: signal.stop_loss,
        take_profit: signal.take_profit,
        reasoning: signal.reasoning,
        breakdown: signal.contributions,
        summary,
        recommendations,
    })
}

fn build_recommendations(
    signal: &Signal,
    patterns: &[ChartPattern],
    support: &[Level],
    resistance: &[Level],
) -> Vec<String> {
    let mut out = Vec::new();

    match signal.signal {
        TradingSignal::Buy | TradingSignal::StrongBuy => {
            out.push(format!("Consider entries near {:.4}.", signal.entry_price));
        }
        TradingSignal::Sell | TradingSignal::StrongSell => {
            out.push(format!(
                "Consider reducing exposure near {:.4}.",
                signal.entry_price
            ));
        }
        TradingSignal::Hold => {
            out.push("No directional edge; wait for a clearer setup.".to_string());
        }
    }
    if let Some(stop) = signal.stop_loss {
        out.push(format!("Invalidation below/above {stop:.4}."));
    }
    if let Some(target) = signal.take_profit {
        out.push(format!("First objective at {target:.4}."));
    }

    if let Some(best) = patterns.first() {
        out.push(format!(
            "Strongest pattern: {} at {:.0}% confidence.",
            best.kind.label().replace('_', " "),
            best.confidence * 100.0
        ));
    }
    if let Some(s) = support.first() {
        out.push(format!(
            "Nearest support at {:.4} ({} touches).",
            s.price, s.touches
        ));
    }
    if let Some(r) = resistance.first() {
        out.push(format!(
            "Nearest resistance at {:.4} ({} touches).",
            r.price, r.touches
        ));
    }
    out
}
