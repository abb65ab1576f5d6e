//! Composite signal aggregator. Collects one verdict from the indicator
//! composite, one from level proximity, and one per qualifying pattern, then
//! resolves the bag with a 60% majority rule. Stops and targets come from the
//! nearest levels, with fixed percentage fallbacks when none exist.

use crate::types::{
    ChartPattern, Contribution, IndicatorValue, Level, PriceSnapshot, RiskLevel, Signal,
    TradingSignal, TrendDirection,
};

use super::indicators;

/// A level within this fraction of the price votes in the signal bag.
const LEVEL_PROXIMITY: f64 = 0.02;

/// A level within this fraction of the price is worth mentioning.
const RATIONALE_PROXIMITY: f64 = 0.03;

pub fn aggregate(
    snapshot: &PriceSnapshot,
    indicator_values: &[IndicatorValue],
    patterns: &[ChartPattern],
    levels: &[Level],
    risk: RiskLevel,
) -> Signal {
    let price = snapshot.price;
    let (indicator_verdict, _) = indicators::composite_signal(indicator_values);

    let nearest_support = nearest_below(levels, price);
    let nearest_resistance = nearest_above(levels, price);
    let level_verdict = level_signal(price, nearest_support, nearest_resistance);

    let mut contributions = vec![
        Contribution {
            source: "indicators".to_string(),
            signal: indicator_verdict,
        },
        Contribution {
            source: "levels".to_string(),
            signal: level_verdict,
        },
    ];

    let threshold = risk.signal_threshold();
    let qualifying: Vec<&ChartPattern> = patterns
        .iter()
        .filter(|p| p.confidence >= threshold)
        .collect();
    for pattern in &qualifying {
        let verdict = match pattern.kind.bias() {
            TrendDirection::Bullish => TradingSignal::Buy,
            TrendDirection::Bearish => TradingSignal::Sell,
            TrendDirection::Neutral => TradingSignal::Hold,
        };
        contributions.push(Contribution {
            source: format!("pattern:{}", pattern.kind.label()),
            signal: verdict,
        });
    }

    let bag: Vec<TradingSignal> = contributions.iter().map(|c| c.signal).collect();
    let (signal, confidence) = resolve(&bag);

    let (stop_loss, take_profit) = match signal {
        TradingSignal::Buy | TradingSignal::StrongBuy => (
            Some(nearest_support.map_or(price * 0.95, |l| l.price * 0.98)),
            Some(nearest_resistance.map_or(price * 1.10, |l| l.price * 0.98)),
        ),
        TradingSignal::Sell | TradingSignal::StrongSell => (
            Some(nearest_resistance.map_or(price * 1.05, |l| l.price * 1.02)),
            Some(nearest_support.map_or(price * 0.90, |l| l.price * 1.02)),
        ),
        TradingSignal::Hold => (None, None),
    };

    let reasoning = build_reasoning(price, indicator_values, &qualifying, levels);

    Signal {
        signal,
        confidence,
        entry_price: price,
        stop_loss,
        take_profit,
        reasoning,
        contributions,
    }
}

/// Majority rule over a verdict bag: 60% buys → Buy, 60% sells → Sell,
/// otherwise Hold at 0.5 confidence.
pub fn resolve(bag: &[TradingSignal]) -> (TradingSignal, f64) {
    if bag.is_empty() {
        return (TradingSignal::Hold, 0.5);
    }
    let total = bag.len() as f64;
    let buys = bag.iter().filter(|s| s.is_buy()).count() as f64;
    let sells = bag.iter().filter(|s| s.is_sell()).count() as f64;

    if buys / total >= 0.6 {
        (TradingSignal::Buy, buys / total)
    } else if sells / total >= 0.6 {
        (TradingSignal::Sell, sells / total)
    } else {
        (TradingSignal::Hold, 0.5)
    }
}

fn level_signal(
    price: f64,
    nearest_support: Option<&Level>,
    nearest_resistance: Option<&Level>,
) -> TradingSignal {
    if let Some(support) = nearest_support {
        if (price - support.price).abs() <= price * LEVEL_PROXIMITY {
            return TradingSignal::Buy;
        }
    }
    if let Some(resistance) = nearest_resistance {
        if (resistance.price - price).abs() <= price * LEVEL_PROXIMITY {
            return TradingSignal::Sell;
        }
    }
    TradingSignal::Hold
}

fn nearest_below(levels: &[Level], price: f64) -> Option<&Level> {
    levels
        .iter()
        .filter(|l| l.price < price)
        .max_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal))
}

fn nearest_above(levels: &[Level], price: f64) -> Option<&Level> {
    levels
        .iter()
        .filter(|l| l.price > price)
        .min_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal))
}

fn build_reasoning(
    price: f64,
    indicator_values: &[IndicatorValue],
    qualifying: &[&ChartPattern],
    levels: &[Level],
) -> String {
    let mut parts = Vec::new();

    if let Some(rsi) = indicator_values.iter().find(|v| v.name.starts_with("RSI")) {
        let regime = if rsi.value >= 70.0 {
            "overbought"
        } else if rsi.value <= 30.0 {
            "oversold"
        } else {
            "neutral"
        };
        parts.push(format!("RSI is {regime} at {:.1}", rsi.value));
    }

    if !qualifying.is_empty() {
        let names: Vec<String> = qualifying
            .iter()
            .map(|p| p.kind.label().replace('_', " "))
            .collect();
        parts.push(format!("detected patterns: {}", names.join(", ")));
    }

    let near = levels
        .iter()
        .filter(|l| (l.price - price).abs() <= price * RATIONALE_PROXIMITY)
        .min_by(|a, b| {
            (a.price - price)
                .abs()
                .partial_cmp(&(b.price - price).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    if let Some(level) = near {
        let side = if level.price <= price {
            "support"
        } else {
            "resistance"
        };
        parts.push(format!("price is near {side} at {:.4}", level.price));
    }

    if parts.is_empty() {
        "no dominant signal; market looks neutral".to_string()
    } else {
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LevelKind, PatternKind, PercentChanges, PivotPoint, PointKind};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn snapshot(price: f64) -> PriceSnapshot {
        PriceSnapshot {
            symbol: "BTC".to_string(),
            price,
            change_24h: None,
            change_24h_pct: None,
            volume_24h: None,
            market_cap: None,
            rank: None,
            percent_changes: PercentChanges::default(),
            ath_price: None,
            ath_date: None,
            source: "coinpaprika".to_string(),
            network: None,
            dex: None,
            pool_address: None,
            fetched_at: Utc::now(),
        }
    }

    fn indicator(name: &str, value: f64, signal: TradingSignal) -> IndicatorValue {
        IndicatorValue {
            name: name.to_string(),
            value,
            signal,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
            parameters: BTreeMap::new(),
        }
    }

    fn level(price: f64, kind: LevelKind) -> Level {
        Level {
            price,
            strength: 0.6,
            kind,
            touches: 3,
            last_touch: Utc.with_ymd_and_hms(2024, 1, 30, 0, 0, 0).unwrap(),
            is_active: true,
        }
    }

    fn pattern(kind: PatternKind, confidence: f64) -> ChartPattern {
        let t = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();
        ChartPattern {
            kind,
            confidence,
            start_time: t,
            end_time: t,
            key_points: vec![PivotPoint {
                timestamp: t,
                price: 100.0,
                kind: PointKind::Peak,
                index: 5,
            }],
            description: String::new(),
            target: None,
            stop_loss: None,
        }
    }

    #[test]
    fn majority_rule_thresholds() {
        // Property: 6-of-10 buys → Buy at 0.6; 5-of-10 → Hold at 0.5.
        let mut bag = vec![TradingSignal::Buy; 6];
        bag.extend(vec![TradingSignal::Hold; 4]);
        assert_eq!(resolve(&bag), (TradingSignal::Buy, 0.6));

        let mut bag = vec![TradingSignal::Buy; 5];
        bag.extend(vec![TradingSignal::Hold; 5]);
        assert_eq!(resolve(&bag), (TradingSignal::Hold, 0.5));

        let mut bag = vec![TradingSignal::Sell; 7];
        bag.extend(vec![TradingSignal::Buy; 3]);
        assert_eq!(resolve(&bag), (TradingSignal::Sell, 0.7));

        assert_eq!(resolve(&[]), (TradingSignal::Hold, 0.5));
    }

    #[test]
    fn strong_verdicts_count_toward_majorities() {
        let bag = vec![
            TradingSignal::StrongBuy,
            TradingSignal::Buy,
            TradingSignal::StrongBuy,
        ];
        assert_eq!(resolve(&bag), (TradingSignal::Buy, 1.0));
    }

    #[test]
    fn buy_signal_places_stop_below_support() {
        let indicators = vec![
            indicator("RSI_14", 25.0, TradingSignal::Buy),
            indicator("SMA_20", 99.0, TradingSignal::Buy),
            indicator("OBV", 5_000.0, TradingSignal::Buy),
        ];
        let levels = vec![
            level(98.5, LevelKind::Support),
            level(120.0, LevelKind::Resistance),
        ];
        let signal = aggregate(&snapshot(100.0), &indicators, &[], &levels, RiskLevel::Moderate);

        assert_eq!(signal.signal, TradingSignal::Buy);
        assert!((signal.stop_loss.unwrap() - 98.5 * 0.98).abs() < 1e-9);
        assert!((signal.take_profit.unwrap() - 120.0 * 0.98).abs() < 1e-9);
        assert!(signal.reasoning.contains("oversold"));
        assert!(signal.reasoning.contains("support"));
    }

    #[test]
    fn buy_without_levels_uses_percentage_fallbacks() {
        let indicators = vec![
            indicator("RSI_14", 25.0, TradingSignal::Buy),
            indicator("SMA_20", 99.0, TradingSignal::Buy),
            indicator("EMA_20", 99.0, TradingSignal::Buy),
        ];
        // Bag: indicator Buy, level Hold, pattern Buy → 2/3 buys.
        let patterns = vec![pattern(PatternKind::InverseHeadAndShoulders, 0.9)];
        let signal = aggregate(
            &snapshot(100.0),
            &indicators,
            &patterns,
            &[],
            RiskLevel::Moderate,
        );
        assert_eq!(signal.signal, TradingSignal::Buy);
        assert!((signal.stop_loss.unwrap() - 95.0).abs() < 1e-9);
        assert!((signal.take_profit.unwrap() - 110.0).abs() < 1e-9);
    }

    #[test]
    fn hold_signal_carries_no_stops() {
        let indicators = vec![indicator("RSI_14", 50.0, TradingSignal::Hold)];
        let signal = aggregate(&snapshot(100.0), &indicators, &[], &[], RiskLevel::Moderate);
        assert_eq!(signal.signal, TradingSignal::Hold);
        assert!(signal.stop_loss.is_none());
        assert!(signal.take_profit.is_none());
        assert_eq!(signal.confidence, 0.5);
    }

    #[test]
    fn risk_threshold_filters_patterns() {
        let indicators = vec![indicator("RSI_14", 50.0, TradingSignal::Hold)];
        let patterns = vec![pattern(PatternKind::HeadAndShoulders, 0.5)];

        // Conservative (0.8) excludes the 0.5-confidence pattern entirely.
        let conservative = aggregate(
            &snapshot(100.0),
            &indicators,
            &patterns,
            &[],
            RiskLevel::Conservative,
        );
        assert!(!conservative
            .contributions
            .iter()
            .any(|c| c.source.starts_with("pattern:")));

        // Aggressive (0.4) lets it vote.
        let aggressive = aggregate(
            &snapshot(100.0),
            &indicators,
            &patterns,
            &[],
            RiskLevel::Aggressive,
        );
        let vote = aggressive
            .contributions
            .iter()
            .find(|c| c.source == "pattern:head_and_shoulders")
            .expect("pattern contribution expected");
        assert_eq!(vote.signal, TradingSignal::Sell);
    }

    #[test]
    fn neutral_patterns_vote_hold() {
        let indicators = vec![indicator("RSI_14", 50.0, TradingSignal::Hold)];
        let patterns = vec![pattern(PatternKind::Doji, 0.5)];
        let signal = aggregate(
            &snapshot(100.0),
            &indicators,
            &patterns,
            &[],
            RiskLevel::Aggressive,
        );
        let vote = signal
            .contributions
            .iter()
            .find(|c| c.source == "pattern:doji")
            .unwrap();
        assert_eq!(vote.signal, TradingSignal::Hold);
    }

    #[test]
    fn proximity_to_support_votes_buy() {
        let levels = vec![level(99.0, LevelKind::Support)];
        let verdict = level_signal(100.0, nearest_below(&levels, 100.0), None);
        assert_eq!(verdict, TradingSignal::Buy);

        let far = vec![level(90.0, LevelKind::Support)];
        let verdict = level_signal(100.0, nearest_below(&far, 100.0), None);
        assert_eq!(verdict, TradingSignal::Hold);
    }

    #[test]
    fn proximity_to_resistance_votes_sell() {
        let levels = vec![level(101.5, LevelKind::Resistance)];
        let verdict = level_signal(100.0, None, nearest_above(&levels, 100.0));
        assert_eq!(verdict, TradingSignal::Sell);
    }

    #[test]
    fn sell_signal_places_stop_above_resistance() {
        let indicators = vec![
            indicator("RSI_14", 75.0, TradingSignal::Sell),
            indicator("SMA_20", 101.0, TradingSignal::Sell),
            indicator("OBV", -5_000.0, TradingSignal::Sell),
        ];
        let levels = vec![
            level(90.0, LevelKind::Support),
            level(101.0, LevelKind::Resistance),
        ];
        let signal = aggregate(&snapshot(100.0), &indicators, &[], &levels, RiskLevel::Moderate);

        assert_eq!(signal.signal, TradingSignal::Sell);
        assert!((signal.stop_loss.unwrap() - 101.0 * 1.02).abs() < 1e-9);
        assert!((signal.take_profit.unwrap() - 90.0 * 1.02).abs() < 1e-9);
        assert!(signal.reasoning.contains("overbought"));
    }
}
