//! Chart-pattern recognizer: pivot extraction, reversal and continuation
//! structures over pivot sequences, and candlestick patterns over the raw
//! bars. Detections carry a confidence in [0, 1] and, where the geometry
//! implies one, a measured target and invalidation stop.

use std::cmp::Ordering;

use crate::types::{Candle, ChartPattern, PatternKind, PivotPoint, PointKind};

/// Minimum bars before any structural detection is attempted.
const MIN_CANDLES: usize = 10;

/// Relative price tolerance for "equal" pivots.
pub const PRICE_TOLERANCE: f64 = 0.02;

/// Mark interior bars whose high (low) exceeds both neighbours.
pub fn find_pivots(candles: &[Candle]) -> Vec<PivotPoint> {
    let mut out = Vec::new();
    if candles.len() < 3 {
        return out;
    }
    for i in 1..candles.len() - 1 {
        if candles[i].high > candles[i - 1].high && candles[i].high > candles[i + 1].high {
            out.push(PivotPoint {
                timestamp: candles[i].timestamp,
                price: candles[i].high,
                kind: PointKind::Peak,
                index: i,
            });
        }
        if candles[i].low < candles[i - 1].low && candles[i].low < candles[i + 1].low {
            out.push(PivotPoint {
                timestamp: candles[i].timestamp,
                price: candles[i].low,
                kind: PointKind::Trough,
                index: i,
            });
        }
    }
    out
}

/// Run every detector and return the findings sorted by descending
/// confidence. Series shorter than ten bars yield nothing.
pub fn detect_patterns(candles: &[Candle]) -> Vec<ChartPattern> {
    if candles.len() < MIN_CANDLES {
        return vec![];
    }

    let pivots = find_pivots(candles);
    let peaks: Vec<PivotPoint> = pivots
        .iter()
        .filter(|p| p.kind == PointKind::Peak)
        .copied()
        .collect();
    let troughs: Vec<PivotPoint> = pivots
        .iter()
        .filter(|p| p.kind == PointKind::Trough)
        .copied()
        .collect();

    let mut out = Vec::new();
    out.extend(detect_head_and_shoulders(&peaks, &troughs, false));
    out.extend(detect_head_and_shoulders(&troughs, &peaks, true));
    out.extend(detect_tops_and_bottoms(&peaks, &troughs, false));
    out.extend(detect_tops_and_bottoms(&troughs, &peaks, true));
    out.extend(detect_triangle(candles, &peaks, &troughs));
    out.extend(detect_wedge(&peaks, &troughs));
    out.extend(detect_rectangle(&peaks, &troughs));
    out.extend(detect_candlesticks(candles));

    out.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    out
}

// ---------------------------------------------------------------------------
// Reversal structures
// ---------------------------------------------------------------------------

/// Head & shoulders over peaks, or its inverse over troughs when
/// `inverted` is set (`extremes` and `opposites` swap roles accordingly).
fn detect_head_and_shoulders(
    extremes: &[PivotPoint],
    opposites: &[PivotPoint],
    inverted: bool,
) -> Vec<ChartPattern> {
    let mut out = Vec::new();

    for w in extremes.windows(3) {
        let (left, head, right) = (w[0], w[1], w[2]);

        let head_extreme = if inverted {
            head.price < left.price && head.price < right.price
        } else {
            head.price > left.price && head.price > right.price
        };
        if !head_extreme {
            continue;
        }

        let shoulder_diff = relative_diff(left.price, right.price);
        if shoulder_diff > PRICE_TOLERANCE {
            continue;
        }

        let neckline_points: Vec<PivotPoint> = opposites
            .iter()
            .filter(|p| p.index > left.index && p.index < right.index)
            .copied()
            .collect();
        if neckline_points.len() < 2 {
            continue;
        }
        let neckline =
            neckline_points.iter().map(|p| p.price).sum::<f64>() / neckline_points.len() as f64;

        let height = (head.price - neckline).abs();
        let target = if inverted {
            neckline + height
        } else {
            neckline - height
        };

        let outer_shoulder = if inverted {
            left.price.min(right.price)
        } else {
            left.price.max(right.price)
        };
        let prominence = ((head.price - outer_shoulder).abs() / head.price).abs();
        let neckline_spread = variation(&neckline_points.iter().map(|p| p.price).collect::<Vec<_>>());
        let consistency = (PRICE_TOLERANCE - neckline_spread).max(0.0);

        let confidence = clamp01(
            0.5 + (PRICE_TOLERANCE - shoulder_diff) * 10.0 + prominence * 5.0 + consistency * 5.0,
        );

        let kind = if inverted {
            PatternKind::InverseHeadAndShoulders
        } else {
            PatternKind::HeadAndShoulders
        };
        let mut key_points = vec![left, head, right];
        key_points.extend(neckline_points);

        out.push(ChartPattern {
            kind,
            confidence,
            start_time: left.timestamp,
            end_time: right.timestamp,
            key_points,
            description: format!(
                "{} with head at {:.4} and neckline near {:.4}",
                if inverted {
                    "Inverse head and shoulders"
                } else {
                    "Head and shoulders"
                },
                head.price,
                neckline
            ),
            target: Some(target),
            stop_loss: Some(head.price),
        });
    }
    out
}

/// Double and triple tops over peaks, or bottoms over troughs when
/// `bottoms` is set.
fn detect_tops_and_bottoms(
    extremes: &[PivotPoint],
    opposites: &[PivotPoint],
    bottoms: bool,
) -> Vec<ChartPattern> {
    let mut out = Vec::new();
    let mut triple_spans: Vec<(usize, usize)> = Vec::new();

    // Triples first; the pairs they contain are not re-reported as doubles.
    for w in extremes.windows(3) {
        let prices = [w[0].price, w[1].price, w[2].price];
        if variation(&prices) > PRICE_TOLERANCE {
            continue;
        }
        let between: Vec<&PivotPoint> = opposites
            .iter()
            .filter(|p| p.index > w[0].index && p.index < w[2].index)
            .collect();
        if between.len() < 2 {
            continue;
        }
        if let Some(p) = top_bottom_pattern(w, &between, bottoms, true) {
            triple_spans.push((w[0].index, w[2].index));
            out.push(p);
        }
    }

    for w in extremes.windows(2) {
        if triple_spans
            .iter()
            .any(|&(lo, hi)| w[0].index >= lo && w[1].index <= hi)
        {
            continue;
        }
        if relative_diff(w[0].price, w[1].price) > PRICE_TOLERANCE {
            continue;
        }
        let between: Vec<&PivotPoint> = opposites
            .iter()
            .filter(|p| p.index > w[0].index && p.index < w[1].index)
            .collect();
        if between.is_empty() {
            continue;
        }
        if let Some(p) = top_bottom_pattern(w, &between, bottoms, false) {
            out.push(p);
        }
    }
    out
}

fn top_bottom_pattern(
    extremes: &[PivotPoint],
    between: &[&PivotPoint],
    bottoms: bool,
    triple: bool,
) -> Option<ChartPattern> {
    let prices: Vec<f64> = extremes.iter().map(|p| p.price).collect();
    let mean_extreme = prices.iter().sum::<f64>() / prices.len() as f64;

    // Breakout reference: the most extreme intermediate pivot.
    let breakout = if bottoms {
        between.iter().map(|p| p.price).fold(f64::NEG_INFINITY, f64::max)
    } else {
        between.iter().map(|p| p.price).fold(f64::INFINITY, f64::min)
    };
    let height = (mean_extreme - breakout).abs();
    if height == 0.0 {
        return None;
    }

    let target = if bottoms {
        breakout + height
    } else {
        breakout - height
    };
    let stop = if bottoms {
        prices.iter().copied().fold(f64::INFINITY, f64::min)
    } else {
        prices.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    };

    let variance = variation(&prices);
    let depth = height / mean_extreme;
    let confidence = clamp01(0.5 + (PRICE_TOLERANCE - variance) * 15.0 + depth * 5.0);

    let kind = match (bottoms, triple) {
        (false, false) => PatternKind::DoubleTop,
        (false, true) => PatternKind::TripleTop,
        (true, false) => PatternKind::DoubleBottom,
        (true, true) => PatternKind::TripleBottom,
    };

    let mut key_points: Vec<PivotPoint> = extremes.to_vec();
    key_points.extend(between.iter().copied().copied());

    Some(ChartPattern {
        kind,
        confidence,
        start_time: extremes[0].timestamp,
        end_time: extremes[extremes.len() - 1].timestamp,
        key_points,
        description: format!(
            "{} at {:.4} with breakout line near {:.4}",
            kind.label().replace('_', " "),
            mean_extreme,
            breakout
        ),
        target: Some(target),
        stop_loss: Some(stop),
    })
}

// ---------------------------------------------------------------------------
// Continuation structures
// ---------------------------------------------------------------------------

/// At most one triangle over the most recent pivots: ascending (flat top,
/// rising lows), descending (flat bottom, falling highs) or symmetrical
/// (converging with ≥30% range compression).
fn detect_triangle(
    candles: &[Candle],
    peaks: &[PivotPoint],
    troughs: &[PivotPoint],
) -> Option<ChartPattern> {
    if peaks.len() < 2 || troughs.len() < 2 {
        return None;
    }
    let ps = recent(peaks, 4);
    let ts = recent(troughs, 4);
    let peak_prices: Vec<f64> = ps.iter().map(|p| p.price).collect();
    let trough_prices: Vec<f64> = ts.iter().map(|p| p.price).collect();

    let peaks_flat = variation(&peak_prices) <= PRICE_TOLERANCE;
    let troughs_flat = variation(&trough_prices) <= PRICE_TOLERANCE;
    let troughs_rising = strictly_increasing(&trough_prices);
    let peaks_falling = strictly_decreasing(&peak_prices);

    let start = ps[0].timestamp.min(ts[0].timestamp);
    let end = ps[ps.len() - 1]
        .timestamp
        .max(ts[ts.len() - 1].timestamp);
    let key_points: Vec<PivotPoint> = ps.iter().chain(ts.iter()).copied().collect();

    if peaks_flat && troughs_rising && !troughs_flat {
        let flat = mean(&peak_prices);
        return Some(ChartPattern {
            kind: PatternKind::AscendingTriangle,
            confidence: 0.7,
            start_time: start,
            end_time: end,
            key_points,
            description: format!(
                "Ascending triangle against resistance at {flat:.4} with rising lows"
            ),
            target: Some(flat * 1.05),
            stop_loss: Some(trough_prices[trough_prices.len() - 1]),
        });
    }

    if troughs_flat && peaks_falling && !peaks_flat {
        let flat = mean(&trough_prices);
        return Some(ChartPattern {
            kind: PatternKind::DescendingTriangle,
            confidence: 0.7,
            start_time: start,
            end_time: end,
            key_points,
            description: format!(
                "Descending triangle against support at {flat:.4} with falling highs"
            ),
            target: Some(flat * 0.95),
            stop_loss: Some(peak_prices[peak_prices.len() - 1]),
        });
    }

    if peaks_falling && troughs_rising {
        let initial_range = peak_prices[0] - trough_prices[0];
        let final_range =
            peak_prices[peak_prices.len() - 1] - trough_prices[trough_prices.len() - 1];
        if initial_range > 0.0 && final_range > 0.0 && 1.0 - final_range / initial_range >= 0.3 {
            let last_close = candles[candles.len() - 1].close;
            let midpoint = (peak_prices[0] + trough_prices[0]) / 2.0;
            let target = if last_close >= midpoint {
                last_close + 0.5 * initial_range
            } else {
                last_close - 0.5 * initial_range
            };
            return Some(ChartPattern {
                kind: PatternKind::SymmetricalTriangle,
                confidence: 0.65,
                start_time: start,
                end_time: end,
                key_points,
                description: format!(
                    "Symmetrical triangle compressing from a {initial_range:.4} range"
                ),
                target: Some(target),
                stop_loss: None,
            });
        }
    }
    None
}

/// Rising or falling wedge: both pivot sequences trend the same way while
/// the peak-to-trough range narrows.
fn detect_wedge(peaks: &[PivotPoint], troughs: &[PivotPoint]) -> Option<ChartPattern> {
    if peaks.len() < 2 || troughs.len() < 2 {
        return None;
    }
    let ps = recent(peaks, 4);
    let ts = recent(troughs, 4);
    let peak_prices: Vec<f64> = ps.iter().map(|p| p.price).collect();
    let trough_prices: Vec<f64> = ts.iter().map(|p| p.price).collect();

    let initial_range = peak_prices[0] - trough_prices[0];
    let final_range = peak_prices[peak_prices.len() - 1] - trough_prices[trough_prices.len() - 1];
    if initial_range <= 0.0 || final_range <= 0.0 || final_range >= initial_range {
        return None;
    }

    let kind = if strictly_increasing(&peak_prices) && strictly_increasing(&trough_prices) {
        PatternKind::RisingWedge
    } else if strictly_decreasing(&peak_prices) && strictly_decreasing(&trough_prices) {
        PatternKind::FallingWedge
    } else {
        return None;
    };

    Some(ChartPattern {
        kind,
        confidence: 0.6,
        start_time: ps[0].timestamp.min(ts[0].timestamp),
        end_time: ps[ps.len() - 1].timestamp.max(ts[ts.len() - 1].timestamp),
        key_points: ps.iter().chain(ts.iter()).copied().collect(),
        description: format!(
            "{} narrowing from a {initial_range:.4} to a {final_range:.4} range",
            kind.label().replace('_', " ")
        ),
        target: None,
        stop_loss: None,
    })
}

/// Rectangle: at least three peaks and three troughs, each sequence flat
/// within tolerance.
fn detect_rectangle(peaks: &[PivotPoint], troughs: &[PivotPoint]) -> Option<ChartPattern> {
    if peaks.len() < 3 || troughs.len() < 3 {
        return None;
    }
    let ps = recent(peaks, 4);
    let ts = recent(troughs, 4);
    let peak_prices: Vec<f64> = ps.iter().map(|p| p.price).collect();
    let trough_prices: Vec<f64> = ts.iter().map(|p| p.price).collect();

    if variation(&peak_prices) > PRICE_TOLERANCE || variation(&trough_prices) > PRICE_TOLERANCE {
        return None;
    }
    let resistance = mean(&peak_prices);
    let support = mean(&trough_prices);
    if resistance <= support {
        return None;
    }

    Some(ChartPattern {
        kind: PatternKind::Rectangle,
        confidence: 0.65,
        start_time: ps[0].timestamp.min(ts[0].timestamp),
        end_time: ps[ps.len() - 1].timestamp.max(ts[ts.len() - 1].timestamp),
        key_points: ps.iter().chain(ts.iter()).copied().collect(),
        description: format!(
            "Rectangle between support {support:.4} and resistance {resistance:.4}"
        ),
        target: Some(resistance + (resistance - support)),
        stop_loss: Some(support),
    })
}

// ---------------------------------------------------------------------------
// Candlestick patterns
// ---------------------------------------------------------------------------

/// Scan every bar; the widest applicable pattern wins per bar
/// (three-bar → two-bar → single).
fn detect_candlesticks(candles: &[Candle]) -> Vec<ChartPattern> {
    let mut out = Vec::new();
    for i in 0..candles.len() {
        let found = star_pattern(candles, i)
            .or_else(|| engulfing_pattern(candles, i))
            .or_else(|| single_candle_pattern(candles, i));
        if let Some(p) = found {
            out.push(p);
        }
    }
    out
}

fn star_pattern(candles: &[Candle], i: usize) -> Option<ChartPattern> {
    if i < 2 {
        return None;
    }
    let (first, star, third) = (&candles[i - 2], &candles[i - 1], &candles[i]);
    if first.body() == 0.0 || star.body() > 0.3 * first.body() {
        return None;
    }

    let kind = if first.is_bearish() && third.is_bullish() && third.close > first.body_midpoint() {
        PatternKind::MorningStar
    } else if first.is_bullish() && third.is_bearish() && third.close < first.body_midpoint() {
        PatternKind::EveningStar
    } else {
        return None;
    };

    let key = if kind == PatternKind::MorningStar {
        PivotPoint {
            timestamp: star.timestamp,
            price: star.low,
            kind: PointKind::Trough,
            index: i - 1,
        }
    } else {
        PivotPoint {
            timestamp: star.timestamp,
            price: star.high,
            kind: PointKind::Peak,
            index: i - 1,
        }
    };

    Some(ChartPattern {
        kind,
        confidence: 0.8,
        start_time: first.timestamp,
        end_time: third.timestamp,
        key_points: vec![key],
        description: format!(
            "{} completing at {:.4}",
            kind.label().replace('_', " "),
            third.close
        ),
        target: None,
        stop_loss: None,
    })
}

fn engulfing_pattern(candles: &[Candle], i: usize) -> Option<ChartPattern> {
    if i < 1 {
        return None;
    }
    let (prev, cur) = (&candles[i - 1], &candles[i]);

    let kind = if prev.is_bearish()
        && cur.is_bullish()
        && cur.open < prev.close
        && cur.close > prev.open
    {
        PatternKind::BullishEngulfing
    } else if prev.is_bullish()
        && cur.is_bearish()
        && cur.open > prev.close
        && cur.close < prev.open
    {
        PatternKind::BearishEngulfing
    } else {
        return None;
    };

    let key = if kind == PatternKind::BullishEngulfing {
        PivotPoint {
            timestamp: cur.timestamp,
            price: cur.low,
            kind: PointKind::Trough,
            index: i,
        }
    } else {
        PivotPoint {
            timestamp: cur.timestamp,
            price: cur.high,
            kind: PointKind::Peak,
            index: i,
        }
    };

    Some(ChartPattern {
        kind,
        confidence: 0.7,
        start_time: prev.timestamp,
        end_time: cur.timestamp,
        key_points: vec![key],
        description: format!(
            "{} engulfing the prior {:.4}-{:.4} body",
            kind.label().replace('_', " "),
            prev.open.min(prev.close),
            prev.open.max(prev.close)
        ),
        target: None,
        stop_loss: None,
    })
}

fn single_candle_pattern(candles: &[Candle], i: usize) -> Option<ChartPattern> {
    let c = &candles[i];
    let body = c.body();

    let (kind, key_price, key_kind) = if c.range() > 0.0 && c.is_doji() {
        (PatternKind::Doji, c.close, PointKind::Breakout)
    } else if body > 0.0 && c.lower_shadow() >= 2.0 * body && c.upper_shadow() <= 0.1 * body {
        (PatternKind::Hammer, c.low, PointKind::Trough)
    } else if body > 0.0 && c.upper_shadow() >= 2.0 * body && c.lower_shadow() <= 0.1 * body {
        (PatternKind::ShootingStar, c.high, PointKind::Peak)
    } else {
        return None;
    };

    let confidence = match kind {
        PatternKind::Doji => 0.5,
        _ => 0.6,
    };

    Some(ChartPattern {
        kind,
        confidence,
        start_time: c.timestamp,
        end_time: c.timestamp,
        key_points: vec![PivotPoint {
            timestamp: c.timestamp,
            price: key_price,
            kind: key_kind,
            index: i,
        }],
        description: format!("{} at {:.4}", kind.label().replace('_', " "), c.close),
        target: None,
        stop_loss: None,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn recent(pivots: &[PivotPoint], n: usize) -> &[PivotPoint] {
    &pivots[pivots.len().saturating_sub(n)..]
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Relative difference of two prices against their mean.
fn relative_diff(a: f64, b: f64) -> f64 {
    let m = (a + b) / 2.0;
    if m == 0.0 {
        return 0.0;
    }
    (a - b).abs() / m.abs()
}

/// Peak-to-peak spread of a price set relative to its mean.
fn variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    if m == 0.0 {
        return 0.0;
    }
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    (max - min) / m.abs()
}

fn strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[1] > w[0])
}

fn strictly_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[1] < w[0])
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrendDirection;
    use chrono::{Duration, TimeZone, Utc};

    /// Bars driven by a close series: tiny bullish body, high/low tracking
    /// the close so pivot geometry follows the closes exactly.
    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: start + Duration::days(i as i64),
                open: close - 0.4,
                high: close + 0.5,
                low: close - 0.9,
                close,
                volume: 1_000.0,
            })
            .collect()
    }

    fn bar(i: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Candle {
            timestamp: start + Duration::days(i),
            open,
            high,
            low,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn pivots_need_strict_extremes() {
        let candles = candles_from_closes(&[100.0, 105.0, 102.0, 104.0, 101.0, 103.0]);
        let pivots = find_pivots(&candles);
        let peaks: Vec<usize> = pivots
            .iter()
            .filter(|p| p.kind == PointKind::Peak)
            .map(|p| p.index)
            .collect();
        let troughs: Vec<usize> = pivots
            .iter()
            .filter(|p| p.kind == PointKind::Trough)
            .map(|p| p.index)
            .collect();
        assert_eq!(peaks, vec![1, 3]);
        assert_eq!(troughs, vec![2, 4]);
    }

    #[test]
    fn short_series_detects_nothing() {
        let candles = candles_from_closes(&[100.0, 105.0, 102.0, 104.0, 101.0]);
        assert!(detect_patterns(&candles).is_empty());
    }

    #[test]
    fn head_and_shoulders_scenario() {
        // E2: symmetric head-and-shoulders close sequence.
        let closes = [
            100.0, 105.0, 110.0, 108.0, 105.0, 110.0, 115.0, 120.0, 118.0, 115.0, 110.0, 108.0,
            112.0, 110.0, 108.0, 105.0, 102.0, 100.0, 98.0, 95.0,
        ];
        let candles = candles_from_closes(&closes);
        let patterns = detect_patterns(&candles);

        let hs = patterns
            .iter()
            .find(|p| p.kind == PatternKind::HeadAndShoulders)
            .expect("head and shoulders must be detected");

        assert!(hs.confidence >= 0.5);
        assert!(hs.confidence <= 1.0);
        let target = hs.target.unwrap();
        // Neckline sits between the intermediate troughs; target is below it.
        let neckline_points: Vec<f64> = hs.key_points[3..].iter().map(|p| p.price).collect();
        let neckline = neckline_points.iter().sum::<f64>() / neckline_points.len() as f64;
        assert!(target < neckline, "target {target} must lie below the neckline {neckline}");
        assert_eq!(hs.stop_loss, Some(hs.key_points[1].price));
        assert_eq!(hs.kind.bias(), TrendDirection::Bearish);
    }

    #[test]
    fn all_confidences_stay_in_unit_interval() {
        let closes = [
            100.0, 105.0, 110.0, 108.0, 105.0, 110.0, 115.0, 120.0, 118.0, 115.0, 110.0, 108.0,
            112.0, 110.0, 108.0, 105.0, 102.0, 100.0, 98.0, 95.0,
        ];
        for p in detect_patterns(&candles_from_closes(&closes)) {
            assert!((0.0..=1.0).contains(&p.confidence), "{:?}", p.kind);
        }
    }

    #[test]
    fn double_bottom_with_intermediate_peak() {
        let closes = [
            110.0, 105.0, 100.0, 104.0, 108.0, 104.0, 100.5, 104.0, 109.0, 111.0,
        ];
        let candles = candles_from_closes(&closes);
        let patterns = detect_patterns(&candles);
        let db = patterns
            .iter()
            .find(|p| p.kind == PatternKind::DoubleBottom)
            .expect("double bottom must be detected");
        assert!(db.target.unwrap() > db.key_points[0].price);
        assert!(db.confidence >= 0.5);
    }

    #[test]
    fn rectangle_breakout_target() {
        // E6: peaks ~[101, 100.5, 101.2], troughs ~[90, 90.3, 89.8].
        let candles = vec![
            bar(0, 95.0, 96.0, 94.0, 95.0),
            bar(1, 95.0, 101.0, 95.0, 100.0),
            bar(2, 95.0, 96.0, 90.0, 91.0),
            bar(3, 95.5, 100.5, 95.0, 100.0),
            bar(4, 95.0, 96.0, 90.3, 91.0),
            bar(5, 95.2, 101.2, 95.0, 100.8),
            bar(6, 95.0, 96.0, 89.8, 90.5),
            bar(7, 94.5, 95.0, 94.0, 94.8),
            bar(8, 94.5, 95.0, 94.0, 94.8),
            bar(9, 94.5, 95.0, 94.0, 94.8),
        ];
        let patterns = detect_patterns(&candles);
        let rect = patterns
            .iter()
            .find(|p| p.kind == PatternKind::Rectangle)
            .expect("rectangle must be detected");

        let resistance = (101.0 + 100.5 + 101.2) / 3.0;
        let support = (90.0 + 90.3 + 89.8) / 3.0;
        let expected = resistance + (resistance - support);
        let target = rect.target.unwrap();
        assert!(
            (target - expected).abs() < 1e-9,
            "target {target} vs expected {expected}"
        );
        assert!((110.0..116.0).contains(&target));
        assert_eq!(rect.confidence, 0.65);
    }

    #[test]
    fn bullish_engulfing_pair() {
        // E5: bearish 110→100 followed by bullish 99→111.
        let mut candles = candles_from_closes(&[
            104.0, 105.0, 106.0, 105.5, 106.5, 107.0, 106.0, 107.5,
        ]);
        candles.push(bar(8, 110.0, 110.5, 99.5, 100.0));
        candles.push(bar(9, 99.0, 111.5, 98.5, 111.0));

        let patterns = detect_patterns(&candles);
        let eng = patterns
            .iter()
            .find(|p| p.kind == PatternKind::BullishEngulfing)
            .expect("bullish engulfing must be detected");
        assert_eq!(eng.confidence, 0.7);
        assert!(eng.kind.is_bullish());
        assert!(eng.kind.is_reversal());
    }

    #[test]
    fn hammer_and_shooting_star_shapes() {
        // body 2, lower shadow 4, upper shadow 0.1 → hammer (not a doji)
        let hammer = bar(0, 100.0, 102.1, 96.0, 102.0);
        // body 2, upper shadow 4, lower shadow 0.1 → shooting star
        let star = bar(1, 102.0, 106.0, 99.9, 100.0);
        assert_eq!(
            single_candle_pattern(&[hammer], 0).unwrap().kind,
            PatternKind::Hammer
        );
        assert_eq!(
            single_candle_pattern(&[star, star], 1).unwrap().kind,
            PatternKind::ShootingStar
        );
    }

    #[test]
    fn doji_takes_precedence_over_shapes() {
        // body 0.05, range 10 → doji even with a long lower shadow
        let c = bar(0, 100.0, 100.5, 90.5, 100.05);
        assert_eq!(
            single_candle_pattern(&[c], 0).unwrap().kind,
            PatternKind::Doji
        );
    }

    #[test]
    fn flat_bars_produce_no_patterns() {
        // E3: zero-range bars carry no pivots and no candlestick signals.
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles: Vec<Candle> = (0..30)
            .map(|i| Candle {
                timestamp: start + Duration::days(i),
                open: 100.0,
                high: 100.0,
                low: 100.0,
                close: 100.0,
                volume: 1_000.0,
            })
            .collect();
        assert!(find_pivots(&candles).is_empty());
        assert!(detect_patterns(&candles).is_empty());
    }

    #[test]
    fn morning_star_reversal() {
        let mut candles = candles_from_closes(&[
            110.0, 109.0, 108.0, 107.0, 106.0, 105.0, 104.0, 103.0,
        ]);
        // bearish wide bar, tiny star, bullish close above the first midpoint
        candles.push(bar(8, 103.0, 103.5, 97.5, 98.0)); // body 5
        candles.push(bar(9, 98.0, 98.6, 97.2, 98.4)); // body 0.4
        candles.push(bar(10, 98.5, 105.0, 98.0, 104.0)); // closes above 100.5

        let patterns = detect_patterns(&candles);
        let star = patterns
            .iter()
            .find(|p| p.kind == PatternKind::MorningStar)
            .expect("morning star must be detected");
        assert_eq!(star.confidence, 0.8);
        assert!(star.kind.is_bullish());
    }

    #[test]
    fn ascending_triangle_flat_top_rising_lows() {
        let candles = vec![
            bar(0, 95.5, 96.0, 95.0, 95.8),
            bar(1, 96.0, 100.0, 95.5, 99.0),
            bar(2, 96.0, 97.0, 92.0, 93.0),
            bar(3, 96.5, 100.1, 96.0, 99.5),
            bar(4, 96.0, 97.0, 94.5, 95.0),
            bar(5, 97.0, 100.05, 96.5, 99.6),
            bar(6, 96.8, 97.0, 96.0, 96.5),
            bar(7, 97.0, 99.9, 96.2, 99.0),
            bar(8, 97.5, 98.0, 96.5, 97.8),
            bar(9, 97.3, 97.5, 96.6, 97.0),
        ];
        let patterns = detect_patterns(&candles);
        let tri = patterns
            .iter()
            .find(|p| p.kind == PatternKind::AscendingTriangle)
            .expect("ascending triangle must be detected");
        assert_eq!(tri.confidence, 0.7);
        // 5% above the flat resistance line
        let flat = (100.0 + 100.1 + 100.05 + 99.9) / 4.0;
        assert!((tri.target.unwrap() - flat * 1.05).abs() < 1e-9);
    }

    #[test]
    fn sorted_by_descending_confidence() {
        let closes = [
            100.0, 105.0, 110.0, 108.0, 105.0, 110.0, 115.0, 120.0, 118.0, 115.0, 110.0, 108.0,
            112.0, 110.0, 108.0, 105.0, 102.0, 100.0, 98.0, 95.0,
        ];
        let patterns = detect_patterns(&candles_from_closes(&closes));
        for w in patterns.windows(2) {
            assert!(w[0].confidence >= w[1].confidence);
        }
    }
}
