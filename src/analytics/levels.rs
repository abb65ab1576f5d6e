//! Support/resistance analyzer. Four methods contribute levels — pivot
//! clustering, a 50-bin volume profile over typical prices, Fibonacci
//! retracements of the series range, and a psychological round-number grid —
//! which are then consolidated by price proximity. Sloped trend lines are
//! fitted through pivot pairs separately.

use chrono::{DateTime, Utc};

use crate::types::{Candle, Level, LevelKind, PivotPoint, PointKind, TrendLine};

use super::patterns::find_pivots;

/// Minimum bars before level analysis is attempted.
const MIN_CANDLES: usize = 20;

/// Relative price tolerance for grouping, touch testing and consolidation.
const TOLERANCE: f64 = 0.02;

const VOLUME_BINS: usize = 50;
const TOP_BINS: usize = 10;

/// A level is "active" within this band around the current price.
const ACTIVE_BAND: f64 = 0.10;

const FIB_RATIOS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

const FIBONACCI_BASE_STRENGTH: f64 = 0.5;
const PSYCHOLOGICAL_BASE_STRENGTH: f64 = 0.4;

/// Consolidated horizontal levels plus fitted trend lines.
#[derive(Debug, Clone, Default)]
pub struct LevelAnalysis {
    pub levels: Vec<Level>,
    pub trend_lines: Vec<TrendLine>,
}

pub fn analyze(candles: &[Candle], current_price: f64) -> LevelAnalysis {
    if candles.len() < MIN_CANDLES {
        return LevelAnalysis::default();
    }
    let now = candles[candles.len() - 1].timestamp;
    let pivots = find_pivots(candles);

    let mut levels = Vec::new();
    levels.extend(pivot_levels(&pivots, current_price, now));
    levels.extend(volume_profile_levels(candles, current_price));
    levels.extend(fibonacci_levels(candles, current_price));
    levels.extend(psychological_levels(candles, current_price));

    let mean_close = candles.iter().map(|c| c.close).sum::<f64>() / candles.len() as f64;

    LevelAnalysis {
        levels: consolidate(levels, current_price),
        trend_lines: trend_lines(&pivots, mean_close),
    }
}

// ---------------------------------------------------------------------------
// Method 1: pivot clustering
// ---------------------------------------------------------------------------

fn pivot_levels(
    pivots: &[PivotPoint],
    current_price: f64,
    now: DateTime<Utc>,
) -> Vec<Level> {
    let mut sorted: Vec<&PivotPoint> = pivots.iter().collect();
    sorted.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));

    let mut out = Vec::new();
    let mut group: Vec<&PivotPoint> = Vec::new();

    let flush = |group: &[&PivotPoint], out: &mut Vec<Level>| {
        if group.len() < 2 {
            return;
        }
        let price = group.iter().map(|p| p.price).sum::<f64>() / group.len() as f64;
        let touches = group.len() as u32;
        let last_touch = group.iter().map(|p| p.timestamp).max().unwrap_or(now);
        out.push(Level {
            price,
            strength: touch_strength(touches, last_touch, now),
            kind: LevelKind::Pivot,
            touches,
            last_touch,
            is_active: is_active(price, current_price),
        });
    };

    for pivot in sorted {
        let group_mean = if group.is_empty() {
            pivot.price
        } else {
            group.iter().map(|p| p.price).sum::<f64>() / group.len() as f64
        };
        if group.is_empty() || within_tolerance(pivot.price, group_mean) {
            group.push(pivot);
        } else {
            flush(&group, &mut out);
            group = vec![pivot];
        }
    }
    flush(&group, &mut out);
    out
}

// ---------------------------------------------------------------------------
// Method 2: volume profile
// ---------------------------------------------------------------------------

fn volume_profile_levels(candles: &[Candle], current_price: f64) -> Vec<Level> {
    let min_low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let max_high = candles
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);
    let span = max_high - min_low;
    if span <= 0.0 {
        return vec![];
    }
    let bin_width = span / VOLUME_BINS as f64;
    let total_volume: f64 = candles.iter().map(|c| c.volume).sum();
    if total_volume <= 0.0 {
        return vec![];
    }

    #[derive(Clone, Copy, Default)]
    struct Bin {
        volume: f64,
        touches: u32,
        last_touch: Option<DateTime<Utc>>,
    }
    let mut bins = [Bin::default(); VOLUME_BINS];

    for c in candles {
        let idx = (((c.typical_price() - min_low) / bin_width) as usize).min(VOLUME_BINS - 1);
        bins[idx].volume += c.volume;
        bins[idx].touches += 1;
        bins[idx].last_touch = Some(match bins[idx].last_touch {
            Some(t) => t.max(c.timestamp),
            None => c.timestamp,
        });
    }

    let mut ranked: Vec<(usize, Bin)> = bins.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| {
        b.1.volume
            .partial_cmp(&a.1.volume)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    ranked
        .into_iter()
        .take(TOP_BINS)
        .filter(|(_, bin)| bin.touches >= 2)
        .filter_map(|(idx, bin)| {
            let price = min_low + (idx as f64 + 0.5) * bin_width;
            let last_touch = bin.last_touch?;
            Some(Level {
                price,
                strength: (10.0 * bin.volume / total_volume).min(1.0),
                kind: relational_kind(price, current_price),
                touches: bin.touches,
                last_touch,
                is_active: is_active(price, current_price),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Method 3: Fibonacci retracements
// ---------------------------------------------------------------------------

fn fibonacci_levels(candles: &[Candle], current_price: f64) -> Vec<Level> {
    let min_low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let max_high = candles
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);
    let span = max_high - min_low;
    if span <= 0.0 {
        return vec![];
    }

    FIB_RATIOS
        .iter()
        .filter_map(|ratio| {
            let price = max_high - ratio * span;
            let (touches, last_touch) = touches_at(candles, price);
            let last_touch = last_touch?;
            if touches == 0 {
                return None;
            }
            Some(Level {
                price,
                strength: (FIBONACCI_BASE_STRENGTH + touch_bonus(touches)).clamp(0.0, 1.0),
                kind: LevelKind::Fibonacci,
                touches,
                last_touch,
                is_active: is_active(price, current_price),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Method 4: psychological round numbers
// ---------------------------------------------------------------------------

/// Grid step by price magnitude.
fn grid_step(price: f64) -> f64 {
    if price < 1.0 {
        0.1
    } else if price < 10.0 {
        1.0
    } else if price < 100.0 {
        10.0
    } else if price < 1_000.0 {
        100.0
    } else if price < 10_000.0 {
        1_000.0
    } else {
        10_000.0
    }
}

fn psychological_levels(candles: &[Candle], current_price: f64) -> Vec<Level> {
    let min_low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let max_high = candles
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);
    let step = grid_step(current_price);

    let mut out = Vec::new();
    let mut price = (min_low / step).ceil() * step;
    while price <= max_high {
        let (touches, last_touch) = touches_at(candles, price);
        if touches >= 1 {
            if let Some(last_touch) = last_touch {
                out.push(Level {
                    price,
                    strength: (PSYCHOLOGICAL_BASE_STRENGTH + touch_bonus(touches)).clamp(0.0, 1.0),
                    kind: relational_kind(price, current_price),
                    touches,
                    last_touch,
                    is_active: is_active(price, current_price),
                });
            }
        }
        price += step;
    }
    out
}

// ---------------------------------------------------------------------------
// Consolidation
// ---------------------------------------------------------------------------

/// Merge levels whose prices sit within tolerance of their group mean.
/// The merged level keeps the summed touches, the most recent touch, the
/// strongest member's kind, and a strength bumped by the merge count.
fn consolidate(mut levels: Vec<Level>, current_price: f64) -> Vec<Level> {
    if levels.is_empty() {
        return levels;
    }
    levels.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));

    let mut out = Vec::new();
    let mut group: Vec<Level> = Vec::new();

    let flush = |group: &mut Vec<Level>, out: &mut Vec<Level>| {
        if group.is_empty() {
            return;
        }
        if group.len() == 1 {
            out.push(group.pop().unwrap());
            return;
        }
        let price = group.iter().map(|l| l.price).sum::<f64>() / group.len() as f64;
        let strongest = group
            .iter()
            .max_by(|a, b| {
                a.strength
                    .partial_cmp(&b.strength)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .expect("group is non-empty");
        let max_strength = strongest.strength;
        let kind = strongest.kind;
        let touches = group.iter().map(|l| l.touches).sum();
        let last_touch = group
            .iter()
            .map(|l| l.last_touch)
            .max()
            .expect("group is non-empty");
        let any_active = group.iter().any(|l| l.is_active);
        out.push(Level {
            price,
            strength: (max_strength + 0.1 * (group.len() - 1) as f64).clamp(0.0, 1.0),
            kind,
            touches,
            last_touch,
            is_active: any_active || is_active(price, current_price),
        });
        group.clear();
    };

    for level in levels {
        let group_mean = if group.is_empty() {
            level.price
        } else {
            group.iter().map(|l| l.price).sum::<f64>() / group.len() as f64
        };
        if group.is_empty() || within_tolerance(level.price, group_mean) {
            group.push(level);
        } else {
            flush(&mut group, &mut out);
            group.push(level);
        }
    }
    flush(&mut group, &mut out);
    out
}

// ---------------------------------------------------------------------------
// Trend lines
// ---------------------------------------------------------------------------

/// Fit lines through every same-kind pivot pair (x = bar index); accept a
/// line when at least three pivots of its kind sit within tolerance of it.
/// Near-duplicate lines keep only the best-supported instance.
pub fn trend_lines(pivots: &[PivotPoint], reference_price: f64) -> Vec<TrendLine> {
    let peaks: Vec<&PivotPoint> = pivots.iter().filter(|p| p.kind == PointKind::Peak).collect();
    let troughs: Vec<&PivotPoint> = pivots
        .iter()
        .filter(|p| p.kind == PointKind::Trough)
        .collect();

    let mut out = Vec::new();
    out.extend(lines_for(&peaks, LevelKind::Resistance, reference_price));
    out.extend(lines_for(&troughs, LevelKind::Support, reference_price));
    out
}

fn lines_for(points: &[&PivotPoint], kind: LevelKind, reference_price: f64) -> Vec<TrendLine> {
    let mut candidates = Vec::new();

    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            let (a, b) = (points[i], points[j]);
            if a.index == b.index {
                continue;
            }
            let slope = (b.price - a.price) / (b.index as f64 - a.index as f64);
            let intercept = a.price - slope * a.index as f64;

            let touches = points
                .iter()
                .filter(|p| {
                    let fitted = slope * p.index as f64 + intercept;
                    (p.price - fitted).abs() <= p.price.abs() * TOLERANCE
                })
                .count() as u32;
            if touches >= 3 {
                candidates.push(TrendLine {
                    slope,
                    intercept,
                    kind,
                    touches,
                });
            }
        }
    }

    candidates.sort_by(|a, b| b.touches.cmp(&a.touches));
    let tol = reference_price.abs() * TOLERANCE;
    let mut accepted: Vec<TrendLine> = Vec::new();
    for line in candidates {
        let duplicate = accepted.iter().any(|l| {
            (l.slope - line.slope).abs() <= tol && (l.intercept - line.intercept).abs() <= tol
        });
        if !duplicate {
            accepted.push(line);
        }
    }
    accepted
}

// ---------------------------------------------------------------------------
// Scoring helpers
// ---------------------------------------------------------------------------

/// Touch test: a bar touches `price` when its high or low is within
/// tolerance, or its (low, high) interval covers it.
fn touches_at(candles: &[Candle], price: f64) -> (u32, Option<DateTime<Utc>>) {
    let tol = price.abs() * TOLERANCE;
    let mut touches = 0;
    let mut last = None;
    for c in candles {
        let hit = (c.high - price).abs() <= tol
            || (c.low - price).abs() <= tol
            || (c.low <= price && c.high >= price);
        if hit {
            touches += 1;
            last = Some(match last {
                Some(t) if t > c.timestamp => t,
                _ => c.timestamp,
            });
        }
    }
    (touches, last)
}

fn touch_bonus(touches: u32) -> f64 {
    if touches >= 5 {
        0.2
    } else if touches >= 3 {
        0.1
    } else {
        0.0
    }
}

/// Strength for pivot-derived levels: base from touch count, recency bonus,
/// touch-count bonus, clamped to 1.
fn touch_strength(touches: u32, last_touch: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let base = (0.3 + 0.05 * f64::from(touches)).min(0.5);
    let days = (now - last_touch).num_days();
    let recency = if days <= 7 {
        0.3
    } else if days <= 30 {
        0.2
    } else if days <= 90 {
        0.1
    } else {
        0.0
    };
    (base + recency + touch_bonus(touches)).clamp(0.0, 1.0)
}

fn relational_kind(price: f64, current_price: f64) -> LevelKind {
    if price < current_price {
        LevelKind::Support
    } else {
        LevelKind::Resistance
    }
}

fn is_active(price: f64, current_price: f64) -> bool {
    (price - current_price).abs() <= ACTIVE_BAND * current_price.abs()
}

fn within_tolerance(price: f64, reference: f64) -> bool {
    (price - reference).abs() <= reference.abs() * TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bar(i: i64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Candle {
            timestamp: start + Duration::days(i),
            open: close,
            high,
            low,
            close,
            volume,
        }
    }

    /// A range-bound series bouncing between ~90 support and ~110 resistance.
    fn ranging_candles() -> Vec<Candle> {
        let mut out = Vec::new();
        let mut i = 0;
        for _ in 0..6 {
            out.push(bar(i, 110.0, 104.0, 108.0, 1_000.0));
            i += 1;
            out.push(bar(i, 108.0, 100.0, 102.0, 1_200.0));
            i += 1;
            out.push(bar(i, 102.0, 90.0, 92.0, 1_500.0));
            i += 1;
            out.push(bar(i, 104.0, 92.0, 103.0, 900.0));
            i += 1;
        }
        out
    }

    #[test]
    fn short_series_yields_nothing() {
        let candles: Vec<Candle> = (0..19).map(|i| bar(i, 101.0, 99.0, 100.0, 1_000.0)).collect();
        let analysis = analyze(&candles, 100.0);
        assert!(analysis.levels.is_empty());
        assert!(analysis.trend_lines.is_empty());
    }

    #[test]
    fn level_bounds_hold() {
        // Property: strength ∈ [0,1] and touches ≥ 1 for every reported level.
        let analysis = analyze(&ranging_candles(), 100.0);
        assert!(!analysis.levels.is_empty());
        for level in &analysis.levels {
            assert!((0.0..=1.0).contains(&level.strength), "strength {}", level.strength);
            assert!(level.touches >= 1);
        }
    }

    #[test]
    fn pivot_levels_require_two_touches() {
        let candles = ranging_candles();
        let pivots = find_pivots(&candles);
        let now = candles.last().unwrap().timestamp;
        for level in pivot_levels(&pivots, 100.0, now) {
            assert!(level.touches >= 2);
            assert_eq!(level.kind, LevelKind::Pivot);
        }
    }

    #[test]
    fn consolidation_is_monotone() {
        // Property: merging two levels within tolerance sums touches and
        // never weakens the result.
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let a = Level {
            price: 100.0,
            strength: 0.5,
            kind: LevelKind::Support,
            touches: 3,
            last_touch: t,
            is_active: true,
        };
        let b = Level {
            price: 101.0,
            strength: 0.7,
            kind: LevelKind::Pivot,
            touches: 2,
            last_touch: t + Duration::days(1),
            is_active: false,
        };
        let merged = consolidate(vec![a.clone(), b.clone()], 100.0);
        assert_eq!(merged.len(), 1);
        let m = &merged[0];
        assert_eq!(m.touches, 5);
        assert!(m.strength >= a.strength && m.strength >= b.strength);
        assert!((m.strength - 0.8).abs() < 1e-9);
        assert_eq!(m.price, 100.5);
        assert_eq!(m.last_touch, b.last_touch);
        assert_eq!(m.kind, LevelKind::Pivot, "strongest member's kind wins");
        assert!(m.is_active);
    }

    #[test]
    fn distant_levels_stay_separate() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mk = |price: f64| Level {
            price,
            strength: 0.5,
            kind: LevelKind::Support,
            touches: 2,
            last_touch: t,
            is_active: false,
        };
        let merged = consolidate(vec![mk(100.0), mk(120.0)], 110.0);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn grid_step_magnitudes() {
        assert_eq!(grid_step(0.5), 0.1);
        assert_eq!(grid_step(5.0), 1.0);
        assert_eq!(grid_step(50.0), 10.0);
        assert_eq!(grid_step(500.0), 100.0);
        assert_eq!(grid_step(5_000.0), 1_000.0);
        assert_eq!(grid_step(50_000.0), 10_000.0);
    }

    #[test]
    fn psychological_levels_sit_on_the_grid() {
        let levels = psychological_levels(&ranging_candles(), 100.0);
        assert!(!levels.is_empty());
        for level in &levels {
            assert_eq!(level.price % 10.0, 0.0, "price {} not on grid", level.price);
            assert!(level.touches >= 1);
        }
    }

    #[test]
    fn fibonacci_endpoint_levels_touch() {
        let levels = fibonacci_levels(&ranging_candles(), 100.0);
        // Range is [90, 110]; ratios 0 and 1 sit on the extremes, which the
        // series touches by construction.
        assert!(levels.iter().any(|l| (l.price - 110.0).abs() < 1e-9));
        assert!(levels.iter().any(|l| (l.price - 90.0).abs() < 1e-9));
        for level in &levels {
            assert_eq!(level.kind, LevelKind::Fibonacci);
            assert!(level.strength >= FIBONACCI_BASE_STRENGTH);
            assert!(level.strength <= 1.0);
        }
    }

    #[test]
    fn volume_profile_finds_the_heavy_zone() {
        let levels = volume_profile_levels(&ranging_candles(), 100.0);
        assert!(!levels.is_empty());
        // Bins come back ranked by accumulated volume; the 1_500-volume bars
        // have typical price (102+90+92)/3 ≈ 94.67 and must rank first.
        assert!(
            (levels[0].price - 94.67).abs() < 1.0,
            "heavy bin at {}",
            levels[0].price
        );
        assert!(levels.iter().all(|l| l.touches >= 2));
    }

    #[test]
    fn active_band_is_ten_percent() {
        assert!(is_active(95.0, 100.0));
        assert!(is_active(110.0, 100.0));
        assert!(!is_active(111.0, 100.0));
        assert!(!is_active(85.0, 100.0));
    }

    #[test]
    fn ascending_support_line_is_fitted() {
        // Troughs at (2, 90), (6, 92), (10, 94): colinear with slope 0.5.
        let mut candles: Vec<Candle> = Vec::new();
        for i in 0..24_i64 {
            let c = match i {
                2 => bar(i, 101.0, 90.0, 100.0, 1_000.0),
                6 => bar(i, 101.0, 92.0, 100.0, 1_000.0),
                10 => bar(i, 101.0, 94.0, 100.0, 1_000.0),
                _ => bar(i, 101.0, 99.0, 100.0, 1_000.0),
            };
            candles.push(c);
        }
        let pivots = find_pivots(&candles);
        let lines = trend_lines(&pivots, 100.0);
        let support = lines
            .iter()
            .find(|l| l.kind == LevelKind::Support && l.slope > 0.0)
            .expect("ascending support line expected");
        assert!(support.touches >= 3);
        assert!((support.slope - 0.5).abs() < 0.1);
    }

    #[test]
    fn recency_bonus_decays() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let recent = touch_strength(2, now - Duration::days(3), now);
        let month = touch_strength(2, now - Duration::days(20), now);
        let quarter = touch_strength(2, now - Duration::days(60), now);
        let stale = touch_strength(2, now - Duration::days(200), now);
        assert!(recent > month && month > quarter && quarter > stale);
        assert!((recent - 0.7).abs() < 1e-9); // 0.4 base + 0.3 recency
    }
}
