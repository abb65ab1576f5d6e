//! Rolling-window indicator engine.
//!
//! Every indicator emits one [`IndicatorValue`] per bar once its warm-up is
//! satisfied, in bar-index order. The formulas are deliberately the simple
//! rolling variants: RSI averages its gains and losses arithmetically (not
//! Wilder's recursive smoothing) and the MACD signal line is seeded with the
//! SMA of its first nine inputs. Division-by-zero guards are explicit:
//! RSI with zero average loss emits 100, a zero stochastic range emits 50,
//! a zero Williams range emits −50, and a zero Bollinger band width puts %B
//! at the 0.5 midpoint.

use std::collections::BTreeMap;

use crate::types::{Candle, IndicatorValue, TradingSignal, TrendDirection};

pub const DEFAULT_SMA_PERIOD: usize = 20;
pub const DEFAULT_EMA_PERIOD: usize = 20;
pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_STOCH_K: usize = 14;
pub const DEFAULT_STOCH_D: usize = 3;
pub const DEFAULT_MACD_FAST: usize = 12;
pub const DEFAULT_MACD_SLOW: usize = 26;
pub const DEFAULT_MACD_SIGNAL: usize = 9;
pub const DEFAULT_BOLLINGER_PERIOD: usize = 20;
pub const DEFAULT_BOLLINGER_K: f64 = 2.0;
pub const DEFAULT_WILLIAMS_PERIOD: usize = 14;

/// The indicators a tool call can request by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    Macd,
    Bollinger,
    Stochastic,
    WilliamsR,
    Obv,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 8] = [
        IndicatorKind::Sma,
        IndicatorKind::Ema,
        IndicatorKind::Rsi,
        IndicatorKind::Macd,
        IndicatorKind::Bollinger,
        IndicatorKind::Stochastic,
        IndicatorKind::WilliamsR,
        IndicatorKind::Obv,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sma" => Some(IndicatorKind::Sma),
            "ema" => Some(IndicatorKind::Ema),
            "rsi" => Some(IndicatorKind::Rsi),
            "macd" => Some(IndicatorKind::Macd),
            "bollinger" | "bb" | "bbands" => Some(IndicatorKind::Bollinger),
            "stochastic" | "stoch" => Some(IndicatorKind::Stochastic),
            "williams_r" | "williams" | "willr" => Some(IndicatorKind::WilliamsR),
            "obv" => Some(IndicatorKind::Obv),
            _ => None,
        }
    }

    /// Run this indicator with its default parameters.
    pub fn compute(self, candles: &[Candle]) -> Vec<IndicatorValue> {
        match self {
            IndicatorKind::Sma => sma(candles, DEFAULT_SMA_PERIOD),
            IndicatorKind::Ema => ema(candles, DEFAULT_EMA_PERIOD),
            IndicatorKind::Rsi => rsi(candles, DEFAULT_RSI_PERIOD),
            IndicatorKind::Macd => macd(
                candles,
                DEFAULT_MACD_FAST,
                DEFAULT_MACD_SLOW,
                DEFAULT_MACD_SIGNAL,
            ),
            IndicatorKind::Bollinger => {
                bollinger(candles, DEFAULT_BOLLINGER_PERIOD, DEFAULT_BOLLINGER_K)
            }
            IndicatorKind::Stochastic => stochastic(candles, DEFAULT_STOCH_K, DEFAULT_STOCH_D),
            IndicatorKind::WilliamsR => williams_r(candles, DEFAULT_WILLIAMS_PERIOD),
            IndicatorKind::Obv => obv(candles),
        }
    }
}

/// Latest emission of each requested indicator. Indicators still warming up
/// are omitted.
pub fn latest_suite(candles: &[Candle], kinds: &[IndicatorKind]) -> Vec<IndicatorValue> {
    kinds
        .iter()
        .filter_map(|kind| kind.compute(candles).pop())
        .collect()
}

// ---------------------------------------------------------------------------
// Moving averages
// ---------------------------------------------------------------------------

pub fn sma(candles: &[Candle], period: usize) -> Vec<IndicatorValue> {
    if period == 0 || candles.len() < period {
        return vec![];
    }
    let closes = closes_of(candles);
    let name = format!("SMA_{period}");
    let mut out = Vec::with_capacity(candles.len() - period + 1);
    let mut prev_sma = None;

    for i in (period - 1)..closes.len() {
        let window = &closes[i + 1 - period..=i];
        let value = window.iter().sum::<f64>() / period as f64;
        out.push(IndicatorValue {
            name: name.clone(),
            value,
            signal: trend_signal(closes[i], value, prev_sma),
            timestamp: candles[i].timestamp,
            parameters: params(&[("period", period as f64)]),
        });
        prev_sma = Some(value);
    }
    out
}

pub fn ema(candles: &[Candle], period: usize) -> Vec<IndicatorValue> {
    if period == 0 || candles.len() < period {
        return vec![];
    }
    let closes = closes_of(candles);
    let values = ema_values(&closes, period);
    let name = format!("EMA_{period}");
    let mut out = Vec::with_capacity(values.len());
    let mut prev_ema = None;

    for (j, &value) in values.iter().enumerate() {
        let i = j + period - 1;
        out.push(IndicatorValue {
            name: name.clone(),
            value,
            signal: trend_signal(closes[i], value, prev_ema),
            timestamp: candles[i].timestamp,
            parameters: params(&[("period", period as f64)]),
        });
        prev_ema = Some(value);
    }
    out
}

/// EMA series seeded by the SMA of the first `period` inputs. Output index 0
/// corresponds to input index `period - 1`.
fn ema_values(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return vec![];
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut current = values[..period].iter().sum::<f64>() / period as f64;
    out.push(current);
    for &v in &values[period..] {
        current = v * alpha + current * (1.0 - alpha);
        out.push(current);
    }
    out
}

// ---------------------------------------------------------------------------
// Oscillators
// ---------------------------------------------------------------------------

pub fn rsi(candles: &[Candle], period: usize) -> Vec<IndicatorValue> {
    if period == 0 || candles.len() <= period {
        return vec![];
    }
    let closes = closes_of(candles);
    let name = format!("RSI_{period}");
    let mut out = Vec::with_capacity(closes.len() - period);

    for i in period..closes.len() {
        let mut gains = 0.0;
        let mut losses = 0.0;
        for j in (i + 1 - period)..=i {
            let delta = closes[j] - closes[j - 1];
            if delta > 0.0 {
                gains += delta;
            } else {
                losses += -delta;
            }
        }
        let avg_gain = gains / period as f64;
        let avg_loss = losses / period as f64;
        let value = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };

        let signal = if value >= 70.0 {
            TradingSignal::Sell
        } else if value <= 30.0 {
            TradingSignal::Buy
        } else {
            TradingSignal::Hold
        };

        out.push(IndicatorValue {
            name: name.clone(),
            value,
            signal,
            timestamp: candles[i].timestamp,
            parameters: params(&[
                ("period", period as f64),
                ("avg_gain", avg_gain),
                ("avg_loss", avg_loss),
            ]),
        });
    }
    out
}

pub fn stochastic(candles: &[Candle], k_period: usize, d_period: usize) -> Vec<IndicatorValue> {
    if k_period == 0 || d_period == 0 || candles.len() < k_period + d_period - 1 {
        return vec![];
    }

    // %K per bar from k_period-1 onward
    let mut k_values = Vec::with_capacity(candles.len() - k_period + 1);
    for i in (k_period - 1)..candles.len() {
        let window = &candles[i + 1 - k_period..=i];
        let low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let high = window
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let k = if high == low {
            50.0
        } else {
            100.0 * (candles[i].close - low) / (high - low)
        };
        k_values.push(k);
    }

    let name = format!("STOCH_{k_period}_{d_period}");
    let mut out = Vec::with_capacity(k_values.len() - d_period + 1);
    let mut prev: Option<(f64, f64)> = None;

    for j in (d_period - 1)..k_values.len() {
        let i = j + k_period - 1;
        let k = k_values[j];
        let d = k_values[j + 1 - d_period..=j].iter().sum::<f64>() / d_period as f64;

        let signal = if k >= 80.0 && d >= 80.0 {
            TradingSignal::Sell
        } else if k <= 20.0 && d <= 20.0 {
            TradingSignal::Buy
        } else if let Some((pk, pd)) = prev {
            if pk <= pd && k > d && k < 80.0 {
                TradingSignal::Buy
            } else if pk >= pd && k < d && k > 20.0 {
                TradingSignal::Sell
            } else {
                TradingSignal::Hold
            }
        } else {
            TradingSignal::Hold
        };

        out.push(IndicatorValue {
            name: name.clone(),
            value: k,
            signal,
            timestamp: candles[i].timestamp,
            parameters: params(&[
                ("k_period", k_period as f64),
                ("d_period", d_period as f64),
                ("k", k),
                ("d", d),
            ]),
        });
        prev = Some((k, d));
    }
    out
}

pub fn williams_r(candles: &[Candle], period: usize) -> Vec<IndicatorValue> {
    if period == 0 || candles.len() < period {
        return vec![];
    }
    let name = format!("WILLR_{period}");
    let mut out = Vec::with_capacity(candles.len() - period + 1);

    for i in (period - 1)..candles.len() {
        let window = &candles[i + 1 - period..=i];
        let low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let high = window
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max);
        let value = if high == low {
            -50.0
        } else {
            -100.0 * (high - candles[i].close) / (high - low)
        };

        let signal = if value >= -20.0 {
            TradingSignal::Sell
        } else if value <= -80.0 {
            TradingSignal::Buy
        } else {
            TradingSignal::Hold
        };

        out.push(IndicatorValue {
            name: name.clone(),
            value,
            signal,
            timestamp: candles[i].timestamp,
            parameters: params(&[("period", period as f64)]),
        });
    }
    out
}

// ---------------------------------------------------------------------------
// MACD
// ---------------------------------------------------------------------------

pub fn macd(candles: &[Candle], fast: usize, slow: usize, signal_period: usize) -> Vec<IndicatorValue> {
    if fast == 0 || slow <= fast || signal_period == 0 {
        return vec![];
    }
    if candles.len() < slow + signal_period - 1 {
        return vec![];
    }
    let closes = closes_of(candles);
    let fast_ema = ema_values(&closes, fast); // index 0 ↔ bar fast-1
    let slow_ema = ema_values(&closes, slow); // index 0 ↔ bar slow-1

    // MACD line defined from bar slow-1 onward
    let macd_line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(j, &s)| fast_ema[j + slow - fast] - s)
        .collect();

    // Signal line: EMA over the MACD line, SMA-seeded
    let signal_line = ema_values(&macd_line, signal_period);

    let name = format!("MACD_{fast}_{slow}_{signal_period}");
    let mut out = Vec::with_capacity(signal_line.len());

    for (j, &sig) in signal_line.iter().enumerate() {
        let macd_idx = j + signal_period - 1;
        let bar = macd_idx + slow - 1;
        let m = macd_line[macd_idx];
        let histogram = m - sig;

        let verdict = if m > sig && histogram > 0.0 {
            TradingSignal::Buy
        } else if m < sig && histogram < 0.0 {
            TradingSignal::Sell
        } else {
            TradingSignal::Hold
        };

        out.push(IndicatorValue {
            name: name.clone(),
            value: m,
            signal: verdict,
            timestamp: candles[bar].timestamp,
            parameters: params(&[
                ("macd", m),
                ("signal", sig),
                ("histogram", histogram),
            ]),
        });
    }
    out
}

// ---------------------------------------------------------------------------
// Bollinger bands
// ---------------------------------------------------------------------------

pub fn bollinger(candles: &[Candle], period: usize, k: f64) -> Vec<IndicatorValue> {
    if period == 0 || candles.len() < period {
        return vec![];
    }
    let closes = closes_of(candles);
    let name = format!("BB_{period}");
    let mut out = Vec::with_capacity(closes.len() - period + 1);

    for i in (period - 1)..closes.len() {
        let window = &closes[i + 1 - period..=i];
        let middle = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|c| (c - middle).powi(2)).sum::<f64>() / period as f64;
        let sigma = variance.sqrt();
        let upper = middle + k * sigma;
        let lower = middle - k * sigma;
        let bandwidth = upper - lower;
        // %B is undefined on a zero-width band; the midpoint keeps it neutral.
        let percent_b = if bandwidth == 0.0 {
            0.5
        } else {
            (closes[i] - lower) / bandwidth
        };

        let signal = if percent_b >= 1.0 {
            TradingSignal::Sell
        } else if percent_b <= 0.0 {
            TradingSignal::Buy
        } else {
            TradingSignal::Hold
        };

        out.push(IndicatorValue {
            name: name.clone(),
            value: middle,
            signal,
            timestamp: candles[i].timestamp,
            parameters: params(&[
                ("period", period as f64),
                ("upper", upper),
                ("lower", lower),
                ("bandwidth", bandwidth),
                ("percent_b", percent_b),
            ]),
        });
    }
    out
}

// ---------------------------------------------------------------------------
// On-balance volume
// ---------------------------------------------------------------------------

pub fn obv(candles: &[Candle]) -> Vec<IndicatorValue> {
    if candles.len() < 2 {
        return vec![];
    }
    let mut out = Vec::with_capacity(candles.len() - 1);
    let mut running = 0.0_f64;

    for i in 1..candles.len() {
        let prev_obv = running;
        if candles[i].close > candles[i - 1].close {
            running += candles[i].volume;
        } else if candles[i].close < candles[i - 1].close {
            running -= candles[i].volume;
        }

        let signal = if running > prev_obv {
            TradingSignal::Buy
        } else if running < prev_obv {
            TradingSignal::Sell
        } else {
            TradingSignal::Hold
        };

        out.push(IndicatorValue {
            name: "OBV".to_string(),
            value: running,
            signal,
            timestamp: candles[i].timestamp,
            parameters: params(&[("previous", prev_obv)]),
        });
    }
    out
}

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

/// Weighted verdict score over a set of emissions, in [−2, +2].
pub fn composite_score(values: &[IndicatorValue]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| v.signal.numeric()).sum::<f64>() / values.len() as f64
}

/// Collapse a set of indicator emissions into one verdict with confidence.
pub fn composite_signal(values: &[IndicatorValue]) -> (TradingSignal, f64) {
    let score = composite_score(values);
    let signal = if score >= 0.5 {
        TradingSignal::Buy
    } else if score <= -0.5 {
        TradingSignal::Sell
    } else {
        TradingSignal::Hold
    };
    (signal, (score.abs() / 2.0).min(1.0))
}

/// Trend classification for the multi-timeframe view.
pub fn trend_from_score(score: f64) -> TrendDirection {
    if score > 0.2 {
        TrendDirection::Bullish
    } else if score < -0.2 {
        TrendDirection::Bearish
    } else {
        TrendDirection::Neutral
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn closes_of(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

fn trend_signal(close: f64, ma: f64, prev_ma: Option<f64>) -> TradingSignal {
    match prev_ma {
        Some(prev) if close > ma && ma > prev => TradingSignal::Buy,
        Some(prev) if close < ma && ma < prev => TradingSignal::Sell,
        _ => TradingSignal::Hold,
    }
}

fn params(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), *v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// Daily candles from a close series, each bar a ±1 envelope around its close.
    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { closes[i - 1] };
                Candle {
                    timestamp: start + Duration::days(i as i64),
                    open,
                    high: close.max(open) + 1.0,
                    low: close.min(open) - 1.0,
                    close,
                    volume: 1_000.0,
                }
            })
            .collect()
    }

    /// Degenerate flat series: every bar open = high = low = close.
    fn flat_candles(price: f64, len: usize) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..len)
            .map(|i| Candle {
                timestamp: start + Duration::days(i as i64),
                open: price,
                high: price,
                low: price,
                close: price,
                volume: 1_000.0,
            })
            .collect()
    }

    fn ascending_closes() -> Vec<f64> {
        (100..130).map(f64::from).collect()
    }

    #[test]
    fn sma_warmup_emission_count() {
        let candles = candles_from_closes(&ascending_closes());
        assert_eq!(sma(&candles, 5).len(), 30 - 5 + 1);
        assert_eq!(sma(&candles, 30).len(), 1);
        assert_eq!(sma(&candles, 31).len(), 0);
    }

    #[test]
    fn ema_warmup_emission_count() {
        let candles = candles_from_closes(&ascending_closes());
        assert_eq!(ema(&candles, 5).len(), 30 - 5 + 1);
        assert_eq!(ema(&candles, 31).len(), 0);
    }

    #[test]
    fn ascending_series_sma_and_rsi() {
        // E1: closes 100..129, SMA(5) last = mean(125..=129) = 127
        let candles = candles_from_closes(&ascending_closes());
        let sma_series = sma(&candles, 5);
        let last = sma_series.last().unwrap();
        assert!((last.value - 127.0).abs() < 1e-9);
        assert_eq!(last.signal, TradingSignal::Buy);

        let rsi_series = rsi(&candles, 14);
        assert!(rsi_series.last().unwrap().value > 50.0);

        // Trend followers vote buy; the pegged oscillators offset them but
        // can never drag a monotone uptrend into sell territory.
        let latest = latest_suite(&candles, &IndicatorKind::ALL);
        let (signal, _) = composite_signal(&latest);
        assert_ne!(signal, TradingSignal::Sell);
        assert_ne!(signal, TradingSignal::StrongSell);
        let trend_followers: Vec<IndicatorValue> = latest
            .into_iter()
            .filter(|v| {
                v.name.starts_with("SMA") || v.name.starts_with("EMA") || v.name == "OBV"
            })
            .collect();
        let (signal, _) = composite_signal(&trend_followers);
        assert!(
            signal.is_buy(),
            "trend composite must be a buy, got {signal}"
        );
    }

    #[test]
    fn rsi_stays_in_range() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + 10.0 * f64::sin(i as f64 * 0.7) + i as f64 * 0.3)
            .collect();
        let candles = candles_from_closes(&closes);
        for v in rsi(&candles, 14) {
            assert!((0.0..=100.0).contains(&v.value), "RSI {} out of range", v.value);
        }
    }

    #[test]
    fn flat_series_rsi_is_100_and_sma_holds() {
        // E3: constant closes → avgLoss = 0 → RSI = 100; MA not rising/falling.
        let candles = flat_candles(100.0, 30);
        let rsi_series = rsi(&candles, 14);
        assert!(rsi_series.iter().all(|v| v.value == 100.0));

        for v in sma(&candles, 5) {
            assert_eq!(v.signal, TradingSignal::Hold);
        }
        for v in ema(&candles, 5) {
            assert_eq!(v.signal, TradingSignal::Hold);
        }
    }

    #[test]
    fn stochastic_zero_range_emits_midpoint() {
        let candles = flat_candles(50.0, 20);
        let series = stochastic(&candles, 14, 3);
        assert!(!series.is_empty());
        assert!(series.iter().all(|v| v.value == 50.0));
    }

    #[test]
    fn stochastic_emission_count() {
        let candles = candles_from_closes(&ascending_closes());
        // warm-up k+d-2 = 15 bars → 30 - 15 = 15 emissions
        assert_eq!(stochastic(&candles, 14, 3).len(), 15);
    }

    #[test]
    fn williams_zero_range_emits_minus_50() {
        let candles = flat_candles(50.0, 20);
        let series = williams_r(&candles, 14);
        assert!(series.iter().all(|v| v.value == -50.0));
        assert!(series.iter().all(|v| v.signal == TradingSignal::Hold));
    }

    #[test]
    fn williams_overbought_in_uptrend() {
        let candles = candles_from_closes(&ascending_closes());
        let last = williams_r(&candles, 14).into_iter().next_back().unwrap();
        assert!(last.value >= -20.0);
        assert_eq!(last.signal, TradingSignal::Sell);
    }

    #[test]
    fn macd_warmup_and_uptrend_verdict() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + f64::from(i)).collect();
        let candles = candles_from_closes(&closes);
        let series = macd(&candles, 12, 26, 9);
        // warm-up slow+signal-2 = 33 bars → 60 - 33 = 27 emissions
        assert_eq!(series.len(), 27);
        let last = series.last().unwrap();
        assert!(last.parameters["macd"] > 0.0);
        assert_eq!(
            last.parameters["histogram"],
            last.parameters["macd"] - last.parameters["signal"]
        );
    }

    #[test]
    fn bollinger_flat_series_is_neutral() {
        let candles = flat_candles(100.0, 25);
        let series = bollinger(&candles, 20, 2.0);
        for v in &series {
            assert_eq!(v.parameters["percent_b"], 0.5);
            assert_eq!(v.parameters["bandwidth"], 0.0);
            assert_eq!(v.signal, TradingSignal::Hold);
        }
    }

    #[test]
    fn bollinger_emits_band_parameters() {
        let candles = candles_from_closes(&ascending_closes());
        let last = bollinger(&candles, 20, 2.0).into_iter().next_back().unwrap();
        assert!(last.parameters["upper"] > last.value);
        assert!(last.parameters["lower"] < last.value);
        assert!(last.parameters["bandwidth"] > 0.0);
    }

    #[test]
    fn obv_running_sum() {
        let candles = candles_from_closes(&[100.0, 101.0, 100.5, 100.5, 102.0]);
        let series = obv(&candles);
        let values: Vec<f64> = series.iter().map(|v| v.value).collect();
        assert_eq!(values, vec![1_000.0, 0.0, 0.0, 1_000.0]);
        assert_eq!(series[0].signal, TradingSignal::Buy);
        assert_eq!(series[1].signal, TradingSignal::Sell);
        assert_eq!(series[2].signal, TradingSignal::Hold);
        assert_eq!(series[3].signal, TradingSignal::Buy);
    }

    #[test]
    fn composite_thresholds() {
        let candles = candles_from_closes(&ascending_closes());
        let mut v = sma(&candles, 5).pop().unwrap();

        let mk = |signal: TradingSignal, v: &IndicatorValue| {
            let mut c = v.clone();
            c.signal = signal;
            c
        };

        // 3 buys + 1 hold → score 0.75 → Buy, confidence 0.375
        let bag = vec![
            mk(TradingSignal::Buy, &v),
            mk(TradingSignal::Buy, &v),
            mk(TradingSignal::Buy, &v),
            mk(TradingSignal::Hold, &v),
        ];
        let (signal, confidence) = composite_signal(&bag);
        assert_eq!(signal, TradingSignal::Buy);
        assert!((confidence - 0.375).abs() < 1e-9);

        // 1 buy + 1 sell → score 0 → Hold
        v.signal = TradingSignal::Hold;
        let bag = vec![mk(TradingSignal::Buy, &v), mk(TradingSignal::Sell, &v)];
        assert_eq!(composite_signal(&bag).0, TradingSignal::Hold);

        assert_eq!(composite_signal(&[]).0, TradingSignal::Hold);
    }

    #[test]
    fn trend_classification_bounds() {
        assert_eq!(trend_from_score(0.5), TrendDirection::Bullish);
        assert_eq!(trend_from_score(0.1), TrendDirection::Neutral);
        assert_eq!(trend_from_score(-0.1), TrendDirection::Neutral);
        assert_eq!(trend_from_score(-0.3), TrendDirection::Bearish);
    }

    #[test]
    fn indicator_names_carry_parameters() {
        let candles = candles_from_closes(&ascending_closes());
        assert_eq!(rsi(&candles, 14)[0].name, "RSI_14");
        assert_eq!(sma(&candles, 20)[0].name, "SMA_20");
        assert_eq!(stochastic(&candles, 14, 3)[0].name, "STOCH_14_3");
    }

    #[test]
    fn kind_parsing_accepts_aliases() {
        assert_eq!(IndicatorKind::parse("RSI"), Some(IndicatorKind::Rsi));
        assert_eq!(IndicatorKind::parse("bbands"), Some(IndicatorKind::Bollinger));
        assert_eq!(IndicatorKind::parse("willr"), Some(IndicatorKind::WilliamsR));
        assert_eq!(IndicatorKind::parse("nope"), None);
    }
}
