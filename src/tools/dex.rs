//! Token-graph tools backed by the DEX aggregator: liquidity aggregation,
//! per-network token search, cross-DEX price comparison, pool listings and
//! per-pool OHLCV.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;

use crate::data::geckoterminal::{GeckoTerminalClient, Pool};
use crate::data::provider::MarketDataProvider;
use crate::types::Candle;

use super::response_types::{
    DexEntry, DexListResponse, DexPrice, DexPricesResponse, LiquidityResponse, NetworkEntry,
    NetworkTokensResponse, NetworksResponse, OhlcvStats, PoolAnalyticsResponse, PoolOhlcvResponse,
    PoolSummary, PoolsResponse, TokenAggregate, TokenSearchResponse,
};

const DEFAULT_LIMIT: usize = 10;
const MAX_OHLCV_BARS: u32 = 1_000;

// ---------------------------------------------------------------------------
// get_token_liquidity
// ---------------------------------------------------------------------------

pub async fn token_liquidity(
    gecko: &GeckoTerminalClient,
    symbol: &str,
    network: Option<&str>,
) -> Result<LiquidityResponse> {
    let symbol = MarketDataProvider::canonical_symbol(symbol);
    let pools = gecko.search_pools(&symbol, network).await?;
    let mut matching: Vec<Pool> = pools
        .into_iter()
        .filter(|p| matches_symbol(p, &symbol))
        .collect();
    if matching.is_empty() {
        bail!("no liquidity pools found for {symbol}");
    }
    sort_by_reserve(&mut matching);

    let total_liquidity_usd = matching.iter().filter_map(|p| p.reserve_usd).sum();
    let total_volume_24h_usd = matching.iter().filter_map(|p| p.volume_24h_usd).sum();

    Ok(LiquidityResponse {
        symbol,
        network: network.map(str::to_string),
        pool_count: matching.len(),
        total_liquidity_usd,
        total_volume_24h_usd,
        top_pools: matching.iter().take(DEFAULT_LIMIT).map(PoolSummary::from).collect(),
    })
}

// ---------------------------------------------------------------------------
// search_tokens_by_network
// ---------------------------------------------------------------------------

pub async fn tokens_by_network(
    gecko: &GeckoTerminalClient,
    network: &str,
    query: Option<&str>,
    limit: Option<usize>,
) -> Result<NetworkTokensResponse> {
    let pools = match query {
        Some(q) => gecko.search_pools(q, Some(network)).await?,
        None => gecko.top_pools(network, Some("h24_volume_usd_desc")).await?,
    };
    let mut tokens = aggregate_tokens(&pools);
    tokens.truncate(limit.unwrap_or(DEFAULT_LIMIT));

    Ok(NetworkTokensResponse {
        network: network.to_string(),
        query: query.map(str::to_string),
        tokens,
    })
}

// ---------------------------------------------------------------------------
// compare_dex_prices
// ---------------------------------------------------------------------------

pub async fn compare_prices(
    gecko: &GeckoTerminalClient,
    symbol: &str,
    network: &str,
) -> Result<DexPricesResponse> {
    let symbol = MarketDataProvider::canonical_symbol(symbol);
    let pools = gecko.search_pools(&symbol, Some(network)).await?;

    // Deepest matching pool per DEX.
    let mut best_per_dex: BTreeMap<String, &Pool> = BTreeMap::new();
    for pool in pools
        .iter()
        .filter(|p| matches_symbol(p, &symbol) && p.price_usd.is_some())
    {
        let Some(dex) = pool.dex.clone() else {
            continue;
        };
        let incumbent = best_per_dex.get(&dex);
        if incumbent.is_none_or(|b| pool.reserve_usd.unwrap_or(0.0) > b.reserve_usd.unwrap_or(0.0))
        {
            best_per_dex.insert(dex, pool);
        }
    }

    let mut prices: Vec<DexPrice> = best_per_dex
        .into_iter()
        .map(|(dex, pool)| DexPrice {
            dex,
            price_usd: pool.price_usd.unwrap_or(0.0),
            pool_address: pool.address.clone(),
            reserve_usd: pool.reserve_usd,
        })
        .collect();
    if prices.is_empty() {
        bail!("no DEX prices found for {symbol} on {network}");
    }
    prices.sort_by(|a, b| {
        b.price_usd
            .partial_cmp(&a.price_usd)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let (best, worst, average, spread_usd, spread_pct) = price_stats(&prices);
    Ok(DexPricesResponse {
        symbol,
        network: network.to_string(),
        prices,
        best_price_usd: best,
        worst_price_usd: worst,
        average_price_usd: average,
        spread_usd,
        spread_pct,
    })
}

// ---------------------------------------------------------------------------
// get_network_pools
// ---------------------------------------------------------------------------

pub async fn network_pools(
    gecko: &GeckoTerminalClient,
    network: &str,
    sort_by: Option<&str>,
    limit: Option<usize>,
) -> Result<PoolsResponse> {
    let (sort_param, sort_label) = sort_key(sort_by)?;
    let pools = gecko.top_pools(network, Some(sort_param)).await?;

    Ok(PoolsResponse {
        network: network.to_string(),
        sort_by: sort_label.to_string(),
        pools: pools
            .iter()
            .take(limit.unwrap_or(DEFAULT_LIMIT))
            .map(PoolSummary::from)
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// get_dex_info / get_available_networks
// ---------------------------------------------------------------------------

pub async fn dex_info(gecko: &GeckoTerminalClient, network: &str) -> Result<DexListResponse> {
    let dexes = gecko.dexes(network).await?;
    Ok(DexListResponse {
        network: network.to_string(),
        dexes: dexes
            .into_iter()
            .map(|d| DexEntry {
                id: d.id,
                name: d.name,
            })
            .collect(),
    })
}

pub async fn networks(gecko: &GeckoTerminalClient) -> Result<NetworksResponse> {
    let networks = gecko.networks().await?;
    Ok(NetworksResponse {
        networks: networks
            .into_iter()
            .map(|n| NetworkEntry {
                id: n.id,
                name: n.name,
            })
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// get_pool_analytics
// ---------------------------------------------------------------------------

pub async fn pool_analytics(
    gecko: &GeckoTerminalClient,
    network: &str,
    pool_address: &str,
) -> Result<PoolAnalyticsResponse> {
    let pool = gecko.pool_detail(network, pool_address).await?;
    Ok(PoolAnalyticsResponse {
        network: network.to_string(),
        pool: PoolSummary::from(&pool),
    })
}

// ---------------------------------------------------------------------------
// get_pool_ohlcv
// ---------------------------------------------------------------------------

pub async fn pool_ohlcv(
    gecko: &GeckoTerminalClient,
    network: &str,
    pool_address: &str,
    start_date: &str,
    end_date: Option<&str>,
    interval: Option<&str>,
) -> Result<PoolOhlcvResponse> {
    let interval = interval.unwrap_or("1d");
    let (segment, aggregate, bar_seconds) = parse_interval(interval)?;

    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
        .with_context(|| format!("invalid start_date: {start_date}"))?;
    let end = match end_date {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("invalid end_date: {raw}"))?,
        None => Utc::now().date_naive(),
    };
    if end < start {
        bail!("end_date {end} precedes start_date {start}");
    }

    let start_ts = start
        .and_hms_opt(0, 0, 0)
        .expect("midnight is valid")
        .and_utc()
        .timestamp();
    let before_ts = (end + chrono::Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .expect("midnight is valid")
        .and_utc()
        .timestamp();

    let span_bars = ((before_ts - start_ts) / bar_seconds).max(1) as u32;
    let limit = span_bars.min(MAX_OHLCV_BARS);

    let candles = gecko
        .pool_ohlcv(network, pool_address, segment, aggregate, Some(before_ts), limit)
        .await?;
    let windowed: Vec<Candle> = candles
        .into_iter()
        .filter(|c| c.timestamp.timestamp() >= start_ts && c.timestamp.timestamp() < before_ts)
        .collect();

    let statistics = ohlcv_stats(&windowed);
    Ok(PoolOhlcvResponse {
        network: network.to_string(),
        pool_address: pool_address.to_string(),
        interval: interval.to_string(),
        candles: windowed,
        statistics,
    })
}

// ---------------------------------------------------------------------------
// search_tokens_advanced
// ---------------------------------------------------------------------------

pub async fn search_tokens(
    gecko: &GeckoTerminalClient,
    query: &str,
    min_liquidity: Option<f64>,
    min_volume: Option<f64>,
    limit: Option<usize>,
) -> Result<TokenSearchResponse> {
    let pools = gecko.search_pools(query, None).await?;
    let mut tokens = aggregate_tokens(&pools);
    tokens.retain(|t| {
        min_liquidity.is_none_or(|min| t.total_liquidity_usd >= min)
            && min_volume.is_none_or(|min| t.total_volume_24h_usd >= min)
    });
    tokens.truncate(limit.unwrap_or(DEFAULT_LIMIT));

    Ok(TokenSearchResponse {
        query: query.to_string(),
        tokens,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn matches_symbol(pool: &Pool, symbol: &str) -> bool {
    pool.base_token_symbol
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case(symbol))
}

fn sort_by_reserve(pools: &mut [Pool]) {
    pools.sort_by(|a, b| {
        b.reserve_usd
            .unwrap_or(0.0)
            .partial_cmp(&a.reserve_usd.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Group pools by (base token symbol, network), summing liquidity and volume
/// and quoting the deepest pool's price. Sorted by liquidity, descending.
fn aggregate_tokens(pools: &[Pool]) -> Vec<TokenAggregate> {
    struct Acc {
        aggregate: TokenAggregate,
        best_reserve: f64,
    }
    let mut map: BTreeMap<(String, String), Acc> = BTreeMap::new();

    for pool in pools {
        let Some(symbol) = pool.base_token_symbol.clone() else {
            continue;
        };
        let key = (symbol.clone(), pool.network.clone());
        let reserve = pool.reserve_usd.unwrap_or(0.0);
        let entry = map.entry(key).or_insert_with(|| Acc {
            aggregate: TokenAggregate {
                symbol,
                network: pool.network.clone(),
                pool_count: 0,
                total_liquidity_usd: 0.0,
                total_volume_24h_usd: 0.0,
                price_usd: None,
            },
            best_reserve: -1.0,
        });
        entry.aggregate.pool_count += 1;
        entry.aggregate.total_liquidity_usd += reserve;
        entry.aggregate.total_volume_24h_usd += pool.volume_24h_usd.unwrap_or(0.0);
        if reserve > entry.best_reserve {
            entry.best_reserve = reserve;
            entry.aggregate.price_usd = pool.price_usd;
        }
    }

    let mut tokens: Vec<TokenAggregate> = map.into_values().map(|a| a.aggregate).collect();
    tokens.sort_by(|a, b| {
        b.total_liquidity_usd
            .partial_cmp(&a.total_liquidity_usd)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    tokens
}

/// Interval string → upstream path segment, aggregate, seconds per bar.
fn parse_interval(interval: &str) -> Result<(&'static str, u32, i64)> {
    let out = match interval {
        "1m" => ("minute", 1, 60),
        "5m" => ("minute", 5, 300),
        "15m" => ("minute", 15, 900),
        "1h" => ("hour", 1, 3_600),
        "4h" => ("hour", 4, 14_400),
        "12h" => ("hour", 12, 43_200),
        "1d" => ("day", 1, 86_400),
        other => bail!(
            "unsupported interval: {other} (expected one of 1m, 5m, 15m, 1h, 4h, 12h, 1d)"
        ),
    };
    Ok(out)
}

fn sort_key(sort_by: Option<&str>) -> Result<(&'static str, &'static str)> {
    match sort_by.unwrap_or("volume") {
        "volume" => Ok(("h24_volume_usd_desc", "volume")),
        "transactions" | "tx_count" => Ok(("h24_tx_count_desc", "transactions")),
        other => bail!("unsupported sort_by: {other} (expected volume or transactions)"),
    }
}

fn ohlcv_stats(candles: &[Candle]) -> OhlcvStats {
    if candles.is_empty() {
        return OhlcvStats {
            data_points: 0,
            high: 0.0,
            low: 0.0,
            average_close: 0.0,
            total_volume: 0.0,
            change_pct: 0.0,
        };
    }
    let high = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let average_close = candles.iter().map(|c| c.close).sum::<f64>() / candles.len() as f64;
    let total_volume = candles.iter().map(|c| c.volume).sum();
    let first_open = candles[0].open;
    let last_close = candles[candles.len() - 1].close;
    let change_pct = if first_open == 0.0 {
        0.0
    } else {
        (last_close - first_open) / first_open * 100.0
    };
    OhlcvStats {
        data_points: candles.len(),
        high,
        low,
        average_close,
        total_volume,
        change_pct,
    }
}

fn price_stats(prices: &[DexPrice]) -> (f64, f64, f64, f64, f64) {
    let best = prices
        .iter()
        .map(|p| p.price_usd)
        .fold(f64::NEG_INFINITY, f64::max);
    let worst = prices.iter().map(|p| p.price_usd).fold(f64::INFINITY, f64::min);
    let average = prices.iter().map(|p| p.price_usd).sum::<f64>() / prices.len() as f64;
    let spread_usd = best - worst;
    let spread_pct = if worst == 0.0 {
        0.0
    } else {
        spread_usd / worst * 100.0
    };
    (best, worst, average, spread_usd, spread_pct)
}
