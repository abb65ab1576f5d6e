//! GeckoTerminal client — the secondary (DEX aggregator) source.
//!
//! Exposes the on-chain token graph: pool search, per-network pool and DEX
//! listings, pool detail, and per-pool OHLCV. Payloads follow the JSON:API
//! envelope (`data` / `attributes` / `relationships`) with numerics encoded
//! as strings. Also serves as the price fallback when the primary source
//! cannot resolve a symbol.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration as StdDuration;

use crate::types::{Candle, PercentChanges, PriceSnapshot, Timeframe};

use super::error::ProviderError;

const BASE_URL: &str = "https://api.geckoterminal.com/api/v2";
const TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// JSON:API payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListDocument<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ItemDocument<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct PoolResource {
    id: String,
    attributes: PoolAttributes,
    #[serde(default)]
    relationships: Option<PoolRelationships>,
}

#[derive(Debug, Default, Deserialize)]
struct PoolAttributes {
    name: Option<String>,
    address: Option<String>,
    base_token_price_usd: Option<String>,
    reserve_in_usd: Option<String>,
    fdv_usd: Option<String>,
    pool_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    volume_usd: PeriodValues,
    #[serde(default)]
    price_change_percentage: PeriodValues,
}

#[derive(Debug, Default, Deserialize)]
struct PeriodValues {
    h24: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PoolRelationships {
    #[serde(default)]
    dex: Option<RelRef>,
    #[serde(default)]
    base_token: Option<RelRef>,
    #[serde(default)]
    network: Option<RelRef>,
}

#[derive(Debug, Deserialize)]
struct RelRef {
    data: Option<RelData>,
}

#[derive(Debug, Deserialize)]
struct RelData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct NamedResource {
    id: String,
    attributes: NamedAttributes,
}

#[derive(Debug, Deserialize)]
struct NamedAttributes {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OhlcvResource {
    attributes: OhlcvAttributes,
}

#[derive(Debug, Deserialize)]
struct OhlcvAttributes {
    #[serde(default)]
    ohlcv_list: Vec<[f64; 6]>,
}

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// A liquidity pool as the rest of the crate sees it.
#[derive(Debug, Clone)]
pub struct Pool {
    pub network: String,
    pub address: String,
    pub name: String,
    pub dex: Option<String>,
    pub base_token_symbol: Option<String>,
    pub base_token_address: Option<String>,
    pub price_usd: Option<f64>,
    pub reserve_usd: Option<f64>,
    pub fdv_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
    pub price_change_24h_pct: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct IdName {
    pub id: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct GeckoTerminalClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeckoTerminalClient {
    pub fn new() -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Unknown(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e, context))?;
        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(ProviderError::from_status(status, context));
        }
        resp.json::<T>()
            .await
            .map_err(|e| ProviderError::Parsing(format!("{context}: {e}")))
    }

    /// Global pool search, optionally restricted to one network.
    pub async fn search_pools(
        &self,
        query: &str,
        network: Option<&str>,
    ) -> Result<Vec<Pool>, ProviderError> {
        let context = format!("pool search for {query}");
        let mut params = vec![("query", query.to_string()), ("page", "1".to_string())];
        if let Some(net) = network {
            params.push(("network", net.to_string()));
        }
        let doc: ListDocument<PoolResource> =
            self.get_json("/search/pools", &params, &context).await?;
        Ok(doc
            .data
            .into_iter()
            .filter_map(|r| pool_from_resource(r, network))
            .collect())
    }

    /// Supported network listing.
    pub async fn networks(&self) -> Result<Vec<IdName>, ProviderError> {
        let doc: ListDocument<NamedResource> = self
            .get_json("/networks", &[("page", "1".to_string())], "network listing")
            .await?;
        Ok(doc.data.into_iter().map(id_name).collect())
    }

    /// DEXes available on one network.
    pub async fn dexes(&self, network: &str) -> Result<Vec<IdName>, ProviderError> {
        let context = format!("DEX listing for {network}");
        let doc: ListDocument<NamedResource> = self
            .get_json(
                &format!("/networks/{network}/dexes"),
                &[("page", "1".to_string())],
                &context,
            )
            .await?;
        Ok(doc.data.into_iter().map(id_name).collect())
    }

    /// Top pools on one network. `sort` is the upstream sort key
    /// (e.g. `h24_volume_usd_desc`).
    pub async fn top_pools(
        &self,
        network: &str,
        sort: Option<&str>,
    ) -> Result<Vec<Pool>, ProviderError> {
        let context = format!("pool listing for {network}");
        let mut params = vec![("page", "1".to_string())];
        if let Some(sort) = sort {
            params.push(("sort", sort.to_string()));
        }
        let doc: ListDocument<PoolResource> = self
            .get_json(&format!("/networks/{network}/pools"), &params, &context)
            .await?;
        Ok(doc
            .data
            .into_iter()
            .filter_map(|r| pool_from_resource(r, Some(network)))
            .collect())
    }

    /// Full detail for a single pool.
    pub async fn pool_detail(
        &self,
        network: &str,
        address: &str,
    ) -> Result<Pool, ProviderError> {
        let context = format!("pool {address} on {network}");
        let doc: ItemDocument<PoolResource> = self
            .get_json(
                &format!("/networks/{network}/pools/{address}"),
                &[],
                &context,
            )
            .await?;
        pool_from_resource(doc.data, Some(network))
            .ok_or_else(|| ProviderError::Parsing(format!("{context}: unreadable pool payload")))
    }

    /// OHLCV bars for one pool. `timeframe` is the upstream path segment
    /// (`day` / `hour` / `minute`) and `aggregate` its multiplier.
    pub async fn pool_ohlcv(
        &self,
        network: &str,
        address: &str,
        timeframe: &str,
        aggregate: u32,
        before_timestamp: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Candle>, ProviderError> {
        let context = format!("OHLCV for pool {address} on {network}");
        let mut params = vec![
            ("aggregate", aggregate.to_string()),
            ("limit", limit.to_string()),
            ("currency", "usd".to_string()),
        ];
        if let Some(before) = before_timestamp {
            params.push(("before_timestamp", before.to_string()));
        }
        let doc: ItemDocument<OhlcvResource> = self
            .get_json(
                &format!("/networks/{network}/pools/{address}/ohlcv/{timeframe}"),
                &params,
                &context,
            )
            .await?;

        let mut candles: Vec<Candle> = doc
            .data
            .attributes
            .ohlcv_list
            .iter()
            .filter_map(|row| {
                let ts = DateTime::from_timestamp(row[0] as i64, 0)?;
                Some(Candle {
                    timestamp: ts,
                    open: row[1],
                    high: row[2],
                    low: row[3],
                    close: row[4],
                    volume: row[5],
                })
            })
            .collect();
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }

    /// The retired global trending-pools endpoint. Kept so callers get a
    /// clear error instead of an upstream 404.
    pub fn global_trending_pools(&self) -> Result<Vec<Pool>, ProviderError> {
        Err(ProviderError::NotSupported(
            "the global trending-pools endpoint was retired upstream; \
             list pools per network instead"
            .to_string(),
        ))
    }

    /// Best pool for a ticker symbol: deepest pool whose base token matches.
    pub async fn best_pool_for_symbol(
        &self,
        symbol: &str,
        network: Option<&str>,
    ) -> Result<Pool, ProviderError> {
        let pools = self.search_pools(symbol, network).await?;
        pools
            .into_iter()
            .filter(|p| {
                p.base_token_symbol
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(symbol))
            })
            .max_by(|a, b| {
                let ra = a.reserve_usd.unwrap_or(0.0);
                let rb = b.reserve_usd.unwrap_or(0.0);
                ra.partial_cmp(&rb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| ProviderError::InvalidSymbol(symbol.to_string()))
    }
}

#[async_trait::async_trait]
impl super::QuoteSource for GeckoTerminalClient {
    fn name(&self) -> &'static str {
        "geckoterminal"
    }

    /// Resolves to `network:pool_address` of the deepest matching pool.
    async fn resolve(&self, symbol: &str) -> Result<String, ProviderError> {
        let pool = self.best_pool_for_symbol(symbol, None).await?;
        Ok(format!("{}:{}", pool.network, pool.address))
    }

    async fn fetch_ticker(
        &self,
        id: &str,
        symbol: &str,
    ) -> Result<PriceSnapshot, ProviderError> {
        let (network, address) = id.split_once(':').ok_or_else(|| {
            ProviderError::Unknown(format!("malformed pool id: {id}"))
        })?;
        let pool = self.pool_detail(network, address).await?;
        snapshot_from_pool(symbol, &pool)
    }

    async fn fetch_ohlcv(
        &self,
        id: &str,
        timeframe: Timeframe,
        periods: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        let (network, address) = id.split_once(':').ok_or_else(|| {
            ProviderError::Unknown(format!("malformed pool id: {id}"))
        })?;
        let (segment, aggregate) = ohlcv_segments(timeframe);
        self.pool_ohlcv(network, address, segment, aggregate, None, periods as u32)
            .await
    }
}

/// Snapshot assembled from a pool. Fields the DEX aggregator does not supply
/// (market cap, rank, ATH, long-horizon changes) stay absent.
pub fn snapshot_from_pool(symbol: &str, pool: &Pool) -> Result<PriceSnapshot, ProviderError> {
    let price = pool.price_usd.ok_or_else(|| {
        ProviderError::Parsing(format!("pool {} has no base token price", pool.address))
    })?;
    Ok(PriceSnapshot {
        symbol: symbol.to_string(),
        price,
        change_24h: pool
            .price_change_24h_pct
            .and_then(|pct| super::absolute_change_24h(price, pct)),
        change_24h_pct: pool.price_change_24h_pct,
        volume_24h: pool.volume_24h_usd,
        market_cap: None,
        rank: None,
        percent_changes: PercentChanges {
            h24: pool.price_change_24h_pct,
            ..PercentChanges::default()
        },
        ath_price: None,
        ath_date: None,
        source: "geckoterminal".to_string(),
        network: Some(pool.network.clone()),
        dex: pool.dex.clone(),
        pool_address: Some(pool.address.clone()),
        fetched_at: Utc::now(),
    })
}

/// Map an analysis timeframe onto the upstream OHLCV path + aggregate.
pub fn ohlcv_segments(timeframe: Timeframe) -> (&'static str, u32) {
    match timeframe {
        Timeframe::FourHour => ("hour", 4),
        Timeframe::Daily => ("day", 1),
        Timeframe::Weekly => ("day", 7),
        Timeframe::Monthly => ("day", 30),
    }
}

fn id_name(resource: NamedResource) -> IdName {
    let name = resource.attributes.name.unwrap_or_else(|| resource.id.clone());
    IdName {
        id: resource.id,
        name,
    }
}

fn parse_num(value: &Option<String>) -> Option<f64> {
    value.as_deref().and_then(|s| s.parse::<f64>().ok())
}

/// Strip the `network_` prefix a relationship id carries, e.g.
/// `eth_0xabc` → `0xabc`. Token addresses never contain `_` before `0x`.
fn rel_address(id: &str) -> String {
    match id.rfind("_0x") {
        Some(pos) => id[pos + 1..].to_string(),
        None => id.split('_').next_back().unwrap_or(id).to_string(),
    }
}

fn pool_from_resource(resource: PoolResource, fallback_network: Option<&str>) -> Option<Pool> {
    let attrs = resource.attributes;
    let rels = resource.relationships;

    let network = rels
        .as_ref()
        .and_then(|r| r.network.as_ref())
        .and_then(|r| r.data.as_ref())
        .map(|d| d.id.clone())
        .or_else(|| fallback_network.map(str::to_string))?;

    let address = attrs
        .address
        .clone()
        .or_else(|| Some(rel_address(&resource.id)))?;

    let name = attrs.name.clone().unwrap_or_else(|| address.clone());
    // "WETH / USDC 0.05%" → "WETH"
    let base_token_symbol = name
        .split(" / ")
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Some(Pool {
        network,
        address,
        name,
        dex: rels
            .as_ref()
            .and_then(|r| r.dex.as_ref())
            .and_then(|r| r.data.as_ref())
            .map(|d| d.id.clone()),
        base_token_symbol,
        base_token_address: rels
            .as_ref()
            .and_then(|r| r.base_token.as_ref())
            .and_then(|r| r.data.as_ref())
            .map(|d| rel_address(&d.id)),
        price_usd: parse_num(&attrs.base_token_price_usd),
        reserve_usd: parse_num(&attrs.reserve_in_usd),
        fdv_usd: parse_num(&attrs.fdv_usd),
        volume_24h_usd: parse_num(&attrs.volume_usd.h24),
        price_change_24h_pct: parse_num(&attrs.price_change_percentage.h24),
        created_at: attrs.pool_created_at,
    })
}
