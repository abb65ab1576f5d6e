//! CoinPaprika client — the primary market-data source.
//!
//! Resolves ticker symbols to CoinPaprika coin ids (static table first, then
//! the search endpoint), fetches ticker snapshots, and pulls historical OHLCV
//! windows. With `COINPAPRIKA_API_KEY` set the pro base URL is used and
//! intraday intervals become available; without it the free tier serves daily
//! candles only and intraday requests surface the upstream 402 as
//! `PaymentRequired`.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::time::Duration as StdDuration;

use crate::types::{Candle, PercentChanges, PriceSnapshot, Timeframe};

use super::error::ProviderError;

const FREE_BASE_URL: &str = "https://api.coinpaprika.com/v1";
const PRO_BASE_URL: &str = "https://api-pro.coinpaprika.com/v1";
const TIMEOUT_SECS: u64 = 30;
const SEARCH_LIMIT: u32 = 10;

/// Well-known ticker → CoinPaprika coin id. Avoids a search round-trip for
/// the symbols that dominate traffic.
const KNOWN_COINS: &[(&str, &str)] = &[
    ("BTC", "btc-bitcoin"),
    ("ETH", "eth-ethereum"),
    ("USDT", "usdt-tether"),
    ("BNB", "bnb-binance-coin"),
    ("SOL", "sol-solana"),
    ("XRP", "xrp-xrp"),
    ("USDC", "usdc-usd-coin"),
    ("ADA", "ada-cardano"),
    ("AVAX", "avax-avalanche"),
    ("DOGE", "doge-dogecoin"),
    ("DOT", "dot-polkadot"),
    ("TRX", "trx-tron"),
    ("LINK", "link-chainlink"),
    ("MATIC", "matic-polygon"),
    ("TON", "toncoin-the-open-network"),
    ("SHIB", "shib-shiba-inu"),
    ("LTC", "ltc-litecoin"),
    ("BCH", "bch-bitcoin-cash"),
    ("UNI", "uni-uniswap"),
    ("ATOM", "atom-cosmos"),
    ("XLM", "xlm-stellar"),
    ("ETC", "etc-ethereum-classic"),
    ("NEAR", "near-near-protocol"),
    ("FIL", "fil-filecoin"),
    ("APT", "apt-aptos"),
    ("ARB", "arb-arbitrum"),
    ("OP", "op-optimism"),
    ("VET", "vet-vechain"),
    ("ALGO", "algo-algorand"),
    ("AAVE", "aave-new"),
    ("MKR", "mkr-maker"),
    ("INJ", "inj-injective-protocol"),
    ("XMR", "xmr-monero"),
    ("HBAR", "hbar-hedera-hashgraph"),
    ("ICP", "icp-internet-computer"),
    ("PEPE", "pepe-pepe"),
    ("SUI", "sui-sui"),
];

// ---------------------------------------------------------------------------
// API payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    currencies: Vec<SearchCurrency>,
}

#[derive(Debug, Deserialize)]
struct SearchCurrency {
    id: String,
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    rank: Option<u32>,
    quotes: TickerQuotes,
}

#[derive(Debug, Deserialize)]
struct TickerQuotes {
    #[serde(rename = "USD")]
    usd: UsdQuote,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    price: f64,
    volume_24h: Option<f64>,
    market_cap: Option<f64>,
    percent_change_15m: Option<f64>,
    percent_change_30m: Option<f64>,
    percent_change_1h: Option<f64>,
    percent_change_6h: Option<f64>,
    percent_change_12h: Option<f64>,
    percent_change_24h: Option<f64>,
    percent_change_7d: Option<f64>,
    percent_change_30d: Option<f64>,
    percent_change_1y: Option<f64>,
    ath_price: Option<f64>,
    ath_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct OhlcvRow {
    time_open: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CoinPaprikaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinPaprikaClient {
    pub fn new(api_key: Option<String>) -> Result<Self, ProviderError> {
        let api_key = api_key.filter(|k| !k.is_empty());
        let base_url = if api_key.is_some() {
            PRO_BASE_URL.to_string()
        } else {
            FREE_BASE_URL.to_string()
        };
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Unknown(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(std::env::var("COINPAPRIKA_API_KEY").ok())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        let mut req = self.http.get(&url).query(query);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", key.as_str());
        }
        let resp = req
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

    /// Resolve an upper-cased ticker symbol to a CoinPaprika coin id.
    pub async fn resolve_symbol(&self, symbol: &str) -> Result<String, ProviderError> {
        if let Some((_, id)) = KNOWN_COINS.iter().find(|(sym, _)| *sym == symbol) {
            return Ok((*id).to_string());
        }

        let context = format!("symbol search for {symbol}");
        let resp: SearchResponse = self
            .get_json(
                "/search",
                &[
                    ("q", symbol.to_string()),
                    ("c", "currencies".to_string()),
                    ("limit", SEARCH_LIMIT.to_string()),
                ],
                &context,
            )
            .await?;

        resp.currencies
            .iter()
            .find(|c| c.symbol.eq_ignore_ascii_case(symbol))
            .or_else(|| resp.currencies.first())
            .map(|c| c.id.clone())
            .ok_or_else(|| ProviderError::InvalidSymbol(symbol.to_string()))
    }

    /// Fetch the current ticker for a resolved coin id.
    pub async fn fetch_ticker(
        &self,
        id: &str,
        symbol: &str,
    ) -> Result<PriceSnapshot, ProviderError> {
        let context = format!("ticker for {symbol}");
        let resp: TickerResponse = self
            .get_json(
                &format!("/tickers/{id}"),
                &[("quotes", "USD".to_string())],
                &context,
            )
            .await?;

        Ok(snapshot_from_ticker(symbol, &resp))
    }

    /// Fetch the most recent `periods` OHLCV bars at `timeframe`.
    pub async fn fetch_ohlcv(
        &self,
        id: &str,
        timeframe: Timeframe,
        periods: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        let context = format!("{timeframe} candles for {id}");
        // The free tier answers 402 for every intraday interval; skip the
        // round-trip.
        if timeframe.is_intraday() && !self.has_api_key() {
            return Err(ProviderError::from_status(402, &context));
        }
        let span = Duration::minutes(i64::from(timeframe.minutes()) * periods as i64);
        let start = (Utc::now() - span).timestamp();

        let rows: Vec<OhlcvRow> = self
            .get_json(
                &format!("/coins/{id}/ohlcv/historical"),
                &[
                    ("start", start.to_string()),
                    ("interval", interval_str(timeframe).to_string()),
                    ("limit", periods.to_string()),
                ],
                &context,
            )
            .await?;

        let mut candles = candles_from_rows(&rows);
        candles.sort_by_key(|c| c.timestamp);
        if candles.is_empty() {
            return Err(ProviderError::InsufficientData(format!(
                "no {timeframe} candles returned for {id}"
            )));
        }
        Ok(candles)
    }
}

#[async_trait::async_trait]
impl super::QuoteSource for CoinPaprikaClient {
    fn name(&self) -> &'static str {
        "coinpaprika"
    }

    async fn resolve(&self, symbol: &str) -> Result<String, ProviderError> {
        self.resolve_symbol(symbol).await
    }

    async fn fetch_ticker(
        &self,
        id: &str,
        symbol: &str,
    ) -> Result<PriceSnapshot, ProviderError> {
        CoinPaprikaClient::fetch_ticker(self, id, symbol).await
    }

    async fn fetch_ohlcv(
        &self,
        id: &str,
        timeframe: Timeframe,
        periods: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        CoinPaprikaClient::fetch_ohlcv(self, id, timeframe, periods).await
    }
}

/// CoinPaprika interval string for a timeframe.
fn interval_str(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::FourHour => "4h",
        Timeframe::Daily => "1d",
        Timeframe::Weekly => "7d",
        Timeframe::Monthly => "30d",
    }
}

fn snapshot_from_ticker(symbol: &str, resp: &TickerResponse) -> PriceSnapshot {
    let usd = &resp.quotes.usd;
    PriceSnapshot {
        symbol: symbol.to_string(),
        price: usd.price,
        change_24h: usd
            .percent_change_24h
            .and_then(|pct| super::absolute_change_24h(usd.price, pct)),
        change_24h_pct: usd.percent_change_24h,
        volume_24h: usd.volume_24h,
        market_cap: usd.market_cap,
        rank: resp.rank,
        percent_changes: PercentChanges {
            m15: usd.percent_change_15m,
            m30: usd.percent_change_30m,
            h1: usd.percent_change_1h,
            h6: usd.percent_change_6h,
            h12: usd.percent_change_12h,
            h24: usd.percent_change_24h,
            d7: usd.percent_change_7d,
            d30: usd.percent_change_30d,
            y1: usd.percent_change_1y,
        },
        ath_price: usd.ath_price,
        ath_date: usd.ath_date,
        source: "coinpaprika".to_string(),
        network: None,
        dex: None,
        pool_address: None,
        fetched_at: Utc::now(),
    }
}

/// Convert raw rows into candles, skipping rows that violate OHLC ordering.
fn candles_from_rows(rows: &[OhlcvRow]) -> Vec<Candle> {
    rows.iter()
        .filter_map(|r| {
            let body_lo = r.open.min(r.close);
            let body_hi = r.open.max(r.close);
            if r.low > body_lo || body_hi > r.high || r.volume < 0.0 {
                tracing::warn!(
                    time = %r.time_open,
                    "skipping malformed OHLCV row (OHLC ordering violated)"
                );
                return None;
            }
            Some(Candle {
                timestamp: r.time_open,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                volume: r.volume,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_coins_cover_majors() {
        let btc = KNOWN_COINS.iter().find(|(s, _)| *s == "BTC").unwrap();
        assert_eq!(btc.1, "btc-bitcoin");
        assert!(KNOWN_COINS.iter().any(|(s, _)| *s == "ETH"));
    }

    #[test]
    fn interval_mapping() {
        assert_eq!(interval_str(Timeframe::FourHour), "4h");
        assert_eq!(interval_str(Timeframe::Daily), "1d");
        assert_eq!(interval_str(Timeframe::Weekly), "7d");
        assert_eq!(interval_str(Timeframe::Monthly), "30d");
    }

    #[test]
    fn ticker_payload_parses_into_snapshot() {
        let raw = r#"{
            "id": "btc-bitcoin",
            "name": "Bitcoin",
            "symbol": "BTC",
            "rank": 1,
            "quotes": {
                "USD": {
                    "price": 50000.0,
                    "volume_24h": 30000000000.0,
                    "market_cap": 980000000000.0,
                    "percent_change_15m": 0.1,
                    "percent_change_30m": 0.2,
                    "percent_change_1h": 0.3,
                    "percent_change_6h": 1.0,
                    "percent_change_12h": 1.5,
                    "percent_change_24h": 25.0,
                    "percent_change_7d": 5.0,
                    "percent_change_30d": 10.0,
                    "percent_change_1y": 120.0,
                    "ath_price": 69000.0,
                    "ath_date": "2021-11-10T14:17:00Z"
                }
            }
        }"#;
        let resp: TickerResponse = serde_json::from_str(raw).unwrap();
        let snap = snapshot_from_ticker("BTC", &resp);

        assert_eq!(snap.symbol, "BTC");
        assert_eq!(snap.price, 50_000.0);
        assert_eq!(snap.rank, Some(1));
        assert_eq!(snap.percent_changes.h24, Some(25.0));
        assert_eq!(snap.ath_price, Some(69_000.0));
        assert_eq!(snap.source, "coinpaprika");

        // price − price/(1 + 25/100) = 50000 − 40000 = 10000
        let change = snap.change_24h.unwrap();
        assert!((change - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_ohlcv_rows_are_skipped() {
        let raw = r#"[
            {"time_open": "2024-01-01T00:00:00Z", "time_close": "2024-01-01T23:59:59Z",
             "open": 100.0, "high": 110.0, "low": 95.0, "close": 105.0, "volume": 1000,
             "market_cap": 0},
            {"time_open": "2024-01-02T00:00:00Z", "time_close": "2024-01-02T23:59:59Z",
             "open": 100.0, "high": 99.0, "low": 95.0, "close": 105.0, "volume": 1000,
             "market_cap": 0}
        ]"#;
        let rows: Vec<OhlcvRow> = serde_json::from_str(raw).unwrap();
        let candles = candles_from_rows(&rows);
        assert_eq!(candles.len(), 1, "the high < close row must be dropped");
        assert_eq!(candles[0].close, 105.0);
    }

    #[tokio::test]
    async fn free_tier_intraday_is_payment_required() {
        let client = CoinPaprikaClient::new(None).unwrap();
        let err = client
            .fetch_ohlcv("btc-bitcoin", Timeframe::FourHour, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::PaymentRequired(_)));
        assert!(err.to_string().contains("paid data plan"));
    }

    #[test]
    fn missing_api_key_selects_free_tier() {
        let client = CoinPaprikaClient::new(None).unwrap();
        assert!(!client.has_api_key());
        assert_eq!(client.base_url, FREE_BASE_URL);

        let pro = CoinPaprikaClient::new(Some("k".to_string())).unwrap();
        assert!(pro.has_api_key());
        assert_eq!(pro.base_url, PRO_BASE_URL);

        let empty = CoinPaprikaClient::new(Some(String::new())).unwrap();
        assert!(!empty.has_api_key());
    }
}
