//! The market-data provider: symbol canonicalization, upstream-id caching,
//! price snapshots with dual-source fallback, and historical candle windows.
//!
//! Fallback policy: sources are consulted in fixed order (CoinPaprika, then
//! GeckoTerminal). A failed resolution or fetch moves on to the next source,
//! except `PaymentRequired`, which is final — retrying a 402 elsewhere would
//! mask the tier problem. Historical candles for the analytics come from the
//! primary only.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::types::{Candle, PriceSnapshot, Timeframe};

use super::cache::TtlCache;
use super::coinpaprika::CoinPaprikaClient;
use super::error::ProviderError;
use super::geckoterminal::GeckoTerminalClient;
use super::QuoteSource;

const PRICE_TTL: Duration = Duration::from_secs(60);
const CANDLE_TTL: Duration = Duration::from_secs(300);

type CandleKey = (String, Timeframe, usize);
type Sources = Arc<Vec<Arc<dyn QuoteSource>>>;

pub struct MarketDataProvider {
    paprika: CoinPaprikaClient,
    gecko: GeckoTerminalClient,
    sources: Sources,
    /// `source_name:SYMBOL` → upstream id. Unbounded; symbols are stable.
    ids: Arc<DashMap<String, String>>,
    prices: TtlCache<String, PriceSnapshot>,
    candles: TtlCache<CandleKey, Vec<Candle>>,
}

impl MarketDataProvider {
    pub fn new(paprika: CoinPaprikaClient, gecko: GeckoTerminalClient) -> Self {
        let sources: Vec<Arc<dyn QuoteSource>> =
            vec![Arc::new(paprika.clone()), Arc::new(gecko.clone())];
        Self {
            paprika,
            gecko,
            sources: Arc::new(sources),
            ids: Arc::new(DashMap::new()),
            prices: TtlCache::new(PRICE_TTL),
            candles: TtlCache::new(CANDLE_TTL),
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self::new(
            CoinPaprikaClient::from_env()?,
            GeckoTerminalClient::new()?,
        ))
    }

    pub fn has_api_key(&self) -> bool {
        self.paprika.has_api_key()
    }

    /// Direct access to the DEX aggregator for the token-graph tools.
    pub fn gecko(&self) -> &GeckoTerminalClient {
        &self.gecko
    }

    pub fn canonical_symbol(symbol: &str) -> String {
        symbol.trim().to_ascii_uppercase()
    }

    /// Current price snapshot, cached 60 s, with dual-source fallback.
    pub async fn snapshot(&self, symbol: &str) -> Result<PriceSnapshot, ProviderError> {
        let sym = Self::canonical_symbol(symbol);
        let sources = Arc::clone(&self.sources);
        let ids = Arc::clone(&self.ids);
        self.prices
            .get_or_fetch(sym.clone(), move || fetch_snapshot(sources, ids, sym))
            .await
    }

    /// The most recent `periods` candles at `timeframe`, cached 300 s.
    /// Primary source only; there is no candle fallback.
    pub async fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        periods: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        let sym = Self::canonical_symbol(symbol);
        let key = (sym.clone(), timeframe, periods);
        let paprika = self.paprika.clone();
        let ids = Arc::clone(&self.ids);
        self.candles
            .get_or_fetch(key, move || async move {
                let id = resolve_cached(&paprika, &ids, &sym).await?;
                paprika.fetch_ohlcv(&id, timeframe, periods).await
            })
            .await
    }

    /// Candles with a consumer minimum. Shortfalls map to `InsufficientData`.
    pub async fn candles_min(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        periods: usize,
        min: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        let candles = self.candles(symbol, timeframe, periods).await?;
        if candles.len() < min {
            return Err(ProviderError::InsufficientData(format!(
                "need at least {min} {timeframe} candles for {}, got {}",
                Self::canonical_symbol(symbol),
                candles.len()
            )));
        }
        Ok(candles)
    }
}

/// Resolve through the per-source id cache.
async fn resolve_cached(
    source: &dyn QuoteSource,
    ids: &DashMap<String, String>,
    symbol: &str,
) -> Result<String, ProviderError> {
    let cache_key = format!("{}:{symbol}", source.name());
    if let Some(id) = ids.get(&cache_key) {
        return Ok(id.clone());
    }
    let id = source.resolve(symbol).await?;
    ids.insert(cache_key, id.clone());
    Ok(id)
}

async fn fetch_snapshot(
    sources: Sources,
    ids: Arc<DashMap<String, String>>,
    symbol: String,
) -> Result<PriceSnapshot, ProviderError> {
    let mut first_err: Option<ProviderError> = None;

    for source in sources.iter() {
        let id = match resolve_cached(source.as_ref(), &ids, &symbol).await {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(
                    source = source.name(),
                    symbol = %symbol,
                    error = %e,
                    "resolution failed, trying next source"
                );
                first_err.get_or_insert(e);
                continue;
            }
        };

        match source.fetch_ticker(&id, &symbol).await {
            Ok(snapshot) => return Ok(snapshot),
            Err(e @ ProviderError::PaymentRequired(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(
                    source = source.name(),
                    symbol = %symbol,
                    error = %e,
                    "ticker fetch failed, trying next source"
                );
                first_err.get_or_insert(e);
            }
        }
    }

    Err(first_err.unwrap_or_else(|| ProviderError::InvalidSymbol(symbol)))
}
