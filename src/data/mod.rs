//! Typed data-provider layer: symbol resolution, candle and ticker fetching,
//! dual-source fallback, and TTL caching.

pub mod cache;
pub mod coinpaprika;
pub mod error;
pub mod geckoterminal;
pub mod provider;

use async_trait::async_trait;

use crate::types::{Candle, PriceSnapshot, Timeframe};
use error::ProviderError;

/// Capability set shared by both upstream quote sources. The provider
/// composes implementations in a fixed fallback order; ids are opaque to it
/// (a coin id for the primary, `network:pool` for the secondary).
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolve an upper-cased ticker symbol to a source-specific id.
    async fn resolve(&self, symbol: &str) -> Result<String, ProviderError>;

    /// Fetch the current ticker for a previously resolved id.
    async fn fetch_ticker(&self, id: &str, symbol: &str)
        -> Result<PriceSnapshot, ProviderError>;

    /// Fetch the most recent `periods` OHLCV bars at `timeframe`.
    async fn fetch_ohlcv(
        &self,
        id: &str,
        timeframe: Timeframe,
        periods: usize,
    ) -> Result<Vec<Candle>, ProviderError>;
}

/// Absolute 24 h change derived from the current price and the upstream
/// percent change: `price − price/(1 + pct/100)`.
pub(crate) fn absolute_change_24h(price: f64, pct: f64) -> Option<f64> {
    let denom = 1.0 + pct / 100.0;
    if denom == 0.0 {
        return None;
    }
    Some(price - price / denom)
}
