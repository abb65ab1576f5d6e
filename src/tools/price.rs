use anyhow::Result;

use crate::data::provider::MarketDataProvider;
use crate::types::PriceSnapshot;

pub async fn execute(provider: &MarketDataProvider, symbol: &str) -> Result<PriceSnapshot> {
    Ok(provider.snapshot(symbol).await?)
}
