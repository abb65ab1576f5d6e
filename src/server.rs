use garde::Validate;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Json, wrapper::Parameters},
    model::{Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

use crate::data::provider::MarketDataProvider;
use crate::tools;
use crate::tools::full_analysis::{new_cache, AnalysisCache};
use crate::tools::response_types::{
    DexListResponse, DexPricesResponse, FullAnalysisResponse, IndicatorsResponse,
    LevelsResponse, LiquidityResponse, MultiTimeframeResponse, NetworkTokensResponse,
    NetworksResponse, PatternsResponse, PoolAnalyticsResponse, PoolOhlcvResponse, PoolsResponse,
    SignalResponse, TokenSearchResponse,
};
use crate::types::{PriceSnapshot, RiskLevel, Timeframe};

#[derive(Clone)]
pub struct CoinscopeServer {
    provider: Arc<MarketDataProvider>,
    analysis_cache: Arc<AnalysisCache>,
    tool_router: ToolRouter<Self>,
}

impl CoinscopeServer {
    pub fn new(provider: Arc<MarketDataProvider>) -> Self {
        Self {
            provider,
            analysis_cache: Arc::new(new_cache()),
            tool_router: Self::tool_router(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tool parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct PriceParams {
    /// Ticker symbol (e.g. "BTC", "ETH")
    #[garde(length(min = 1, max = 20), pattern(r"^[A-Za-z0-9$._-]+$"))]
    pub symbol: String,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct IndicatorsParams {
    /// Ticker symbol (e.g. "BTC", "ETH")
    #[garde(length(min = 1, max = 20), pattern(r"^[A-Za-z0-9$._-]+$"))]
    pub symbol: String,
    /// Timeframe: "4h", "daily" (default), "weekly" or "monthly"
    #[garde(skip)]
    pub timeframe: Option<Timeframe>,
    /// Indicators to compute (sma, ema, rsi, macd, bollinger, stochastic,
    /// williams_r, obv). Omit for the full suite.
    #[garde(skip)]
    pub indicators: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct TimeframedParams {
    /// Ticker symbol (e.g. "BTC", "ETH")
    #[garde(length(min = 1, max = 20), pattern(r"^[A-Za-z0-9$._-]+$"))]
    pub symbol: String,
    /// Timeframe: "4h", "daily" (default), "weekly" or "monthly"
    #[garde(skip)]
    pub timeframe: Option<Timeframe>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct SignalsParams {
    /// Ticker symbol (e.g. "BTC", "ETH")
    #[garde(length(min = 1, max = 20), pattern(r"^[A-Za-z0-9$._-]+$"))]
    pub symbol: String,
    /// Risk appetite: "conservative", "moderate" (default) or "aggressive"
    #[garde(skip)]
    pub risk_level: Option<RiskLevel>,
    /// Timeframe: "4h", "daily" (default), "weekly" or "monthly"
    #[garde(skip)]
    pub timeframe: Option<Timeframe>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct MultiTimeframeParams {
    /// Ticker symbol (e.g. "BTC", "ETH")
    #[garde(length(min = 1, max = 20), pattern(r"^[A-Za-z0-9$._-]+$"))]
    pub symbol: String,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct LiquidityParams {
    /// Ticker symbol (e.g. "WETH", "PEPE")
    #[garde(length(min = 1, max = 20), pattern(r"^[A-Za-z0-9$._-]+$"))]
    pub symbol: String,
    /// Restrict to one network (e.g. "eth", "solana"); omit for all
    #[garde(inner(length(min = 1, max = 50), pattern(r"^[A-Za-z0-9_-]+$")))]
    pub network: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct NetworkTokensParams {
    /// Network id (e.g. "eth", "solana", "bsc")
    #[garde(length(min = 1, max = 50), pattern(r"^[A-Za-z0-9_-]+$"))]
    pub network: String,
    /// Token symbol or name to search for; omit to list by volume
    #[garde(inner(length(min = 1, max = 50)))]
    pub query: Option<String>,
    /// Maximum tokens returned (default 10)
    #[garde(inner(range(min = 1, max = 50)))]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct DexPricesParams {
    /// Ticker symbol (e.g. "WETH")
    #[garde(length(min = 1, max = 20), pattern(r"^[A-Za-z0-9$._-]+$"))]
    pub symbol: String,
    /// Network id (e.g. "eth")
    #[garde(length(min = 1, max = 50), pattern(r"^[A-Za-z0-9_-]+$"))]
    pub network: String,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct NetworkPoolsParams {
    /// Network id (e.g. "eth", "solana")
    #[garde(length(min = 1, max = 50), pattern(r"^[A-Za-z0-9_-]+$"))]
    pub network: String,
    /// "volume" (default) or "transactions"
    #[garde(inner(length(min = 1, max = 20)))]
    pub sort_by: Option<String>,
    /// Maximum pools returned (default 10)
    #[garde(inner(range(min = 1, max = 50)))]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct NetworkParams {
    /// Network id (e.g. "eth", "solana")
    #[garde(length(min = 1, max = 50), pattern(r"^[A-Za-z0-9_-]+$"))]
    pub network: String,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct PoolAnalyticsParams {
    /// Network id (e.g. "eth")
    #[garde(length(min = 1, max = 50), pattern(r"^[A-Za-z0-9_-]+$"))]
    pub network: String,
    /// Pool contract address
    #[garde(length(min = 1, max = 120), pattern(r"^[A-Za-z0-9:._-]+$"))]
    pub pool_address: String,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct PoolOhlcvParams {
    /// Network id (e.g. "eth")
    #[garde(length(min = 1, max = 50), pattern(r"^[A-Za-z0-9_-]+$"))]
    pub network: String,
    /// Pool contract address
    #[garde(length(min = 1, max = 120), pattern(r"^[A-Za-z0-9:._-]+$"))]
    pub pool_address: String,
    /// Window start (YYYY-MM-DD)
    #[garde(pattern(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$"))]
    pub start_date: String,
    /// Window end (YYYY-MM-DD); defaults to today
    #[garde(inner(pattern(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$")))]
    pub end_date: Option<String>,
    /// Bar size: 1m, 5m, 15m, 1h, 4h, 12h or 1d (default)
    #[garde(inner(length(min = 1, max = 5)))]
    pub interval: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct TokenSearchParams {
    /// Token symbol or name to search for
    #[garde(length(min = 1, max = 50))]
    pub query: String,
    /// Keep only tokens with at least this much pooled liquidity (USD)
    #[garde(inner(range(min = 0.0)))]
    pub min_liquidity: Option<f64>,
    /// Keep only tokens with at least this much 24h volume (USD)
    #[garde(inner(range(min = 0.0)))]
    pub min_volume: Option<f64>,
    /// Maximum tokens returned (default 10)
    #[garde(inner(range(min = 1, max = 50)))]
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

#[tool_router]
impl CoinscopeServer {
    /// Current price snapshot for a cryptocurrency.
    ///
    /// Resolves the symbol against the market aggregator first and falls back
    /// to DEX pools for tokens it does not list. Includes 24h change, volume,
    /// market cap, rank, percent changes across nine horizons and the
    /// all-time high where available. Snapshots are cached for 60 seconds.
    #[tool(name = "get_crypto_price", annotations(read_only_hint = true, open_world_hint = true))]
    async fn get_crypto_price(
        &self,
        Parameters(params): Parameters<PriceParams>,
    ) -> Result<Json<PriceSnapshot>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::price::execute(&self.provider, &params.symbol)
            .await
            .map(Json)
            .map_err(|e| format!("Error: {e}"))
    }

    /// Technical indicators for a symbol at one timeframe.
    ///
    /// Computes SMA, EMA, RSI, MACD, Bollinger bands, Stochastic, Williams %R
    /// and OBV over the recent candle window and returns the latest value of
    /// each with a per-indicator verdict plus a weighted composite. Pass
    /// `indicators` to restrict the suite. Intraday timeframes require the
    /// paid market-data tier.
    #[tool(name = "get_technical_indicators", annotations(read_only_hint = true, open_world_hint = true))]
    async fn get_technical_indicators(
        &self,
        Parameters(params): Parameters<IndicatorsParams>,
    ) -> Result<Json<IndicatorsResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::indicators::execute(
            &self.provider,
            &params.symbol,
            params.timeframe.unwrap_or_default(),
            params.indicators.as_deref(),
        )
        .await
        .map(Json)
        .map_err(|e| format!("Error: {e}"))
    }

    /// Chart and candlestick pattern detection.
    ///
    /// Scans the candle window for head & shoulders, double/triple tops and
    /// bottoms, triangles, wedges, rectangles and one-to-three-bar
    /// candlestick patterns. Results are sorted by confidence and carry key
    /// points plus measured targets where the geometry implies one.
    #[tool(name = "detect_chart_patterns", annotations(read_only_hint = true, open_world_hint = true))]
    async fn detect_chart_patterns(
        &self,
        Parameters(params): Parameters<TimeframedParams>,
    ) -> Result<Json<PatternsResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::patterns::execute(
            &self.provider,
            &params.symbol,
            params.timeframe.unwrap_or_default(),
        )
        .await
        .map(Json)
        .map_err(|e| format!("Error: {e}"))
    }

    /// Support and resistance levels.
    ///
    /// Consolidates levels from pivot clustering, the volume profile,
    /// Fibonacci retracements and round-number psychology, split around the
    /// current price with the nearest of each side called out. Sloped trend
    /// lines fitted through pivots are included.
    #[tool(name = "get_support_resistance", annotations(read_only_hint = true, open_world_hint = true))]
    async fn get_support_resistance(
        &self,
        Parameters(params): Parameters<TimeframedParams>,
    ) -> Result<Json<LevelsResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::levels::execute(
            &self.provider,
            &params.symbol,
            params.timeframe.unwrap_or_default(),
        )
        .await
        .map(Json)
        .map_err(|e| format!("Error: {e}"))
    }

    /// Aggregated trading signal with entry, stop and target.
    ///
    /// Combines the indicator composite, pattern votes above the risk
    /// threshold and level proximity into one verdict with a confidence and
    /// a written rationale. Conservative risk only admits patterns at 80%+
    /// confidence, moderate 60%+, aggressive 40%+.
    #[tool(name = "get_trading_signals", annotations(read_only_hint = true, open_world_hint = true))]
    async fn get_trading_signals(
        &self,
        Parameters(params): Parameters<SignalsParams>,
    ) -> Result<Json<SignalResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::signals::execute(
            &self.provider,
            &params.symbol,
            params.timeframe.unwrap_or_default(),
            params.risk_level.unwrap_or_default(),
        )
        .await
        .map(Json)
        .map_err(|e| format!("Error: {e}"))
    }

    /// Everything at once: price, indicators, patterns, levels and signal.
    ///
    /// One pipeline run combining the other analysis tools plus a summary
    /// and recommendations. Results are memoized for 120 seconds per
    /// (symbol, timeframe, risk) so follow-up questions are cheap.
    #[tool(name = "get_full_analysis", annotations(read_only_hint = true, open_world_hint = true))]
    async fn get_full_analysis(
        &self,
        Parameters(params): Parameters<SignalsParams>,
    ) -> Result<Json<FullAnalysisResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::full_analysis::execute(
            self.provider.clone(),
            &self.analysis_cache,
            &params.symbol,
            params.timeframe.unwrap_or_default(),
            params.risk_level.unwrap_or_default(),
        )
        .await
        .map(Json)
        .map_err(|e| format!("Error: {e}"))
    }

    /// Trend alignment across the 4h, daily, weekly and monthly timeframes.
    ///
    /// Runs the full analysis on all four timeframes concurrently and
    /// reports per-timeframe trend, signal and confidence with an alignment
    /// summary. A timeframe that fails (e.g. intraday on the free tier) is
    /// omitted instead of failing the call.
    #[tool(name = "multi_timeframe_analysis", annotations(read_only_hint = true, open_world_hint = true))]
    async fn multi_timeframe_analysis(
        &self,
        Parameters(params): Parameters<MultiTimeframeParams>,
    ) -> Result<Json<MultiTimeframeResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::multi_timeframe::execute(
            self.provider.clone(),
            &self.analysis_cache,
            &params.symbol,
        )
        .await
        .map(Json)
        .map_err(|e| format!("Error: {e}"))
    }

    /// Total on-chain liquidity for a token across its pools.
    #[tool(name = "get_token_liquidity", annotations(read_only_hint = true, open_world_hint = true))]
    async fn get_token_liquidity(
        &self,
        Parameters(params): Parameters<LiquidityParams>,
    ) -> Result<Json<LiquidityResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::dex::token_liquidity(
            self.provider.gecko(),
            &params.symbol,
            params.network.as_deref(),
        )
        .await
        .map(Json)
        .map_err(|e| format!("Error: {e}"))
    }

    /// Tokens on one network, aggregated across their pools.
    #[tool(name = "search_tokens_by_network", annotations(read_only_hint = true, open_world_hint = true))]
    async fn search_tokens_by_network(
        &self,
        Parameters(params): Parameters<NetworkTokensParams>,
    ) -> Result<Json<NetworkTokensResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::dex::tokens_by_network(
            self.provider.gecko(),
            &params.network,
            params.query.as_deref(),
            params.limit,
        )
        .await
        .map(Json)
        .map_err(|e| format!("Error: {e}"))
    }

    /// Per-DEX prices for a token on one network with best/worst/spread.
    #[tool(name = "compare_dex_prices", annotations(read_only_hint = true, open_world_hint = true))]
    async fn compare_dex_prices(
        &self,
        Parameters(params): Parameters<DexPricesParams>,
    ) -> Result<Json<DexPricesResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::dex::compare_prices(self.provider.gecko(), &params.symbol, &params.network)
            .await
            .map(Json)
            .map_err(|e| format!("Error: {e}"))
    }

    /// Top pools on a network, sorted by volume or transaction count.
    #[tool(name = "get_network_pools", annotations(read_only_hint = true, open_world_hint = true))]
    async fn get_network_pools(
        &self,
        Parameters(params): Parameters<NetworkPoolsParams>,
    ) -> Result<Json<PoolsResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::dex::network_pools(
            self.provider.gecko(),
            &params.network,
            params.sort_by.as_deref(),
            params.limit,
        )
        .await
        .map(Json)
        .map_err(|e| format!("Error: {e}"))
    }

    /// DEXes available on a network.
    #[tool(name = "get_dex_info", annotations(read_only_hint = true, open_world_hint = true))]
    async fn get_dex_info(
        &self,
        Parameters(params): Parameters<NetworkParams>,
    ) -> Result<Json<DexListResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::dex::dex_info(self.provider.gecko(), &params.network)
            .await
            .map(Json)
            .map_err(|e| format!("Error: {e}"))
    }

    /// Full detail for one liquidity pool.
    #[tool(name = "get_pool_analytics", annotations(read_only_hint = true, open_world_hint = true))]
    async fn get_pool_analytics(
        &self,
        Parameters(params): Parameters<PoolAnalyticsParams>,
    ) -> Result<Json<PoolAnalyticsResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::dex::pool_analytics(
            self.provider.gecko(),
            &params.network,
            &params.pool_address,
        )
        .await
        .map(Json)
        .map_err(|e| format!("Error: {e}"))
    }

    /// OHLCV series for one pool over a date window, with statistics.
    #[tool(name = "get_pool_ohlcv", annotations(read_only_hint = true, open_world_hint = true))]
    async fn get_pool_ohlcv(
        &self,
        Parameters(params): Parameters<PoolOhlcvParams>,
    ) -> Result<Json<PoolOhlcvResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::dex::pool_ohlcv(
            self.provider.gecko(),
            &params.network,
            &params.pool_address,
            &params.start_date,
            params.end_date.as_deref(),
            params.interval.as_deref(),
        )
        .await
        .map(Json)
        .map_err(|e| format!("Error: {e}"))
    }

    /// Networks the DEX aggregator covers.
    #[tool(name = "get_available_networks", annotations(read_only_hint = true, open_world_hint = true))]
    async fn get_available_networks(&self) -> Result<Json<NetworksResponse>, String> {
        tools::dex::networks(self.provider.gecko())
            .await
            .map(Json)
            .map_err(|e| format!("Error: {e}"))
    }

    /// Token search across all networks with liquidity/volume floors.
    #[tool(name = "search_tokens_advanced", annotations(read_only_hint = true, open_world_hint = true))]
    async fn search_tokens_advanced(
        &self,
        Parameters(params): Parameters<TokenSearchParams>,
    ) -> Result<Json<TokenSearchResponse>, String> {
        params
            .validate()
            .map_err(|e| format!("Validation error: {e}"))?;
        tools::dex::search_tokens(
            self.provider.gecko(),
            &params.query,
            params.min_liquidity,
            params.min_volume,
            params.limit,
        )
        .await
        .map(Json)
        .map_err(|e| format!("Error: {e}"))
    }
}

#[tool_handler]
impl ServerHandler for CoinscopeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "coinscope-mcp".into(),
                title: Some("Coinscope Crypto Technical Analysis".into()),
                version: "0.1.0".into(),
                description: Some(
                    "Cryptocurrency technical-analysis engine: indicators, chart patterns, \
                     support/resistance, composite trading signals and on-chain DEX analytics"
                        .into(),
                ),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Cryptocurrency technical analysis over live market data.\
                \n\nTypical workflow:\
                \n1. get_crypto_price({ symbol }) — current snapshot with 24h change, \
                volume, market cap and ATH. Falls back to DEX pools for long-tail tokens.\
                \n2. get_technical_indicators({ symbol, timeframe?, indicators? }) — \
                latest SMA/EMA/RSI/MACD/Bollinger/Stochastic/Williams %R/OBV values with \
                per-indicator verdicts and a weighted composite.\
                \n3. detect_chart_patterns({ symbol, timeframe? }) — head & shoulders, \
                double/triple tops and bottoms, triangles, wedges, rectangles and \
                candlestick patterns, each with confidence and measured targets.\
                \n4. get_support_resistance({ symbol, timeframe? }) — consolidated levels \
                from pivots, volume profile, Fibonacci and round numbers, plus trend lines.\
                \n5. get_trading_signals({ symbol, risk_level?, timeframe? }) — one \
                aggregated verdict with entry, stop, target and reasoning.\
                \n6. get_full_analysis({ symbol, timeframe?, risk_level? }) — all of the \
                above in one response (cached 120 s).\
                \n7. multi_timeframe_analysis({ symbol }) — 4h/daily/weekly/monthly \
                alignment; failed timeframes are omitted.\
                \n\nOn-chain tools (DEX aggregator): get_token_liquidity, \
                search_tokens_by_network, compare_dex_prices, get_network_pools, \
                get_dex_info, get_pool_analytics, get_pool_ohlcv, \
                get_available_networks, search_tokens_advanced.\
                \n\nTimeframes: 4h, daily (default), weekly, monthly. Intraday (4h) \
                candles need a COINPAPRIKA_API_KEY; without one the upstream answers 402 \
                and the tool reports a payment-required error. Risk levels: conservative, \
                moderate (default), aggressive — the minimum pattern confidence admitted \
                into the signal."
                    .into(),
            ),
        }
    }
}
