use anyhow::Result;
use rmcp::ServiceExt;
use std::sync::Arc;
use tracing_subscriber::{self, EnvFilter};

use coinscope_mcp::data::provider::MarketDataProvider;
use coinscope_mcp::server::CoinscopeServer;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // --debug turns on stderr debug logging; otherwise RUST_LOG decides and
    // silence is the default.
    let debug = std::env::args().any(|arg| arg == "--debug");
    let filter = if debug {
        EnvFilter::new("coinscope_mcp=debug,rmcp=info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let provider = Arc::new(MarketDataProvider::from_env()?);
    if provider.has_api_key() {
        tracing::info!("CoinPaprika pro tier configured (intraday timeframes enabled)");
    } else {
        tracing::info!("No COINPAPRIKA_API_KEY set; running on the free tier (daily candles)");
    }

    if let Ok(port) = std::env::var("PORT") {
        // HTTP mode — used by cloud platforms
        use rmcp::transport::streamable_http_server::{
            session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
        };

        let service = StreamableHttpService::new(
            move || Ok(CoinscopeServer::new(provider.clone())),
            LocalSessionManager::default().into(),
            StreamableHttpServerConfig::default(),
        );

        let app = axum::Router::new()
            .nest_service("/mcp", service)
            .route("/health", axum::routing::get(|| async { "ok" }));

        let addr = format!("0.0.0.0:{port}");
        tracing::info!("Starting coinscope-mcp HTTP server on {addr}");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
    } else {
        // stdio mode — used for local development with MCP clients
        tracing::info!("Starting coinscope-mcp MCP server (stdio)");

        let server = CoinscopeServer::new(provider);
        let service = server.serve(rmcp::transport::stdio()).await?;
        service.waiting().await?;
    }

    Ok(())
}
