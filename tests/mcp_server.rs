//! MCP server integration tests.
//!
//! Verifies tool registration, parameter validation (garde), error shaping,
//! and MCP protocol round-trips. No network access: every test exercises the
//! protocol surface or a validation failure path.

use std::sync::Arc;

use rmcp::model::CallToolRequestParams;
use rmcp::ServiceExt;
use serde_json::json;

use coinscope_mcp::data::coinpaprika::CoinPaprikaClient;
use coinscope_mcp::data::geckoterminal::GeckoTerminalClient;
use coinscope_mcp::data::provider::MarketDataProvider;
use coinscope_mcp::server::CoinscopeServer;

// ─── Test Helpers ────────────────────────────────────────────────────────────

/// Server with no API key configured (free tier, no network traffic issued).
fn make_test_server() -> CoinscopeServer {
    let provider = MarketDataProvider::new(
        CoinPaprikaClient::new(None).unwrap(),
        GeckoTerminalClient::new().unwrap(),
    );
    CoinscopeServer::new(Arc::new(provider))
}

type TestClient = rmcp::service::RunningService<rmcp::service::RoleClient, ()>;

/// Wire the server and a client together over in-memory duplex pipes.
async fn connect(server: CoinscopeServer) -> TestClient {
    let (server_tx, server_rx) = tokio::io::duplex(65536);
    let (client_tx, client_rx) = tokio::io::duplex(65536);

    tokio::spawn(async move {
        server
            .serve((client_rx, server_tx))
            .await
            .unwrap()
            .waiting()
            .await
            .unwrap()
    });
    ().serve((server_rx, client_tx)).await.unwrap()
}

async fn call(
    client: &TestClient,
    name: &str,
    arguments: serde_json::Value,
) -> rmcp::model::CallToolResult {
    client
        .peer()
        .call_tool(CallToolRequestParams {
            meta: None,
            name: name.to_string().into(),
            arguments: Some(serde_json::from_value(arguments).unwrap()),
            task: None,
        })
        .await
        .unwrap()
}

fn result_text(result: &rmcp::model::CallToolResult) -> String {
    result
        .content
        .first()
        .and_then(|c| c.raw.as_text())
        .map(|t| t.text.clone())
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Category 1: Server Initialization
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn server_info_has_correct_metadata() {
    use rmcp::ServerHandler;

    let server = make_test_server();
    let info = server.get_info();

    assert_eq!(info.server_info.name, "coinscope-mcp");
    assert_eq!(info.server_info.version, "0.1.0");
    assert!(info.capabilities.tools.is_some());
    let instructions = info.instructions.unwrap();
    assert!(instructions.contains("get_full_analysis"));
    assert!(instructions.contains("multi_timeframe_analysis"));
    assert!(instructions.contains("COINPAPRIKA_API_KEY"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tool_router_lists_all_sixteen_tools() {
    let client = connect(make_test_server()).await;

    let tools = client.list_all_tools().await.unwrap();
    let tool_names: Vec<String> = tools.iter().map(|t| t.name.to_string()).collect();

    assert_eq!(tools.len(), 16, "Expected 16 tools, got: {tool_names:?}");
    for expected in [
        "get_crypto_price",
        "get_technical_indicators",
        "detect_chart_patterns",
        "get_support_resistance",
        "get_trading_signals",
        "get_full_analysis",
        "multi_timeframe_analysis",
        "get_token_liquidity",
        "search_tokens_by_network",
        "compare_dex_prices",
        "get_network_pools",
        "get_dex_info",
        "get_pool_analytics",
        "get_pool_ohlcv",
        "get_available_networks",
        "search_tokens_advanced",
    ] {
        assert!(
            tool_names.contains(&expected.to_string()),
            "Missing tool: {expected}"
        );
    }

    client.cancel().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tool_schemas_declare_required_arguments() {
    let client = connect(make_test_server()).await;
    let tools = client.list_all_tools().await.unwrap();

    let price = tools
        .iter()
        .find(|t| t.name == "get_crypto_price")
        .expect("price tool registered");
    let schema = serde_json::to_value(&price.input_schema).unwrap();
    let required: Vec<String> = schema["required"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert!(required.contains(&"symbol".to_string()));

    let ohlcv = tools
        .iter()
        .find(|t| t.name == "get_pool_ohlcv")
        .expect("pool ohlcv tool registered");
    let schema = serde_json::to_value(&ohlcv.input_schema).unwrap();
    let required: Vec<String> = schema["required"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    for field in ["network", "pool_address", "start_date"] {
        assert!(
            required.contains(&field.to_string()),
            "Missing required field: {field}"
        );
    }

    client.cancel().await.unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Category 2: Parameter Validation — Garde Rejection
// ═══════════════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn price_rejects_empty_symbol() {
    let client = connect(make_test_server()).await;

    let result = call(&client, "get_crypto_price", json!({"symbol": ""})).await;
    assert!(result.is_error.unwrap_or(false));
    let text = result_text(&result);
    assert!(
        text.contains("Validation error"),
        "Expected validation error, got: {text}"
    );

    client.cancel().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn price_rejects_invalid_symbol_chars() {
    let client = connect(make_test_server()).await;

    let result = call(&client, "get_crypto_price", json!({"symbol": "../etc"})).await;
    assert!(result.is_error.unwrap_or(false));
    assert!(result_text(&result).contains("Validation error"));

    client.cancel().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pool_ohlcv_rejects_malformed_date() {
    let client = connect(make_test_server()).await;

    let result = call(
        &client,
        "get_pool_ohlcv",
        json!({
            "network": "eth",
            "pool_address": "0xabc",
            "start_date": "01/15/2024"
        }),
    )
    .await;
    assert!(result.is_error.unwrap_or(false));
    assert!(result_text(&result).contains("Validation error"));

    client.cancel().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn network_token_search_rejects_zero_limit() {
    let client = connect(make_test_server()).await;

    let result = call(
        &client,
        "search_tokens_by_network",
        json!({"network": "eth", "limit": 0}),
    )
    .await;
    assert!(result.is_error.unwrap_or(false));
    assert!(result_text(&result).contains("Validation error"));

    client.cancel().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn indicators_reject_unknown_timeframe() {
    let client = connect(make_test_server()).await;

    // An unrecognized timeframe string fails enum deserialization before the
    // tool body runs.
    let outcome = client
        .peer()
        .call_tool(CallToolRequestParams {
            meta: None,
            name: "get_technical_indicators".into(),
            arguments: Some(
                serde_json::from_value(json!({"symbol": "BTC", "timeframe": "yearly"})).unwrap(),
            ),
            task: None,
        })
        .await;

    match outcome {
        Ok(result) => assert!(result.is_error.unwrap_or(false)),
        Err(_) => {} // invalid-params surfaced at the protocol layer
    }

    client.cancel().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_tool_is_rejected() {
    let client = connect(make_test_server()).await;

    let outcome = client
        .peer()
        .call_tool(CallToolRequestParams {
            meta: None,
            name: "get_order_book".into(),
            arguments: None,
            task: None,
        })
        .await;
    assert!(outcome.is_err(), "unknown tool must fail at the router");

    client.cancel().await.unwrap();
}
