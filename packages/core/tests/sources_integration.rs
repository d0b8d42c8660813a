//! Remote sources against mocked upstream APIs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use source_aggregator::{
    error::Error,
    gas::sources::{EtherscanGasPriceSource, RpcGasPriceSource},
    gas::{GasPrice, GasPriceRequest, GasPriceSource, GasSpeed},
    prices::{sources::DefiLlamaPriceSource, PriceSource},
    providers::sources::HttpProviderSource,
    quotes::{
        ApiSourceList, QuoteOrder, QuoteRequest, QuoteResponse, QuoteSourceList,
        QuoteSourceSupport, SourceMetadata,
    },
    types::NATIVE_TOKEN,
};

// ---- Helpers ----------------------------------------------------------------

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

async fn mount_rpc(server: &MockServer, rpc_method: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(response)
        .mount(server)
        .await;
}

fn rpc_source(server: &MockServer) -> RpcGasPriceSource {
    let providers = HttpProviderSource::new(&server.uri(), &[1]).unwrap();
    RpcGasPriceSource::new(Arc::new(providers), reqwest::Client::new())
}

fn etherscan_source(server: &MockServer) -> EtherscanGasPriceSource {
    EtherscanGasPriceSource::new(reqwest::Client::new(), HashMap::from([(1, "KEY".to_string())]))
        .with_endpoints(HashMap::from([(1, format!("{}/api", server.uri()))]))
}

// ---- Etherscan gas oracle ---------------------------------------------------

#[tokio::test]
async fn etherscan_oracle_is_converted_to_wei() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("action", "gasoracle"))
        .and(query_param("apikey", "KEY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "1",
            "message": "OK",
            "result": {
                "SafeGasPrice": "10",
                "ProposeGasPrice": "12",
                "FastGasPrice": "15",
                "suggestBaseFee": "9"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let prices = etherscan_source(&server)
        .get_gas_price(&GasPriceRequest::new(1))
        .await
        .unwrap();

    assert!(prices.is_eip1559());
    assert_eq!(
        prices.get(GasSpeed::Fast),
        Some(GasPrice::eip1559(12_000_000_000, 3_000_000_000))
    );
}

#[tokio::test]
async fn etherscan_rate_limit_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "0",
            "message": "NOTOK",
            "result": "Max rate limit reached"
        })))
        .mount(&server)
        .await;

    let err = etherscan_source(&server)
        .get_gas_price(&GasPriceRequest::new(1))
        .await
        .unwrap_err();
    assert_eq!(err, Error::RateLimitExceeded);
}

// ---- RPC gas source ---------------------------------------------------------

#[tokio::test]
async fn rpc_source_doubles_base_fee_and_adds_tip() {
    let server = MockServer::start().await;
    mount_rpc(
        &server,
        "eth_getBlockByNumber",
        rpc_result(json!({ "number": "0x10", "baseFeePerGas": "0x3b9aca00" })),
    )
    .await;
    mount_rpc(&server, "eth_maxPriorityFeePerGas", rpc_result(json!("0x77359400"))).await;

    let prices = rpc_source(&server)
        .get_gas_price(&GasPriceRequest::new(1))
        .await
        .unwrap();

    assert_eq!(
        prices.get(GasSpeed::Standard),
        Some(GasPrice::eip1559(4_000_000_000, 2_000_000_000))
    );
    assert_eq!(prices.get(GasSpeed::Fast), None);
}

#[tokio::test]
async fn rpc_source_falls_back_to_gas_price_without_base_fee() {
    let server = MockServer::start().await;
    mount_rpc(&server, "eth_getBlockByNumber", rpc_result(json!({ "number": "0x10" }))).await;
    mount_rpc(&server, "eth_gasPrice", rpc_result(json!("0x4a817c800"))).await;

    let prices = rpc_source(&server)
        .get_gas_price(&GasPriceRequest::new(1))
        .await
        .unwrap();

    assert_eq!(
        prices.get(GasSpeed::Standard),
        Some(GasPrice::legacy(20_000_000_000))
    );
}

#[tokio::test]
async fn rpc_source_falls_back_when_priority_fee_is_unsupported() {
    let server = MockServer::start().await;
    mount_rpc(
        &server,
        "eth_getBlockByNumber",
        rpc_result(json!({ "baseFeePerGas": "0x3b9aca00" })),
    )
    .await;
    mount_rpc(
        &server,
        "eth_maxPriorityFeePerGas",
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32601, "message": "method not found" }
        })),
    )
    .await;
    mount_rpc(&server, "eth_gasPrice", rpc_result(json!("0x3b9aca00"))).await;

    let prices = rpc_source(&server)
        .get_gas_price(&GasPriceRequest::new(1))
        .await
        .unwrap();

    assert_eq!(prices.get(GasSpeed::Standard), Some(GasPrice::legacy(1_000_000_000)));
}

// ---- DefiLlama --------------------------------------------------------------

#[tokio::test]
async fn defi_llama_current_prices_are_keyed_by_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/prices/current/coingecko:ethereum,ethereum:0xabc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "coins": {
                "coingecko:ethereum": { "price": 1800.5, "timestamp": 1700000000, "symbol": "ETH" },
                "ethereum:0xabc": { "price": 1.01, "timestamp": 1700000005, "decimals": 6 }
            }
        })))
        .mount(&server)
        .await;

    let source = DefiLlamaPriceSource::new(reqwest::Client::new()).with_base_url(server.uri());
    let tokens = HashMap::from([(1, vec![NATIVE_TOKEN.to_string(), "0xABC".to_string()])]);
    let prices = source.get_current_prices(&tokens, None).await.unwrap();

    assert_eq!(prices[&1][NATIVE_TOKEN].price, 1800.5);
    assert_eq!(prices[&1]["0xABC"].closest_timestamp, 1700000005);
}

#[tokio::test]
async fn defi_llama_historical_prices_send_search_width() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/prices/historical/1690000000/coingecko:ethereum"))
        .and(query_param("searchWidth", "4h"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "coins": {
                "coingecko:ethereum": { "price": 1900.0, "timestamp": 1690000100 }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = DefiLlamaPriceSource::new(reqwest::Client::new()).with_base_url(server.uri());
    let tokens = HashMap::from([(10, vec![NATIVE_TOKEN.to_string()])]);
    let prices = source
        .get_historical_prices(&tokens, 1690000000, Some(Duration::from_secs(4 * 3600)), None)
        .await
        .unwrap();

    assert_eq!(prices[&10][NATIVE_TOKEN].price, 1900.0);
}

// ---- Quote API --------------------------------------------------------------

fn metadata() -> SourceMetadata {
    SourceMetadata {
        name: "Uniswap".to_string(),
        logo_uri: "https://example.org/uni.svg".to_string(),
        supports: QuoteSourceSupport {
            chains: vec![1],
            buy_orders: true,
            swap_and_transfer: true,
        },
    }
}

fn quote_request(source_ids: &[&str]) -> QuoteRequest {
    QuoteRequest {
        chain_id: 1,
        sell_token: "0xsell".to_string(),
        buy_token: "0xbuy".to_string(),
        order: QuoteOrder::Sell { sell_amount: 1000 },
        slippage_percentage: 0.5,
        taker_address: "0xtaker".to_string(),
        recipient: None,
        estimate_buy_orders_with_sell_only_sources: None,
        source_ids: source_ids.iter().map(|id| id.to_string()).collect(),
        quote_timeout: Some(Duration::from_secs(3)),
    }
}

#[tokio::test]
async fn api_source_list_posts_one_request_per_source() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/quotes/1"))
        .and(body_partial_json(json!({
            "chainId": 1,
            "order": { "type": "sell", "sellAmount": "1000" },
            "sourceIds": ["uniswap"],
            "quoteTimeout": 2900
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "source": "uniswap",
            "quote": {
                "sellAmount": "1000",
                "buyAmount": "990",
                "maxSellAmount": "1000",
                "minBuyAmount": "985",
                "estimatedGas": 150000,
                "allowanceTarget": "0xspender",
                "tx": { "to": "0xrouter", "calldata": "0x", "value": "0" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let base = server.uri();
    let list = ApiSourceList::new(
        reqwest::Client::new(),
        Arc::new(move |request: &QuoteRequest| format!("{}/quotes/{}", base, request.chain_id)),
        HashMap::from([("uniswap".to_string(), metadata())]),
    );

    let responses = list
        .get_quotes(&quote_request(&["uniswap", "paraswap"]))
        .await
        .unwrap();

    assert_eq!(responses.len(), 2);
    assert!(responses[0].is_success());
    assert_eq!(
        responses[1],
        QuoteResponse::failure("paraswap", "Source not supported by this list")
    );
}

#[tokio::test]
async fn api_source_list_reports_server_errors_as_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let base = server.uri();
    let list = ApiSourceList::new(
        reqwest::Client::new(),
        Arc::new(move |_: &QuoteRequest| base.clone()),
        HashMap::from([("uniswap".to_string(), metadata())]),
    );

    let responses = list.get_quotes(&quote_request(&["uniswap"])).await.unwrap();
    assert_eq!(responses.len(), 1);
    assert!(!responses[0].is_success());
    assert_eq!(responses[0].source(), "uniswap");
}
