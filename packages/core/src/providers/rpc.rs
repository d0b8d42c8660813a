//! Minimal JSON-RPC 2.0 client over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::providers::types::{RpcEndpoint, Transport};
use crate::types::AmountOfToken;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

pub struct JsonRpcClient {
    http: Client,
    endpoint: RpcEndpoint,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(http: Client, endpoint: RpcEndpoint) -> Result<Self> {
        if endpoint.transport != Transport::Http {
            return Err(Error::UnsupportedOperation {
                operation: "json-rpc over web socket",
                chain_id: endpoint.chain_id,
            });
        }
        Ok(Self {
            http,
            endpoint,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &RpcEndpoint {
        &self.endpoint
    }

    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response: JsonRpcResponse = self
            .http
            .post(self.endpoint.url.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(Error::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        let result = response
            .result
            .ok_or_else(|| Error::format(format!("{} returned no result", method)))?;
        serde_json::from_value(result)
            .map_err(|err| Error::format(format!("unexpected {} result: {}", method, err)))
    }

    pub async fn gas_price(&self) -> Result<AmountOfToken> {
        let raw: String = self.request("eth_gasPrice", json!([])).await?;
        parse_quantity(&raw)
    }

    pub async fn max_priority_fee_per_gas(&self) -> Result<AmountOfToken> {
        let raw: String = self.request("eth_maxPriorityFeePerGas", json!([])).await?;
        parse_quantity(&raw)
    }

    /// Base fee of the latest block, `None` on chains without EIP-1559.
    pub async fn latest_base_fee(&self) -> Result<Option<AmountOfToken>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Block {
            base_fee_per_gas: Option<String>,
        }

        let block: Block = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        block
            .base_fee_per_gas
            .as_deref()
            .map(parse_quantity)
            .transpose()
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(raw: &str) -> Result<AmountOfToken> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| Error::format(format!("'{}' is not a hex quantity", raw)))?;
    if digits.is_empty() {
        return Ok(0);
    }
    AmountOfToken::from_str_radix(digits, 16)
        .map_err(|err| Error::format(format!("'{}' is not a hex quantity: {}", raw, err)))
}
