use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::gas::source::{GasPriceRequest, GasPriceSource};
use crate::gas::types::{GasPrice, GasPriceResult, GasSpeed};
use crate::support::{Field, SupportInChains, SupportRecord};
use crate::types::{chains, AmountOfToken, ChainId};

const EXPLORERS: &[(ChainId, &str)] = &[
    (chains::ETHEREUM, "etherscan.io"),
    (chains::POLYGON, "polygonscan.com"),
    (chains::BNB_CHAIN, "bscscan.com"),
    (chains::FANTOM, "ftmscan.com"),
];

const WEI_PER_GWEI: u64 = 1_000_000_000;

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: Value,
}

#[derive(Debug, Deserialize)]
struct GasOracle {
    #[serde(rename = "SafeGasPrice")]
    safe_gas_price: String,
    #[serde(rename = "ProposeGasPrice")]
    propose_gas_price: String,
    #[serde(rename = "FastGasPrice")]
    fast_gas_price: String,
    #[serde(rename = "suggestBaseFee")]
    suggest_base_fee: Option<String>,
}

/// Gas oracle of the Etherscan family of block explorers.
pub struct EtherscanGasPriceSource {
    http: Client,
    api_keys: HashMap<ChainId, String>,
    endpoints: HashMap<ChainId, String>,
}

impl EtherscanGasPriceSource {
    pub fn new(http: Client, api_keys: HashMap<ChainId, String>) -> Self {
        let endpoints = EXPLORERS
            .iter()
            .map(|(chain_id, host)| (*chain_id, format!("https://api.{}/api", host)))
            .collect();
        Self {
            http,
            api_keys,
            endpoints,
        }
    }

    /// Replace the API endpoints, e.g. to point at a proxy.
    pub fn with_endpoints(mut self, endpoints: HashMap<ChainId, String>) -> Self {
        self.endpoints = endpoints;
        self
    }
}

#[async_trait]
impl GasPriceSource for EtherscanGasPriceSource {
    fn name(&self) -> &str {
        "etherscan"
    }

    fn supported_speeds(&self) -> SupportInChains<GasSpeed> {
        self.endpoints
            .keys()
            .map(|chain_id| (*chain_id, SupportRecord::present(GasSpeed::ALL)))
            .collect()
    }

    async fn get_gas_price(&self, request: &GasPriceRequest) -> Result<GasPriceResult> {
        let endpoint = self
            .endpoints
            .get(&request.chain_id)
            .ok_or(Error::UnsupportedChain {
                chain_id: request.chain_id,
            })?;

        let mut query = vec![("module", "gastracker"), ("action", "gasoracle")];
        if let Some(key) = self.api_keys.get(&request.chain_id) {
            query.push(("apikey", key.as_str()));
        }
        let mut builder = self.http.get(endpoint).query(&query);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response: ExplorerResponse = builder.send().await?.error_for_status()?.json().await?;
        if response.status != "1" {
            let detail = response.result.as_str().unwrap_or(&response.message).to_string();
            if detail.to_ascii_lowercase().contains("rate limit") {
                return Err(Error::RateLimitExceeded);
            }
            return Err(Error::format(format!("gas oracle rejected the request: {}", detail)));
        }
        let oracle: GasOracle = serde_json::from_value(response.result)
            .map_err(|err| Error::format(format!("unexpected gas oracle payload: {}", err)))?;

        let base_fee = oracle
            .suggest_base_fee
            .as_deref()
            .map(gwei_to_wei)
            .transpose()?;
        Ok(GasPriceResult::from_mixed([
            (GasSpeed::Standard, to_gas_price(&oracle.safe_gas_price, base_fee)?),
            (GasSpeed::Fast, to_gas_price(&oracle.propose_gas_price, base_fee)?),
            (GasSpeed::Instant, to_gas_price(&oracle.fast_gas_price, base_fee)?),
        ]))
    }
}

/// With a base fee the oracle price is the max fee, and the priority fee is
/// whatever exceeds the base fee.
fn to_gas_price(gwei: &str, base_fee: Option<AmountOfToken>) -> Result<GasPrice> {
    let price = gwei_to_wei(gwei)?;
    Ok(match base_fee {
        Some(base_fee) => GasPrice::eip1559(price, price.saturating_sub(base_fee)),
        None => GasPrice::legacy(price),
    })
}

/// Convert a decimal gwei string such as `"21.5"` into wei.
pub fn gwei_to_wei(gwei: &str) -> Result<AmountOfToken> {
    let invalid = || Error::format(format!("'{}' is not a gwei amount", gwei));
    let amount = Decimal::from_str(gwei.trim()).map_err(|_| invalid())?;
    amount
        .checked_mul(Decimal::from(WEI_PER_GWEI))
        .and_then(|wei| wei.trunc().to_u128())
        .ok_or_else(invalid)
}
