use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{Error, Result};
use crate::gas::source::{GasPriceRequest, GasPriceSource};
use crate::gas::types::{GasPrice, GasPriceResult, GasSpeed};
use crate::providers::{JsonRpcClient, ProviderSource, Transport};
use crate::support::{SupportInChains, SupportRecord};

/// Reads gas prices straight from a node. Only the `standard` speed is known.
///
/// On EIP-1559 chains the max fee is twice the latest base fee plus the
/// suggested priority fee; elsewhere `eth_gasPrice` is used.
pub struct RpcGasPriceSource {
    providers: Arc<dyn ProviderSource>,
    http: Client,
}

impl RpcGasPriceSource {
    pub fn new(providers: Arc<dyn ProviderSource>, http: Client) -> Self {
        Self { providers, http }
    }

    async fn fetch(&self, client: &JsonRpcClient) -> Result<GasPrice> {
        if let Some(base_fee) = client.latest_base_fee().await? {
            match client.max_priority_fee_per_gas().await {
                Ok(priority_fee) => {
                    let max_fee = base_fee
                        .saturating_mul(2)
                        .saturating_add(priority_fee);
                    return Ok(GasPrice::eip1559(max_fee, priority_fee));
                }
                Err(Error::Rpc { code, message }) => {
                    tracing::debug!(
                        "eth_maxPriorityFeePerGas unavailable on chain {} ({}: {}), using eth_gasPrice",
                        client.endpoint().chain_id,
                        code,
                        message
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(GasPrice::legacy(client.gas_price().await?))
    }
}

#[async_trait]
impl GasPriceSource for RpcGasPriceSource {
    fn name(&self) -> &str {
        "rpc"
    }

    fn supported_speeds(&self) -> SupportInChains<GasSpeed> {
        self.providers
            .supported_clients()
            .into_iter()
            .filter(|(_, clients)| clients.supports(Transport::Http))
            .map(|(chain_id, _)| (chain_id, SupportRecord::present(&[GasSpeed::Standard])))
            .collect::<HashMap<_, _>>()
    }

    async fn get_gas_price(&self, request: &GasPriceRequest) -> Result<GasPriceResult> {
        let endpoint = self
            .providers
            .get_provider(request.chain_id, Some(Transport::Http))?;
        let client = JsonRpcClient::new(self.http.clone(), endpoint)?;
        let price = self.fetch(&client).await?;
        Ok(GasPriceResult::from_mixed([(GasSpeed::Standard, price)]))
    }
}
