//! Scripted gas price source for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::gas::source::{GasPriceRequest, GasPriceSource};
use crate::gas::types::{GasPrice, GasPriceResult, GasSpeed};
use crate::support::{Field, SupportInChains, SupportRecord};
use crate::types::ChainId;

pub struct MockGasSource {
    name: String,
    support: SupportInChains<GasSpeed>,
    response: Result<GasPriceResult>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockGasSource {
    /// Source supporting every speed on `chains` and answering `response`.
    pub fn new(name: &str, chains: &[ChainId], response: Result<GasPriceResult>) -> Self {
        let support = chains
            .iter()
            .map(|chain_id| (*chain_id, SupportRecord::present(GasSpeed::ALL)))
            .collect();
        Self {
            name: name.to_string(),
            support,
            response,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn legacy(name: &str, chains: &[ChainId], prices: &[(GasSpeed, u128)]) -> Self {
        let result = GasPriceResult::from_mixed(
            prices
                .iter()
                .map(|(speed, price)| (*speed, GasPrice::legacy(*price))),
        );
        Self::new(name, chains, Ok(result))
    }

    pub fn eip1559(name: &str, chains: &[ChainId], prices: &[(GasSpeed, u128, u128)]) -> Self {
        let result = GasPriceResult::from_mixed(
            prices
                .iter()
                .map(|(speed, max, priority)| (*speed, GasPrice::eip1559(*max, *priority))),
        );
        Self::new(name, chains, Ok(result))
    }

    pub fn failing(name: &str, chains: &[ChainId], error: Error) -> Self {
        Self::new(name, chains, Err(error))
    }

    pub fn with_support(mut self, support: SupportInChains<GasSpeed>) -> Self {
        self.support = support;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared counter of `get_gas_price` invocations.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl GasPriceSource for MockGasSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_speeds(&self) -> SupportInChains<GasSpeed> {
        self.support.clone()
    }

    async fn get_gas_price(&self, _request: &GasPriceRequest) -> Result<GasPriceResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }
}

pub fn support_for(chain_id: ChainId, speeds: &[GasSpeed]) -> SupportInChains<GasSpeed> {
    HashMap::from([(chain_id, SupportRecord::present(speeds))])
}
