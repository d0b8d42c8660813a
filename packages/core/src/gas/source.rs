//! Gas price source interface.
//!
//! Every gas price provider (remote oracle, RPC node, aggregate of other
//! sources) implements [`GasPriceSource`] so it can be composed freely.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::gas::types::{GasPriceResult, GasSpeed};
use crate::support::{supported_chains, FieldsRequirements, SupportInChains, SupportRecord};
use crate::types::ChainId;

/// A gas price query for one chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GasPriceRequest {
    pub chain_id: ChainId,
    pub requirements: Option<FieldsRequirements<GasSpeed>>,
    pub timeout: Option<Duration>,
}

impl GasPriceRequest {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            ..Self::default()
        }
    }

    pub fn with_requirements(mut self, requirements: FieldsRequirements<GasSpeed>) -> Self {
        self.requirements = Some(requirements);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
pub trait GasPriceSource: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Speeds this source can quote, per chain.
    fn supported_speeds(&self) -> SupportInChains<GasSpeed>;

    /// Chains with any declared support, sorted.
    fn supported_chains(&self) -> Vec<ChainId> {
        supported_chains(&self.supported_speeds())
    }

    /// Speeds declared for one chain, `None` if the chain is unsupported.
    fn supported_for(&self, chain_id: ChainId) -> Option<SupportRecord<GasSpeed>> {
        self.supported_speeds().remove(&chain_id)
    }

    async fn get_gas_price(&self, request: &GasPriceRequest) -> Result<GasPriceResult>;
}
