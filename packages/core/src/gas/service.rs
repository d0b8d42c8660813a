use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::gas::source::{GasPriceRequest, GasPriceSource};
use crate::gas::types::{GasCost, GasPriceResult, GasSpeed};
use crate::support::{meets_requirements, validate_requirements, SupportInChains, SupportRecord};
use crate::timeouts::with_timeout;
use crate::types::{AmountOfToken, ChainId};

/// Entry point for gas prices and transaction cost estimates.
#[derive(Clone)]
pub struct GasService {
    source: Arc<dyn GasPriceSource>,
}

impl GasService {
    pub fn new(source: Arc<dyn GasPriceSource>) -> Self {
        Self { source }
    }

    pub fn supported_chains(&self) -> Vec<ChainId> {
        self.source.supported_chains()
    }

    pub fn supported_speeds(&self) -> SupportInChains<GasSpeed> {
        self.source.supported_speeds()
    }

    pub fn supported_for(&self, chain_id: ChainId) -> Option<SupportRecord<GasSpeed>> {
        self.source.supported_for(chain_id)
    }

    pub async fn get_gas_price(&self, request: &GasPriceRequest) -> Result<GasPriceResult> {
        validate_requirements(
            &self.source.supported_speeds(),
            &[request.chain_id],
            request.requirements.as_ref(),
        )?;

        let source = Arc::clone(&self.source);
        let forwarded = request.clone();
        let result = with_timeout(
            async move { source.get_gas_price(&forwarded).await },
            request.timeout,
        )
        .await?;

        if !meets_requirements(&result, request.requirements.as_ref()) {
            return Err(Error::RequirementsNotMet { what: "gas prices" });
        }
        Ok(result)
    }

    /// Cost per speed of a transaction using `gas_estimation` gas units,
    /// priced at the highest fee the transaction may pay.
    pub async fn calculate_gas_cost(
        &self,
        request: &GasPriceRequest,
        gas_estimation: AmountOfToken,
    ) -> Result<BTreeMap<GasSpeed, GasCost>> {
        let prices = self.get_gas_price(request).await?;
        prices
            .iter()
            .map(|(speed, price)| -> Result<(GasSpeed, GasCost)> {
                let gas_cost_native_token = gas_estimation
                    .checked_mul(price.max_price_per_gas())
                    .ok_or_else(|| Error::format(format!("gas cost overflows for speed {}", speed)))?;
                Ok((
                    speed,
                    GasCost {
                        gas_cost_native_token,
                        price,
                    },
                ))
            })
            .collect()
    }
}
