use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::gas::source::{GasPriceRequest, GasPriceSource};
use crate::gas::types::{GasPriceResult, GasSpeed};
use crate::support::{combine_support, validate_requirements, SupportInChains};
use crate::timeouts::with_timeout;

/// Uses the first source, in the given order, that can serve the request.
/// Nothing is merged; a later source is only used when every earlier one
/// lacks support for the chain or the required speeds.
pub struct PrioritizedGasPriceSource {
    sources: Vec<Arc<dyn GasPriceSource>>,
}

impl PrioritizedGasPriceSource {
    pub fn new(sources: Vec<Arc<dyn GasPriceSource>>) -> Self {
        Self { sources }
    }

    fn pick(&self, request: &GasPriceRequest) -> Result<&Arc<dyn GasPriceSource>> {
        let mut first_rejection = None;
        for source in &self.sources {
            match validate_requirements(
                &source.supported_speeds(),
                &[request.chain_id],
                request.requirements.as_ref(),
            ) {
                Ok(()) => return Ok(source),
                Err(err @ Error::UnmetRequirements { .. }) => {
                    first_rejection.get_or_insert(err);
                }
                Err(_) => {}
            }
        }
        Err(first_rejection.unwrap_or(Error::UnsupportedChain {
            chain_id: request.chain_id,
        }))
    }
}

#[async_trait]
impl GasPriceSource for PrioritizedGasPriceSource {
    fn name(&self) -> &str {
        "prioritized"
    }

    fn supported_speeds(&self) -> SupportInChains<GasSpeed> {
        combine_support(self.sources.iter().map(|source| source.supported_speeds()))
    }

    async fn get_gas_price(&self, request: &GasPriceRequest) -> Result<GasPriceResult> {
        if self.sources.is_empty() {
            return Err(Error::NoSources);
        }
        let source = Arc::clone(self.pick(request)?);
        tracing::debug!(
            "Using gas price source '{}' for chain {}",
            source.name(),
            request.chain_id
        );

        let forwarded = request.clone();
        with_timeout(
            async move { source.get_gas_price(&forwarded).await },
            request.timeout,
        )
        .await
    }
}
