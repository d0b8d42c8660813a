use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use crate::cache::{CacheConfig, ConcurrentLruCache, DEADLINE_MARGIN};
use crate::error::{Error, Result};
use crate::gas::source::{GasPriceRequest, GasPriceSource};
use crate::gas::types::{GasPriceResult, GasSpeed};
use crate::support::{meets_requirements, validate_requirements, SupportInChains};
use crate::timeouts::reduce_timeout;
use crate::types::ChainId;

/// Caches another source's prices per chain.
///
/// The wrapped source is always asked without requirements so one cached
/// value can serve every caller; requirements are checked on the way out.
/// It is handed the cache's calculation deadline, less a small margin.
pub struct CachedGasPriceSource {
    underlying: Arc<dyn GasPriceSource>,
    cache: ConcurrentLruCache<ChainId, GasPriceResult>,
}

impl CachedGasPriceSource {
    pub fn new(underlying: Arc<dyn GasPriceSource>, config: CacheConfig) -> Self {
        let source = Arc::clone(&underlying);
        let deadline = reduce_timeout(config.calculation_timeout, DEADLINE_MARGIN);
        let cache = ConcurrentLruCache::new(config, move |chains: Vec<ChainId>| {
            let source = Arc::clone(&source);
            async move { fetch_chains(source, chains, deadline).await }
        });
        Self { underlying, cache }
    }
}

async fn fetch_chains(
    source: Arc<dyn GasPriceSource>,
    chains: Vec<ChainId>,
    deadline: Option<Duration>,
) -> Result<HashMap<ChainId, GasPriceResult>> {
    let outcomes = join_all(chains.iter().map(|chain_id| {
        let source = Arc::clone(&source);
        let request = GasPriceRequest {
            timeout: deadline,
            ..GasPriceRequest::new(*chain_id)
        };
        async move { source.get_gas_price(&request).await }
    }))
    .await;

    let mut prices = HashMap::with_capacity(chains.len());
    let mut first_error = None;
    for (chain_id, outcome) in chains.into_iter().zip(outcomes) {
        match outcome {
            Ok(result) => {
                prices.insert(chain_id, result);
            }
            Err(err) => {
                tracing::warn!("Failed to refresh gas price for chain {}: {}", chain_id, err);
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) if prices.is_empty() => Err(err),
        _ => Ok(prices),
    }
}

#[async_trait]
impl GasPriceSource for CachedGasPriceSource {
    fn name(&self) -> &str {
        "cached"
    }

    fn supported_speeds(&self) -> SupportInChains<GasSpeed> {
        self.underlying.supported_speeds()
    }

    async fn get_gas_price(&self, request: &GasPriceRequest) -> Result<GasPriceResult> {
        validate_requirements(
            &self.supported_speeds(),
            &[request.chain_id],
            request.requirements.as_ref(),
        )?;
        let result = self
            .cache
            .get_or_calculate_single(request.chain_id, request.timeout)
            .await?
            .filter(|result| meets_requirements(result, request.requirements.as_ref()));
        result.ok_or(Error::RequirementsNotMet { what: "gas prices" })
    }
}
