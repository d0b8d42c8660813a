//! Builds the daemon's gas source stack from the configuration.
//!
//! Etherscan-family oracles and RPC nodes are queried side by side by an
//! aggregator, and the aggregate is cached per chain.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;

use crate::cache::{CacheConfig, Freshness};
use crate::config::Config;
use crate::error::AppError;
use crate::gas::sources::{EtherscanGasPriceSource, RpcGasPriceSource};
use crate::gas::{AggregatorGasPriceSource, CachedGasPriceSource, GasPriceSource, GasService};
use crate::providers::sources::{AlchemyProviderSource, HttpProviderSource};
use crate::providers::{PrioritizedProviderSourceCombinator, ProviderSource, Transport};
use crate::types::{chains, ChainId};

/// Configured RPC urls first, Alchemy as the fallback.
pub fn build_provider_source(config: &Config) -> Result<Option<Arc<dyn ProviderSource>>, AppError> {
    let mut by_chain: Vec<(String, Vec<ChainId>)> = Vec::new();
    for (chain_id, url) in &config.rpc_urls {
        match by_chain.iter_mut().find(|(existing, _)| existing == url) {
            Some((_, chains)) => chains.push(*chain_id),
            None => by_chain.push((url.clone(), vec![*chain_id])),
        }
    }

    let mut sources: Vec<Arc<dyn ProviderSource>> = Vec::new();
    for (url, chains) in by_chain {
        sources.push(Arc::new(HttpProviderSource::new(&url, &chains)?));
    }
    if let Some(key) = &config.alchemy_api_key {
        sources.push(Arc::new(AlchemyProviderSource::new(
            key.clone(),
            Transport::Http,
            None,
        )?));
    }

    if sources.is_empty() {
        return Ok(None);
    }
    Ok(Some(Arc::new(PrioritizedProviderSourceCombinator::new(sources))))
}

pub fn build_gas_service(config: &Config, http: Client) -> Result<GasService, AppError> {
    // One key is accepted; it belongs to etherscan.io.
    let api_keys: HashMap<ChainId, String> = config
        .etherscan_api_key
        .iter()
        .map(|key| (chains::ETHEREUM, key.clone()))
        .collect();

    let mut sources: Vec<Arc<dyn GasPriceSource>> =
        vec![Arc::new(EtherscanGasPriceSource::new(http.clone(), api_keys))];
    if let Some(providers) = build_provider_source(config)? {
        sources.push(Arc::new(RpcGasPriceSource::new(providers, http)));
    }

    let aggregator: Arc<dyn GasPriceSource> =
        Arc::new(AggregatorGasPriceSource::new(sources, config.aggregation));
    let cache = CacheConfig::with_ttl(config.cache_ttl)
        .serve_stale_on_failure(Freshness::MaxAge(config.cache_ttl * 6))
        .calculation_timeout(config.source_timeout);
    let service = GasService::new(Arc::new(CachedGasPriceSource::new(aggregator, cache)));

    let supported = service.supported_chains();
    for chain_id in &config.chains {
        if !supported.contains(chain_id) {
            tracing::warn!("No gas source supports chain {}; it will fail every poll", chain_id);
        }
    }
    Ok(service)
}
