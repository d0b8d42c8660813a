//! Gas price source that queries many sources and merges their answers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::aggregation::{settle_all, AggregationMethod};
use crate::error::{Error, Result};
use crate::gas::source::{GasPriceRequest, GasPriceSource};
use crate::gas::types::{Eip1559GasPrice, GasPriceResult, GasSpeed, LegacyGasPrice};
use crate::support::{combine_support, meets_requirements, validate_requirements, SupportInChains};

pub struct AggregatorGasPriceSource {
    sources: Vec<Arc<dyn GasPriceSource>>,
    method: AggregationMethod,
}

impl AggregatorGasPriceSource {
    /// An empty source list is accepted here and rejected on every query.
    pub fn new(sources: Vec<Arc<dyn GasPriceSource>>, method: AggregationMethod) -> Self {
        Self { sources, method }
    }

    pub fn method(&self) -> AggregationMethod {
        self.method
    }
}

#[async_trait]
impl GasPriceSource for AggregatorGasPriceSource {
    fn name(&self) -> &str {
        "aggregator"
    }

    fn supported_speeds(&self) -> SupportInChains<GasSpeed> {
        combine_support(self.sources.iter().map(|source| source.supported_speeds()))
    }

    async fn get_gas_price(&self, request: &GasPriceRequest) -> Result<GasPriceResult> {
        if self.sources.is_empty() {
            return Err(Error::NoSources);
        }
        let chain_id = request.chain_id;
        validate_requirements(
            &self.supported_speeds(),
            &[chain_id],
            request.requirements.as_ref(),
        )?;

        let calls: Vec<_> = self
            .sources
            .iter()
            .filter(|source| source.supported_speeds().contains_key(&chain_id))
            .map(|source| {
                let source = Arc::clone(source);
                let request = request.clone();
                let name = source.name().to_string();
                (name, async move { source.get_gas_price(&request).await })
            })
            .collect();
        tracing::debug!(
            "Querying {} gas price source(s) for chain {}",
            calls.len(),
            chain_id
        );

        let mut settled = settle_all(calls, request.timeout).await;
        settled.retain_responses(
            |result| !result.is_empty() && meets_requirements(result, request.requirements.as_ref()),
            Error::RequirementsNotMet { what: "gas prices" },
        );
        let responses = settled.require_any("calculate gas")?;

        Ok(merge(
            responses.into_iter().map(|(_, result)| result).collect(),
            self.method,
        ))
    }
}

/// Merge several results into one of a single kind.
///
/// EIP-1559 wins when its results cover at least as many speeds as the
/// legacy ones. Each speed is aggregated over the results that report it,
/// and every numeric field is aggregated on its own.
pub fn merge(results: Vec<GasPriceResult>, method: AggregationMethod) -> GasPriceResult {
    let mut legacy: BTreeMap<GasSpeed, Vec<LegacyGasPrice>> = BTreeMap::new();
    let mut eip1559: BTreeMap<GasSpeed, Vec<Eip1559GasPrice>> = BTreeMap::new();
    for result in results {
        match result {
            GasPriceResult::Legacy(prices) => {
                for (speed, price) in prices {
                    legacy.entry(speed).or_default().push(price);
                }
            }
            GasPriceResult::Eip1559(prices) => {
                for (speed, price) in prices {
                    eip1559.entry(speed).or_default().push(price);
                }
            }
        }
    }

    if !eip1559.is_empty() && eip1559.len() >= legacy.len() {
        let merged = eip1559
            .into_iter()
            .filter_map(|(speed, prices)| {
                let max_fee_per_gas =
                    method.apply(prices.iter().map(|price| price.max_fee_per_gas).collect())?;
                let max_priority_fee_per_gas = method.apply(
                    prices
                        .iter()
                        .map(|price| price.max_priority_fee_per_gas)
                        .collect(),
                )?;
                Some((
                    speed,
                    Eip1559GasPrice {
                        max_fee_per_gas,
                        max_priority_fee_per_gas,
                    },
                ))
            })
            .collect();
        GasPriceResult::Eip1559(merged)
    } else {
        let merged = legacy
            .into_iter()
            .filter_map(|(speed, prices)| {
                let gas_price = method.apply(prices.iter().map(|price| price.gas_price).collect())?;
                Some((speed, LegacyGasPrice { gas_price }))
            })
            .collect();
        GasPriceResult::Legacy(merged)
    }
}
