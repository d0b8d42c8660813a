//! Price source that queries many sources and merges their answers per token.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::aggregation::{settle_all, AggregationMethod};
use crate::error::{Error, Result};
use crate::prices::source::{
    check_price_support, PriceQuery, PriceResult, PriceSource, PricesInChains,
    PricesQueriesSupport, TokensInChains,
};
use crate::types::{ChainId, Timestamp};

pub struct AggregatorPriceSource {
    sources: Vec<Arc<dyn PriceSource>>,
    method: AggregationMethod,
}

impl AggregatorPriceSource {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, method: AggregationMethod) -> Self {
        Self { sources, method }
    }

    async fn query(
        &self,
        addresses: &TokensInChains,
        query: PriceQuery,
        timestamp: Option<Timestamp>,
        search_width: Option<Duration>,
        timeout: Option<Duration>,
    ) -> Result<PricesInChains> {
        if self.sources.is_empty() {
            return Err(Error::NoSources);
        }
        check_price_support(&self.supported_queries(), addresses.keys(), query)?;

        let calls: Vec<_> = self
            .sources
            .iter()
            .filter_map(|source| {
                // Each source only sees the chains it can answer for.
                let support = source.supported_queries();
                let addresses: TokensInChains = addresses
                    .iter()
                    .filter(|(chain_id, _)| {
                        support
                            .get(chain_id)
                            .map_or(false, |support| support.supports(query))
                    })
                    .map(|(chain_id, tokens)| (*chain_id, tokens.clone()))
                    .collect();
                if addresses.is_empty() {
                    return None;
                }
                let source = Arc::clone(source);
                let name = source.name().to_string();
                Some((name, async move {
                    match timestamp {
                        Some(timestamp) => {
                            source
                                .get_historical_prices(&addresses, timestamp, search_width, timeout)
                                .await
                        }
                        None => source.get_current_prices(&addresses, timeout).await,
                    }
                }))
            })
            .collect();
        tracing::debug!("Querying {} price source(s)", calls.len());

        let mut settled = settle_all(calls, timeout).await;
        settled.retain_responses(
            |prices| prices.values().any(|tokens| !tokens.is_empty()),
            Error::RequirementsNotMet { what: "prices" },
        );
        let responses = settled.require_any("fetch prices")?;

        Ok(merge(
            responses.into_iter().map(|(_, prices)| prices).collect(),
            self.method,
            timestamp,
        ))
    }
}

#[async_trait]
impl PriceSource for AggregatorPriceSource {
    fn name(&self) -> &str {
        "aggregator"
    }

    fn supported_queries(&self) -> HashMap<ChainId, PricesQueriesSupport> {
        let mut combined: HashMap<ChainId, PricesQueriesSupport> = HashMap::new();
        for source in &self.sources {
            for (chain_id, support) in source.supported_queries() {
                let entry = combined.entry(chain_id).or_default();
                *entry = entry.union(&support);
            }
        }
        combined
    }

    async fn get_current_prices(
        &self,
        addresses: &TokensInChains,
        timeout: Option<Duration>,
    ) -> Result<PricesInChains> {
        self.query(addresses, PriceQuery::Current, None, None, timeout)
            .await
    }

    async fn get_historical_prices(
        &self,
        addresses: &TokensInChains,
        timestamp: Timestamp,
        search_width: Option<Duration>,
        timeout: Option<Duration>,
    ) -> Result<PricesInChains> {
        self.query(
            addresses,
            PriceQuery::Historical,
            Some(timestamp),
            search_width,
            timeout,
        )
        .await
    }
}

/// Aggregate prices token by token. The reported timestamp is the latest
/// observation, or the one closest to `target` for historical queries.
pub fn merge(
    responses: Vec<PricesInChains>,
    method: AggregationMethod,
    target: Option<Timestamp>,
) -> PricesInChains {
    let mut collected: HashMap<ChainId, HashMap<_, Vec<PriceResult>>> = HashMap::new();
    for response in responses {
        for (chain_id, tokens) in response {
            let chain = collected.entry(chain_id).or_default();
            for (token, price) in tokens {
                chain.entry(token).or_default().push(price);
            }
        }
    }

    collected
        .into_iter()
        .map(|(chain_id, tokens)| {
            let merged = tokens
                .into_iter()
                .filter_map(|(token, prices)| {
                    let price = method.apply(prices.iter().map(|result| result.price).collect())?;
                    let closest_timestamp = match target {
                        Some(target) => prices
                            .iter()
                            .map(|result| result.closest_timestamp)
                            .min_by_key(|timestamp| (timestamp - target).abs())?,
                        None => prices.iter().map(|result| result.closest_timestamp).max()?,
                    };
                    Some((
                        token,
                        PriceResult {
                            price,
                            closest_timestamp,
                        },
                    ))
                })
                .collect();
            (chain_id, merged)
        })
        .collect()
}
