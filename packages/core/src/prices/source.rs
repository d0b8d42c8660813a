use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ChainId, Timestamp, TokenAddress};

/// Price of a token in USD and the time it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResult {
    pub price: f64,
    pub closest_timestamp: Timestamp,
}

pub type PricesInChains = HashMap<ChainId, HashMap<TokenAddress, PriceResult>>;
pub type TokensInChains = HashMap<ChainId, Vec<TokenAddress>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricesQueriesSupport {
    pub get_current_prices: bool,
    pub get_historical_prices: bool,
}

impl PricesQueriesSupport {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            get_current_prices: self.get_current_prices || other.get_current_prices,
            get_historical_prices: self.get_historical_prices || other.get_historical_prices,
        }
    }

    pub fn supports(&self, query: PriceQuery) -> bool {
        match query {
            PriceQuery::Current => self.get_current_prices,
            PriceQuery::Historical => self.get_historical_prices,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceQuery {
    Current,
    Historical,
}

impl PriceQuery {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Current => "getCurrentPrices",
            Self::Historical => "getHistoricalPrices",
        }
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    fn supported_queries(&self) -> HashMap<ChainId, PricesQueriesSupport>;

    fn supported_chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<ChainId> = self.supported_queries().into_keys().collect();
        chains.sort_unstable();
        chains
    }

    async fn get_current_prices(
        &self,
        addresses: &TokensInChains,
        timeout: Option<Duration>,
    ) -> Result<PricesInChains>;

    /// Prices around `timestamp`. `search_width` bounds how far from it an
    /// observation may be.
    async fn get_historical_prices(
        &self,
        addresses: &TokensInChains,
        timestamp: Timestamp,
        search_width: Option<Duration>,
        timeout: Option<Duration>,
    ) -> Result<PricesInChains>;
}

/// Fail before any I/O when `query` is unavailable on one of `chains`.
pub fn check_price_support<'a>(
    support: &HashMap<ChainId, PricesQueriesSupport>,
    chains: impl IntoIterator<Item = &'a ChainId>,
    query: PriceQuery,
) -> Result<()> {
    for chain_id in chains {
        let chain_support = support
            .get(chain_id)
            .ok_or(Error::UnsupportedChain { chain_id: *chain_id })?;
        if !chain_support.supports(query) {
            return Err(Error::UnsupportedOperation {
                operation: query.name(),
                chain_id: *chain_id,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn support_union_keeps_every_query() {
        let current = PricesQueriesSupport {
            get_current_prices: true,
            get_historical_prices: false,
        };
        let historical = PricesQueriesSupport {
            get_current_prices: false,
            get_historical_prices: true,
        };
        let both = current.union(&historical);
        assert!(both.supports(PriceQuery::Current));
        assert!(both.supports(PriceQuery::Historical));
    }

    #[test]
    fn missing_query_is_reported_per_chain() {
        let support = HashMap::from([(
            1,
            PricesQueriesSupport {
                get_current_prices: true,
                get_historical_prices: false,
            },
        )]);

        assert!(check_price_support(&support, &[1], PriceQuery::Current).is_ok());
        assert_eq!(
            check_price_support(&support, &[1], PriceQuery::Historical),
            Err(Error::UnsupportedOperation {
                operation: "getHistoricalPrices",
                chain_id: 1
            })
        );
        assert_eq!(
            check_price_support(&support, &[10], PriceQuery::Current),
            Err(Error::UnsupportedChain { chain_id: 10 })
        );
    }
}
