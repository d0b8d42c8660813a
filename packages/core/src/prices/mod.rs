//! Token prices in USD, current and historical.

pub mod aggregator;
pub mod source;
pub mod sources;

pub use aggregator::AggregatorPriceSource;
pub use source::{PriceQuery, PriceResult, PriceSource, PricesInChains, PricesQueriesSupport, TokensInChains};
