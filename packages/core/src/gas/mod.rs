//! Gas prices: source trait, aggregation, caching and concrete sources.

pub mod aggregator;
pub mod cached;
pub mod prioritized;
pub mod service;
pub mod source;
pub mod sources;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::AggregatorGasPriceSource;
pub use cached::CachedGasPriceSource;
pub use prioritized::PrioritizedGasPriceSource;
pub use service::GasService;
pub use source::{GasPriceRequest, GasPriceSource};
pub use types::{Eip1559GasPrice, GasCost, GasPrice, GasPriceResult, GasSpeed, LegacyGasPrice};
