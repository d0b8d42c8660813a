//! Token metadata (symbol and decimals).

pub mod service;
pub mod source;

pub use service::MetadataService;
pub use source::{MetadataByToken, MetadataField, MetadataInChains, MetadataSource, TokenMetadata};
