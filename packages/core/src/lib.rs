//! Multi-source aggregation of chain data: gas prices, balances, prices,
//! token metadata, swap quotes and RPC providers.
//!
//! Sources declare what they support per chain, are queried concurrently
//! under deadlines, and their answers are merged, prioritized or cached.
//! The binary in `src/main.rs` polls gas prices and serves them over HTTP.

pub mod aggregation;
pub mod api;
pub mod balances;
pub mod cache;
pub mod error;
pub mod gas;
pub mod metadata;
pub mod metrics;
pub mod prices;
pub mod providers;
pub mod quotes;
pub mod scheduler;
pub mod setup;
pub mod store;
pub mod support;
pub mod timeouts;
pub mod types;

// Binary plumbing, public so integration tests can reach it.
pub mod cli;
pub mod config;
pub mod logging;
