//! RPC provider selection.
//!
//! A [`ProviderSource`] maps chains to RPC endpoints. Sources are combined
//! by priority with [`PrioritizedProviderSourceCombinator`], and
//! [`JsonRpcClient`] talks to the endpoint that was picked.

pub mod combinator;
pub mod rpc;
pub mod source;
pub mod sources;
pub mod types;

pub use combinator::PrioritizedProviderSourceCombinator;
pub use rpc::JsonRpcClient;
pub use source::ProviderSource;
pub use types::{ClientSupport, RpcEndpoint, Transport};
