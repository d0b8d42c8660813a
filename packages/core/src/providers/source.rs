use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::providers::types::{ClientSupport, RpcEndpoint, Transport};
use crate::types::ChainId;

/// Hands out RPC endpoints per chain. Purely local: no I/O happens here.
pub trait ProviderSource: Send + Sync {
    fn name(&self) -> &str;

    fn supported_clients(&self) -> HashMap<ChainId, ClientSupport>;

    /// Chains with at least one supported transport, sorted.
    fn supported_chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<ChainId> = self
            .supported_clients()
            .into_iter()
            .filter(|(_, support)| support.supports_any())
            .map(|(chain_id, _)| chain_id)
            .collect();
        chains.sort_unstable();
        chains
    }

    /// Endpoint for `chain_id`. With `transport` set, only that transport is
    /// acceptable; otherwise HTTP is preferred.
    fn get_provider(&self, chain_id: ChainId, transport: Option<Transport>) -> Result<RpcEndpoint>;
}

/// Resolve which transport to hand out, or explain why none fits.
pub fn choose_transport(
    support: Option<&ClientSupport>,
    chain_id: ChainId,
    transport: Option<Transport>,
) -> Result<Transport> {
    let support = support
        .filter(|support| support.supports_any())
        .ok_or(Error::UnsupportedChain { chain_id })?;
    match transport {
        Some(transport) if support.supports(transport) => Ok(transport),
        Some(transport) => Err(Error::UnsupportedOperation {
            operation: transport.capability(),
            chain_id,
        }),
        None if support.http => Ok(Transport::Http),
        None => Ok(Transport::WebSocket),
    }
}
