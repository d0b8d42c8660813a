use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::providers::source::{choose_transport, ProviderSource};
use crate::providers::types::{parse_rpc_url, ClientSupport, RpcEndpoint, Transport};
use crate::types::{chains, ChainId};

const ALCHEMY_NETWORKS: &[(ChainId, &str)] = &[
    (chains::ETHEREUM, "eth-mainnet"),
    (chains::ETHEREUM_GOERLI, "eth-goerli"),
    (chains::ETHEREUM_SEPOLIA, "eth-sepolia"),
    (chains::POLYGON, "polygon-mainnet"),
    (chains::OPTIMISM, "opt-mainnet"),
    (chains::ARBITRUM, "arb-mainnet"),
    (chains::ASTAR, "astar-mainnet"),
    (chains::POLYGON_ZKEVM, "polygonzkevm-mainnet"),
];

/// Chains Alchemy has a network for.
pub fn alchemy_supported_chains() -> Vec<ChainId> {
    ALCHEMY_NETWORKS.iter().map(|(chain_id, _)| *chain_id).collect()
}

fn alchemy_network(chain_id: ChainId) -> Option<&'static str> {
    ALCHEMY_NETWORKS
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, network)| *network)
}

/// RPC url for `chain_id`, or `None` when Alchemy does not serve it.
pub fn build_alchemy_url(key: &str, transport: Transport, chain_id: ChainId) -> Option<String> {
    let protocol = match transport {
        Transport::Http => "https",
        Transport::WebSocket => "wss",
    };
    alchemy_network(chain_id)
        .map(|network| format!("{}://{}.g.alchemy.com/v2/{}", protocol, network, key))
}

pub struct AlchemyProviderSource {
    key: String,
    transport: Transport,
    chains: Vec<ChainId>,
}

impl AlchemyProviderSource {
    /// Serves every Alchemy network unless `on_chains` narrows it down.
    pub fn new(key: impl Into<String>, transport: Transport, on_chains: Option<&[ChainId]>) -> Result<Self> {
        let chains = match on_chains {
            Some(requested) => {
                if let Some(unknown) = requested.iter().find(|id| alchemy_network(**id).is_none()) {
                    return Err(Error::invalid_configuration(format!(
                        "Alchemy does not support chain {}",
                        unknown
                    )));
                }
                requested.to_vec()
            }
            None => alchemy_supported_chains(),
        };
        Ok(Self {
            key: key.into(),
            transport,
            chains,
        })
    }
}

impl ProviderSource for AlchemyProviderSource {
    fn name(&self) -> &str {
        "alchemy"
    }

    fn supported_clients(&self) -> HashMap<ChainId, ClientSupport> {
        self.chains
            .iter()
            .map(|chain_id| (*chain_id, ClientSupport::only(self.transport)))
            .collect()
    }

    fn get_provider(&self, chain_id: ChainId, transport: Option<Transport>) -> Result<RpcEndpoint> {
        let clients = self.supported_clients();
        let transport = choose_transport(clients.get(&chain_id), chain_id, transport)?;
        let url = build_alchemy_url(&self.key, transport, chain_id)
            .ok_or(Error::UnsupportedChain { chain_id })?;
        Ok(RpcEndpoint {
            chain_id,
            url: parse_rpc_url(&url)?,
            transport,
        })
    }
}
