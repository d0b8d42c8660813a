use std::collections::HashMap;

use url::Url;

use crate::error::{Error, Result};
use crate::providers::source::{choose_transport, ProviderSource};
use crate::providers::types::{parse_rpc_url, ClientSupport, RpcEndpoint, Transport};
use crate::types::ChainId;

/// One HTTP(S) RPC url serving a fixed set of chains.
#[derive(Debug, Clone)]
pub struct HttpProviderSource {
    url: Url,
    chains: Vec<ChainId>,
}

impl HttpProviderSource {
    pub fn new(url: &str, chains: &[ChainId]) -> Result<Self> {
        let url = parse_rpc_url(url)?;
        if Transport::from_url(&url)? != Transport::Http {
            return Err(Error::invalid_configuration(format!(
                "'{}' is not an http url",
                url
            )));
        }
        Ok(Self {
            url,
            chains: chains.to_vec(),
        })
    }
}

impl ProviderSource for HttpProviderSource {
    fn name(&self) -> &str {
        "http"
    }

    fn supported_clients(&self) -> HashMap<ChainId, ClientSupport> {
        self.chains
            .iter()
            .map(|chain_id| (*chain_id, ClientSupport::only(Transport::Http)))
            .collect()
    }

    fn get_provider(&self, chain_id: ChainId, transport: Option<Transport>) -> Result<RpcEndpoint> {
        let clients = self.supported_clients();
        let transport = choose_transport(clients.get(&chain_id), chain_id, transport)?;
        Ok(RpcEndpoint {
            chain_id,
            url: self.url.clone(),
            transport,
        })
    }
}
