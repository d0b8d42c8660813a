use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::source::ProviderSource;
use crate::providers::types::{ClientSupport, RpcEndpoint, Transport};
use crate::types::ChainId;

/// Delegates to the first source, in the given order, that supports the
/// requested chain and transport.
pub struct PrioritizedProviderSourceCombinator {
    sources: Vec<Arc<dyn ProviderSource>>,
}

impl PrioritizedProviderSourceCombinator {
    pub fn new(sources: Vec<Arc<dyn ProviderSource>>) -> Self {
        Self { sources }
    }
}

impl ProviderSource for PrioritizedProviderSourceCombinator {
    fn name(&self) -> &str {
        "prioritized"
    }

    fn supported_clients(&self) -> HashMap<ChainId, ClientSupport> {
        let mut combined: HashMap<ChainId, ClientSupport> = HashMap::new();
        for source in &self.sources {
            for (chain_id, support) in source.supported_clients() {
                let entry = combined.entry(chain_id).or_default();
                *entry = entry.union(&support);
            }
        }
        combined
    }

    fn get_provider(&self, chain_id: ChainId, transport: Option<Transport>) -> Result<RpcEndpoint> {
        let source = self
            .sources
            .iter()
            .find(|source| {
                source
                    .supported_clients()
                    .get(&chain_id)
                    .is_some_and(|support| match transport {
                        Some(transport) => support.supports(transport),
                        None => support.supports_any(),
                    })
            })
            .ok_or(Error::UnsupportedChain { chain_id })?;
        tracing::debug!("Provider for chain {} comes from '{}'", chain_id, source.name());
        source.get_provider(chain_id, transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::sources::{HttpProviderSource, WebSocketProviderSource};
    use crate::types::chains::{ETHEREUM, OPTIMISM, POLYGON};

    fn http(url: &str, chains: &[ChainId]) -> Arc<dyn ProviderSource> {
        Arc::new(HttpProviderSource::new(url, chains).unwrap())
    }

    fn combinator() -> PrioritizedProviderSourceCombinator {
        PrioritizedProviderSourceCombinator::new(vec![
            http("https://one.example.org", &[POLYGON]),
            http("https://two.example.org", &[POLYGON, ETHEREUM]),
        ])
    }

    #[test]
    fn supported_clients_is_the_union() {
        let supported = combinator().supported_clients();
        assert_eq!(supported.len(), 2);
        assert_eq!(supported[&POLYGON], ClientSupport::only(Transport::Http));
        assert_eq!(supported[&ETHEREUM], ClientSupport::only(Transport::Http));
        assert_eq!(combinator().supported_chains(), vec![ETHEREUM, POLYGON]);
    }

    #[test]
    fn first_source_wins_when_both_support_the_chain() {
        let endpoint = combinator().get_provider(POLYGON, None).unwrap();
        assert_eq!(endpoint.url.as_str(), "https://one.example.org/");
    }

    #[test]
    fn falls_back_to_later_source() {
        let endpoint = combinator().get_provider(ETHEREUM, None).unwrap();
        assert_eq!(endpoint.url.as_str(), "https://two.example.org/");
    }

    #[test]
    fn unsupported_chain_is_named() {
        let err = combinator().get_provider(OPTIMISM, None).unwrap_err();
        assert_eq!(err.to_string(), format!("Chain with id {} not supported", OPTIMISM));
    }

    #[test]
    fn transport_requirement_skips_sources() {
        let ws: Arc<dyn ProviderSource> =
            Arc::new(WebSocketProviderSource::new("wss://ws.example.org", &[ETHEREUM]).unwrap());
        let combinator = PrioritizedProviderSourceCombinator::new(vec![
            http("https://http.example.org", &[ETHEREUM]),
            ws,
        ]);

        let endpoint = combinator.get_provider(ETHEREUM, Some(Transport::WebSocket)).unwrap();
        assert_eq!(endpoint.url.as_str(), "wss://ws.example.org/");

        let merged = combinator.supported_clients();
        assert!(merged[&ETHEREUM].http && merged[&ETHEREUM].web_socket);
    }
}
