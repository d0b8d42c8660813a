use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::metadata::source::{MetadataByToken, MetadataField, MetadataInChains, MetadataSource};
use crate::support::{
    meets_requirements, supported_chains, validate_requirements, FieldsRequirements,
    SupportInChains,
};
use crate::timeouts::with_timeout;
use crate::types::{ChainId, TokenAddress};

/// Token symbols and decimals, checked against the caller's requirements.
#[derive(Clone)]
pub struct MetadataService {
    source: Arc<dyn MetadataSource>,
}

impl MetadataService {
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self { source }
    }

    pub fn supported_chains(&self) -> Vec<ChainId> {
        supported_chains(&self.supported_properties())
    }

    pub fn supported_properties(&self) -> SupportInChains<MetadataField> {
        self.source.supported_properties()
    }

    pub async fn get_metadata_for_chain(
        &self,
        chain_id: ChainId,
        addresses: Vec<TokenAddress>,
        requirements: Option<FieldsRequirements<MetadataField>>,
        timeout: Option<Duration>,
    ) -> Result<MetadataByToken> {
        let by_chain = HashMap::from([(chain_id, addresses)]);
        let mut result = self.get_metadata(by_chain, requirements, timeout).await?;
        Ok(result.remove(&chain_id).unwrap_or_default())
    }

    pub async fn get_metadata(
        &self,
        addresses: HashMap<ChainId, Vec<TokenAddress>>,
        requirements: Option<FieldsRequirements<MetadataField>>,
        timeout: Option<Duration>,
    ) -> Result<MetadataInChains> {
        let chains: Vec<ChainId> = addresses.keys().copied().collect();
        validate_requirements(&self.supported_properties(), &chains, requirements.as_ref())?;

        let source = Arc::clone(&self.source);
        let forwarded = requirements.clone();
        let response = with_timeout(
            async move {
                source
                    .get_metadata(&addresses, forwarded.as_ref(), timeout)
                    .await
            },
            timeout,
        )
        .await?;

        if !meets_requirements(&response, requirements.as_ref()) {
            return Err(Error::RequirementsNotMet { what: "metadata" });
        }
        Ok(response)
    }
}
