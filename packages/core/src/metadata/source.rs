use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::support::{Field, FieldsRequirements, HasFields, SupportInChains};
use crate::types::{ChainId, TokenAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataField {
    Symbol,
    Decimals,
}

impl Field for MetadataField {
    const ALL: &'static [Self] = &[Self::Symbol, Self::Decimals];
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol => write!(f, "symbol"),
            Self::Decimals => write!(f, "decimals"),
        }
    }
}

/// What a source knows about a token. Fields it could not read are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
}

impl HasFields<MetadataField> for TokenMetadata {
    fn has_field(&self, field: MetadataField) -> bool {
        match field {
            MetadataField::Symbol => self.symbol.is_some(),
            MetadataField::Decimals => self.decimals.is_some(),
        }
    }
}

pub type MetadataByToken = HashMap<TokenAddress, TokenMetadata>;
pub type MetadataInChains = HashMap<ChainId, MetadataByToken>;

/// A metadata response meets requirements when every token in it does.
impl HasFields<MetadataField> for MetadataInChains {
    fn has_field(&self, field: MetadataField) -> bool {
        self.values()
            .flat_map(|tokens| tokens.values())
            .all(|metadata| metadata.has_field(field))
    }
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    fn name(&self) -> &str;

    fn supported_properties(&self) -> SupportInChains<MetadataField>;

    async fn get_metadata(
        &self,
        addresses: &HashMap<ChainId, Vec<TokenAddress>>,
        requirements: Option<&FieldsRequirements<MetadataField>>,
        timeout: Option<Duration>,
    ) -> Result<MetadataInChains>;
}
