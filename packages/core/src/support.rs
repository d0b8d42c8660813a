//! Support declarations and field requirements.
//!
//! Every source declares, per chain, which fields of its result shape it can
//! fill in ([`SupportRecord`]). Callers state which fields they need
//! ([`FieldsRequirements`]). [`validate_requirements`] rejects a request before
//! any network call when the declared support cannot satisfy it, and
//! [`meets_requirements`] checks a response once it arrives.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::ChainId;

/// A closed set of fields that make up a result shape.
pub trait Field: Copy + Ord + Hash + Debug + Display + Send + Sync + 'static {
    /// Every field of the shape.
    const ALL: &'static [Self];
}

/// Implemented by responses so requirements can be checked against them.
pub trait HasFields<F: Field> {
    /// `true` when `field` is populated with a usable value.
    fn has_field(&self, field: F) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportLevel {
    /// Always returned.
    Present,
    /// Returned when available.
    Optional,
}

/// What a source can fill in. Fields missing from the record are absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportRecord<F: Field> {
    fields: BTreeMap<F, SupportLevel>,
}

/// Support per chain.
pub type SupportInChains<F> = HashMap<ChainId, SupportRecord<F>>;

impl<F: Field> Default for SupportRecord<F> {
    fn default() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }
}

impl<F: Field> SupportRecord<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every given field declared as `present`.
    pub fn present(fields: &[F]) -> Self {
        fields
            .iter()
            .fold(Self::new(), |record, field| record.with(*field, SupportLevel::Present))
    }

    pub fn with(mut self, field: F, level: SupportLevel) -> Self {
        self.fields.insert(field, level);
        self
    }

    pub fn level(&self, field: F) -> Option<SupportLevel> {
        self.fields.get(&field).copied()
    }

    pub fn is_absent(&self, field: F) -> bool {
        !self.fields.contains_key(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (F, SupportLevel)> + '_ {
        self.fields.iter().map(|(field, level)| (*field, *level))
    }

    /// Union of two records: a field is `present` if either side has it
    /// present, `optional` if either side declares it at all.
    pub fn union(&self, other: &Self) -> Self {
        let mut fields = self.fields.clone();
        for (field, level) in other.fields() {
            let merged = match (fields.get(&field), level) {
                (Some(SupportLevel::Present), _) | (_, SupportLevel::Present) => {
                    SupportLevel::Present
                }
                _ => SupportLevel::Optional,
            };
            fields.insert(field, merged);
        }
        Self { fields }
    }
}

/// Combine the support maps of several sources into their union.
pub fn combine_support<F, I>(supports: I) -> SupportInChains<F>
where
    F: Field,
    I: IntoIterator<Item = SupportInChains<F>>,
{
    let mut combined: SupportInChains<F> = HashMap::new();
    for support in supports {
        for (chain_id, record) in support {
            let merged = match combined.get(&chain_id) {
                Some(existing) => existing.union(&record),
                None => record,
            };
            combined.insert(chain_id, merged);
        }
    }
    combined
}

/// Sorted chain ids present in a support map.
pub fn supported_chains<F: Field>(support: &SupportInChains<F>) -> Vec<ChainId> {
    let mut chains: Vec<ChainId> = support.keys().copied().collect();
    chains.sort_unstable();
    chains
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRequirement {
    Required,
    Optional,
}

/// Caller-side requirements. Fields not listed fall back to `default`,
/// which is `optional` unless changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldsRequirements<F: Field> {
    requirements: BTreeMap<F, FieldRequirement>,
    default: FieldRequirement,
}

impl<F: Field> Default for FieldsRequirements<F> {
    fn default() -> Self {
        Self {
            requirements: BTreeMap::new(),
            default: FieldRequirement::Optional,
        }
    }
}

impl<F: Field> FieldsRequirements<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(self, field: F) -> Self {
        self.with(field, FieldRequirement::Required)
    }

    pub fn with(mut self, field: F, requirement: FieldRequirement) -> Self {
        self.requirements.insert(field, requirement);
        self
    }

    pub fn with_default(mut self, default: FieldRequirement) -> Self {
        self.default = default;
        self
    }

    pub fn requirement_for(&self, field: F) -> FieldRequirement {
        self.requirements
            .get(&field)
            .copied()
            .unwrap_or(self.default)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = F> + '_ {
        F::ALL
            .iter()
            .copied()
            .filter(move |field| self.requirement_for(*field) == FieldRequirement::Required)
    }
}

/// Fail fast when a request cannot possibly be satisfied.
///
/// Every requested chain must be declared in `support`, and no required field
/// may be absent on it.
pub fn validate_requirements<F: Field>(
    support: &SupportInChains<F>,
    chains: &[ChainId],
    requirements: Option<&FieldsRequirements<F>>,
) -> Result<()> {
    for chain_id in chains {
        let record = support
            .get(chain_id)
            .ok_or(Error::UnsupportedChain { chain_id: *chain_id })?;
        let Some(requirements) = requirements else {
            continue;
        };
        if let Some(field) = requirements
            .required_fields()
            .find(|field| record.is_absent(*field))
        {
            return Err(Error::UnmetRequirements {
                chain_id: *chain_id,
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

/// `true` when every required field is populated in `response`.
pub fn meets_requirements<F, R>(response: &R, requirements: Option<&FieldsRequirements<F>>) -> bool
where
    F: Field,
    R: HasFields<F> + ?Sized,
{
    match requirements {
        Some(requirements) => requirements
            .required_fields()
            .all(|field| response.has_field(field)),
        None => true,
    }
}
