use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::support::{Field, HasFields};
use crate::types::{amount_string, AmountOfToken};

/// Speed tiers a gas price can be quoted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasSpeed {
    Standard,
    Fast,
    Instant,
}

impl fmt::Display for GasSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Standard => "standard",
            Self::Fast => "fast",
            Self::Instant => "instant",
        };
        write!(f, "{}", name)
    }
}

impl Field for GasSpeed {
    const ALL: &'static [Self] = &[Self::Standard, Self::Fast, Self::Instant];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyGasPrice {
    #[serde(with = "amount_string")]
    pub gas_price: AmountOfToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip1559GasPrice {
    #[serde(with = "amount_string")]
    pub max_fee_per_gas: AmountOfToken,
    #[serde(with = "amount_string")]
    pub max_priority_fee_per_gas: AmountOfToken,
}

/// Price for a single speed, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GasPrice {
    Legacy(LegacyGasPrice),
    Eip1559(Eip1559GasPrice),
}

impl GasPrice {
    pub fn legacy(gas_price: AmountOfToken) -> Self {
        Self::Legacy(LegacyGasPrice { gas_price })
    }

    pub fn eip1559(max_fee_per_gas: AmountOfToken, max_priority_fee_per_gas: AmountOfToken) -> Self {
        Self::Eip1559(Eip1559GasPrice {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        })
    }

    /// Highest price per gas unit a transaction may pay.
    pub fn max_price_per_gas(&self) -> AmountOfToken {
        match self {
            Self::Legacy(price) => price.gas_price,
            Self::Eip1559(price) => price.max_fee_per_gas,
        }
    }
}

/// Gas prices per speed. Every speed in one result has the same kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GasPriceResult {
    Legacy(BTreeMap<GasSpeed, LegacyGasPrice>),
    Eip1559(BTreeMap<GasSpeed, Eip1559GasPrice>),
}

impl GasPriceResult {
    /// Normalize per-speed prices of possibly mixed kinds.
    ///
    /// The kind quoted for more speeds wins and prices of the other kind are
    /// dropped. On a tie EIP-1559 wins.
    pub fn from_mixed(prices: impl IntoIterator<Item = (GasSpeed, GasPrice)>) -> Self {
        let mut legacy = BTreeMap::new();
        let mut eip1559 = BTreeMap::new();
        for (speed, price) in prices {
            match price {
                GasPrice::Legacy(price) => {
                    legacy.insert(speed, price);
                }
                GasPrice::Eip1559(price) => {
                    eip1559.insert(speed, price);
                }
            }
        }
        if !eip1559.is_empty() && eip1559.len() >= legacy.len() {
            Self::Eip1559(eip1559)
        } else {
            Self::Legacy(legacy)
        }
    }

    pub fn is_eip1559(&self) -> bool {
        matches!(self, Self::Eip1559(_))
    }

    pub fn get(&self, speed: GasSpeed) -> Option<GasPrice> {
        match self {
            Self::Legacy(prices) => prices.get(&speed).copied().map(GasPrice::Legacy),
            Self::Eip1559(prices) => prices.get(&speed).copied().map(GasPrice::Eip1559),
        }
    }

    pub fn speeds(&self) -> Vec<GasSpeed> {
        match self {
            Self::Legacy(prices) => prices.keys().copied().collect(),
            Self::Eip1559(prices) => prices.keys().copied().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (GasSpeed, GasPrice)> + '_ {
        self.speeds()
            .into_iter()
            .filter_map(move |speed| self.get(speed).map(|price| (speed, price)))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Legacy(prices) => prices.len(),
            Self::Eip1559(prices) => prices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HasFields<GasSpeed> for GasPriceResult {
    fn has_field(&self, field: GasSpeed) -> bool {
        self.get(field).is_some()
    }
}

/// Cost of running a transaction at a given speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasCost {
    #[serde(with = "amount_string")]
    pub gas_cost_native_token: AmountOfToken,
    #[serde(flatten)]
    pub price: GasPrice,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_mixed_prefers_eip1559_on_equal_coverage() {
        let result = GasPriceResult::from_mixed([
            (GasSpeed::Standard, GasPrice::legacy(10)),
            (GasSpeed::Fast, GasPrice::eip1559(20, 2)),
        ]);
        assert!(result.is_eip1559());
        assert_eq!(result.speeds(), vec![GasSpeed::Fast]);
    }

    #[test]
    fn from_mixed_prefers_kind_with_more_speeds() {
        let result = GasPriceResult::from_mixed([
            (GasSpeed::Standard, GasPrice::legacy(10)),
            (GasSpeed::Fast, GasPrice::legacy(15)),
            (GasSpeed::Instant, GasPrice::eip1559(20, 2)),
        ]);
        assert!(!result.is_eip1559());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn serializes_amounts_as_strings() {
        let result = GasPriceResult::from_mixed([(GasSpeed::Standard, GasPrice::eip1559(30, 2))]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "standard": { "maxFeePerGas": "30", "maxPriorityFeePerGas": "2" }
            })
        );

        let parsed: GasPriceResult = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn legacy_json_parses_as_legacy() {
        let parsed: GasPriceResult =
            serde_json::from_str(r#"{"fast":{"gasPrice":"100"}}"#).unwrap();
        assert_eq!(parsed.get(GasSpeed::Fast), Some(GasPrice::legacy(100)));
        assert!(parsed.has_field(GasSpeed::Fast));
        assert!(!parsed.has_field(GasSpeed::Instant));
    }

    #[test]
    fn max_price_per_gas_reads_the_right_field() {
        assert_eq!(GasPrice::legacy(7).max_price_per_gas(), 7);
        assert_eq!(GasPrice::eip1559(9, 1).max_price_per_gas(), 9);
    }
}
