//! Primitive identifiers shared by every domain.

/// Numeric id of an EVM network.
pub type ChainId = u64;

/// Account address, hex encoded.
pub type Address = String;

/// Token contract address, hex encoded. [`NATIVE_TOKEN`] stands for the gas token.
pub type TokenAddress = String;

/// Raw token amount in the token's smallest unit.
pub type AmountOfToken = u128;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Placeholder address used for a chain's native currency.
pub const NATIVE_TOKEN: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

/// Well-known chain ids.
pub mod chains {
    use super::ChainId;

    pub const ETHEREUM: ChainId = 1;
    pub const OPTIMISM: ChainId = 10;
    pub const BNB_CHAIN: ChainId = 56;
    pub const POLYGON: ChainId = 137;
    pub const FANTOM: ChainId = 250;
    pub const ASTAR: ChainId = 592;
    pub const POLYGON_ZKEVM: ChainId = 1101;
    pub const ARBITRUM: ChainId = 42161;
    pub const AVALANCHE: ChainId = 43114;
    pub const ETHEREUM_GOERLI: ChainId = 5;
    pub const ETHEREUM_SEPOLIA: ChainId = 11155111;
}

/// Case-insensitive address comparison.
pub fn is_same_address(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Serde helper writing token amounts as decimal strings, since JSON numbers
/// lose precision well below `u128::MAX`.
pub mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::AmountOfToken;

    pub fn serialize<S: Serializer>(value: &AmountOfToken, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<AmountOfToken, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
