use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Address, AmountOfToken, ChainId, TokenAddress};

/// Token amounts per account.
pub type BalancesByAccount = HashMap<Address, HashMap<TokenAddress, AmountOfToken>>;
/// Token amounts per account, per chain.
pub type BalancesInChains = HashMap<ChainId, BalancesByAccount>;
/// Tokens to look up per account.
pub type TokensByAccount = HashMap<Address, Vec<TokenAddress>>;

/// Which balance queries a source answers on a chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceQueriesSupport {
    pub get_balances_for_tokens: bool,
    pub get_tokens_held_by_account: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceQuery {
    BalancesForTokens,
    TokensHeldByAccount,
}

impl BalanceQuery {
    fn name(&self) -> &'static str {
        match self {
            Self::BalancesForTokens => "getBalancesForTokens",
            Self::TokensHeldByAccount => "getTokensHeldByAccount",
        }
    }

    fn is_supported_by(&self, support: &BalanceQueriesSupport) -> bool {
        match self {
            Self::BalancesForTokens => support.get_balances_for_tokens,
            Self::TokensHeldByAccount => support.get_tokens_held_by_account,
        }
    }
}

#[async_trait]
pub trait BalanceSource: Send + Sync {
    fn name(&self) -> &str;

    fn supported_queries(&self) -> HashMap<ChainId, BalanceQueriesSupport>;

    /// Balances of specific tokens. Tokens the source could not read are
    /// left out of the result.
    async fn get_balances_for_tokens(
        &self,
        tokens: &HashMap<ChainId, TokensByAccount>,
        timeout: Option<Duration>,
    ) -> Result<BalancesInChains>;

    /// Every token with a non-zero balance, per account.
    async fn get_tokens_held_by_accounts(
        &self,
        accounts: &HashMap<ChainId, Vec<Address>>,
        timeout: Option<Duration>,
    ) -> Result<BalancesInChains>;
}

/// Fail before any I/O when `query` is unavailable on one of `chains`.
pub fn check_query_support<'a>(
    support: &HashMap<ChainId, BalanceQueriesSupport>,
    chains: impl IntoIterator<Item = &'a ChainId>,
    query: BalanceQuery,
) -> Result<()> {
    for chain_id in chains {
        let chain_support = support
            .get(chain_id)
            .ok_or(Error::UnsupportedChain { chain_id: *chain_id })?;
        if !query.is_supported_by(chain_support) {
            return Err(Error::UnsupportedOperation {
                operation: query.name(),
                chain_id: *chain_id,
            });
        }
    }
    Ok(())
}
