//! Token balances per account.

pub mod cached;
pub mod source;

pub use cached::CachedBalanceSource;
pub use source::{
    check_query_support, BalanceQueriesSupport, BalanceQuery, BalanceSource, BalancesByAccount,
    BalancesInChains, TokensByAccount,
};
