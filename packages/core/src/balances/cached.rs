//! Caching wrapper around a balance source.
//!
//! Two caches are kept: the full set of tokens held by an account, and the
//! balance of a single token. A valid held-tokens entry also answers
//! single-token queries for that account, so those never reach the source.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::balances::source::{
    check_query_support, BalanceQueriesSupport, BalanceQuery, BalanceSource, BalancesInChains,
    TokensByAccount,
};
use crate::cache::{CacheConfig, ConcurrentLruCache, DEADLINE_MARGIN};
use crate::error::Result;
use crate::timeouts::reduce_timeout;
use crate::types::{Address, AmountOfToken, ChainId, TokenAddress};

type HeldByAccountKey = (ChainId, Address);
type TokenInChainKey = (ChainId, Address, TokenAddress);

pub struct CachedBalanceSource {
    source: Arc<dyn BalanceSource>,
    held_by_account: ConcurrentLruCache<HeldByAccountKey, HashMap<TokenAddress, AmountOfToken>>,
    amount_in_chain: ConcurrentLruCache<TokenInChainKey, AmountOfToken>,
}

impl CachedBalanceSource {
    /// The wrapped source is handed `config.calculation_timeout`, less a
    /// small margin, as its deadline.
    pub fn new(source: Arc<dyn BalanceSource>, config: CacheConfig) -> Self {
        let deadline = reduce_timeout(config.calculation_timeout, DEADLINE_MARGIN);

        let held_source = Arc::clone(&source);
        let held_by_account = ConcurrentLruCache::new(config, move |keys: Vec<HeldByAccountKey>| {
            let source = Arc::clone(&held_source);
            async move { fetch_tokens_held_by_account(source, keys, deadline).await }
        });

        let amount_source = Arc::clone(&source);
        let amount_in_chain = ConcurrentLruCache::new(config, move |keys: Vec<TokenInChainKey>| {
            let source = Arc::clone(&amount_source);
            async move { fetch_balances_for_tokens(source, keys, deadline).await }
        });

        Self {
            source,
            held_by_account,
            amount_in_chain,
        }
    }
}

async fn fetch_tokens_held_by_account(
    source: Arc<dyn BalanceSource>,
    keys: Vec<HeldByAccountKey>,
    deadline: Option<Duration>,
) -> Result<HashMap<HeldByAccountKey, HashMap<TokenAddress, AmountOfToken>>> {
    let mut accounts: HashMap<ChainId, Vec<Address>> = HashMap::new();
    for (chain_id, account) in keys {
        accounts.entry(chain_id).or_default().push(account);
    }

    let balances = source.get_tokens_held_by_accounts(&accounts, deadline).await?;
    Ok(balances
        .into_iter()
        .flat_map(|(chain_id, by_account)| {
            by_account
                .into_iter()
                .map(move |(account, held)| ((chain_id, account), held))
        })
        .collect())
}

async fn fetch_balances_for_tokens(
    source: Arc<dyn BalanceSource>,
    keys: Vec<TokenInChainKey>,
    deadline: Option<Duration>,
) -> Result<HashMap<TokenInChainKey, AmountOfToken>> {
    let mut tokens: HashMap<ChainId, TokensByAccount> = HashMap::new();
    for (chain_id, account, token) in &keys {
        tokens
            .entry(*chain_id)
            .or_default()
            .entry(account.clone())
            .or_default()
            .push(token.clone());
    }

    let balances = source.get_balances_for_tokens(&tokens, deadline).await?;
    Ok(keys
        .into_iter()
        .filter_map(|key| {
            let (chain_id, account, token) = &key;
            let amount = balances.get(chain_id)?.get(account)?.get(token).copied()?;
            Some((key, amount))
        })
        .collect())
}

#[async_trait]
impl BalanceSource for CachedBalanceSource {
    fn name(&self) -> &str {
        "cached"
    }

    fn supported_queries(&self) -> HashMap<ChainId, BalanceQueriesSupport> {
        self.source.supported_queries()
    }

    async fn get_tokens_held_by_accounts(
        &self,
        accounts: &HashMap<ChainId, Vec<Address>>,
        timeout: Option<Duration>,
    ) -> Result<BalancesInChains> {
        check_query_support(
            &self.supported_queries(),
            accounts.keys(),
            BalanceQuery::TokensHeldByAccount,
        )?;

        let keys: Vec<HeldByAccountKey> = accounts
            .iter()
            .flat_map(|(chain_id, accounts)| {
                accounts.iter().map(move |account| (*chain_id, account.clone()))
            })
            .collect();
        let cached = self.held_by_account.get_or_calculate(keys, timeout).await?;

        let mut result = BalancesInChains::new();
        for ((chain_id, account), held) in cached {
            result.entry(chain_id).or_default().insert(account, held);
        }
        Ok(result)
    }

    async fn get_balances_for_tokens(
        &self,
        tokens: &HashMap<ChainId, TokensByAccount>,
        timeout: Option<Duration>,
    ) -> Result<BalancesInChains> {
        check_query_support(
            &self.supported_queries(),
            tokens.keys(),
            BalanceQuery::BalancesForTokens,
        )?;

        let (with_held, without_held): (Vec<HeldByAccountKey>, Vec<HeldByAccountKey>) = tokens
            .iter()
            .flat_map(|(chain_id, by_account)| {
                by_account.keys().map(move |account| (*chain_id, account.clone()))
            })
            .partition(|key| self.held_by_account.holds_valid_value(key));

        let mut result = BalancesInChains::new();

        if !with_held.is_empty() {
            let held = self
                .held_by_account
                .get_or_calculate(with_held, timeout)
                .await?;
            for ((chain_id, account), held_tokens) in held {
                let requested = &tokens[&chain_id][&account];
                // Held-token lists only contain non-zero balances.
                let balances = requested
                    .iter()
                    .map(|token| (token.clone(), held_tokens.get(token).copied().unwrap_or(0)))
                    .collect();
                result.entry(chain_id).or_default().insert(account, balances);
            }
        }

        if !without_held.is_empty() {
            let keys: Vec<TokenInChainKey> = without_held
                .into_iter()
                .flat_map(|(chain_id, account)| {
                    tokens[&chain_id][&account]
                        .iter()
                        .map(move |token| (chain_id, account.clone(), token.clone()))
                        .collect::<Vec<_>>()
                })
                .collect();
            let amounts = self.amount_in_chain.get_or_calculate(keys, timeout).await?;
            for ((chain_id, account, token), amount) in amounts {
                result
                    .entry(chain_id)
                    .or_default()
                    .entry(account)
                    .or_default()
                    .insert(token, amount);
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockBalanceSource {
        support: BalanceQueriesSupport,
        held_calls: AtomicUsize,
        balance_calls: AtomicUsize,
        deadlines: std::sync::Mutex<Vec<Option<Duration>>>,
    }

    impl MockBalanceSource {
        fn new(support: BalanceQueriesSupport) -> Self {
            Self {
                support,
                held_calls: AtomicUsize::new(0),
                balance_calls: AtomicUsize::new(0),
                deadlines: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn full() -> Self {
            Self::new(BalanceQueriesSupport {
                get_balances_for_tokens: true,
                get_tokens_held_by_account: true,
            })
        }
    }

    /// Every account holds 100 of "0xa" and nothing else.
    #[async_trait]
    impl BalanceSource for MockBalanceSource {
        fn name(&self) -> &str {
            "mock"
        }

        fn supported_queries(&self) -> HashMap<ChainId, BalanceQueriesSupport> {
            HashMap::from([(1, self.support)])
        }

        async fn get_balances_for_tokens(
            &self,
            tokens: &HashMap<ChainId, TokensByAccount>,
            timeout: Option<Duration>,
        ) -> Result<BalancesInChains> {
            self.balance_calls.fetch_add(1, Ordering::SeqCst);
            self.deadlines.lock().unwrap().push(timeout);
            Ok(tokens
                .iter()
                .map(|(chain_id, by_account)| {
                    let balances = by_account
                        .iter()
                        .map(|(account, tokens)| {
                            let amounts = tokens
                                .iter()
                                .filter(|token| token.as_str() != "0xunknown")
                                .map(|token| (token.clone(), if token == "0xa" { 100 } else { 0 }))
                                .collect();
                            (account.clone(), amounts)
                        })
                        .collect();
                    (*chain_id, balances)
                })
                .collect())
        }

        async fn get_tokens_held_by_accounts(
            &self,
            accounts: &HashMap<ChainId, Vec<Address>>,
            timeout: Option<Duration>,
        ) -> Result<BalancesInChains> {
            self.held_calls.fetch_add(1, Ordering::SeqCst);
            self.deadlines.lock().unwrap().push(timeout);
            Ok(accounts
                .iter()
                .map(|(chain_id, accounts)| {
                    let held = accounts
                        .iter()
                        .map(|account| (account.clone(), HashMap::from([("0xa".to_string(), 100)])))
                        .collect();
                    (*chain_id, held)
                })
                .collect())
        }
    }

    fn request(account: &str, tokens: &[&str]) -> HashMap<ChainId, TokensByAccount> {
        HashMap::from([(
            1,
            HashMap::from([(
                account.to_string(),
                tokens.iter().map(|token| token.to_string()).collect(),
            )]),
        )])
    }

    fn cached(mock: Arc<MockBalanceSource>) -> CachedBalanceSource {
        CachedBalanceSource::new(mock, CacheConfig::with_ttl(Duration::from_secs(60)))
    }

    #[tokio::test(start_paused = true)]
    async fn token_balances_are_cached_per_token() {
        let mock = Arc::new(MockBalanceSource::full());
        let source = cached(Arc::clone(&mock));

        let first = source
            .get_balances_for_tokens(&request("alice", &["0xa", "0xb"]), None)
            .await
            .unwrap();
        let second = source
            .get_balances_for_tokens(&request("alice", &["0xa"]), None)
            .await
            .unwrap();

        assert_eq!(first[&1]["alice"]["0xa"], 100);
        assert_eq!(first[&1]["alice"]["0xb"], 0);
        assert_eq!(second[&1]["alice"]["0xa"], 100);
        assert_eq!(mock.balance_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn held_tokens_answer_balance_queries() {
        let mock = Arc::new(MockBalanceSource::full());
        let source = cached(Arc::clone(&mock));

        let accounts = HashMap::from([(1, vec!["bob".to_string()])]);
        source.get_tokens_held_by_accounts(&accounts, None).await.unwrap();

        let balances = source
            .get_balances_for_tokens(&request("bob", &["0xa", "0xc"]), None)
            .await
            .unwrap();

        assert_eq!(balances[&1]["bob"]["0xa"], 100);
        assert_eq!(balances[&1]["bob"]["0xc"], 0);
        assert_eq!(mock.held_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mock.balance_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn source_is_called_with_the_calculation_deadline() {
        let mock = Arc::new(MockBalanceSource::full());
        let config = CacheConfig::with_ttl(Duration::from_secs(60))
            .calculation_timeout(Duration::from_secs(2));
        let source = CachedBalanceSource::new(Arc::clone(&mock) as Arc<dyn BalanceSource>, config);

        source
            .get_balances_for_tokens(&request("frank", &["0xa"]), None)
            .await
            .unwrap();
        let accounts = HashMap::from([(1, vec!["grace".to_string()])]);
        source.get_tokens_held_by_accounts(&accounts, None).await.unwrap();

        let expected = Some(Duration::from_millis(1_900));
        assert_eq!(*mock.deadlines.lock().unwrap(), vec![expected, expected]);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_tokens_are_left_out() {
        let source = cached(Arc::new(MockBalanceSource::full()));
        let balances = source
            .get_balances_for_tokens(&request("carol", &["0xunknown"]), None)
            .await
            .unwrap();
        assert!(balances.get(&1).and_then(|chain| chain.get("carol")).is_none());
    }

    #[tokio::test]
    async fn unsupported_query_fails_before_any_call() {
        let mock = Arc::new(MockBalanceSource::new(BalanceQueriesSupport {
            get_balances_for_tokens: true,
            get_tokens_held_by_account: false,
        }));
        let source = cached(Arc::clone(&mock));

        let accounts = HashMap::from([(1, vec!["dave".to_string()])]);
        let err = source
            .get_tokens_held_by_accounts(&accounts, None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnsupportedOperation { chain_id: 1, .. }));
        assert_eq!(mock.held_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsupported_chain_is_rejected() {
        let source = cached(Arc::new(MockBalanceSource::full()));
        let tokens = HashMap::from([(10, HashMap::from([("erin".to_string(), vec!["0xa".to_string()])]))]);
        let err = source.get_balances_for_tokens(&tokens, None).await.unwrap_err();
        assert_eq!(err, Error::UnsupportedChain { chain_id: 10 });
    }
}
