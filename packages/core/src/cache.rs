//! Concurrent deduplicating cache.
//!
//! [`ConcurrentLruCache`] answers batches of keys. Valid entries are served
//! from memory, keys already being computed join the pending computation, and
//! every remaining key goes into a single call to the batch calculation. At
//! most one calculation per key is in flight at any moment.
//!
//! The calculation runs on its own task. A caller that gives up on its
//! deadline does not stop it, so the result is still stored for the next
//! caller.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use lru::LruCache;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::timeouts::with_timeout_in_place;

/// Subtracted from a cache's calculation deadline before it is handed to the
/// sources, so they give up first and partial answers still get stored.
pub const DEADLINE_MARGIN: Duration = Duration::from_millis(100);

/// How old a cached value may be and still be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Always,
    Never,
    MaxAge(Duration),
}

impl Freshness {
    fn accepts(&self, age: Duration) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::MaxAge(max_age) => age <= *max_age,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Freshness window for serving a value instead of recalculating.
    pub use_cached_value: Freshness,
    /// Freshness window for serving a stale value when recalculation failed.
    pub use_cached_value_if_calculation_failed: Freshness,
    /// Least recently used entries are evicted beyond this many keys.
    pub max_size: Option<usize>,
    /// Deadline of one batch calculation. A batch that misses it is dropped
    /// and fails, which releases its keys for the next caller.
    pub calculation_timeout: Option<Duration>,
}

impl CacheConfig {
    /// Values are reused for `ttl`; failures are never masked.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            use_cached_value: Freshness::MaxAge(ttl),
            use_cached_value_if_calculation_failed: Freshness::Never,
            max_size: None,
            calculation_timeout: None,
        }
    }

    pub fn serve_stale_on_failure(mut self, freshness: Freshness) -> Self {
        self.use_cached_value_if_calculation_failed = freshness;
        self
    }

    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn calculation_timeout(mut self, timeout: Duration) -> Self {
        self.calculation_timeout = Some(timeout);
        self
    }
}

type Calculation<K, V> =
    Arc<dyn Fn(Vec<K>) -> BoxFuture<'static, Result<HashMap<K, V>>> + Send + Sync>;
type SharedBatch<K, V> = Shared<BoxFuture<'static, Result<Arc<HashMap<K, V>>>>>;

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, Entry<V>>,
    in_flight: HashMap<K, SharedBatch<K, V>>,
}

fn lock<K: Hash + Eq, V>(inner: &Mutex<Inner<K, V>>) -> MutexGuard<'_, Inner<K, V>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Batch cache with per-key deduplication of in-flight calculations.
pub struct ConcurrentLruCache<K: Hash + Eq, V> {
    config: CacheConfig,
    calculate: Calculation<K, V>,
    inner: Arc<Mutex<Inner<K, V>>>,
}

impl<K, V> ConcurrentLruCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// `calculate` receives every key that needs computing and returns the
    /// values it found. Keys it leaves out are simply missing from results.
    pub fn new<F, Fut>(config: CacheConfig, calculate: F) -> Self
    where
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HashMap<K, V>>> + Send + 'static,
    {
        let entries = match config.max_size.and_then(NonZeroUsize::new) {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self {
            config,
            calculate: Arc::new(move |keys| calculate(keys).boxed()),
            inner: Arc::new(Mutex::new(Inner {
                entries,
                in_flight: HashMap::new(),
            })),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// `true` when `key` has a value inside the freshness window.
    pub fn holds_valid_value(&self, key: &K) -> bool {
        let inner = lock(&self.inner);
        inner
            .entries
            .peek(key)
            .is_some_and(|entry| self.config.use_cached_value.accepts(entry.stored_at.elapsed()))
    }

    /// Single-key convenience over [`Self::get_or_calculate`].
    pub async fn get_or_calculate_single(
        &self,
        key: K,
        timeout: Option<Duration>,
    ) -> Result<Option<V>> {
        let mut values = self.get_or_calculate(vec![key.clone()], timeout).await?;
        Ok(values.remove(&key))
    }

    pub async fn get_or_calculate(
        &self,
        keys: Vec<K>,
        timeout: Option<Duration>,
    ) -> Result<HashMap<K, V>> {
        let mut result = HashMap::with_capacity(keys.len());
        let mut waiting: Vec<(K, SharedBatch<K, V>)> = Vec::new();

        {
            let mut inner = lock(&self.inner);
            let mut seen = HashSet::with_capacity(keys.len());
            let mut to_calculate = Vec::new();

            for key in keys {
                if !seen.insert(key.clone()) {
                    continue;
                }
                if let Some(entry) = inner.entries.get(&key) {
                    if self.config.use_cached_value.accepts(entry.stored_at.elapsed()) {
                        result.insert(key, entry.value.clone());
                        continue;
                    }
                }
                match inner.in_flight.get(&key) {
                    Some(batch) => waiting.push((key, batch.clone())),
                    None => to_calculate.push(key),
                }
            }

            if !to_calculate.is_empty() {
                tracing::debug!("Calculating {} uncached key(s)", to_calculate.len());
                let batch = self.start_batch(to_calculate.clone());
                for key in to_calculate {
                    inner.in_flight.insert(key.clone(), batch.clone());
                    waiting.push((key, batch.clone()));
                }
            }
        }

        if waiting.is_empty() {
            return Ok(result);
        }

        let batches = waiting.iter().map(|(_, batch)| batch.clone());
        let outcomes = with_timeout_in_place(
            async { Ok::<_, Error>(join_all(batches).await) },
            timeout,
        )
        .await;

        let mut failure: Option<Error> = None;
        let mut failed_keys = Vec::new();
        match outcomes {
            Ok(outcomes) => {
                for ((key, _), outcome) in waiting.into_iter().zip(outcomes) {
                    match outcome {
                        Ok(values) => {
                            if let Some(value) = values.get(&key) {
                                result.insert(key, value.clone());
                            }
                        }
                        Err(err) => {
                            failure.get_or_insert(err);
                            failed_keys.push(key);
                        }
                    }
                }
            }
            Err(err) => {
                failure = Some(err);
                failed_keys.extend(waiting.into_iter().map(|(key, _)| key));
            }
        }

        let Some(failure) = failure else {
            return Ok(result);
        };

        let mut inner = lock(&self.inner);
        for key in failed_keys {
            let stale = inner.entries.get(&key).filter(|entry| {
                self.config
                    .use_cached_value_if_calculation_failed
                    .accepts(entry.stored_at.elapsed())
            });
            match stale {
                Some(entry) => {
                    result.insert(key, entry.value.clone());
                }
                None => return Err(failure),
            }
        }
        tracing::warn!("Calculation failed, serving stale values: {}", failure);
        Ok(result)
    }

    fn start_batch(&self, keys: Vec<K>) -> SharedBatch<K, V> {
        let calculate = Arc::clone(&self.calculate);
        let inner = Arc::clone(&self.inner);
        let deadline = self.config.calculation_timeout;

        let task = tokio::spawn(async move {
            let outcome = with_timeout_in_place(calculate(keys.clone()), deadline).await;
            let mut guard = lock(&inner);
            for key in &keys {
                guard.in_flight.remove(key);
            }
            match outcome {
                Ok(values) => {
                    let stored_at = Instant::now();
                    for (key, value) in &values {
                        guard.entries.put(
                            key.clone(),
                            Entry {
                                value: value.clone(),
                                stored_at,
                            },
                        );
                    }
                    Ok(Arc::new(values))
                }
                Err(err) => Err(err),
            }
        });

        async move {
            task.await.map_err(|err| Error::TaskFailed {
                message: err.to_string(),
            })?
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Cache that doubles its keys after 100ms and records every batch.
    fn doubling_cache(
        config: CacheConfig,
    ) -> (ConcurrentLruCache<u64, u64>, Arc<StdMutex<Vec<Vec<u64>>>>) {
        let batches = Arc::new(StdMutex::new(Vec::new()));
        let recorded = Arc::clone(&batches);
        let cache = ConcurrentLruCache::new(config, move |keys: Vec<u64>| {
            let recorded = Arc::clone(&recorded);
            async move {
                recorded.lock().unwrap().push(keys.clone());
                tokio::time::sleep(Duration::from_millis(100)).await;
                let values: HashMap<u64, u64> = keys.into_iter().map(|key| (key, key * 2)).collect();
                Ok(values)
            }
        });
        (cache, batches)
    }

    // ---- deduplication ----

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_for_one_key_share_a_single_calculation() {
        let (cache, batches) = doubling_cache(CacheConfig::with_ttl(Duration::from_secs(60)));

        let results = join_all((0..5).map(|_| cache.get_or_calculate(vec![7], None))).await;

        assert_eq!(batches.lock().unwrap().len(), 1);
        for result in results {
            assert_eq!(result.unwrap(), HashMap::from([(7, 14)]));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn one_calculation_per_key_across_worker_threads() {
        let (cache, batches) = doubling_cache(CacheConfig::with_ttl(Duration::from_secs(60)));
        let cache = Arc::new(cache);

        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_or_calculate(vec![42], None).await })
            })
            .collect();

        for task in join_all(tasks).await {
            assert_eq!(task.unwrap().unwrap(), HashMap::from([(42, 84)]));
        }
        assert_eq!(*batches.lock().unwrap(), vec![vec![42]]);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_batches_only_calculate_new_keys() {
        let (cache, batches) = doubling_cache(CacheConfig::with_ttl(Duration::from_secs(60)));

        let (first, second) = tokio::join!(
            cache.get_or_calculate(vec![1, 2], None),
            cache.get_or_calculate(vec![2, 3], None),
        );

        assert_eq!(first.unwrap(), HashMap::from([(1, 2), (2, 4)]));
        assert_eq!(second.unwrap(), HashMap::from([(2, 4), (3, 6)]));
        let mut recorded = batches.lock().unwrap().clone();
        recorded.iter_mut().for_each(|batch| batch.sort_unstable());
        recorded.sort();
        assert_eq!(recorded, vec![vec![1, 2], vec![3]]);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_keys_in_one_request_are_calculated_once() {
        let (cache, batches) = doubling_cache(CacheConfig::with_ttl(Duration::from_secs(60)));

        let values = cache.get_or_calculate(vec![4, 4, 4], None).await.unwrap();

        assert_eq!(values, HashMap::from([(4, 8)]));
        assert_eq!(*batches.lock().unwrap(), vec![vec![4]]);
    }

    // ---- freshness ----

    #[tokio::test(start_paused = true)]
    async fn fresh_values_are_served_without_recalculation() {
        let (cache, batches) = doubling_cache(CacheConfig::with_ttl(Duration::from_secs(10)));

        cache.get_or_calculate(vec![1], None).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        let values = cache.get_or_calculate(vec![1], None).await.unwrap();

        assert_eq!(values, HashMap::from([(1, 2)]));
        assert_eq!(batches.lock().unwrap().len(), 1);
        assert!(cache.holds_valid_value(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_values_are_recalculated() {
        let (cache, batches) = doubling_cache(CacheConfig::with_ttl(Duration::from_secs(10)));

        cache.get_or_calculate(vec![1], None).await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!cache.holds_valid_value(&1));

        cache.get_or_calculate(vec![1], None).await.unwrap();
        assert_eq!(batches.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn never_freshness_always_recalculates() {
        let config = CacheConfig {
            use_cached_value: Freshness::Never,
            use_cached_value_if_calculation_failed: Freshness::Never,
            max_size: None,
            calculation_timeout: None,
        };
        let (cache, batches) = doubling_cache(config);

        cache.get_or_calculate(vec![1], None).await.unwrap();
        cache.get_or_calculate(vec![1], None).await.unwrap();
        assert_eq!(batches.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn max_size_evicts_least_recently_used() {
        let config = CacheConfig::with_ttl(Duration::from_secs(60)).max_size(2);
        let (cache, _) = doubling_cache(config);

        cache.get_or_calculate(vec![1], None).await.unwrap();
        cache.get_or_calculate(vec![2], None).await.unwrap();
        cache.get_or_calculate(vec![3], None).await.unwrap();

        assert!(!cache.holds_valid_value(&1));
        assert!(cache.holds_valid_value(&2));
        assert!(cache.holds_valid_value(&3));
    }

    // ---- failures ----

    fn flaky_cache(config: CacheConfig) -> (ConcurrentLruCache<u64, u64>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = ConcurrentLruCache::new(config, move |keys: Vec<u64>| {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 1 {
                    return Err(Error::network("connection reset"));
                }
                let values: HashMap<u64, u64> =
                    keys.into_iter().map(|key| (key, key + call as u64)).collect();
                Ok(values)
            }
        });
        (cache, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_not_cached() {
        let (cache, calls) = flaky_cache(CacheConfig {
            use_cached_value: Freshness::Never,
            use_cached_value_if_calculation_failed: Freshness::Never,
            max_size: None,
            calculation_timeout: None,
        });

        assert!(cache.get_or_calculate(vec![1], None).await.is_ok());
        let err = cache.get_or_calculate(vec![1], None).await.unwrap_err();
        assert_eq!(err, Error::network("connection reset"));

        // The in-flight marker was cleared, so the next call recalculates.
        let values = cache.get_or_calculate(vec![1], None).await.unwrap();
        assert_eq!(values, HashMap::from([(1, 3)]));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_value_is_served_when_calculation_fails() {
        let config = CacheConfig {
            use_cached_value: Freshness::Never,
            use_cached_value_if_calculation_failed: Freshness::Always,
            max_size: None,
            calculation_timeout: None,
        };
        let (cache, _) = flaky_cache(config);

        cache.get_or_calculate(vec![1], None).await.unwrap();
        let values = cache.get_or_calculate(vec![1], None).await.unwrap();

        assert_eq!(values, HashMap::from([(1, 1)]));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_value_is_served_when_caller_deadline_passes() {
        let config = CacheConfig::with_ttl(Duration::from_secs(10))
            .serve_stale_on_failure(Freshness::Always);
        let (cache, batches) = doubling_cache(config);

        cache.get_or_calculate(vec![1], None).await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;

        let values = cache
            .get_or_calculate(vec![1], Some(Duration::from_millis(10)))
            .await
            .unwrap();

        assert_eq!(values, HashMap::from([(1, 2)]));
        assert_eq!(batches.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_calculation_is_abandoned_at_its_deadline() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let config = CacheConfig::with_ttl(Duration::from_secs(60))
            .calculation_timeout(Duration::from_secs(1));
        let cache = ConcurrentLruCache::new(config, move |keys: Vec<u64>| {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    tokio::time::sleep(Duration::from_secs(365 * 24 * 3600)).await;
                }
                let values: HashMap<u64, u64> = keys.into_iter().map(|key| (key, key)).collect();
                Ok(values)
            }
        });

        let err = cache.get_or_calculate(vec![9], None).await.unwrap_err();
        assert_eq!(err, Error::Timeout { after: Duration::from_secs(1) });

        // The key is no longer in flight, so the next caller recalculates.
        let values = cache.get_or_calculate(vec![9], None).await.unwrap();
        assert_eq!(values, HashMap::from([(9, 9)]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_missing_from_calculation_are_absent() {
        let cache = ConcurrentLruCache::new(
            CacheConfig::with_ttl(Duration::from_secs(60)),
            |keys: Vec<u64>| async move {
                let values: HashMap<u64, u64> = keys
                    .into_iter()
                    .filter(|key| key % 2 == 0)
                    .map(|key| (key, key))
                    .collect();
                Ok(values)
            },
        );

        let values = cache.get_or_calculate(vec![1, 2, 3, 4], None).await.unwrap();
        assert_eq!(values, HashMap::from([(2, 2), (4, 4)]));
        assert_eq!(cache.get_or_calculate_single(3, None).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_calculation_times_out_but_still_populates_cache() {
        let (cache, batches) = doubling_cache(CacheConfig::with_ttl(Duration::from_secs(60)));

        let err = cache
            .get_or_calculate(vec![5], Some(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.holds_valid_value(&5));
        assert_eq!(cache.get_or_calculate_single(5, None).await.unwrap(), Some(10));
        assert_eq!(batches.lock().unwrap().len(), 1);
    }
}
