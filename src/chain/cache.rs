use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::source::{ChainSource, SourceError};
use super::types::{TransactionRecord, Wallet};

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

struct CacheInner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    access_order: VecDeque<K>,
    metrics: CacheMetrics,
}

/// Bounded map whose entries expire `ttl` after insertion. When full, the
/// least recently used entry is evicted.
pub struct TtlCache<K, V> {
    ttl: Duration,
    capacity: usize,
    inner: Mutex<CacheInner<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                access_order: VecDeque::new(),
                metrics: CacheMetrics::default(),
            }),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let Some(expired) = inner
            .entries
            .get(key)
            .map(|entry| entry.inserted_at.elapsed() > self.ttl)
        else {
            inner.metrics.misses += 1;
            return None;
        };

        if expired {
            inner.entries.remove(key);
            inner.access_order.retain(|known| known != key);
            inner.metrics.misses += 1;
            inner.metrics.expirations += 1;
            return None;
        }

        inner.access_order.retain(|known| known != key);
        inner.access_order.push_back(key.clone());
        inner.metrics.hits += 1;
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        if inner.entries.len() >= self.capacity
            && !inner.entries.contains_key(&key)
            && let Some(oldest) = inner.access_order.pop_front()
        {
            inner.entries.remove(&oldest);
            inner.metrics.evictions += 1;
        }

        inner.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
        inner.access_order.retain(|known| known != &key);
        inner.access_order.push_back(key);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.access_order.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.inner.lock().metrics
    }
}

/// Wraps a source so repeated lookups within the TTL skip the inner source.
pub struct CachedSource<S> {
    inner: S,
    wallets: TtlCache<String, Option<Wallet>>,
    transactions: TtlCache<(String, usize), Vec<TransactionRecord>>,
}

impl<S: ChainSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration, capacity: usize) -> Self {
        Self {
            inner,
            wallets: TtlCache::new(ttl, capacity),
            transactions: TtlCache::new(ttl, capacity),
        }
    }

    pub fn metrics(&self) -> (CacheMetrics, CacheMetrics) {
        (self.wallets.metrics(), self.transactions.metrics())
    }
}

impl<S: ChainSource> ChainSource for CachedSource<S> {
    fn wallet(&self, address: &str) -> Result<Option<Wallet>, SourceError> {
        let key = address.to_owned();
        if let Some(cached) = self.wallets.get(&key) {
            return Ok(cached);
        }
        let wallet = self.inner.wallet(address)?;
        self.wallets.insert(key, wallet.clone());
        Ok(wallet)
    }

    fn transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, SourceError> {
        let key = (address.to_owned(), limit);
        if let Some(cached) = self.transactions.get(&key) {
            return Ok(cached);
        }
        let records = self.inner.transactions(address, limit)?;
        self.transactions.insert(key, records.clone());
        Ok(records)
    }

    fn display_name(&self, address: &str) -> Option<String> {
        self.inner.display_name(address)
    }

    fn invalidate(&self) {
        let (wallets, transactions) = self.metrics();
        log::debug!("dropping cached lookups (wallets {wallets:?}, transactions {transactions:?})");
        self.wallets.clear();
        self.transactions.clear();
        self.inner.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn hits_and_misses_are_counted() {
        let cache = TtlCache::new(Duration::from_secs(60), 8);
        cache.insert("a".to_owned(), 1);
        assert_eq!(cache.get(&"a".to_owned()), Some(1));
        assert_eq!(cache.get(&"b".to_owned()), None);

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = TtlCache::new(Duration::from_millis(20), 8);
        cache.insert("a".to_owned(), 1);
        thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.get(&"a".to_owned()), None);
        assert_eq!(cache.metrics().expirations, 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_owned(), 1);
        cache.insert("b".to_owned(), 2);
        assert_eq!(cache.get(&"a".to_owned()), Some(1));
        cache.insert("c".to_owned(), 3);

        assert_eq!(cache.get(&"b".to_owned()), None);
        assert_eq!(cache.get(&"a".to_owned()), Some(1));
        assert_eq!(cache.get(&"c".to_owned()), Some(3));
        assert_eq!(cache.metrics().evictions, 1);
    }

    struct CountingSource {
        calls: AtomicUsize,
    }

    impl ChainSource for CountingSource {
        fn wallet(&self, address: &str) -> Result<Option<Wallet>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Wallet::new(address)))
        }

        fn transactions(
            &self,
            _address: &str,
            _limit: usize,
        ) -> Result<Vec<TransactionRecord>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[test]
    fn cached_source_skips_repeat_lookups() {
        let source = CachedSource::new(
            CountingSource {
                calls: AtomicUsize::new(0),
            },
            Duration::from_secs(60),
            16,
        );

        for _ in 0..3 {
            source.wallet("A").expect("wallet");
            source.transactions("A", 50).expect("transactions");
        }
        source.transactions("A", 10).expect("transactions");
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 3);

        source.invalidate();
        source.wallet("A").expect("wallet");
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 4);
    }
}
