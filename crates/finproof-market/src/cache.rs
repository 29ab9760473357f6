//! TTL caches in front of the remote providers

use crate::config::MarketConfig;
use crate::news::Headline;
use cached::{Cached, TimedCache};
use finproof_core::{MarketDataset, TickerInfo};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key for provider requests
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Normalized symbol
    pub symbol: String,
    /// Operation, e.g. "history"
    pub endpoint: String,
    /// Request qualifier such as the period
    pub params: String,
}

impl CacheKey {
    pub fn new(
        symbol: impl Into<String>,
        endpoint: impl Into<String>,
        params: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            endpoint: endpoint.into(),
            params: params.into(),
        }
    }
}

/// Thread-safe cache whose entries expire after a fixed lifespan
pub struct MarketCache<V> {
    cache: Arc<RwLock<TimedCache<CacheKey, V>>>,
}

impl<V: Clone> MarketCache<V> {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Get a live value
    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        // expiry check mutates, so a read lock is not enough
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, value: V) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Return the cached value or fetch, cache and return a fresh one
    ///
    /// Values rejected by `keep` are returned but not cached, so a transient
    /// failure does not pin an empty answer for the whole TTL.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, keep: fn(&V) -> bool, fetcher: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!(symbol = %key.symbol, endpoint = %key.endpoint, "Cache hit");
            return value;
        }

        tracing::debug!(symbol = %key.symbol, endpoint = %key.endpoint, "Cache miss");
        let value = fetcher().await;
        if keep(&value) {
            self.insert(key, value.clone()).await;
        }
        value
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_remove(key);
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    /// Number of stored entries, including ones not yet evicted
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<V> Clone for MarketCache<V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

/// One cache per data kind, each with its own TTL
#[derive(Clone)]
pub struct CacheTiers {
    pub market_data: MarketCache<MarketDataset>,
    pub ticker_info: MarketCache<TickerInfo>,
    pub news: MarketCache<Vec<Headline>>,
}

impl CacheTiers {
    pub fn from_config(config: &MarketConfig) -> Self {
        Self {
            market_data: MarketCache::new(config.cache_ttl_market_data),
            ticker_info: MarketCache::new(config.cache_ttl_ticker_info),
            news: MarketCache::new(config.cache_ttl_news),
        }
    }

    /// Clear all caches
    pub async fn clear_all(&self) {
        self.market_data.clear().await;
        self.ticker_info.clear().await;
        self.news.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(symbol: &str) -> CacheKey {
        CacheKey::new(symbol, "history", "1y")
    }

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = MarketCache::new(Duration::from_secs(60));
        cache.insert(key("AAPL"), 150.0_f64).await;

        assert_eq!(cache.get(&key("AAPL")).await, Some(150.0));
        assert_eq!(cache.get(&key("MSFT")).await, None);
    }

    #[tokio::test]
    async fn test_get_or_fetch_uses_cache() {
        let cache = MarketCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let fetch = || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { vec![1.0_f64, 2.0] }
        };

        let first = cache.get_or_fetch(key("AAPL"), |v| !v.is_empty(), fetch).await;
        let second = cache.get_or_fetch(key("AAPL"), |v| !v.is_empty(), fetch).await;

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_values_are_not_cached() {
        let cache: MarketCache<Vec<f64>> = MarketCache::new(Duration::from_secs(60));
        let value = cache
            .get_or_fetch(key("ZZZZ"), |v| !v.is_empty(), || async { Vec::new() })
            .await;

        assert!(value.is_empty());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MarketCache::new(Duration::from_millis(50));
        cache.insert(key("AAPL"), 1_u32).await;
        assert!(cache.get(&key("AAPL")).await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get(&key("AAPL")).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = MarketCache::new(Duration::from_secs(60));
        for symbol in ["A", "B", "C"] {
            cache.insert(key(symbol), symbol.to_string()).await;
        }
        cache.invalidate(&key("A")).await;
        assert!(cache.get(&key("A")).await.is_none());
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_tiers_clear_all() {
        let tiers = CacheTiers::from_config(&MarketConfig::default());
        tiers
            .market_data
            .insert(key("AAPL"), MarketDataset::from_closes("AAPL", &[1.0]))
            .await;
        tiers
            .ticker_info
            .insert(key("AAPL"), TickerInfo::new("AAPL"))
            .await;

        tiers.clear_all().await;
        assert!(tiers.market_data.is_empty().await);
        assert!(tiers.ticker_info.is_empty().await);
    }
}
