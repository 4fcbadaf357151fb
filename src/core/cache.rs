use crate::core::clock::Clock;
use crate::core::quote::{AssetType, Quote};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Age at which a cached quote stops being served.
pub const QUOTE_TTL: Duration = Duration::minutes(15);

type CacheKey = (AssetType, String);

struct CacheEntry {
    quote: Quote,
    stored_at: DateTime<Utc>,
}

/// Process-local quote cache with lazy expiry. Entries are only evicted when
/// an expired key is looked up; there is no background sweep.
pub struct QuoteCache {
    inner: Mutex<HashMap<CacheKey, CacheEntry>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl QuoteCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            clock,
            ttl: QUOTE_TTL,
        }
    }

    fn key(asset_type: AssetType, code: &str) -> CacheKey {
        (asset_type, code.trim().to_uppercase())
    }

    pub async fn get(&self, asset_type: AssetType, code: &str) -> Option<Quote> {
        let key = Self::key(asset_type, code);
        let now = self.clock.now();
        let mut cache = self.inner.lock().await;
        match cache.get(&key) {
            Some(entry) if now - entry.stored_at >= self.ttl => {
                debug!(%asset_type, code = %key.1, "Cache entry expired");
                cache.remove(&key);
                None
            }
            Some(entry) => {
                debug!(%asset_type, code = %key.1, "Cache HIT");
                Some(entry.quote.clone())
            }
            None => {
                debug!(%asset_type, code = %key.1, "Cache MISS");
                None
            }
        }
    }

    pub async fn put(&self, asset_type: AssetType, code: &str, quote: Quote) {
        let key = Self::key(asset_type, code);
        let entry = CacheEntry {
            quote,
            stored_at: self.clock.now(),
        };
        let mut cache = self.inner.lock().await;
        debug!(%asset_type, code = %key.1, "Cache PUT");
        cache.insert(key, entry);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
