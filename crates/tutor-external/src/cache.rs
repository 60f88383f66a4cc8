use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use tutor_core::settings::CacheSettings;

/// Key for an external lookup: the first 16 hex chars of
/// `sha256("{action}:{lang}:{query lowercased and trimmed}")`.
pub fn cache_key(query: &str, action: &str, lang: &str) -> String {
    let payload = format!("{}:{}:{}", action, lang, query.trim().to_lowercase());
    let digest = Sha256::digest(payload.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(16);
    key
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub hit_ratio: f64,
    pub size: usize,
    pub max_size: usize,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
    seq: u64,
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    next_seq: u64,
    hits: u64,
    misses: u64,
}

/// TTL cache with insertion-order eviction (not LRU: reads never refresh an
/// entry). Safe to share between concurrent requests.
#[derive(Debug)]
pub struct TtlCache<V> {
    max_size: usize,
    ttl: Duration,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size: max_size.max(1),
            ttl,
            inner: Mutex::new(Inner { entries: HashMap::new(), next_seq: 0, hits: 0, misses: 0 }),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self { Self::new(settings.max_size, settings.ttl()) }

    /// Returns a clone of the live entry. Expired entries are removed and
    /// counted as misses.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get(key) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(entry) => entry.inserted_at.elapsed() > self.ttl,
        };
        if expired {
            inner.entries.remove(key);
            inner.misses += 1;
            debug!(key, "cache entry expired");
            return None;
        }
        inner.hits += 1;
        inner.entries.get(key).map(|e| e.value.clone())
    }

    /// Inserts (or replaces) `key`. When a new key would exceed capacity the
    /// single oldest-inserted entry is evicted first.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_size {
            let oldest = inner.entries.iter().min_by_key(|(_, e)| e.seq).map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
                debug!(key = %oldest, "evicted cache entry");
            }
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(key, Entry { value, inserted_at: Instant::now(), seq });
    }

    pub fn invalidate(&self, key: &str) -> bool { self.inner.lock().entries.remove(key).is_some() }

    /// Drops every entry and resets the hit/miss counters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
        info!("cache cleared");
    }

    pub fn len(&self) -> usize { self.inner.lock().entries.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let total = inner.hits + inner.misses;
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            total_requests: total,
            hit_ratio: if total > 0 { inner.hits as f64 / total as f64 } else { 0.0 },
            size: inner.entries.len(),
            max_size: self.max_size,
        }
    }
}
