//! In-process LRU cache backend with a max-items bound and per-entry TTL.
//! Mirrors the teacher's L1 tier: an `lru::LruCache` behind a
//! `parking_lot::Mutex` — no async I/O, so a sync lock is fine on the hot
//! path.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;

use super::CacheBackend;

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

pub struct MemoryCache {
    inner: Mutex<LruCache<String, Entry>>,
}

impl MemoryCache {
    pub fn new(max_items: usize) -> Self {
        let capacity = NonZeroUsize::new(max_items).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut guard = self.inner.lock();
        match guard.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                guard.pop(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl_secs.max(1)),
        };
        self.inner.lock().put(key.to_string(), entry);
    }

    async fn delete(&self, key: &str) {
        self.inner.lock().pop(key);
    }

    async fn clear(&self) {
        self.inner.lock().clear();
    }
}
