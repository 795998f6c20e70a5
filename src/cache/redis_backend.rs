//! Remote KV backend over the `redis` crate, namespacing keys under a
//! configured prefix. Backend errors are swallowed by the caller (`Cache`
//! only ever calls through `CacheBackend`, never propagates backend
//! failures to the request) — here we just log and return an empty/no-op
//! result.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::warn;

use super::CacheBackend;

pub struct RedisCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisCache {
    pub fn new(url: &str, key_prefix: String) -> redis::RedisResult<Self> {
        Ok(Self {
            client: redis::Client::open(url)?,
            key_prefix,
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                warn!("redis cache get: connection failed: {e}");
                return None;
            }
        };
        match conn.get::<_, Option<Vec<u8>>>(self.namespaced(key)).await {
            Ok(v) => v,
            Err(e) => {
                warn!("redis cache get failed: {e}");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                warn!("redis cache set: connection failed: {e}");
                return;
            }
        };
        let result: redis::RedisResult<()> = conn
            .set_ex(self.namespaced(key), value, ttl_secs.max(1))
            .await;
        if let Err(e) = result {
            warn!("redis cache set failed: {e}");
        }
    }

    async fn delete(&self, key: &str) {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                warn!("redis cache delete: connection failed: {e}");
                return;
            }
        };
        let result: redis::RedisResult<()> = conn.del(self.namespaced(key)).await;
        if let Err(e) = result {
            warn!("redis cache delete failed: {e}");
        }
    }

    async fn clear(&self) {
        // No namespaced SCAN+DEL is attempted here; a full flush of a
        // shared Redis instance is deliberately not exposed over this
        // trait. Operators needing this should clear the `key_prefix`
        // namespace directly.
        warn!("redis cache clear() is a no-op; key_prefix must be cleared out of band");
    }
}
