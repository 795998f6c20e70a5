//! Content-addressed response cache: a deterministic fingerprint over the
//! cache-relevant request fields, and a pluggable `{get, set, delete,
//! clear}` KV backend.

pub mod key;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_backend;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::config::{CacheBackendKind, CacheConfig};
use crate::error::GatewayError;
use crate::types::chat::{ChatRequest, ChatResponse};
pub use key::CacheKey;
pub use memory::MemoryCache;

/// The key/value contract any cache backend must satisfy. `get`/`set`
/// operate on pre-serialized JSON bytes so the backend stays oblivious to
/// the value's shape.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64);
    async fn delete(&self, key: &str);
    async fn clear(&self);
}

/// Front door for the router/handlers: applies the policy in the design
/// (disabled cache, `cache=false`, or `stream=true` all short-circuit to a
/// miss/no-op) before ever touching the backend.
pub struct Cache {
    enabled: bool,
    ttl_secs: u64,
    backend: Arc<dyn CacheBackend>,
}

impl Cache {
    pub fn new(config: &CacheConfig, backend: Arc<dyn CacheBackend>) -> Self {
        let ttl_secs = match config.backend {
            CacheBackendKind::Memory => config.memory.ttl,
            CacheBackendKind::Redis => config.redis.as_ref().map(|r| r.ttl).unwrap_or(3600),
        };
        Self {
            enabled: config.enabled,
            ttl_secs,
            backend,
        }
    }

    pub async fn get(&self, request: &ChatRequest) -> Option<ChatResponse> {
        if !self.enabled || !request.cacheable() {
            return None;
        }
        let key = CacheKey::fingerprint(request);
        let bytes = self.backend.get(key.as_str()).await?;
        match serde_json::from_slice::<ChatResponse>(&bytes) {
            Ok(mut response) => {
                response.cached = true;
                Some(response)
            }
            Err(e) => {
                let err = GatewayError::Cache(format!("corrupt cache entry for {}: {e}", key.as_str()));
                warn!("{err}");
                None
            }
        }
    }

    pub async fn set(&self, request: &ChatRequest, response: &ChatResponse) {
        if !self.enabled || !request.cacheable() {
            return;
        }
        let key = CacheKey::fingerprint(request);
        match serde_json::to_vec(response) {
            Ok(bytes) => self.backend.set(key.as_str(), bytes, self.ttl_secs).await,
            Err(e) => warn!("{}", GatewayError::Cache(format!("failed to serialize response for cache: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::chat::{ChatMessage, Choice, Usage};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        store: Mutex<std::collections::HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl CacheBackend for FakeBackend {
        async fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.store.lock().unwrap().get(key).cloned()
        }
        async fn set(&self, key: &str, value: Vec<u8>, _ttl_secs: u64) {
            self.store.lock().unwrap().insert(key.to_string(), value);
        }
        async fn delete(&self, key: &str) {
            self.store.lock().unwrap().remove(key);
        }
        async fn clear(&self) {
            self.store.lock().unwrap().clear();
        }
    }

    fn request(stream: bool, cache: Option<bool>) -> ChatRequest {
        ChatRequest {
            model: "m".into(),
            messages: vec![ChatMessage::user("hi")],
            temperature: None,
            top_p: None,
            max_tokens: None,
            stream,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            tools: None,
            tool_choice: None,
            user: None,
            provider: None,
            cache,
        }
    }

    fn response() -> ChatResponse {
        ChatResponse {
            id: "id".into(),
            object: "chat.completion".into(),
            created: 0,
            model: "m".into(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage::assistant("hello"),
                finish_reason: Some("stop".into()),
            }],
            usage: Usage::default(),
            provider: "groq".into(),
            cached: false,
        }
    }

    fn enabled_cache() -> Cache {
        let config = CacheConfig {
            enabled: true,
            ..Default::default()
        };
        Cache::new(&config, Arc::new(FakeBackend::default()))
    }

    #[tokio::test]
    async fn roundtrip_hit_marks_cached_true() {
        let cache = enabled_cache();
        let req = request(false, None);
        assert!(cache.get(&req).await.is_none());
        cache.set(&req, &response()).await;
        let hit = cache.get(&req).await.unwrap();
        assert!(hit.cached);
        assert_eq!(hit.id, "id");
    }

    #[tokio::test]
    async fn streaming_requests_never_read_or_write_cache() {
        let cache = enabled_cache();
        let req = request(true, None);
        cache.set(&req, &response()).await;
        assert!(cache.get(&req).await.is_none());
    }

    #[tokio::test]
    async fn explicit_cache_false_bypasses_cache() {
        let cache = enabled_cache();
        let req = request(false, Some(false));
        cache.set(&req, &response()).await;
        assert!(cache.get(&req).await.is_none());
    }

    #[tokio::test]
    async fn globally_disabled_cache_is_always_a_miss() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let cache = Cache::new(&config, Arc::new(FakeBackend::default()));
        let req = request(false, None);
        cache.set(&req, &response()).await;
        assert!(cache.get(&req).await.is_none());
    }

    #[tokio::test]
    async fn requests_differing_only_in_ignored_fields_share_a_cache_entry() {
        let cache = enabled_cache();
        let mut r1 = request(false, None);
        r1.provider = Some("groq".into());
        r1.user = Some("alice".into());
        cache.set(&r1, &response()).await;

        let mut r2 = request(false, None);
        r2.provider = Some("together".into());
        r2.user = Some("bob".into());
        assert!(cache.get(&r2).await.is_some());
    }
}
