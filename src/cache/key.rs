//! Deterministic, collision-resistant fingerprint over exactly the request
//! fields that can affect a response. `provider`, `cache`, `stream`, and
//! `user` deliberately do not contribute.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::types::chat::ChatRequest;

/// A SHA-256 hex digest of the cache-relevant subset of a `ChatRequest`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

#[derive(Serialize)]
struct Fingerprinted<'a> {
    model: &'a str,
    messages: &'a [crate::types::chat::ChatMessage],
    temperature: Option<f32>,
    top_p: Option<f32>,
    max_tokens: Option<u32>,
    stop: &'a Option<Vec<String>>,
    presence_penalty: Option<f32>,
    frequency_penalty: Option<f32>,
}

impl CacheKey {
    pub fn fingerprint(request: &ChatRequest) -> Self {
        let subset = Fingerprinted {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
            stop: &request.stop,
            presence_penalty: request.presence_penalty,
            frequency_penalty: request.frequency_penalty,
        };
        // Serialization is infallible here: every field is a plain,
        // already-validated wire type with no custom fallible Serialize.
        let canonical = serde_json::to_vec(&subset).expect("cache key subset always serializes");
        let digest = Sha256::digest(&canonical);
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::chat::ChatMessage;

    fn base() -> ChatRequest {
        ChatRequest {
            model: "m".into(),
            messages: vec![ChatMessage::user("hi")],
            temperature: Some(0.7),
            top_p: None,
            max_tokens: Some(100),
            stream: false,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            tools: None,
            tool_choice: None,
            user: None,
            provider: None,
            cache: None,
        }
    }

    #[test]
    fn ignored_fields_do_not_affect_the_key() {
        let mut a = base();
        let mut b = base();
        a.provider = Some("groq".into());
        a.cache = Some(false);
        a.stream = true;
        a.user = Some("alice".into());
        b.provider = Some("together".into());
        b.cache = Some(true);
        b.stream = false;
        b.user = Some("bob".into());

        assert_eq!(CacheKey::fingerprint(&a).as_str(), CacheKey::fingerprint(&b).as_str());
    }

    #[test]
    fn relevant_field_changes_the_key() {
        let a = base();
        let mut b = base();
        b.temperature = Some(0.9);
        assert_ne!(CacheKey::fingerprint(&a).as_str(), CacheKey::fingerprint(&b).as_str());
    }

    #[test]
    fn digest_is_64_hex_chars() {
        let key = CacheKey::fingerprint(&base());
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
