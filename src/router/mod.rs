//! Router — orders candidate providers per request per strategy and
//! attempts each until one succeeds, with distinct unary vs. streaming
//! commit semantics.

pub mod strategy;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{GatewayError, Result};
use crate::providers::{AliasTable, ProviderClient, ProviderDescriptor, ProviderRegistry};
use crate::types::chat::{ChatRequest, ChatResponse};
use strategy::RoutingStrategy;

pub use crate::providers::client::ByteStream;

/// Process-scoped, per-model round-robin cursor. Lossy on restart and not
/// synchronized for strict fairness — approximate round-robin is the
/// contract (see the concurrency model).
#[derive(Debug, Default)]
pub struct RoundRobinCounters {
    counters: DashMap<String, AtomicUsize>,
}

impl RoundRobinCounters {
    /// Returns the current counter value for `model` and post-increments it
    /// modulo `len`.
    fn next(&self, model: &str, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let counter = self.counters.entry(model.to_string()).or_insert_with(|| AtomicUsize::new(0));
        let current = counter.fetch_add(1, Ordering::Relaxed);
        current % len
    }
}

pub struct Router {
    registry: Arc<ProviderRegistry>,
    aliases: Arc<AliasTable>,
    client: ProviderClient,
    strategy: RoutingStrategy,
    fallback_chain: Option<Vec<String>>,
    round_robin: RoundRobinCounters,
}

impl Router {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        aliases: Arc<AliasTable>,
        strategy: RoutingStrategy,
        fallback_chain: Option<Vec<String>>,
    ) -> Self {
        Self {
            registry,
            aliases,
            client: ProviderClient::new(),
            strategy,
            fallback_chain,
            round_robin: RoundRobinCounters::default(),
        }
    }

    /// Candidate ordering per §4.5: explicit `request.provider` short-circuits
    /// to a single-element (or empty) list; otherwise the fallback chain (or
    /// every enabled provider) is filtered to enabled providers and
    /// reordered by strategy.
    fn candidates(&self, request: &ChatRequest) -> Vec<ProviderDescriptor> {
        if let Some(name) = &request.provider {
            return match self.registry.get(name) {
                Some(p) => vec![p.clone()],
                None => Vec::new(),
            };
        }

        let names: Vec<String> = match &self.fallback_chain {
            Some(chain) => chain.clone(),
            None => self.registry.list().into_iter().map(|p| p.name.clone()).collect(),
        };

        let filtered: Vec<ProviderDescriptor> = names
            .into_iter()
            .filter_map(|name| self.registry.get(&name).cloned())
            .collect();

        self.strategy.order(filtered, &request.model, &self.round_robin)
    }

    /// Resolve native model and build the upstream JSON body for one
    /// candidate, skipping (by returning `None`) when the candidate doesn't
    /// support the resolved model.
    fn prepare(
        &self,
        candidate: &ProviderDescriptor,
        request: &ChatRequest,
        stream: bool,
    ) -> Option<Value> {
        let native_model = self.aliases.resolve(&request.model, &candidate.name);
        if !candidate.supports(&native_model) {
            return None;
        }
        let upstream = request.clone().into_upstream(native_model, stream);
        serde_json::to_value(upstream).ok()
    }

    pub async fn route_unary(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let candidates = self.candidates(request);
        if candidates.is_empty() {
            return Err(GatewayError::NoProvidersAvailable);
        }

        let mut last_error: Option<GatewayError> = None;
        for candidate in &candidates {
            let Some(body) = self.prepare(candidate, request, false) else {
                continue;
            };
            match self.client.invoke_unary(candidate, body).await {
                Ok(response) => {
                    info!(provider = %candidate.name, model = %request.model, "unary route succeeded");
                    return Ok(response);
                }
                Err(e) => {
                    warn!(provider = %candidate.name, error = %e, "candidate failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(GatewayError::AllProvidersFailed {
            last_error: last_error.map(|e| e.to_string()).unwrap_or_else(|| "no attempts made".into()),
        })
    }

    /// Streaming route: fallback is only possible before the first
    /// successful header phase (the commit point). Once a candidate returns
    /// 200, its byte stream is piped straight through; a later upstream
    /// failure is not routed back here.
    pub async fn route_stream(&self, request: &ChatRequest) -> Result<(String, ByteStream)> {
        let candidates = self.candidates(request);
        if candidates.is_empty() {
            return Err(GatewayError::NoProvidersAvailable);
        }

        let mut last_error: Option<GatewayError> = None;
        for candidate in &candidates {
            let Some(body) = self.prepare(candidate, request, true) else {
                continue;
            };
            match self.client.invoke_streaming(candidate, body).await {
                Ok(stream) => {
                    info!(provider = %candidate.name, model = %request.model, "stream route committed");
                    return Ok((candidate.name.clone(), stream));
                }
                Err(e) => {
                    warn!(provider = %candidate.name, error = %e, "candidate failed before commit, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(GatewayError::AllProvidersFailed {
            last_error: last_error.map(|e| e.to_string()).unwrap_or_else(|| "no attempts made".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::registry::ProviderDescriptor;
    use std::collections::HashMap;

    fn desc(name: &str, models: &[&str]) -> ProviderDescriptor {
        ProviderDescriptor {
            name: name.into(),
            base_url: "https://example.test".into(),
            api_key: "k".into(),
            supported_models: models.iter().map(|s| s.to_string()).collect(),
            timeout_ms: 1000,
            extra_headers: HashMap::new(),
        }
    }

    fn registry_with(providers: Vec<ProviderDescriptor>) -> ProviderRegistry {
        let mut config = crate::config::Config::default();
        for p in &providers {
            config.providers.insert(
                p.name.clone(),
                crate::config::ProviderConfig {
                    enabled: true,
                    api_key: Some(p.api_key.clone()),
                    base_url: p.base_url.clone(),
                    models: p.supported_models.clone(),
                    timeout: p.timeout_ms,
                    extra_headers: p.extra_headers.clone(),
                },
            );
        }
        ProviderRegistry::from_config(&config)
    }

    fn chat_request(model: &str, provider: Option<&str>) -> ChatRequest {
        ChatRequest {
            model: model.into(),
            messages: vec![crate::types::chat::ChatMessage::user("hi")],
            temperature: None,
            top_p: None,
            max_tokens: None,
            stream: false,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            tools: None,
            tool_choice: None,
            user: None,
            provider: provider.map(str::to_string),
            cache: None,
        }
    }

    #[test]
    fn explicit_provider_narrows_to_single_candidate() {
        let registry = Arc::new(registry_with(vec![desc("groq", &["m"]), desc("together", &["m"])]));
        let router = Router::new(registry, Arc::new(AliasTable::default()), RoutingStrategy::FirstAvailable, None);
        let req = chat_request("m", Some("together"));
        let candidates = router.candidates(&req);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "together");
    }

    #[test]
    fn explicit_provider_not_enabled_yields_no_candidates() {
        let registry = Arc::new(registry_with(vec![desc("groq", &["m"])]));
        let router = Router::new(registry, Arc::new(AliasTable::default()), RoutingStrategy::FirstAvailable, None);
        let req = chat_request("m", Some("cerebras"));
        assert!(router.candidates(&req).is_empty());
    }

    #[test]
    fn round_robin_visits_each_provider_at_position_zero_within_n_requests() {
        let registry = Arc::new(registry_with(vec![desc("a", &["m"]), desc("b", &["m"]), desc("c", &["m"])]));
        let router = Router::new(registry, Arc::new(AliasTable::default()), RoutingStrategy::RoundRobin, None);
        let req = chat_request("m", None);

        let mut first_positions = Vec::new();
        for _ in 0..3 {
            let candidates = router.candidates(&req);
            first_positions.push(candidates[0].name.clone());
        }
        let mut sorted = first_positions.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["a", "b", "c"]);
    }

    #[test]
    fn skips_candidate_whose_supported_models_excludes_native_model() {
        let registry = Arc::new(registry_with(vec![desc("groq", &["other-model"])]));
        let router = Router::new(registry, Arc::new(AliasTable::default()), RoutingStrategy::FirstAvailable, None);
        let candidates = router.candidates(&chat_request("m", None));
        assert_eq!(candidates.len(), 1);
        assert!(router.prepare(&candidates[0], &chat_request("m", None), false).is_none());
    }

    #[tokio::test]
    async fn no_candidates_fails_with_no_providers_available() {
        let registry = Arc::new(registry_with(vec![]));
        let router = Router::new(registry, Arc::new(AliasTable::default()), RoutingStrategy::FirstAvailable, None);
        let err = router.route_unary(&chat_request("m", None)).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoProvidersAvailable));
    }
}
