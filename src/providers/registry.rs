//! Provider Registry — enumerates enabled providers from configuration and
//! answers `supports(provider, model)` queries. Built once at startup;
//! immutable thereafter. Never probes providers over the network — that is
//! `/health/providers`'s job.

use std::collections::HashMap;

use crate::config::Config;

/// Immutable per-provider descriptor.
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub supported_models: Vec<String>,
    pub timeout_ms: u64,
    pub extra_headers: HashMap<String, String>,
}

impl ProviderDescriptor {
    pub fn supports(&self, native_model: &str) -> bool {
        self.supported_models.iter().any(|m| m == native_model)
    }
}

/// Enumerates enabled providers in configuration order; O(1) name lookup.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    order: Vec<String>,
    by_name: HashMap<String, ProviderDescriptor>,
}

impl ProviderRegistry {
    /// Build from configuration. A provider is *enabled* iff its block is
    /// present and carries a non-empty API key.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::default();
        for name in Self::ordered_names(config) {
            let p = &config.providers[&name];
            if !(p.enabled && p.api_key.as_deref().is_some_and(|k| !k.is_empty())) {
                continue;
            }
            registry.order.push(name.clone());
            registry.by_name.insert(
                name.clone(),
                ProviderDescriptor {
                    name: name.clone(),
                    base_url: p.base_url.clone(),
                    api_key: p.api_key.clone().unwrap_or_default(),
                    supported_models: p.models.clone(),
                    timeout_ms: p.timeout,
                    extra_headers: p.extra_headers.clone(),
                },
            );
        }
        registry
    }

    /// `config.providers` is a `HashMap` with no defined iteration order.
    /// `Config::provider_order` records the source YAML mapping's key
    /// order; any provider present in `config.providers` but missing from
    /// it (e.g. one inserted directly rather than parsed from YAML) is
    /// appended afterward, sorted lexically for determinism.
    fn ordered_names(config: &Config) -> Vec<String> {
        let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
        let mut names: Vec<String> = config
            .provider_order
            .iter()
            .filter(|name| config.providers.contains_key(name.as_str()))
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect();

        let mut remaining: Vec<&String> = config
            .providers
            .keys()
            .filter(|name| !seen.contains(name.as_str()))
            .collect();
        remaining.sort();
        names.extend(remaining.into_iter().cloned());
        names
    }

    pub fn get(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.by_name.get(name)
    }

    /// All enabled providers, in configuration order.
    pub fn list(&self) -> Vec<&ProviderDescriptor> {
        self.order.iter().filter_map(|n| self.by_name.get(n)).collect()
    }

    pub fn supports(&self, provider: &str, native_model: &str) -> bool {
        self.get(provider).is_some_and(|p| p.supports(native_model))
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
