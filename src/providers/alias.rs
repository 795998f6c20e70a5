//! Model Alias Resolver — maps a friendly model name to a provider-native
//! one via a two-level table. Intentionally total: an unknown friendly name
//! passes through unchanged so providers can accept their own native names
//! directly.

use std::collections::HashMap;

use crate::config::Config;

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    table: HashMap<String, HashMap<String, String>>,
}

impl AliasTable {
    pub fn from_config(config: &Config) -> Self {
        Self {
            table: config.routing.model_aliases.clone(),
        }
    }

    /// `alias_table[friendly][provider]`, falling back to `friendly`
    /// unchanged when no mapping exists.
    pub fn resolve(&self, friendly_model: &str, provider_name: &str) -> String {
        self.table
            .get(friendly_model)
            .and_then(|by_provider| by_provider.get(provider_name))
            .cloned()
            .unwrap_or_else(|| friendly_model.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AliasTable {
        let mut inner = HashMap::new();
        let mut per_provider = HashMap::new();
        per_provider.insert("groq".to_string(), "llama-3.1-70b-versatile".to_string());
        per_provider.insert(
            "together".to_string(),
            "meta-llama/Llama-3.1-70B-Instruct-Turbo".to_string(),
        );
        inner.insert("llama-70b".to_string(), per_provider);
        AliasTable { table: inner }
    }

    #[test]
    fn resolves_known_alias_per_provider() {
        let t = table();
        assert_eq!(t.resolve("llama-70b", "groq"), "llama-3.1-70b-versatile");
        assert_eq!(
            t.resolve("llama-70b", "together"),
            "meta-llama/Llama-3.1-70B-Instruct-Turbo"
        );
    }

    #[test]
    fn unknown_friendly_name_passes_through() {
        let t = table();
        assert_eq!(t.resolve("gpt-4o-mini", "groq"), "gpt-4o-mini");
    }

    #[test]
    fn known_friendly_name_unmapped_provider_passes_through() {
        let t = table();
        assert_eq!(t.resolve("llama-70b", "cerebras"), "llama-70b");
    }
}
