//! `/health` and `/health/providers` — unauthenticated liveness and
//! per-provider reachability probes.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::server::state::AppState;

#[derive(Serialize)]
struct Health {
    status: &'static str,
    timestamp: String,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(Health {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
struct ProviderHealth {
    name: String,
    reachable: bool,
    models: Vec<String>,
}

/// GETs `{base_url}/models` for every enabled provider; a non-2xx or
/// network failure marks that provider unreachable without failing the
/// whole probe.
pub async fn health_providers(state: web::Data<AppState>) -> HttpResponse {
    let client = reqwest::Client::new();
    let mut results = Vec::new();

    for provider in state.registry.list() {
        let url = format!("{}/models", provider.base_url.trim_end_matches('/'));
        let probe = client.get(&url).bearer_auth(&provider.api_key).send().await;

        let (reachable, models) = match probe {
            Ok(resp) if resp.status().is_success() => {
                let models = resp
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("data").cloned())
                    .and_then(|data| data.as_array().cloned())
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| item.get("id").and_then(|id| id.as_str()))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_else(|| provider.supported_models.clone());
                (true, models)
            }
            _ => (false, provider.supported_models.clone()),
        };

        results.push(ProviderHealth {
            name: provider.name.clone(),
            reachable,
            models,
        });
    }

    HttpResponse::Ok().json(results)
}
