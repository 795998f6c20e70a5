//! `/v1/models` — OpenAI-compatible model listing, bearer-protected.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;

use crate::error::Result;
use crate::server::state::AppState;

#[derive(Serialize)]
struct ModelInfo {
    id: String,
    object: &'static str,
    created: i64,
    owned_by: String,
}

#[derive(Serialize)]
struct ModelList {
    object: &'static str,
    data: Vec<ModelInfo>,
}

pub async fn list_models(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    state.auth.authenticate(&req)?;

    let data = state
        .registry
        .list()
        .into_iter()
        .flat_map(|provider| {
            provider.supported_models.iter().map(move |model| ModelInfo {
                id: format!("{}/{}", provider.name, model),
                object: "model",
                created: 0,
                owned_by: provider.name.clone(),
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(ModelList { object: "list", data }))
}
