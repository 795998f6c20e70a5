//! `/v1/responses` (OpenResponses) — unary or SSE, bearer-protected.
//! Bridges to Chat Completions via [`crate::adapter`] and expands
//! `previous_response_id` through the response store.

use actix_web::{web, HttpRequest, HttpResponse};
use bytes::Bytes;
use futures_util::StreamExt;
use tracing::warn;
use uuid::Uuid;

use crate::adapter::{to_chat_request, to_openresponses, translate_stream};
use crate::error::{GatewayError, Result};
use crate::providers::client::sse_chunks;
use crate::server::state::AppState;
use crate::types::responses::{InputItem, ResponseRequest};

fn parse_request(body: &web::Bytes) -> Result<ResponseRequest> {
    let request: ResponseRequest =
        serde_json::from_slice(body).map_err(|e| GatewayError::Validation(format!("invalid request body: {e}")))?;
    if request.model.is_empty() {
        return Err(GatewayError::Validation("model is required".to_string()));
    }
    Ok(request)
}

/// Resolve the conversation's full input list: expanded from the response
/// store when `previous_response_id` is set, otherwise the request's own
/// (normalized) input.
fn resolve_input(state: &AppState, request: &ResponseRequest) -> Result<Vec<InputItem>> {
    match &request.previous_response_id {
        Some(previous_id) => state
            .store
            .expand(previous_id, crate::adapter::request::normalize_input(&request.input))
            .ok_or_else(|| GatewayError::NotFound(format!("unknown previous_response_id: {previous_id}"))),
        None => Ok(crate::adapter::request::normalize_input(&request.input)),
    }
}

pub async fn responses(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes) -> Result<HttpResponse> {
    state.auth.authenticate(&req)?;
    let request = parse_request(&body)?;
    let expanded_input = resolve_input(&state, &request)?;
    let chat_request = to_chat_request(&request, Some(expanded_input.clone()));

    if chat_request.stream {
        return stream_responses(state, chat_request, expanded_input).await;
    }

    let chat_response = state.router.route_unary(&chat_request).await?;
    let response = to_openresponses(chat_response, None);
    state.store.set(response.id.clone(), response.clone(), expanded_input);
    Ok(HttpResponse::Ok().json(response))
}

async fn stream_responses(
    state: web::Data<AppState>,
    chat_request: crate::types::chat::ChatRequest,
    expanded_input: Vec<InputItem>,
) -> Result<HttpResponse> {
    let (provider, bytes) = state.router.route_stream(&chat_request).await?;
    let chunks = sse_chunks(bytes);
    let response_id = format!("resp_{}", Uuid::new_v4().simple());
    let created_at = chrono::Utc::now().timestamp();

    let events = translate_stream(chunks, response_id, chat_request.model.clone(), provider, created_at);

    let store = state.store.clone();
    let body = async_stream::stream! {
        let mut events = events;
        let mut last_response = None;
        while let Some(event) = events.next().await {
            if let crate::types::responses::StreamEvent::ResponseCompleted { response, .. }
            | crate::types::responses::StreamEvent::ResponseFailed { response, .. } = &event
            {
                last_response = Some(response.clone());
            }
            match serde_json::to_string(&event) {
                Ok(json) => {
                    let frame = format!("event: {}\ndata: {json}\n\n", event.event_name());
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from(frame));
                }
                Err(e) => warn!("failed to serialize stream event: {e}"),
            }
        }
        if let Some(response) = last_response {
            store.set(response.id.clone(), response, expanded_input);
        }
        yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b"data: [DONE]\n\n"));
    };

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(body))
}
