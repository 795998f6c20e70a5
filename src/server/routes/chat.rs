//! `/v1/chat/completions` — unary or SSE, bearer-protected.

use actix_web::{web, HttpRequest, HttpResponse};
use async_stream::stream;
use bytes::Bytes;
use futures_util::StreamExt;
use tracing::warn;

use crate::error::{GatewayError, Result};
use crate::providers::client::sse_chunks;
use crate::server::state::AppState;
use crate::types::chat::ChatRequest;

fn parse_request(body: &web::Bytes) -> Result<ChatRequest> {
    let request: ChatRequest =
        serde_json::from_slice(body).map_err(|e| GatewayError::Validation(format!("invalid request body: {e}")))?;
    if request.model.is_empty() {
        return Err(GatewayError::Validation("model is required".to_string()));
    }
    if request.messages.is_empty() {
        return Err(GatewayError::Validation("messages must not be empty".to_string()));
    }
    Ok(request)
}

pub async fn chat_completions(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes) -> Result<HttpResponse> {
    state.auth.authenticate(&req)?;
    let request = parse_request(&body)?;

    if request.stream {
        return stream_chat(state, request).await;
    }

    if let Some(cached) = state.cache.get(&request).await {
        return Ok(HttpResponse::Ok().json(cached));
    }

    let response = state.router.route_unary(&request).await?;
    state.cache.set(&request, &response).await;
    Ok(HttpResponse::Ok().json(response))
}

async fn stream_chat(state: web::Data<AppState>, request: ChatRequest) -> Result<HttpResponse> {
    let (_provider, bytes) = state.router.route_stream(&request).await?;
    let mut chunks = sse_chunks(bytes);

    let body = stream! {
        loop {
            match chunks.next().await {
                Some(Ok(chunk)) => {
                    match serde_json::to_string(&chunk) {
                        Ok(json) => yield Ok::<Bytes, actix_web::Error>(Bytes::from(format!("data: {json}\n\n"))),
                        Err(e) => warn!("failed to serialize chat chunk: {e}"),
                    }
                }
                Some(Err(e)) => {
                    warn!("chat stream error after commit: {e}");
                    let error_body = serde_json::json!({
                        "error": {"type": "api_error", "code": "stream_error", "message": e.to_string()}
                    });
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from(format!("data: {error_body}\n\n")));
                    break;
                }
                None => break,
            }
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
