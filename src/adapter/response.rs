//! Unary `ChatResponse` → `Response` translation (design §4.6.2).

use uuid::Uuid;

use crate::types::chat::ChatResponse;
use crate::types::responses::{
    ItemStatus, OutputContentPart, OutputItem, Response, ResponseStatus, ResponseUsage,
};

/// Translate a completed chat response into an OpenResponses envelope. Each
/// choice's `tool_calls` become `function_call` output items (closed,
/// `completed`) ahead of a single `message` item carrying its text content;
/// a choice with empty content and no tool calls contributes no output item.
pub fn to_openresponses(chat: ChatResponse, response_id: Option<String>) -> Response {
    let id = response_id.unwrap_or_else(|| format!("resp_{}", Uuid::new_v4().simple()));
    let mut output = Vec::new();

    for choice in &chat.choices {
        if let Some(tool_calls) = &choice.message.tool_calls {
            for call in tool_calls {
                output.push(OutputItem::FunctionCall {
                    id: format!("fc_{}", Uuid::new_v4().simple()),
                    name: call.function.name.clone(),
                    call_id: call.id.clone(),
                    arguments: call.function.arguments.clone(),
                    status: ItemStatus::Completed,
                });
            }
        }

        if let Some(content) = &choice.message.content {
            if !content.is_empty() {
                output.push(OutputItem::Message {
                    id: format!("msg_{}", Uuid::new_v4().simple()),
                    role: "assistant".to_string(),
                    status: ItemStatus::Completed,
                    content: vec![OutputContentPart::OutputText {
                        text: content.clone(),
                        annotations: vec![],
                    }],
                });
            }
        }
    }

    Response {
        id,
        object: Response::object_name().to_string(),
        status: ResponseStatus::Completed,
        output,
        error: None,
        usage: Some(ResponseUsage::from(chat.usage)),
        model: chat.model,
        created_at: chat.created,
        provider: Some(chat.provider),
        cached: Some(chat.cached),
    }
}
