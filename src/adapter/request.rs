//! ResponseRequest → ChatRequest translation (design §4.6.1).

use crate::types::chat::{
    ChatMessage, ChatRequest, FunctionChoice, FunctionDefinition, MessageRole, Tool, ToolChoice,
};
use crate::types::responses::{
    InputContentPart, InputItem, MessageContentInput, ResponseInput, ResponseRequest,
    ResponsesToolChoice,
};

/// Normalize `input` into a flat item list: a bare string becomes one user
/// message with one `input_text` part, an array is preserved as-is.
pub fn normalize_input(input: &ResponseInput) -> Vec<InputItem> {
    match input {
        ResponseInput::Text(text) => vec![InputItem::Message {
            role: "user".to_string(),
            content: MessageContentInput::Text(text.clone()),
        }],
        ResponseInput::Items(items) => items.clone(),
    }
}

fn role_from_str(role: &str) -> MessageRole {
    match role {
        "system" => MessageRole::System,
        "assistant" => MessageRole::Assistant,
        "tool" => MessageRole::Tool,
        _ => MessageRole::User,
    }
}

/// Translate one normalized `InputItem` into one chat message. Non-text
/// content parts (images) are dropped at this concatenation step; a
/// provider with multimodal support could be forwarded them directly from
/// `content`, but this gateway's adapter only carries the text channel.
fn input_item_to_message(item: &InputItem) -> ChatMessage {
    match item {
        InputItem::Message { role, content } => {
            let parts = InputItem::normalized_content(content);
            let text = parts
                .iter()
                .filter_map(|p| match p {
                    InputContentPart::InputText { text } => Some(text.as_str()),
                    InputContentPart::InputImage { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("");
            ChatMessage {
                role: role_from_str(role),
                content: Some(text),
                name: None,
                tool_calls: None,
                tool_call_id: None,
            }
        }
        InputItem::FunctionCallOutput { call_id, output } => ChatMessage {
            role: MessageRole::Tool,
            content: Some(output.clone()),
            name: None,
            tool_calls: None,
            tool_call_id: Some(call_id.clone()),
        },
    }
}

fn translate_tool_choice(choice: &ResponsesToolChoice) -> ToolChoice {
    match choice {
        ResponsesToolChoice::Mode(mode) => ToolChoice::Mode(mode.clone()),
        ResponsesToolChoice::Function { choice_type, name } => ToolChoice::Specific {
            choice_type: choice_type.clone(),
            function: FunctionChoice { name: name.clone() },
        },
    }
}

fn translate_tools(tools: &[Tool]) -> Vec<Tool> {
    tools
        .iter()
        .map(|t| Tool {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: t.function.name.clone(),
                description: t.function.description.clone(),
                parameters: t.function.parameters.clone(),
            },
        })
        .collect()
}

/// Translate a `ResponseRequest` into a `ChatRequest`, optionally over an
/// already-expanded input list (built by the response store when
/// `previous_response_id` is set — see [`crate::store::ResponseStore::expand`]).
pub fn to_chat_request(request: &ResponseRequest, expanded_input: Option<Vec<InputItem>>) -> ChatRequest {
    let items = expanded_input.unwrap_or_else(|| normalize_input(&request.input));

    let mut messages: Vec<ChatMessage> = Vec::with_capacity(items.len() + 1);
    if let Some(instructions) = &request.instructions {
        messages.push(ChatMessage {
            role: MessageRole::System,
            content: Some(instructions.clone()),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        });
    }
    messages.extend(items.iter().map(input_item_to_message));

    ChatRequest {
        model: request.model.clone(),
        messages,
        temperature: request.temperature,
        top_p: request.top_p,
        max_tokens: request.max_output_tokens,
        stream: request.stream,
        stop: None,
        presence_penalty: None,
        frequency_penalty: None,
        tools: request.tools.as_deref().map(translate_tools),
        tool_choice: request.tool_choice.as_ref().map(translate_tool_choice),
        user: None,
        provider: request.provider.clone(),
        cache: request.cache,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_string_becomes_single_user_message() {
        let items = normalize_input(&ResponseInput::Text("what now?".into()));
        assert_eq!(items.len(), 1);
        match &items[0] {
            InputItem::Message { role, content } => {
                assert_eq!(role, "user");
                match content {
                    MessageContentInput::Text(t) => assert_eq!(t, "what now?"),
                    _ => panic!("expected text shorthand"),
                }
            }
            _ => panic!("expected message"),
        }
    }

    #[test]
    fn function_call_output_becomes_tool_message() {
        let item = InputItem::FunctionCallOutput {
            call_id: "call_1".into(),
            output: "42".into(),
        };
        let msg = input_item_to_message(&item);
        assert_eq!(msg.role, MessageRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.content.as_deref(), Some("42"));
    }

    #[test]
    fn string_shorthand_message_content_is_expanded() {
        let item = InputItem::Message {
            role: "user".into(),
            content: MessageContentInput::Text("hi".into()),
        };
        let msg = input_item_to_message(&item);
        assert_eq!(msg.content.as_deref(), Some("hi"));
    }

    #[test]
    fn tool_choice_function_variant_nests_under_function_key() {
        let choice = ResponsesToolChoice::Function {
            choice_type: "function".into(),
            name: "get_weather".into(),
        };
        match translate_tool_choice(&choice) {
            ToolChoice::Specific { function, .. } => assert_eq!(function.name, "get_weather"),
            _ => panic!("expected specific"),
        }
    }

    #[test]
    fn max_output_tokens_renames_to_max_tokens() {
        let req = ResponseRequest {
            model: "m".into(),
            input: ResponseInput::Text("hi".into()),
            previous_response_id: None,
            instructions: None,
            max_output_tokens: Some(256),
            temperature: None,
            top_p: None,
            tools: None,
            tool_choice: None,
            stream: false,
            provider: None,
            cache: None,
        };
        let chat = to_chat_request(&req, None);
        assert_eq!(chat.max_tokens, Some(256));
    }

    #[test]
    fn gateway_extensions_pass_through() {
        let req = ResponseRequest {
            model: "m".into(),
            input: ResponseInput::Text("hi".into()),
            previous_response_id: None,
            instructions: None,
            max_output_tokens: None,
            temperature: None,
            top_p: None,
            tools: None,
            tool_choice: None,
            stream: true,
            provider: Some("groq".into()),
            cache: Some(false),
        };
        let chat = to_chat_request(&req, None);
        assert!(chat.stream);
        assert_eq!(chat.provider.as_deref(), Some("groq"));
        assert_eq!(chat.cache, Some(false));
    }
}
