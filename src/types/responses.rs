//! OpenResponses (`/v1/responses`) wire types: input items, output items,
//! the `Response` envelope, and the streaming event union.

use serde::{Deserialize, Serialize};

use super::chat::{Tool, Usage};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContentPart {
    InputText { text: String },
    InputImage {
        #[serde(skip_serializing_if = "Option::is_none")]
        image_url: Option<String>,
    },
}

/// `message.content` accepts either the full part array or a bare string
/// shorthand, which [`InputItem::normalized_content`] expands to one
/// `input_text` part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContentInput {
    Text(String),
    Parts(Vec<InputContentPart>),
}

/// A single entry of `ResponseRequest.input`. Bare strings and
/// single-string `message.content` are normalized to the part-array shape
/// before translation; see [`crate::adapter::request::normalize_input`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message {
        role: String,
        content: MessageContentInput,
    },
    FunctionCallOutput {
        call_id: String,
        output: String,
    },
}

impl InputItem {
    /// `content` normalized to a part array regardless of wire shorthand.
    pub fn normalized_content(content: &MessageContentInput) -> Vec<InputContentPart> {
        match content {
            MessageContentInput::Text(text) => vec![InputContentPart::InputText { text: text.clone() }],
            MessageContentInput::Parts(parts) => parts.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContentPart {
    OutputText {
        text: String,
        #[serde(default)]
        annotations: Vec<serde_json::Value>,
    },
    Refusal {
        refusal: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    InProgress,
    Incomplete,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        id: String,
        role: String,
        status: ItemStatus,
        content: Vec<OutputContentPart>,
    },
    FunctionCall {
        id: String,
        name: String,
        call_id: String,
        arguments: String,
        status: ItemStatus,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    InProgress,
    Incomplete,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl From<Usage> for ResponseUsage {
    fn from(u: Usage) -> Self {
        Self {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

/// The `/v1/responses` response envelope, also the payload carried inside
/// `response.created` / `.in_progress` / `.completed` / `.failed` stream
/// events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub object: String,
    pub status: ResponseStatus,
    pub output: Vec<OutputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ResponseUsage>,
    pub model: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

impl Response {
    pub fn object_name() -> &'static str {
        "response"
    }
}

/// The inbound `/v1/responses` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRequest {
    pub model: String,
    pub input: ResponseInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ResponsesToolChoice>,
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
}

/// The OpenResponses `tool_choice` wire shape: `auto|none|required`, or
/// `{type: "function", name}`. Translated to the chat-side [`ToolChoice`]
/// by [`crate::adapter::request::to_chat_request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesToolChoice {
    Mode(String),
    Function {
        #[serde(rename = "type")]
        choice_type: String,
        name: String,
    },
}

/// `input` accepts either a bare string (shorthand for one user message) or
/// a full array of items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseInput {
    Text(String),
    Items(Vec<InputItem>),
}

/// One frame of an OpenResponses SSE stream. `sequence_number` is
/// monotonically increasing across the whole stream; see
/// [`crate::adapter::stream::StreamEmitter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    #[serde(rename = "response.created")]
    ResponseCreated {
        sequence_number: u64,
        response: Response,
    },
    #[serde(rename = "response.in_progress")]
    ResponseInProgress {
        sequence_number: u64,
        response: Response,
    },
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        sequence_number: u64,
        output_index: u32,
        item: OutputItem,
    },
    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        sequence_number: u64,
        output_index: u32,
        content_index: u32,
        part: OutputContentPart,
    },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        sequence_number: u64,
        output_index: u32,
        content_index: u32,
        delta: String,
    },
    #[serde(rename = "response.output_text.done")]
    OutputTextDone {
        sequence_number: u64,
        output_index: u32,
        content_index: u32,
        text: String,
    },
    #[serde(rename = "response.content_part.done")]
    ContentPartDone {
        sequence_number: u64,
        output_index: u32,
        content_index: u32,
        part: OutputContentPart,
    },
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        sequence_number: u64,
        output_index: u32,
        delta: String,
    },
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        sequence_number: u64,
        output_index: u32,
        arguments: String,
    },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        sequence_number: u64,
        output_index: u32,
        item: OutputItem,
    },
    #[serde(rename = "response.completed")]
    ResponseCompleted {
        sequence_number: u64,
        response: Response,
    },
    #[serde(rename = "response.failed")]
    ResponseFailed {
        sequence_number: u64,
        response: Response,
    },
}

impl StreamEvent {
    pub fn sequence_number(&self) -> u64 {
        match self {
            StreamEvent::ResponseCreated { sequence_number, .. }
            | StreamEvent::ResponseInProgress { sequence_number, .. }
            | StreamEvent::OutputItemAdded { sequence_number, .. }
            | StreamEvent::ContentPartAdded { sequence_number, .. }
            | StreamEvent::OutputTextDelta { sequence_number, .. }
            | StreamEvent::OutputTextDone { sequence_number, .. }
            | StreamEvent::ContentPartDone { sequence_number, .. }
            | StreamEvent::FunctionCallArgumentsDelta { sequence_number, .. }
            | StreamEvent::FunctionCallArgumentsDone { sequence_number, .. }
            | StreamEvent::OutputItemDone { sequence_number, .. }
            | StreamEvent::ResponseCompleted { sequence_number, .. }
            | StreamEvent::ResponseFailed { sequence_number, .. } => *sequence_number,
        }
    }

    /// The event name as it appears on the SSE `event:` line.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::ResponseCreated { .. } => "response.created",
            StreamEvent::ResponseInProgress { .. } => "response.in_progress",
            StreamEvent::OutputItemAdded { .. } => "response.output_item.added",
            StreamEvent::ContentPartAdded { .. } => "response.content_part.added",
            StreamEvent::OutputTextDelta { .. } => "response.output_text.delta",
            StreamEvent::OutputTextDone { .. } => "response.output_text.done",
            StreamEvent::ContentPartDone { .. } => "response.content_part.done",
            StreamEvent::FunctionCallArgumentsDelta { .. } => "response.function_call_arguments.delta",
            StreamEvent::FunctionCallArgumentsDone { .. } => "response.function_call_arguments.done",
            StreamEvent::OutputItemDone { .. } => "response.output_item.done",
            StreamEvent::ResponseCompleted { .. } => "response.completed",
            StreamEvent::ResponseFailed { .. } => "response.failed",
        }
    }
}

/// `{response, input}` pair kept by the response store so a later request
/// can continue the conversation via `previous_response_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResponse {
    pub response: Response,
    pub input: Vec<InputItem>,
}
