//! The OpenResponses streaming state machine: translates a `ChatChunk`
//! stream into a `StreamEvent` stream (design §4.6.3).
//!
//! Structured as a pull-based state machine (`StreamEmitter`) driven by
//! [`translate_stream`], which wraps it around the upstream chunk stream
//! with `async_stream` so backpressure from the downstream writer
//! propagates to the upstream poll.

use std::pin::Pin;

use async_stream::stream;
use futures_util::{Stream, StreamExt};
use uuid::Uuid;

use crate::error::Result;
use crate::types::chat::ChatChunk;
use crate::types::responses::{
    ItemStatus, OutputContentPart, OutputItem, Response, ResponseStatus, StreamEvent,
};

struct FunctionState {
    id: String,
    call_id: String,
    name: String,
    arguments: String,
    output_index: u32,
    closed: bool,
}

struct MessageState {
    id: String,
    text: String,
    output_index: u32,
    closed: bool,
}

#[derive(Default)]
struct ChoiceState {
    function: Option<FunctionState>,
    message: Option<MessageState>,
}

/// Per-stream state for one OpenResponses translation. Created fresh per
/// request; never shared across streams or with handler locals.
pub struct StreamEmitter {
    sequence_number: u64,
    response_id: String,
    model: String,
    created_at: i64,
    provider: String,
    next_output_index: u32,
    choices: Vec<(u32, ChoiceState)>,
}

impl StreamEmitter {
    pub fn new(response_id: String, model: String, provider: String, created_at: i64) -> Self {
        Self {
            sequence_number: 0,
            response_id,
            model,
            created_at,
            provider,
            next_output_index: 0,
            choices: Vec::new(),
        }
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.sequence_number;
        self.sequence_number += 1;
        seq
    }

    fn placeholder_response(&self, status: ResponseStatus) -> Response {
        Response {
            id: self.response_id.clone(),
            object: Response::object_name().to_string(),
            status,
            output: Vec::new(),
            error: None,
            usage: None,
            model: self.model.clone(),
            created_at: self.created_at,
            provider: Some(self.provider.clone()),
            cached: Some(false),
        }
    }

    fn choice_mut(&mut self, index: u32) -> &mut ChoiceState {
        if let Some(pos) = self.choices.iter().position(|(i, _)| *i == index) {
            &mut self.choices[pos].1
        } else {
            self.choices.push((index, ChoiceState::default()));
            &mut self.choices.last_mut().unwrap().1
        }
    }

    /// `response.created` then `response.in_progress`, both carrying an
    /// empty, `in_progress` placeholder response.
    pub fn open(&mut self) -> Vec<StreamEvent> {
        let created = StreamEvent::ResponseCreated {
            sequence_number: self.next_seq(),
            response: self.placeholder_response(ResponseStatus::InProgress),
        };
        let in_progress = StreamEvent::ResponseInProgress {
            sequence_number: self.next_seq(),
            response: self.placeholder_response(ResponseStatus::InProgress),
        };
        vec![created, in_progress]
    }

    fn close_function(&mut self, choice_index: u32) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let state = self.choice_mut(choice_index);
        let Some(function) = &mut state.function else {
            return events;
        };
        if function.closed {
            return events;
        }
        function.closed = true;
        let output_index = function.output_index;
        let arguments = function.arguments.clone();
        events.push(StreamEvent::FunctionCallArgumentsDone {
            sequence_number: self.next_seq(),
            output_index,
            arguments: arguments.clone(),
        });
        let item = OutputItem::FunctionCall {
            id: function.id.clone(),
            name: function.name.clone(),
            call_id: function.call_id.clone(),
            arguments,
            status: ItemStatus::Completed,
        };
        events.push(StreamEvent::OutputItemDone {
            sequence_number: self.next_seq(),
            output_index,
            item,
        });
        events
    }

    fn close_message(&mut self, choice_index: u32) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let state = self.choice_mut(choice_index);
        let Some(message) = &mut state.message else {
            return events;
        };
        if message.closed {
            return events;
        }
        message.closed = true;
        let output_index = message.output_index;
        let text = message.text.clone();
        let part = OutputContentPart::OutputText {
            text: text.clone(),
            annotations: vec![],
        };
        events.push(StreamEvent::OutputTextDone {
            sequence_number: self.next_seq(),
            output_index,
            content_index: 0,
            text: text.clone(),
        });
        events.push(StreamEvent::ContentPartDone {
            sequence_number: self.next_seq(),
            output_index,
            content_index: 0,
            part: part.clone(),
        });
        let item = OutputItem::Message {
            id: message.id.clone(),
            role: "assistant".to_string(),
            status: ItemStatus::Completed,
            content: vec![part],
        };
        events.push(StreamEvent::OutputItemDone {
            sequence_number: self.next_seq(),
            output_index,
            item,
        });
        events
    }

    /// Translate one upstream chunk into zero or more stream events.
    pub fn handle_chunk(&mut self, chunk: &ChatChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for choice in &chunk.choices {
            let choice_index = choice.index;

            for tool_call in choice.delta.tool_calls.iter().flatten() {
                if let Some(name) = tool_call.function.as_ref().and_then(|f| f.name.clone()) {
                    let already_open = self.choice_mut(choice_index).function.is_some();
                    if !already_open {
                        let output_index = self.next_output_index;
                        self.next_output_index += 1;
                        let fc_id = format!("fc_{}", Uuid::new_v4().simple());
                        let call_id = tool_call
                            .id
                            .clone()
                            .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));
                        let item = OutputItem::FunctionCall {
                            id: fc_id.clone(),
                            name: name.clone(),
                            call_id: call_id.clone(),
                            arguments: String::new(),
                            status: ItemStatus::InProgress,
                        };
                        events.push(StreamEvent::OutputItemAdded {
                            sequence_number: self.next_seq(),
                            output_index,
                            item,
                        });
                        self.choice_mut(choice_index).function = Some(FunctionState {
                            id: fc_id,
                            call_id,
                            name,
                            arguments: String::new(),
                            output_index,
                            closed: false,
                        });
                    }
                }

                if let Some(arguments) = tool_call.function.as_ref().and_then(|f| f.arguments.clone()) {
                    let state = self.choice_mut(choice_index);
                    if let Some(function) = &mut state.function {
                        if !function.closed {
                            function.arguments.push_str(&arguments);
                            let output_index = function.output_index;
                            events.push(StreamEvent::FunctionCallArgumentsDelta {
                                sequence_number: self.next_seq(),
                                output_index,
                                delta: arguments,
                            });
                        }
                    }
                }
            }

            if let Some(content) = &choice.delta.content {
                let message_open = self.choice_mut(choice_index).message.is_some();
                if !message_open {
                    // The function call closes before the message opens so
                    // the two occupy distinct, ordered output indices.
                    events.extend(self.close_function(choice_index));

                    let output_index = self.next_output_index;
                    self.next_output_index += 1;
                    let msg_id = format!("msg_{}", Uuid::new_v4().simple());
                    let item = OutputItem::Message {
                        id: msg_id.clone(),
                        role: "assistant".to_string(),
                        status: ItemStatus::InProgress,
                        content: vec![],
                    };
                    events.push(StreamEvent::OutputItemAdded {
                        sequence_number: self.next_seq(),
                        output_index,
                        item,
                    });
                    events.push(StreamEvent::ContentPartAdded {
                        sequence_number: self.next_seq(),
                        output_index,
                        content_index: 0,
                        part: OutputContentPart::OutputText {
                            text: String::new(),
                            annotations: vec![],
                        },
                    });
                    self.choice_mut(choice_index).message = Some(MessageState {
                        id: msg_id,
                        text: String::new(),
                        output_index,
                        closed: false,
                    });
                }

                let state = self.choice_mut(choice_index);
                if let Some(message) = &mut state.message {
                    if !message.closed {
                        message.text.push_str(content);
                        let output_index = message.output_index;
                        events.push(StreamEvent::OutputTextDelta {
                            sequence_number: self.next_seq(),
                            output_index,
                            content_index: 0,
                            delta: content.clone(),
                        });
                    }
                }
            }

            if choice.finish_reason.is_some() {
                events.extend(self.close_function(choice_index));
                events.extend(self.close_message(choice_index));
            }
        }
        events
    }

    /// Close any items left dangling (no `finish_reason` ever arrived) and
    /// emit `response.completed`.
    pub fn complete(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let indices: Vec<u32> = self.choices.iter().map(|(i, _)| *i).collect();
        for index in indices {
            events.extend(self.close_function(index));
            events.extend(self.close_message(index));
        }

        let mut output = Vec::new();
        for (_, state) in &self.choices {
            if let Some(function) = &state.function {
                output.push(OutputItem::FunctionCall {
                    id: function.id.clone(),
                    name: function.name.clone(),
                    call_id: function.call_id.clone(),
                    arguments: function.arguments.clone(),
                    status: ItemStatus::Completed,
                });
            }
            if let Some(message) = &state.message {
                output.push(OutputItem::Message {
                    id: message.id.clone(),
                    role: "assistant".to_string(),
                    status: ItemStatus::Completed,
                    content: vec![OutputContentPart::OutputText {
                        text: message.text.clone(),
                        annotations: vec![],
                    }],
                });
            }
        }

        let mut response = self.placeholder_response(ResponseStatus::Completed);
        response.output = output;
        events.push(StreamEvent::ResponseCompleted {
            sequence_number: self.next_seq(),
            response,
        });
        events
    }

    /// Emit `response.failed` in place of `response.completed` when the
    /// upstream stream errors after the header phase.
    pub fn fail(&mut self, message: String) -> Vec<StreamEvent> {
        let mut response = self.placeholder_response(ResponseStatus::Failed);
        response.error = Some(crate::types::responses::ResponseError {
            code: "stream_error".to_string(),
            message,
        });
        vec![StreamEvent::ResponseFailed {
            sequence_number: self.next_seq(),
            response,
        }]
    }
}

/// Drive a `StreamEmitter` over an upstream chunk stream, yielding
/// `StreamEvent`s as they're produced. The consumer (HTTP writer) pulls;
/// each poll of the returned stream polls the upstream chunk stream in
/// turn, so backpressure propagates naturally.
pub fn translate_stream(
    mut chunks: Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>,
    response_id: String,
    model: String,
    provider: String,
    created_at: i64,
) -> Pin<Box<dyn Stream<Item = StreamEvent> + Send>> {
    let mut emitter = StreamEmitter::new(response_id, model, provider, created_at);
    Box::pin(stream! {
        for event in emitter.open() {
            yield event;
        }
        loop {
            match chunks.next().await {
                Some(Ok(chunk)) => {
                    for event in emitter.handle_chunk(&chunk) {
                        yield event;
                    }
                }
                Some(Err(e)) => {
                    for event in emitter.fail(e.to_string()) {
                        yield event;
                    }
                    return;
                }
                None => {
                    for event in emitter.complete() {
                        yield event;
                    }
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::chat::{ChunkChoice, ChunkDelta, FunctionCallDelta, ToolCallDelta};

    fn chunk(choices: Vec<ChunkChoice>) -> ChatChunk {
        ChatChunk {
            id: "1".into(),
            object: "chat.completion.chunk".into(),
            created: 1000,
            model: "m".into(),
            choices,
        }
    }

    fn tool_call_chunk(id: Option<&str>, name: Option<&str>, arguments: Option<&str>) -> ChatChunk {
        chunk(vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta {
                role: None,
                content: None,
                tool_calls: Some(vec![ToolCallDelta {
                    index: 0,
                    id: id.map(String::from),
                    function: Some(FunctionCallDelta {
                        name: name.map(String::from),
                        arguments: arguments.map(String::from),
                    }),
                }]),
            },
            finish_reason: None,
        }])
    }

    fn content_chunk(text: &str) -> ChatChunk {
        chunk(vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta {
                role: None,
                content: Some(text.to_string()),
                tool_calls: None,
            },
            finish_reason: None,
        }])
    }

    fn finish_chunk() -> ChatChunk {
        chunk(vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta {
                role: None,
                content: None,
                tool_calls: None,
            },
            finish_reason: Some("stop".to_string()),
        }])
    }

    #[test]
    fn sequence_numbers_are_strictly_monotonic_with_no_gaps() {
        let mut emitter = StreamEmitter::new("resp_1".into(), "m".into(), "groq".into(), 1000);
        let mut events = emitter.open();
        events.extend(emitter.handle_chunk(&tool_call_chunk(Some("call_1"), Some("f"), None)));
        events.extend(emitter.handle_chunk(&tool_call_chunk(None, None, Some("{\"x\":"))));
        events.extend(emitter.handle_chunk(&tool_call_chunk(None, None, Some("1}"))));
        events.extend(emitter.handle_chunk(&content_chunk("done")));
        events.extend(emitter.handle_chunk(&finish_chunk()));
        events.extend(emitter.complete());

        let seqs: Vec<u64> = events.iter().map(|e| e.sequence_number()).collect();
        let expected: Vec<u64> = (0..seqs.len() as u64).collect();
        assert_eq!(seqs, expected);
    }

    #[test]
    fn function_call_closes_before_message_opens() {
        let mut emitter = StreamEmitter::new("resp_1".into(), "m".into(), "groq".into(), 1000);
        let mut events = emitter.open();
        events.extend(emitter.handle_chunk(&tool_call_chunk(Some("call_1"), Some("f"), None)));
        events.extend(emitter.handle_chunk(&content_chunk("done")));

        let names: Vec<&'static str> = events.iter().map(|e| e.event_name()).collect();
        let fc_done_pos = names.iter().position(|n| *n == "response.output_item.done").unwrap();
        let msg_added_pos = names
            .iter()
            .rposition(|n| *n == "response.output_item.added")
            .unwrap();
        assert!(fc_done_pos < msg_added_pos);
    }

    #[test]
    fn output_indices_are_distinct_and_non_overlapping() {
        let mut emitter = StreamEmitter::new("resp_1".into(), "m".into(), "groq".into(), 1000);
        let mut events = emitter.open();
        events.extend(emitter.handle_chunk(&tool_call_chunk(Some("call_1"), Some("f"), None)));
        events.extend(emitter.handle_chunk(&content_chunk("done")));
        events.extend(emitter.handle_chunk(&finish_chunk()));
        events.extend(emitter.complete());

        let added_indices: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::OutputItemAdded { output_index, .. } => Some(*output_index),
                _ => None,
            })
            .collect();
        assert_eq!(added_indices, vec![0, 1]);
    }

    #[test]
    fn every_added_item_gets_exactly_one_done_at_the_same_index() {
        let mut emitter = StreamEmitter::new("resp_1".into(), "m".into(), "groq".into(), 1000);
        let mut events = emitter.open();
        events.extend(emitter.handle_chunk(&tool_call_chunk(Some("call_1"), Some("f"), None)));
        events.extend(emitter.handle_chunk(&content_chunk("done")));
        events.extend(emitter.handle_chunk(&finish_chunk()));
        events.extend(emitter.complete());

        for index in [0u32, 1u32] {
            let added = events
                .iter()
                .filter(|e| matches!(e, StreamEvent::OutputItemAdded { output_index, .. } if *output_index == index))
                .count();
            let done = events
                .iter()
                .filter(|e| matches!(e, StreamEvent::OutputItemDone { output_index, .. } if *output_index == index))
                .count();
            assert_eq!(added, 1);
            assert_eq!(done, 1);
        }
    }

    #[test]
    fn created_is_first_and_completed_is_last() {
        let mut emitter = StreamEmitter::new("resp_1".into(), "m".into(), "groq".into(), 1000);
        let mut events = emitter.open();
        events.extend(emitter.handle_chunk(&content_chunk("hi")));
        events.extend(emitter.handle_chunk(&finish_chunk()));
        events.extend(emitter.complete());

        assert_eq!(events.first().unwrap().event_name(), "response.created");
        assert_eq!(events.last().unwrap().event_name(), "response.completed");
    }

    #[test]
    fn accumulated_text_matches_concatenated_deltas() {
        let mut emitter = StreamEmitter::new("resp_1".into(), "m".into(), "groq".into(), 1000);
        let mut events = emitter.open();
        events.extend(emitter.handle_chunk(&content_chunk("hel")));
        events.extend(emitter.handle_chunk(&content_chunk("lo")));
        events.extend(emitter.handle_chunk(&finish_chunk()));
        events.extend(emitter.complete());

        let deltas: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::OutputTextDelta { delta, .. } => Some(delta.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, "hello");

        let done_text = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::OutputTextDone { text, .. } => Some(text.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(done_text, "hello");
    }
}
