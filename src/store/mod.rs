//! Response Store — short-lived `response_id -> (input, output)` map used
//! to continue OpenResponses conversations via `previous_response_id`.
//! Bounded with LRU eviction and a TTL, same shape as the memory cache
//! backend.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::types::responses::{
    InputItem, MessageContentInput, OutputContentPart, OutputItem, Response, StoredResponse,
};

struct Entry {
    value: StoredResponse,
    expires_at: Instant,
}

pub struct ResponseStore {
    inner: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl ResponseStore {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Default bound per the design: 1000 entries, 1 hour.
    pub fn with_defaults() -> Self {
        Self::new(1000, Duration::from_secs(3600))
    }

    pub fn get(&self, id: &str) -> Option<StoredResponse> {
        let mut guard = self.inner.lock();
        match guard.get(id) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                guard.pop(id);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, id: String, response: Response, input: Vec<InputItem>) {
        let entry = Entry {
            value: StoredResponse { response, input },
            expires_at: Instant::now() + self.ttl,
        };
        self.inner.lock().put(id, entry);
    }

    pub fn delete(&self, id: &str) {
        self.inner.lock().pop(id);
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Expand a conversation for a new request carrying
    /// `previous_response_id`: the stored input is prepended, stored
    /// outputs are projected back into input items, and only then is
    /// `new_input` appended.
    pub fn expand(&self, previous_response_id: &str, new_input: Vec<InputItem>) -> Option<Vec<InputItem>> {
        let stored = self.get(previous_response_id)?;
        let mut expanded = stored.input;
        for item in stored.response.output {
            expanded.push(project_output_as_input(item));
        }
        expanded.extend(new_input);
        Some(expanded)
    }
}

fn project_output_as_input(item: OutputItem) -> InputItem {
    match item {
        OutputItem::Message { content, .. } => {
            let parts = content
                .into_iter()
                .filter_map(|part| match part {
                    OutputContentPart::OutputText { text, .. } => {
                        Some(crate::types::responses::InputContentPart::InputText { text })
                    }
                    OutputContentPart::Refusal { .. } => None,
                })
                .collect();
            InputItem::Message {
                role: "assistant".to_string(),
                content: MessageContentInput::Parts(parts),
            }
        }
        OutputItem::FunctionCall { call_id, .. } => InputItem::FunctionCallOutput {
            call_id,
            output: String::new(),
        },
    }
}
