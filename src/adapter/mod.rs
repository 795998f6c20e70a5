//! OpenResponses ↔ Chat Completions adapter: request translation, unary
//! response translation, and the streaming event state machine.

pub mod request;
pub mod response;
pub mod stream;

pub use request::to_chat_request;
pub use response::to_openresponses;
pub use stream::{translate_stream, StreamEmitter};
