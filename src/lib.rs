//! llmux — an OpenAI-compatible multi-provider LLM gateway: provider
//! routing with fallback, a content-addressed response cache, and a
//! bidirectional Chat Completions ↔ OpenResponses adapter.

pub mod adapter;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod providers;
pub mod router;
pub mod server;
pub mod store;
pub mod types;
