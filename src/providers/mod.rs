//! Provider registry, alias resolution, and the unary/streaming upstream
//! client.

pub mod alias;
pub mod client;
pub mod registry;

pub use alias::AliasTable;
pub use client::ProviderClient;
pub use registry::{ProviderDescriptor, ProviderRegistry};
