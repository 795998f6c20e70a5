//! Wire types shared by both protocols the gateway speaks.

pub mod chat;
pub mod responses;

pub use chat::*;
pub use responses::*;
