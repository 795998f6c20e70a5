//! HTTP server: application state, wiring, and route handlers.

pub mod builder;
pub mod routes;
pub mod state;

pub use builder::run_server;
pub use state::AppState;
