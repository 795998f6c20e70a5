//! Application state shared across HTTP handlers.

use std::sync::Arc;

use crate::auth::AuthGate;
use crate::cache::Cache;
use crate::config::Config;
use crate::providers::ProviderRegistry;
use crate::router::Router;
use crate::store::ResponseStore;

/// Shared, read-mostly state handed to every handler via `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<AuthGate>,
    pub registry: Arc<ProviderRegistry>,
    pub router: Arc<Router>,
    pub cache: Arc<Cache>,
    pub store: Arc<ResponseStore>,
}
