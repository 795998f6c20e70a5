//! Server builder and `run_server` entrypoint.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer as ActixHttpServer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::auth::AuthGate;
use crate::cache::{Cache, CacheBackend, MemoryCache};
use crate::config::{CacheBackendKind, Config};
use crate::providers::{AliasTable, ProviderRegistry};
use crate::router::Router;
use crate::server::routes;
use crate::server::state::AppState;
use crate::store::ResponseStore;

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.logging.pretty {
        subscriber.pretty().try_init()
    } else {
        subscriber.json().try_init()
    };
    if installed.is_err() {
        warn!("tracing subscriber already installed, skipping");
    }
}

fn build_cache_backend(config: &Config) -> Arc<dyn CacheBackend> {
    match config.cache.backend {
        CacheBackendKind::Memory => Arc::new(MemoryCache::new(config.cache.memory.max_items)),
        CacheBackendKind::Redis => {
            #[cfg(feature = "redis")]
            {
                if let Some(redis_cfg) = &config.cache.redis {
                    match crate::cache::redis_backend::RedisCache::new(
                        &redis_cfg.url,
                        redis_cfg.key_prefix.clone(),
                    ) {
                        Ok(backend) => return Arc::new(backend),
                        Err(e) => warn!("failed to construct redis cache client: {e}, falling back to memory"),
                    }
                } else {
                    warn!("cache.backend is redis but cache.redis is unset, falling back to memory");
                }
            }
            #[cfg(not(feature = "redis"))]
            warn!("cache.backend is redis but this binary was built without the redis feature");
            Arc::new(MemoryCache::new(config.cache.memory.max_items))
        }
    }
}

/// Assemble `AppState` from a loaded configuration.
pub fn build_state(config: Config) -> AppState {
    let config = Arc::new(config);
    let registry = Arc::new(ProviderRegistry::from_config(&config));
    let aliases = Arc::new(AliasTable::from_config(&config));
    let fallback_chain = config.routing.fallback_chain.clone();
    let router = Arc::new(Router::new(
        registry.clone(),
        aliases,
        config.routing.default_strategy,
        fallback_chain,
    ));
    let backend = build_cache_backend(&config);
    let cache = Arc::new(Cache::new(&config.cache, backend));
    let auth = Arc::new(AuthGate::new(config.auth.key_table()));
    let store = Arc::new(ResponseStore::with_defaults());

    AppState {
        config,
        auth,
        registry,
        router,
        cache,
        store,
    }
}

fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(routes::health::health))
        .route("/health/providers", web::get().to(routes::health::health_providers))
        .service(
            web::scope("/v1")
                .route("/models", web::get().to(routes::models::list_models))
                .route("/chat/completions", web::post().to(routes::chat::chat_completions))
                .route("/responses", web::post().to(routes::responses::responses)),
        );
}

/// Load configuration (from `LLMUX_CONFIG`, default `config/gateway.yaml`)
/// and run the HTTP server until the process is signalled to stop.
pub async fn run_server() -> crate::error::Result<()> {
    let config_path = std::env::var("LLMUX_CONFIG").unwrap_or_else(|_| "config/gateway.yaml".to_string());
    let config = match Config::from_file(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load {config_path}: {e}, falling back to defaults");
            Config::default()
        }
    };

    init_logging(&config);
    info!(path = %config_path, "configuration loaded");

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = web::Data::new(build_state(config));

    info!(addr = %bind_addr, "starting llmux gateway");

    ActixHttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .configure(configure_app)
    })
    .bind(&bind_addr)
    .map_err(|e| crate::error::GatewayError::Internal(format!("failed to bind {bind_addr}: {e}")))?
    .run()
    .await
    .map_err(|e| crate::error::GatewayError::Internal(format!("server error: {e}")))
}
