//! Error type for the gateway.

use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Result type alias used throughout the gateway.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway.
///
/// Variants map directly onto the error kinds in the error handling design:
/// validation/auth/not-found surface immediately, upstream failures are
/// retried across providers until exhausted, cache failures never reach
/// here because they are swallowed at the call site.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    NotFound(String),

    /// A single provider's non-2xx or network failure. Carried across the
    /// router's candidate loop; never returned to a client on its own.
    #[error("provider {provider} returned {status}: {body}")]
    Upstream {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("no providers available")]
    NoProvidersAvailable,

    #[error("all providers failed. Last error: {last_error}")]
    AllProvidersFailed { last_error: String },

    /// A cache backend or (de)serialization failure. Always logged and
    /// swallowed at the call site in `cache::Cache` — never returned to a
    /// handler — so this variant exists for `cache::Cache`'s internal
    /// bookkeeping, not as a response path.
    #[error("cache error: {0}")]
    Cache(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: &'static str,
    code: &'static str,
    message: String,
}

impl GatewayError {
    fn envelope(&self, kind: &'static str, code: &'static str) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: ErrorDetail {
                kind,
                code,
                message: self.to_string(),
            },
        })
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Upstream { .. }
            | GatewayError::NoProvidersAvailable
            | GatewayError::AllProvidersFailed { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Cache(_) | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            GatewayError::Validation(_) => self.envelope("invalid_request_error", "validation_error"),
            GatewayError::Auth(msg) => {
                let code = if msg.contains("missing") {
                    "missing_api_key"
                } else {
                    "invalid_api_key"
                };
                self.envelope("authentication_error", code)
            }
            GatewayError::NotFound(_) => self.envelope("invalid_request_error", "not_found"),
            GatewayError::Upstream { .. } => self.envelope("api_error", "provider_error"),
            GatewayError::NoProvidersAvailable => self.envelope("api_error", "no_providers_available"),
            GatewayError::AllProvidersFailed { .. } => self.envelope("api_error", "provider_error"),
            _ => self.envelope("internal_error", "internal_error"),
        }
    }
}
