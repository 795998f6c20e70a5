//! Bearer-token authentication: a flat `{key -> label}` lookup built once
//! from configuration at startup. No JWT, session, or rate-limiting layer —
//! the gateway's auth surface is a single static header check.

use actix_web::HttpRequest;
use std::collections::HashMap;

use crate::error::GatewayError;

pub struct AuthGate {
    key_table: HashMap<String, String>,
}

impl AuthGate {
    pub fn new(key_table: HashMap<String, String>) -> Self {
        Self { key_table }
    }

    /// `true` when no keys are configured — every request is then
    /// authenticated as `anonymous`.
    pub fn is_disabled(&self) -> bool {
        self.key_table.is_empty()
    }

    /// Authenticate one request, returning the matched `client_label`.
    pub fn authenticate(&self, req: &HttpRequest) -> Result<String, GatewayError> {
        if self.is_disabled() {
            return Ok("anonymous".to_string());
        }

        let header = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| GatewayError::Auth("missing authorization header".to_string()))?;

        let presented = header.strip_prefix("Bearer ").unwrap_or(header).trim();
        if presented.is_empty() {
            return Err(GatewayError::Auth("missing api key".to_string()));
        }

        self.key_table
            .get(presented)
            .cloned()
            .ok_or_else(|| GatewayError::Auth("invalid api key".to_string()))
    }
}
