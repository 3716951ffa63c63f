//! Service-to-service authentication
//!
//! Callers (the web frontend, the media worker) send the shared key in `x-api-key`.
//! Only its SHA-256 is kept in configuration.

use crate::{
    app_state::AppState,
    error::{ApiError, Result},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Hex-encoded SHA-256 of a key, the form stored in `auth.api_key_sha256`
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Rejects requests without a matching `x-api-key` with 401 Unauthorized
pub async fn api_key_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing X-API-Key header".to_string()))?;

    let expected = state.config.auth.api_key_sha256.trim().to_lowercase();
    if expected.is_empty() || hash_api_key(key) != expected {
        tracing::warn!("Rejected request with invalid API key");
        return Err(ApiError::Unauthorized("Invalid API key".to_string()));
    }

    Ok(next.run(request).await)
}
