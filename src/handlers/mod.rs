pub mod admin_handlers;
pub mod auth_handlers;

use crate::error::{AuthError, Result};
use axum::{
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde_json::json;

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Extracts the bearer token from the Authorization header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidToken)
}
