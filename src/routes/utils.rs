use axum::http::{HeaderMap, StatusCode};

use super::auth::AuthService;
use crate::error::AppError;
use crate::services::Actor;

#[inline]
pub fn validate_auth_token(headers: &HeaderMap, service: &AuthService) -> Result<Actor, StatusCode> {
    let jwt_header_token = match headers.get("Authorization").map(|token| token.to_str()) {
        Some(Ok(token)) => token.strip_prefix("Bearer ").unwrap_or(token),
        _ => {
            return Err(StatusCode::UNAUTHORIZED);
        }
    };
    //validate our token
    match service.verify_token(jwt_header_token) {
        Ok(actor) => Ok(actor),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Token check for handlers that return `(StatusCode, String)` rejections.
#[inline]
pub fn authenticate(headers: &HeaderMap, service: &AuthService) -> Result<Actor, (StatusCode, String)> {
    validate_auth_token(headers, service).map_err(|status| {
        tracing::warn!("Token validation failed");
        (status, "Invalid token".to_string())
    })
}

#[inline]
pub fn require_admin(actor: &Actor) -> Result<(), (StatusCode, String)> {
    if !actor.is_admin() {
        tracing::warn!("Admin route called by user: {}", actor.user_id);
        return Err((StatusCode::FORBIDDEN, "Admin access required".to_string()));
    }
    Ok(())
}

pub fn status_of(err: &AppError) -> StatusCode {
    match err {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Conflict(_) | AppError::DuplicateTransaction(_) => StatusCode::CONFLICT,
        AppError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Maps a core error onto the response; database details stay in the log.
pub fn reject(err: AppError) -> (StatusCode, String) {
    let status = status_of(&err);
    if status.is_server_error() {
        tracing::error!("Request failed: {err}");
        let body = match err {
            AppError::Timeout(_) => "Operation timed out, please retry".to_string(),
            _ => "Internal server error".to_string(),
        };
        return (status, body);
    }
    tracing::info!("Request rejected: {err}");
    match err {
        AppError::Conflict(msg) => (status, format!("{msg}; please retry")),
        other => (status, other.to_string()),
    }
}
