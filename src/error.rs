// Error handling for cms-tokens

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Errors surfaced by the token engine
#[derive(Debug, Clone, PartialEq)]
pub enum TokenError {
    /// Strict mode only: a placeholder had no value
    UnresolvedToken(String),
    CollectionNotFound(String),
    Config(String),
    Internal(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::UnresolvedToken(token) => write!(f, "Unresolved token: {}", token),
            TokenError::CollectionNotFound(id) => write!(f, "Collection not found: {}", id),
            TokenError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TokenError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<anyhow::Error> for TokenError {
    fn from(err: anyhow::Error) -> Self {
        TokenError::Internal(format!("{:#}", err))
    }
}

/// Application error type for the HTTP layer
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::UnresolvedToken(_) => AppError::BadRequest(err.to_string()),
            TokenError::CollectionNotFound(_) => AppError::NotFound(err.to_string()),
            TokenError::Config(_) | TokenError::Internal(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_maps_to_status() {
        let response = AppError::from(TokenError::UnresolvedToken("entry.x".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::from(TokenError::CollectionNotFound("posts".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::from(anyhow::anyhow!("boom")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            TokenError::UnresolvedToken("entry.x".into()).to_string(),
            "Unresolved token: entry.x"
        );
    }
}
