//! Error handling module for the Guessify backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const STATE_MISMATCH: &str = "STATE_MISMATCH";
    pub const AUTH_ERROR: &str = "AUTH_ERROR";
    pub const AUTH_REJECTED: &str = "AUTH_REJECTED";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";
    pub const IMAGE_FETCH_ERROR: &str = "IMAGE_FETCH_ERROR";
    pub const IMAGE_DECODE_ERROR: &str = "IMAGE_DECODE_ERROR";
    pub const EMPTY_POOL: &str = "EMPTY_POOL";
    pub const INVALID_STATE: &str = "INVALID_STATE";
    pub const SESSION_NOT_FOUND: &str = "SESSION_NOT_FOUND";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// OAuth state parameter missing or not matching the stored state
    StateMismatch,
    /// Token exchange/refresh failure or missing credentials
    Auth(String),
    /// The catalog provider rejected the access token (401)
    AuthRejected,
    /// The provider asked us to back off (429)
    RateLimited,
    /// Token/catalog provider HTTP failure
    Provider(String),
    /// A cover image could not be retrieved
    ImageFetch(String),
    /// Bytes were not a decodable raster image
    ImageDecode(String),
    /// Round started with no candidate albums
    EmptyPool,
    /// Operation not valid in the current round state
    InvalidState(String),
    /// No session for the supplied cookie
    SessionNotFound,
    /// Bad request
    BadRequest(String),
    /// Internal server error
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::StateMismatch => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthRejected => StatusCode::UNAUTHORIZED,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::ImageFetch(_) => StatusCode::BAD_GATEWAY,
            AppError::ImageDecode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::EmptyPool => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::SessionNotFound => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::StateMismatch => codes::STATE_MISMATCH,
            AppError::Auth(_) => codes::AUTH_ERROR,
            AppError::AuthRejected => codes::AUTH_REJECTED,
            AppError::RateLimited => codes::RATE_LIMITED,
            AppError::Provider(_) => codes::PROVIDER_ERROR,
            AppError::ImageFetch(_) => codes::IMAGE_FETCH_ERROR,
            AppError::ImageDecode(_) => codes::IMAGE_DECODE_ERROR,
            AppError::EmptyPool => codes::EMPTY_POOL,
            AppError::InvalidState(_) => codes::INVALID_STATE,
            AppError::SessionNotFound => codes::SESSION_NOT_FOUND,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::StateMismatch => "OAuth state missing or not matching".to_string(),
            AppError::Auth(msg) => msg.clone(),
            AppError::AuthRejected => "Access token rejected by provider".to_string(),
            AppError::RateLimited => "Provider rate limit exceeded".to_string(),
            AppError::Provider(msg) => msg.clone(),
            AppError::ImageFetch(msg) => msg.clone(),
            AppError::ImageDecode(msg) => msg.clone(),
            AppError::EmptyPool => "No albums available for target selection".to_string(),
            AppError::InvalidState(msg) => msg.clone(),
            AppError::SessionNotFound => "No active session".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("Provider request error: {:?}", err);
        AppError::Provider(format!("Provider request error: {}", err))
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        tracing::error!("Image decode error: {:?}", err);
        AppError::ImageDecode(format!("Image decode error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::StateMismatch.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::AuthRejected.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AppError::InvalidState("resolved".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::EmptyPool.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_envelope_shape() {
        let body = ErrorResponse::new(&AppError::EmptyPool);
        assert!(!body.success);
        assert_eq!(body.error.code, codes::EMPTY_POOL);
    }
}
