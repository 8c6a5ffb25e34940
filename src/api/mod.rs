//! REST API module.
//!
//! Contains all API routes and handlers following the frontend contract.

mod albums;
mod game;
mod login;

pub use albums::*;
pub use game::*;
pub use login::*;

use std::sync::Arc;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::errors::AppError;
use crate::session::{session_id_from_headers, Session};
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Resolve the caller's session from the `sid` cookie.
pub(crate) async fn require_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Arc<Mutex<Session>>, AppError> {
    let id = session_id_from_headers(headers).ok_or(AppError::SessionNotFound)?;
    state.sessions.entry(id).await.ok_or(AppError::SessionNotFound)
}
