//! OAuth login and callback endpoints.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use super::require_session;
use crate::auth;
use crate::errors::AppError;
use crate::session::session_cookie;
use crate::AppState;

/// GET /login - Redirect to the provider's authorization page.
///
/// Reuses the caller's session when the cookie is valid, otherwise creates a
/// fresh one, and stores a new anti-CSRF state either way.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let existing = match crate::session::session_id_from_headers(&headers) {
        Some(id) => state.sessions.entry(id).await.map(|entry| (id, entry)),
        None => None,
    };

    let (session_id, entry) = match existing {
        Some(pair) => pair,
        None => {
            let id = state.sessions.create().await;
            let entry = state
                .sessions
                .entry(id)
                .await
                .ok_or_else(|| AppError::Internal("Session missing after creation".to_string()))?;
            (id, entry)
        }
    };

    let login_state = auth::generate_login_state();
    entry.lock().await.oauth_state = Some(login_state.clone());

    let url = auth::authorize_url(&state.config, &login_state)?;
    tracing::info!("Redirecting session to provider authorization");

    let mut response = Redirect::to(&url).into_response();
    let cookie = HeaderValue::from_str(&session_cookie(session_id))
        .map_err(|e| AppError::Internal(format!("Invalid session cookie: {}", e)))?;
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// Query parameters the provider appends to the callback redirect.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set when the user denied authorization
    pub error: Option<String>,
}

/// GET /callback - Exchange the authorization code for tokens.
///
/// The state check is mandatory and happens before the provider is
/// contacted. The stored state is consumed either way, so a code cannot be
/// replayed against the same session.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let entry = require_session(&state, &headers).await?;
    let mut session = entry.lock().await;

    if let Some(denied) = query.error {
        return Err(AppError::Auth(format!("Authorization denied: {}", denied)));
    }

    let code = query
        .code
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let stored_state = session.oauth_state.take();
    let tokens = auth::exchange_code(
        &*state.tokens,
        code,
        query.state.as_deref(),
        stored_state.as_deref(),
    )
    .await?;

    session.access_token = Some(tokens.access_token);
    session.refresh_token = Some(tokens.refresh_token);
    tracing::info!("Login completed");

    Ok(Redirect::to("/").into_response())
}
