//! Album search endpoint.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
};
use serde::Deserialize;

use super::{require_session, success, ApiResult};
use crate::auth;
use crate::catalog;
use crate::errors::AppError;
use crate::models::AlbumCandidate;
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Free-text album query.
    pub q: String,
}

/// GET /api/albums/search - Search guess candidates.
///
/// Returns at most five candidates, de-duplicated by (name, artist) with the
/// provider's relevance order preserved.
pub async fn search_albums(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Vec<AlbumCandidate>> {
    let entry = require_session(&state, &headers).await?;
    let mut session = entry.lock().await;

    if params.q.trim().is_empty() {
        return Err(AppError::BadRequest("Query must not be empty".to_string()));
    }

    let catalog_provider = state.catalog.clone();
    let query = params.q.clone();
    let results = auth::with_access_token(&*state.tokens, &mut session, move |token| {
        let catalog_provider = catalog_provider.clone();
        let query = query.clone();
        async move { catalog::search_albums(&*catalog_provider, &query, &token).await }
    })
    .await?;

    success(results)
}
