//! Game round endpoints.

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};

use super::{require_session, success, ApiResult};
use crate::auth;
use crate::catalog;
use crate::errors::AppError;
use crate::game::{GuessDecision, Round, COMPARE_TOLERANCE};
use crate::imaging;
use crate::models::{
    AlbumDetails, GuessOutcome, GuessRequest, GuessResponse, RoundStatusResponse,
    StartGameResponse,
};
use crate::session::Session;
use crate::AppState;

/// POST /api/game - Start a new round.
///
/// Aggregates the user's top-track albums into a candidate pool, picks a
/// target at random and returns its cover at the coarsest pixelation level.
pub async fn start_game(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<StartGameResponse> {
    let entry = require_session(&state, &headers).await?;
    let mut session = entry.lock().await;

    let catalog_provider = state.catalog.clone();
    let pool = auth::with_access_token(&*state.tokens, &mut session, move |token| {
        let catalog_provider = catalog_provider.clone();
        async move { catalog::fetch_top_album_pool(&*catalog_provider, &token).await }
    })
    .await?;

    let round = Round::start(&pool)?;
    tracing::info!(album = %round.target_album_id, pool = pool.len(), "Round started");

    let cover = imaging::fetch_image(&state.http, &round.target_image_url).await?;
    let pixelated = imaging::pixelate(&cover, round.cell_size())?;

    let response = StartGameResponse {
        image: imaging::png_data_url(&pixelated),
        guess_count: round.guess_count,
        guesses_remaining: round.guesses_remaining(),
    };
    session.round = Some(round);
    success(response)
}

/// GET /api/game - Current round status.
pub async fn game_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<RoundStatusResponse> {
    let entry = require_session(&state, &headers).await?;
    let session = entry.lock().await;

    let round = session
        .round
        .as_ref()
        .ok_or_else(|| AppError::InvalidState("No round in progress".to_string()))?;

    success(RoundStatusResponse {
        guess_count: round.guess_count,
        guesses_remaining: round.guesses_remaining(),
        resolved: round.resolved,
    })
}

/// POST /api/game/guess - Submit a guess against the current round.
///
/// Both covers are fetched before the round is touched, so image failures
/// leave the guess count unchanged and the round playable.
pub async fn submit_guess(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GuessRequest>,
) -> ApiResult<GuessResponse> {
    let entry = require_session(&state, &headers).await?;
    let mut session = entry.lock().await;

    let round = session
        .round
        .as_mut()
        .ok_or_else(|| AppError::InvalidState("No round in progress".to_string()))?;
    round.ensure_in_progress()?;
    let target_album_id = round.target_album_id.clone();
    let target_image_url = round.target_image_url.clone();

    let (guess_cover, target_cover) = tokio::try_join!(
        imaging::fetch_image(&state.http, &request.image_url),
        imaging::fetch_image(&state.http, &target_image_url),
    )?;
    let comparison = imaging::compare(&guess_cover, &target_cover, COMPARE_TOLERANCE)?;
    tracing::debug!(distance = comparison.distance, "Guess compared against target");

    let decision = round.register_comparison(comparison.equal)?;
    let guess_count = round.guess_count;
    let guesses_remaining = round.guesses_remaining();
    let cell_size = round.cell_size();

    let (outcome, next_image, reveal) = match decision {
        GuessDecision::Continue => {
            let pixelated = imaging::pixelate(&target_cover, cell_size)?;
            (
                GuessOutcome::IncorrectContinue,
                Some(imaging::png_data_url(&pixelated)),
                None,
            )
        }
        GuessDecision::Correct => {
            let reveal = lookup_reveal(&state, &mut session, &target_album_id).await;
            (GuessOutcome::Correct, None, reveal)
        }
        GuessDecision::Exhausted => {
            let reveal = lookup_reveal(&state, &mut session, &target_album_id).await;
            (GuessOutcome::IncorrectExhausted, None, reveal)
        }
    };

    success(GuessResponse {
        outcome,
        guess_count,
        guesses_remaining,
        next_image,
        reveal,
    })
}

/// Fetch the reveal details, degrading to a reveal-less response on failure.
async fn lookup_reveal(
    state: &AppState,
    session: &mut Session,
    album_id: &str,
) -> Option<AlbumDetails> {
    let catalog_provider = state.catalog.clone();
    let id = album_id.to_string();
    let result = auth::with_access_token(&*state.tokens, session, move |token| {
        let catalog_provider = catalog_provider.clone();
        let id = id.clone();
        async move { catalog_provider.album_by_id(&id, &token).await }
    })
    .await;

    match result {
        Ok(details) => Some(details),
        Err(e) => {
            tracing::warn!("Failed to fetch reveal details for {}: {}", album_id, e);
            None
        }
    }
}
