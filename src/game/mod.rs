//! Round state machine.
//!
//! Owns the guess count, target selection and the accept/continue/reveal
//! decision. Pixelation intensity is derived from the guess count alone, so a
//! round is fully replayable from its stored fields.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::AlbumCandidate;

/// Additional attempts allowed after the initial reveal (5 image states total).
pub const MAX_GUESSES: u32 = 4;

/// Block side length of the first, most pixelated image.
pub const BASE_CELL_SIZE: u32 = 320;

/// Perceptual distance at or below which two covers count as the same album.
pub const COMPARE_TOLERANCE: f64 = 10.0;

/// Derive the pixelation block size for a guess count: `320 / 2^n`, clamped
/// to a minimum of one pixel.
pub fn cell_size_for(guess_count: u32) -> u32 {
    BASE_CELL_SIZE
        .checked_shr(guess_count)
        .unwrap_or(0)
        .max(1)
}

/// Pure transition result of registering one comparison against the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessDecision {
    /// Covers matched; round resolved
    Correct,
    /// No match, attempts remain; re-render at the new guess count
    Continue,
    /// No match and attempts used up; round resolved with reveal
    Exhausted,
}

/// One play-through targeting a single chosen album.
///
/// Absent round = awaiting target; `resolved` flips exactly once, either on a
/// correct guess or when the guess count would exceed [`MAX_GUESSES`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub target_album_id: String,
    pub target_image_url: String,
    pub guess_count: u32,
    pub resolved: bool,
}

impl Round {
    /// Select one album uniformly at random from a non-empty pool and start
    /// a round against it.
    pub fn start(pool: &[AlbumCandidate]) -> Result<Self, AppError> {
        if pool.is_empty() {
            return Err(AppError::EmptyPool);
        }
        let target = &pool[rand::rng().random_range(0..pool.len())];
        Ok(Self {
            target_album_id: target.id.clone(),
            target_image_url: target.image_url.clone(),
            guess_count: 0,
            resolved: false,
        })
    }

    /// Block size for the current guess count.
    pub fn cell_size(&self) -> u32 {
        cell_size_for(self.guess_count)
    }

    pub fn guesses_remaining(&self) -> u32 {
        MAX_GUESSES.saturating_sub(self.guess_count)
    }

    /// Fail unless the round is still accepting guesses.
    pub fn ensure_in_progress(&self) -> Result<(), AppError> {
        if self.resolved {
            return Err(AppError::InvalidState(
                "Round already resolved; start a new game".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply one equivalence-check result to the round.
    ///
    /// On a miss the guess count increments; once it would exceed
    /// [`MAX_GUESSES`] the round resolves with a reveal instead of another
    /// image.
    pub fn register_comparison(&mut self, equal: bool) -> Result<GuessDecision, AppError> {
        self.ensure_in_progress()?;

        if equal {
            self.resolved = true;
            return Ok(GuessDecision::Correct);
        }

        self.guess_count += 1;
        if self.guess_count > MAX_GUESSES {
            self.resolved = true;
            Ok(GuessDecision::Exhausted)
        } else {
            Ok(GuessDecision::Continue)
        }
    }
}
