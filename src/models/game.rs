//! Request/response models for the game endpoints.

use serde::{Deserialize, Serialize};

use super::AlbumDetails;

/// Outcome of a single guess submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuessOutcome {
    Correct,
    IncorrectContinue,
    IncorrectExhausted,
}

/// Response to starting a new round.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameResponse {
    /// Initial pixelated cover as a PNG data URL
    pub image: String,
    pub guess_count: u32,
    pub guesses_remaining: u32,
}

/// Current round status.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStatusResponse {
    pub guess_count: u32,
    pub guesses_remaining: u32,
    pub resolved: bool,
}

/// Request body for submitting a guess.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessRequest {
    /// Cover image URL of the candidate album being guessed
    pub image_url: String,
}

/// Response to a guess submission.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessResponse {
    pub outcome: GuessOutcome,
    pub guess_count: u32,
    pub guesses_remaining: u32,
    /// Sharper pixelated cover, present only on INCORRECT_CONTINUE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_image: Option<String>,
    /// Target album details, present when the round ends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reveal: Option<AlbumDetails>,
}
