//! Album models shared between the catalog adapter and the game.

use serde::{Deserialize, Serialize};

/// An album eligible for target selection or offered as a guess candidate.
///
/// Transient: produced per search/top-tracks request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlbumCandidate {
    pub id: String,
    pub name: String,
    pub primary_artist: String,
    pub image_url: String,
}

/// Name and artist revealed when a round ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlbumDetails {
    pub name: String,
    pub primary_artist: String,
}
