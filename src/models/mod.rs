//! Data models for the Guessify game.
//!
//! These models match the frontend TypeScript interfaces exactly for seamless interoperability.

mod album;
mod game;

pub use album::*;
pub use game::*;
