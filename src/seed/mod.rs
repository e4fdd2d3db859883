//! Idempotent bootstrap of moods, tracks and default playlists.

pub mod samples;
mod seeder;

pub use seeder::{MoodTrackCount, SeedSummary, Seeder};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to seed moods")]
    NoMoods,
}
