//! The signed-in user's profile, playlists and liked tracks.

mod names;
mod routing;
mod store;

pub use names::derive_name_from_email;
pub use routing::PlaylistRoute;
pub use store::LibraryStore;

use crate::gateway::GatewayError;
use crate::models::{Profile, RowId, Track};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("User not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Where the current profile lives.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileResolution {
    /// Read from or written to the `profiles` table.
    Persisted(Profile),
    /// Built locally because the table is missing or the write failed.
    Ephemeral(Profile),
}

impl ProfileResolution {
    pub fn profile(&self) -> &Profile {
        match self {
            ProfileResolution::Persisted(p) | ProfileResolution::Ephemeral(p) => p,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, ProfileResolution::Persisted(_))
    }
}

/// Result of liking a track.
#[derive(Debug, Clone, PartialEq)]
pub struct LikeOutcome {
    pub track: Track,
    /// Playlist the track was filed into, if any.
    pub playlist: Option<RowId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistAddition {
    Added,
    AlreadyPresent,
}
