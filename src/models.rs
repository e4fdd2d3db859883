//! Row models shared by the stores.
//!
//! These mirror the backend tables one to one. Optional columns are `Option`
//! so that rows written by older clients (or hand-edited in the dashboard)
//! still decode.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a backend row.
///
/// Serial tables hand out integers, `profiles` uses the auth user's uuid.
/// Both decode here and serialize back to the same JSON kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl RowId {
    pub fn to_value(&self) -> Value {
        match self {
            RowId::Int(v) => Value::from(*v),
            RowId::Text(v) => Value::from(v.as_str()),
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(v) => write!(f, "{}", v),
            RowId::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for RowId {
    fn from(value: i64) -> Self {
        RowId::Int(value)
    }
}

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        match value.parse::<i64>() {
            Ok(v) => RowId::Int(v),
            Err(_) => RowId::Text(value.to_string()),
        }
    }
}

impl From<RowId> for Value {
    fn from(id: RowId) -> Self {
        id.to_value()
    }
}

impl From<&RowId> for Value {
    fn from(id: &RowId) -> Self {
        id.to_value()
    }
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) after which the access token is rejected.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => chrono::Utc::now().timestamp() >= expires_at,
            None => false,
        }
    }
}

// =============================================================================
// Profiles
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Profile {
    pub fn has_first_name(&self) -> bool {
        self.first_name.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn has_last_name(&self) -> bool {
        self.last_name.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Name pair staged at registration time, consumed by the first profile fetch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingProfile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mood {
    pub id: RowId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewMood {
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: RowId,
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub mood_id: Option<RowId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub mood_id: Option<RowId>,
}

// =============================================================================
// User library
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: RowId,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Hydrated locally from `playlist_tracks` + `music`.
    #[serde(default, skip_serializing)]
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn contains_track(&self, track_id: &RowId) -> bool {
        self.tracks.iter().any(|t| &t.id == track_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewPlaylist {
    pub user_id: String,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaylistTrack {
    pub playlist_id: RowId,
    #[serde(default)]
    pub music_id: Option<RowId>,
    #[serde(default)]
    pub position: Option<i64>,
}

impl PlaylistTrack {
    /// Position following the highest one in use, starting at 1.
    pub fn next_position(existing: &[PlaylistTrack]) -> i64 {
        existing
            .iter()
            .filter_map(|pt| pt.position)
            .max()
            .unwrap_or(0)
            + 1
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LikedTrack {
    pub user_id: String,
    #[serde(default)]
    pub music_id: Option<RowId>,
}

// =============================================================================
// Flat `tracks` table
// =============================================================================

/// Row of the standalone `tracks` table where the mood is a plain string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlatTrack {
    pub id: RowId,
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewFlatTrack {
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatTrackPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}
