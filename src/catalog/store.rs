use super::CatalogError;
use crate::gateway::{decode, encode, Backend, GatewayError, Query};
use crate::models::{Mood, NewMood, NewTrack, RowId, Track};
use crate::session::SessionManager;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// In-memory view of the catalog: every mood, every track, the selected mood
/// and the tracks shown for it.
pub struct CatalogStore {
    backend: Arc<dyn Backend>,
    session: Arc<SessionManager>,
    moods: Vec<Mood>,
    tracks: Vec<Track>,
    current_mood: Option<Mood>,
    current_tracks: Vec<Track>,
    loading: bool,
    last_error: Option<String>,
}

impl CatalogStore {
    pub fn new(backend: Arc<dyn Backend>, session: Arc<SessionManager>) -> Self {
        Self {
            backend,
            session,
            moods: vec![],
            tracks: vec![],
            current_mood: None,
            current_tracks: vec![],
            loading: false,
            last_error: None,
        }
    }

    /// Loads moods and tracks and selects the first mood. Failures are
    /// logged and kept in [`last_error`](Self::last_error).
    pub async fn initialize(&mut self) {
        self.loading = true;
        self.last_error = None;

        if let Err(e) = self.fetch_moods().await.map(|moods| moods.len()) {
            error!("Failed to fetch moods: {}", e);
            self.last_error = Some(e.to_string());
        }
        if let Err(e) = self.fetch_tracks().await.map(|tracks| tracks.len()) {
            error!("Failed to fetch tracks: {}", e);
            self.last_error = Some(e.to_string());
        }
        if let Some(first) = self.moods.first().map(|m| m.id.clone()) {
            self.set_current_mood(&first);
        }

        info!(
            "Catalog loaded: {} moods, {} tracks",
            self.moods.len(),
            self.tracks.len()
        );
        self.loading = false;
    }

    pub async fn fetch_moods(&mut self) -> Result<&[Mood], GatewayError> {
        let rows = self.backend.select(&Query::table("moods")).await?;
        self.moods = decode(rows)?;
        Ok(&self.moods)
    }

    pub async fn fetch_tracks(&mut self) -> Result<&[Track], GatewayError> {
        let rows = self.backend.select(&Query::table("music")).await?;
        self.tracks = decode(rows)?;
        Ok(&self.tracks)
    }

    /// Selects a mood and recomputes its tracks from the loaded catalog.
    /// An unknown id clears the selection.
    pub fn set_current_mood(&mut self, mood_id: &RowId) {
        self.current_mood = self.moods.iter().find(|m| &m.id == mood_id).cloned();
        self.current_tracks = match &self.current_mood {
            Some(_) => self
                .tracks
                .iter()
                .filter(|t| t.mood_id.as_ref() == Some(mood_id))
                .cloned()
                .collect(),
            None => vec![],
        };
    }

    /// Asks the backend for the tracks of a mood.
    ///
    /// When the mood filter is rejected the unfiltered track list is
    /// returned instead. Returns an empty list when both queries fail.
    pub async fn get_recommended_tracks(&mut self, mood_id: &RowId) -> Vec<Track> {
        self.loading = true;
        self.last_error = None;
        self.set_current_mood(mood_id);

        let filtered = Query::table("music").eq("mood_id", mood_id);
        let result = match self.fetch_track_rows(&filtered).await {
            Ok(tracks) => {
                debug!("Found {} tracks for mood {}", tracks.len(), mood_id);
                self.current_tracks = tracks.clone();
                tracks
            }
            Err(e) => {
                warn!(
                    "Mood filter failed for mood {}, falling back to all tracks: {}",
                    mood_id, e
                );
                match self.fetch_track_rows(&Query::table("music")).await {
                    Ok(tracks) if !tracks.is_empty() => {
                        warn!(
                            "Returning {} tracks without mood filtering",
                            tracks.len()
                        );
                        self.current_tracks = tracks.clone();
                        tracks
                    }
                    Ok(_) => vec![],
                    Err(e) => {
                        error!("Unfiltered track fetch failed: {}", e);
                        vec![]
                    }
                }
            }
        };

        self.loading = false;
        result
    }

    async fn fetch_track_rows(&self, query: &Query) -> Result<Vec<Track>, GatewayError> {
        decode(self.backend.select(query).await?)
    }

    pub async fn add_mood(&mut self, name: &str, description: &str) -> Result<Mood, CatalogError> {
        if !self.session.is_authenticated() {
            self.last_error = Some("You must be logged in to create a mood".to_string());
            return Err(CatalogError::AuthenticationRequired);
        }

        let row = encode(&NewMood {
            name: name.to_string(),
            description: description.to_string(),
        })?;
        let mood: Mood = match self.insert_one("moods", row).await {
            Ok(mood) => mood,
            Err(e) => {
                self.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };
        info!("Added mood {} ({})", mood.name, mood.id);
        self.moods.push(mood.clone());
        Ok(mood)
    }

    pub async fn add_track(&mut self, track: NewTrack) -> Result<Track, CatalogError> {
        if !self.session.is_authenticated() {
            self.last_error = Some("You must be logged in to add a track".to_string());
            return Err(CatalogError::AuthenticationRequired);
        }

        let row = encode(&track)?;
        let track: Track = match self.insert_one("music", row).await {
            Ok(track) => track,
            Err(e) => {
                self.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };
        info!("Added track {} ({})", track.title, track.id);
        self.tracks.push(track.clone());

        let in_current_mood = self
            .current_mood
            .as_ref()
            .is_some_and(|m| track.mood_id.as_ref() == Some(&m.id));
        if in_current_mood {
            self.current_tracks.push(track.clone());
        }
        Ok(track)
    }

    async fn insert_one<T: serde::de::DeserializeOwned>(
        &self,
        table: &str,
        row: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let rows = self.backend.insert(table, vec![row]).await?;
        decode::<T>(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NoRows {
                table: table.to_string(),
            })
    }

    pub fn moods(&self) -> &[Mood] {
        &self.moods
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn current_mood(&self) -> Option<&Mood> {
        self.current_mood.as_ref()
    }

    /// Tracks shown for the selected mood.
    pub fn current_tracks(&self) -> &[Track] {
        &self.current_tracks
    }

    pub fn mood_by_name(&self, name: &str) -> Option<&Mood> {
        self.moods
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
