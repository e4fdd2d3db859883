use super::{
    derive_name_from_email, LibraryError, LikeOutcome, PlaylistAddition, PlaylistRoute,
    ProfileResolution,
};
use crate::gateway::{decode, encode, Backend, Filter, GatewayError, Query};
use crate::models::{
    AuthUser, LikedTrack, NewPlaylist, PendingProfile, Playlist, PlaylistTrack, Profile,
    ProfilePatch, RowId, Track,
};
use crate::session::SessionManager;
use crate::storage::{self, ClientStorage, PENDING_PROFILE_KEY};
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Orders hydrated tracks like the id list they were requested with.
fn in_id_order(ids: &[RowId], tracks: Vec<Track>) -> Vec<Track> {
    let mut by_id: HashMap<RowId, Track> = tracks.into_iter().map(|t| (t.id.clone(), t)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

/// Name sources for a persisted profile that lacks a name.
struct NameFill {
    has_pending: bool,
    pending_first: Option<String>,
    pending_last: Option<String>,
    derived: (String, String),
    has_email: bool,
}

pub struct LibraryStore {
    backend: Arc<dyn Backend>,
    session: Arc<SessionManager>,
    storage: Arc<dyn ClientStorage>,
    profile: Option<ProfileResolution>,
    playlists: Vec<Playlist>,
    liked_tracks: Vec<Track>,
    loading: bool,
    last_error: Option<String>,
}

impl LibraryStore {
    pub fn new(
        backend: Arc<dyn Backend>,
        session: Arc<SessionManager>,
        storage: Arc<dyn ClientStorage>,
    ) -> Self {
        Self {
            backend,
            session,
            storage,
            profile: None,
            playlists: vec![],
            liked_tracks: vec![],
            loading: false,
            last_error: None,
        }
    }

    fn auth_user(&self) -> Result<AuthUser, LibraryError> {
        if !self.session.is_authenticated() {
            return Err(LibraryError::NotAuthenticated);
        }
        self.session
            .session_user()
            .ok_or(LibraryError::NotAuthenticated)
    }

    fn provisional_profile(user: &AuthUser, (first, last): (String, String)) -> Profile {
        Profile {
            id: user.id.clone(),
            email: user.email.clone(),
            first_name: Some(first),
            last_name: Some(last),
            created_at: None,
        }
    }

    /// Loads profile, playlists and liked tracks. Does nothing when signed
    /// out. Each part falls back to a default on its own.
    pub async fn initialize(&mut self) {
        let Ok(user) = self.auth_user() else {
            debug!("Skipping library initialization, not authenticated");
            return;
        };
        self.loading = true;

        let derived = derive_name_from_email(user.email.as_deref());
        self.profile = Some(ProfileResolution::Ephemeral(Self::provisional_profile(
            &user, derived,
        )));

        if let Err(e) = self.fetch_profile().await {
            warn!("Error fetching profile, using default: {}", e);
        }
        self.fetch_playlists().await;
        self.fetch_liked_tracks().await;

        info!(
            "Library loaded: {} playlists, {} liked tracks",
            self.playlists.len(),
            self.liked_tracks.len()
        );
        self.loading = false;
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Resolves the user's profile, creating it when missing.
    ///
    /// The name pair staged at registration is consumed here, whatever the
    /// outcome.
    pub async fn fetch_profile(&mut self) -> Result<ProfileResolution, LibraryError> {
        let user = self.auth_user()?;

        let pending: Option<PendingProfile> =
            match storage::take_json(self.storage.as_ref(), PENDING_PROFILE_KEY) {
                Ok(pending) => pending,
                Err(e) => {
                    warn!("Error retrieving pending profile data: {}", e);
                    None
                }
            };
        let pending_first = pending.as_ref().and_then(|p| non_empty(p.first_name.clone()));
        let pending_last = pending.as_ref().and_then(|p| non_empty(p.last_name.clone()));
        let derived = derive_name_from_email(user.email.as_deref());

        let query = Query::table("profiles").eq("id", user.id.as_str());
        let resolution = match self.select_typed::<Profile>(&query).await {
            Err(e) if e.is_relation_missing() => {
                info!("Profiles table does not exist, using default profile");
                let current = self
                    .profile
                    .as_ref()
                    .map(|r| r.profile().clone())
                    .unwrap_or_else(|| Self::provisional_profile(&user, derived));
                ProfileResolution::Ephemeral(current)
            }
            Err(e) => {
                error!("Error fetching profile: {}", e);
                ProfileResolution::Ephemeral(Self::provisional_profile(&user, derived))
            }
            Ok(profiles) => match profiles.into_iter().next() {
                Some(profile) => {
                    let fill = NameFill {
                        has_pending: pending.is_some(),
                        pending_first,
                        pending_last,
                        derived,
                        has_email: user.email.is_some(),
                    };
                    self.complete_profile(profile, fill).await
                }
                None => {
                    let first = pending_first.unwrap_or(derived.0);
                    let last = pending_last.unwrap_or(derived.1);
                    self.create_profile(Self::provisional_profile(&user, (first, last)))
                        .await
                }
            },
        };

        self.profile = Some(resolution.clone());
        Ok(resolution)
    }

    /// Fills in missing names on a persisted profile and saves the fill.
    async fn complete_profile(&mut self, profile: Profile, fill: NameFill) -> ProfileResolution {
        let NameFill {
            has_pending,
            pending_first,
            pending_last,
            derived,
            has_email,
        } = fill;
        let missing_a_name = !profile.has_first_name() || !profile.has_last_name();
        let missing_both = !profile.has_first_name() && !profile.has_last_name();

        let patch = if missing_a_name && has_pending {
            ProfilePatch {
                first_name: Some(
                    pending_first
                        .or_else(|| non_empty(profile.first_name.clone()))
                        .unwrap_or_else(|| "User".to_string()),
                ),
                last_name: Some(
                    pending_last
                        .or_else(|| non_empty(profile.last_name.clone()))
                        .unwrap_or_default(),
                ),
                email: None,
            }
        } else if missing_both && has_email {
            ProfilePatch {
                first_name: Some(derived.0),
                last_name: Some(derived.1),
                email: None,
            }
        } else {
            return ProfileResolution::Persisted(profile);
        };

        match self.update_profile(patch.clone()).await {
            Ok(updated) => ProfileResolution::Persisted(updated),
            Err(e) => {
                warn!("Failed to save profile name: {}", e);
                let mut filled = profile;
                filled.first_name = patch.first_name;
                filled.last_name = patch.last_name;
                ProfileResolution::Persisted(filled)
            }
        }
    }

    async fn create_profile(&mut self, profile: Profile) -> ProfileResolution {
        info!("No profile found, creating one for {}", profile.id);
        let created = match encode(&profile) {
            Ok(row) => self.insert_typed::<Profile>("profiles", row).await,
            Err(e) => Err(e),
        };
        match created {
            Ok(created) => ProfileResolution::Persisted(created),
            Err(e) => {
                warn!("Error creating profile, keeping it in memory: {}", e);
                ProfileResolution::Ephemeral(profile)
            }
        }
    }

    pub async fn update_profile(&mut self, patch: ProfilePatch) -> Result<Profile, LibraryError> {
        let user = self.auth_user()?;
        match self.patch_profile_row(&user.id, &patch).await {
            Ok(profile) => {
                self.profile = Some(ProfileResolution::Persisted(profile.clone()));
                Ok(profile)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    async fn patch_profile_row(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<Profile, GatewayError> {
        let rows = self
            .backend
            .update("profiles", encode(patch)?, &[Filter::eq("id", user_id)])
            .await?;
        decode::<Profile>(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NoRows {
                table: "profiles".to_string(),
            })
    }

    // =========================================================================
    // Playlists
    // =========================================================================

    /// Loads the user's playlists and their tracks. A playlist whose tracks
    /// cannot be loaded is kept with an empty track list.
    pub async fn fetch_playlists(&mut self) -> &[Playlist] {
        let Ok(user) = self.auth_user() else {
            warn!("User not authenticated, skipping playlists fetch");
            self.playlists = vec![];
            return &self.playlists;
        };

        let query = Query::table("playlists").eq("user_id", user.id.as_str());
        let mut playlists = match self.select_typed::<Playlist>(&query).await {
            Ok(playlists) => playlists,
            Err(e) if e.is_relation_missing() => {
                info!("Playlists table does not exist, using empty list");
                vec![]
            }
            Err(e) => {
                warn!("Error fetching playlists: {}", e);
                vec![]
            }
        };

        let hydrated = join_all(playlists.iter().map(|p| self.playlist_tracks(&p.id))).await;
        for (playlist, result) in playlists.iter_mut().zip(hydrated) {
            match result {
                Ok(tracks) => playlist.tracks = tracks,
                Err(e) => warn!("Error fetching tracks for playlist {}: {}", playlist.id, e),
            }
        }

        self.playlists = playlists;
        &self.playlists
    }

    async fn playlist_tracks(&self, playlist_id: &RowId) -> Result<Vec<Track>, GatewayError> {
        let entries = self.playlist_entries(playlist_id).await?;
        let ids: Vec<RowId> = entries.into_iter().filter_map(|pt| pt.music_id).collect();
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let tracks = self
            .select_typed::<Track>(&Query::table("music").is_in("id", &ids))
            .await?;
        Ok(in_id_order(&ids, tracks))
    }

    async fn playlist_entries(&self, playlist_id: &RowId) -> Result<Vec<PlaylistTrack>, GatewayError> {
        let query = Query::table("playlist_tracks")
            .select("playlist_id, music_id, position")
            .eq("playlist_id", playlist_id)
            .order("position", true);
        self.select_typed(&query).await
    }

    pub async fn create_playlist(
        &mut self,
        name: &str,
        description: &str,
    ) -> Result<Playlist, LibraryError> {
        let user = self.auth_user()?;
        let row = encode(&NewPlaylist {
            user_id: user.id,
            name: name.to_string(),
            description: description.to_string(),
        })?;
        match self.insert_typed::<Playlist>("playlists", row).await {
            Ok(playlist) => {
                info!("Created playlist {} ({})", playlist.name, playlist.id);
                self.playlists.push(playlist.clone());
                Ok(playlist)
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Adds a track to a playlist unless it is already there.
    pub async fn add_track_to_playlist(
        &mut self,
        playlist_id: &RowId,
        track_id: &RowId,
    ) -> Result<PlaylistAddition, LibraryError> {
        let addition = match self.insert_playlist_entry(playlist_id, track_id).await {
            Ok(addition) => addition,
            Err(e) => {
                error!("Error adding track {} to playlist {}: {}", track_id, playlist_id, e);
                self.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };

        if addition == PlaylistAddition::Added {
            self.append_local_track(playlist_id, track_id).await;
        }
        Ok(addition)
    }

    pub async fn remove_track_from_playlist(
        &mut self,
        playlist_id: &RowId,
        track_id: &RowId,
    ) -> Result<(), LibraryError> {
        let filters = [
            Filter::eq("playlist_id", playlist_id),
            Filter::eq("music_id", track_id),
        ];
        if let Err(e) = self.backend.delete("playlist_tracks", &filters).await {
            self.last_error = Some(e.to_string());
            return Err(e.into());
        }
        if let Some(playlist) = self.playlists.iter_mut().find(|p| &p.id == playlist_id) {
            playlist.tracks.retain(|t| &t.id != track_id);
        }
        Ok(())
    }

    /// Inserts the (playlist, track) pair at the next free position.
    async fn insert_playlist_entry(
        &self,
        playlist_id: &RowId,
        track_id: &RowId,
    ) -> Result<PlaylistAddition, GatewayError> {
        let entries = self.playlist_entries(playlist_id).await?;
        if entries
            .iter()
            .any(|pt| pt.music_id.as_ref() == Some(track_id))
        {
            debug!("Track {} already in playlist {}", track_id, playlist_id);
            return Ok(PlaylistAddition::AlreadyPresent);
        }

        let entry = PlaylistTrack {
            playlist_id: playlist_id.clone(),
            music_id: Some(track_id.clone()),
            position: Some(PlaylistTrack::next_position(&entries)),
        };
        self.backend
            .insert("playlist_tracks", vec![encode(&entry)?])
            .await?;
        Ok(PlaylistAddition::Added)
    }

    /// Mirrors a stored playlist entry in the local playlist.
    async fn append_local_track(&mut self, playlist_id: &RowId, track_id: &RowId) {
        let Some(index) = self.playlists.iter().position(|p| &p.id == playlist_id) else {
            return;
        };
        if self.playlists[index].contains_track(track_id) {
            return;
        }
        match self.fetch_track(track_id).await {
            Ok(track) => self.playlists[index].tracks.push(track),
            Err(e) => warn!("Could not load track {} for playlist view: {}", track_id, e),
        }
    }

    // =========================================================================
    // Liked tracks
    // =========================================================================

    /// Loads the user's liked tracks. Any failure yields an empty list.
    pub async fn fetch_liked_tracks(&mut self) -> &[Track] {
        let Ok(user) = self.auth_user() else {
            warn!("User not authenticated, skipping liked tracks fetch");
            self.liked_tracks = vec![];
            return &self.liked_tracks;
        };

        self.liked_tracks = match self.liked_track_rows(&user).await {
            Ok(tracks) => tracks,
            Err(e) if e.is_relation_missing() => {
                info!("Liked tracks are not available yet: {}", e);
                vec![]
            }
            Err(e) => {
                warn!("Error fetching liked tracks: {}", e);
                vec![]
            }
        };
        &self.liked_tracks
    }

    async fn liked_track_rows(&self, user: &AuthUser) -> Result<Vec<Track>, GatewayError> {
        let query = Query::table("liked_tracks")
            .select("user_id, music_id")
            .eq("user_id", user.id.as_str());
        let ids: Vec<RowId> = self
            .select_typed::<LikedTrack>(&query)
            .await?
            .into_iter()
            .filter_map(|liked| liked.music_id)
            .collect();
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let tracks = self
            .select_typed::<Track>(&Query::table("music").is_in("id", &ids))
            .await?;
        Ok(in_id_order(&ids, tracks))
    }

    /// Likes a track and files it into the playlist matching its mood.
    ///
    /// Only the like itself can fail the call; filing into a playlist is
    /// skipped when the playlist does not exist or the write fails.
    /// A missing mood playlist is not replaced by "My Favorites".
    pub async fn like_track(&mut self, track_id: &RowId) -> Result<LikeOutcome, LibraryError> {
        let user = self.auth_user()?;

        let like = encode(&LikedTrack {
            user_id: user.id.clone(),
            music_id: Some(track_id.clone()),
        })?;
        if let Err(e) = self.backend.insert("liked_tracks", vec![like]).await {
            warn!("Failed to like track {}: {}", track_id, e);
            self.last_error = Some(e.to_string());
            return Err(e.into());
        }

        let track = match self.fetch_track(track_id).await {
            Ok(track) => track,
            Err(e) => {
                warn!("Liked track {} but could not load it: {}", track_id, e);
                self.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };
        if !self.is_track_liked(track_id) {
            self.liked_tracks.push(track.clone());
        }

        let playlist = self.file_liked_track(&track).await;
        Ok(LikeOutcome { track, playlist })
    }

    async fn file_liked_track(&mut self, track: &Track) -> Option<RowId> {
        if self.playlists.is_empty() {
            self.fetch_playlists().await;
        }

        let mood_name = match &track.mood_id {
            Some(mood_id) => self.mood_name(mood_id).await,
            None => None,
        };
        let route = PlaylistRoute::for_mood(mood_name.as_deref());

        let Some(playlist_id) = self
            .playlists
            .iter()
            .find(|p| p.name == route.playlist_name())
            .map(|p| p.id.clone())
        else {
            info!(
                "No \"{}\" playlist, not filing track {}",
                route.playlist_name(),
                track.id
            );
            return None;
        };

        match self.insert_playlist_entry(&playlist_id, &track.id).await {
            Ok(_) => {
                if let Some(playlist) = self.playlists.iter_mut().find(|p| p.id == playlist_id) {
                    if !playlist.contains_track(&track.id) {
                        playlist.tracks.push(track.clone());
                    }
                }
                debug!("Filed track {} into \"{}\"", track.id, route.playlist_name());
                Some(playlist_id)
            }
            Err(e) => {
                error!("Error adding liked track to playlist: {}", e);
                None
            }
        }
    }

    async fn mood_name(&self, mood_id: &RowId) -> Option<String> {
        let query = Query::table("moods").select("name").eq("id", mood_id);
        match self.backend.select(&query).await {
            Ok(rows) => rows
                .into_iter()
                .next()
                .and_then(|row| row.get("name").and_then(Value::as_str).map(str::to_string)),
            Err(e) => {
                warn!("Could not resolve mood {}: {}", mood_id, e);
                None
            }
        }
    }

    /// Removes the like and takes the track out of every playlist.
    pub async fn unlike_track(&mut self, track_id: &RowId) -> Result<(), LibraryError> {
        let user = self.auth_user()?;

        let filters = [
            Filter::eq("user_id", user.id.as_str()),
            Filter::eq("music_id", track_id),
        ];
        if let Err(e) = self.backend.delete("liked_tracks", &filters).await {
            warn!("Failed to unlike track {}: {}", track_id, e);
            self.last_error = Some(e.to_string());
            return Err(e.into());
        }
        self.liked_tracks.retain(|t| &t.id != track_id);

        if self.playlists.is_empty() {
            self.fetch_playlists().await;
        }
        let playlist_ids: Vec<RowId> = self.playlists.iter().map(|p| p.id.clone()).collect();
        if playlist_ids.is_empty() {
            return Ok(());
        }

        let filters = [
            Filter::is_in("playlist_id", &playlist_ids),
            Filter::eq("music_id", track_id),
        ];
        match self.backend.delete("playlist_tracks", &filters).await {
            Ok(_) => {
                for playlist in self.playlists.iter_mut() {
                    playlist.tracks.retain(|t| &t.id != track_id);
                }
            }
            Err(e) => error!("Error removing track {} from playlists: {}", track_id, e),
        }
        Ok(())
    }

    pub fn is_track_liked(&self, track_id: &RowId) -> bool {
        self.liked_tracks.iter().any(|t| &t.id == track_id)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn fetch_track(&self, track_id: &RowId) -> Result<Track, GatewayError> {
        self.select_typed::<Track>(&Query::table("music").eq("id", track_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NoRows {
                table: "music".to_string(),
            })
    }

    async fn select_typed<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, GatewayError> {
        decode(self.backend.select(query).await?)
    }

    async fn insert_typed<T: DeserializeOwned>(&self, table: &str, row: Value) -> Result<T, GatewayError> {
        decode::<T>(self.backend.insert(table, vec![row]).await?)?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::NoRows {
                table: table.to_string(),
            })
    }

    /// Drops everything, used on logout.
    pub fn clear(&mut self) {
        self.profile = None;
        self.playlists.clear();
        self.liked_tracks.clear();
        self.last_error = None;
        self.loading = false;
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref().map(ProfileResolution::profile)
    }

    pub fn profile_resolution(&self) -> Option<&ProfileResolution> {
        self.profile.as_ref()
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn playlist_by_name(&self, name: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.name == name)
    }

    pub fn liked_tracks(&self) -> &[Track] {
        &self.liked_tracks
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
