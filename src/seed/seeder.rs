use super::samples::{self, DEFAULT_PLAYLISTS, MOODS};
use super::SeedError;
use crate::gateway::{decode, encode, Backend, GatewayError, Query};
use crate::models::{Mood, NewMood, NewPlaylist, NewTrack, Playlist, PlaylistTrack, RowId, Track};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodTrackCount {
    pub mood: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedSummary {
    pub moods: usize,
    pub tracks: Vec<MoodTrackCount>,
    pub all_tracks: Vec<Track>,
}

/// Seeds reference data. Every step first checks for existing rows and
/// returns them instead of inserting again.
pub struct Seeder {
    backend: Arc<dyn Backend>,
}

impl Seeder {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Rows already present for the scope, `None` when the check itself
    /// failed.
    async fn existing<T: DeserializeOwned>(&self, query: &Query) -> Option<Vec<T>> {
        match self.backend.select(query).await.and_then(decode) {
            Ok(rows) => Some(rows),
            Err(e) => {
                error!("Error checking existing {}: {}", query.table, e);
                None
            }
        }
    }

    /// Inserts all rows in one request, falling back to one request per row
    /// when the batch is rejected. Rows that fail on their own are skipped.
    async fn insert_with_fallback<T, R>(&self, table: &str, rows: &[T]) -> Vec<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let encoded: Vec<_> = match rows.iter().map(encode).collect::<Result<_, _>>() {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("Could not encode rows for {}: {}", table, e);
                return vec![];
            }
        };

        let batch = self
            .backend
            .insert(table, encoded.clone())
            .await
            .and_then(decode::<R>);
        match batch {
            Ok(inserted) => {
                info!("Seeded {} rows into {} in batch", inserted.len(), table);
                return inserted;
            }
            Err(e) => warn!(
                "Batch insert into {} failed, inserting rows one by one: {}",
                table, e
            ),
        }

        let mut inserted = Vec::with_capacity(encoded.len());
        for row in encoded {
            let result: Result<Vec<R>, GatewayError> = self
                .backend
                .insert(table, vec![row])
                .await
                .and_then(decode);
            match result {
                Ok(rows) => inserted.extend(rows),
                Err(e) => warn!("Error inserting row into {}: {}", table, e),
            }
        }
        info!("Seeded {} rows into {} individually", inserted.len(), table);
        inserted
    }

    pub async fn seed_moods(&self) -> Vec<Mood> {
        let query = Query::table("moods").select("id, name");
        let Some(existing) = self.existing::<Mood>(&query).await else {
            return vec![];
        };
        if !existing.is_empty() {
            info!("{} moods already exist", existing.len());
            return existing;
        }

        let moods: Vec<NewMood> = MOODS
            .iter()
            .map(|m| NewMood {
                name: m.name.to_string(),
                description: m.description.to_string(),
            })
            .collect();
        self.insert_with_fallback("moods", &moods).await
    }

    pub async fn seed_tracks_for_mood(&self, mood_id: &RowId, mood_name: &str) -> Vec<Track> {
        let query = Query::table("music")
            .select("id, title")
            .eq("mood_id", mood_id);
        let Some(existing) = self.existing::<Track>(&query).await else {
            return vec![];
        };
        if !existing.is_empty() {
            debug!("{} tracks already exist for mood {}", existing.len(), mood_name);
            return existing;
        }

        let tracks: Vec<NewTrack> = samples::tracks_for_mood(mood_name)
            .into_iter()
            .map(|t| NewTrack {
                title: t.title,
                artist: t.artist,
                album: t.album,
                genre: t.genre,
                mood_id: Some(mood_id.clone()),
            })
            .collect();
        self.insert_with_fallback("music", &tracks).await
    }

    /// Creates the default playlists for a user.
    pub async fn seed_playlists(&self, user_id: &str) -> Vec<Playlist> {
        if user_id.is_empty() {
            error!("Cannot seed playlists without a user id");
            return vec![];
        }
        let query = Query::table("playlists")
            .select("id, user_id, name")
            .eq("user_id", user_id);
        let Some(existing) = self.existing::<Playlist>(&query).await else {
            return vec![];
        };
        if !existing.is_empty() {
            info!("{} playlists already exist for user {}", existing.len(), user_id);
            return existing;
        }

        let playlists: Vec<NewPlaylist> = DEFAULT_PLAYLISTS
            .iter()
            .map(|(name, description)| NewPlaylist {
                user_id: user_id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
            })
            .collect();
        self.insert_with_fallback("playlists", &playlists).await
    }

    /// Appends tracks to a playlist, skipping those already in it. Positions
    /// continue after the current maximum.
    pub async fn add_tracks_to_playlist(
        &self,
        playlist_id: &RowId,
        track_ids: &[RowId],
    ) -> Vec<PlaylistTrack> {
        if track_ids.is_empty() {
            error!("No tracks given for playlist {}", playlist_id);
            return vec![];
        }

        let query = Query::table("playlist_tracks")
            .select("playlist_id, music_id, position")
            .eq("playlist_id", playlist_id);
        let existing: Vec<PlaylistTrack> = self.existing(&query).await.unwrap_or_default();

        let mut new_ids: Vec<&RowId> = vec![];
        for id in track_ids {
            let present = existing.iter().any(|pt| pt.music_id.as_ref() == Some(id));
            if !present && !new_ids.contains(&id) {
                new_ids.push(id);
            }
        }
        if new_ids.is_empty() {
            info!("No new tracks to add to playlist {}", playlist_id);
            return vec![];
        }

        let start = PlaylistTrack::next_position(&existing);
        let mut added = vec![];
        for (offset, track_id) in new_ids.into_iter().enumerate() {
            let entry = PlaylistTrack {
                playlist_id: playlist_id.clone(),
                music_id: Some(track_id.clone()),
                position: Some(start + offset as i64),
            };
            let result: Result<Vec<PlaylistTrack>, GatewayError> = match encode(&entry) {
                Ok(row) => self
                    .backend
                    .insert("playlist_tracks", vec![row])
                    .await
                    .and_then(decode),
                Err(e) => Err(e),
            };
            match result {
                Ok(rows) => added.extend(rows),
                Err(e) => warn!(
                    "Error adding track {} to playlist {}: {}",
                    track_id, playlist_id, e
                ),
            }
        }
        info!("Added {} tracks to playlist {}", added.len(), playlist_id);
        added
    }

    /// Seeds moods and then sample tracks for every mood.
    pub async fn seed_all_data(&self) -> Result<SeedSummary, SeedError> {
        info!("Starting database seeding");
        let moods = self.seed_moods().await;
        if moods.is_empty() {
            warn!("No moods were seeded, cannot proceed with tracks");
            return Err(SeedError::NoMoods);
        }

        let mut counts = Vec::with_capacity(moods.len());
        let mut all_tracks = vec![];
        for mood in &moods {
            let tracks = self.seed_tracks_for_mood(&mood.id, &mood.name).await;
            counts.push(MoodTrackCount {
                mood: mood.name.clone(),
                count: tracks.len(),
            });
            all_tracks.extend(tracks);
        }

        info!(
            "Seeding finished: {} moods, {} tracks",
            moods.len(),
            all_tracks.len()
        );
        Ok(SeedSummary {
            moods: moods.len(),
            tracks: counts,
            all_tracks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MemoryGateway, Operation};

    #[tokio::test]
    async fn batch_failure_falls_back_to_rows() {
        let gateway = Arc::new(MemoryGateway::with_schema());
        gateway.reject_batch_inserts("moods");
        let seeder = Seeder::new(gateway.clone());

        let moods = seeder.seed_moods().await;
        assert_eq!(moods.len(), 9);
        // one rejected batch plus one insert per mood
        assert_eq!(gateway.call_count("moods", Operation::Insert), 10);
    }

    #[tokio::test]
    async fn row_fallback_keeps_only_successful_rows() {
        let gateway = Arc::new(MemoryGateway::with_schema());
        gateway.reject_batch_inserts("music");
        // second generated title collides
        gateway.add_unique("music", &["title"]);
        gateway.put_rows("music", vec![json_track("Angry Track 2", 99)]);
        let seeder = Seeder::new(gateway.clone());

        let tracks = seeder.seed_tracks_for_mood(&RowId::Int(6), "Angry").await;
        let titles: Vec<&str> = tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Angry Track 1", "Angry Track 3"]);
    }

    fn json_track(title: &str, mood_id: i64) -> serde_json::Value {
        serde_json::json!({"title": title, "mood_id": mood_id})
    }

    #[tokio::test]
    async fn existence_check_failure_returns_empty() {
        let gateway = Arc::new(MemoryGateway::with_schema());
        gateway.inject_failure("moods", Operation::Select, "boom");
        let seeder = Seeder::new(gateway.clone());
        assert!(seeder.seed_moods().await.is_empty());
        assert_eq!(gateway.call_count("moods", Operation::Insert), 0);
        assert!(matches!(seeder.seed_all_data().await, Err(SeedError::NoMoods)));
    }

    #[tokio::test]
    async fn add_tracks_to_playlist_dedups_and_continues_positions() {
        let gateway = Arc::new(MemoryGateway::with_schema());
        gateway.put_rows(
            "playlist_tracks",
            vec![serde_json::json!({"playlist_id": 1, "music_id": 1, "position": 3})],
        );
        let seeder = Seeder::new(gateway.clone());

        let ids = [RowId::Int(1), RowId::Int(2), RowId::Int(3), RowId::Int(2)];
        let added = seeder.add_tracks_to_playlist(&RowId::Int(1), &ids).await;
        let positions: Vec<Option<i64>> = added.iter().map(|pt| pt.position).collect();
        assert_eq!(positions, vec![Some(4), Some(5)]);

        assert!(seeder
            .add_tracks_to_playlist(&RowId::Int(1), &ids)
            .await
            .is_empty());
        assert!(seeder.add_tracks_to_playlist(&RowId::Int(1), &[]).await.is_empty());
    }

    #[tokio::test]
    async fn seeds_default_playlists_once() {
        let gateway = Arc::new(MemoryGateway::with_schema());
        let seeder = Seeder::new(gateway.clone());
        let first = seeder.seed_playlists("user-1").await;
        let names: Vec<&str> = first.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["My Favorites", "Workout Mix", "Chill Vibes"]);

        let second = seeder.seed_playlists("user-1").await;
        assert_eq!(second.len(), 3);
        assert_eq!(gateway.row_count("playlists"), 3);
        assert!(seeder.seed_playlists("").await.is_empty());
    }
}
