//! CRUD over the standalone `tracks` table, where the mood is a plain string
//! column instead of a reference to `moods`.
//!
//! Unlike the stores, nothing here is swallowed: every backend error is
//! logged and returned to the caller as is.

use crate::gateway::{decode, encode, Backend, Filter, GatewayError, Query};
use crate::models::{FlatTrack, FlatTrackPatch, NewFlatTrack, RowId};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{error, info};

const TABLE: &str = "tracks";

pub struct TrackService {
    backend: Arc<dyn Backend>,
}

impl TrackService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Loads the given tracks, keyed by mood name, in a single insert.
    /// Does nothing when the table already has rows. Returns the number of
    /// rows inserted.
    pub async fn initialize_database(
        &self,
        tracks_by_mood: &BTreeMap<String, Vec<NewFlatTrack>>,
    ) -> Result<usize, GatewayError> {
        let count = self.backend.count(TABLE, &[]).await.inspect_err(|e| {
            error!("Error checking existing tracks: {}", e);
        })?;
        if count > 0 {
            info!("Database already contains {} tracks, skipping initialization", count);
            return Ok(0);
        }

        let rows = tracks_by_mood
            .iter()
            .flat_map(|(mood, tracks)| {
                tracks.iter().map(move |track| NewFlatTrack {
                    mood: Some(mood.clone()),
                    ..track.clone()
                })
            })
            .map(|track| encode(&track))
            .collect::<Result<Vec<Value>, _>>()?;
        if rows.is_empty() {
            return Ok(0);
        }

        let inserted = rows.len();
        self.backend.insert(TABLE, rows).await.inspect_err(|e| {
            error!("Error inserting tracks: {}", e);
        })?;
        info!("Initialized database with {} tracks", inserted);
        Ok(inserted)
    }

    pub async fn get_tracks_by_mood(&self, mood: &str) -> Result<Vec<FlatTrack>, GatewayError> {
        let rows = self
            .backend
            .select(&Query::table(TABLE).eq("mood", mood))
            .await
            .inspect_err(|e| error!("Error fetching tracks for mood {}: {}", mood, e))?;
        decode(rows)
    }

    pub async fn get_all_tracks(&self) -> Result<Vec<FlatTrack>, GatewayError> {
        let rows = self
            .backend
            .select(&Query::table(TABLE))
            .await
            .inspect_err(|e| error!("Error fetching all tracks: {}", e))?;
        decode(rows)
    }

    /// Distinct mood names in the order the backend sorts them.
    pub async fn get_all_moods(&self) -> Result<Vec<String>, GatewayError> {
        let rows = self
            .backend
            .select(&Query::table(TABLE).select("mood").order("mood", true))
            .await
            .inspect_err(|e| error!("Error fetching moods: {}", e))?;

        let mut seen = HashSet::new();
        Ok(rows
            .iter()
            .filter_map(|row| row.get("mood").and_then(Value::as_str))
            .filter(|mood| seen.insert(mood.to_string()))
            .map(str::to_string)
            .collect())
    }

    pub async fn add_track(&self, track: &NewFlatTrack) -> Result<FlatTrack, GatewayError> {
        let rows = self
            .backend
            .insert(TABLE, vec![encode(track)?])
            .await
            .inspect_err(|e| error!("Error adding track: {}", e))?;
        first_row(rows)
    }

    pub async fn update_track(
        &self,
        id: &RowId,
        updates: &FlatTrackPatch,
    ) -> Result<FlatTrack, GatewayError> {
        let rows = self
            .backend
            .update(TABLE, encode(updates)?, &[Filter::eq("id", id)])
            .await
            .inspect_err(|e| error!("Error updating track {}: {}", id, e))?;
        first_row(rows)
    }

    pub async fn delete_track(&self, id: &RowId) -> Result<(), GatewayError> {
        self.backend
            .delete(TABLE, &[Filter::eq("id", id)])
            .await
            .inspect_err(|e| error!("Error deleting track {}: {}", id, e))?;
        Ok(())
    }
}

fn first_row(rows: Vec<Value>) -> Result<FlatTrack, GatewayError> {
    decode::<FlatTrack>(rows)?
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::NoRows {
            table: TABLE.to_string(),
        })
}
