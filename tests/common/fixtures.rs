//! Test fixture creation for the in-memory backend

use super::constants::*;
use anyhow::{anyhow, Result};
use moodtunes::gateway::{AuthGateway, MemoryGateway};
use moodtunes::models::{Mood, RowId, Track};
use moodtunes::seed::Seeder;
use serde_json::json;
use std::sync::Arc;

/// Creates a backend with the full schema, the seeded catalog and two
/// registered users. Only the first one gets the default playlists.
/// Returns (gateway, id of the first user)
pub async fn create_test_backend() -> Result<(Arc<MemoryGateway>, String)> {
    let gateway = Arc::new(MemoryGateway::with_schema());
    let seeder = Seeder::new(gateway.clone());
    seeder.seed_all_data().await?;

    let user = gateway.sign_up(TEST_EMAIL, TEST_PASS).await?;
    let playlists = seeder.seed_playlists(&user.id).await;
    if playlists.len() != 3 {
        return Err(anyhow!("expected 3 playlists, got {}", playlists.len()));
    }
    gateway.sign_up(BARE_EMAIL, BARE_PASS).await?;

    Ok((gateway, user.id))
}

/// First seeded track tagged with the named mood.
#[allow(dead_code)]
pub fn track_id_for_mood(gateway: &MemoryGateway, mood_name: &str) -> RowId {
    let moods: Vec<Mood> = gateway
        .rows("moods")
        .into_iter()
        .map(|row| serde_json::from_value(row).unwrap())
        .collect();
    let mood = moods
        .iter()
        .find(|m| m.name == mood_name)
        .unwrap_or_else(|| panic!("no mood named {}", mood_name));

    gateway
        .rows("music")
        .into_iter()
        .map(|row| serde_json::from_value::<Track>(row).unwrap())
        .find(|t| t.mood_id.as_ref() == Some(&mood.id))
        .map(|t| t.id)
        .unwrap_or_else(|| panic!("no track for mood {}", mood_name))
}

/// Stores a track with no mood reference and returns its id.
#[allow(dead_code)]
pub fn track_without_mood(gateway: &MemoryGateway) -> RowId {
    gateway.put_rows(
        "music",
        vec![json!({"title": "Loose Track", "artist": "Nobody", "album": "B-Sides"})],
    );
    gateway
        .rows("music")
        .into_iter()
        .map(|row| serde_json::from_value::<Track>(row).unwrap())
        .find(|t| t.title == "Loose Track")
        .map(|t| t.id)
        .unwrap()
}
