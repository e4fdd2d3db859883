//! End-to-end tests for the user library
//!
//! Tests profile resolution, likes, mood based playlist filing and
//! playlist edits.

mod common;

use common::{
    track_id_for_mood, track_without_mood, TestApp, BARE_EMAIL, BARE_PASS, CHILL_VIBES,
    MY_FAVORITES, WORKOUT_MIX,
};
use moodtunes::gateway::Operation;
use moodtunes::library::{LibraryError, PlaylistAddition};
use moodtunes::models::{PendingProfile, ProfilePatch, RowId};
use moodtunes::storage::{ClientStorage, PENDING_PROFILE_KEY};
use serde_json::Value;

fn playlist_id(test_app: &TestApp, name: &str) -> RowId {
    test_app
        .app
        .library()
        .playlist_by_name(name)
        .unwrap_or_else(|| panic!("no playlist {}", name))
        .id
        .clone()
}

fn occurrences(test_app: &TestApp, playlist: &RowId, track: &RowId) -> usize {
    test_app
        .gateway
        .rows("playlist_tracks")
        .iter()
        .filter(|row| {
            row["playlist_id"] == playlist.to_value() && row["music_id"] == track.to_value()
        })
        .count()
}

// =============================================================================
// Profile
// =============================================================================

#[tokio::test]
async fn test_profile_name_derived_from_dotted_email() {
    let test_app = TestApp::signed_in().await;

    let resolution = test_app.app.library().profile_resolution().unwrap();
    let profile = resolution.profile();

    assert!(resolution.is_persisted());
    assert_eq!(profile.first_name.as_deref(), Some("Jane"));
    assert_eq!(profile.last_name.as_deref(), Some("Doe"));
    assert_eq!(test_app.gateway.row_count("profiles"), 1);
}

#[tokio::test]
async fn test_profile_name_derived_from_plain_email() {
    let mut test_app = TestApp::spawn().await;
    test_app.app.login(BARE_EMAIL, BARE_PASS).await.unwrap();

    let profile = test_app.app.library().profile().unwrap();

    assert_eq!(profile.first_name.as_deref(), Some("Johnsmith"));
    assert_eq!(profile.last_name.as_deref(), Some(""));
}

#[tokio::test]
async fn test_pending_profile_is_used_once() {
    let mut test_app = TestApp::spawn().await;
    test_app
        .app
        .session()
        .register(
            "grace.hopper@example.com",
            "cobol1959",
            Some(PendingProfile {
                first_name: Some("Amazing".to_string()),
                last_name: Some("Grace".to_string()),
            }),
        )
        .await
        .unwrap();

    test_app
        .app
        .login("grace.hopper@example.com", "cobol1959")
        .await
        .unwrap();

    let profile = test_app.app.library().profile().unwrap();
    assert_eq!(profile.first_name.as_deref(), Some("Amazing"));
    assert_eq!(profile.last_name.as_deref(), Some("Grace"));
    assert!(test_app.storage.get(PENDING_PROFILE_KEY).unwrap().is_none());

    // a later fetch reads the stored profile back
    let again = test_app.app.library_mut().fetch_profile().await.unwrap();
    assert_eq!(again.profile().first_name.as_deref(), Some("Amazing"));
    assert_eq!(test_app.gateway.row_count("profiles"), 1);
}

#[tokio::test]
async fn test_profile_without_table_is_ephemeral() {
    let mut test_app = TestApp::spawn().await;
    test_app.gateway.drop_table("profiles");

    test_app.app.login(BARE_EMAIL, BARE_PASS).await.unwrap();

    let resolution = test_app.app.library().profile_resolution().unwrap();
    assert!(!resolution.is_persisted());
    assert_eq!(resolution.profile().first_name.as_deref(), Some("Johnsmith"));
}

#[tokio::test]
async fn test_profile_creation_failure_is_ephemeral() {
    let mut test_app = TestApp::spawn().await;
    test_app
        .gateway
        .inject_failure("profiles", Operation::Insert, "row-level security violation");

    test_app.app.login(BARE_EMAIL, BARE_PASS).await.unwrap();

    let resolution = test_app.app.library().profile_resolution().unwrap();
    assert!(!resolution.is_persisted());
    assert_eq!(test_app.gateway.row_count("profiles"), 0);
}

#[tokio::test]
async fn test_update_profile() {
    let mut test_app = TestApp::signed_in().await;

    let updated = test_app
        .app
        .library_mut()
        .update_profile(ProfilePatch {
            last_name: Some("Roe".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(updated.first_name.as_deref(), Some("Jane"));
    assert_eq!(updated.last_name.as_deref(), Some("Roe"));
    assert_eq!(
        test_app.app.library().profile().unwrap().last_name.as_deref(),
        Some("Roe")
    );
}

// =============================================================================
// Likes and filing
// =============================================================================

#[tokio::test]
async fn test_like_energetic_track_goes_to_workout_mix() {
    let mut test_app = TestApp::signed_in().await;
    let track = track_id_for_mood(&test_app.gateway, "Energetic");
    let workout = playlist_id(&test_app, WORKOUT_MIX);

    let outcome = test_app.app.library_mut().like_track(&track).await.unwrap();

    assert_eq!(outcome.playlist, Some(workout.clone()));
    assert!(test_app.app.library().is_track_liked(&track));
    assert!(test_app
        .app
        .library()
        .playlist_by_name(WORKOUT_MIX)
        .unwrap()
        .contains_track(&track));
    assert_eq!(occurrences(&test_app, &workout, &track), 1);
}

#[tokio::test]
async fn test_like_calm_track_goes_to_chill_vibes() {
    let mut test_app = TestApp::signed_in().await;
    let track = track_id_for_mood(&test_app.gateway, "Calm");
    let chill = playlist_id(&test_app, CHILL_VIBES);

    let outcome = test_app.app.library_mut().like_track(&track).await.unwrap();

    assert_eq!(outcome.playlist, Some(chill));
}

#[tokio::test]
async fn test_like_track_without_mood_goes_to_favorites() {
    let mut test_app = TestApp::signed_in().await;
    let track = track_without_mood(&test_app.gateway);
    let favorites = playlist_id(&test_app, MY_FAVORITES);

    let outcome = test_app.app.library_mut().like_track(&track).await.unwrap();

    assert_eq!(outcome.playlist, Some(favorites));
    assert_eq!(outcome.track.title, "Loose Track");
}

#[tokio::test]
async fn test_like_other_mood_goes_to_favorites() {
    let mut test_app = TestApp::signed_in().await;
    let track = track_id_for_mood(&test_app.gateway, "Angry");
    let favorites = playlist_id(&test_app, MY_FAVORITES);

    let outcome = test_app.app.library_mut().like_track(&track).await.unwrap();

    assert_eq!(outcome.playlist, Some(favorites));
}

#[tokio::test]
async fn test_like_without_target_playlist_only_likes() {
    let mut test_app = TestApp::spawn().await;
    test_app.app.login(BARE_EMAIL, BARE_PASS).await.unwrap();
    let track = track_id_for_mood(&test_app.gateway, "Energetic");

    let outcome = test_app.app.library_mut().like_track(&track).await.unwrap();

    assert_eq!(outcome.playlist, None);
    assert!(test_app.app.library().is_track_liked(&track));
    assert_eq!(test_app.gateway.row_count("playlist_tracks"), 0);
}

#[tokio::test]
async fn test_like_failure_leaves_state_untouched() {
    let mut test_app = TestApp::signed_in().await;
    let track = track_id_for_mood(&test_app.gateway, "Happy");
    test_app
        .gateway
        .inject_failure("liked_tracks", Operation::Insert, "insert failed");

    let result = test_app.app.library_mut().like_track(&track).await;

    assert!(matches!(result, Err(LibraryError::Gateway(_))));
    assert!(test_app.app.library().liked_tracks().is_empty());
    assert_eq!(test_app.gateway.row_count("playlist_tracks"), 0);
}

#[tokio::test]
async fn test_like_requires_session() {
    let mut test_app = TestApp::spawn().await;
    let track = track_id_for_mood(&test_app.gateway, "Happy");

    let result = test_app.app.library_mut().like_track(&track).await;

    assert!(matches!(result, Err(LibraryError::NotAuthenticated)));
}

#[tokio::test]
async fn test_like_then_unlike_removes_everywhere() {
    let mut test_app = TestApp::signed_in().await;
    let track = track_id_for_mood(&test_app.gateway, "Energetic");
    let favorites = playlist_id(&test_app, MY_FAVORITES);
    let library = test_app.app.library_mut();
    library.like_track(&track).await.unwrap();
    library
        .add_track_to_playlist(&favorites, &track)
        .await
        .unwrap();

    library.unlike_track(&track).await.unwrap();

    assert!(!library.is_track_liked(&track));
    assert!(library.playlists().iter().all(|p| !p.contains_track(&track)));
    assert_eq!(test_app.gateway.row_count("liked_tracks"), 0);
    assert!(test_app
        .gateway
        .rows("playlist_tracks")
        .iter()
        .all(|row| row["music_id"] != track.to_value()));
}

#[tokio::test]
async fn test_liked_tracks_survive_restart() {
    let mut test_app = TestApp::signed_in().await;
    let track = track_id_for_mood(&test_app.gateway, "Sad");
    test_app.app.library_mut().like_track(&track).await.unwrap();

    let restarted = test_app.restart().await;

    let liked: Vec<&RowId> = restarted.library().liked_tracks().iter().map(|t| &t.id).collect();
    assert_eq!(liked, vec![&track]);
    restarted.teardown();
}

#[tokio::test]
async fn test_liked_tracks_without_table_are_empty() {
    let mut test_app = TestApp::signed_in().await;
    test_app.gateway.drop_table("liked_tracks");

    let liked = test_app.app.library_mut().fetch_liked_tracks().await;

    assert!(liked.is_empty());
}

// =============================================================================
// Playlists
// =============================================================================

#[tokio::test]
async fn test_signed_in_user_sees_default_playlists() {
    let test_app = TestApp::signed_in().await;

    let mut names: Vec<&str> = test_app
        .app
        .library()
        .playlists()
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    names.sort();

    assert_eq!(names, vec![CHILL_VIBES, MY_FAVORITES, WORKOUT_MIX]);
}

#[tokio::test]
async fn test_add_track_to_playlist_twice_keeps_one_entry() {
    let mut test_app = TestApp::signed_in().await;
    let track = track_id_for_mood(&test_app.gateway, "Romantic");
    let favorites = playlist_id(&test_app, MY_FAVORITES);

    let first = test_app
        .app
        .library_mut()
        .add_track_to_playlist(&favorites, &track)
        .await
        .unwrap();
    let second = test_app
        .app
        .library_mut()
        .add_track_to_playlist(&favorites, &track)
        .await
        .unwrap();

    assert_eq!(first, PlaylistAddition::Added);
    assert_eq!(second, PlaylistAddition::AlreadyPresent);
    assert_eq!(occurrences(&test_app, &favorites, &track), 1);
    let local = test_app.app.library().playlist_by_name(MY_FAVORITES).unwrap();
    assert_eq!(local.tracks.iter().filter(|t| t.id == track).count(), 1);
}

#[tokio::test]
async fn test_playlist_positions_follow_insertion_order() {
    let mut test_app = TestApp::signed_in().await;
    let favorites = playlist_id(&test_app, MY_FAVORITES);
    let tracks = [
        track_id_for_mood(&test_app.gateway, "Happy"),
        track_id_for_mood(&test_app.gateway, "Sad"),
        track_id_for_mood(&test_app.gateway, "Calm"),
    ];
    for track in &tracks {
        test_app
            .app
            .library_mut()
            .add_track_to_playlist(&favorites, track)
            .await
            .unwrap();
    }

    let positions: Vec<Value> = test_app
        .gateway
        .rows("playlist_tracks")
        .iter()
        .map(|row| row["position"].clone())
        .collect();
    assert_eq!(positions, vec![Value::from(1), Value::from(2), Value::from(3)]);

    let reloaded = test_app.app.library_mut().fetch_playlists().await;
    let order: Vec<&RowId> = reloaded
        .iter()
        .find(|p| p.name == MY_FAVORITES)
        .unwrap()
        .tracks
        .iter()
        .map(|t| &t.id)
        .collect();
    assert_eq!(order, tracks.iter().collect::<Vec<_>>());
}

#[tokio::test]
async fn test_remove_track_from_playlist() {
    let mut test_app = TestApp::signed_in().await;
    let track = track_id_for_mood(&test_app.gateway, "Happy");
    let favorites = playlist_id(&test_app, MY_FAVORITES);
    let library = test_app.app.library_mut();
    library.add_track_to_playlist(&favorites, &track).await.unwrap();

    library.remove_track_from_playlist(&favorites, &track).await.unwrap();

    assert!(!library.playlist_by_name(MY_FAVORITES).unwrap().contains_track(&track));
    assert_eq!(test_app.gateway.row_count("playlist_tracks"), 0);
}

#[tokio::test]
async fn test_create_playlist() {
    let mut test_app = TestApp::signed_in().await;

    let playlist = test_app
        .app
        .library_mut()
        .create_playlist("Road Trip", "Long drives")
        .await
        .unwrap();

    assert_eq!(playlist.user_id, test_app.user_id);
    assert!(test_app.app.library().playlist_by_name("Road Trip").is_some());
    assert_eq!(test_app.gateway.row_count("playlists"), 4);
}

#[tokio::test]
async fn test_logout_clears_library() {
    let mut test_app = TestApp::signed_in().await;
    let track = track_id_for_mood(&test_app.gateway, "Happy");
    test_app.app.library_mut().like_track(&track).await.unwrap();

    test_app.app.logout().await.unwrap();

    let library = test_app.app.library();
    assert!(library.profile().is_none());
    assert!(library.playlists().is_empty());
    assert!(library.liked_tracks().is_empty());
}
