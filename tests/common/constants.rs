//! Shared constants for end-to-end tests
//!
//! When test data changes (user credentials, mood names, etc.),
//! update only this file.
#![allow(dead_code)]

// ============================================================================
// Test User Credentials
// ============================================================================

/// Regular test user, gets the default playlists
pub const TEST_EMAIL: &str = "jane.doe@example.com";

/// Regular test user password
pub const TEST_PASS: &str = "testpass123";

/// Second user without playlists and without a dot in the email
pub const BARE_EMAIL: &str = "johnsmith@example.com";

/// Second user password
pub const BARE_PASS: &str = "barepass123";

// ============================================================================
// Catalog
// ============================================================================

/// Number of moods the seeder creates
pub const MOOD_COUNT: usize = 9;

/// Tracks seeded for curated moods (Happy, Sad, Energetic, Calm, Romantic)
pub const CURATED_TRACKS_PER_MOOD: usize = 5;

/// Tracks seeded for the other moods
pub const GENERATED_TRACKS_PER_MOOD: usize = 3;

pub const TOTAL_SEEDED_TRACKS: usize =
    5 * CURATED_TRACKS_PER_MOOD + 4 * GENERATED_TRACKS_PER_MOOD;

// ============================================================================
// Playlists
// ============================================================================

pub const MY_FAVORITES: &str = "My Favorites";
pub const WORKOUT_MIX: &str = "Workout Mix";
pub const CHILL_VIBES: &str = "Chill Vibes";
