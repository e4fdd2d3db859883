/// Default playlist a liked track is filed into, picked from its mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistRoute {
    WorkoutMix,
    ChillVibes,
    MyFavorites,
}

const WORKOUT_MOODS: [&str; 3] = ["happy", "excited", "energetic"];
const CHILL_MOODS: [&str; 3] = ["calm", "relaxed", "romantic"];

impl PlaylistRoute {
    /// Case-insensitive lookup; unknown or missing moods go to My Favorites.
    pub fn for_mood(mood_name: Option<&str>) -> Self {
        let Some(name) = mood_name.map(|n| n.trim().to_lowercase()) else {
            return PlaylistRoute::MyFavorites;
        };
        if WORKOUT_MOODS.contains(&name.as_str()) {
            PlaylistRoute::WorkoutMix
        } else if CHILL_MOODS.contains(&name.as_str()) {
            PlaylistRoute::ChillVibes
        } else {
            PlaylistRoute::MyFavorites
        }
    }

    pub fn playlist_name(&self) -> &'static str {
        match self {
            PlaylistRoute::WorkoutMix => "Workout Mix",
            PlaylistRoute::ChillVibes => "Chill Vibes",
            PlaylistRoute::MyFavorites => "My Favorites",
        }
    }
}
