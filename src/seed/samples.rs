//! Bootstrap data: the mood list, sample tracks per mood and the default
//! playlists every user starts with.

pub struct SampleMood {
    pub name: &'static str,
    pub description: &'static str,
}

pub const MOODS: [SampleMood; 9] = [
    SampleMood {
        name: "Happy",
        description: "Upbeat and joyful music to boost your mood",
    },
    SampleMood {
        name: "Sad",
        description: "Melancholic tunes for when you need to feel your emotions",
    },
    SampleMood {
        name: "Energetic",
        description: "High-energy tracks to get you moving",
    },
    SampleMood {
        name: "Calm",
        description: "Peaceful music to help you relax and unwind",
    },
    SampleMood {
        name: "Romantic",
        description: "Love songs and heartfelt melodies",
    },
    SampleMood {
        name: "Angry",
        description: "Intense music to channel your frustration",
    },
    SampleMood {
        name: "Relaxed",
        description: "Laid-back tunes for chilling out",
    },
    SampleMood {
        name: "Fearful",
        description: "Atmospheric tracks with a touch of suspense",
    },
    SampleMood {
        name: "Excited",
        description: "Celebratory music for special moments",
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct SampleTrack {
    pub title: String,
    pub album: String,
    pub artist: String,
    pub genre: String,
}

/// (title, album, artist, genre)
type Row = (&'static str, &'static str, &'static str, &'static str);

const HAPPY: [Row; 5] = [
    ("Sunshine Vibes", "Joyful Beats", "Joy Beats", "Pop"),
    ("Cheer Up!", "Smiley Sounds", "Smiley Sounds", "Pop"),
    ("Bubble Pop", "Fun Factory", "Fun Factory", "Pop"),
    ("Bright Morning", "Daylight Tunes", "Morning Vibes", "Pop"),
    ("Happiness Overload", "Feel Good", "Jolly Crew", "Pop"),
];

const SAD: [Row; 5] = [
    ("Blue Hour", "Lonely Nights", "Tearful Tunes", "Ballad"),
    ("Midnight Rain", "Dark Hours", "The Echo", "Alternative"),
    ("Quiet Room", "Melancholy", "Solitary Notes", "Ambient"),
    ("Fading Light", "Lonely Heart", "Sad Souls", "Ballad"),
    ("Tears in the Rain", "Solitude Sound", "Soul Echo", "Alternative"),
];

const ENERGETIC: [Row; 5] = [
    ("Power Surge", "Electric Energy", "Electro Drive", "Electronic"),
    ("Go Go Go!", "Upbeat Pulse", "Upbeat Unit", "Pop"),
    ("Rush Hour", "High Energy", "Vibe Masters", "Electronic"),
    ("Jump Higher", "Adrenaline Rush", "Energy Pulse", "Pop"),
    ("Energy Flow", "Charged", "Vibe Squad", "Electronic"),
];

const CALM: [Row; 5] = [
    ("Tranquility", "Peaceful Sounds", "Serenity Sounds", "Ambient"),
    ("Lost in Thought", "Mindful Melodies", "Mindful Melodies", "Ambient"),
    ("Peaceful Dreams", "Relaxation", "Harmony Collective", "Ambient"),
    ("Calm Waters", "Stillness", "Silent Waves", "Ambient"),
    ("Evening Breeze", "Gentle Winds", "Soft Winds", "Ambient"),
];

const ROMANTIC: [Row; 5] = [
    ("Love Song", "Heart Beats", "Love Sound", "Pop"),
    ("Sweet Dreams", "Romantic Nights", "Dream Sound", "Pop"),
    ("Forever", "Timeless Love", "Eternity Sound", "Pop"),
    ("My Heart", "Love Letters", "Heart Beat", "Pop"),
    ("Dreamy Eyes", "Lover Boy", "Dream Maker", "Pop"),
];

/// Sample tracks for a mood. Moods without a curated list get three
/// generic tracks named after the mood.
pub fn tracks_for_mood(mood_name: &str) -> Vec<SampleTrack> {
    let curated: &[Row] = match mood_name {
        "Happy" => &HAPPY,
        "Sad" => &SAD,
        "Energetic" => &ENERGETIC,
        "Calm" => &CALM,
        "Romantic" => &ROMANTIC,
        _ => {
            return (1..=3)
                .map(|n| SampleTrack {
                    title: format!("{} Track {}", mood_name, n),
                    album: format!("{} Album", mood_name),
                    artist: "Various Artists".to_string(),
                    genre: "Mixed".to_string(),
                })
                .collect()
        }
    };
    curated
        .iter()
        .map(|(title, album, artist, genre)| SampleTrack {
            title: title.to_string(),
            album: album.to_string(),
            artist: artist.to_string(),
            genre: genre.to_string(),
        })
        .collect()
}

/// (name, description)
pub const DEFAULT_PLAYLISTS: [(&str, &str); 3] = [
    ("My Favorites", "All my favorite tracks"),
    ("Workout Mix", "Energetic tracks for workouts"),
    ("Chill Vibes", "Relaxing music for downtime"),
];
