use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use moodtunes::config::{AppConfig, BackendTarget, CliConfig, FileConfig};
use moodtunes::gateway::{Backend, MemoryGateway, RestGateway};
use moodtunes::library::PlaylistAddition;
use moodtunes::models::{NewFlatTrack, PendingProfile, RowId, Track};
use moodtunes::seed::Seeder;
use moodtunes::storage::{ClientStorage, FileStorage, MemoryStorage};
use moodtunes::track_service::TrackService;
use moodtunes::AppContext;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
#[command(name = "moodtunes", about = "Mood based music recommendations")]
struct CliArgs {
    /// Path to a TOML config file. Its values override the flags below.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Base URL of the hosted backend project.
    #[clap(long)]
    pub backend_url: Option<String>,

    /// Public (anon) API key of the backend project.
    #[clap(long)]
    pub anon_key: Option<String>,

    /// Directory holding client side state such as the auth session.
    #[clap(long, value_parser = parse_path)]
    pub storage_dir: Option<PathBuf>,

    /// Use a process-local backend preloaded with the sample catalog.
    #[clap(long)]
    pub in_memory: bool,

    /// Timeout in seconds for backend requests.
    #[clap(long, default_value_t = 30)]
    pub timeout_sec: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seeds moods and sample tracks, plus default playlists when signed in.
    Seed,

    /// Lists the available moods.
    Moods,

    /// Shows the tracks recommended for a mood.
    Recommend {
        #[clap(long)]
        mood: String,
    },

    /// Signs in with email and password.
    Login { email: String, password: String },

    /// Creates an account. The name is applied to the profile on first login.
    Register {
        email: String,
        password: String,
        #[clap(long)]
        first_name: Option<String>,
        #[clap(long)]
        last_name: Option<String>,
    },

    /// Signs out.
    Logout,

    /// Shows the profile, playlists and liked tracks.
    Library,

    /// Likes a track and files it into the playlist matching its mood.
    Like { track: String },

    /// Removes a like.
    Unlike { track: String },

    /// Adds a track to a playlist, given by id or name.
    PlaylistAdd { playlist: String, track: String },

    /// Loads a JSON object of mood name to tracks into the flat tracks table.
    LegacyInit {
        #[clap(value_parser = parse_path)]
        json: PathBuf,
    },

    /// Lists rows of the flat tracks table.
    LegacyTracks {
        #[clap(long)]
        mood: Option<String>,
    },
}

fn build_backend(config: &AppConfig) -> Result<(Arc<dyn Backend>, Arc<dyn ClientStorage>)> {
    match &config.backend {
        BackendTarget::InMemory => {
            info!("Using in-memory backend");
            let backend: Arc<dyn Backend> = Arc::new(MemoryGateway::with_schema());
            let storage: Arc<dyn ClientStorage> = Arc::new(MemoryStorage::new());
            Ok((backend, storage))
        }
        BackendTarget::Remote { url, anon_key } => {
            let storage: Arc<dyn ClientStorage> = Arc::new(FileStorage::open(&config.storage_dir)?);
            let gateway = RestGateway::new(url, anon_key, config.request_timeout_sec)
                .with_context(|| format!("Failed to create backend client for {}", url))?
                .with_storage(storage.clone());
            info!("Using backend at {}", url);
            let backend: Arc<dyn Backend> = Arc::new(gateway);
            Ok((backend, storage))
        }
    }
}

fn format_track(track: &Track) -> String {
    format!(
        "[{}] {} - {} ({})",
        track.id,
        track.title,
        track.artist.as_deref().unwrap_or("Unknown artist"),
        track.album.as_deref().unwrap_or("Unknown album")
    )
}

async fn run(command: Command, app: &mut AppContext) -> Result<()> {
    match command {
        Command::Seed => {
            let seeder = Seeder::new(app.backend());
            let summary = seeder.seed_all_data().await?;
            println!("{}", serde_json::to_string_pretty(&summary.tracks)?);
            if let Some(user) = app.session().session_user() {
                let playlists = seeder.seed_playlists(&user.id).await;
                println!("{} playlists for {}", playlists.len(), user.id);
            }
        }
        Command::Moods => {
            for mood in app.catalog().moods() {
                println!(
                    "[{}] {}: {}",
                    mood.id,
                    mood.name,
                    mood.description.as_deref().unwrap_or("")
                );
            }
        }
        Command::Recommend { mood } => {
            let Some(mood_id) = app.catalog().mood_by_name(&mood).map(|m| m.id.clone()) else {
                bail!("Unknown mood: {}", mood);
            };
            let tracks = app.catalog_mut().get_recommended_tracks(&mood_id).await;
            if let Some(error) = app.catalog().last_error() {
                warn!("Recommendations are degraded: {}", error);
            }
            for track in &tracks {
                println!("{}", format_track(track));
            }
        }
        Command::Login { email, password } => {
            app.login(&email, &password).await?;
            if let Some(profile) = app.library().profile() {
                println!(
                    "Signed in as {} {}",
                    profile.first_name.as_deref().unwrap_or(""),
                    profile.last_name.as_deref().unwrap_or("")
                );
            }
        }
        Command::Register {
            email,
            password,
            first_name,
            last_name,
        } => {
            let pending = (first_name.is_some() || last_name.is_some()).then(|| PendingProfile {
                first_name,
                last_name,
            });
            let user = app.session().register(&email, &password, pending).await?;
            println!("Registered {}, confirm the account and log in", user.id);
        }
        Command::Logout => {
            app.logout().await?;
            println!("Signed out");
        }
        Command::Library => {
            if !app.session().is_authenticated() {
                bail!("Not signed in");
            }
            let library = app.library();
            if let Some(profile) = library.profile() {
                println!(
                    "{} {} <{}>",
                    profile.first_name.as_deref().unwrap_or(""),
                    profile.last_name.as_deref().unwrap_or(""),
                    profile.email.as_deref().unwrap_or("")
                );
            }
            for playlist in library.playlists() {
                println!("Playlist [{}] {}", playlist.id, playlist.name);
                for track in &playlist.tracks {
                    println!("  {}", format_track(track));
                }
            }
            println!("Liked tracks:");
            for track in library.liked_tracks() {
                println!("  {}", format_track(track));
            }
        }
        Command::Like { track } => {
            let outcome = app.library_mut().like_track(&RowId::from(track.as_str())).await?;
            match outcome.playlist {
                Some(playlist) => println!(
                    "Liked {} and added it to playlist {}",
                    outcome.track.title, playlist
                ),
                None => println!("Liked {}", outcome.track.title),
            }
        }
        Command::Unlike { track } => {
            app.library_mut()
                .unlike_track(&RowId::from(track.as_str()))
                .await?;
            println!("Removed like for {}", track);
        }
        Command::PlaylistAdd { playlist, track } => {
            let playlist_id = match app.library().playlist_by_name(&playlist) {
                Some(p) => p.id.clone(),
                None => RowId::from(playlist.as_str()),
            };
            let addition = app
                .library_mut()
                .add_track_to_playlist(&playlist_id, &RowId::from(track.as_str()))
                .await?;
            match addition {
                PlaylistAddition::Added => println!("Added {} to {}", track, playlist),
                PlaylistAddition::AlreadyPresent => {
                    println!("{} is already in {}", track, playlist)
                }
            }
        }
        Command::LegacyInit { json } => {
            let content = std::fs::read_to_string(&json)
                .with_context(|| format!("Failed to read {:?}", json))?;
            let tracks: BTreeMap<String, Vec<NewFlatTrack>> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {:?}", json))?;
            let inserted = TrackService::new(app.backend())
                .initialize_database(&tracks)
                .await?;
            println!("Inserted {} tracks", inserted);
        }
        Command::LegacyTracks { mood } => {
            let service = TrackService::new(app.backend());
            let tracks = match mood {
                Some(mood) => service.get_tracks_by_mood(&mood).await?,
                None => service.get_all_tracks().await?,
            };
            for track in tracks {
                println!(
                    "[{}] {} - {} ({})",
                    track.id,
                    track.title,
                    track.artist.as_deref().unwrap_or("Unknown artist"),
                    track.mood.as_deref().unwrap_or("no mood")
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        backend_url: cli_args.backend_url.clone(),
        anon_key: cli_args.anon_key.clone(),
        storage_dir: cli_args.storage_dir.clone(),
        request_timeout_sec: cli_args.timeout_sec,
        in_memory: cli_args.in_memory,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let (backend, storage) = build_backend(&config)?;
    if config.is_in_memory() {
        Seeder::new(backend.clone()).seed_all_data().await?;
    }

    let mut app = AppContext::new(backend, storage);
    app.initialize().await;
    let result = run(cli_args.command, &mut app).await;
    app.teardown();
    result
}
