//! moodtunes library
//!
//! Mood-driven track recommendations, playlists and likes on top of a hosted
//! table + auth backend. The modules are exposed for the CLI and for testing.

pub mod app;
pub mod catalog;
pub mod config;
pub mod gateway;
pub mod library;
pub mod models;
pub mod navigation;
pub mod seed;
pub mod session;
pub mod storage;
pub mod track_service;

// Re-export commonly used types for convenience
pub use app::AppContext;
pub use gateway::{Backend, MemoryGateway, RestGateway};
pub use storage::{ClientStorage, FileStorage, MemoryStorage};
