mod file_config;

pub use file_config::FileConfig;

use anyhow::{bail, Result};
use std::path::PathBuf;

pub const DEFAULT_STORAGE_DIR: &str = ".moodtunes";
pub const DEFAULT_REQUEST_TIMEOUT_SEC: u64 = 30;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    pub storage_dir: Option<PathBuf>,
    pub request_timeout_sec: u64,
    pub in_memory: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            anon_key: None,
            storage_dir: None,
            request_timeout_sec: DEFAULT_REQUEST_TIMEOUT_SEC,
            in_memory: false,
        }
    }
}

/// Where table and auth calls go.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendTarget {
    /// Process-local tables, nothing survives the run.
    InMemory,
    Remote { url: String, anon_key: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: BackendTarget,
    pub storage_dir: PathBuf,
    pub request_timeout_sec: u64,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let in_memory = file.in_memory.unwrap_or(cli.in_memory);
        let backend_url = file.backend_url.or_else(|| cli.backend_url.clone());
        let anon_key = file.anon_key.or_else(|| cli.anon_key.clone());

        let backend = if in_memory {
            BackendTarget::InMemory
        } else {
            match (backend_url, anon_key) {
                (Some(url), Some(anon_key)) => {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        bail!("backend_url must be an http(s) URL: {}", url);
                    }
                    BackendTarget::Remote {
                        url: url.trim_end_matches('/').to_string(),
                        anon_key,
                    }
                }
                (None, _) => bail!(
                    "backend_url must be specified via --backend-url or in config file (or use --in-memory)"
                ),
                (Some(_), None) => {
                    bail!("anon_key must be specified via --anon-key or in config file")
                }
            }
        };

        let storage_dir = file
            .storage_dir
            .map(PathBuf::from)
            .or_else(|| cli.storage_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));

        // Created on first use, but must not be something else
        if storage_dir.exists() && !storage_dir.is_dir() {
            bail!("storage_dir is not a directory: {:?}", storage_dir);
        }

        let request_timeout_sec = file.request_timeout_sec.unwrap_or(cli.request_timeout_sec);
        if request_timeout_sec == 0 {
            bail!("request_timeout_sec must be greater than zero");
        }

        Ok(Self {
            backend,
            storage_dir,
            request_timeout_sec,
        })
    }

    pub fn is_in_memory(&self) -> bool {
        self.backend == BackendTarget::InMemory
    }
}
