//! Short-lived client-side key/value storage.
//!
//! Holds the handful of values that must survive between screens or process
//! runs: the profile name pair staged at registration, the last-known
//! authentication flag and the persisted auth session.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Name pair staged at registration and consumed by the first profile fetch.
pub const PENDING_PROFILE_KEY: &str = "pendingUserProfile";
/// Last-known authentication state, `"true"` or `"false"`.
pub const AUTHENTICATED_FLAG_KEY: &str = "isAuthenticated";

const STORAGE_FILE_NAME: &str = "client-storage.json";

pub trait ClientStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Reads and decodes a JSON value. Undecodable values are dropped.
pub fn read_json<T: DeserializeOwned>(storage: &dyn ClientStorage, key: &str) -> Result<Option<T>> {
    let Some(raw) = storage.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Discarding malformed value under {}: {}", key, e);
            storage.remove(key)?;
            Ok(None)
        }
    }
}

pub fn write_json<T: Serialize>(storage: &dyn ClientStorage, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value).with_context(|| format!("Failed to encode {}", key))?;
    storage.set(key, &raw)
}

/// Reads a value and removes it in the same step.
pub fn take_json<T: DeserializeOwned>(storage: &dyn ClientStorage, key: &str) -> Result<Option<T>> {
    let value = read_json(storage, key)?;
    storage.remove(key)?;
    Ok(value)
}

#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ClientStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// Storage backed by a single JSON object file inside a directory.
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Opens storage in `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create storage dir {:?}", dir))?;
        Ok(Self {
            path: dir.join(STORAGE_FILE_NAME),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read storage file {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse storage file {:?}", self.path))
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write storage file {:?}", self.path))
    }

    fn modify(&self, f: impl FnOnce(&mut HashMap<String, String>)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut values = self.load()?;
        f(&mut values);
        self.save(&values)
    }
}

impl ClientStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.modify(|values| {
            values.remove(key);
        })
    }
}
