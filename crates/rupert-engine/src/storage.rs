//! Small persistent key-value store for session state and the API key.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

pub const SESSION_STATE_KEY: &str = "session_state";
pub const API_KEY_KEY: &str = "gemini_api_key";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage document is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Values for the requested keys; absent keys are simply missing.
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StorageError>;
    async fn set(&self, items: Map<String, Value>) -> Result<(), StorageError>;
    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    items: Arc<Mutex<Map<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StorageError> {
        let items = self.items.lock().await;
        Ok(pick(&items, keys))
    }

    async fn set(&self, new_items: Map<String, Value>) -> Result<(), StorageError> {
        self.items.lock().await.extend(new_items);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut items = self.items.lock().await;
        for key in keys {
            items.remove(*key);
        }
        Ok(())
    }
}

/// One JSON document on disk. Writes go through a temp file and a rename so
/// a crash never leaves a half-written document.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `~/.rupert/state.json`, or `./.rupert-state.json` without a home dir.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".rupert").join("state.json"))
            .unwrap_or_else(|| PathBuf::from(".rupert-state.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Map::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, items: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(items)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StorageError> {
        let _guard = self.lock.lock().await;
        let items = self.load().await?;
        Ok(pick(&items, keys))
    }

    async fn set(&self, new_items: Map<String, Value>) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        items.extend(new_items);
        self.save(&items).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        for key in keys {
            items.remove(*key);
        }
        self.save(&items).await
    }
}

fn pick(items: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|k| items.get(*k).map(|v| (k.to_string(), v.clone())))
        .collect()
}
