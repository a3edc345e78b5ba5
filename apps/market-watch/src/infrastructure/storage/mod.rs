//! File-Backed Key-Value Storage
//!
//! A small string key-value document on disk, used to persist the favorite
//! set under `FAVORITES_KEY`. Other keys in the document are preserved.
//!
//! Writes go to a sibling temp file which is then renamed over the target, so
//! a crash mid-write leaves the previous document intact.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::application::ports::{FAVORITES_KEY, FavoritesStoreError, FavoritesStorePort};

type Document = BTreeMap<String, String>;

/// Favorites store persisted to a JSON document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    key: String,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Store favorites at `path` under the default key.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_key(path, FAVORITES_KEY)
    }

    /// Store favorites at `path` under `key`.
    #[must_use]
    pub fn with_key(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Document location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    async fn read_document(&self) -> Result<Option<Document>, FavoritesStoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FavoritesStoreError::Io {
                    message: format!("{}: {e}", self.path.display()),
                });
            }
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| FavoritesStoreError::Corrupt {
                message: format!("{}: {e}", self.path.display()),
            })
    }

    async fn write_document(&self, document: &Document) -> Result<(), FavoritesStoreError> {
        let io_err = |e: std::io::Error| FavoritesStoreError::Io {
            message: format!("{}: {e}", self.path.display()),
        };

        let body = serde_json::to_vec_pretty(document).map_err(|e| FavoritesStoreError::Io {
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, body).await.map_err(io_err)?;
        tokio::fs::rename(&temp, &self.path).await.map_err(io_err)
    }
}

#[async_trait]
impl FavoritesStorePort for JsonFileStore {
    async fn load(&self) -> Result<Option<String>, FavoritesStoreError> {
        Ok(self
            .read_document()
            .await?
            .and_then(|mut document| document.remove(&self.key)))
    }

    async fn save(&self, serialized: &str) -> Result<(), FavoritesStoreError> {
        let _guard = self.write_lock.lock().await;

        let mut document = match self.read_document().await {
            Ok(document) => document.unwrap_or_default(),
            Err(FavoritesStoreError::Corrupt { message }) => {
                tracing::warn!(%message, "Replacing corrupt favorites document");
                Document::new()
            }
            Err(e) => return Err(e),
        };

        document.insert(self.key.clone(), serialized.to_string());
        self.write_document(&document).await?;
        tracing::debug!(path = %self.path.display(), "Favorites saved");
        Ok(())
    }
}
