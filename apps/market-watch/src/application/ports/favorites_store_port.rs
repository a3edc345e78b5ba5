//! Favorites Store Port (Driven Port)
//!
//! Interface for persisting the serialized favorite set under a single,
//! well-known key.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

/// Well-known key the favorite set is stored under.
pub const FAVORITES_KEY: &str = "favorites";

/// Favorites store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FavoritesStoreError {
    /// The backing medium could not be read or written.
    #[error("favorites store I/O error: {message}")]
    Io {
        /// Error details.
        message: String,
    },

    /// Stored data exists but cannot be decoded.
    #[error("favorites store is corrupt: {message}")]
    Corrupt {
        /// Error details.
        message: String,
    },

    /// Store refused the write.
    #[error("favorites store unavailable")]
    Unavailable,
}

/// Port for loading and saving the serialized favorite set.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FavoritesStorePort: Send + Sync {
    /// Load the stored value, `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<String>, FavoritesStoreError>;

    /// Replace the stored value.
    async fn save(&self, serialized: &str) -> Result<(), FavoritesStoreError>;
}

/// In-memory favorites store for testing and ephemeral runs.
#[derive(Debug, Default)]
pub struct InMemoryFavoritesStore {
    value: RwLock<Option<String>>,
    fail_writes: AtomicBool,
    saves: AtomicU64,
}

impl InMemoryFavoritesStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `serialized`.
    #[must_use]
    pub fn with_value(serialized: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(Some(serialized.into())),
            ..Self::default()
        }
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Current stored value.
    #[must_use]
    pub fn value(&self) -> Option<String> {
        self.value.read().clone()
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FavoritesStorePort for InMemoryFavoritesStore {
    async fn load(&self) -> Result<Option<String>, FavoritesStoreError> {
        Ok(self.value.read().clone())
    }

    async fn save(&self, serialized: &str) -> Result<(), FavoritesStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FavoritesStoreError::Unavailable);
        }

        *self.value.write() = Some(serialized.to_string());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_store_loads_none() {
        let store = InMemoryFavoritesStore::new();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load() {
        let store = InMemoryFavoritesStore::new();
        store.save(r#"{"1":true}"#).await.unwrap();

        assert_eq!(store.load().await.unwrap().as_deref(), Some(r#"{"1":true}"#));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn failing_writes_keep_previous_value() {
        let store = InMemoryFavoritesStore::with_value("{}");
        store.set_fail_writes(true);

        let err = store.save(r#"{"1":true}"#).await.unwrap_err();
        assert!(matches!(err, FavoritesStoreError::Unavailable));
        assert_eq!(store.value().as_deref(), Some("{}"));
        assert_eq!(store.save_count(), 0);
    }
}
