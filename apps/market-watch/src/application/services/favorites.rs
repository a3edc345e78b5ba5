//! Favorites Manager
//!
//! Owns the favorite set and keeps the persistent store in step with it.

use std::sync::Arc;

use crate::application::ports::{FavoritesStoreError, FavoritesStorePort};
use crate::domain::entity::EntityId;
use crate::domain::favorites::FavoriteSet;
use crate::infrastructure::metrics;

/// Result of a favorite toggle.
///
/// The in-memory toggle always applies; `persisted` reports whether the new
/// set also reached the store.
#[derive(Debug, Clone)]
pub struct ToggleOutcome {
    /// Toggled id.
    pub id: EntityId,
    /// Membership after the toggle.
    pub is_favorite: bool,
    /// Outcome of the save.
    pub persisted: Result<(), FavoritesStoreError>,
}

/// Maintains pinned ids and writes every change through to storage.
pub struct FavoritesManager {
    favorites: FavoriteSet,
    store: Arc<dyn FavoritesStorePort>,
}

impl FavoritesManager {
    /// Load the persisted favorite set.
    ///
    /// A missing, unreadable or undecodable value yields the empty set.
    pub async fn load(store: Arc<dyn FavoritesStorePort>) -> Self {
        let favorites = match store.load().await {
            Ok(Some(raw)) => match FavoriteSet::from_serialized(&raw) {
                Ok((favorites, skipped)) => {
                    if skipped > 0 {
                        tracing::warn!(skipped, "Ignored invalid ids in stored favorites");
                    }
                    favorites
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stored favorites are unparsable, starting empty");
                    FavoriteSet::new()
                }
            },
            Ok(None) => FavoriteSet::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load favorites, starting empty");
                FavoriteSet::new()
            }
        };

        tracing::info!(count = favorites.len(), "Favorites loaded");
        Self { favorites, store }
    }

    /// Current favorite set.
    #[must_use]
    pub const fn favorites(&self) -> &FavoriteSet {
        &self.favorites
    }

    /// Flip membership of `id` and save the whole set.
    pub async fn toggle(&mut self, id: EntityId) -> ToggleOutcome {
        let is_favorite = self.favorites.toggle(id);
        let persisted = self.store.save(&self.favorites.to_serialized()).await;

        if let Err(e) = &persisted {
            metrics::record_favorites_persist_failure();
            tracing::warn!(%id, is_favorite, error = %e, "Failed to persist favorites");
        } else {
            tracing::debug!(%id, is_favorite, "Favorite toggled");
        }

        ToggleOutcome {
            id,
            is_favorite,
            persisted,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
