//! Asset Entity Types
//!
//! Domain types for the assets shown on the board and the store that holds
//! the latest known snapshot of each one.
//!
//! # Design
//!
//! - `AssetSnapshot` is what a producer emits. Its identity is optional
//!   because producers are not trusted to always send one.
//! - `Entity` is a snapshot whose identity has been validated. Only entities
//!   ever reach the `EntityStore`.
//! - `EntityStore` replaces whole entities by identity (no field-level merge)
//!   and never deletes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Identity
// =============================================================================

/// Identity of an asset on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Create an identity from its numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// A raw snapshot as delivered by a producer.
///
/// # Wire Format (JSON)
/// ```json
/// {"id": 1, "assetName": "Gold", "price": 1912.5, "type": "metal"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    /// Asset identity. Snapshots without one are rejected at ingestion.
    #[serde(default)]
    pub id: Option<EntityId>,

    /// Display name of the asset.
    #[serde(rename = "assetName")]
    pub asset_name: String,

    /// Last price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,

    /// Asset class label (e.g. "metal", "currency").
    #[serde(rename = "type")]
    pub asset_type: String,
}

/// Reasons a snapshot is refused at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// The snapshot carried no identity.
    #[error("snapshot for '{asset_name}' has no id")]
    MissingId {
        /// Name carried by the rejected snapshot, for diagnostics.
        asset_name: String,
    },
}

// =============================================================================
// Entity
// =============================================================================

/// An asset with a validated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Asset identity, immutable once created.
    pub id: EntityId,
    /// Display name of the asset.
    #[serde(rename = "assetName")]
    pub asset_name: String,
    /// Last price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Asset class label.
    #[serde(rename = "type")]
    pub asset_type: String,
}

impl Entity {
    /// Create a new entity.
    #[must_use]
    pub fn new(
        id: impl Into<EntityId>,
        asset_name: impl Into<String>,
        price: Decimal,
        asset_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            asset_name: asset_name.into(),
            price,
            asset_type: asset_type.into(),
        }
    }

    /// Full structural text of the entity: a compact JSON object with fields
    /// in declaration order, lower-cased. This is what text filters match.
    #[must_use]
    pub fn search_text(&self) -> String {
        // serde_json only fails on non-string map keys, which a &str never is.
        let name = serde_json::to_string(&self.asset_name).unwrap_or_default();
        let kind = serde_json::to_string(&self.asset_type).unwrap_or_default();
        format!(
            "{{\"id\":{},\"assetName\":{},\"price\":{},\"type\":{}}}",
            self.id,
            name,
            self.price.normalize(),
            kind
        )
        .to_lowercase()
    }
}

impl TryFrom<AssetSnapshot> for Entity {
    type Error = SnapshotError;

    fn try_from(snapshot: AssetSnapshot) -> Result<Self, Self::Error> {
        let Some(id) = snapshot.id else {
            return Err(SnapshotError::MissingId {
                asset_name: snapshot.asset_name,
            });
        };

        Ok(Self {
            id,
            asset_name: snapshot.asset_name,
            price: snapshot.price,
            asset_type: snapshot.asset_type,
        })
    }
}

// =============================================================================
// Entity Store
// =============================================================================

/// Latest known snapshot per identity.
///
/// Iteration is in ascending id order. Every applied batch bumps `revision`
/// so derived views can tell whether the store changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityStore {
    entities: BTreeMap<EntityId, Entity>,
    revision: u64,
}

impl EntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch in arrival order; later snapshots of the same id win.
    ///
    /// Returns the number of entities in the batch. An empty batch leaves the
    /// store, including its revision, untouched.
    pub fn apply_batch(&mut self, batch: impl IntoIterator<Item = Entity>) -> usize {
        let mut applied = 0;
        for entity in batch {
            self.entities.insert(entity.id, entity);
            applied += 1;
        }

        if applied > 0 {
            self.revision += 1;
        }
        applied
    }

    /// Look up an entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Iterate entities in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of distinct entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of batches applied so far.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }
}

// =============================================================================
// Tests
// =============================================================================
