//! View Derivation
//!
//! Pure derivation of the displayed rows from the four independent inputs:
//! entity store, settled filter term, sort spec and favorite set.
//!
//! # Stages
//!
//! ```text
//! store ──► filter (term non-empty) ──► sort (field set) ──► pin (favorites non-empty) ──► rows
//! ```
//!
//! Sorting is stable: entities with equal keys keep the order of the
//! previous stage. Pinning is a stable partition, not a secondary sort key.

mod sort;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use sort::{SortDirection, SortField, SortSpec, UnknownSortField};

use super::entity::{Entity, EntityStore};
use super::favorites::FavoriteSet;

// =============================================================================
// Filter Term
// =============================================================================

/// Settled, lower-cased filter text. Empty means no filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterTerm(String);

impl FilterTerm {
    /// Settle raw input into a term (lower-cased, otherwise verbatim).
    #[must_use]
    pub fn settle(raw: &str) -> Self {
        Self(raw.to_lowercase())
    }

    /// The term text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the term disables filtering.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Substring match against the entity's structural text.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        entity.search_text().contains(&self.0)
    }
}

impl fmt::Display for FilterTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Derivation
// =============================================================================

/// Borrowed inputs of one derivation.
#[derive(Debug, Clone, Copy)]
pub struct ViewInputs<'a> {
    /// Current entity store.
    pub store: &'a EntityStore,
    /// Settled filter term.
    pub filter: &'a FilterTerm,
    /// Current sort.
    pub sort: SortSpec,
    /// Pinned ids.
    pub favorites: &'a FavoriteSet,
}

/// Derive the ordered rows for display.
#[must_use]
pub fn derive_view(inputs: &ViewInputs<'_>) -> Vec<Entity> {
    let mut rows: Vec<&Entity> = if inputs.filter.is_empty() {
        inputs.store.iter().collect()
    } else {
        inputs
            .store
            .iter()
            .filter(|entity| inputs.filter.matches(entity))
            .collect()
    };

    if inputs.sort.field.is_some() {
        rows.sort_by(|a, b| inputs.sort.compare(a, b));
    }

    if !inputs.favorites.is_empty() {
        let (mut pinned, rest): (Vec<&Entity>, Vec<&Entity>) = rows
            .into_iter()
            .partition(|entity| inputs.favorites.contains(entity.id));
        pinned.extend(rest);
        rows = pinned;
    }

    rows.into_iter().cloned().collect()
}

// =============================================================================
// Memoization
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct ViewKey {
    store_revision: u64,
    filter: FilterTerm,
    sort: SortSpec,
    favorites_revision: u64,
}

impl ViewKey {
    fn of(inputs: &ViewInputs<'_>) -> Self {
        Self {
            store_revision: inputs.store.revision(),
            filter: inputs.filter.clone(),
            sort: inputs.sort,
            favorites_revision: inputs.favorites.revision(),
        }
    }
}

/// Whether a cached derivation was reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Inputs unchanged; previous rows returned.
    Hit,
    /// Rows recomputed.
    Miss,
}

/// Remembers the rows of the last derivation and its inputs.
#[derive(Debug, Default)]
pub struct ViewCache {
    key: Option<ViewKey>,
    rows: Arc<[Entity]>,
}

impl ViewCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return rows for `inputs`, recomputing only if they differ from the
    /// previous call.
    pub fn derive(&mut self, inputs: &ViewInputs<'_>) -> (Arc<[Entity]>, CacheOutcome) {
        let key = ViewKey::of(inputs);
        if self.key.as_ref() == Some(&key) {
            return (Arc::clone(&self.rows), CacheOutcome::Hit);
        }

        self.rows = derive_view(inputs).into();
        self.key = Some(key);
        (Arc::clone(&self.rows), CacheOutcome::Miss)
    }
}

// =============================================================================
// Tests
// =============================================================================
