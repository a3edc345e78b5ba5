//! Favorite Set
//!
//! The set of pinned asset ids and its persisted representation.
//!
//! # Serialized Form
//!
//! A sparse JSON object mapping the decimal id to `true`; absent keys mean
//! "not a favorite":
//!
//! ```json
//! {"1": true, "42": true}
//! ```

use std::collections::{BTreeMap, BTreeSet};

use super::entity::EntityId;

/// Pinned asset ids.
///
/// `revision` is bumped on every mutation so derived views can detect change
/// without comparing the sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoriteSet {
    ids: BTreeSet<EntityId>,
    revision: u64,
}

impl FavoriteSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`. Returns `true` if `id` is now a favorite.
    pub fn toggle(&mut self, id: EntityId) -> bool {
        let now_favorite = if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        };
        self.revision += 1;
        now_favorite
    }

    /// Whether `id` is pinned.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of pinned ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is pinned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Pinned ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ids.iter().copied()
    }

    /// Number of mutations applied since creation.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Encode to the persisted form.
    #[must_use]
    pub fn to_serialized(&self) -> String {
        let map: BTreeMap<String, bool> =
            self.ids.iter().map(|id| (id.to_string(), true)).collect();
        // A map of string keys to booleans always serializes.
        serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
    }

    /// Decode the persisted form.
    ///
    /// Keys mapped to `false` are not members. Keys that are not valid ids are
    /// skipped; their count is returned alongside the set.
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not a JSON object of booleans.
    pub fn from_serialized(raw: &str) -> Result<(Self, usize), serde_json::Error> {
        let map: BTreeMap<String, bool> = serde_json::from_str(raw)?;

        let mut skipped = 0;
        let mut ids = BTreeSet::new();
        for (key, pinned) in map {
            match key.parse::<EntityId>() {
                Ok(id) if pinned => {
                    ids.insert(id);
                }
                Ok(_) => {}
                Err(_) => skipped += 1,
            }
        }

        Ok((Self { ids, revision: 0 }, skipped))
    }
}

impl FromIterator<EntityId> for FavoriteSet {
    fn from_iter<I: IntoIterator<Item = EntityId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
            revision: 0,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn id(value: u64) -> EntityId {
        EntityId::new(value)
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut set = FavoriteSet::new();

        assert!(set.toggle(id(3)));
        assert!(set.contains(id(3)));

        assert!(!set.toggle(id(3)));
        assert!(!set.contains(id(3)));
        assert!(set.is_empty());
        assert_eq!(set.revision(), 2);
    }

    #[test]
    fn serialized_form_is_sparse_map_of_true() {
        let set: FavoriteSet = [id(42), id(1)].into_iter().collect();
        assert_eq!(set.to_serialized(), r#"{"1":true,"42":true}"#);
    }

    #[test]
    fn empty_set_serializes_to_empty_object() {
        assert_eq!(FavoriteSet::new().to_serialized(), "{}");
    }

    #[test]
    fn decode_ignores_false_entries() {
        let (set, skipped) = FavoriteSet::from_serialized(r#"{"1":true,"2":false}"#).unwrap();
        assert!(set.contains(id(1)));
        assert!(!set.contains(id(2)));
        assert_eq!(set.len(), 1);
        assert_eq!(skipped, 0);
    }

    #[test]
    fn decode_skips_invalid_keys() {
        let (set, skipped) = FavoriteSet::from_serialized(r#"{"abc":true,"5":true}"#).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![id(5)]);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn decode_rejects_non_object() {
        assert!(FavoriteSet::from_serialized("[1,2]").is_err());
        assert!(FavoriteSet::from_serialized("not json").is_err());
        assert!(FavoriteSet::from_serialized(r#"{"1":"yes"}"#).is_err());
    }

    proptest! {
        #[test]
        fn round_trip_after_any_toggles(toggles in prop::collection::vec(0u64..20, 0..50)) {
            let mut set = FavoriteSet::new();
            for value in toggles {
                set.toggle(id(value));
            }

            let (decoded, skipped) = FavoriteSet::from_serialized(&set.to_serialized()).unwrap();
            prop_assert_eq!(skipped, 0);
            prop_assert_eq!(
                decoded.iter().collect::<Vec<_>>(),
                set.iter().collect::<Vec<_>>()
            );
        }
    }
}
