//! Domain Layer - Core board types and the view derivation pipeline.
//!
//! This layer contains the pure types and functions of the board with no
//! I/O: assets and their store, the favorite set, and view derivation.

/// Asset entities, producer snapshots and the entity store.
pub mod entity;

/// Pinned favorites and their persisted form.
pub mod favorites;

/// Filter, sort and pinning stages of the displayed view.
pub mod view;
