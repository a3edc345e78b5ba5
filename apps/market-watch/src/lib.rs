#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::cast_possible_truncation
    )
)]

//! Market Watch - Live Asset Board
//!
//! Keeps a board of assets current from a high-rate stream of price
//! snapshots and derives the rows a table renderer shows: filtered by free
//! text, sorted by a clicked column, with favorites pinned on top.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and functions
//!   - `entity`: Assets, snapshots and the entity store
//!   - `favorites`: The pinned id set and its stored form
//!   - `view`: Filter, sort and the derivation pipeline
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Favorites persistence interface
//!   - `services`: Batching ingestor, filter debouncer, favorites manager,
//!     board runtime
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feed`: Simulated and JSON lines producers
//!   - `storage`: File-backed favorites store
//!   - `console`: Terminal renderer and command reader
//!   - `config`, `telemetry`, `metrics`, `health`
//!
//! # Data Flow
//!
//! ```text
//! producer ──► BatchingIngestor ──(every 100ms, if non-empty)──┐
//!                                                              ▼
//! keystrokes ──► FilterDebouncer ──(300ms quiet)──────────► BoardRuntime ──► ViewFrame ──► renderer
//!                                                              ▲      │
//! header / favorite clicks ────────────────────────────────────┘      └──► FavoritesStorePort
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core board types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::entity::{AssetSnapshot, Entity, EntityId, EntityStore, SnapshotError};
pub use domain::favorites::FavoriteSet;
pub use domain::view::{
    FilterTerm, SortDirection, SortField, SortSpec, ViewCache, ViewInputs, derive_view,
};

// Ports
pub use application::ports::{
    FAVORITES_KEY, FavoritesStoreError, FavoritesStorePort, InMemoryFavoritesStore,
};

// Services
pub use application::services::{
    Board, BoardError, BoardHandle, BoardNotice, BoardOptions, BoardStats, FavoritesManager,
    ViewFrame,
};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, FeedSettings, MarketWatchConfig, PipelineSettings, RenderSettings,
    ServerSettings,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
