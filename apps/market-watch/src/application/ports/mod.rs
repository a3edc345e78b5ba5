//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `FavoritesStorePort`: Durable storage for the favorite set
//!
//! Producers need no port: they push `AssetSnapshot`s into the ingestor's
//! channel.

mod favorites_store_port;

#[cfg(test)]
pub use favorites_store_port::MockFavoritesStorePort;
pub use favorites_store_port::{
    FAVORITES_KEY, FavoritesStoreError, FavoritesStorePort, InMemoryFavoritesStore,
};
