//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the timer-driven services that feed the view pipeline
//! and the port interfaces they use to reach external systems.

/// Port interfaces for external systems (persistent favorites storage).
pub mod ports;

/// Ingestion, debounce, favorites and board runtime services.
pub mod services;
