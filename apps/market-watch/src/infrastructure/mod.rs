//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the process-level concerns of the
//! binary.

/// Configuration loading.
pub mod config;

/// Terminal renderer and command reader.
pub mod console;

/// Snapshot producers (simulated, JSON lines).
pub mod feed;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// File-backed favorites storage.
pub mod storage;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
