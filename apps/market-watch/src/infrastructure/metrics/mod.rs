//! Prometheus Metrics Module
//!
//! Exposes pipeline metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ingestion**: Snapshots received and rejected, batches flushed, batch sizes
//! - **Store**: Number of distinct entities
//! - **View**: Derivations, cache hits, derivation latency, row count
//! - **Favorites**: Persist failures
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! before `init_metrics` is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            #[allow(clippy::expect_used)]
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "market_watch_snapshots_received_total",
        "Total asset snapshots received from the producer"
    );
    describe_counter!(
        "market_watch_snapshots_rejected_total",
        "Total asset snapshots rejected at the ingestion boundary"
    );
    describe_counter!(
        "market_watch_batches_flushed_total",
        "Total non-empty batches merged into the entity store"
    );
    describe_histogram!(
        "market_watch_batch_size",
        "Number of snapshots merged per batch"
    );
    describe_gauge!(
        "market_watch_entities",
        "Number of distinct entities in the store"
    );

    describe_counter!(
        "market_watch_filter_settled_total",
        "Total filter terms emitted by the debouncer"
    );

    describe_counter!(
        "market_watch_view_derivations_total",
        "Total view recomputations"
    );
    describe_counter!(
        "market_watch_view_cache_hits_total",
        "Total view requests served from the memo cache"
    );
    describe_histogram!(
        "market_watch_view_derivation_seconds",
        "Time to derive the view from its inputs"
    );
    describe_gauge!("market_watch_view_rows", "Rows in the current view");

    describe_counter!(
        "market_watch_favorites_persist_failures_total",
        "Total failed favorites saves"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Reason a snapshot was rejected.
#[derive(Debug, Clone, Copy)]
pub enum RejectReason {
    /// Snapshot had no identity.
    MissingId,
    /// Snapshot could not be decoded.
    Decode,
}

impl RejectReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::MissingId => "missing_id",
            Self::Decode => "decode",
        }
    }
}

/// Record a snapshot received from the producer.
pub fn record_snapshot_received() {
    counter!("market_watch_snapshots_received_total").increment(1);
}

/// Record a snapshot rejected at the ingestion boundary.
pub fn record_snapshot_rejected(reason: RejectReason) {
    counter!(
        "market_watch_snapshots_rejected_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record a batch merged into the store.
#[allow(clippy::cast_precision_loss)]
pub fn record_batch_flushed(batch_size: usize, entities: usize) {
    counter!("market_watch_batches_flushed_total").increment(1);
    histogram!("market_watch_batch_size").record(batch_size as f64);
    gauge!("market_watch_entities").set(entities as f64);
}

/// Record a settled filter term.
pub fn record_filter_settled() {
    counter!("market_watch_filter_settled_total").increment(1);
}

/// Record a view recomputation.
#[allow(clippy::cast_precision_loss)]
pub fn record_view_derived(duration: Duration, rows: usize) {
    counter!("market_watch_view_derivations_total").increment(1);
    histogram!("market_watch_view_derivation_seconds").record(duration.as_secs_f64());
    gauge!("market_watch_view_rows").set(rows as f64);
}

/// Record a view served from cache.
pub fn record_view_cache_hit() {
    counter!("market_watch_view_cache_hits_total").increment(1);
}

/// Record a failed favorites save.
pub fn record_favorites_persist_failure() {
    counter!("market_watch_favorites_persist_failures_total").increment(1);
}

// =============================================================================
// Tests
// =============================================================================
