//! Batching Ingestor
//!
//! Accumulates producer snapshots over back-to-back fixed windows and merges
//! each non-empty window into the entity store in one step.
//!
//! # Window Semantics
//!
//! ```text
//! t=0        t=100       t=200       t=300
//! |--window--|--window--|--window--|
//!   a  b  a'    (none)     c
//!            flush{a',b}            flush{c}
//! ```
//!
//! An empty window emits nothing. Snapshots without an id are dropped and
//! counted, never merged.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::domain::entity::{AssetSnapshot, Entity, EntityStore, SnapshotError};
use crate::infrastructure::metrics::{self, RejectReason};

/// Default batching window.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(100);

/// Configuration for the batching ingestor.
#[derive(Debug, Clone, Copy)]
pub struct IngestorConfig {
    /// Length of each batching window.
    pub window: Duration,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_BATCH_WINDOW,
        }
    }
}

/// Notification that a batch was merged into the store.
#[derive(Debug, Clone)]
pub struct StoreUpdate {
    /// Store contents after the merge.
    pub store: Arc<EntityStore>,
    /// Snapshots merged in this batch.
    pub batch_size: usize,
    /// Snapshots rejected since the ingestor started.
    pub rejected_total: u64,
    /// Wall-clock time of the flush.
    pub flushed_at: DateTime<Utc>,
}

// =============================================================================
// Accumulator
// =============================================================================

/// Snapshots collected during the current window.
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    pending: Vec<Entity>,
    rejected_total: u64,
}

impl BatchAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a snapshot to the current window.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason if the snapshot has no identity.
    pub fn push(&mut self, snapshot: AssetSnapshot) -> Result<(), SnapshotError> {
        match Entity::try_from(snapshot) {
            Ok(entity) => {
                self.pending.push(entity);
                Ok(())
            }
            Err(err) => {
                self.rejected_total += 1;
                Err(err)
            }
        }
    }

    /// Close the window, returning its entities in arrival order if any
    /// arrived.
    pub fn take(&mut self) -> Option<Vec<Entity>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    /// Whether the current window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Snapshots rejected so far.
    #[must_use]
    pub const fn rejected_total(&self) -> u64 {
        self.rejected_total
    }
}

// =============================================================================
// Ingestor Task
// =============================================================================

/// Owns the entity store and merges producer snapshots into it.
pub struct BatchingIngestor {
    config: IngestorConfig,
    snapshots: mpsc::Receiver<AssetSnapshot>,
    updates: mpsc::Sender<StoreUpdate>,
    cancel: CancellationToken,
    store: Arc<EntityStore>,
    accumulator: BatchAccumulator,
}

impl BatchingIngestor {
    /// Create a new ingestor with an empty store.
    #[must_use]
    pub fn new(
        config: IngestorConfig,
        snapshots: mpsc::Receiver<AssetSnapshot>,
        updates: mpsc::Sender<StoreUpdate>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            snapshots,
            updates,
            cancel,
            store: Arc::new(EntityStore::new()),
            accumulator: BatchAccumulator::new(),
        }
    }

    /// Run until cancelled, or until the producer has closed and the last
    /// window has been flushed.
    ///
    /// Returns the final store.
    pub async fn run(mut self) -> Arc<EntityStore> {
        let window = self.config.window;
        let mut ticker = tokio::time::interval_at(Instant::now() + window, window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut producer_open = true;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::debug!("Ingestor cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if self.flush().await.is_err() {
                        tracing::debug!("Store update channel closed, stopping ingestor");
                        break;
                    }
                    if !producer_open {
                        tracing::info!("Producer closed, ingestor drained");
                        break;
                    }
                }
                maybe_snapshot = self.snapshots.recv(), if producer_open => {
                    match maybe_snapshot {
                        Some(snapshot) => self.accept(snapshot),
                        None => producer_open = false,
                    }
                }
            }
        }

        self.store
    }

    fn accept(&mut self, snapshot: AssetSnapshot) {
        metrics::record_snapshot_received();
        if let Err(err) = self.accumulator.push(snapshot) {
            metrics::record_snapshot_rejected(RejectReason::MissingId);
            tracing::warn!(error = %err, "Dropping snapshot");
        }
    }

    /// Merge the current window into the store and notify, if non-empty.
    async fn flush(&mut self) -> Result<(), mpsc::error::SendError<StoreUpdate>> {
        let Some(batch) = self.accumulator.take() else {
            return Ok(());
        };

        let batch_size = Arc::make_mut(&mut self.store).apply_batch(batch);
        metrics::record_batch_flushed(batch_size, self.store.len());
        tracing::debug!(
            batch_size,
            entities = self.store.len(),
            revision = self.store.revision(),
            "Batch merged"
        );

        self.updates
            .send(StoreUpdate {
                store: Arc::clone(&self.store),
                batch_size,
                rejected_total: self.accumulator.rejected_total(),
                flushed_at: Utc::now(),
            })
            .await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    use super::*;
    use crate::domain::entity::EntityId;

    fn snapshot(id: u64, price: i64) -> AssetSnapshot {
        AssetSnapshot {
            id: Some(EntityId::new(id)),
            asset_name: format!("Asset {id}"),
            price: Decimal::new(price, 0),
            asset_type: "metal".to_string(),
        }
    }

    fn spawn_ingestor() -> (
        mpsc::Sender<AssetSnapshot>,
        mpsc::Receiver<StoreUpdate>,
        CancellationToken,
        JoinHandle<Arc<EntityStore>>,
    ) {
        let (snapshot_tx, snapshot_rx) = mpsc::channel(64);
        let (update_tx, update_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let ingestor = BatchingIngestor::new(
            IngestorConfig::default(),
            snapshot_rx,
            update_tx,
            cancel.clone(),
        );
        let handle = tokio::spawn(ingestor.run());
        (snapshot_tx, update_rx, cancel, handle)
    }

    #[test]
    fn accumulator_take_on_empty_window_is_none() {
        let mut acc = BatchAccumulator::new();
        assert!(acc.take().is_none());
    }

    #[test]
    fn accumulator_keeps_arrival_order() {
        let mut acc = BatchAccumulator::new();
        acc.push(snapshot(2, 1)).unwrap();
        acc.push(snapshot(1, 1)).unwrap();
        acc.push(snapshot(2, 5)).unwrap();

        let batch = acc.take().unwrap();
        let ids: Vec<u64> = batch.iter().map(|e| e.id.get()).collect();
        assert_eq!(ids, vec![2, 1, 2]);
        assert!(acc.is_empty());
    }

    #[test]
    fn accumulator_rejects_missing_id() {
        let mut acc = BatchAccumulator::new();
        let mut bad = snapshot(1, 1);
        bad.id = None;

        assert!(acc.push(bad).is_err());
        assert_eq!(acc.rejected_total(), 1);
        assert!(acc.take().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn window_merges_last_snapshot_per_id() {
        let (tx, mut updates, cancel, _handle) = spawn_ingestor();

        for (id, price) in [(1, 100), (2, 50), (1, 101), (1, 102)] {
            tx.send(snapshot(id, price)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let update = updates.recv().await.unwrap();
        assert_eq!(update.batch_size, 4);
        assert_eq!(update.store.len(), 2);
        assert_eq!(
            update.store.get(EntityId::new(1)).unwrap().price,
            Decimal::new(102, 0)
        );

        // Everything arrived within one window: exactly one notification.
        assert!(
            timeout(Duration::from_millis(350), updates.recv())
                .await
                .is_err()
        );
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn empty_windows_emit_nothing() {
        let (_tx, mut updates, cancel, _handle) = spawn_ingestor();

        assert!(
            timeout(Duration::from_millis(1_000), updates.recv())
                .await
                .is_err()
        );
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn window_with_only_rejected_snapshots_emits_nothing() {
        let (tx, mut updates, cancel, _handle) = spawn_ingestor();

        let mut bad = snapshot(1, 1);
        bad.id = None;
        tx.send(bad).await.unwrap();

        assert!(
            timeout(Duration::from_millis(500), updates.recv())
                .await
                .is_err()
        );

        tx.send(snapshot(3, 3)).await.unwrap();
        let update = updates.recv().await.unwrap();
        assert_eq!(update.rejected_total, 1);
        assert!(update.store.get(EntityId::new(3)).is_some());
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn separate_windows_produce_separate_updates() {
        let (tx, mut updates, cancel, _handle) = spawn_ingestor();

        tx.send(snapshot(1, 10)).await.unwrap();
        let first = updates.recv().await.unwrap();
        assert_eq!(first.store.revision(), 1);

        tx.send(snapshot(2, 20)).await.unwrap();
        let second = updates.recv().await.unwrap();
        assert_eq!(second.store.revision(), 2);
        assert_eq!(second.store.len(), 2);

        // Earlier notifications are not affected by later merges.
        assert_eq!(first.store.len(), 1);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn snapshots_either_side_of_a_boundary_flush_separately() {
        let (tx, mut updates, cancel, _handle) = spawn_ingestor();
        let start = Instant::now();

        tokio::time::sleep_until(start + Duration::from_millis(90)).await;
        tx.send(snapshot(1, 10)).await.unwrap();
        tokio::time::sleep_until(start + Duration::from_millis(110)).await;
        tx.send(snapshot(2, 20)).await.unwrap();

        // The first window closed at t=100, before the second send.
        let first = updates.try_recv().unwrap();
        assert_eq!(first.batch_size, 1);
        assert!(first.store.get(EntityId::new(1)).is_some());
        assert!(first.store.get(EntityId::new(2)).is_none());

        let second = updates.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(200));
        assert_eq!(second.batch_size, 1);
        assert_eq!(second.store.len(), 2);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_pending_window_after_producer_closes() {
        let (tx, mut updates, _cancel, handle) = spawn_ingestor();

        tx.send(snapshot(5, 1)).await.unwrap();
        drop(tx);

        let update = updates.recv().await.unwrap();
        assert_eq!(update.batch_size, 1);

        let store = handle.await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_ingestor() {
        let (_tx, _updates, cancel, handle) = spawn_ingestor();

        cancel.cancel();
        let result = timeout(Duration::from_millis(100), handle).await;
        assert!(result.is_ok(), "ingestor should stop on cancellation");
    }

    /// Flush times and batch sizes for snapshots sent at the given offsets.
    fn run_arrivals(arrivals: &[(u64, u64)]) -> Vec<(u64, usize)> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let (tx, mut updates, _cancel, _handle) = spawn_ingestor();
            let start = Instant::now();
            let arrivals = arrivals.to_vec();
            tokio::spawn(async move {
                for (at_ms, id) in arrivals {
                    tokio::time::sleep_until(start + Duration::from_millis(at_ms)).await;
                    tx.send(snapshot(id, 1)).await.unwrap();
                }
            });

            let mut flushes = Vec::new();
            while let Some(update) = updates.recv().await {
                let at_ms = u64::try_from(start.elapsed().as_millis()).unwrap();
                flushes.push((at_ms, update.batch_size));
            }
            flushes
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn batches_follow_the_window_of_arrival(
            raw in prop::collection::vec((0u64..6, 1u64..100, 0u64..8), 1..24)
        ) {
            let mut arrivals: Vec<(u64, u64)> = raw
                .into_iter()
                .map(|(window, offset, id)| (window * 100 + offset, id))
                .collect();
            arrivals.sort_by_key(|(at_ms, _)| *at_ms);

            let mut expected: BTreeMap<u64, usize> = BTreeMap::new();
            for (at_ms, _) in &arrivals {
                *expected.entry((at_ms / 100 + 1) * 100).or_default() += 1;
            }
            let expected: Vec<(u64, usize)> = expected.into_iter().collect();

            prop_assert_eq!(run_arrivals(&arrivals), expected);
        }
    }
}
