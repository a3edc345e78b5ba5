//! Board Runtime
//!
//! Wires the four independent state cells (entity store, sort spec, settled
//! filter, favorites) to the view derivation pipeline and exposes the
//! handlers a renderer calls.
//!
//! # Event Flow
//!
//! ```text
//! producer ──► BatchingIngestor ──StoreUpdate──┐
//!                                              │
//! raw text ──► FilterDebouncer ──FilterTerm────┼──► BoardRuntime ──► ViewFrame (watch)
//!                                              │         │
//! header / favorite clicks ──BoardCommand──────┘         └──► BoardNotice (broadcast)
//! ```
//!
//! The runtime reacts to one event at a time. All state mutation and the
//! resulting frame publication for an event complete before the next event
//! is taken.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::debouncer::{DebounceConfig, FilterDebouncer};
use super::favorites::FavoritesManager;
use super::ingestor::{BatchingIngestor, IngestorConfig, StoreUpdate};
use crate::domain::entity::{AssetSnapshot, Entity, EntityId, EntityStore};
use crate::domain::favorites::FavoriteSet;
use crate::domain::view::{CacheOutcome, FilterTerm, SortField, SortSpec, ViewCache, ViewInputs};
use crate::infrastructure::metrics;

// =============================================================================
// Options
// =============================================================================

/// Timing and channel sizing for a board.
#[derive(Debug, Clone, Copy)]
pub struct BoardOptions {
    /// Ingestor configuration.
    pub ingestor: IngestorConfig,
    /// Debouncer configuration.
    pub debounce: DebounceConfig,
    /// Capacity of the producer snapshot channel.
    pub snapshot_capacity: usize,
    /// Capacity of the UI input channels.
    pub input_capacity: usize,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            ingestor: IngestorConfig::default(),
            debounce: DebounceConfig::default(),
            snapshot_capacity: 4096,
            input_capacity: 256,
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

/// UI actions handled by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardCommand {
    /// A column header was clicked.
    SortHeaderClicked(SortField),
    /// A row's favorite button was clicked.
    FavoriteToggled(EntityId),
}

/// Recoverable conditions reported to the surrounding system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardNotice {
    /// A favorites save failed; memory and storage disagree until the next
    /// successful save.
    FavoritesPersistFailed {
        /// Toggled id.
        id: EntityId,
        /// Membership after the toggle.
        is_favorite: bool,
        /// Failure description.
        reason: String,
    },
}

/// Everything a renderer needs to draw the board.
#[derive(Debug, Clone, Default)]
pub struct ViewFrame {
    /// Increases with every published frame.
    pub revision: u64,
    /// Rows in display order.
    pub rows: Arc<[Entity]>,
    /// Pinned ids, for the per-row favorite buttons.
    pub favorites: FavoriteSet,
    /// Current sort, for the header indicators.
    pub sort: SortSpec,
    /// Settled filter the rows were derived with.
    pub filter: FilterTerm,
    /// Entities in the store before filtering.
    pub total_entities: usize,
}

/// Errors returned by `BoardHandle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// The runtime has shut down.
    #[error("board runtime has shut down")]
    Closed,
}

// =============================================================================
// Stats
// =============================================================================

/// Counters shared with the health endpoint.
#[derive(Debug, Default)]
pub struct BoardStats {
    entities: AtomicU64,
    favorites: AtomicU64,
    batches_flushed: AtomicU64,
    snapshots_rejected: AtomicU64,
    view_rows: AtomicU64,
    last_flush_at: RwLock<Option<DateTime<Utc>>>,
}

impl BoardStats {
    /// Create zeroed stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record_store_update(&self, update: &StoreUpdate) {
        self.entities
            .store(update.store.len() as u64, Ordering::Relaxed);
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
        self.snapshots_rejected
            .store(update.rejected_total, Ordering::Relaxed);
        *self.last_flush_at.write() = Some(update.flushed_at);
    }

    fn record_frame(&self, frame: &ViewFrame) {
        self.favorites
            .store(frame.favorites.len() as u64, Ordering::Relaxed);
        self.view_rows
            .store(frame.rows.len() as u64, Ordering::Relaxed);
    }

    /// Distinct entities in the store.
    #[must_use]
    pub fn entities(&self) -> u64 {
        self.entities.load(Ordering::Relaxed)
    }

    /// Pinned ids.
    #[must_use]
    pub fn favorites(&self) -> u64 {
        self.favorites.load(Ordering::Relaxed)
    }

    /// Batches merged so far.
    #[must_use]
    pub fn batches_flushed(&self) -> u64 {
        self.batches_flushed.load(Ordering::Relaxed)
    }

    /// Snapshots rejected so far (as of the last flush).
    #[must_use]
    pub fn snapshots_rejected(&self) -> u64 {
        self.snapshots_rejected.load(Ordering::Relaxed)
    }

    /// Rows in the last published view.
    #[must_use]
    pub fn view_rows(&self) -> u64 {
        self.view_rows.load(Ordering::Relaxed)
    }

    /// Whether at least one batch has been merged.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.batches_flushed() > 0
    }

    /// Time of the last merged batch.
    #[must_use]
    pub fn last_flush_at(&self) -> Option<DateTime<Utc>> {
        *self.last_flush_at.read()
    }
}

/// Shared board stats reference.
pub type SharedBoardStats = Arc<BoardStats>;

// =============================================================================
// Handle
// =============================================================================

/// Renderer-facing entry points into the board.
///
/// These are the only ways to mutate board state from outside.
#[derive(Debug, Clone)]
pub struct BoardHandle {
    raw_filter_tx: mpsc::Sender<String>,
    command_tx: mpsc::Sender<BoardCommand>,
    view_rx: watch::Receiver<Arc<ViewFrame>>,
    notice_tx: broadcast::Sender<BoardNotice>,
}

impl BoardHandle {
    /// The filter text box changed.
    ///
    /// # Errors
    ///
    /// Returns `BoardError::Closed` if the board has shut down.
    pub async fn text_filter_changed(&self, raw: impl Into<String>) -> Result<(), BoardError> {
        self.raw_filter_tx
            .send(raw.into())
            .await
            .map_err(|_| BoardError::Closed)
    }

    /// A column header was clicked.
    ///
    /// # Errors
    ///
    /// Returns `BoardError::Closed` if the board has shut down.
    pub async fn sort_header_clicked(&self, field: SortField) -> Result<(), BoardError> {
        self.command_tx
            .send(BoardCommand::SortHeaderClicked(field))
            .await
            .map_err(|_| BoardError::Closed)
    }

    /// A row's favorite button was clicked.
    ///
    /// # Errors
    ///
    /// Returns `BoardError::Closed` if the board has shut down.
    pub async fn favorite_toggled(&self, id: EntityId) -> Result<(), BoardError> {
        self.command_tx
            .send(BoardCommand::FavoriteToggled(id))
            .await
            .map_err(|_| BoardError::Closed)
    }

    /// The most recently published frame.
    #[must_use]
    pub fn current_view(&self) -> Arc<ViewFrame> {
        Arc::clone(&self.view_rx.borrow())
    }

    /// Receiver that observes every newly published frame.
    #[must_use]
    pub fn subscribe_view(&self) -> watch::Receiver<Arc<ViewFrame>> {
        self.view_rx.clone()
    }

    /// Receiver for recoverable notices.
    #[must_use]
    pub fn subscribe_notices(&self) -> broadcast::Receiver<BoardNotice> {
        self.notice_tx.subscribe()
    }
}

// =============================================================================
// Runtime
// =============================================================================

/// Single-task owner of the derivation inputs.
pub struct BoardRuntime {
    store: Arc<EntityStore>,
    sort: SortSpec,
    filter: FilterTerm,
    favorites: FavoritesManager,
    cache: ViewCache,
    frame_revision: u64,
    store_updates: mpsc::Receiver<StoreUpdate>,
    settled_filters: mpsc::Receiver<FilterTerm>,
    commands: mpsc::Receiver<BoardCommand>,
    view_tx: watch::Sender<Arc<ViewFrame>>,
    notice_tx: broadcast::Sender<BoardNotice>,
    stats: SharedBoardStats,
    cancel: CancellationToken,
}

impl BoardRuntime {
    /// Run until cancelled or every input channel has closed.
    pub async fn run(mut self) {
        self.publish();
        tracing::info!(favorites = self.favorites.favorites().len(), "Board runtime started");

        let mut updates_open = true;
        let mut filters_open = true;
        let mut commands_open = true;

        loop {
            if !(updates_open || filters_open || commands_open) {
                tracing::debug!("All board inputs closed");
                break;
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::debug!("Board runtime cancelled");
                    break;
                }
                update = self.store_updates.recv(), if updates_open => match update {
                    Some(update) => self.on_store_updated(update),
                    None => {
                        updates_open = false;
                        continue;
                    }
                },
                term = self.settled_filters.recv(), if filters_open => match term {
                    Some(term) => self.on_filter_settled(term),
                    None => {
                        filters_open = false;
                        continue;
                    }
                },
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.on_command(command).await,
                    None => {
                        commands_open = false;
                        continue;
                    }
                },
            }

            self.publish();
        }

        tracing::info!("Board runtime stopped");
    }

    fn on_store_updated(&mut self, update: StoreUpdate) {
        self.stats.record_store_update(&update);
        self.store = update.store;
    }

    fn on_filter_settled(&mut self, term: FilterTerm) {
        tracing::debug!(filter = %term, "Applying filter");
        self.filter = term;
    }

    async fn on_command(&mut self, command: BoardCommand) {
        match command {
            BoardCommand::SortHeaderClicked(field) => {
                self.sort = self.sort.select(field);
                tracing::debug!(
                    field = %field,
                    descending = self.sort.descending,
                    "Sort changed"
                );
            }
            BoardCommand::FavoriteToggled(id) => {
                let outcome = self.favorites.toggle(id).await;
                if let Err(e) = outcome.persisted {
                    // No subscribers is fine; the failure is already logged.
                    let _ = self.notice_tx.send(BoardNotice::FavoritesPersistFailed {
                        id,
                        is_favorite: outcome.is_favorite,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    /// Derive the view and publish a frame if anything changed.
    fn publish(&mut self) {
        let inputs = ViewInputs {
            store: &self.store,
            filter: &self.filter,
            sort: self.sort,
            favorites: self.favorites.favorites(),
        };

        let started = Instant::now();
        let (rows, outcome) = self.cache.derive(&inputs);
        if outcome == CacheOutcome::Hit {
            metrics::record_view_cache_hit();
            return;
        }
        metrics::record_view_derived(started.elapsed(), rows.len());

        self.frame_revision += 1;
        let frame = ViewFrame {
            revision: self.frame_revision,
            rows,
            favorites: self.favorites.favorites().clone(),
            sort: self.sort,
            filter: self.filter.clone(),
            total_entities: self.store.len(),
        };
        self.stats.record_frame(&frame);
        tracing::debug!(
            revision = frame.revision,
            rows = frame.rows.len(),
            total = frame.total_entities,
            "View published"
        );
        self.view_tx.send_replace(Arc::new(frame));
    }
}

// =============================================================================
// Assembly
// =============================================================================

/// Join handles of the board's tasks.
#[derive(Debug)]
pub struct BoardTasks {
    /// Batching ingestor; resolves to the final store.
    pub ingestor: JoinHandle<Arc<EntityStore>>,
    /// Filter debouncer.
    pub debouncer: JoinHandle<()>,
    /// Board runtime.
    pub runtime: JoinHandle<()>,
}

impl BoardTasks {
    /// Wait for every task to finish.
    pub async fn join(self) {
        for (name, result) in [
            ("ingestor", self.ingestor.await.map(|_| ())),
            ("debouncer", self.debouncer.await),
            ("runtime", self.runtime.await),
        ] {
            if let Err(e) = result {
                tracing::error!(task = name, error = %e, "Board task failed");
            }
        }
    }
}

/// A running board.
#[derive(Debug)]
pub struct Board {
    /// Renderer-facing handle.
    pub handle: BoardHandle,
    /// Producer side of the snapshot channel.
    pub snapshots: mpsc::Sender<AssetSnapshot>,
    /// Shared counters.
    pub stats: SharedBoardStats,
    /// Spawned tasks.
    pub tasks: BoardTasks,
}

impl Board {
    /// Spawn the ingestor, debouncer and runtime on the current runtime.
    #[must_use]
    pub fn start(
        options: BoardOptions,
        favorites: FavoritesManager,
        cancel: &CancellationToken,
    ) -> Self {
        let (snapshot_tx, snapshot_rx) = mpsc::channel(options.snapshot_capacity);
        let (update_tx, update_rx) = mpsc::channel(options.input_capacity);
        let (raw_filter_tx, raw_filter_rx) = mpsc::channel(options.input_capacity);
        let (settled_tx, settled_rx) = mpsc::channel(options.input_capacity);
        let (command_tx, command_rx) = mpsc::channel(options.input_capacity);
        let (view_tx, view_rx) = watch::channel(Arc::new(ViewFrame::default()));
        let (notice_tx, _) = broadcast::channel(options.input_capacity);
        let stats = Arc::new(BoardStats::new());

        let ingestor =
            BatchingIngestor::new(options.ingestor, snapshot_rx, update_tx, cancel.clone());
        let debouncer =
            FilterDebouncer::new(options.debounce, raw_filter_rx, settled_tx, cancel.clone());
        let runtime = BoardRuntime {
            store: Arc::new(EntityStore::new()),
            sort: SortSpec::none(),
            filter: FilterTerm::default(),
            favorites,
            cache: ViewCache::new(),
            frame_revision: 0,
            store_updates: update_rx,
            settled_filters: settled_rx,
            commands: command_rx,
            view_tx,
            notice_tx: notice_tx.clone(),
            stats: Arc::clone(&stats),
            cancel: cancel.clone(),
        };

        let tasks = BoardTasks {
            ingestor: tokio::spawn(ingestor.run()),
            debouncer: tokio::spawn(debouncer.run()),
            runtime: tokio::spawn(runtime.run()),
        };

        Self {
            handle: BoardHandle {
                raw_filter_tx,
                command_tx,
                view_rx,
                notice_tx,
            },
            snapshots: snapshot_tx,
            stats,
            tasks,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
