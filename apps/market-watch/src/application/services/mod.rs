//! Application Services
//!
//! Long-running tasks and the stateful managers they drive.

mod board;
mod debouncer;
mod favorites;
mod ingestor;

pub use board::{
    Board, BoardCommand, BoardError, BoardHandle, BoardNotice, BoardOptions, BoardRuntime,
    BoardStats, BoardTasks, SharedBoardStats, ViewFrame,
};
pub use debouncer::{DEFAULT_QUIET_PERIOD, Debounce, DebounceConfig, FilterDebouncer};
pub use favorites::{FavoritesManager, ToggleOutcome};
pub use ingestor::{
    BatchAccumulator, BatchingIngestor, DEFAULT_BATCH_WINDOW, IngestorConfig, StoreUpdate,
};
