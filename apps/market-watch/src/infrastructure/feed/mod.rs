//! Snapshot Producers
//!
//! Sources that push `AssetSnapshot`s into the ingestor's channel.

mod json_lines;
mod simulated;

pub use json_lines::JsonLinesFeed;
pub use simulated::{SimulatedFeed, SimulatedFeedConfig};

/// Totals reported by a producer when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
    /// Snapshots handed to the ingestor.
    pub forwarded: u64,
    /// Input records that could not be decoded.
    pub rejected: u64,
}
