//! Newline-Delimited JSON Feed
//!
//! Replays `AssetSnapshot` lines from any async reader. Lines that fail to
//! decode are logged, counted and skipped; blank lines are ignored.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tokio_util::sync::CancellationToken;

use super::FeedSummary;
use crate::domain::entity::AssetSnapshot;
use crate::infrastructure::metrics::{self, RejectReason};

/// Snapshot producer reading JSON lines.
#[derive(Debug)]
pub struct JsonLinesFeed<R> {
    reader: R,
}

impl JsonLinesFeed<BufReader<File>> {
    /// Open a file for replay.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R> JsonLinesFeed<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Wrap a buffered reader.
    pub const fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Forward every decodable line until end of input, cancellation, or
    /// the channel closing.
    pub async fn run(
        self,
        tx: mpsc::Sender<AssetSnapshot>,
        cancel: CancellationToken,
    ) -> FeedSummary {
        let mut lines = LinesStream::new(self.reader.lines());
        let mut summary = FeedSummary::default();
        let mut line_no = 0_u64;

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = lines.next() => next,
            };

            let line = match next {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Failed to read feed, stopping");
                    break;
                }
                None => {
                    tracing::info!(
                        forwarded = summary.forwarded,
                        rejected = summary.rejected,
                        "Feed exhausted"
                    );
                    break;
                }
            };
            line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<AssetSnapshot>(&line) {
                Ok(snapshot) => {
                    if tx.send(snapshot).await.is_err() {
                        tracing::debug!("Snapshot channel closed, stopping feed");
                        break;
                    }
                    summary.forwarded += 1;
                }
                Err(e) => {
                    summary.rejected += 1;
                    metrics::record_snapshot_rejected(RejectReason::Decode);
                    tracing::warn!(line = line_no, error = %e, "Skipping undecodable snapshot");
                }
            }
        }

        summary
    }
}
