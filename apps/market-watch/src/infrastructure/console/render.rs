//! Text table rendering of view frames.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::services::ViewFrame;
use crate::domain::view::{SortDirection, SortField};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

fn header_label(field: SortField) -> &'static str {
    match field {
        SortField::Id => "ID",
        SortField::AssetName => "Name",
        SortField::Price => "Price",
        SortField::Type => "Type",
    }
}

fn indicator(direction: Option<SortDirection>) -> &'static str {
    match direction {
        Some(SortDirection::Ascending) => " ^",
        Some(SortDirection::Descending) => " v",
        None => "",
    }
}

/// Draw up to `limit` rows of `frame` as a fixed-width table.
///
/// Headers carry `^`/`v` for the active sort column and pinned rows are
/// marked with `*`.
#[must_use]
pub fn render_table(frame: &ViewFrame, limit: usize) -> String {
    let mut out = String::new();

    let headers: Vec<String> = SortField::all()
        .iter()
        .map(|&field| {
            format!(
                "{}{}",
                header_label(field),
                indicator(frame.sort.direction_of(field))
            )
        })
        .collect();

    let _ = writeln!(
        out,
        "{:>6}  {:<16}  {:>14}  {:<10}  {}",
        headers[0], headers[1], headers[2], headers[3], "Fav"
    );
    let _ = writeln!(out, "{}", "-".repeat(56));

    for entity in frame.rows.iter().take(limit) {
        let marker = if frame.favorites.contains(entity.id) {
            "*"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "{:>6}  {:<16}  {:>14}  {:<10}  {}",
            entity.id,
            entity.asset_name,
            entity.price.normalize().to_string(),
            entity.asset_type,
            marker
        );
    }

    let _ = write!(
        out,
        "{} of {} rows, {} entities",
        frame.rows.len().min(limit),
        frame.rows.len(),
        frame.total_entities
    );
    if !frame.filter.is_empty() {
        let _ = write!(out, ", filter \"{}\"", frame.filter);
    }
    out.push('\n');
    out
}

/// Periodically redraws the latest frame to a terminal.
pub struct ConsoleRenderer<W> {
    out: W,
    rows: usize,
    interval: Duration,
}

impl<W> ConsoleRenderer<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a renderer drawing `rows` rows at most every `interval`.
    pub const fn new(out: W, rows: usize, interval: Duration) -> Self {
        Self {
            out,
            rows,
            interval,
        }
    }

    /// Redraw whenever a newer frame is available, until cancelled.
    pub async fn run(
        mut self,
        mut view: watch::Receiver<Arc<ViewFrame>>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut drawn = 0;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let frame = Arc::clone(&view.borrow_and_update());
            if frame.revision == drawn {
                continue;
            }
            drawn = frame.revision;

            let screen = format!("{CLEAR_SCREEN}{}", render_table(&frame, self.rows));
            let written = match self.out.write_all(screen.as_bytes()).await {
                Ok(()) => self.out.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                tracing::warn!(error = %e, "Console write failed, stopping renderer");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::entity::{Entity, EntityId};
    use crate::domain::favorites::FavoriteSet;
    use crate::domain::view::{FilterTerm, SortSpec};

    fn frame() -> ViewFrame {
        let mut favorites = FavoriteSet::new();
        favorites.toggle(EntityId::new(2));
        ViewFrame {
            revision: 3,
            rows: vec![
                Entity::new(2_u64, "Silver", Decimal::new(2450, 2), "metal"),
                Entity::new(1_u64, "Gold", Decimal::new(185_000, 2), "metal"),
            ]
            .into(),
            favorites,
            sort: SortSpec::descending(SortField::Price),
            filter: FilterTerm::settle("Metal"),
            total_entities: 5,
        }
    }

    #[test]
    fn headers_show_sort_direction() {
        let table = render_table(&frame(), 10);
        let header = table.lines().next().unwrap();
        assert!(header.contains("Price v"));
        assert!(header.contains("Name"));
        assert!(!header.contains("Name ^"));
    }

    #[test]
    fn rows_in_frame_order_with_markers() {
        let table = render_table(&frame(), 10);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[2].contains("Silver"));
        assert!(lines[2].trim_end().ends_with('*'));
        assert!(lines[2].contains("24.5"));
        assert!(lines[3].contains("Gold"));
        assert!(lines[3].contains("1850"));
        assert!(!lines[3].trim_end().ends_with('*'));
    }

    #[test]
    fn footer_counts_and_filter() {
        let table = render_table(&frame(), 1);
        let footer = table.lines().last().unwrap();
        assert_eq!(footer, "1 of 2 rows, 5 entities, filter \"metal\"");
        assert!(!table.contains("Gold"));
    }

    #[tokio::test(start_paused = true)]
    async fn renderer_draws_each_new_frame_once() {
        let (tx, rx) = watch::channel(Arc::new(frame()));
        let (client, mut server) = tokio::io::duplex(16 * 1024);
        let cancel = CancellationToken::new();
        let renderer = ConsoleRenderer::new(client, 10, Duration::from_millis(100));
        let handle = tokio::spawn(renderer.run(rx, cancel.clone()));

        tokio::time::sleep(Duration::from_millis(350)).await;
        tx.send_replace(Arc::new(ViewFrame {
            revision: 4,
            ..frame()
        }));
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();
        handle.await.unwrap();

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut server, &mut buf)
            .await
            .unwrap();
        let screen = String::from_utf8(buf).unwrap();
        assert_eq!(screen.matches(CLEAR_SCREEN).count(), 2);
    }

    /// Accepts every write but refuses to flush.
    struct BrokenFlush {
        writes: Arc<AtomicUsize>,
    }

    impl AsyncWrite for BrokenFlush {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal gone")))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn renderer_stops_when_flush_fails() {
        let writes = Arc::new(AtomicUsize::new(0));
        let out = BrokenFlush {
            writes: Arc::clone(&writes),
        };
        let (tx, rx) = watch::channel(Arc::new(frame()));
        let cancel = CancellationToken::new();
        let renderer = ConsoleRenderer::new(out, 10, Duration::from_millis(100));
        let handle = tokio::spawn(renderer.run(rx, cancel.clone()));

        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send_replace(Arc::new(ViewFrame {
            revision: 4,
            ..frame()
        }));

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("renderer kept running after a failed flush")
            .unwrap();
        assert_eq!(writes.load(Ordering::SeqCst), 1);
        assert!(!cancel.is_cancelled());
    }
}
