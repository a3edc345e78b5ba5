//! Board Pipeline Integration Tests
//!
//! Drives a full board from producer input through to published frames.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use market_watch::application::services::{DebounceConfig, IngestorConfig};
use market_watch::infrastructure::feed::JsonLinesFeed;
use market_watch::{
    AssetSnapshot, Board, BoardOptions, EntityId, FavoritesManager, InMemoryFavoritesStore,
    SortField, SortSpec, ViewFrame,
};

const FEED: &str = concat!(
    r#"{"id":1,"assetName":"Gold","price":1850.5,"type":"metal"}"#,
    "\n",
    r#"{"id":2,"assetName":"Bitcoin","price":64000,"type":"crypto"}"#,
    "\n",
    "garbage\n",
    r#"{"assetName":"Nameless","price":1,"type":"metal"}"#,
    "\n",
    r#"{"id":3,"assetName":"Silver","price":24.1,"type":"metal"}"#,
    "\n",
    r#"{"id":1,"assetName":"Gold","price":1851,"type":"metal"}"#,
    "\n",
);

async fn start(favorites: &str) -> (Board, CancellationToken) {
    let cancel = CancellationToken::new();
    let store = Arc::new(InMemoryFavoritesStore::with_value(favorites));
    let manager = FavoritesManager::load(store).await;
    (
        Board::start(BoardOptions::default(), manager, &cancel),
        cancel,
    )
}

async fn wait_for<F>(view: &mut watch::Receiver<Arc<ViewFrame>>, predicate: F) -> Arc<ViewFrame>
where
    F: Fn(&ViewFrame) -> bool,
{
    timeout(Duration::from_secs(10), async {
        loop {
            {
                let frame = view.borrow_and_update();
                if predicate(&frame) {
                    return Arc::clone(&frame);
                }
            }
            view.changed().await.unwrap();
        }
    })
    .await
    .expect("frame never matched")
}

fn ids(frame: &ViewFrame) -> Vec<u64> {
    frame.rows.iter().map(|e| e.id.get()).collect()
}

#[tokio::test(start_paused = true)]
async fn json_feed_to_pinned_sorted_filtered_view() {
    let (board, cancel) = start(r#"{"3":true}"#).await;
    let mut view = board.handle.subscribe_view();

    let summary = JsonLinesFeed::new(FEED.as_bytes())
        .run(board.snapshots.clone(), cancel.clone())
        .await;
    assert_eq!(summary.forwarded, 5);
    assert_eq!(summary.rejected, 1);

    let frame = wait_for(&mut view, |f| f.total_entities == 3).await;
    // Silver is pinned; the rest keep store order.
    assert_eq!(ids(&frame), vec![3, 1, 2]);
    assert_eq!(
        frame.rows.iter().find(|e| e.id.get() == 1).unwrap().price,
        Decimal::new(1851, 0)
    );
    assert_eq!(board.stats.snapshots_rejected(), 1);

    board
        .handle
        .sort_header_clicked(SortField::Price)
        .await
        .unwrap();
    board
        .handle
        .sort_header_clicked(SortField::Price)
        .await
        .unwrap();
    let frame = wait_for(&mut view, |f| f.sort == SortSpec::descending(SortField::Price)).await;
    assert_eq!(ids(&frame), vec![3, 2, 1]);

    board.handle.text_filter_changed("METAL").await.unwrap();
    let frame = wait_for(&mut view, |f| !f.filter.is_empty()).await;
    assert_eq!(frame.filter.as_str(), "metal");
    assert_eq!(ids(&frame), vec![3, 1]);

    board.handle.text_filter_changed("").await.unwrap();
    let frame = wait_for(&mut view, |f| f.filter.is_empty()).await;
    assert_eq!(ids(&frame), vec![3, 2, 1]);

    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn typing_burst_publishes_one_filtered_frame() {
    let (board, cancel) = start("{}").await;
    let mut view = board.handle.subscribe_view();

    for (id, name) in [(1, "Gold"), (2, "Silver"), (3, "Golden Token")] {
        board
            .snapshots
            .send(AssetSnapshot {
                id: Some(EntityId::new(id)),
                asset_name: name.to_string(),
                price: Decimal::ONE,
                asset_type: "metal".to_string(),
            })
            .await
            .unwrap();
    }
    wait_for(&mut view, |f| f.total_entities == 3).await;

    for text in ["g", "go", "gol", "gold"] {
        board.handle.text_filter_changed(text).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    view.changed().await.unwrap();
    let frame = Arc::clone(&view.borrow_and_update());
    assert_eq!(frame.filter.as_str(), "gold");
    assert_eq!(ids(&frame), vec![1, 3]);

    assert!(
        timeout(Duration::from_secs(2), view.changed()).await.is_err(),
        "intermediate keystrokes must not publish frames"
    );
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn empty_windows_publish_nothing() {
    let cancel = CancellationToken::new();
    let manager = FavoritesManager::load(Arc::new(InMemoryFavoritesStore::new())).await;
    let options = BoardOptions {
        ingestor: IngestorConfig {
            window: Duration::from_millis(20),
        },
        debounce: DebounceConfig {
            quiet_period: Duration::from_millis(40),
        },
        ..BoardOptions::default()
    };
    let board = Board::start(options, manager, &cancel);
    let mut view = board.handle.subscribe_view();

    let initial = wait_for(&mut view, |f| f.revision == 1).await;
    assert!(initial.rows.is_empty());

    assert!(timeout(Duration::from_secs(1), view.changed()).await.is_err());
    assert_eq!(board.stats.batches_flushed(), 0);
    assert!(!board.stats.is_ready());
    cancel.cancel();
}
