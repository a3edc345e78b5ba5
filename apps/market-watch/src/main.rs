//! Market Watch Binary
//!
//! Runs the live asset board in a terminal.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin market-watch
//! ```
//!
//! Type to filter; `:sort <field>`, `:fav <id>`, `:help` and `:quit` are
//! commands.
//!
//! # Environment Variables
//!
//! - `MARKET_WATCH_BATCH_WINDOW_MS`: Batching window (default: 100)
//! - `MARKET_WATCH_DEBOUNCE_MS`: Filter quiet period (default: 300)
//! - `MARKET_WATCH_FAVORITES_PATH`: Favorites document (default: market-watch.json)
//! - `MARKET_WATCH_FEED_PATH`: JSON lines file to replay (default: simulated feed)
//! - `MARKET_WATCH_SIM_ASSETS`: Simulated assets (default: 24)
//! - `MARKET_WATCH_SIM_MAX_INTERVAL_MS`: Max pause between simulated snapshots (default: 25)
//! - `MARKET_WATCH_SIM_SEED`: Simulator seed (default: random)
//! - `MARKET_WATCH_HEALTH_PORT`: Health check HTTP port, 0 disables (default: 8083)
//! - `MARKET_WATCH_RENDER_ROWS`: Rows drawn (default: 20)
//! - `MARKET_WATCH_RENDER_INTERVAL_MS`: Redraw interval (default: 1000)
//! - `MARKET_WATCH_SNAPSHOT_CAPACITY`: Producer channel capacity (default: 4096)
//! - `MARKET_WATCH_INPUT_CAPACITY`: UI input channel capacity (default: 256)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: `market_watch=info`)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use market_watch::application::ports::FavoritesStorePort;
use market_watch::application::services::{Board, BoardNotice, BoardOptions, FavoritesManager};
use market_watch::infrastructure::console::{CommandReader, ConsoleRenderer};
use market_watch::infrastructure::feed::{
    FeedSummary, JsonLinesFeed, SimulatedFeed, SimulatedFeedConfig,
};
use market_watch::infrastructure::health::{HealthServer, HealthServerState};
use market_watch::infrastructure::storage::JsonFileStore;
use market_watch::infrastructure::telemetry;
use market_watch::{FeedSettings, MarketWatchConfig, init_metrics};
use tokio::io::BufReader;
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    load_dotenv();

    // One thread: every state cell is touched from a single logical thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let result = runtime.block_on(run());

    // Stdin is read on a blocking thread that only returns on the next line.
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    result
}

async fn run() -> anyhow::Result<()> {
    let telemetry_guard = telemetry::init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        otel_export = telemetry_guard.is_exporting(),
        "Starting market watch"
    );

    let _metrics_handle = init_metrics();

    let config = MarketWatchConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let store: Arc<dyn FavoritesStorePort> = Arc::new(JsonFileStore::new(&config.favorites_path));
    let favorites = FavoritesManager::load(store).await;

    let Board {
        handle,
        snapshots,
        stats,
        tasks,
    } = Board::start(
        BoardOptions::from(&config.pipeline),
        favorites,
        &shutdown_token,
    );

    let feed_task = spawn_feed(&config.feed, snapshots, shutdown_token.clone()).await?;

    if config.server.health_port == 0 {
        tracing::info!("Health server disabled");
    } else {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            Arc::clone(&stats),
        ));
        let health_server = HealthServer::new(
            config.server.health_port,
            health_state,
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    let renderer = ConsoleRenderer::new(
        tokio::io::stdout(),
        config.render.rows,
        config.render.interval,
    );
    let renderer_task = tokio::spawn(renderer.run(handle.subscribe_view(), shutdown_token.clone()));

    tokio::spawn(report_notices(handle.subscribe_notices()));

    let reader = CommandReader::new(BufReader::new(tokio::io::stdin()), handle);
    let reader_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        if let Err(e) = reader.run(reader_shutdown).await {
            tracing::debug!(error = %e, "Command reader stopped");
        }
    });

    tracing::info!("Market watch ready");

    tokio::select! {
        () = await_shutdown() => shutdown_token.cancel(),
        () = shutdown_token.cancelled() => {}
    }

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );

    let drained = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        tasks.join().await;
        let _ = renderer_task.await;
        feed_task.await.unwrap_or_default()
    })
    .await;

    match drained {
        Ok(summary) => tracing::info!(
            forwarded = summary.forwarded,
            rejected = summary.rejected,
            batches = stats.batches_flushed(),
            "Market watch stopped"
        ),
        Err(_) => tracing::warn!("Shutdown timed out"),
    }
    Ok(())
}

/// Start the configured snapshot producer.
async fn spawn_feed(
    settings: &FeedSettings,
    tx: mpsc::Sender<market_watch::AssetSnapshot>,
    cancel: CancellationToken,
) -> anyhow::Result<JoinHandle<FeedSummary>> {
    match settings {
        FeedSettings::Simulated {
            assets,
            max_interval,
            seed,
        } => {
            let feed = SimulatedFeed::new(SimulatedFeedConfig {
                assets: *assets,
                max_interval: *max_interval,
                seed: *seed,
                ..SimulatedFeedConfig::default()
            });
            Ok(tokio::spawn(feed.run(tx, cancel)))
        }
        FeedSettings::JsonLines { path } => {
            let feed = JsonLinesFeed::open(path)
                .await
                .with_context(|| format!("failed to open feed {}", path.display()))?;
            Ok(tokio::spawn(feed.run(tx, cancel)))
        }
    }
}

/// Surface recoverable board notices on stderr.
async fn report_notices(mut notices: broadcast::Receiver<BoardNotice>) {
    loop {
        match notices.recv().await {
            Ok(BoardNotice::FavoritesPersistFailed {
                id,
                is_favorite,
                reason,
            }) => {
                let action = if is_favorite { "pin" } else { "unpin" };
                eprintln!("could not save {action} of {id}: {reason}");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Notice receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &MarketWatchConfig) {
    let feed = match &config.feed {
        FeedSettings::Simulated { assets, .. } => format!("simulated ({assets} assets)"),
        FeedSettings::JsonLines { path } => path.display().to_string(),
    };

    tracing::info!(
        batch_window_ms = config.pipeline.batch_window.as_millis(),
        debounce_ms = config.pipeline.debounce.as_millis(),
        feed = %feed,
        favorites = %config.favorites_path.display(),
        health_port = config.server.health_port,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
