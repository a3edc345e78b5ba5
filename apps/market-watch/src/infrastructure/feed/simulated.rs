//! Simulated Price Feed
//!
//! Random-walk snapshots over a fixed universe of named assets, emitted at
//! random sub-window intervals. A small share of emissions repeat the
//! previous snapshot or omit the id, so the ingestor's coalescing and
//! rejection paths see traffic.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::FeedSummary;
use crate::domain::entity::{AssetSnapshot, EntityId};

const CATALOG: &[(&str, &str, i64)] = &[
    ("Gold", "metal", 234_510),
    ("Silver", "metal", 2_985),
    ("Platinum", "metal", 98_140),
    ("Palladium", "metal", 101_275),
    ("Copper", "metal", 455),
    ("EUR/USD", "currency", 108),
    ("GBP/USD", "currency", 127),
    ("USD/JPY", "currency", 15_132),
    ("AUD/USD", "currency", 66),
    ("Bitcoin", "crypto", 6_712_000),
    ("Ethereum", "crypto", 348_025),
    ("Solana", "crypto", 17_240),
    ("Litecoin", "crypto", 8_410),
    ("Apple", "stock", 18_987),
    ("Microsoft", "stock", 42_133),
    ("Nvidia", "stock", 90_356),
    ("Tesla", "stock", 17_460),
];

/// Simulator tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedFeedConfig {
    /// Number of distinct assets.
    pub assets: usize,
    /// Upper bound of the pause between snapshots.
    pub max_interval: Duration,
    /// Fixed RNG seed, entropy when absent.
    pub seed: Option<u64>,
    /// Chance that an emission repeats the previous snapshot.
    pub duplicate_probability: f64,
    /// Chance that an emission carries no id.
    pub missing_id_probability: f64,
}

impl Default for SimulatedFeedConfig {
    fn default() -> Self {
        Self {
            assets: 24,
            max_interval: Duration::from_millis(25),
            seed: None,
            duplicate_probability: 0.05,
            missing_id_probability: 0.01,
        }
    }
}

#[derive(Debug, Clone)]
struct SimulatedAsset {
    id: EntityId,
    name: String,
    asset_type: &'static str,
    cents: i64,
}

/// Random-walk snapshot producer.
#[derive(Debug)]
pub struct SimulatedFeed {
    config: SimulatedFeedConfig,
    rng: StdRng,
    universe: Vec<SimulatedAsset>,
    last: Option<AssetSnapshot>,
}

impl SimulatedFeed {
    /// Build the asset universe.
    ///
    /// Ids run from 1. Names repeat the catalog with a numeric suffix once it
    /// is exhausted.
    #[must_use]
    pub fn new(config: SimulatedFeedConfig) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        let universe = (0..config.assets)
            .map(|i| {
                let (name, asset_type, cents) = CATALOG[i % CATALOG.len()];
                let round = i / CATALOG.len();
                SimulatedAsset {
                    id: EntityId::new(i as u64 + 1),
                    name: if round == 0 {
                        name.to_string()
                    } else {
                        format!("{name} {}", round + 1)
                    },
                    asset_type,
                    cents,
                }
            })
            .collect();

        Self {
            config,
            rng,
            universe,
            last: None,
        }
    }

    /// Produce the next snapshot. An empty universe yields id-less
    /// snapshots.
    pub fn next_snapshot(&mut self) -> AssetSnapshot {
        if let Some(last) = &self.last
            && self.rng.random_bool(self.config.duplicate_probability)
        {
            return last.clone();
        }

        let drop_id = self.rng.random_bool(self.config.missing_id_probability);

        if self.universe.is_empty() {
            return AssetSnapshot {
                id: None,
                asset_name: String::new(),
                price: Decimal::ZERO,
                asset_type: String::new(),
            };
        }

        let index = self.rng.random_range(0..self.universe.len());
        let asset = &mut self.universe[index];
        let step = (asset.cents / 200).max(1);
        asset.cents = (asset.cents + self.rng.random_range(-step..=step)).max(1);

        let snapshot = AssetSnapshot {
            id: (!drop_id).then_some(asset.id),
            asset_name: asset.name.clone(),
            price: Decimal::new(asset.cents, 2),
            asset_type: asset.asset_type.to_string(),
        };
        self.last = Some(snapshot.clone());
        snapshot
    }

    /// Pause before the next emission.
    pub fn next_delay(&mut self) -> Duration {
        let max = u64::try_from(self.config.max_interval.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(self.rng.random_range(0..=max))
    }

    /// Emit snapshots until cancelled or the channel closes.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<AssetSnapshot>,
        cancel: CancellationToken,
    ) -> FeedSummary {
        let mut summary = FeedSummary::default();
        tracing::info!(assets = self.universe.len(), "Simulated feed started");

        loop {
            let delay = self.next_delay();
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }

            if tx.send(self.next_snapshot()).await.is_err() {
                tracing::debug!("Snapshot channel closed, stopping simulated feed");
                break;
            }
            summary.forwarded += 1;
        }

        tracing::info!(forwarded = summary.forwarded, "Simulated feed stopped");
        summary
    }
}
