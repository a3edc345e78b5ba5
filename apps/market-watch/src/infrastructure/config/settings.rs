//! Market Watch Configuration Settings
//!
//! Configuration types for the board, loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::application::services::{BoardOptions, DebounceConfig, IngestorConfig};

/// Timing and channel sizing for the update pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Batching window of the ingestor.
    pub batch_window: Duration,
    /// Quiet period of the filter debouncer.
    pub debounce: Duration,
    /// Capacity of the producer snapshot channel.
    pub snapshot_capacity: usize,
    /// Capacity of the UI input channels.
    pub input_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_window: Duration::from_millis(100),
            debounce: Duration::from_millis(300),
            snapshot_capacity: 4096,
            input_capacity: 256,
        }
    }
}

impl From<&PipelineSettings> for BoardOptions {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            ingestor: IngestorConfig {
                window: settings.batch_window,
            },
            debounce: DebounceConfig {
                quiet_period: settings.debounce,
            },
            snapshot_capacity: settings.snapshot_capacity,
            input_capacity: settings.input_capacity,
        }
    }
}

/// Where snapshots come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSettings {
    /// Random-walk simulator.
    Simulated {
        /// Number of distinct assets.
        assets: usize,
        /// Upper bound of the pause between snapshots.
        max_interval: Duration,
        /// Fixed RNG seed, entropy when absent.
        seed: Option<u64>,
    },
    /// Newline-delimited JSON file.
    JsonLines {
        /// Path to read.
        path: PathBuf,
    },
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self::Simulated {
            assets: 24,
            max_interval: Duration::from_millis(25),
            seed: None,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Health check HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Console renderer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// Rows drawn per refresh.
    pub rows: usize,
    /// Minimum time between refreshes.
    pub interval: Duration,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            rows: 20,
            interval: Duration::from_secs(1),
        }
    }
}

/// Complete market watch configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketWatchConfig {
    /// Pipeline timing.
    pub pipeline: PipelineSettings,
    /// Snapshot source.
    pub feed: FeedSettings,
    /// File holding persisted favorites.
    pub favorites_path: PathBuf,
    /// Server port settings.
    pub server: ServerSettings,
    /// Console renderer settings.
    pub render: RenderSettings,
}

impl Default for MarketWatchConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineSettings::default(),
            feed: FeedSettings::default(),
            favorites_path: PathBuf::from("market-watch.json"),
            server: ServerSettings::default(),
            render: RenderSettings::default(),
        }
    }
}

impl MarketWatchConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed, or if the batch window
    /// or debounce period is zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);
        let defaults = Self::default();

        let pipeline = PipelineSettings {
            batch_window: env.nonzero_millis(
                "MARKET_WATCH_BATCH_WINDOW_MS",
                defaults.pipeline.batch_window,
            )?,
            debounce: env.nonzero_millis("MARKET_WATCH_DEBOUNCE_MS", defaults.pipeline.debounce)?,
            snapshot_capacity: env.nonzero(
                "MARKET_WATCH_SNAPSHOT_CAPACITY",
                defaults.pipeline.snapshot_capacity,
            )?,
            input_capacity: env.nonzero(
                "MARKET_WATCH_INPUT_CAPACITY",
                defaults.pipeline.input_capacity,
            )?,
        };

        let feed = match env.string("MARKET_WATCH_FEED_PATH") {
            Some(path) => FeedSettings::JsonLines {
                path: PathBuf::from(path),
            },
            None => FeedSettings::Simulated {
                assets: env.nonzero("MARKET_WATCH_SIM_ASSETS", 24)?,
                max_interval: env.millis(
                    "MARKET_WATCH_SIM_MAX_INTERVAL_MS",
                    Duration::from_millis(25),
                )?,
                seed: env.optional("MARKET_WATCH_SIM_SEED")?,
            },
        };

        let favorites_path = env
            .string("MARKET_WATCH_FAVORITES_PATH")
            .map_or(defaults.favorites_path, PathBuf::from);

        let server = ServerSettings {
            health_port: env.parse("MARKET_WATCH_HEALTH_PORT", defaults.server.health_port)?,
        };

        let render = RenderSettings {
            rows: env.parse("MARKET_WATCH_RENDER_ROWS", defaults.render.rows)?,
            interval: env.nonzero_millis(
                "MARKET_WATCH_RENDER_INTERVAL_MS",
                defaults.render.interval,
            )?,
        };

        Ok(Self {
            pipeline,
            feed,
            favorites_path,
            server,
            render,
        })
    }
}

/// Configuration error.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable could not be parsed.
    #[error("environment variable {key} has invalid value {value:?}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
    /// Environment variable must be greater than zero.
    #[error("environment variable {0} must be greater than zero")]
    Zero(String),
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-blank trimmed value.
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn optional<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.string(key)
            .map(|value| {
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value,
                })
            })
            .transpose()
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.optional(key)?.unwrap_or(default))
    }

    fn nonzero(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        match self.parse(key, default)? {
            0 => Err(ConfigError::Zero(key.to_string())),
            n => Ok(n),
        }
    }

    fn millis(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        Ok(self
            .optional::<u64>(key)?
            .map_or(default, Duration::from_millis))
    }

    fn nonzero_millis(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let duration = self.millis(key, default)?;
        if duration.is_zero() {
            return Err(ConfigError::Zero(key.to_string()));
        }
        Ok(duration)
    }
}
