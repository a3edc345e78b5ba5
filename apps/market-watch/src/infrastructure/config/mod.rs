//! Configuration Module
//!
//! Configuration loading for the market watch board.

mod settings;

pub use settings::{
    ConfigError, FeedSettings, MarketWatchConfig, PipelineSettings, RenderSettings,
    ServerSettings,
};
