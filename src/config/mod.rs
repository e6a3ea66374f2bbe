//! Configuration management for CvdScope
//!
//! Loads from optional config files + environment variables via .env.
//! All options are fixed at startup; invalid values are fatal at startup
//! and never surface at runtime.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub engine: EngineConfig,
    pub aggregator: AggregatorConfig,
    pub server: ServerConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Coin to subscribe to (e.g. "BTC")
    pub coin: String,
    /// Trade source websocket URL
    pub ws_url: String,
    /// Fixed reconnect backoff in seconds
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Candle bucket width in seconds
    pub interval_secs: u64,
    /// Backward shift applied to CVD candle timestamps in seconds
    pub shift_sec: u64,
    /// Efficiency-ratio threshold for +-3 signals
    pub ratio_strong: f64,
    /// Efficiency-ratio threshold for +-1 signals
    pub ratio_weak: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    /// Recompute cadence in seconds
    pub tick_secs: u64,
    /// Sliding-window retention age for buffered trades in seconds
    pub retention_max_age_secs: u64,
    /// Run retention pruning every N aggregation ticks
    pub retention_check_ticks: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address, e.g. "0.0.0.0:8000"
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory for session CSV files
    pub data_dir: String,
    /// Enable CSV logging
    pub csv_enabled: bool,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Feed defaults
            .set_default("feed.coin", "BTC")?
            .set_default("feed.ws_url", "wss://api.hyperliquid.xyz/ws")?
            .set_default("feed.reconnect_delay_secs", 5)?
            // Engine defaults
            .set_default("engine.interval_secs", 180)?
            .set_default("engine.shift_sec", 30)?
            .set_default("engine.ratio_strong", 1.5)?
            .set_default("engine.ratio_weak", 0.5)?
            // Aggregator defaults
            .set_default("aggregator.tick_secs", 5)?
            .set_default("aggregator.retention_max_age_secs", 86_400)?
            .set_default("aggregator.retention_check_ticks", 24)?
            // Server defaults
            .set_default("server.bind", "0.0.0.0:8000")?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            .set_default("persistence.csv_enabled", true)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (CVDSCOPE_*)
            .add_source(Environment::with_prefix("CVDSCOPE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Validate option values; any violation is fatal at startup
    pub fn validate(&self) -> Result<()> {
        if self.feed.coin.trim().is_empty() {
            bail!("feed.coin must not be empty");
        }
        if self.feed.ws_url.trim().is_empty() {
            bail!("feed.ws_url must not be empty");
        }
        if self.engine.interval_secs == 0 {
            bail!("engine.interval_secs must be positive");
        }
        if !self.engine.ratio_strong.is_finite() || !self.engine.ratio_weak.is_finite() {
            bail!("ratio thresholds must be finite");
        }
        if self.engine.ratio_weak < 0.0 {
            bail!("engine.ratio_weak must be non-negative");
        }
        if self.engine.ratio_strong <= self.engine.ratio_weak {
            bail!(
                "engine.ratio_strong ({}) must exceed engine.ratio_weak ({})",
                self.engine.ratio_strong,
                self.engine.ratio_weak
            );
        }
        if self.aggregator.tick_secs == 0 {
            bail!("aggregator.tick_secs must be positive");
        }
        if self.aggregator.retention_max_age_secs == 0 {
            bail!("aggregator.retention_max_age_secs must be positive");
        }
        if self.aggregator.retention_check_ticks == 0 {
            bail!("aggregator.retention_check_ticks must be positive");
        }
        Ok(())
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "coin={} interval={}s shift={}s strong={:.2} weak={:.2} tick={}s retention={}s",
            self.feed.coin,
            self.engine.interval_secs,
            self.engine.shift_sec,
            self.engine.ratio_strong,
            self.engine.ratio_weak,
            self.aggregator.tick_secs,
            self.aggregator.retention_max_age_secs
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
