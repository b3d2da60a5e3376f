//! Configuration management for SignalTrack
//!
//! Defaults in code, optional config file, environment overrides via .env

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::types::Symbol;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub market: MarketConfig,
    pub predictor: PredictorConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Version tag for logging
    pub tag: String,
    /// Symbols to track (BTC, ETH, XRP)
    pub symbols: Vec<String>,
    /// Market refresh interval in seconds
    pub market_refresh_secs: u64,
    /// Lifecycle heartbeat interval in seconds
    pub heartbeat_secs: u64,
    /// Automatic analysis interval in seconds (0 disables)
    pub analysis_interval_secs: u64,
    /// Stats headline log interval in seconds
    pub stats_log_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Binance REST base URL
    pub base_url: String,
    /// Candle interval for analysis input
    pub kline_interval: String,
    /// Candles fetched per analysis
    pub kline_limit: u32,
    /// HTTP timeout in milliseconds
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictorConfig {
    /// Gemini model identifier
    pub model: String,
    /// API base URL
    pub base_url: String,
    /// Candles included in the prompt window
    pub prompt_candles: usize,
    /// HTTP timeout in milliseconds
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory for state blobs
    pub data_dir: String,
}

impl AppConfig {
    /// Load configuration from defaults, optional file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Bot defaults
            .set_default("bot.tag", env!("CARGO_PKG_VERSION"))?
            .set_default("bot.symbols", vec!["BTC", "ETH", "XRP"])?
            .set_default("bot.market_refresh_secs", 5)?
            .set_default("bot.heartbeat_secs", 1)?
            .set_default("bot.analysis_interval_secs", 300)?
            .set_default("bot.stats_log_secs", 60)?
            // Market defaults
            .set_default("market.base_url", "https://api.binance.com")?
            .set_default("market.kline_interval", "1m")?
            .set_default("market.kline_limit", 50)?
            .set_default("market.timeout_ms", 10_000)?
            // Predictor defaults
            .set_default("predictor.model", "gemini-2.5-flash")?
            .set_default(
                "predictor.base_url",
                "https://generativelanguage.googleapis.com",
            )?
            .set_default("predictor.prompt_candles", 30)?
            .set_default("predictor.timeout_ms", 30_000)?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (SIGNALTRACK_*)
            .add_source(Environment::with_prefix("SIGNALTRACK").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<()> {
        if self.bot.symbols.is_empty() {
            bail!("bot.symbols must name at least one symbol");
        }
        for raw in &self.bot.symbols {
            if Symbol::from_str(raw).is_none() {
                bail!("Unsupported symbol in bot.symbols: {}", raw);
            }
        }
        if self.bot.market_refresh_secs == 0 || self.bot.heartbeat_secs == 0 {
            bail!("Refresh and heartbeat intervals must be non-zero");
        }
        Ok(())
    }

    /// Parsed symbol list (validated in load)
    pub fn symbols(&self) -> Vec<Symbol> {
        self.bot
            .symbols
            .iter()
            .filter_map(|raw| Symbol::from_str(raw))
            .collect()
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "tag={} symbols={:?} refresh={}s heartbeat={}s model={}",
            self.bot.tag,
            self.bot.symbols,
            self.bot.market_refresh_secs,
            self.bot.heartbeat_secs,
            self.predictor.model
        )
    }

    /// Validate required environment variables
    pub fn validate_env(&self) -> Result<()> {
        if std::env::var("GEMINI_API_KEY").is_err() {
            bail!("Required environment variable GEMINI_API_KEY is not set");
        }
        Ok(())
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
