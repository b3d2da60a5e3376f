//! SignalTrack entrypoint
//!
//! Wires the store, ledger, ingestion and resolution together and hands
//! them to the driver loops.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use signaltrack::config::AppConfig;
use signaltrack::driver::{self, PriceCache};
use signaltrack::ingest::Ingestor;
use signaltrack::ledger::Ledger;
use signaltrack::market::{BinanceClient, MarketData};
use signaltrack::predictor::{GeminiPredictor, Predictor};
use signaltrack::resolution::ResolutionEngine;
use signaltrack::store::{BlobStore, FileStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    config.validate_env()?;
    info!("🚀 SignalTrack starting | {}", config.digest());

    let store: Arc<dyn BlobStore> = Arc::new(FileStore::new(&config.persistence.data_dir)?);
    let ledger = Arc::new(Ledger::load(store.clone()));
    info!("Ledger loaded: {} records", ledger.len());

    let ingestor = Arc::new(Ingestor::new(ledger.clone(), store.clone()));
    if let Some(analysis) = ingestor.load_analysis() {
        info!(
            symbol = %analysis.symbol,
            timestamp = analysis.timestamp,
            "Restored last analysis from store"
        );
    }
    let resolver = Arc::new(ResolutionEngine::new(ledger.clone()));
    let market: Arc<dyn MarketData> = Arc::new(BinanceClient::new(&config.market)?);
    let predictor: Arc<dyn Predictor> = Arc::new(GeminiPredictor::new(&config.predictor)?);

    let symbols = config.symbols();
    let prices: PriceCache = Arc::new(RwLock::new(HashMap::new()));

    tokio::spawn(driver::market_loop(
        market.clone(),
        resolver.clone(),
        prices.clone(),
        symbols.clone(),
        config.bot.market_refresh_secs,
    ));
    tokio::spawn(driver::heartbeat_loop(
        resolver.clone(),
        prices.clone(),
        config.bot.heartbeat_secs,
    ));
    if config.bot.analysis_interval_secs > 0 {
        tokio::spawn(driver::analysis_loop(
            market.clone(),
            predictor.clone(),
            ingestor.clone(),
            symbols.clone(),
            config.bot.analysis_interval_secs,
        ));
    }
    tokio::spawn(driver::stats_loop(
        ledger.clone(),
        config.bot.stats_log_secs,
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");
    Ok(())
}
