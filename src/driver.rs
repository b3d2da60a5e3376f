//! Runtime drivers
//!
//! The periodic loops that move the engine: market refresh (fresh prices
//! into resolution), heartbeat (resolution against cached prices, so
//! expiries land on time between refreshes), analysis (new predictions
//! into ingestion) and the stats headline.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::ingest::Ingestor;
use crate::ledger::Ledger;
use crate::market::MarketData;
use crate::predictor::Predictor;
use crate::resolution::ResolutionEngine;
use crate::stats::compute_statistics;
use crate::types::Symbol;

/// Last observed price per symbol, shared between the refresh loop
/// (writer) and the heartbeat (reader)
pub type PriceCache = Arc<RwLock<HashMap<Symbol, f64>>>;

/// Refresh tickers for every tracked symbol and resolve expired trades
/// against the fresh prices. Every symbol is polled each cycle so pending
/// trades cannot outlive their expiry just because attention moved on.
pub async fn market_loop(
    market: Arc<dyn MarketData>,
    resolver: Arc<ResolutionEngine>,
    prices: PriceCache,
    symbols: Vec<Symbol>,
    refresh_secs: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(refresh_secs));
    loop {
        ticker.tick().await;
        for &symbol in &symbols {
            let snapshot = match market.fetch_ticker(symbol).await {
                Ok(Some(t)) => t,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Ticker fetch for {} failed: {:#}", symbol, e);
                    continue;
                }
            };

            prices
                .write()
                .expect("price cache lock poisoned")
                .insert(symbol, snapshot.last_price);

            let now = Utc::now().timestamp_millis();
            if let Err(e) = resolver.resolve_pending(symbol, snapshot.last_price, now) {
                warn!("Resolution for {} failed: {:#}", symbol, e);
            }
        }
    }
}

/// Re-run resolution once a second against cached prices. Resolution is
/// idempotent, so racing the refresh loop is harmless; this only tightens
/// how quickly an expiry is observed.
pub async fn heartbeat_loop(
    resolver: Arc<ResolutionEngine>,
    prices: PriceCache,
    heartbeat_secs: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(heartbeat_secs));
    loop {
        ticker.tick().await;
        let cached: Vec<(Symbol, f64)> = prices
            .read()
            .expect("price cache lock poisoned")
            .iter()
            .map(|(&s, &p)| (s, p))
            .collect();

        let now = Utc::now().timestamp_millis();
        for (symbol, price) in cached {
            if let Err(e) = resolver.resolve_pending(symbol, price, now) {
                warn!("Heartbeat resolution for {} failed: {:#}", symbol, e);
            }
        }
    }
}

/// Request a fresh prediction for each symbol and ingest the resulting
/// trades, once per call.
pub async fn analysis_cycle(
    market: &dyn MarketData,
    predictor: &dyn Predictor,
    ingestor: &Ingestor,
    symbols: &[Symbol],
) {
    for &symbol in symbols {
        let candles = match market.fetch_klines(symbol).await {
            Ok(candles) if !candles.is_empty() => candles,
            Ok(_) => {
                warn!("No candles for {}, skipping analysis cycle", symbol);
                continue;
            }
            Err(e) => {
                warn!("Kline fetch for {} failed: {:#}", symbol, e);
                continue;
            }
        };

        // Price and time form one snapshot, captured before the model call.
        // The model can take many seconds to answer; the trade clock starts
        // at request time, not response time.
        let snapshot_price = candles.last().map(|c| c.close).unwrap_or(0.0);
        let snapshot_time = Utc::now().timestamp_millis();

        let response = match predictor.analyze(symbol, &candles).await {
            Ok(Some(response)) => response,
            Ok(None) => continue,
            Err(e) => {
                warn!("Prediction for {} failed: {:#}", symbol, e);
                continue;
            }
        };

        if let Err(e) = ingestor.ingest(response, symbol, snapshot_price, snapshot_time) {
            warn!("Ingestion for {} failed: {:#}", symbol, e);
        }
    }
}

/// Drive [`analysis_cycle`] on its configured interval
pub async fn analysis_loop(
    market: Arc<dyn MarketData>,
    predictor: Arc<dyn Predictor>,
    ingestor: Arc<Ingestor>,
    symbols: Vec<Symbol>,
    interval_secs: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        analysis_cycle(market.as_ref(), predictor.as_ref(), &ingestor, &symbols).await;
    }
}

/// Periodic performance headline over the full ledger
pub async fn stats_loop(ledger: Arc<Ledger>, stats_log_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(stats_log_secs));
    loop {
        ticker.tick().await;
        let stats = compute_statistics(&ledger.snapshot());
        if stats.total_trades > 0 {
            info!("{}", stats.headline());
        }
    }
}
