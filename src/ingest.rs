//! Signal Ingestion
//!
//! Turns one prediction response plus the price/time snapshot it was
//! computed against into exactly two pending trade records (one per
//! horizon), or into nothing at all. A missing or flat direction on either
//! horizon degrades the whole prediction: no partial spawn is permitted.

use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::ledger::Ledger;
use crate::store::BlobStore;
use crate::types::{Analysis, AnalysisResponse, Direction, Horizon, Symbol, TradeRecord, TradeStatus};

/// Store key for the latest enriched analysis
pub const ANALYSIS_KEY: &str = "current_analysis";

/// Why a prediction event produced zero trade records
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RejectReason {
    #[error("{0} forecast direction missing or flat")]
    DegenerateDirection(Horizon),
    #[error("non-positive snapshot price")]
    BadSnapshotPrice,
    #[error("duplicate prediction event")]
    DuplicateEvent,
}

pub struct Ingestor {
    ledger: Arc<Ledger>,
    store: Arc<dyn BlobStore>,
}

impl Ingestor {
    pub fn new(ledger: Arc<Ledger>, store: Arc<dyn BlobStore>) -> Self {
        Self { ledger, store }
    }

    /// Ingest one prediction event. Returns the enriched analysis when the
    /// event was accepted and both trades were appended; `None` when the
    /// whole event was discarded (reason logged, never fatal).
    pub fn ingest(
        &self,
        response: AnalysisResponse,
        symbol: Symbol,
        snapshot_price: f64,
        snapshot_time: i64,
    ) -> Result<Option<Analysis>> {
        let analysis = response.enrich(symbol, snapshot_price, snapshot_time);

        match self.validate(&analysis) {
            Ok(directions) => {
                let trades = Self::spawn_trades(&analysis, &directions);
                match self.ledger.append(trades) {
                    Ok(true) => {}
                    Ok(false) => {
                        // Deterministic ids collide only when the same
                        // prediction event is replayed; drop the replay.
                        warn!(
                            symbol = %symbol,
                            timestamp = snapshot_time,
                            reason = %RejectReason::DuplicateEvent,
                            "Prediction event discarded"
                        );
                        return Ok(None);
                    }
                    // Persist failure is an I/O problem, not a bad
                    // prediction; surface it to the driver.
                    Err(e) => return Err(e.context("Failed to persist spawned trades")),
                }

                self.persist_analysis(&analysis)?;
                info!(
                    symbol = %symbol,
                    entry_price = snapshot_price,
                    dir_5m = %directions[0],
                    dir_10m = %directions[1],
                    "Prediction accepted, 2 pending trades spawned"
                );
                Ok(Some(analysis))
            }
            Err(reason) => {
                warn!(symbol = %symbol, reason = %reason, "Prediction event discarded");
                Ok(None)
            }
        }
    }

    /// Both-or-nothing gate: every horizon must carry a strict up/down call.
    fn validate(&self, analysis: &Analysis) -> Result<[Direction; 2], RejectReason> {
        if analysis.initial_price <= 0.0 {
            return Err(RejectReason::BadSnapshotPrice);
        }

        let mut directions = [Direction::Up; 2];
        for (i, horizon) in Horizon::ALL.iter().enumerate() {
            directions[i] = analysis
                .forecast(*horizon)
                .direction
                .and_then(|d| d.as_trade_direction())
                .ok_or(RejectReason::DegenerateDirection(*horizon))?;
        }
        Ok(directions)
    }

    fn spawn_trades(analysis: &Analysis, directions: &[Direction; 2]) -> Vec<TradeRecord> {
        Horizon::ALL
            .iter()
            .zip(directions.iter())
            .map(|(&horizon, &direction)| TradeRecord {
                id: TradeRecord::make_id(analysis.timestamp, analysis.symbol, horizon),
                timestamp: analysis.timestamp,
                symbol: analysis.symbol,
                horizon,
                direction,
                entry_price: analysis.initial_price,
                target_price: analysis.forecast(horizon).price_target,
                end_time: analysis.timestamp + horizon.duration_ms(),
                status: TradeStatus::Pending,
                final_price: None,
            })
            .collect()
    }

    fn persist_analysis(&self, analysis: &Analysis) -> Result<()> {
        let blob = serde_json::to_string_pretty(analysis)?;
        self.store.set(ANALYSIS_KEY, &blob)?;
        Ok(())
    }

    /// Latest persisted analysis, if any; unparseable blobs degrade to None
    pub fn load_analysis(&self) -> Option<Analysis> {
        let blob = self.store.get(ANALYSIS_KEY)?;
        match serde_json::from_str(&blob) {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!(error = %e, "Corrupt analysis blob, ignoring");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{TrendDirection, TrendForecast};

    fn forecast(direction: Option<TrendDirection>, target: f64) -> TrendForecast {
        TrendForecast {
            direction,
            price_target: target,
            confidence: 0.7,
            reasoning: String::new(),
        }
    }

    fn response(dir_5m: Option<TrendDirection>, dir_10m: Option<TrendDirection>) -> AnalysisResponse {
        AnalysisResponse {
            action_signal: "BUY".to_string(),
            trend_5m: forecast(dir_5m, 101.0),
            trend_10m: forecast(dir_10m, 102.0),
            dimensions: Vec::new(),
            similarity: Default::default(),
            summary: String::new(),
        }
    }

    fn ingestor() -> (Ingestor, Arc<Ledger>) {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let ledger = Arc::new(Ledger::load(store.clone()));
        (Ingestor::new(ledger.clone(), store), ledger)
    }

    #[test]
    fn acceptance_spawns_exactly_two_trades_sharing_the_snapshot() {
        let (ingestor, ledger) = ingestor();
        let analysis = ingestor
            .ingest(
                response(Some(TrendDirection::Up), Some(TrendDirection::Down)),
                Symbol::ETH,
                2500.0,
                1_000_000,
            )
            .unwrap();
        assert!(analysis.is_some());

        let trades = ledger.snapshot();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].horizon, Horizon::Min5);
        assert_eq!(trades[0].direction, Direction::Up);
        assert_eq!(trades[0].end_time, 1_000_000 + 300_000);
        assert_eq!(trades[1].horizon, Horizon::Min10);
        assert_eq!(trades[1].direction, Direction::Down);
        assert_eq!(trades[1].end_time, 1_000_000 + 600_000);
        for trade in &trades {
            assert_eq!(trade.timestamp, 1_000_000);
            assert_eq!(trade.symbol, Symbol::ETH);
            assert_eq!(trade.entry_price, 2500.0);
            assert_eq!(trade.status, TradeStatus::Pending);
        }
    }

    #[test]
    fn missing_ten_minute_direction_appends_zero_records() {
        let (ingestor, ledger) = ingestor();
        let analysis = ingestor
            .ingest(
                response(Some(TrendDirection::Up), None),
                Symbol::ETH,
                2500.0,
                1_000_000,
            )
            .unwrap();
        assert!(analysis.is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn flat_direction_degrades_the_whole_prediction() {
        let (ingestor, ledger) = ingestor();
        let analysis = ingestor
            .ingest(
                response(Some(TrendDirection::Flat), Some(TrendDirection::Down)),
                Symbol::BTC,
                64_000.0,
                1_000_000,
            )
            .unwrap();
        assert!(analysis.is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn replayed_prediction_event_does_not_double_spawn() {
        let (ingestor, ledger) = ingestor();
        let make = || response(Some(TrendDirection::Up), Some(TrendDirection::Up));

        assert!(ingestor
            .ingest(make(), Symbol::ETH, 2500.0, 1_000_000)
            .unwrap()
            .is_some());
        assert!(ingestor
            .ingest(make(), Symbol::ETH, 2500.0, 1_000_000)
            .unwrap()
            .is_none());
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn same_millisecond_predictions_for_different_symbols_both_spawn() {
        let (ingestor, ledger) = ingestor();
        let make = || response(Some(TrendDirection::Up), Some(TrendDirection::Up));

        assert!(ingestor
            .ingest(make(), Symbol::ETH, 2500.0, 1_000_000)
            .unwrap()
            .is_some());
        assert!(ingestor
            .ingest(make(), Symbol::BTC, 64_000.0, 1_000_000)
            .unwrap()
            .is_some());

        let trades = ledger.snapshot();
        assert_eq!(trades.len(), 4);
        assert_eq!(trades[0].id, "1000000-ETH-5m");
        assert_eq!(trades[2].id, "1000000-BTC-5m");
    }

    #[test]
    fn persist_failure_surfaces_as_an_error_not_a_discard() {
        struct FailingStore;
        impl crate::store::BlobStore for FailingStore {
            fn get(&self, _key: &str) -> Option<String> {
                None
            }
            fn set(&self, _key: &str, _blob: &str) -> Result<()> {
                anyhow::bail!("disk full")
            }
        }

        let store = Arc::new(FailingStore);
        let ledger = Arc::new(Ledger::load(store.clone()));
        let ingestor = Ingestor::new(ledger.clone(), store);

        let result = ingestor.ingest(
            response(Some(TrendDirection::Up), Some(TrendDirection::Up)),
            Symbol::ETH,
            2500.0,
            1_000_000,
        );
        assert!(result.is_err());
        // The failed batch did not stick in memory either.
        assert!(ledger.is_empty());
    }

    #[test]
    fn non_positive_snapshot_price_is_rejected() {
        let (ingestor, ledger) = ingestor();
        let analysis = ingestor
            .ingest(
                response(Some(TrendDirection::Up), Some(TrendDirection::Up)),
                Symbol::ETH,
                0.0,
                1_000_000,
            )
            .unwrap();
        assert!(analysis.is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn accepted_analysis_round_trips_through_the_store() {
        let (ingestor, _ledger) = ingestor();
        ingestor
            .ingest(
                response(Some(TrendDirection::Up), Some(TrendDirection::Down)),
                Symbol::XRP,
                0.55,
                1_000_000,
            )
            .unwrap();

        let loaded = ingestor.load_analysis().expect("analysis persisted");
        assert_eq!(loaded.symbol, Symbol::XRP);
        assert_eq!(loaded.initial_price, 0.55);
        assert_eq!(loaded.timestamp, 1_000_000);
    }
}
