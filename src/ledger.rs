//! Trade Ledger
//!
//! Sole owner of the trade history. Append-only record arena plus an
//! id index for O(1) lookup during resolution; every mutation is written
//! through to the durable store as one full JSON blob. All other
//! components only ever see cloned snapshots.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::store::BlobStore;
use crate::types::{TradeRecord, TradeStatus};

/// Store key for the serialized trade history
pub const LEDGER_KEY: &str = "trade_history";

struct LedgerState {
    /// Insertion order = chronological creation order. Load-bearing for
    /// PnL/drawdown/streak accounting downstream.
    records: Vec<TradeRecord>,
    /// id -> position in `records`
    index: HashMap<String, usize>,
}

pub struct Ledger {
    store: Arc<dyn BlobStore>,
    state: RwLock<LedgerState>,
}

impl Ledger {
    /// Initialize from the durable store. An absent or unparseable blob
    /// resets to an empty ledger; startup never fails on bad state.
    pub fn load(store: Arc<dyn BlobStore>) -> Self {
        let records: Vec<TradeRecord> = match store.get(LEDGER_KEY) {
            Some(blob) => match serde_json::from_str(&blob) {
                Ok(records) => records,
                Err(e) => {
                    warn!(error = %e, "Corrupt trade history blob, resetting to empty ledger");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if index.insert(record.id.clone(), i).is_some() {
                warn!(id = %record.id, "Duplicate trade id in persisted ledger, keeping latest");
            }
        }

        let pending = records.iter().filter(|r| !r.is_completed()).count();
        info!(
            trades = records.len(),
            pending, "💾 Trade ledger loaded"
        );

        Self {
            store,
            state: RwLock::new(LedgerState { records, index }),
        }
    }

    /// Append a batch of new records as one atomic operation: either every
    /// record lands (and the ledger is persisted) or none do. Returns
    /// `Ok(false)` when any id already exists (the whole batch is refused);
    /// a persist failure rolls the batch back out of memory and errors, so
    /// memory and store never diverge.
    pub fn append(&self, records: Vec<TradeRecord>) -> Result<bool> {
        if records.is_empty() {
            return Ok(true);
        }

        let mut state = self.state.write().expect("ledger lock poisoned");

        for record in &records {
            if state.index.contains_key(&record.id) {
                warn!(id = %record.id, "Trade id already present, rejecting batch");
                return Ok(false);
            }
        }

        let base = state.records.len();
        for record in records {
            let pos = state.records.len();
            state.index.insert(record.id.clone(), pos);
            state.records.push(record);
        }

        if let Err(e) = self.persist(&state.records) {
            let rolled_back: Vec<String> = state.records.drain(base..).map(|r| r.id).collect();
            for id in &rolled_back {
                state.index.remove(id);
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Transition one record to a terminal state. Internal: only the
    /// resolution engine calls this. No-op (returning `false`) when the
    /// record is unknown or already resolved, which is what makes repeated
    /// resolution passes safe.
    pub fn resolve(&self, id: &str, status: TradeStatus, final_price: f64) -> Result<bool> {
        if !status.is_terminal() {
            anyhow::bail!("resolve called with non-terminal status {}", status);
        }

        let mut state = self.state.write().expect("ledger lock poisoned");

        let Some(&pos) = state.index.get(id) else {
            warn!(id, "Resolve requested for unknown trade id");
            return Ok(false);
        };

        {
            let record = &mut state.records[pos];
            if record.status.is_terminal() {
                return Ok(false);
            }
            record.status = status;
            record.final_price = Some(final_price);
        }

        self.persist(&state.records)?;
        Ok(true)
    }

    /// Full ordered copy of the ledger for aggregation and display
    pub fn snapshot(&self) -> Vec<TradeRecord> {
        self.state
            .read()
            .expect("ledger lock poisoned")
            .records
            .clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().expect("ledger lock poisoned").records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, records: &[TradeRecord]) -> Result<()> {
        let blob = serde_json::to_string_pretty(records)
            .context("Failed to serialize trade history")?;
        self.store
            .set(LEDGER_KEY, &blob)
            .context("Failed to persist trade history")
    }
}
