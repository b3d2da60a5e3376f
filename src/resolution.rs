//! Resolution Engine
//!
//! Time-driven win/loss settlement for pending trades. Given a price
//! observation for one symbol, every pending record of that symbol whose
//! horizon has elapsed transitions to a terminal state exactly once.
//!
//! Two independent timers (market refresh and heartbeat) both drive this
//! path with overlapping inputs; the ledger's pending-only guard makes the
//! redundant invocations safe. That idempotency is a hard invariant and is
//! pinned down in the tests below.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::ledger::Ledger;
use crate::types::{Direction, Symbol, TradeStatus};

/// Outcome rule. Strict inequality is required for a win; a final price
/// equal to the entry price is a loss in both directions (deliberate
/// tie-break, not an oversight).
pub fn outcome(direction: Direction, entry_price: f64, current_price: f64) -> TradeStatus {
    let won = match direction {
        Direction::Up => current_price > entry_price,
        Direction::Down => current_price < entry_price,
    };
    if won {
        TradeStatus::Win
    } else {
        TradeStatus::Loss
    }
}

pub struct ResolutionEngine {
    ledger: Arc<Ledger>,
}

impl ResolutionEngine {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Resolve every eligible pending trade for `symbol` against the
    /// observed `current_price` at time `now`. Records for other symbols
    /// are left untouched even past expiry; they advance only when their
    /// own symbol is observed. Returns the number of trades resolved.
    pub fn resolve_pending(&self, symbol: Symbol, current_price: f64, now: i64) -> Result<usize> {
        if current_price <= 0.0 {
            // Upstream returned nothing useful; "no observation this cycle",
            // never a price of zero.
            warn!(symbol = %symbol, "Skipping resolution cycle without a valid price");
            return Ok(0);
        }

        let mut resolved = 0usize;
        for trade in self.ledger.snapshot() {
            if trade.symbol != symbol || trade.status.is_terminal() || now < trade.end_time {
                continue;
            }

            let status = outcome(trade.direction, trade.entry_price, current_price);
            // The pending-only guard inside resolve absorbs the race where
            // another timer settled this record between snapshot and here.
            if self.ledger.resolve(&trade.id, status, current_price)? {
                resolved += 1;
                info!(
                    id = %trade.id,
                    symbol = %symbol,
                    direction = %trade.direction,
                    horizon = %trade.horizon,
                    entry_price = trade.entry_price,
                    final_price = current_price,
                    result = %status,
                    "Trade resolved"
                );
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{Horizon, TradeRecord};

    fn pending(ts: i64, symbol: Symbol, horizon: Horizon, direction: Direction) -> TradeRecord {
        TradeRecord {
            id: TradeRecord::make_id(ts, symbol, horizon),
            timestamp: ts,
            symbol,
            horizon,
            direction,
            entry_price: 100.0,
            target_price: 101.0,
            end_time: ts + horizon.duration_ms(),
            status: TradeStatus::Pending,
            final_price: None,
        }
    }

    fn engine_with(trades: Vec<TradeRecord>) -> (ResolutionEngine, Arc<Ledger>) {
        let ledger = Arc::new(Ledger::load(Arc::new(MemoryStore::new())));
        ledger.append(trades).unwrap();
        (ResolutionEngine::new(ledger.clone()), ledger)
    }

    #[test]
    fn outcome_rule_examples() {
        assert_eq!(outcome(Direction::Up, 100.0, 101.0), TradeStatus::Win);
        assert_eq!(outcome(Direction::Up, 100.0, 100.0), TradeStatus::Loss);
        assert_eq!(outcome(Direction::Up, 100.0, 99.0), TradeStatus::Loss);
        assert_eq!(outcome(Direction::Down, 100.0, 99.0), TradeStatus::Win);
        assert_eq!(outcome(Direction::Down, 100.0, 100.0), TradeStatus::Loss);
        assert_eq!(outcome(Direction::Down, 100.0, 101.0), TradeStatus::Loss);
    }

    #[test]
    fn unexpired_trades_are_not_touched() {
        let (engine, ledger) =
            engine_with(vec![pending(1_000, Symbol::ETH, Horizon::Min5, Direction::Up)]);

        // One millisecond before expiry.
        let resolved = engine
            .resolve_pending(Symbol::ETH, 105.0, 1_000 + 300_000 - 1)
            .unwrap();
        assert_eq!(resolved, 0);
        assert_eq!(ledger.snapshot()[0].status, TradeStatus::Pending);
    }

    #[test]
    fn expired_trades_resolve_with_final_price() {
        let (engine, ledger) = engine_with(vec![
            pending(1_000, Symbol::ETH, Horizon::Min5, Direction::Up),
            pending(1_000, Symbol::ETH, Horizon::Min10, Direction::Down),
        ]);

        // 5m expired and wins; 10m not yet expired.
        let resolved = engine
            .resolve_pending(Symbol::ETH, 105.0, 1_000 + 300_000)
            .unwrap();
        assert_eq!(resolved, 1);

        let trades = ledger.snapshot();
        assert_eq!(trades[0].status, TradeStatus::Win);
        assert_eq!(trades[0].final_price, Some(105.0));
        assert_eq!(trades[1].status, TradeStatus::Pending);

        // Later pass settles the 10m leg; price moved under entry, Down wins.
        let resolved = engine
            .resolve_pending(Symbol::ETH, 95.0, 1_000 + 600_000)
            .unwrap();
        assert_eq!(resolved, 1);
        assert_eq!(ledger.snapshot()[1].status, TradeStatus::Win);
    }

    #[test]
    fn other_symbols_stay_pending_past_expiry() {
        let (engine, ledger) =
            engine_with(vec![pending(1_000, Symbol::BTC, Horizon::Min5, Direction::Up)]);

        let resolved = engine
            .resolve_pending(Symbol::ETH, 105.0, 10_000_000)
            .unwrap();
        assert_eq!(resolved, 0);
        assert_eq!(ledger.snapshot()[0].status, TradeStatus::Pending);
    }

    #[test]
    fn repeated_resolution_is_idempotent() {
        let (engine, ledger) =
            engine_with(vec![pending(1_000, Symbol::ETH, Horizon::Min5, Direction::Up)]);
        let now = 1_000 + 300_000;

        assert_eq!(engine.resolve_pending(Symbol::ETH, 105.0, now).unwrap(), 1);
        let after_first = ledger.snapshot();

        // Same call again, and a later call with a different price: no-ops.
        assert_eq!(engine.resolve_pending(Symbol::ETH, 105.0, now).unwrap(), 0);
        assert_eq!(
            engine
                .resolve_pending(Symbol::ETH, 42.0, now + 60_000)
                .unwrap(),
            0
        );

        let after_third = ledger.snapshot();
        assert_eq!(after_first[0].status, after_third[0].status);
        assert_eq!(after_first[0].final_price, after_third[0].final_price);
    }

    #[test]
    fn equality_at_expiry_is_a_loss_both_ways() {
        let (engine, ledger) = engine_with(vec![
            pending(1_000, Symbol::ETH, Horizon::Min5, Direction::Up),
            pending(2_000, Symbol::ETH, Horizon::Min5, Direction::Down),
        ]);

        engine
            .resolve_pending(Symbol::ETH, 100.0, 2_000 + 300_000)
            .unwrap();
        for trade in ledger.snapshot() {
            assert_eq!(trade.status, TradeStatus::Loss);
        }
    }

    #[test]
    fn zero_price_observation_is_skipped() {
        let (engine, ledger) =
            engine_with(vec![pending(1_000, Symbol::ETH, Horizon::Min5, Direction::Down)]);
        let resolved = engine.resolve_pending(Symbol::ETH, 0.0, 10_000_000).unwrap();
        assert_eq!(resolved, 0);
        assert_eq!(ledger.snapshot()[0].status, TradeStatus::Pending);
    }
}
