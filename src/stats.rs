//! Performance Aggregator
//!
//! Pure statistics over the trade ledger. Operates on completed records
//! only, in ledger (chronological) order — PnL, drawdown and streak
//! accounting all depend on that order, not on when resolutions arrived.

use serde::{Deserialize, Serialize};

use crate::types::{Direction, Horizon, TradeRecord, TradeStatus};

/// How many completed trades feed the recent-trend sparkline
const RECENT_TREND_LEN: usize = 10;

/// Aggregated performance snapshot over the full ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub total_trades: u32,
    pub win_count: u32,
    pub loss_count: u32,
    /// Overall win rate in percent; 0 when no trades completed
    pub win_rate: f64,
    /// Win rate over `direction == up` trades (long side)
    pub long_win_rate: f64,
    /// Win rate over `direction == down` trades (short side)
    pub short_win_rate: f64,
    pub win_rate_5m: f64,
    pub win_rate_10m: f64,
    /// Sum of positive per-trade pnl
    pub total_win_pnl: f64,
    /// Sum of |pnl| over non-positive trades
    pub total_loss_pnl: f64,
    /// Cumulative pnl over the whole ledger
    pub net_pnl: f64,
    /// Running maximum of cumulative pnl
    pub peak_pnl: f64,
    /// Largest peak-to-current decline of cumulative pnl
    pub max_drawdown: f64,
    /// Largest single positive pnl
    pub best_trade: f64,
    /// total_win_pnl / total_loss_pnl; equals total_win_pnl when there are
    /// no losses, keeping an all-winning ledger finite and comparable
    pub profit_factor: f64,
    /// Signed run counter: positive = active win streak, negative = loss
    pub current_streak: i32,
    pub max_win_streak: i32,
    pub max_loss_streak: i32,
    /// Win flags for the last 10 completed trades, chronological
    pub recent_trend: Vec<bool>,
}

impl StatisticsSnapshot {
    /// Compact one-line summary for periodic logging
    pub fn headline(&self) -> String {
        format!(
            "📊 Winrate: {:.0}% ({}/{}) | Net PnL: {:+.1}% | PF: {:.2} | Streak: {:+}",
            self.win_rate,
            self.win_count,
            self.total_trades,
            self.net_pnl,
            self.profit_factor,
            self.current_streak
        )
    }
}

fn rate(wins: u32, total: u32) -> f64 {
    if total > 0 {
        wins as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Compute the statistics snapshot. Pure: never mutates the ledger.
/// Pending records are excluded from every ratio and sum.
pub fn compute_statistics(ledger: &[TradeRecord]) -> StatisticsSnapshot {
    let completed: Vec<&TradeRecord> = ledger.iter().filter(|t| t.is_completed()).collect();

    let mut stats = StatisticsSnapshot {
        total_trades: completed.len() as u32,
        ..Default::default()
    };

    let mut long_total = 0u32;
    let mut long_wins = 0u32;
    let mut short_total = 0u32;
    let mut short_wins = 0u32;
    let mut total_5m = 0u32;
    let mut wins_5m = 0u32;
    let mut total_10m = 0u32;
    let mut wins_10m = 0u32;

    let mut running_pnl = 0.0f64;
    let mut streak = 0i32;

    for trade in &completed {
        let won = trade.status == TradeStatus::Win;
        if won {
            stats.win_count += 1;
        } else {
            stats.loss_count += 1;
        }

        match trade.direction {
            Direction::Up => {
                long_total += 1;
                long_wins += won as u32;
            }
            Direction::Down => {
                short_total += 1;
                short_wins += won as u32;
            }
        }
        match trade.horizon {
            Horizon::Min5 => {
                total_5m += 1;
                wins_5m += won as u32;
            }
            Horizon::Min10 => {
                total_10m += 1;
                wins_10m += won as u32;
            }
        }

        // Single forward pass: PnL, peak/drawdown and streaks together.
        let pnl = trade.simulated_pnl_pct();
        running_pnl += pnl;
        if running_pnl > stats.peak_pnl {
            stats.peak_pnl = running_pnl;
        }
        let drawdown = stats.peak_pnl - running_pnl;
        if drawdown > stats.max_drawdown {
            stats.max_drawdown = drawdown;
        }

        if pnl > 0.0 {
            stats.total_win_pnl += pnl;
            if pnl > stats.best_trade {
                stats.best_trade = pnl;
            }
            streak = if streak >= 0 { streak + 1 } else { 1 };
            if streak > stats.max_win_streak {
                stats.max_win_streak = streak;
            }
        } else {
            stats.total_loss_pnl += pnl.abs();
            streak = if streak <= 0 { streak - 1 } else { -1 };
            if streak.abs() > stats.max_loss_streak {
                stats.max_loss_streak = streak.abs();
            }
        }
    }

    stats.win_rate = rate(stats.win_count, stats.total_trades);
    stats.long_win_rate = rate(long_wins, long_total);
    stats.short_win_rate = rate(short_wins, short_total);
    stats.win_rate_5m = rate(wins_5m, total_5m);
    stats.win_rate_10m = rate(wins_10m, total_10m);

    stats.profit_factor = if stats.total_loss_pnl == 0.0 {
        stats.total_win_pnl
    } else {
        stats.total_win_pnl / stats.total_loss_pnl
    };

    stats.net_pnl = running_pnl;
    stats.current_streak = streak;
    stats.recent_trend = completed
        .iter()
        .rev()
        .take(RECENT_TREND_LEN)
        .rev()
        .map(|t| t.status == TradeStatus::Win)
        .collect();

    stats
}
