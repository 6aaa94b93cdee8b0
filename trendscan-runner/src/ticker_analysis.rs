//! Per-ticker P&L aggregated from the trade log.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use trendscan_core::domain::{TradeAction, TradeLogEntry};

/// Realized P&L of one ticker across all its round trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerStats {
    pub ticker: String,
    pub total_pnl: f64,
    pub trade_count: usize,
}

/// Ticker statistics sorted by total P&L, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerAnalysis {
    stats: Vec<TickerStats>,
}

impl TickerAnalysis {
    /// Aggregate EXIT rows (the only rows carrying P&L) by ticker.
    pub fn analyze(entries: &[TradeLogEntry]) -> Self {
        let mut by_ticker: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for entry in entries.iter().filter(|e| e.action == TradeAction::Exit) {
            let slot = by_ticker.entry(entry.symbol.as_str()).or_default();
            slot.0 += entry.pnl.unwrap_or(0.0);
            slot.1 += 1;
        }
        let mut stats: Vec<TickerStats> = by_ticker
            .into_iter()
            .map(|(ticker, (total_pnl, trade_count))| TickerStats {
                ticker: ticker.to_string(),
                total_pnl,
                trade_count,
            })
            .collect();
        // stable sort keeps ticker order among equal P&L
        stats.sort_by(|a, b| b.total_pnl.total_cmp(&a.total_pnl));
        Self { stats }
    }

    pub fn stats(&self) -> &[TickerStats] {
        &self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn top_winners(&self, n: usize) -> &[TickerStats] {
        &self.stats[..n.min(self.stats.len())]
    }

    /// Worst `n` tickers, worst first.
    pub fn bottom_losers(&self, n: usize) -> Vec<&TickerStats> {
        self.stats.iter().rev().take(n).collect()
    }

    pub fn log_summary(&self, n: usize) {
        if self.stats.is_empty() {
            tracing::info!("no ticker statistics available");
            return;
        }
        for s in self.top_winners(n) {
            tracing::info!(ticker = %s.ticker, pnl = s.total_pnl, trades = s.trade_count, "top winner");
        }
        for s in self.bottom_losers(n) {
            tracing::info!(ticker = %s.ticker, pnl = s.total_pnl, trades = s.trade_count, "bottom loser");
        }
    }
}
