//! Backtest result: everything a finished run reports.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use trendscan_core::diagnostics::Diagnostics;
use trendscan_core::domain::{ClosedTrade, TradeLogEntry};
use trendscan_core::engine::EquityPoint;
use trendscan_core::fallback::{FallbackState, FilterMode};

use crate::config::RunId;
use crate::data_loader::{BenchmarkStatus, ExcludedSymbol};
use crate::metrics::PerformanceMetrics;

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Complete, immutable result of one backtest run.
///
/// When the strict pass fell back, every field describes the relaxed re-run
/// except the strict trade count kept in `diagnostics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Threshold profile of the reported run.
    pub mode: FilterMode,
    pub fallback: FallbackState,
    pub benchmark: BenchmarkStatus,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<ClosedTrade>,
    pub trade_log: Vec<TradeLogEntry>,
    pub equity_curve: Vec<EquityPoint>,
    pub diagnostics: Diagnostics,
    #[serde(default)]
    pub excluded: Vec<ExcludedSymbol>,
    pub dataset_hash: String,
}

impl BacktestResult {
    pub fn initial_capital(&self) -> f64 {
        self.metrics.initial_capital
    }

    pub fn final_capital(&self) -> f64 {
        self.metrics.final_capital
    }

    pub fn total_trades(&self) -> usize {
        self.trades.len()
    }

    pub fn benchmark_enabled(&self) -> bool {
        self.benchmark.is_enabled()
    }

    /// Sum of closed-trade P&L. Equals final minus initial capital once every
    /// position has been force-closed.
    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }
}
