//! Diagnostics — write-only counters that explain why a run traded (or didn't).
//!
//! Two pieces:
//! - [`DiagnosticsTracker`]: the screening funnel. One record per symbol checked
//!   against the full trend template, with per-condition failure counts.
//! - [`Diagnostics`]: the day-loop counters the engine bumps at fixed points.
//!
//! Nothing in the simulation ever branches on these values.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::{StageConditions, StageResult, VcpRejection};
use crate::filter::EntryEvaluation;

/// Sort (name, count) pairs by count descending, then name, and keep `limit`.
fn top_counts(counts: &BTreeMap<String, usize>, limit: usize) -> Vec<(String, usize)> {
    let mut sorted: Vec<(String, usize)> =
        counts.iter().map(|(k, &v)| (k.clone(), v)).collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(limit);
    sorted
}

fn percent(part: usize, whole: usize) -> Option<f64> {
    (whole > 0).then(|| part as f64 / whole as f64 * 100.0)
}

// ─── Screening funnel ───

/// Outcome of one trend-template check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenRecord {
    pub symbol: String,
    pub date: NaiveDate,
    pub stage: u8,
    pub passes: bool,
    pub conditions: StageConditions,
}

/// Aggregate view of the screening funnel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunnelMetrics {
    pub total_checks: usize,
    pub by_condition: BTreeMap<String, usize>,
    pub final_passed: usize,
}

impl FunnelMetrics {
    pub fn pass_rate(&self) -> Option<f64> {
        percent(self.final_passed, self.total_checks)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiagnosticsTracker {
    records: Vec<ScreenRecord>,
    failure_counts: BTreeMap<String, usize>,
    passed: usize,
}

impl DiagnosticsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, symbol: &str, date: NaiveDate, result: &StageResult) {
        if result.meets_criteria {
            self.passed += 1;
        }
        for (name, passed) in result.conditions.iter() {
            if !passed {
                *self.failure_counts.entry(name.to_string()).or_default() += 1;
            }
        }
        self.records.push(ScreenRecord {
            symbol: symbol.to_string(),
            date,
            stage: result.stage,
            passes: result.meets_criteria,
            conditions: result.conditions,
        });
    }

    pub fn records(&self) -> &[ScreenRecord] {
        &self.records
    }

    pub fn metrics(&self) -> FunnelMetrics {
        FunnelMetrics {
            total_checks: self.records.len(),
            by_condition: self.failure_counts.clone(),
            final_passed: self.passed,
        }
    }

    /// Most frequent failing conditions; ties break on name.
    pub fn top_failures(&self, limit: usize) -> Vec<(String, usize)> {
        top_counts(&self.failure_counts, limit)
    }

    pub fn log_summary(&self) {
        let metrics = self.metrics();
        tracing::info!(
            total_checks = metrics.total_checks,
            final_passed = metrics.final_passed,
            pass_rate = ?metrics.pass_rate().map(|r| format!("{r:.1}%")),
            "stage 2 screening summary"
        );
        if metrics.by_condition.is_empty() {
            tracing::info!("no condition failures recorded");
            return;
        }
        for (name, count) in self.top_failures(10) {
            let pct = percent(count, metrics.total_checks).unwrap_or(0.0);
            tracing::info!(condition = %name, count, "failed in {pct:.1}% of checks");
        }
    }
}

// ─── Day-loop counters ───

/// Counters bumped by the universe loader and the day loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Candidates handed to the backtest before data fetch.
    pub stage2_universe_size: usize,
    pub data_fetch_success_count: usize,
    pub data_fetch_filtered_count: usize,
    pub entry_evaluations: usize,
    pub entry_passed: usize,
    pub entry_failed_conditions: BTreeMap<String, usize>,
    pub total_entry_attempts: usize,
    pub insufficient_capital: usize,
    pub max_positions_reached: usize,
    /// Symbol-days skipped for having under a year of history.
    pub insufficient_data: usize,
    pub vcp_rejections: BTreeMap<String, usize>,
    pub fallback_triggered: bool,
    pub strict_mode_trades: Option<usize>,
    pub relaxed_mode_trades: Option<usize>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_entry_evaluation(&mut self, evaluation: &EntryEvaluation) {
        self.entry_evaluations += 1;
        if evaluation.passed {
            self.entry_passed += 1;
        } else {
            for name in evaluation.failed() {
                *self.entry_failed_conditions.entry(name.to_string()).or_default() += 1;
            }
        }
    }

    pub fn record_vcp_rejection(&mut self, rejection: &VcpRejection) {
        *self
            .vcp_rejections
            .entry(rejection.name().to_string())
            .or_default() += 1;
    }

    pub fn entry_pass_rate(&self) -> Option<f64> {
        percent(self.entry_passed, self.entry_evaluations)
    }

    pub fn top_entry_failures(&self, limit: usize) -> Vec<(String, usize)> {
        top_counts(&self.entry_failed_conditions, limit)
    }

    /// Carry screening and fetch counters over into a fresh simulation pass.
    pub fn carry_universe(&self) -> Self {
        Self {
            stage2_universe_size: self.stage2_universe_size,
            data_fetch_success_count: self.data_fetch_success_count,
            data_fetch_filtered_count: self.data_fetch_filtered_count,
            ..Self::default()
        }
    }

    /// Plain-language reasons a run produced no trades, most specific first.
    pub fn no_trade_explanations(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.entry_evaluations == 0 {
            reasons.push(
                "no entry evaluations: no data in range, every symbol under 252 bars, \
                 or no trading days"
                    .to_string(),
            );
        }
        if self.entry_passed == 0 {
            reasons.push("no symbol passed the entry conditions".to_string());
            if let Some((name, count)) = self.top_entry_failures(1).into_iter().next() {
                reasons.push(format!("most common failure: {name} ({count} times)"));
            }
        } else if self.insufficient_capital > 0 {
            reasons.push("insufficient capital to open positions".to_string());
        } else if self.total_entry_attempts > 0 {
            reasons.push("entries passed but position sizing produced zero shares".to_string());
        }
        reasons
    }

    pub fn log_summary(&self, total_trades: usize) {
        tracing::info!(
            total_trades,
            universe = self.stage2_universe_size,
            fetched = self.data_fetch_success_count,
            filtered = self.data_fetch_filtered_count,
            "backtest diagnostics"
        );
        tracing::info!(
            evaluations = self.entry_evaluations,
            passed = self.entry_passed,
            attempts = self.total_entry_attempts,
            insufficient_capital = self.insufficient_capital,
            max_positions_reached = self.max_positions_reached,
            insufficient_data = self.insufficient_data,
            "entry evaluation"
        );
        if self.entry_evaluations == 0 {
            tracing::warn!(
                "zero entry evaluations; check that the universe has candidates \
                 and the period overlaps available data"
            );
        }
        for (name, count) in self.top_entry_failures(5) {
            tracing::info!(condition = %name, count, "entry failure");
        }
        if let Some(rate) = self.entry_pass_rate() {
            tracing::info!("entry pass rate {rate:.1}%");
        }
        if !self.vcp_rejections.is_empty() {
            tracing::info!(rejections = ?self.vcp_rejections, "vcp rejections");
        }
        if total_trades == 0 {
            for reason in self.no_trade_explanations() {
                tracing::warn!("no trades: {reason}");
            }
        }
    }
}
