//! Bar loading for the runner.
//!
//! Fetches every symbol of the universe from a [`BarSource`] and augments it
//! with the standard indicator columns before the day loop starts. Fetch and
//! augmentation run in parallel across symbols; the result is keyed by symbol
//! in sorted order, so the simulation never depends on thread scheduling.
//!
//! Failures are per symbol: a missing, empty, or short history excludes that
//! symbol and is counted. A failed benchmark fetch degrades the run to
//! no-benchmark mode instead of failing it.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use trendscan_core::data::{BarSource, DataUnavailable, HistoryWindow};
use trendscan_core::diagnostics::Diagnostics;
use trendscan_core::domain::BarSeries;
use trendscan_core::engine::MIN_HISTORY_BARS;
use trendscan_core::indicators::{augment, AugmentedSeries};

/// What happened to the benchmark for this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BenchmarkStatus {
    Loaded { symbol: String },
    Disabled,
    /// Fetch failed. The run continues with the RS condition auto-passed.
    Unavailable { symbol: String, reason: String },
}

impl BenchmarkStatus {
    pub fn is_enabled(&self) -> bool {
        matches!(self, BenchmarkStatus::Loaded { .. })
    }
}

/// A symbol dropped before the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// Augmented universe ready for the day loop.
#[derive(Debug)]
pub struct LoadedUniverse {
    pub series: BTreeMap<String, AugmentedSeries>,
    pub benchmark: Option<BarSeries>,
    pub benchmark_status: BenchmarkStatus,
    pub excluded: Vec<ExcludedSymbol>,
    /// Symbols asked for, before exclusions.
    pub requested: usize,
    /// BLAKE3 over every loaded bar.
    pub dataset_hash: String,
}

impl LoadedUniverse {
    /// Fresh day-loop counters seeded with the universe and fetch totals.
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            stage2_universe_size: self.requested,
            data_fetch_success_count: self.series.len(),
            data_fetch_filtered_count: self.requested - self.series.len(),
            ..Diagnostics::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Fetch one symbol and check it can be traded at all.
fn fetch_tradeable(
    source: &dyn BarSource,
    symbol: &str,
    window: &HistoryWindow,
) -> Result<BarSeries, DataUnavailable> {
    let series = source.fetch(symbol, window)?;
    if series.len() < MIN_HISTORY_BARS {
        return Err(DataUnavailable::TooShort {
            symbol: symbol.to_string(),
            bars: series.len(),
            required: MIN_HISTORY_BARS,
        });
    }
    Ok(series)
}

fn load_benchmark(
    source: &dyn BarSource,
    symbol: Option<&str>,
    window: &HistoryWindow,
) -> (Option<BarSeries>, BenchmarkStatus) {
    let Some(symbol) = symbol else {
        tracing::info!("benchmark disabled, RS condition auto-passes");
        return (None, BenchmarkStatus::Disabled);
    };
    match source.fetch_benchmark(symbol, window) {
        Ok(series) => {
            tracing::info!(symbol, bars = series.len(), "benchmark loaded");
            (
                Some(series),
                BenchmarkStatus::Loaded {
                    symbol: symbol.to_string(),
                },
            )
        }
        Err(e) => {
            tracing::warn!(
                symbol,
                error = %e,
                "benchmark unavailable, falling back to no-benchmark mode"
            );
            (
                None,
                BenchmarkStatus::Unavailable {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                },
            )
        }
    }
}

/// Load and augment `symbols` from `source`.
///
/// `benchmark` is the benchmark symbol, or `None` for a benchmark-free run.
pub fn load_universe(
    symbols: &[String],
    source: &dyn BarSource,
    window: &HistoryWindow,
    benchmark: Option<&str>,
) -> LoadedUniverse {
    let (benchmark, benchmark_status) = load_benchmark(source, benchmark, window);

    tracing::info!(
        source = source.name(),
        symbols = symbols.len(),
        start = %window.start,
        end = %window.end,
        "fetching historical data"
    );

    let fetched: Vec<(String, Result<AugmentedSeries, DataUnavailable>)> = symbols
        .par_iter()
        .map(|symbol| {
            let result = fetch_tradeable(source, symbol, window)
                .map(|series| augment(series, benchmark.as_ref()));
            (symbol.clone(), result)
        })
        .collect();

    let mut series = BTreeMap::new();
    let mut excluded = Vec::new();
    for (symbol, result) in fetched {
        match result {
            Ok(augmented) => {
                series.insert(symbol, augmented);
            }
            Err(e) => {
                tracing::debug!(symbol = %symbol, error = %e, "symbol excluded");
                excluded.push(ExcludedSymbol {
                    symbol,
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        requested = symbols.len(),
        loaded = series.len(),
        filtered = excluded.len(),
        "data fetch complete"
    );
    if series.is_empty() && !symbols.is_empty() {
        tracing::error!("no symbol has enough history, nothing to backtest");
    }

    let dataset_hash = compute_dataset_hash(&series);
    LoadedUniverse {
        series,
        benchmark,
        benchmark_status,
        excluded,
        requested: symbols.len(),
        dataset_hash,
    }
}

/// Compute a deterministic BLAKE3 hash over all bar data.
///
/// The map is already sorted by symbol, so the hash does not depend on fetch order.
fn compute_dataset_hash(series: &BTreeMap<String, AugmentedSeries>) -> String {
    let mut hasher = blake3::Hasher::new();
    for (symbol, augmented) in series {
        hasher.update(symbol.as_bytes());
        for bar in augmented.bars() {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
