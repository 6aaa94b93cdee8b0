//! Universe loading and Stage-2 selection.
//!
//! Selection runs once, before the backtest, with the full trend template.
//! The backtest itself only applies the reduced daily entry filter to the
//! selected symbols.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

use trendscan_core::analysis::{high_low_52w, StageConditions, StageDetector, VcpDetector, VcpPattern};
use trendscan_core::config::{ConfigError, StageConfig, VcpConfig};
use trendscan_core::diagnostics::DiagnosticsTracker;
use trendscan_core::fallback::FilterMode;
use trendscan_core::indicators::{Column, SeriesView};

use crate::data_loader::LoadedUniverse;

/// Column holding symbols in a universe file.
pub const TICKER_COLUMN: &str = "ticker";

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("failed to read universe file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed universe CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("universe file has no 'ticker' column")]
    MissingTickerColumn,
}

/// Trim, uppercase, drop blanks, dedupe, and sort.
pub fn normalize_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    symbols
        .into_iter()
        .map(|s| s.as_ref().trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Reads the symbol set from a CSV with a `ticker` column, such as the
/// screener's own `screening_results.csv`.
pub struct UniverseLoader;

impl UniverseLoader {
    pub fn from_file(path: &Path) -> Result<Vec<String>, UniverseError> {
        let file = std::fs::File::open(path).map_err(|source| {
            tracing::warn!(path = %path.display(), "universe file not found");
            UniverseError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<String>, UniverseError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let column = rdr
            .headers()?
            .iter()
            .position(|h| h.trim() == TICKER_COLUMN)
            .ok_or(UniverseError::MissingTickerColumn)?;

        let mut symbols = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if let Some(symbol) = record.get(column) {
                symbols.push(symbol.to_string());
            }
        }
        let universe = normalize_symbols(symbols);
        if universe.is_empty() {
            tracing::warn!("universe file lists no symbols");
        }
        tracing::info!(size = universe.len(), "universe loaded");
        Ok(universe)
    }
}

// ─── Screening ───

/// One symbol that passed the trend template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenRow {
    pub ticker: String,
    pub stage: u8,
    pub current_price: f64,
    pub high_52w: f64,
    pub low_52w: f64,
    pub distance_from_high_pct: f64,
    pub sma_50: f64,
    pub sma_150: f64,
    pub sma_200: f64,
    pub rs_new_high: bool,
    pub benchmark_enabled: bool,
    pub volume_50d_avg: f64,
    pub conditions_met: usize,
    pub total_conditions: usize,
    pub has_vcp: bool,
    pub pivot: Option<f64>,
    pub entry_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub risk_pct: Option<f64>,
    pub contraction_count: Option<usize>,
    pub last_updated: NaiveDate,
}

/// Screening output: passing rows plus the funnel over every symbol checked.
#[derive(Debug, Clone, Default)]
pub struct ScreenReport {
    pub rows: Vec<ScreenRow>,
    pub tracker: DiagnosticsTracker,
}

impl ScreenReport {
    pub fn tickers(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.ticker.clone()).collect()
    }
}

/// Stage-2 screen over a loaded universe.
#[derive(Debug, Clone)]
pub struct Screener {
    stage: StageDetector,
    vcp: VcpDetector,
    mode: FilterMode,
    require_vcp: bool,
}

impl Screener {
    pub fn new(
        stage: StageConfig,
        vcp: VcpConfig,
        mode: FilterMode,
        require_vcp: bool,
    ) -> Result<Self, ConfigError> {
        stage.profile(mode)?;
        Ok(Self {
            stage: StageDetector::new(stage)?,
            vcp: VcpDetector::new(vcp)?,
            mode,
            require_vcp,
        })
    }

    /// Classify every loaded symbol as of `as_of` (latest bar when `None`).
    pub fn screen(
        &self,
        loaded: &LoadedUniverse,
        as_of: Option<NaiveDate>,
    ) -> Result<ScreenReport, ConfigError> {
        let use_benchmark = loaded.benchmark_status.is_enabled();
        if !use_benchmark {
            tracing::info!("screening without benchmark, RS condition auto-passes");
        }

        let mut report = ScreenReport::default();
        for (symbol, augmented) in &loaded.series {
            let view = match as_of {
                Some(date) => augmented.view_through(date),
                None => augmented.view(),
            };
            let Some(last) = view.last_bar() else {
                continue;
            };
            let rs_line = use_benchmark.then(|| view.column(Column::RsLine));
            let result = self.stage.detect_stage(&view, rs_line, self.mode, use_benchmark)?;
            report.tracker.record(symbol, last.date, &result);
            if !result.meets_criteria {
                continue;
            }

            let pattern = self.vcp.detect_vcp(&view);
            if self.require_vcp && pattern.is_none() {
                tracing::debug!(symbol = %symbol, "stage 2 without VCP, skipped");
                continue;
            }

            let row = screen_row(symbol, &view, last.date, &result.conditions, use_benchmark, pattern);
            report.rows.push(row);
        }

        tracing::info!(
            checked = loaded.series.len(),
            passed = report.rows.len(),
            mode = %self.mode,
            "stage 2 screen complete"
        );
        report.tracker.log_summary();
        Ok(report)
    }
}

fn screen_row(
    symbol: &str,
    view: &SeriesView<'_>,
    date: NaiveDate,
    conditions: &StageConditions,
    benchmark_enabled: bool,
    pattern: Option<VcpPattern>,
) -> ScreenRow {
    let close = view.close();
    let (high_52w, low_52w) = high_low_52w(view);
    let distance_from_high_pct = if high_52w > 0.0 {
        (high_52w - close) / high_52w * 100.0
    } else {
        0.0
    };
    ScreenRow {
        ticker: symbol.to_string(),
        stage: 2,
        current_price: close,
        high_52w,
        low_52w,
        distance_from_high_pct,
        sma_50: view.latest(Column::Sma50),
        sma_150: view.latest(Column::Sma150),
        sma_200: view.latest(Column::Sma200),
        rs_new_high: conditions.rs_new_high,
        benchmark_enabled,
        volume_50d_avg: view.latest(Column::VolumeMa50),
        conditions_met: conditions.iter().filter(|(_, passed)| *passed).count(),
        total_conditions: conditions.iter().count(),
        has_vcp: pattern.is_some(),
        pivot: pattern.as_ref().map(|p| p.pivot),
        entry_price: pattern.as_ref().map(|p| p.entry_price),
        stop_price: pattern.as_ref().map(|p| p.stop_price),
        risk_pct: pattern.as_ref().map(|p| p.risk_pct),
        contraction_count: pattern.as_ref().map(|p| p.contractions.len()),
        last_updated: date,
    }
}
