//! Artifact export — JSON and CSV.
//!
//! - **JSON**: full `BacktestResult` round trip with schema versioning
//! - **CSV**: trade log, per-ticker P&L, equity curve, screening results
//!
//! Every persisted JSON artifact carries a `schema_version`. Newer versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use thiserror::Error;
use trendscan_core::domain::TradeLogEntry;
use trendscan_core::engine::EquityPoint;

use crate::config::OutputSection;
use crate::result::{BacktestResult, SCHEMA_VERSION};
use crate::ticker_analysis::TickerAnalysis;
use crate::universe::ScreenRow;

pub const TRADE_LOG_FILE: &str = "trade_log.csv";
pub const TICKER_STATS_FILE: &str = "ticker_stats.csv";
pub const EQUITY_FILE: &str = "equity_curve.csv";
pub const RESULT_FILE: &str = "result.json";
pub const SCREENING_FILE: &str = "screening_results.csv";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("unsupported schema version {found} (max supported: {max})")]
    UnsupportedSchema { found: u32, max: u32 },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(data)?)
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult, ExportError> {
    let result: BacktestResult = serde_json::from_str(json)?;
    if result.schema_version > SCHEMA_VERSION {
        return Err(ExportError::UnsupportedSchema {
            found: result.schema_version,
            max: SCHEMA_VERSION,
        });
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trade log as CSV, one row per ENTRY and EXIT in execution order.
///
/// Columns: date, ticker, action, price, shares, reason, pnl, capital_after.
/// `pnl` is empty on ENTRY rows.
pub fn export_trade_log_csv(entries: &[TradeLogEntry]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "ticker",
        "action",
        "price",
        "shares",
        "reason",
        "pnl",
        "capital_after",
    ])?;
    for e in entries {
        wtr.write_record([
            &e.date.to_string(),
            &e.symbol,
            &e.action.to_string(),
            &format!("{:.4}", e.price),
            &e.shares.to_string(),
            &e.reason,
            &e.pnl.map(|p| format!("{p:.2}")).unwrap_or_default(),
            &format!("{:.2}", e.capital_after),
        ])?;
    }
    finish(wtr)
}

/// Per-ticker P&L, best first. Columns: ticker, total_pnl, trade_count.
pub fn export_ticker_stats_csv(analysis: &TickerAnalysis) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["ticker", "total_pnl", "trade_count"])?;
    for s in analysis.stats() {
        wtr.write_record([
            &s.ticker,
            &format!("{:.2}", s.total_pnl),
            &s.trade_count.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Export an equity curve as CSV with date and equity columns.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "equity"])?;
    for p in equity_curve {
        wtr.write_record([&p.date.to_string(), &format!("{:.2}", p.equity)])?;
    }
    finish(wtr)
}

/// Screening rows with a header, readable back by the universe loader.
pub fn export_screening_csv(rows: &[ScreenRow]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    if rows.is_empty() {
        wtr.write_record(["ticker"])?;
    }
    for row in rows {
        wtr.serialize(row)?;
    }
    finish(wtr)
}

// ─── Files ──────────────────────────────────────────────────────────

fn write_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir).map_err(io_error(dir))?;
    let path = dir.join(name);
    std::fs::write(&path, content).map_err(io_error(&path))?;
    tracing::info!(path = %path.display(), "wrote artifact");
    Ok(path)
}

/// Write the artifacts enabled in `output` and return their paths.
///
/// - `trade_log.csv` and `equity_curve.csv` when `trade_log` is set
/// - `ticker_stats.csv` when `ticker_stats` is set
/// - `result.json` when `json` is set
pub fn save_artifacts(
    result: &BacktestResult,
    output: &OutputSection,
) -> Result<Vec<PathBuf>, ExportError> {
    let mut written = Vec::new();
    if output.trade_log {
        written.push(write_file(
            &output.dir,
            TRADE_LOG_FILE,
            &export_trade_log_csv(&result.trade_log)?,
        )?);
        written.push(write_file(
            &output.dir,
            EQUITY_FILE,
            &export_equity_csv(&result.equity_curve)?,
        )?);
    }
    if output.ticker_stats {
        let analysis = TickerAnalysis::analyze(&result.trade_log);
        written.push(write_file(
            &output.dir,
            TICKER_STATS_FILE,
            &export_ticker_stats_csv(&analysis)?,
        )?);
    }
    if output.json {
        written.push(write_file(&output.dir, RESULT_FILE, &export_json(result)?)?);
    }
    Ok(written)
}

/// Write `screening_results.csv` under `dir`.
pub fn save_screening(rows: &[ScreenRow], dir: &Path) -> Result<PathBuf, ExportError> {
    write_file(dir, SCREENING_FILE, &export_screening_csv(rows)?)
}

/// Load a `BacktestResult` from a JSON artifact. Rejects unknown schema versions.
pub fn load_result(path: &Path) -> Result<BacktestResult, ExportError> {
    let json = std::fs::read_to_string(path).map_err(io_error(path))?;
    import_json(&json)
}
