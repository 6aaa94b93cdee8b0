//! CSV directory source: one `<SYMBOL>.csv` file per symbol.
//!
//! Expected header: `date,open,high,low,close,volume` (extra columns are
//! ignored). Rows may be unsorted; duplicate dates keep the first row and
//! rows failing the OHLC sanity check are dropped.

use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::provider::{non_empty, BarSource, DataUnavailable, HistoryWindow};
use crate::domain::{Bar, BarSeries};

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Clone)]
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `symbol`.
    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    fn read_bars(&self, symbol: &str, window: &HistoryWindow) -> Result<Vec<Bar>, DataUnavailable> {
        let path = self.path_for(symbol);
        let unreadable = |reason: String| DataUnavailable::Unreadable {
            symbol: symbol.to_string(),
            reason,
        };
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DataUnavailable::NotFound {
                symbol: symbol.to_string(),
            },
            _ => unreadable(format!("{}: {e}", path.display())),
        })?;

        let mut rdr = csv::Reader::from_reader(file);
        let mut bars = Vec::new();
        let mut dropped = 0usize;
        for rec in rdr.deserialize::<CsvRow>() {
            let row = rec.map_err(|e| unreadable(e.to_string()))?;
            if !window.contains(row.date) {
                continue;
            }
            let bar = Bar {
                symbol: symbol.to_string(),
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume.max(0.0).round() as u64,
            };
            if bar.is_sane() {
                bars.push(bar);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::debug!(symbol, dropped, "dropped malformed bars");
        }
        Ok(bars)
    }
}

impl BarSource for CsvDirSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, symbol: &str, window: &HistoryWindow) -> Result<BarSeries, DataUnavailable> {
        let bars = self.read_bars(symbol, window)?;
        non_empty(BarSeries::from_unsorted(symbol, bars)?, window)
    }
}
