//! TrendScan Runner — backtest orchestration, Stage-2 screening, metrics, export.
//!
//! This crate builds on `trendscan-core` to provide:
//! - TOML configuration with validation and a deterministic run id
//! - Universe loading with per-symbol exclusion and benchmark degradation
//! - The Stage-2 screener and its `screening_results.csv` universe file
//! - `BacktestEngine`: strict pass, optional relaxed re-run, metrics
//! - Per-ticker P&L analysis
//! - JSON/CSV artifact export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod result;
pub mod runner;
pub mod ticker_analysis;
pub mod universe;

pub use config::{BacktestConfig, ConfigError, DataSourceKind, OutputSection, RunId};
pub use data_loader::{load_universe, BenchmarkStatus, ExcludedSymbol, LoadedUniverse};
pub use export::{load_result, save_artifacts, save_screening, ExportError};
pub use metrics::PerformanceMetrics;
pub use result::{BacktestResult, SCHEMA_VERSION};
pub use runner::{BacktestEngine, RunError};
pub use ticker_analysis::{TickerAnalysis, TickerStats};
pub use universe::{normalize_symbols, ScreenReport, ScreenRow, Screener, UniverseError, UniverseLoader};
