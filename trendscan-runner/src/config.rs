//! Serializable backtest configuration.
//!
//! One TOML file drives a run:
//!
//! ```toml
//! [backtest]
//! start_date = "2022-01-03"
//! end_date = "2024-12-31"
//! initial_capital = 100000.0
//!
//! [risk]
//! max_positions = 5
//! risk_per_trade = 0.0075
//!
//! [stage.relaxed]
//! min_volume = 250000.0
//!
//! [data]
//! source = "csv"
//! dir = "data/daily"
//! ```
//!
//! Every field has a default, so an empty file is a valid config.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use trendscan_core::config::{require, EntryConfig, ExitConfig, StageConfig, VcpConfig};
use trendscan_core::data::HistoryWindow;
use trendscan_core::engine::EngineConfig;

pub use trendscan_core::config::ConfigError;

/// Longest accepted warm-up: one hundred years of calendar days.
pub const MAX_WARMUP_DAYS: u32 = 36_500;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Complete configuration of a backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub risk: RiskSection,
    pub stage: StageConfig,
    pub vcp: VcpConfig,
    pub entry: EntryConfig,
    pub exit: ExitConfig,
    pub data: DataSection,
    pub output: OutputSection,
}

/// Period, capital, and benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    /// First simulated day (inclusive).
    pub start_date: NaiveDate,
    /// Last simulated day (inclusive).
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub benchmark: String,
    /// Without a benchmark the RS condition passes automatically and the
    /// trading calendar is the union of symbol dates.
    pub use_benchmark: bool,
    /// Calendar days loaded before `start_date` so indicators are warm on day one.
    pub warmup_days: u32,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2022, 1, 3).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            initial_capital: 100_000.0,
            benchmark: "SPY".to_string(),
            use_benchmark: true,
            warmup_days: 730,
        }
    }
}

/// Position cap, sizing, and costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSection {
    pub max_positions: usize,
    pub risk_per_trade: f64,
    pub commission: f64,
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            max_positions: 5,
            risk_per_trade: 0.0075,
            commission: 0.001,
        }
    }
}

/// Where bars come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    /// One `<SYMBOL>.csv` per symbol under `data.dir`.
    #[default]
    Csv,
    /// Seeded random walks. Development only.
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub source: DataSourceKind,
    pub dir: PathBuf,
    pub seed: u64,
    /// Mean daily return of synthetic walks.
    pub drift: f64,
    /// Screening results CSV with a `ticker` column. Takes precedence over `symbols`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub universe_file: Option<PathBuf>,
    pub symbols: Vec<String>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            source: DataSourceKind::Csv,
            dir: PathBuf::from("data"),
            seed: 42,
            drift: 0.0005,
            universe_file: None,
            symbols: Vec::new(),
        }
    }
}

/// Artifacts written after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
    pub trade_log: bool,
    pub ticker_stats: bool,
    pub json: bool,
    /// Winners and losers listed in the ticker summary.
    pub top_n: usize,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            trade_log: true,
            ticker_stats: true,
            json: true,
            top_n: 5,
        }
    }
}

impl BacktestConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string. A `[stage]` table naming no thresholds gets
    /// both default profiles.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: BacktestConfig = toml::from_str(content)?;
        config.stage.normalize();
        Ok(config)
    }

    /// Check every section. Called before any data is loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backtest.start_date >= self.backtest.end_date {
            return Err(ConfigError::InvalidDateRange {
                start: self.backtest.start_date,
                end: self.backtest.end_date,
            });
        }
        require(
            "warmup_days",
            f64::from(self.backtest.warmup_days),
            self.backtest.warmup_days <= MAX_WARMUP_DAYS,
            "must be at most 36500 calendar days",
        )?;
        require(
            "breakout_vol_ratio",
            self.entry.breakout_vol_ratio,
            self.entry.breakout_vol_ratio > 0.0,
            "must be positive",
        )?;
        if let Some(min_volume) = self.entry.min_volume {
            require("entry.min_volume", min_volume, min_volume >= 0.0, "must be non-negative")?;
        }
        self.engine_config().validate()?;
        self.stage.validate()?;
        self.vcp.validate()
    }

    /// Settings for one simulation pass.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_capital: self.backtest.initial_capital,
            max_positions: self.risk.max_positions,
            commission: self.risk.commission,
            risk_per_trade: self.risk.risk_per_trade,
            exit: self.exit.clone(),
            use_vcp: self.entry.use_vcp,
            breakout_vol_ratio: self.entry.breakout_vol_ratio,
        }
    }

    /// Bars requested from the source: the backtest period plus warm-up.
    pub fn history_window(&self) -> HistoryWindow {
        HistoryWindow::with_warmup(
            self.backtest.start_date,
            self.backtest.end_date,
            i64::from(self.backtest.warmup_days),
        )
    }

    /// Benchmark symbol, or `None` when the run is benchmark-free.
    pub fn benchmark_symbol(&self) -> Option<&str> {
        self.backtest
            .use_benchmark
            .then_some(self.backtest.benchmark.as_str())
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> Result<RunId, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendscan_core::fallback::FilterMode;

    #[test]
    fn empty_file_is_the_default_config() {
        let config = BacktestConfig::from_toml("").unwrap();
        assert_eq!(config, BacktestConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn sections_parse() {
        let config = BacktestConfig::from_toml(
            r#"
            [backtest]
            start_date = "2023-01-02"
            end_date = "2023-12-29"
            initial_capital = 50000.0
            use_benchmark = false

            [risk]
            max_positions = 3
            risk_per_trade = 0.01
            commission = 0.0

            [entry]
            use_vcp = true

            [exit]
            stop_loss_pct = 0.05

            [data]
            source = "synthetic"
            seed = 7
            symbols = ["AAA", "BBB"]

            [output]
            dir = "runs"
            json = false
            "#,
        )
        .unwrap();
        assert_eq!(config.backtest.initial_capital, 50_000.0);
        assert!(config.benchmark_symbol().is_none());
        assert_eq!(config.risk.max_positions, 3);
        assert_eq!(config.data.source, DataSourceKind::Synthetic);
        assert_eq!(config.data.symbols, vec!["AAA", "BBB"]);
        assert_eq!(config.output.dir, PathBuf::from("runs"));
        assert!(!config.output.json);

        let engine = config.engine_config();
        assert!(engine.use_vcp);
        assert_eq!(engine.exit.stop_loss_pct, 0.05);
        assert_eq!(engine.exit.target_gain_pct, 0.25);
        assert_eq!(engine.commission, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bare_stage_table_keeps_both_profiles() {
        let config = BacktestConfig::from_toml("[stage]\nmin_trades_threshold = 2").unwrap();
        assert_eq!(config.stage.min_trades_threshold, 2);
        assert!(config.stage.profile(FilterMode::Relaxed).is_ok());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reversed_dates_are_rejected() {
        let config = BacktestConfig::from_toml(
            r#"
            [backtest]
            start_date = "2024-06-01"
            end_date = "2024-01-01"
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn bad_risk_is_rejected() {
        let mut config = BacktestConfig::default();
        config.risk.risk_per_trade = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold {
                field: "risk_per_trade",
                ..
            })
        ));
    }

    #[test]
    fn unparseable_toml_is_a_parse_error() {
        let err = BacktestConfig::from_toml("[backtest\nstart_date = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = BacktestConfig::from_file(Path::new("/nonexistent/trendscan.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn history_window_includes_warmup() {
        let config = BacktestConfig::default();
        let window = config.history_window();
        assert_eq!(window.end, config.backtest.end_date);
        assert_eq!(
            (config.backtest.start_date - window.start).num_days(),
            i64::from(config.backtest.warmup_days)
        );
    }

    #[test]
    fn oversized_warmup_is_rejected() {
        // GIVEN a warm-up far beyond the calendar's range
        let config = BacktestConfig::from_toml("[backtest]\nwarmup_days = 4000000000").unwrap();

        // THEN validation names the field
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold { field: "warmup_days", .. })
        ));
        // AND the engine refuses to build
        assert!(crate::BacktestEngine::new(config).is_err());

        let mut config = BacktestConfig::default();
        config.backtest.warmup_days = MAX_WARMUP_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_id_deterministic() {
        let config = BacktestConfig::default();
        let id1 = config.run_id().unwrap();
        let id2 = config.run_id().unwrap();
        assert_eq!(id1, id2, "RunId should be deterministic");
        assert_eq!(id1.len(), 64);
    }

    #[test]
    fn test_run_id_changes_with_params() {
        let a = BacktestConfig::default();
        let mut b = BacktestConfig::default();
        b.risk.max_positions = 10;
        assert_ne!(a.run_id().unwrap(), b.run_id().unwrap());
    }
}
