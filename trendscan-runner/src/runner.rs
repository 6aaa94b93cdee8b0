//! Backtest runner — wires together data loading, the day loop, fallback, and metrics.
//!
//! Two entry points:
//! - `BacktestEngine::run()`: loads the universe from a source, then simulates. Used by the CLI.
//! - `BacktestEngine::run_loaded()`: takes a pre-loaded universe. Used by tests and benches.
//!
//! A run always starts strict. When the strict pass closes fewer trades than
//! the fallback threshold, the whole simulation is repeated from the initial
//! capital with relaxed thresholds and the relaxed pass is reported.

use chrono::NaiveDate;
use thiserror::Error;

use trendscan_core::analysis::VcpDetector;
use trendscan_core::data::BarSource;
use trendscan_core::diagnostics::Diagnostics;
use trendscan_core::engine::{run_simulation, trading_days, EngineConfig, SimulationResult};
use trendscan_core::fallback::{FallbackManager, FilterMode};
use trendscan_core::filter::EntryCondition;

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_universe, LoadedUniverse};
use crate::metrics::PerformanceMetrics;
use crate::result::{BacktestResult, SCHEMA_VERSION};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to fingerprint config: {0}")]
    RunId(#[from] serde_json::Error),
}

/// Orchestrates one backtest: strict pass, optional relaxed re-run, result.
#[derive(Debug)]
pub struct BacktestEngine {
    config: BacktestConfig,
    engine_config: EngineConfig,
    entry: EntryCondition,
    vcp: VcpDetector,
    fallback: FallbackManager,
}

impl BacktestEngine {
    /// Validate `config` and build the detectors. Fails before any data is read.
    pub fn new(config: BacktestConfig) -> Result<Self, RunError> {
        config.validate()?;
        let engine_config = config.engine_config();
        let entry = EntryCondition::new(&config.stage, &config.entry);
        let vcp = VcpDetector::new(config.vcp.clone())?;
        let fallback = FallbackManager::new(
            config.stage.auto_fallback_enabled,
            config.stage.min_trades_threshold,
        );
        Ok(Self {
            config,
            engine_config,
            entry,
            vcp,
            fallback,
        })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn fallback(&self) -> &FallbackManager {
        &self.fallback
    }

    /// Load `symbols` from `source` and run.
    pub fn run(&mut self, symbols: &[String], source: &dyn BarSource) -> Result<BacktestResult, RunError> {
        let loaded = load_universe(
            symbols,
            source,
            &self.config.history_window(),
            self.config.benchmark_symbol(),
        );
        self.run_loaded(&loaded)
    }

    /// Run on an already loaded universe.
    pub fn run_loaded(&mut self, loaded: &LoadedUniverse) -> Result<BacktestResult, RunError> {
        let run_id = self.config.run_id()?;
        let start = self.config.backtest.start_date;
        let end = self.config.backtest.end_date;
        self.fallback.reset();

        tracing::info!(
            run_id = %run_id,
            %start,
            %end,
            symbols = loaded.series.len(),
            capital = self.engine_config.initial_capital,
            max_positions = self.engine_config.max_positions,
            risk_per_trade = self.engine_config.risk_per_trade,
            commission = self.engine_config.commission,
            benchmark = loaded.benchmark_status.is_enabled(),
            use_vcp = self.engine_config.use_vcp,
            auto_fallback = self.config.stage.auto_fallback_enabled,
            "starting backtest"
        );

        let days = trading_days(&loaded.series, loaded.benchmark.as_ref(), start, end);
        if days.is_empty() {
            tracing::warn!(%start, %end, "no trading days in the requested period");
        }

        let strict = self.simulate(loaded, &days, FilterMode::Strict, loaded.diagnostics());
        let strict_trades = strict.trade_count();

        let mut reported = if self.fallback.should_fallback(strict_trades) {
            self.fallback.trigger_fallback();
            let seed = strict.diagnostics.carry_universe();
            let mut relaxed = self.simulate(loaded, &days, self.fallback.current_mode(), seed);
            relaxed.diagnostics.fallback_triggered = true;
            relaxed.diagnostics.relaxed_mode_trades = Some(relaxed.trade_count());
            tracing::info!(
                strict_trades,
                relaxed_trades = relaxed.trade_count(),
                "relaxed re-run complete"
            );
            relaxed
        } else {
            strict
        };
        reported.diagnostics.strict_mode_trades = Some(strict_trades);
        reported.diagnostics.log_summary(reported.trade_count());

        let metrics = PerformanceMetrics::compute(
            &reported.equity_curve,
            &reported.trades,
            self.engine_config.initial_capital,
        );
        metrics.log_summary();

        Ok(BacktestResult {
            schema_version: SCHEMA_VERSION,
            run_id,
            start_date: start,
            end_date: end,
            mode: reported.mode,
            fallback: self.fallback.state(),
            benchmark: loaded.benchmark_status.clone(),
            metrics,
            trades: reported.trades,
            trade_log: reported.trade_log,
            equity_curve: reported.equity_curve,
            diagnostics: reported.diagnostics,
            excluded: loaded.excluded.clone(),
            dataset_hash: loaded.dataset_hash.clone(),
        })
    }

    fn simulate(
        &self,
        loaded: &LoadedUniverse,
        days: &[NaiveDate],
        mode: FilterMode,
        diagnostics: Diagnostics,
    ) -> SimulationResult {
        tracing::info!(%mode, days = days.len(), "running simulation");
        run_simulation(
            &loaded.series,
            days,
            mode,
            &self.engine_config,
            &self.entry,
            &self.vcp,
            diagnostics,
        )
    }
}
