//! BDD scenarios for the backtest runner: load, simulate, fall back, export.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use trendscan_core::data::{BarSource, DataUnavailable, HistoryWindow};
use trendscan_core::domain::{Bar, BarSeries, ExitReason, TradeAction};
use trendscan_core::fallback::FilterMode;
use trendscan_runner::export::{export_trade_log_csv, RESULT_FILE, TRADE_LOG_FILE};
use trendscan_runner::{
    load_result, save_artifacts, BacktestConfig, BacktestEngine, BenchmarkStatus, OutputSection,
    TickerAnalysis,
};

/// In-memory source with one fixed series per symbol, clipped to the window.
struct FixedSource {
    series: BTreeMap<String, Vec<Bar>>,
}

impl FixedSource {
    fn new() -> Self {
        Self {
            series: BTreeMap::new(),
        }
    }

    fn with(mut self, symbol: &str, start: f64, step: f64, len: usize, volume: u64) -> Self {
        let base = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
        let bars = (0..len)
            .map(|i| {
                let close = start + i as f64 * step;
                let open = if i == 0 { close } else { close - step };
                Bar {
                    symbol: symbol.to_string(),
                    date: base + chrono::Duration::days(i as i64),
                    open,
                    high: open.max(close) + 0.5,
                    low: open.min(close) - 0.5,
                    close,
                    volume,
                }
            })
            .collect();
        self.series.insert(symbol.to_string(), bars);
        self
    }
}

impl BarSource for FixedSource {
    fn name(&self) -> &str {
        "fixed"
    }

    fn fetch(&self, symbol: &str, window: &HistoryWindow) -> Result<BarSeries, DataUnavailable> {
        let bars = self
            .series
            .get(symbol)
            .ok_or_else(|| DataUnavailable::NotFound {
                symbol: symbol.to_string(),
            })?
            .iter()
            .filter(|b| window.contains(b.date))
            .cloned()
            .collect();
        Ok(BarSeries::new(symbol, bars)?)
    }
}

fn config(use_benchmark: bool) -> BacktestConfig {
    let mut config = BacktestConfig::default();
    config.backtest.start_date = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    config.backtest.end_date = NaiveDate::from_ymd_opt(2022, 12, 30).unwrap();
    config.backtest.use_benchmark = use_benchmark;
    config
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn bdd_uptrend_backtest_reconciles_capital() {
    // GIVEN a steady advance with ample volume and no benchmark
    let source = FixedSource::new().with("TREND", 100.0, 0.5, 300, 1_000_000);
    let mut engine = BacktestEngine::new(config(false)).unwrap();

    // WHEN the backtest runs
    let result = engine.run(&symbols(&["TREND"]), &source).unwrap();

    // THEN trades were taken and every entry was closed
    assert!(result.total_trades() >= 1);
    let entries = result
        .trade_log
        .iter()
        .filter(|r| r.action == TradeAction::Entry)
        .count();
    assert_eq!(entries, result.total_trades());

    // AND realized P&L explains the whole change in capital
    let change = result.final_capital() - result.initial_capital();
    assert!((result.realized_pnl() - change).abs() < 1e-6);
    assert!(result.final_capital() > result.initial_capital());

    // AND no trade was stopped out of a market that never pulls back
    assert!(result
        .trades
        .iter()
        .all(|t| t.exit_reason != ExitReason::StopLoss));
    assert!(result.trades.iter().all(|t| t.exit_date <= result.end_date));

    // AND diagnostics carry the strict trade count and the fetch funnel
    assert!(result.diagnostics.strict_mode_trades.is_some());
    assert_eq!(result.diagnostics.data_fetch_success_count, 1);
    assert_eq!(result.benchmark, BenchmarkStatus::Disabled);
    assert_eq!(result.run_id.len(), 64);
}

#[test]
fn bdd_thin_volume_triggers_relaxed_rerun() {
    // GIVEN an advance trading 400k shares a day: below the strict floor,
    // above the relaxed one
    let source = FixedSource::new().with("THIN", 80.0, 0.3, 300, 400_000);
    let mut engine = BacktestEngine::new(config(false)).unwrap();

    // WHEN the backtest runs
    let result = engine.run(&symbols(&["THIN"]), &source).unwrap();

    // THEN the strict pass found nothing and the relaxed pass is reported
    assert_eq!(result.diagnostics.strict_mode_trades, Some(0));
    assert!(result.diagnostics.fallback_triggered);
    assert!(result.fallback.triggered);
    assert_eq!(result.mode, FilterMode::Relaxed);
    assert!(result.total_trades() >= 1);
    assert_eq!(
        result.diagnostics.relaxed_mode_trades,
        Some(result.total_trades())
    );

    // AND the relaxed pass started again from the initial capital
    assert_eq!(result.equity_curve[0].equity, result.initial_capital());
}

#[test]
fn bdd_disabled_fallback_reports_the_empty_strict_run() {
    // GIVEN the same thin market with fallback switched off
    let source = FixedSource::new().with("THIN", 80.0, 0.3, 300, 400_000);
    let mut cfg = config(false);
    cfg.stage.auto_fallback_enabled = false;
    let mut engine = BacktestEngine::new(cfg).unwrap();

    // WHEN the backtest runs
    let result = engine.run(&symbols(&["THIN"]), &source).unwrap();

    // THEN the strict result stands
    assert_eq!(result.mode, FilterMode::Strict);
    assert!(!result.diagnostics.fallback_triggered);
    assert_eq!(result.total_trades(), 0);
    assert_eq!(result.final_capital(), result.initial_capital());
}

#[test]
fn bdd_missing_benchmark_degrades_gracefully() {
    // GIVEN a benchmark-enabled config whose source has no SPY
    let source = FixedSource::new().with("TREND", 100.0, 0.5, 300, 1_000_000);
    let mut engine = BacktestEngine::new(config(true)).unwrap();

    // WHEN the backtest runs
    let result = engine.run(&symbols(&["TREND"]), &source).unwrap();

    // THEN the run completes with the benchmark reported unavailable
    assert!(matches!(result.benchmark, BenchmarkStatus::Unavailable { .. }));
    assert!(!result.benchmark_enabled());
    assert!(result.total_trades() >= 1);
}

#[test]
fn bdd_unknown_and_short_symbols_are_excluded() {
    // GIVEN one good symbol, one too short, and one unknown
    let source = FixedSource::new()
        .with("TREND", 100.0, 0.5, 300, 1_000_000)
        .with("SHORT", 50.0, 0.1, 100, 1_000_000);
    let mut engine = BacktestEngine::new(config(false)).unwrap();

    // WHEN the backtest runs
    let result = engine
        .run(&symbols(&["TREND", "SHORT", "GHOST"]), &source)
        .unwrap();

    // THEN only the good symbol trades and the others are listed as excluded
    let excluded: Vec<&str> = result.excluded.iter().map(|e| e.symbol.as_str()).collect();
    assert_eq!(excluded, vec!["SHORT", "GHOST"]);
    assert_eq!(result.diagnostics.data_fetch_filtered_count, 2);
    assert!(result.trades.iter().all(|t| t.symbol == "TREND"));
}

#[test]
fn bdd_empty_universe_returns_an_empty_result() {
    // GIVEN no loadable symbols
    let source = FixedSource::new();
    let mut engine = BacktestEngine::new(config(false)).unwrap();

    // WHEN the backtest runs
    let result = engine.run(&symbols(&["GHOST"]), &source).unwrap();

    // THEN nothing trades and capital is untouched
    assert_eq!(result.total_trades(), 0);
    assert!(result.trade_log.is_empty());
    assert_eq!(result.final_capital(), result.initial_capital());
    assert_eq!(result.metrics.total_return, 0.0);
}

#[test]
fn bdd_same_inputs_same_result() {
    // GIVEN two engines with identical config and data
    let source = FixedSource::new()
        .with("AAA", 100.0, 0.5, 300, 1_000_000)
        .with("BBB", 60.0, 0.2, 300, 900_000);
    let universe = symbols(&["AAA", "BBB"]);

    // WHEN both run
    let a = BacktestEngine::new(config(false))
        .unwrap()
        .run(&universe, &source)
        .unwrap();
    let b = BacktestEngine::new(config(false))
        .unwrap()
        .run(&universe, &source)
        .unwrap();

    // THEN trades, equity, and identifiers match exactly
    assert_eq!(a.run_id, b.run_id);
    assert_eq!(a.dataset_hash, b.dataset_hash);
    assert_eq!(a.trades, b.trades);
    assert_eq!(a.equity_curve, b.equity_curve);
}

#[test]
fn bdd_artifacts_round_trip() {
    // GIVEN a finished backtest
    let source = FixedSource::new().with("TREND", 100.0, 0.5, 300, 1_000_000);
    let mut engine = BacktestEngine::new(config(false)).unwrap();
    let result = engine.run(&symbols(&["TREND"]), &source).unwrap();

    // WHEN its artifacts are saved
    let dir = tempfile::tempdir().unwrap();
    let output = OutputSection {
        dir: dir.path().to_path_buf(),
        ..OutputSection::default()
    };
    save_artifacts(&result, &output).unwrap();

    // THEN the trade log on disk matches the in-memory export
    let on_disk = std::fs::read_to_string(dir.path().join(TRADE_LOG_FILE)).unwrap();
    assert_eq!(on_disk, export_trade_log_csv(&result.trade_log).unwrap());

    // AND the JSON result loads back with the same trades
    let back = load_result(&dir.path().join(RESULT_FILE)).unwrap();
    assert_eq!(back.trades, result.trades);
    assert_eq!(back.diagnostics, result.diagnostics);

    // AND ticker statistics agree with realized P&L
    let analysis = TickerAnalysis::analyze(&result.trade_log);
    let total: f64 = analysis.stats().iter().map(|s| s.total_pnl).sum();
    assert!((total - result.realized_pnl()).abs() < 1e-6);
}
