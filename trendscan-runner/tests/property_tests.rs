//! Property tests for runner-level invariants.
//!
//! 1. Capital reconciliation: realized P&L equals final minus initial capital
//! 2. Ticker statistics: per-ticker totals sum to realized P&L
//! 3. Drawdown bounds: fraction in [-1, 0], amount non-negative
//! 4. Symbol normalization is idempotent

use chrono::NaiveDate;
use proptest::prelude::*;

use trendscan_core::data::SyntheticSource;
use trendscan_runner::metrics::{max_drawdown, max_drawdown_amount};
use trendscan_runner::{normalize_symbols, BacktestConfig, BacktestEngine, TickerAnalysis};

fn config(max_positions: usize, commission: f64) -> BacktestConfig {
    let mut config = BacktestConfig::default();
    config.backtest.start_date = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    config.backtest.end_date = NaiveDate::from_ymd_opt(2023, 6, 30).unwrap();
    config.backtest.use_benchmark = false;
    config.risk.max_positions = max_positions;
    config.risk.commission = commission;
    config
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn backtest_capital_reconciles(
        seed in 0u64..1_000,
        drift in 0.0..0.004_f64,
        max_positions in 1usize..6,
        commission in prop_oneof![Just(0.0), 0.0..0.005_f64],
    ) {
        let source = SyntheticSource::new(seed).with_drift(drift);
        let symbols: Vec<String> = ["AAA", "BBB", "CCC", "DDD"].iter().map(|s| s.to_string()).collect();
        let mut engine = BacktestEngine::new(config(max_positions, commission)).unwrap();
        let result = engine.run(&symbols, &source).unwrap();

        let change = result.final_capital() - result.initial_capital();
        prop_assert!((result.realized_pnl() - change).abs() < 1e-6 * result.initial_capital());

        let analysis = TickerAnalysis::analyze(&result.trade_log);
        let total: f64 = analysis.stats().iter().map(|s| s.total_pnl).sum();
        prop_assert!((total - result.realized_pnl()).abs() < 1e-6);
        let counted: usize = analysis.stats().iter().map(|s| s.trade_count).sum();
        prop_assert_eq!(counted, result.total_trades());
    }

    #[test]
    fn drawdown_is_bounded(equity in prop::collection::vec(1.0..1_000_000.0_f64, 1..200)) {
        let dd = max_drawdown(&equity);
        prop_assert!((-1.0..=0.0).contains(&dd));
        prop_assert!(max_drawdown_amount(&equity) >= 0.0);
    }

    #[test]
    fn normalize_is_idempotent(symbols in prop::collection::vec("[a-zA-Z ]{0,6}", 0..20)) {
        let once = normalize_symbols(&symbols);
        let twice = normalize_symbols(&once);
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.windows(2).all(|w| w[0] < w[1]));
    }
}
