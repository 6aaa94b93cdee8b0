//! Criterion benchmarks for the runner: universe loading and a full backtest.
//!
//! Run with: `cargo bench -p trendscan-runner`

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use trendscan_core::data::SyntheticSource;
use trendscan_runner::{load_universe, BacktestConfig, BacktestEngine};

fn config() -> BacktestConfig {
    let mut config = BacktestConfig::default();
    config.backtest.start_date = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
    config.backtest.end_date = NaiveDate::from_ymd_opt(2023, 12, 29).unwrap();
    config.backtest.use_benchmark = false;
    config
}

fn universe(n: usize) -> Vec<String> {
    (0..n).map(|k| format!("SYM{k:03}")).collect()
}

fn bench_load_universe(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_universe");
    let source = SyntheticSource::new(7).with_drift(0.001);
    let window = config().history_window();

    for n in [10, 50] {
        let symbols = universe(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &symbols, |b, symbols| {
            b.iter(|| load_universe(black_box(symbols), &source, &window, None));
        });
    }
    group.finish();
}

fn bench_backtest(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest");
    group.sample_size(10);
    let source = SyntheticSource::new(7).with_drift(0.001);
    let cfg = config();

    for n in [10, 50] {
        let loaded = load_universe(&universe(n), &source, &cfg.history_window(), None);
        group.bench_with_input(BenchmarkId::from_parameter(n), &loaded, |b, loaded| {
            b.iter(|| {
                let mut engine = BacktestEngine::new(cfg.clone()).unwrap();
                engine.run_loaded(black_box(loaded)).unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_load_universe, bench_backtest);
criterion_main!(benches);
