//! Property tests for detector and engine invariants.
//!
//! Uses proptest to verify:
//! 1. Fallback monotonicity: relaxed is terminal until reset
//! 2. Contraction acceptance: accepted pullbacks shrink within tolerance
//! 3. Capital accounting: every closed trade reconciles with the cash it moved
//! 4. Purity: repeated detector calls agree

use chrono::NaiveDate;
use proptest::prelude::*;
use std::collections::BTreeMap;

use trendscan_core::analysis::{StageDetector, Swing, SwingKind, VcpDetector};
use trendscan_core::config::{EntryConfig, StageConfig, VcpConfig};
use trendscan_core::diagnostics::Diagnostics;
use trendscan_core::domain::{Bar, BarSeries, ExitReason, OpenPosition, TradeAction};
use trendscan_core::engine::{run_simulation, trading_days, EngineConfig};
use trendscan_core::fallback::{FallbackManager, FilterMode};
use trendscan_core::filter::EntryCondition;
use trendscan_core::indicators::augment;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_commission() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 0.0..0.01_f64]
}

/// Daily returns biased upward so entries actually happen.
fn arb_path(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.02..0.03_f64, len)
}

fn bars_from_returns(symbol: &str, returns: &[f64]) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
    let mut price = 50.0;
    returns
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let open = price;
            price = (price * (1.0 + r)).max(1.0);
            Bar {
                symbol: symbol.to_string(),
                date: base + chrono::Duration::days(i as i64),
                open,
                high: open.max(price) * 1.005,
                low: open.min(price) * 0.995,
                close: price,
                volume: 800_000,
            }
        })
        .collect()
}

fn swings_from_pullbacks(pullbacks: &[f64]) -> Vec<Swing> {
    let mut swings = Vec::new();
    let high = 100.0;
    for (k, p) in pullbacks.iter().enumerate() {
        swings.push(Swing {
            kind: SwingKind::High,
            price: high,
            index: 2 * k,
        });
        swings.push(Swing {
            kind: SwingKind::Low,
            price: high * (1.0 - p),
            index: 2 * k + 1,
        });
    }
    swings.push(Swing {
        kind: SwingKind::High,
        price: high,
        index: 2 * pullbacks.len(),
    });
    swings
}

// ── 1. Fallback monotonicity ─────────────────────────────────────────

proptest! {
    /// Once relaxed, no trade count brings the manager back to strict or asks to fall back again.
    #[test]
    fn fallback_is_one_way(threshold in 0usize..10, counts in prop::collection::vec(0usize..20, 1..10)) {
        let mut manager = FallbackManager::new(true, threshold);
        manager.trigger_fallback();
        for n in counts {
            prop_assert!(!manager.should_fallback(n));
            manager.trigger_fallback();
            prop_assert_eq!(manager.current_mode(), FilterMode::Relaxed);
        }
        manager.reset();
        prop_assert_eq!(manager.current_mode(), FilterMode::Strict);
        prop_assert!(!manager.is_triggered());
    }

    /// should_fallback is exactly "enabled, strict, below threshold".
    #[test]
    fn fallback_threshold(enabled in any::<bool>(), threshold in 0usize..10, n in 0usize..20) {
        let manager = FallbackManager::new(enabled, threshold);
        prop_assert_eq!(manager.should_fallback(n), enabled && n < threshold);
    }
}

// ── 2. Contraction acceptance ────────────────────────────────────────

proptest! {
    /// Accepted contraction sequences shrink within tolerance and end tight.
    #[test]
    fn accepted_contractions_shrink(pullbacks in prop::collection::vec(0.01..0.40_f64, 2..6)) {
        let config = VcpConfig::default();
        let detector = VcpDetector::new(config.clone()).unwrap();
        let swings = swings_from_pullbacks(&pullbacks);
        if let Ok(found) = detector.check_contractions(&swings) {
            prop_assert!(found.len() >= config.min_contractions);
            for pair in found.windows(2) {
                prop_assert!(pair[1] <= pair[0] * config.contraction_tolerance + 1e-12);
            }
            let last = found[found.len() - 1];
            prop_assert!(last <= config.last_contraction_max + 1e-12);
        }
    }
}

// ── 3. Capital accounting ────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Each round trip moves exactly its pnl in cash, and the account never goes negative.
    #[test]
    fn capital_reconciles(returns in arb_path(320), commission in arb_commission()) {
        let series = BarSeries::new("PROP", bars_from_returns("PROP", &returns)).unwrap();
        let universe: BTreeMap<String, _> =
            [("PROP".to_string(), augment(series, None))].into_iter().collect();
        let days = trading_days(&universe, None, NaiveDate::MIN, NaiveDate::MAX);
        let config = EngineConfig { commission, ..EngineConfig::default() };
        let stage = StageConfig::default();
        let entry = EntryCondition::new(&stage, &EntryConfig::default());
        let vcp = VcpDetector::new(VcpConfig::default()).unwrap();

        let result = run_simulation(
            &universe, &days, FilterMode::Relaxed, &config, &entry, &vcp, Diagnostics::new(),
        );

        let total_pnl: f64 = result.trades.iter().map(|t| t.pnl).sum();
        prop_assert!((result.final_capital - (config.initial_capital + total_pnl)).abs() < 1e-6);
        for row in &result.trade_log {
            prop_assert!(row.capital_after >= -1e-9);
        }
        let entries = result.trade_log.iter().filter(|r| r.action == TradeAction::Entry).count();
        prop_assert_eq!(entries, result.trades.len());
        prop_assert_eq!(result.equity_curve.len(), days.len());
    }

    /// Closing a position returns proceeds whose difference from the cost is the pnl.
    #[test]
    fn round_trip_identity(
        entry in arb_price(),
        exit in arb_price(),
        shares in 1u64..5_000,
        commission in arb_commission(),
    ) {
        let position = OpenPosition {
            symbol: "X".into(),
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            entry_price: entry,
            shares,
            stop_price: entry * 0.97,
            target_price: entry * 1.25,
            pivot: entry,
        };
        let cost = position.entry_cost(commission);
        let trade = position.close(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            exit,
            ExitReason::TargetReached,
            commission,
        );
        let moved = trade.exit_proceeds(commission) - cost;
        prop_assert!((moved - trade.pnl).abs() < 1e-6 * (1.0 + cost.abs()));
    }
}

// ── 4. Purity ────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn detectors_are_pure(returns in arb_path(300)) {
        let series = BarSeries::new("PURE", bars_from_returns("PURE", &returns)).unwrap();
        let aug = augment(series, None);
        let stage = StageDetector::new(StageConfig::default()).unwrap();
        let vcp = VcpDetector::new(VcpConfig::default()).unwrap();

        let view = aug.view();
        let first = stage.detect_stage(&view, None, FilterMode::Strict, false).unwrap();
        let second = stage.detect_stage(&view, None, FilterMode::Strict, false).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(vcp.detect_vcp(&view), vcp.detect_vcp(&view));
    }
}
