//! TrendScan Core — domain types, indicators, detectors, and the simulation loop.
//!
//! This crate contains the heart of the screener and backtester:
//! - Domain types (bars, bar series, open positions, closed trades, trade log)
//! - Indicator engine producing a fixed set of derived columns
//! - Stage detection with the 9-condition trend template
//! - VCP detection (base, swings, contractions, pivot)
//! - The reduced daily entry filter and the strict → relaxed fallback switch
//! - The day-by-day simulation loop with diagnostics counters
//! - Bar sources (CSV directory, seeded synthetic)

pub mod analysis;
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod domain;
pub mod engine;
pub mod fallback;
pub mod filter;
pub mod indicators;
