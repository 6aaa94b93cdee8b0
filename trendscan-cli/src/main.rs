//! TrendScan CLI — Stage-2 screening and backtest commands.
//!
//! Commands:
//! - `screen`: classify a universe against the trend template and write
//!   `screening_results.csv`
//! - `backtest`: run the day-by-day simulation with strict → relaxed fallback
//!   and write the trade log, ticker statistics, equity curve, and result JSON

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use trendscan_core::data::{BarSource, CsvDirSource, SyntheticSource};
use trendscan_core::fallback::FilterMode;
use trendscan_runner::{
    load_universe, normalize_symbols, save_artifacts, save_screening, BacktestConfig,
    BacktestEngine, BacktestResult, DataSourceKind, ScreenReport, Screener, TickerAnalysis,
    UniverseLoader,
};

#[derive(Parser)]
#[command(
    name = "trendscan",
    about = "TrendScan CLI — trend-template screener and breakout backtester"
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by both commands.
#[derive(Args)]
struct CommonArgs {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Symbols to process. Overrides the config's universe.
    symbols: Vec<String>,

    /// Screening results CSV with a `ticker` column to use as the universe.
    #[arg(long)]
    universe: Option<PathBuf>,

    /// Use seeded synthetic bars instead of the CSV directory.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Directory of `<SYMBOL>.csv` bar files.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Run without the benchmark; the RS condition then passes automatically.
    #[arg(long, default_value_t = false)]
    no_benchmark: bool,

    /// Output directory for artifacts.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen a universe for Stage 2 uptrends.
    Screen {
        #[command(flatten)]
        common: CommonArgs,

        /// Screen as of this date (YYYY-MM-DD). Defaults to the config end date.
        #[arg(long)]
        as_of: Option<String>,

        /// Use the relaxed threshold profile.
        #[arg(long, default_value_t = false)]
        relaxed: bool,

        /// Keep only symbols with a detected VCP.
        #[arg(long, default_value_t = false)]
        require_vcp: bool,
    },
    /// Run a backtest over a universe.
    Backtest {
        #[command(flatten)]
        common: CommonArgs,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Starting capital.
        #[arg(long)]
        capital: Option<f64>,

        /// Require a confirmed VCP breakout for every entry.
        #[arg(long, default_value_t = false)]
        use_vcp: bool,

        /// Never re-run with relaxed thresholds.
        #[arg(long, default_value_t = false)]
        no_fallback: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Screen {
            common,
            as_of,
            relaxed,
            require_vcp,
        } => run_screen_cmd(common, as_of, relaxed, require_vcp),
        Commands::Backtest {
            common,
            start,
            end,
            capital,
            use_vcp,
            no_fallback,
        } => run_backtest_cmd(common, start, end, capital, use_vcp, no_fallback),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

/// Load the config file (or defaults) and apply the shared overrides.
fn load_config(common: &CommonArgs) -> Result<BacktestConfig> {
    let mut config = match &common.config {
        Some(path) => BacktestConfig::from_file(path)?,
        None => BacktestConfig::default(),
    };
    if common.synthetic {
        config.data.source = DataSourceKind::Synthetic;
    }
    if let Some(dir) = &common.data_dir {
        config.data.dir = dir.clone();
    }
    if common.no_benchmark {
        config.backtest.use_benchmark = false;
    }
    if let Some(dir) = &common.output_dir {
        config.output.dir = dir.clone();
    }
    if let Some(path) = &common.universe {
        config.data.universe_file = Some(path.clone());
    }
    Ok(config)
}

fn build_source(config: &BacktestConfig) -> Box<dyn BarSource> {
    match config.data.source {
        DataSourceKind::Csv => Box::new(CsvDirSource::new(&config.data.dir)),
        DataSourceKind::Synthetic => {
            tracing::warn!(seed = config.data.seed, "using synthetic bars");
            Box::new(SyntheticSource::new(config.data.seed).with_drift(config.data.drift))
        }
    }
}

/// Command-line symbols first, then the universe file, then `[data].symbols`.
fn resolve_universe(common: &CommonArgs, config: &BacktestConfig) -> Result<Vec<String>> {
    let symbols = if !common.symbols.is_empty() {
        normalize_symbols(&common.symbols)
    } else if let Some(path) = &config.data.universe_file {
        UniverseLoader::from_file(path)?
    } else {
        normalize_symbols(&config.data.symbols)
    };
    if symbols.is_empty() {
        bail!("no symbols: pass them as arguments, via --universe, or in [data].symbols");
    }
    Ok(symbols)
}

fn run_screen_cmd(
    common: CommonArgs,
    as_of: Option<String>,
    relaxed: bool,
    require_vcp: bool,
) -> Result<()> {
    let mut config = load_config(&common)?;
    let as_of = as_of.as_deref().map(parse_date).transpose()?;
    if let Some(date) = as_of {
        config.backtest.end_date = date;
    }
    config.validate()?;

    let symbols = resolve_universe(&common, &config)?;
    let source = build_source(&config);
    let mode = if relaxed {
        FilterMode::Relaxed
    } else {
        FilterMode::Strict
    };

    let loaded = load_universe(
        &symbols,
        source.as_ref(),
        &config.history_window(),
        config.benchmark_symbol(),
    );
    let screener = Screener::new(config.stage.clone(), config.vcp.clone(), mode, require_vcp)?;
    let report = screener.screen(&loaded, as_of)?;

    print_screen(&report, loaded.requested);
    let path = save_screening(&report.rows, &config.output.dir)?;
    println!("Screening results saved to: {}", path.display());
    Ok(())
}

fn run_backtest_cmd(
    common: CommonArgs,
    start: Option<String>,
    end: Option<String>,
    capital: Option<f64>,
    use_vcp: bool,
    no_fallback: bool,
) -> Result<()> {
    let mut config = load_config(&common)?;
    if let Some(s) = start.as_deref() {
        config.backtest.start_date = parse_date(s)?;
    }
    if let Some(e) = end.as_deref() {
        config.backtest.end_date = parse_date(e)?;
    }
    if let Some(c) = capital {
        config.backtest.initial_capital = c;
    }
    if use_vcp {
        config.entry.use_vcp = true;
    }
    if no_fallback {
        config.stage.auto_fallback_enabled = false;
    }

    let symbols = resolve_universe(&common, &config)?;
    let source = build_source(&config);
    let top_n = config.output.top_n;
    let output = config.output.clone();

    let mut engine = BacktestEngine::new(config)?;
    let result = engine.run(&symbols, source.as_ref())?;

    print_summary(&result);
    let analysis = TickerAnalysis::analyze(&result.trade_log);
    analysis.log_summary(top_n);
    print_tickers(&analysis, top_n);

    let written = save_artifacts(&result, &output)?;
    for path in &written {
        println!("Saved: {}", path.display());
    }
    Ok(())
}

fn print_screen(report: &ScreenReport, requested: usize) {
    let funnel = report.tracker.metrics();
    println!();
    println!("=== Stage 2 Screen ===");
    println!("Requested:      {requested}");
    println!("Checked:        {}", funnel.total_checks);
    println!("Passed:         {}", funnel.final_passed);
    if let Some(rate) = funnel.pass_rate() {
        println!("Pass Rate:      {rate:.1}%");
    }
    if report.rows.is_empty() {
        println!();
        for (condition, count) in report.tracker.top_failures(5) {
            println!("  {condition:<24} failed {count}");
        }
        println!();
        return;
    }
    println!();
    println!(
        "{:<8} {:>10} {:>10} {:>8} {:>5} {:>10}",
        "Ticker", "Price", "52w High", "Off Hi", "VCP", "Pivot"
    );
    println!("{}", "-".repeat(56));
    for row in &report.rows {
        let pivot = row
            .pivot
            .map(|p| format!("{p:.2}"))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<8} {:>10.2} {:>10.2} {:>7.1}% {:>5} {:>10}",
            row.ticker,
            row.current_price,
            row.high_52w,
            row.distance_from_high_pct,
            if row.has_vcp { "yes" } else { "no" },
            pivot
        );
    }
    println!();
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Run:            {}", &result.run_id[..12.min(result.run_id.len())]);
    println!("Period:         {} to {}", result.start_date, result.end_date);
    println!("Mode:           {}", result.mode);
    if result.fallback.triggered {
        println!(
            "Fallback:       strict pass had {} trades, relaxed re-run reported",
            result.diagnostics.strict_mode_trades.unwrap_or(0)
        );
    }
    println!("Benchmark:      {}", if result.benchmark_enabled() { "on" } else { "off" });
    println!("Trades:         {}", m.trade_count);
    println!();
    println!("--- Performance ---");
    println!("Initial:        {:.2}", m.initial_capital);
    println!("Final:          {:.2}", m.final_capital);
    println!("Total Return:   {:.2} ({:.2}%)", m.total_return, m.total_return_pct * 100.0);
    println!("CAGR:           {:.2}%", m.cagr * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Sortino:        {:.3}", m.sortino);
    println!("Calmar:         {:.3}", m.calmar);
    println!("Max Drawdown:   {:.2} ({:.2}%)", m.max_drawdown, m.max_drawdown_pct * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Avg Win:        {:.2}", m.avg_win);
    println!("Avg Loss:       {:.2}", m.avg_loss);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Max Consec Win: {}", m.max_consecutive_wins);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    if !result.excluded.is_empty() {
        println!();
        println!("Excluded {} symbol(s):", result.excluded.len());
        for e in &result.excluded {
            println!("  {:<8} {}", e.symbol, e.reason);
        }
    }
    if m.trade_count == 0 {
        println!();
        println!("No trades. Likely causes:");
        for line in result.diagnostics.no_trade_explanations() {
            println!("  - {line}");
        }
    }
    println!();
}

fn print_tickers(analysis: &TickerAnalysis, n: usize) {
    if analysis.is_empty() {
        return;
    }
    println!("--- Top Winners ---");
    for s in analysis.top_winners(n) {
        println!("{:<8} {:>12.2} ({} trades)", s.ticker, s.total_pnl, s.trade_count);
    }
    println!("--- Bottom Losers ---");
    for s in analysis.bottom_losers(n) {
        println!("{:<8} {:>12.2} ({} trades)", s.ticker, s.total_pnl, s.trade_count);
    }
    println!();
}
