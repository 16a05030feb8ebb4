//! CLI definition and dispatch.
//!
//! Progress and warnings go through `tracing` to stderr; reports (rankings,
//! summaries, signal listings) are printed to stdout.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_export::{export_backtest, write_table};
use crate::adapters::file_config_adapter::FileConfigAdapter;
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestResult, DEFAULT_INITIAL_CAPITAL};
use crate::domain::config_validation::{
    validate_backtest_config, validate_data_config, validate_rotation_config,
    validate_signal_config, validate_universe_config,
};
use crate::domain::error::StrengthError;
use crate::domain::indicator::{compute_indicators, IndicatorParams};
use crate::domain::relative_strength::{normalize, top_sectors, NormalizationMethod, RelativeStrengthEngine};
use crate::domain::rotation::{run_rotation_backtest, RotationConfig};
use crate::domain::signal::{generate_signals, SignalParams};
use crate::domain::single::{run_single_instrument_backtest, SingleConfig};
use crate::domain::universe::{parse_symbols, Market};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;
use crate::ports::sink_port::RelativeStrengthSink;

#[derive(Parser, Debug)]
#[command(name = "sectorstrength", about = "Sector relative-strength ranking and rotation backtester")]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rank the universe by normalized relative strength
    Rank {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the raw RS table as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Run the sector-rotation backtest
    Rotation {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for trades.csv and values.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the single-instrument backtest
    Single {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show indicators and recent signals for one symbol
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },
    /// Show data range for symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Installs the stderr subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // A second install (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Rank {
            config,
            output,
            top_n,
        } => run_rank(&config, output.as_deref(), top_n),
        Command::Rotation { config, output } => run_rotation(&config, output.as_deref()),
        Command::Single {
            config,
            symbol,
            output,
        } => run_single(&config, &symbol, output.as_deref()),
        Command::Signals {
            config,
            symbol,
            rows,
        } => run_signals(&config, &symbol, rows),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, StrengthError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// Every section checked up front, before any data is touched.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), StrengthError> {
    validate_data_config(config)?;
    validate_backtest_config(config)?;
    validate_universe_config(config)?;
    validate_rotation_config(config)?;
    validate_signal_config(config)?;
    Ok(())
}

fn load_validated(path: &Path) -> Result<FileConfigAdapter, StrengthError> {
    let config = load_config(path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Price source selected by `[data] source`.
pub enum DataSource {
    Csv(CsvAdapter),
    #[cfg(feature = "sqlite")]
    Sqlite {
        adapter: SqliteAdapter,
        store_relative_strength: bool,
    },
}

impl DataSource {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StrengthError> {
        let source = config.get_string("data", "source");
        match source.as_deref().map(str::trim) {
            Some("sqlite") => open_sqlite(config),
            _ => {
                let dir = config
                    .get_string("data", "csv_dir")
                    .ok_or_else(|| StrengthError::ConfigMissing {
                        section: "data".into(),
                        key: "csv_dir".into(),
                    })?;
                info!(dir = %dir, "reading prices from CSV directory");
                Ok(DataSource::Csv(CsvAdapter::new(PathBuf::from(dir))))
            }
        }
    }

    pub fn port(&self) -> &dyn PriceDataPort {
        match self {
            DataSource::Csv(adapter) => adapter,
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite { adapter, .. } => adapter,
        }
    }

    /// Where raw RS rows are persisted, if anywhere.
    pub fn sink(&self) -> Option<&dyn RelativeStrengthSink> {
        match self {
            DataSource::Csv(_) => None,
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite {
                adapter,
                store_relative_strength,
            } => store_relative_strength.then_some(adapter as &dyn RelativeStrengthSink),
        }
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<DataSource, StrengthError> {
    let adapter = SqliteAdapter::from_config(config)?;
    info!("reading prices from SQLite");
    Ok(DataSource::Sqlite {
        adapter,
        store_relative_strength: config.get_bool("sqlite", "store_relative_strength", true),
    })
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<DataSource, StrengthError> {
    Err(StrengthError::ConfigInvalid {
        section: "data".into(),
        key: "source".into(),
        reason: "built without the sqlite feature".into(),
    })
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, StrengthError> {
    let start_date = required_date(config, "start_date")?;
    let end_date = required_date(config, "end_date")?;

    let backtest = BacktestConfig {
        start_date,
        end_date,
        initial_capital: config.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL),
        risk_free_rate: config.get_double("backtest", "risk_free_rate", 0.0),
    };
    backtest.validate()?;
    Ok(backtest)
}

fn required_date(config: &dyn ConfigPort, key: &str) -> Result<NaiveDate, StrengthError> {
    let raw = config
        .get_string("backtest", key)
        .ok_or_else(|| StrengthError::ConfigMissing {
            section: "backtest".into(),
            key: key.into(),
        })?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| StrengthError::ConfigInvalid {
        section: "backtest".into(),
        key: key.into(),
        reason: "invalid date format (expected YYYY-MM-DD)".into(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub market: Market,
    pub symbols: Vec<String>,
    pub benchmark: String,
}

/// Market defaults to US; symbols and benchmark default to the market's.
pub fn resolve_universe(config: &dyn ConfigPort) -> Result<Universe, StrengthError> {
    let market = match config.get_string("universe", "market") {
        Some(raw) => raw.parse::<Market>()?,
        None => Market::Us,
    };
    let symbols = match config.get_string("universe", "symbols") {
        Some(raw) => parse_symbols(&raw)?,
        None => market.default_symbols(),
    };
    let benchmark = config
        .get_string("universe", "benchmark")
        .map(|b| b.trim().to_uppercase())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| market.benchmark().to_string());

    Ok(Universe {
        market,
        symbols,
        benchmark,
    })
}

fn get_usize(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    config.get_int(section, key, default as i64).max(1) as usize
}

pub fn build_indicator_params(config: &dyn ConfigPort) -> IndicatorParams {
    let defaults = IndicatorParams::default();
    IndicatorParams {
        price_ma_period: get_usize(config, "signals", "price_ma_period", defaults.price_ma_period),
        volume_ma_period: get_usize(config, "signals", "volume_ma_period", defaults.volume_ma_period),
    }
}

pub fn build_signal_params(config: &dyn ConfigPort) -> SignalParams {
    let defaults = SignalParams::default();
    SignalParams {
        volume_threshold: config.get_double("signals", "volume_threshold", defaults.volume_threshold),
        trend_days: get_usize(config, "signals", "trend_days", defaults.trend_days),
        trend_ratio: config.get_double("signals", "trend_ratio", defaults.trend_ratio),
        obv_lookback: get_usize(config, "signals", "obv_lookback", defaults.obv_lookback),
    }
}

pub fn build_normalization(config: &dyn ConfigPort) -> Result<NormalizationMethod, StrengthError> {
    match config.get_string("rotation", "normalization") {
        Some(raw) => raw.parse(),
        None => Ok(NormalizationMethod::ZScore),
    }
}

pub fn build_rotation_config(config: &dyn ConfigPort) -> Result<RotationConfig, StrengthError> {
    let backtest = build_backtest_config(config)?;
    let universe = resolve_universe(config)?;

    let mut rotation = RotationConfig::new(backtest, universe.symbols, &universe.benchmark);
    rotation.rebalance_freq = config.get_int("rotation", "rebalance_freq", rotation.rebalance_freq).max(1);
    rotation.top_n = get_usize(config, "rotation", "top_n", rotation.top_n);
    rotation.lookback_period = get_usize(config, "rotation", "lookback_period", rotation.lookback_period);
    rotation.signal_lookback = get_usize(config, "rotation", "signal_lookback", rotation.signal_lookback);
    rotation.normalization = build_normalization(config)?;
    rotation.rs_window = config
        .get_string("rotation", "rs_window")
        .map(|_| get_usize(config, "rotation", "rs_window", 1));
    rotation.indicators = build_indicator_params(config);
    rotation.signals = build_signal_params(config);
    Ok(rotation)
}

pub fn build_single_config(config: &dyn ConfigPort) -> Result<SingleConfig, StrengthError> {
    let mut single = SingleConfig::new(build_backtest_config(config)?);
    single.indicators = build_indicator_params(config);
    single.signals = build_signal_params(config);
    single.benchmark = Some(resolve_universe(config)?.benchmark);
    Ok(single)
}

fn run_rank(config_path: &Path, output: Option<&Path>, top_n: Option<usize>) -> Result<(), StrengthError> {
    let config = load_validated(config_path)?;
    let rotation = build_rotation_config(&config)?;
    let universe = resolve_universe(&config)?;
    let source = DataSource::from_config(&config)?;

    let mut engine = RelativeStrengthEngine::new(source.port());
    if let Some(sink) = source.sink() {
        engine = engine.with_sink(sink);
    }
    let symbols: Vec<String> = rotation
        .symbols
        .iter()
        .filter(|s| **s != rotation.benchmark)
        .cloned()
        .collect();
    let computation = engine.compute_relative_strength(
        &symbols,
        &rotation.benchmark,
        rotation.backtest.start_date,
        rotation.backtest.end_date,
        rotation.rs_window,
    )?;
    for (symbol, reason) in &computation.skipped {
        warn!(symbol = %symbol, %reason, "skipped");
    }

    let normalized = normalize(&computation.table, rotation.normalization);
    let ranked = top_sectors(&normalized, normalized.symbols().len(), rotation.lookback_period);
    let top_n = top_n.unwrap_or(rotation.top_n);

    println!(
        "Relative strength vs {} ({} normalized, last {} rows)",
        rotation.benchmark, rotation.normalization, rotation.lookback_period
    );
    for (rank, symbol) in ranked.iter().enumerate() {
        let marker = if rank < top_n { "*" } else { " " };
        let sector = universe
            .market
            .sector_of(symbol)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into());
        let latest = computation
            .table
            .column(symbol)
            .and_then(|col| col.iter().rev().flatten().next().copied());
        println!(
            "{marker} {:>2}. {:<8} {:<24} RS {}",
            rank + 1,
            symbol,
            sector,
            latest.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".into()),
        );
    }

    if let Some(path) = output {
        write_table(fs::File::create(path)?, &computation.table)?;
        info!(path = %path.display(), "relative strength table written");
    }
    Ok(())
}

fn run_rotation(config_path: &Path, output: Option<&Path>) -> Result<(), StrengthError> {
    let config = load_validated(config_path)?;
    let rotation = build_rotation_config(&config)?;
    let source = DataSource::from_config(&config)?;

    info!(
        symbols = rotation.symbols.len(),
        benchmark = %rotation.benchmark,
        top_n = rotation.top_n,
        rebalance_freq = rotation.rebalance_freq,
        "running rotation backtest"
    );
    let result = run_rotation_backtest(source.port(), &rotation)?;

    print_summary(&format!("Sector rotation vs {}", rotation.benchmark), &result);
    export_if_requested(output, &result)
}

fn run_single(config_path: &Path, symbol: &str, output: Option<&Path>) -> Result<(), StrengthError> {
    let config = load_validated(config_path)?;
    let single = build_single_config(&config)?;
    let source = DataSource::from_config(&config)?;
    let symbol = symbol.trim().to_uppercase();

    info!(symbol = %symbol, "running single-instrument backtest");
    let result = run_single_instrument_backtest(source.port(), &symbol, &single)?;

    print_summary(&format!("Single instrument {}", symbol), &result);
    export_if_requested(output, &result)
}

fn run_signals(config_path: &Path, symbol: &str, rows: usize) -> Result<(), StrengthError> {
    let config = load_validated(config_path)?;
    let backtest = build_backtest_config(&config)?;
    let source = DataSource::from_config(&config)?;
    let symbol = symbol.trim().to_uppercase();

    let bars = source
        .port()
        .get_series(&symbol, backtest.start_date, backtest.end_date)?;
    if bars.is_empty() {
        return Err(StrengthError::data_unavailable(&symbol, "no bars in the configured window"));
    }

    let frame = compute_indicators(&symbol, &bars, build_indicator_params(&config));
    let signals = generate_signals(frame, &build_signal_params(&config));
    let start = signals.len().saturating_sub(rows);

    println!("Signals for {} (last {} of {} rows)", symbol, signals.len() - start, signals.len());
    let columns = signals.indicators.columns();
    println!(
        "{:<10} {:>10} {:>12} {:>12} {:>14} {:>4} {:>4}",
        "date",
        "close",
        columns[0].to_string(),
        columns[2].to_string(),
        columns[4].to_string(),
        "BUY",
        "SELL"
    );
    for (row, signal) in signals.indicators.rows[start..].iter().zip(&signals.signals[start..]) {
        println!(
            "{:<10} {:>10.2} {:>12} {:>12} {:>14.0} {:>4} {:>4}",
            row.date,
            row.adjusted_close,
            fmt_opt(row.price_ma, 2),
            fmt_opt(row.relative_volume, 2),
            row.obv,
            if signal.buy { "x" } else { "" },
            if signal.sell { "x" } else { "" },
        );
    }

    let shown_from = signals.signals.get(start).map(|s| s.date);
    let in_view = |date: &NaiveDate| shown_from.is_some_and(|from| *date >= from);
    let recent_buys: Vec<String> = signals
        .buy_dates()
        .filter(in_view)
        .map(|d| d.to_string())
        .collect();
    let recent_sells: Vec<String> = signals
        .sell_dates()
        .filter(in_view)
        .map(|d| d.to_string())
        .collect();
    println!("Recent buy signals:  {}", join_or_none(&recent_buys));
    println!("Recent sell signals: {}", join_or_none(&recent_sells));

    if let Some(last) = signals.signals.last() {
        let state = match (last.buy, last.sell) {
            (true, true) => "BUY and SELL",
            (true, false) => "BUY",
            (false, true) => "SELL",
            (false, false) => "none",
        };
        println!("Current signal on {}: {}", last.date, state);
    }
    Ok(())
}

fn run_info(config_path: &Path, symbol: Option<&str>) -> Result<(), StrengthError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    let source = DataSource::from_config(&config)?;
    let port = source.port();

    let symbols = match symbol {
        Some(s) => vec![s.trim().to_uppercase()],
        None => port.list_symbols()?,
    };
    if symbols.is_empty() {
        println!("No symbols found");
        return Ok(());
    }

    println!("{:<10} {:<12} {:<12} {:>6}", "symbol", "first", "last", "bars");
    for symbol in &symbols {
        match port.get_data_range(symbol)? {
            Some((first, last, count)) => {
                println!("{:<10} {:<12} {:<12} {:>6}", symbol, first, last, count)
            }
            None => println!("{:<10} no data", symbol),
        }
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), StrengthError> {
    let config = load_validated(config_path)?;
    let rotation = build_rotation_config(&config)?;
    println!("Config validated successfully");
    println!(
        "  window: {} to {}, capital {:.2}",
        rotation.backtest.start_date, rotation.backtest.end_date, rotation.backtest.initial_capital
    );
    println!(
        "  universe: {} symbols vs {}",
        rotation.symbols.len(),
        rotation.benchmark
    );
    println!(
        "  rotation: top {} every {} days, {} over {} rows",
        rotation.top_n, rotation.rebalance_freq, rotation.normalization, rotation.lookback_period
    );
    Ok(())
}

fn export_if_requested(output: Option<&Path>, result: &BacktestResult) -> Result<(), StrengthError> {
    if let Some(dir) = output {
        for path in export_backtest(dir, result)? {
            info!(path = %path.display(), "written");
        }
    }
    Ok(())
}

fn print_summary(title: &str, result: &BacktestResult) {
    let p = &result.performance;
    println!("\n=== {} ===", title);
    println!("Initial Capital:   {:.2}", p.initial_capital);
    println!("Final Value:       {:.2}", p.final_value);
    println!("Total Return:      {:.2}%", p.total_return_pct);
    println!("Annualized Return: {:.2}%", p.annualized_return_pct);
    println!("Max Drawdown:      {:.2}%", p.max_drawdown_pct);
    println!("Sharpe Ratio:      {:.2}", p.sharpe_ratio);
    println!("Trades:            {}", p.trade_count);
    println!(
        "Round Trips:       {} ({} won, win rate {:.1}%)",
        p.round_trips,
        p.winning_trips,
        p.win_rate * 100.0
    );
    println!(
        "Exits:             {} on signal, {} at rebalance, {} at end of period",
        p.signal_exits, p.rebalance_exits, p.end_of_period_exits
    );
    if let Some(bench) = result.benchmark_return_pct {
        println!("Benchmark Return:  {:.2}%", bench);
    }
    if let Some(hold) = result.buy_and_hold_return_pct {
        println!("Buy & Hold Return: {:.2}%", hold);
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{:.*}", precision, v))
        .unwrap_or_else(|| "-".into())
}

fn join_or_none(dates: &[String]) -> String {
    if dates.is_empty() {
        "none".into()
    } else {
        dates.join(", ")
    }
}
