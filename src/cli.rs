//! Command-line definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvTransactionReport;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::{write_json, JsonReportAdapter};
use crate::domain::backtest::{run_dca_backtest, BacktestConfig, DcaBacktestResult};
use crate::domain::batch::{compare_strategies, run_batch, BatchResult, StrategyComparison};
use crate::domain::beta::{apply_beta_scaling, calculate_beta, BetaScaling};
use crate::domain::config_validation::{
    build_backtest_config, build_portfolio_config, read_beta_settings, read_benchmark,
    read_data_source, read_log_level, read_params, read_parameter_grid, read_rank_by,
    read_report_settings, read_symbol, read_top, strategy_name, validate_all, BenchmarkSettings,
    DataSource,
};
use crate::domain::error::DcaError;
use crate::domain::params::{DcaParams, NamedStrategy};
use crate::domain::percent::format_percent;
use crate::domain::portfolio::{
    run_portfolio_backtest, CapitalAllocation, PortfolioBacktestResult, PortfolioStock,
};
use crate::domain::price::{PriceBar, SymbolData};
use crate::domain::universe::validate_universe;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "dcagrid", about = "DCA grid strategy backtester")]
pub struct Cli {
    /// Log filter, e.g. `debug` or `dcagrid=trace`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest one symbol
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// JSON report path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Transaction CSV path
        #[arg(long)]
        transactions: Option<PathBuf>,
        /// Validate and print the resolved settings without running
        #[arg(long)]
        dry_run: bool,
    },
    /// Backtest several symbols sharing capital
    Portfolio {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        transactions: Option<PathBuf>,
    },
    /// Sweep the [batch] parameter lists
    Batch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        top: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare 2 to 5 strategy files on one symbol
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short = 's', long = "strategy", required = true)]
        strategies: Vec<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Beta of a symbol against the benchmark
    Beta {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        period: Option<usize>,
    },
    /// Score how well a symbol suits grid DCA
    Suitability {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
    },
    /// List symbols in the price store
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Show stored data for a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Command {
    fn config_path(&self) -> &Path {
        match self {
            Command::Backtest { config, .. }
            | Command::Portfolio { config, .. }
            | Command::Batch { config, .. }
            | Command::Compare { config, .. }
            | Command::Beta { config, .. }
            | Command::Suitability { config, .. }
            | Command::ListSymbols { config, .. }
            | Command::Info { config, .. }
            | Command::Validate { config } => config,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let config = match FileConfigAdapter::from_file(cli.command.config_path()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    init_logging(cli.log_level.as_deref(), read_log_level(&config).as_deref());

    let outcome = match &cli.command {
        Command::Backtest {
            symbol,
            output,
            transactions,
            dry_run,
            ..
        } => run_backtest(
            &config,
            symbol.as_deref(),
            output.as_deref(),
            transactions.as_deref(),
            *dry_run,
        ),
        Command::Portfolio {
            output,
            transactions,
            ..
        } => run_portfolio(&config, output.as_deref(), transactions.as_deref()),
        Command::Batch {
            symbol,
            top,
            output,
            ..
        } => run_batch_command(&config, symbol.as_deref(), *top, output.as_deref()),
        Command::Compare {
            strategies, symbol, ..
        } => run_compare(&config, strategies, symbol.as_deref()),
        Command::Beta { symbol, period, .. } => run_beta(&config, symbol, *period),
        Command::Suitability { symbol, .. } => run_suitability(&config, symbol),
        Command::ListSymbols { limit, offset, .. } => run_list_symbols(&config, *limit, *offset),
        Command::Info { symbol, .. } => run_info(&config, symbol),
        Command::Validate { .. } => run_validate(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// `--log-level` wins, then `RUST_LOG`, then `[logging] level`, then `info`.
pub fn init_logging(flag: Option<&str>, configured: Option<&str>) {
    let filter = match flag {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(configured.unwrap_or("info"))),
    }
    .unwrap_or_else(|_| EnvFilter::new("info"));

    // a second init (tests) is not an error
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn open_data_port(config: &dyn ConfigPort) -> Result<Box<dyn PriceDataPort>, DcaError> {
    match read_data_source(config)? {
        DataSource::Csv { path } => {
            info!(path = %path.display(), "using CSV price store");
            Ok(Box::new(CsvAdapter::new(path)))
        }
        #[cfg(feature = "sqlite")]
        DataSource::Sqlite { path, pool_size } => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            info!(%path, "using SQLite price store");
            let adapter = SqliteAdapter::open(&path, pool_size)?;
            adapter.initialize_schema()?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "sqlite"))]
        DataSource::Sqlite { .. } => Err(DcaError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: "built without the sqlite feature".into(),
        }),
    }
}

fn fetch_bars(
    port: &dyn PriceDataPort,
    symbol: &str,
    bt: &BacktestConfig,
) -> Result<Vec<PriceBar>, DcaError> {
    let bars = port.fetch_prices(symbol, bt.start_date, bt.end_date)?;
    if bars.is_empty() {
        return Err(DcaError::NoData {
            symbol: symbol.to_string(),
        });
    }
    info!(symbol, bars = bars.len(), "loaded prices");
    Ok(bars)
}

/// Beta from an explicit value, the stored stock info, or a regression
/// against the benchmark, in that order.
fn resolve_beta(
    port: &dyn PriceDataPort,
    symbol: &str,
    explicit: Option<f64>,
    bt: &BacktestConfig,
    benchmark: &BenchmarkSettings,
) -> Option<f64> {
    if explicit.is_some() {
        return explicit;
    }
    match port.get_stock_info(symbol) {
        Ok(Some(info)) => {
            if let Some(beta) = info.beta.and_then(|b| usable_beta(symbol, b)) {
                return Some(beta);
            }
        }
        Ok(None) => {}
        Err(e) => warn!(symbol, error = %e, "stock info lookup failed"),
    }
    let computed = port
        .fetch_prices(symbol, bt.start_date, bt.end_date)
        .and_then(|stock| {
            let bench = port.fetch_prices(&benchmark.symbol, bt.start_date, bt.end_date)?;
            calculate_beta(&stock, &bench, benchmark.period)
        });
    match computed {
        Ok(result) => usable_beta(symbol, result.beta),
        Err(e) => {
            warn!(symbol, benchmark = %benchmark.symbol, error = %e, "beta unavailable");
            None
        }
    }
}

/// Scaling needs a positive beta; inverse or flat movers fall back.
fn usable_beta(symbol: &str, beta: f64) -> Option<f64> {
    if beta.is_finite() && beta > 0.0 {
        Some(beta)
    } else {
        warn!(symbol, beta, "beta is not positive, ignoring it");
        None
    }
}

/// Strategy parameters with beta scaling applied when configured.
fn resolve_params(
    config: &dyn ConfigPort,
    port: &dyn PriceDataPort,
    symbol: &str,
    bt: &BacktestConfig,
) -> Result<(DcaParams, Option<f64>), DcaError> {
    let params = read_params(config, "strategy")?;
    let Some(settings) = read_beta_settings(config)? else {
        return Ok((params, None));
    };
    let benchmark = read_benchmark(config)?;
    let beta = resolve_beta(port, symbol, settings.beta, bt, &benchmark).unwrap_or_else(|| {
        warn!(symbol, "no beta available, scaling with 1.0");
        1.0
    });
    let scaled = apply_beta_scaling(&params, &BetaScaling::new(beta, settings.coefficient)?)?;
    info!(symbol, beta, coefficient = settings.coefficient, "applied beta scaling");
    Ok((scaled, Some(beta)))
}

fn path_str(path: &Path) -> Result<&str, DcaError> {
    path.to_str().ok_or_else(|| DcaError::Report {
        reason: format!("non UTF-8 path {}", path.display()),
    })
}

fn run_backtest(
    config: &dyn ConfigPort,
    symbol_override: Option<&str>,
    output: Option<&Path>,
    transactions: Option<&Path>,
    dry_run: bool,
) -> Result<(), DcaError> {
    // Stage 1: settings
    let bt = build_backtest_config(config)?;
    let symbol = match symbol_override {
        Some(s) => s.trim().to_uppercase(),
        None => read_symbol(config)?,
    };
    let base_params = read_params(config, "strategy")?;

    if dry_run {
        validate_all(config)?;
        println!("Configuration valid");
        println!("Symbol:           {symbol}");
        println!("Period:           {} to {}", bt.start_date, bt.end_date);
        println!("Initial Capital:  ${:.2}", bt.capital_for(&base_params));
        print_params(&base_params);
        return Ok(());
    }

    // Stage 2: data
    let port = open_data_port(config)?;
    let bars = fetch_bars(port.as_ref(), &symbol, &bt)?;

    // Stage 3: parameters
    let (params, beta) = resolve_params(config, port.as_ref(), &symbol, &bt)?;

    // Stage 4: run
    let result = run_dca_backtest(&symbol, &bars, &params, &bt)?;
    print_backtest_summary(&result, beta);

    // Stage 5: reports
    let report = read_report_settings(config);
    if let Some(path) = output.map(Path::to_path_buf).or(report.output) {
        JsonReportAdapter::new().write(&result, path_str(&path)?)?;
        println!("\nReport written to: {}", path.display());
    }
    if let Some(path) = transactions.map(Path::to_path_buf).or(report.transactions) {
        CsvTransactionReport::new().write(&result, path_str(&path)?)?;
        println!("Transactions written to: {}", path.display());
    }
    Ok(())
}

fn run_portfolio(
    config: &dyn ConfigPort,
    output: Option<&Path>,
    transactions: Option<&Path>,
) -> Result<(), DcaError> {
    // Stage 1: settings
    let (symbols, portfolio) = build_portfolio_config(config)?;
    let bt = build_backtest_config(config)?;
    let base_params = read_params(config, "strategy")?;
    let beta_settings = read_beta_settings(config)?;
    let benchmark = read_benchmark(config)?;

    // Stage 2: universe
    let port = open_data_port(config)?;
    let universe = validate_universe(port.as_ref(), symbols, bt.start_date, bt.end_date)?;
    for skipped in &universe.skipped {
        println!("Skipped {}: {:?}", skipped.symbol, skipped.reason);
    }

    // Stage 3: per-symbol parameters
    let needs_beta = beta_settings.is_some()
        || matches!(portfolio.allocation, CapitalAllocation::BetaWeighted);
    let mut stocks = Vec::with_capacity(universe.loaded.len());
    for (symbol, bars) in universe.loaded {
        let beta = if needs_beta {
            let explicit = beta_settings.and_then(|s| s.beta);
            resolve_beta(port.as_ref(), &symbol, explicit, &bt, &benchmark)
        } else {
            None
        };
        let params = match beta_settings {
            Some(settings) => apply_beta_scaling(
                &base_params,
                &BetaScaling::new(beta.unwrap_or(1.0), settings.coefficient)?,
            )?,
            None => base_params.clone(),
        };
        stocks.push(PortfolioStock {
            data: SymbolData::new(symbol, bars),
            params,
            beta,
        });
    }

    // Stage 4: run
    let result = run_portfolio_backtest(&stocks, &portfolio)?;
    print_portfolio_summary(&result);

    // Stage 5: reports
    let report = read_report_settings(config);
    if let Some(path) = output.map(Path::to_path_buf).or(report.output) {
        JsonReportAdapter::new().write_portfolio(&result, path_str(&path)?)?;
        println!("\nReport written to: {}", path.display());
    }
    if let Some(path) = transactions.map(Path::to_path_buf).or(report.transactions) {
        CsvTransactionReport::new().write_portfolio(&result, path_str(&path)?)?;
        println!("Transactions written to: {}", path.display());
    }
    Ok(())
}

fn run_batch_command(
    config: &dyn ConfigPort,
    symbol_override: Option<&str>,
    top: Option<usize>,
    output: Option<&Path>,
) -> Result<(), DcaError> {
    let bt = build_backtest_config(config)?;
    let symbol = match symbol_override {
        Some(s) => s.trim().to_uppercase(),
        None => read_symbol(config)?,
    };
    let grid = read_parameter_grid(config)?;
    let rank_by = read_rank_by(config)?;
    let top = match top {
        Some(n) => n.max(1),
        None => read_top(config)?,
    };

    let port = open_data_port(config)?;
    let bars = fetch_bars(port.as_ref(), &symbol, &bt)?;
    let (base, _) = resolve_params(config, port.as_ref(), &symbol, &bt)?;

    let result = run_batch(&symbol, &bars, &base, &grid, &bt, rank_by)?;
    print_batch(&result, top);

    if let Some(path) = output {
        write_json(&result, path_str(path)?)?;
        println!("\nResults written to: {}", path.display());
    }
    Ok(())
}

fn run_compare(
    config: &dyn ConfigPort,
    strategy_paths: &[PathBuf],
    symbol_override: Option<&str>,
) -> Result<(), DcaError> {
    let bt = build_backtest_config(config)?;
    let symbol = match symbol_override {
        Some(s) => s.trim().to_uppercase(),
        None => read_symbol(config)?,
    };

    let mut strategies = Vec::with_capacity(strategy_paths.len());
    for path in strategy_paths {
        info!(path = %path.display(), "loading strategy");
        let file = FileConfigAdapter::from_file(path)?;
        let name = strategy_name(&file).unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });
        strategies.push(NamedStrategy {
            name,
            params: read_params(&file, "strategy")?,
        });
    }

    let port = open_data_port(config)?;
    let bars = fetch_bars(port.as_ref(), &symbol, &bt)?;
    let comparison = compare_strategies(&symbol, &bars, &strategies, &bt)?;
    print_comparison(&comparison);
    Ok(())
}

fn run_beta(config: &dyn ConfigPort, symbol: &str, period: Option<usize>) -> Result<(), DcaError> {
    let bt = build_backtest_config(config)?;
    let mut benchmark = read_benchmark(config)?;
    if let Some(p) = period {
        benchmark.period = p;
    }
    let symbol = symbol.trim().to_uppercase();

    let port = open_data_port(config)?;
    let stock = fetch_bars(port.as_ref(), &symbol, &bt)?;
    let bench = fetch_bars(port.as_ref(), &benchmark.symbol, &bt)?;
    let result = calculate_beta(&stock, &bench, benchmark.period)?;

    println!("=== Beta: {} vs {} ===", symbol, benchmark.symbol);
    println!("Beta:             {:.3}", result.beta);
    println!("Correlation:      {:.3}", result.correlation);
    println!("Class:            {}", result.class());
    println!("Observations:     {}", result.observations);
    println!("Window:           {} to {}", result.start_date, result.end_date);
    Ok(())
}

fn run_suitability(config: &dyn ConfigPort, symbol: &str) -> Result<(), DcaError> {
    let bt = build_backtest_config(config)?;
    let symbol = symbol.trim().to_uppercase();
    let port = open_data_port(config)?;
    let bars = fetch_bars(port.as_ref(), &symbol, &bt)?;

    let result = run_dca_backtest(&symbol, &bars, &DcaParams::default(), &bt)?;
    let s = &result.metrics.suitability;
    println!("=== DCA Suitability: {symbol} ===");
    println!("Score:            {:.1} / 100 ({})", s.score, s.class);
    println!("Trade Activity:   {:.1} / 40", s.trade_activity);
    println!("Mean Reversion:   {:.1} / 30", s.mean_reversion);
    println!("Capital Eff.:     {:.1} / 30", s.capital_efficiency);
    println!(
        "Round Trips:      {} sells over {} days",
        result.metrics.trades.total_sells,
        result.snapshots.len()
    );
    Ok(())
}

fn run_list_symbols(config: &dyn ConfigPort, limit: usize, offset: usize) -> Result<(), DcaError> {
    let port = open_data_port(config)?;
    let page = port.list_symbols(limit, offset)?;
    for symbol in &page.symbols {
        println!("{symbol}");
    }
    if page.symbols.is_empty() {
        println!("No symbols at offset {offset} ({} total)", page.total_count);
    } else {
        println!(
            "\nShowing {}-{} of {}",
            offset + 1,
            offset + page.symbols.len(),
            page.total_count
        );
    }
    Ok(())
}

fn run_info(config: &dyn ConfigPort, symbol: &str) -> Result<(), DcaError> {
    let symbol = symbol.trim().to_uppercase();
    let port = open_data_port(config)?;
    let info = port
        .get_stock_info(&symbol)?
        .ok_or_else(|| DcaError::NoData {
            symbol: symbol.clone(),
        })?;

    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    println!("=== {} ===", info.symbol);
    println!("Company:          {}", or_dash(info.company_name.clone()));
    println!("Sector:           {}", or_dash(info.sector.clone()));
    println!(
        "Market Cap:       {}",
        or_dash(info.market_cap.map(|m| format!("${m:.0}")))
    );
    println!(
        "Beta:             {}",
        or_dash(info.beta.map(|b| format!("{b:.3}")))
    );
    match (info.first_date, info.last_date) {
        (Some(first), Some(last)) => {
            println!("Data Range:       {first} to {last} ({} days)", info.total_days)
        }
        _ => println!("Data Range:       no price data"),
    }
    Ok(())
}

fn run_validate(config: &dyn ConfigPort) -> Result<(), DcaError> {
    validate_all(config)?;
    println!("Configuration valid");
    Ok(())
}

fn print_params(p: &DcaParams) {
    println!("Lot Size:         ${:.2}", p.lot_size_usd);
    println!("Max Lots:         {} (sell up to {})", p.max_lots, p.max_lots_to_sell);
    println!("Grid Interval:    {}", format_percent(p.grid_interval, 2));
    println!("Profit Target:    {}", format_percent(p.profit_requirement, 2));
    if p.enable_trailing_buy {
        println!(
            "Trailing Buy:     {} drop, {} rebound",
            format_percent(p.trailing_buy_activation, 2),
            format_percent(p.trailing_buy_rebound, 2)
        );
    }
    if p.enable_trailing_sell {
        println!(
            "Trailing Sell:    {} rise, {} pullback",
            format_percent(p.trailing_sell_activation, 2),
            format_percent(p.trailing_sell_pullback, 2)
        );
    }
    if p.hard_stop_loss > 0.0 {
        println!("Stop Loss:        {}", format_percent(p.hard_stop_loss, 2));
    }
}

fn print_backtest_summary(result: &DcaBacktestResult, beta: Option<f64>) {
    let m = &result.metrics;
    println!("=== {} DCA Backtest ===", result.symbol);
    println!("Period:           {} to {}", result.start_date, result.end_date);
    if let Some(beta) = beta {
        println!("Beta:             {beta:.3}");
    }
    print_params(&result.params);
    println!();
    println!("Total Return:     {:.2}%", m.returns.total_return * 100.0);
    println!("Annualized:       {:.2}%", m.returns.annualized_return * 100.0);
    println!("Sharpe Ratio:     {:.2}", m.returns.sharpe_ratio);
    println!("Sortino Ratio:    {:.2}", m.returns.sortino_ratio);
    println!("Calmar Ratio:     {:.2}", m.returns.calmar_ratio);
    println!("Max Drawdown:     -{:.1}%", m.returns.max_drawdown * 100.0);
    println!("Realized P/L:     ${:.2}", m.realized_pnl);
    println!("Unrealized P/L:   ${:.2}", m.unrealized_pnl);
    println!("Final Value:      ${:.2}", m.final_value);
    println!(
        "Trades:           {} buys, {} sells ({} buys rejected)",
        m.trades.total_buys, m.trades.total_sells, m.trades.aborted_buys
    );
    println!("Win Rate:         {:.1}%", m.trades.win_rate * 100.0);
    println!(
        "Capital:          avg ${:.0}, max ${:.0} deployed, {:.1}% utilization",
        m.capital.avg_deployed_capital,
        m.capital.max_deployed_capital,
        m.capital.capital_utilization * 100.0
    );
    println!(
        "Suitability:      {:.1} ({})",
        m.suitability.score, m.suitability.class
    );
    if let (Some(bh), Some(diff)) = (&result.buy_and_hold, result.outperformance) {
        println!("Buy & Hold:       {:.2}%", bh.total_return * 100.0);
        println!("Outperformance:   {:+.2}%", diff * 100.0);
    }
    println!("Open Lots:        {}", result.final_lots.len());
}

fn print_portfolio_summary(result: &PortfolioBacktestResult) {
    let m = &result.metrics;
    println!("=== Portfolio Backtest ({}) ===", result.allocation);
    println!("Period:           {} to {}", result.start_date, result.end_date);
    println!(
        "Capital:          ${:.2} ({} reserve)",
        result.total_capital,
        format_percent(result.cash_reserve, 1)
    );
    println!("Total Return:     {:.2}%", m.returns.total_return * 100.0);
    println!("Annualized:       {:.2}%", m.returns.annualized_return * 100.0);
    println!("Sharpe Ratio:     {:.2}", m.returns.sharpe_ratio);
    println!("Max Drawdown:     -{:.1}%", m.returns.max_drawdown * 100.0);
    println!("Total P/L:        ${:.2}", m.total_pnl);
    println!("Final Value:      ${:.2}", m.final_value);
    println!(
        "Trades:           {} buys, {} sells ({} buys rejected)",
        m.total_buys, m.total_sells, m.rejected_buys
    );

    println!("\n=== Per-Symbol Summary ===");
    for s in &result.stocks {
        let sign = if s.total_pnl >= 0.0 { "+" } else { "" };
        println!(
            "  {}:  {} trades, {} open lots, {}${:.0} ({:.1}%)",
            s.symbol,
            s.num_trades,
            s.final_lots,
            sign,
            s.total_pnl,
            s.total_return * 100.0
        );
    }
}

fn print_batch(result: &BatchResult, top: usize) {
    println!(
        "=== Batch: {} ({} combinations, ranked by {}) ===",
        result.symbol, result.total_combinations, result.rank_by
    );
    if result.skipped > 0 {
        println!("Skipped {} invalid combinations", result.skipped);
    }
    println!(
        "{:>4}  {:>6}  {:>6}  {:>5}  {:>6}  {:>6}  {:>9}  {:>7}  {:>7}  {:>6}",
        "rank", "grid", "profit", "mom", "tb_act", "ts_act", "return", "sharpe", "calmar", "score"
    );
    for (i, e) in result.top(top).iter().enumerate() {
        let p = &e.params;
        let r = &e.metrics.returns;
        println!(
            "{:>4}  {:>6}  {:>6}  {:>5}  {:>6}  {:>6}  {:>8.2}%  {:>7.2}  {:>7.2}  {:>6.1}",
            i + 1,
            format_percent(p.grid_interval, 1),
            format_percent(p.profit_requirement, 1),
            p.momentum_based_sell,
            format_percent(p.trailing_buy_activation, 1),
            format_percent(p.trailing_sell_activation, 1),
            r.total_return * 100.0,
            r.sharpe_ratio,
            r.calmar_ratio,
            e.metrics.suitability.score
        );
    }
}

fn print_comparison(cmp: &StrategyComparison) {
    println!("=== Strategy Comparison: {} ===", cmp.symbol);
    println!(
        "{:<20}  {:>9}  {:>7}  {:>8}  {:>5}  {:>6}",
        "strategy", "return", "sharpe", "max dd", "sells", "score"
    );
    for row in &cmp.rows {
        let r = &row.metrics.returns;
        println!(
            "{:<20}  {:>8.2}%  {:>7.3}  {:>7.1}%  {:>5}  {:>6.1}",
            row.name,
            r.total_return * 100.0,
            r.sharpe_ratio,
            r.max_drawdown * 100.0,
            row.metrics.trades.total_sells,
            row.metrics.suitability.score
        );
    }
    println!("\nBest: {} ({})", cmp.best_row().name, cmp.reason);
}
