//! Configuration reading and validation.
//!
//! Every reader takes a `&dyn ConfigPort` and reports problems as
//! `ConfigMissing` or `ConfigInvalid` carrying the offending section and key.
//! Percent keys accept whole numbers (`10` or `10%`) and come back as
//! decimal fractions.

use crate::domain::backtest::BacktestConfig;
use crate::domain::batch::{ParameterGrid, RankBy};
use crate::domain::error::DcaError;
use crate::domain::params::DcaParams;
use crate::domain::percent::{parse_percent, parse_percent_list};
use crate::domain::portfolio::{CapitalAllocation, PortfolioConfig};
use crate::domain::universe::{parse_allocations, parse_symbols};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::path::PathBuf;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_BENCHMARK: &str = "SPY";
pub const DEFAULT_BETA_PERIOD: usize = 252;
pub const DEFAULT_POOL_SIZE: u32 = 4;
pub const DEFAULT_TOP: usize = 10;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> DcaError {
    DcaError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn missing(section: &str, key: &str) -> DcaError {
    DcaError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

/// Trimmed value, `None` when absent or blank.
fn read_string(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn require_string(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, DcaError> {
    read_string(config, section, key).ok_or_else(|| missing(section, key))
}

// get_double/get_int fall back to the default on garbage, so numbers are
// parsed here to surface typos.
fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, DcaError> {
    match read_string(config, section, key) {
        None => Ok(default),
        Some(s) => s
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(section, key, format!("'{s}' is not a number"))),
    }
}

fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, DcaError> {
    match read_string(config, section, key) {
        None => Ok(default),
        Some(s) => s.parse::<usize>().map_err(|_| {
            invalid(section, key, format!("'{s}' is not a non-negative integer"))
        }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn read_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, DcaError> {
    match read_string(config, section, key) {
        None => Ok(default),
        Some(s) => parse_bool(&s)
            .ok_or_else(|| invalid(section, key, format!("'{s}' is not a boolean"))),
    }
}

fn read_percent(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, DcaError> {
    match read_string(config, section, key) {
        None => Ok(default),
        Some(s) => parse_percent(&s).map_err(|e| invalid(section, key, e.to_string())),
    }
}

pub fn parse_date(value: Option<&str>, section: &str, field: &str) -> Result<NaiveDate, DcaError> {
    match value.map(str::trim) {
        None | Some("") => Err(missing(section, field)),
        Some(s) => NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| {
            invalid(
                section,
                field,
                format!("invalid {field} '{s}', expected YYYY-MM-DD"),
            )
        }),
    }
}

/// Re-home a parameter error under the section it was read from.
fn in_section(section: &str, err: DcaError) -> DcaError {
    match err {
        DcaError::InvalidParameter { field, reason } => invalid(section, &field, reason),
        other => other,
    }
}

/// Strategy parameters from `section` (normally `[strategy]`), falling back
/// to the defaults for absent keys.
pub fn read_params(config: &dyn ConfigPort, section: &str) -> Result<DcaParams, DcaError> {
    let d = DcaParams::default();
    let params = DcaParams {
        lot_size_usd: read_f64(config, section, "lot_size_usd", d.lot_size_usd)?,
        max_lots: read_usize(config, section, "max_lots", d.max_lots)?,
        max_lots_to_sell: read_usize(config, section, "max_lots_to_sell", d.max_lots_to_sell)?,
        grid_interval: read_percent(config, section, "grid_interval", d.grid_interval)?,
        profit_requirement: read_percent(
            config,
            section,
            "profit_requirement",
            d.profit_requirement,
        )?,
        trailing_buy_activation: read_percent(
            config,
            section,
            "trailing_buy_activation",
            d.trailing_buy_activation,
        )?,
        trailing_buy_rebound: read_percent(
            config,
            section,
            "trailing_buy_rebound",
            d.trailing_buy_rebound,
        )?,
        trailing_sell_activation: read_percent(
            config,
            section,
            "trailing_sell_activation",
            d.trailing_sell_activation,
        )?,
        trailing_sell_pullback: read_percent(
            config,
            section,
            "trailing_sell_pullback",
            d.trailing_sell_pullback,
        )?,
        enable_trailing_buy: read_bool(config, section, "enable_trailing_buy", d.enable_trailing_buy)?,
        enable_trailing_sell: read_bool(
            config,
            section,
            "enable_trailing_sell",
            d.enable_trailing_sell,
        )?,
        enable_dynamic_grid: read_bool(config, section, "enable_dynamic_grid", d.enable_dynamic_grid)?,
        normalize_to_reference: read_bool(
            config,
            section,
            "normalize_to_reference",
            d.normalize_to_reference,
        )?,
        dynamic_grid_multiplier: read_f64(
            config,
            section,
            "dynamic_grid_multiplier",
            d.dynamic_grid_multiplier,
        )?,
        enable_consecutive_incremental_buy_grid: read_bool(
            config,
            section,
            "enable_consecutive_incremental_buy_grid",
            d.enable_consecutive_incremental_buy_grid,
        )?,
        grid_consecutive_increment: read_percent(
            config,
            section,
            "grid_consecutive_increment",
            d.grid_consecutive_increment,
        )?,
        enable_consecutive_incremental_sell_profit: read_bool(
            config,
            section,
            "enable_consecutive_incremental_sell_profit",
            d.enable_consecutive_incremental_sell_profit,
        )?,
        momentum_based_buy: read_bool(config, section, "momentum_based_buy", d.momentum_based_buy)?,
        momentum_based_sell: read_bool(config, section, "momentum_based_sell", d.momentum_based_sell)?,
        momentum_lookback_days: read_usize(
            config,
            section,
            "momentum_lookback_days",
            d.momentum_lookback_days,
        )?,
        hard_stop_loss: read_percent(config, section, "hard_stop_loss", d.hard_stop_loss)?,
        commission_per_trade: read_f64(
            config,
            section,
            "commission_per_trade",
            d.commission_per_trade,
        )?,
        commission_pct: read_f64(config, section, "commission_pct", d.commission_pct)?,
        slippage_pct: read_f64(config, section, "slippage_pct", d.slippage_pct)?,
    };
    params.validate().map_err(|e| in_section(section, e))?;
    Ok(params)
}

pub fn strategy_name(config: &dyn ConfigPort) -> Option<String> {
    read_string(config, "strategy", "name")
}

/// Dates, capital and risk-free rate from `[backtest]`.
pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, DcaError> {
    let start_date = parse_date(
        config.get_string("backtest", "start_date").as_deref(),
        "backtest",
        "start_date",
    )?;
    let end_date = parse_date(
        config.get_string("backtest", "end_date").as_deref(),
        "backtest",
        "end_date",
    )?;
    if start_date >= end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }

    let initial_capital = match read_string(config, "backtest", "initial_capital") {
        None => None,
        Some(_) => {
            let value = read_f64(config, "backtest", "initial_capital", 0.0)?;
            if value <= 0.0 {
                return Err(invalid(
                    "backtest",
                    "initial_capital",
                    "initial_capital must be positive",
                ));
            }
            Some(value)
        }
    };

    let risk_free_rate = read_percent(config, "backtest", "risk_free_rate", 0.0)?;
    if !(0.0..1.0).contains(&risk_free_rate) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 100",
        ));
    }

    Ok(BacktestConfig {
        start_date,
        end_date,
        initial_capital,
        risk_free_rate,
    })
}

/// `[backtest] symbol`, upper-cased.
pub fn read_symbol(config: &dyn ConfigPort) -> Result<String, DcaError> {
    Ok(require_string(config, "backtest", "symbol")?.to_uppercase())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaSettings {
    pub coefficient: f64,
    /// Fixed beta instead of looking one up.
    pub beta: Option<f64>,
}

/// `None` unless `[backtest] beta_scaling` is on.
pub fn read_beta_settings(config: &dyn ConfigPort) -> Result<Option<BetaSettings>, DcaError> {
    if !read_bool(config, "backtest", "beta_scaling", false)? {
        return Ok(None);
    }
    let coefficient = read_f64(config, "backtest", "beta_coefficient", 1.0)?;
    if coefficient <= 0.0 {
        return Err(invalid(
            "backtest",
            "beta_coefficient",
            "beta_coefficient must be positive",
        ));
    }
    let beta = match read_string(config, "backtest", "beta") {
        None => None,
        Some(_) => {
            let value = read_f64(config, "backtest", "beta", 1.0)?;
            if value <= 0.0 {
                return Err(invalid("backtest", "beta", "beta must be positive"));
            }
            Some(value)
        }
    };
    Ok(Some(BetaSettings { coefficient, beta }))
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkSettings {
    pub symbol: String,
    pub period: usize,
}

pub fn read_benchmark(config: &dyn ConfigPort) -> Result<BenchmarkSettings, DcaError> {
    let symbol = read_string(config, "benchmark", "symbol")
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| DEFAULT_BENCHMARK.to_string());
    let period = read_usize(config, "benchmark", "period", DEFAULT_BETA_PERIOD)?;
    if !(crate::domain::beta::MIN_BETA_PERIOD..=crate::domain::beta::MAX_BETA_PERIOD)
        .contains(&period)
    {
        return Err(invalid(
            "benchmark",
            "period",
            format!(
                "period must be between {} and {}",
                crate::domain::beta::MIN_BETA_PERIOD,
                crate::domain::beta::MAX_BETA_PERIOD
            ),
        ));
    }
    Ok(BenchmarkSettings { symbol, period })
}

/// Symbols and capital split from `[portfolio]`; dates and risk-free rate
/// are shared with `[backtest]`.
pub fn build_portfolio_config(
    config: &dyn ConfigPort,
) -> Result<(Vec<String>, PortfolioConfig), DcaError> {
    let raw_symbols = require_string(config, "portfolio", "symbols")?;
    let symbols =
        parse_symbols(&raw_symbols).map_err(|e| invalid("portfolio", "symbols", e.to_string()))?;

    let total_capital = match read_string(config, "portfolio", "total_capital") {
        None => return Err(missing("portfolio", "total_capital")),
        Some(_) => read_f64(config, "portfolio", "total_capital", 0.0)?,
    };
    if total_capital <= 0.0 {
        return Err(invalid(
            "portfolio",
            "total_capital",
            "total_capital must be positive",
        ));
    }

    let cash_reserve = read_percent(config, "portfolio", "cash_reserve", 0.0)?;

    let allocation = match read_string(config, "portfolio", "allocation")
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        None | Some("shared") => CapitalAllocation::SharedPool,
        Some("beta_weighted") => CapitalAllocation::BetaWeighted,
        Some("weighted") => {
            let raw = require_string(config, "portfolio", "allocations")?;
            let weights = parse_allocations(&raw)
                .map_err(|e| invalid("portfolio", "allocations", e.to_string()))?;
            if let Some((symbol, _)) = weights.iter().find(|(s, _)| !symbols.contains(s)) {
                return Err(invalid(
                    "portfolio",
                    "allocations",
                    format!("{symbol} is not in the symbol list"),
                ));
            }
            CapitalAllocation::Weighted(weights)
        }
        Some(other) => {
            return Err(invalid(
                "portfolio",
                "allocation",
                format!("unknown allocation '{other}', expected shared, weighted or beta_weighted"),
            ));
        }
    };

    let backtest = build_backtest_config(config)?;
    let portfolio = PortfolioConfig {
        total_capital,
        cash_reserve,
        allocation,
        risk_free_rate: backtest.risk_free_rate,
        start_date: backtest.start_date,
        end_date: backtest.end_date,
    };
    portfolio
        .validate()
        .map_err(|e| in_section("portfolio", e))?;
    Ok((symbols, portfolio))
}

fn read_percent_list(config: &dyn ConfigPort, key: &str) -> Result<Vec<f64>, DcaError> {
    match read_string(config, "batch", key) {
        None => Ok(Vec::new()),
        Some(s) => parse_percent_list(&s).map_err(|e| invalid("batch", key, e.to_string())),
    }
}

/// Sweep lists from `[batch]`.
pub fn read_parameter_grid(config: &dyn ConfigPort) -> Result<ParameterGrid, DcaError> {
    let grid_interval = read_percent_list(config, "grid_intervals")?;
    if grid_interval.is_empty() {
        return Err(missing("batch", "grid_intervals"));
    }
    let profit_requirement = read_percent_list(config, "profit_requirements")?;
    if profit_requirement.is_empty() {
        return Err(missing("batch", "profit_requirements"));
    }

    let momentum_based_sell = match read_string(config, "batch", "momentum_based_sell") {
        None => Vec::new(),
        Some(s) => s
            .split(',')
            .filter(|t| !t.trim().is_empty())
            .map(|t| {
                parse_bool(t).ok_or_else(|| {
                    invalid(
                        "batch",
                        "momentum_based_sell",
                        format!("'{}' is not a boolean", t.trim()),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
    };

    let grid = ParameterGrid {
        grid_interval,
        profit_requirement,
        momentum_based_sell,
        trailing_buy_activation: read_percent_list(config, "trailing_buy_activations")?,
        trailing_sell_activation: read_percent_list(config, "trailing_sell_activations")?,
    };
    if grid.combination_count() > crate::domain::batch::MAX_COMBINATIONS {
        return Err(invalid(
            "batch",
            "grid_intervals",
            format!(
                "{} combinations exceeds the limit of {}",
                grid.combination_count(),
                crate::domain::batch::MAX_COMBINATIONS
            ),
        ));
    }
    Ok(grid)
}

pub fn read_rank_by(config: &dyn ConfigPort) -> Result<RankBy, DcaError> {
    match read_string(config, "batch", "rank_by") {
        None => Ok(RankBy::TotalReturn),
        Some(s) => s
            .parse()
            .map_err(|_| invalid("batch", "rank_by", format!("unknown ranking '{s}'"))),
    }
}

pub fn read_top(config: &dyn ConfigPort) -> Result<usize, DcaError> {
    let top = read_usize(config, "batch", "top", DEFAULT_TOP)?;
    if top == 0 {
        return Err(invalid("batch", "top", "top must be at least 1"));
    }
    Ok(top)
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Sqlite { path: String, pool_size: u32 },
    Csv { path: PathBuf },
}

/// `[data] source` (default sqlite) plus the matching section.
pub fn read_data_source(config: &dyn ConfigPort) -> Result<DataSource, DcaError> {
    let source = read_string(config, "data", "source")
        .map(|s| s.to_lowercase())
        .unwrap_or_else(|| "sqlite".to_string());
    match source.as_str() {
        "sqlite" => {
            let path = require_string(config, "sqlite", "path")?;
            let pool_size = read_usize(config, "sqlite", "pool_size", DEFAULT_POOL_SIZE as usize)?;
            if pool_size == 0 || pool_size > u32::MAX as usize {
                return Err(invalid("sqlite", "pool_size", "pool_size must be at least 1"));
            }
            Ok(DataSource::Sqlite {
                path,
                pool_size: pool_size as u32,
            })
        }
        "csv" => Ok(DataSource::Csv {
            path: PathBuf::from(require_string(config, "csv", "path")?),
        }),
        other => Err(invalid(
            "data",
            "source",
            format!("unknown data source '{other}', expected sqlite or csv"),
        )),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSettings {
    pub output: Option<PathBuf>,
    pub transactions: Option<PathBuf>,
}

pub fn read_report_settings(config: &dyn ConfigPort) -> ReportSettings {
    ReportSettings {
        output: read_string(config, "report", "output").map(PathBuf::from),
        transactions: read_string(config, "report", "transactions").map(PathBuf::from),
    }
}

pub fn read_log_level(config: &dyn ConfigPort) -> Option<String> {
    read_string(config, "logging", "level")
}

fn has_section_key(config: &dyn ConfigPort, section: &str, key: &str) -> bool {
    read_string(config, section, key).is_some()
}

/// Validate every section present in the file.
///
/// `[data]`, `[backtest]` dates and `[strategy]` are always checked.
/// `[portfolio]` and `[batch]` only when they carry their list keys.
pub fn validate_all(config: &dyn ConfigPort) -> Result<(), DcaError> {
    read_data_source(config)?;
    build_backtest_config(config)?;
    read_params(config, "strategy")?;
    read_beta_settings(config)?;
    read_benchmark(config)?;
    if has_section_key(config, "portfolio", "symbols") {
        build_portfolio_config(config)?;
    }
    if has_section_key(config, "batch", "grid_intervals")
        || has_section_key(config, "batch", "profit_requirements")
    {
        read_parameter_grid(config)?;
        read_rank_by(config)?;
        read_top(config)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const BASE: &str = "[sqlite]\npath = prices.db\n[backtest]\nsymbol = aapl\nstart_date = 2020-01-01\nend_date = 2024-12-31\n";

    fn with(extra: &str) -> FileConfigAdapter {
        make_config(&format!("{BASE}{extra}"))
    }

    #[test]
    fn minimal_config_is_valid() {
        assert!(validate_all(&make_config(BASE)).is_ok());
    }

    #[test]
    fn defaults_when_strategy_absent() {
        let params = read_params(&make_config(BASE), "strategy").unwrap();
        assert_eq!(params, DcaParams::default());
    }

    #[test]
    fn percent_keys_read_as_fractions() {
        let config = with(
            "[strategy]\ngrid_interval = 15\nprofit_requirement = 3%\nhard_stop_loss = 40\nlot_size_usd = 2500\nmax_lots = 4\nenable_trailing_buy = no\n",
        );
        let params = read_params(&config, "strategy").unwrap();
        assert!((params.grid_interval - 0.15).abs() < 1e-12);
        assert!((params.profit_requirement - 0.03).abs() < 1e-12);
        assert!((params.hard_stop_loss - 0.40).abs() < 1e-12);
        assert_eq!(params.lot_size_usd, 2500.0);
        assert_eq!(params.max_lots, 4);
        assert!(!params.enable_trailing_buy);
        assert!(params.enable_trailing_sell);
    }

    #[test]
    fn bad_number_is_reported_with_key() {
        let err = read_params(&with("[strategy]\nlot_size_usd = lots\n"), "strategy").unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { section, key, .. }
            if section == "strategy" && key == "lot_size_usd"));
    }

    #[test]
    fn out_of_range_param_is_config_invalid() {
        let err = read_params(&with("[strategy]\ngrid_interval = 150\n"), "strategy").unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "grid_interval"));

        let err =
            read_params(&with("[strategy]\nmax_lots = 2\nmax_lots_to_sell = 3\n"), "strategy")
                .unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "max_lots_to_sell"));
    }

    #[test]
    fn bad_bool_rejected() {
        let err = read_params(&with("[strategy]\nmomentum_based_buy = maybe\n"), "strategy")
            .unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "momentum_based_buy"));
    }

    #[test]
    fn backtest_config_reads_dates_and_capital() {
        let config = with("initial_capital = 50000\nrisk_free_rate = 4\n");
        let bt = build_backtest_config(&config).unwrap();
        assert_eq!(bt.start_date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        assert_eq!(bt.initial_capital, Some(50000.0));
        assert!((bt.risk_free_rate - 0.04).abs() < 1e-12);
        assert_eq!(read_symbol(&config).unwrap(), "AAPL");
    }

    #[test]
    fn missing_start_date() {
        let config = make_config("[backtest]\nend_date = 2024-12-31\n");
        let err = build_backtest_config(&config).unwrap_err();
        assert!(matches!(err, DcaError::ConfigMissing { key, .. } if key == "start_date"));
    }

    #[test]
    fn malformed_date() {
        let config = make_config("[backtest]\nstart_date = 01/01/2020\nend_date = 2024-12-31\n");
        let err = build_backtest_config(&config).unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn start_after_end() {
        let config = make_config("[backtest]\nstart_date = 2024-01-01\nend_date = 2023-01-01\n");
        assert!(build_backtest_config(&config).is_err());
    }

    #[test]
    fn zero_capital_rejected() {
        let err = build_backtest_config(&with("initial_capital = 0\n")).unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "initial_capital"));
    }

    #[test]
    fn missing_symbol() {
        let config = make_config("[backtest]\nstart_date = 2020-01-01\n");
        assert!(matches!(
            read_symbol(&config),
            Err(DcaError::ConfigMissing { key, .. }) if key == "symbol"
        ));
    }

    #[test]
    fn beta_settings() {
        assert_eq!(read_beta_settings(&make_config(BASE)).unwrap(), None);
        let settings = read_beta_settings(&with("beta_scaling = true\nbeta_coefficient = 0.5\nbeta = 1.4\n"))
            .unwrap()
            .unwrap();
        assert_eq!(settings.coefficient, 0.5);
        assert_eq!(settings.beta, Some(1.4));
        assert!(read_beta_settings(&with("beta_scaling = true\nbeta = -1\n")).is_err());
    }

    #[test]
    fn benchmark_defaults() {
        let bench = read_benchmark(&make_config(BASE)).unwrap();
        assert_eq!(bench.symbol, "SPY");
        assert_eq!(bench.period, 252);
        let err = read_benchmark(&with("[benchmark]\nperiod = 5\n")).unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "period"));
    }

    #[test]
    fn portfolio_shared_by_default() {
        let config = with("[portfolio]\nsymbols = aapl, msft\ntotal_capital = 100000\ncash_reserve = 10\n");
        let (symbols, portfolio) = build_portfolio_config(&config).unwrap();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(portfolio.allocation, CapitalAllocation::SharedPool);
        assert!((portfolio.cash_reserve - 0.10).abs() < 1e-12);
        assert_eq!(portfolio.total_capital, 100000.0);
    }

    #[test]
    fn portfolio_weighted() {
        let config = with(
            "[portfolio]\nsymbols = AAPL,MSFT\ntotal_capital = 1000\nallocation = weighted\nallocations = AAPL:25,MSFT:75\n",
        );
        let (_, portfolio) = build_portfolio_config(&config).unwrap();
        match portfolio.allocation {
            CapitalAllocation::Weighted(w) => {
                assert_eq!(w[0].0, "AAPL");
                assert!((w[1].1 - 0.75).abs() < 1e-12);
            }
            other => panic!("unexpected allocation {other:?}"),
        }
    }

    #[test]
    fn portfolio_weighted_unknown_symbol() {
        let config = with(
            "[portfolio]\nsymbols = AAPL,MSFT\ntotal_capital = 1000\nallocation = weighted\nallocations = AAPL:50,TSLA:50\n",
        );
        let err = build_portfolio_config(&config).unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "allocations"));
    }

    #[test]
    fn portfolio_errors() {
        let err = build_portfolio_config(&with("[portfolio]\nsymbols = A,B\n")).unwrap_err();
        assert!(matches!(err, DcaError::ConfigMissing { key, .. } if key == "total_capital"));

        let err = build_portfolio_config(&with(
            "[portfolio]\nsymbols = A,B\ntotal_capital = 10\nallocation = random\n",
        ))
        .unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "allocation"));

        let err = build_portfolio_config(&with(
            "[portfolio]\nsymbols = A,B\ntotal_capital = 10\ncash_reserve = 100\n",
        ))
        .unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { section, key, .. }
            if section == "portfolio" && key == "cash_reserve"));
    }

    #[test]
    fn parameter_grid_lists() {
        let config = with(
            "[batch]\ngrid_intervals = 5,10,15\nprofit_requirements = 3%, 5%\nmomentum_based_sell = true,false\nrank_by = sharpe\ntop = 3\n",
        );
        let grid = read_parameter_grid(&config).unwrap();
        assert_eq!(grid.grid_interval.len(), 3);
        assert!((grid.profit_requirement[1] - 0.05).abs() < 1e-12);
        assert_eq!(grid.momentum_based_sell, vec![true, false]);
        assert!(grid.trailing_buy_activation.is_empty());
        assert_eq!(grid.combination_count(), 12);
        assert_eq!(read_rank_by(&config).unwrap(), RankBy::Sharpe);
        assert_eq!(read_top(&config).unwrap(), 3);
    }

    #[test]
    fn parameter_grid_requires_lists() {
        let err = read_parameter_grid(&with("[batch]\nprofit_requirements = 5\n")).unwrap_err();
        assert!(matches!(err, DcaError::ConfigMissing { key, .. } if key == "grid_intervals"));
        let err = read_parameter_grid(&with("[batch]\ngrid_intervals = 5,x\nprofit_requirements = 5\n"))
            .unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "grid_intervals"));
    }

    #[test]
    fn data_source_selection() {
        assert_eq!(
            read_data_source(&make_config(BASE)).unwrap(),
            DataSource::Sqlite {
                path: "prices.db".into(),
                pool_size: DEFAULT_POOL_SIZE
            }
        );
        let csv = make_config("[data]\nsource = CSV\n[csv]\npath = /data/prices\n");
        assert_eq!(
            read_data_source(&csv).unwrap(),
            DataSource::Csv {
                path: PathBuf::from("/data/prices")
            }
        );
        let err = read_data_source(&make_config("[data]\nsource = csv\n")).unwrap_err();
        assert!(matches!(err, DcaError::ConfigMissing { section, .. } if section == "csv"));
        let err = read_data_source(&make_config("[data]\nsource = parquet\n")).unwrap_err();
        assert!(matches!(err, DcaError::ConfigInvalid { key, .. } if key == "source"));
    }

    #[test]
    fn report_and_logging() {
        let config = with("[report]\noutput = out.json\n[logging]\nlevel = debug\n");
        let report = read_report_settings(&config);
        assert_eq!(report.output, Some(PathBuf::from("out.json")));
        assert_eq!(report.transactions, None);
        assert_eq!(read_log_level(&config).as_deref(), Some("debug"));
    }

    #[test]
    fn validate_all_checks_optional_sections() {
        let bad_batch = with("[batch]\ngrid_intervals = 10\n");
        assert!(matches!(
            validate_all(&bad_batch),
            Err(DcaError::ConfigMissing { key, .. }) if key == "profit_requirements"
        ));
        let bad_portfolio = with("[portfolio]\nsymbols = A,,B\ntotal_capital = 5\n");
        assert!(validate_all(&bad_portfolio).is_err());
    }
}
