//! Beta calculation against a benchmark and beta scaling of strategy
//! parameters.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use super::error::DcaError;
use super::params::DcaParams;
use super::price::PriceBar;

pub const MIN_BETA_PERIOD: usize = 30;
pub const MAX_BETA_PERIOD: usize = 1260;

const OPEN_UPPER: f64 = 0.99;
const MIN_GRID_INTERVAL: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BetaScaling {
    pub beta: f64,
    pub coefficient: f64,
}

impl BetaScaling {
    pub fn new(beta: f64, coefficient: f64) -> Result<Self, DcaError> {
        if !(beta.is_finite() && beta > 0.0) {
            return Err(DcaError::invalid("beta", "must be a positive number"));
        }
        if !(coefficient.is_finite() && coefficient > 0.0) {
            return Err(DcaError::invalid(
                "beta_coefficient",
                "must be a positive number",
            ));
        }
        Ok(Self { beta, coefficient })
    }

    pub fn multiplier(&self) -> f64 {
        self.beta * self.coefficient
    }
}

/// Scale the rate parameters by `beta * coefficient`, clamping each back
/// into its legal range.
pub fn apply_beta_scaling(params: &DcaParams, scaling: &BetaScaling) -> Result<DcaParams, DcaError> {
    let scaling = BetaScaling::new(scaling.beta, scaling.coefficient)?;
    let m = scaling.multiplier();

    let scaled = DcaParams {
        grid_interval: (params.grid_interval * m).clamp(MIN_GRID_INTERVAL, 1.0),
        profit_requirement: (params.profit_requirement * m).clamp(0.0, 1.0),
        trailing_buy_activation: (params.trailing_buy_activation * m).clamp(0.0, OPEN_UPPER),
        trailing_buy_rebound: (params.trailing_buy_rebound * m).clamp(0.0, OPEN_UPPER),
        trailing_sell_activation: (params.trailing_sell_activation * m).clamp(0.0, 1.0),
        trailing_sell_pullback: (params.trailing_sell_pullback * m).clamp(0.0, OPEN_UPPER),
        ..params.clone()
    };
    Ok(scaled)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BetaClass {
    Low,
    Market,
    High,
}

impl BetaClass {
    pub fn classify(beta: f64) -> Self {
        if (0.95..=1.05).contains(&beta) {
            BetaClass::Market
        } else if beta < 0.95 {
            BetaClass::Low
        } else {
            BetaClass::High
        }
    }
}

impl fmt::Display for BetaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BetaClass::Low => "Low volatility (< 1)",
            BetaClass::Market => "Market volatility (~ 1)",
            BetaClass::High => "High volatility (> 1)",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetaResult {
    pub beta: f64,
    pub correlation: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub observations: usize,
}

impl BetaResult {
    pub fn class(&self) -> BetaClass {
        BetaClass::classify(self.beta)
    }
}

/// Regression beta of `stock` against `benchmark` over the last `period`
/// daily returns on dates both series share.
pub fn calculate_beta(
    stock: &[PriceBar],
    benchmark: &[PriceBar],
    period: usize,
) -> Result<BetaResult, DcaError> {
    if !(MIN_BETA_PERIOD..=MAX_BETA_PERIOD).contains(&period) {
        return Err(DcaError::invalid(
            "period",
            format!("must be between {MIN_BETA_PERIOD} and {MAX_BETA_PERIOD}"),
        ));
    }

    let bench_by_date: HashMap<NaiveDate, f64> = benchmark
        .iter()
        .map(|b| (b.date, b.split_adjusted().close))
        .collect();

    let mut common: Vec<(NaiveDate, f64, f64)> = stock
        .iter()
        .filter_map(|b| {
            bench_by_date
                .get(&b.date)
                .map(|&m| (b.date, b.split_adjusted().close, m))
        })
        .collect();
    common.sort_by_key(|(d, _, _)| *d);
    common.dedup_by_key(|(d, _, _)| *d);

    let symbol = stock
        .first()
        .map(|b| b.symbol.clone())
        .unwrap_or_default();

    if common.len() < period + 1 {
        return Err(DcaError::InsufficientData {
            symbol,
            bars: common.len(),
            minimum: period + 1,
        });
    }

    let window = &common[common.len() - (period + 1)..];
    let (stock_returns, market_returns): (Vec<f64>, Vec<f64>) = window
        .windows(2)
        .map(|w| {
            let rs = if w[0].1 > 0.0 { w[1].1 / w[0].1 - 1.0 } else { 0.0 };
            let rm = if w[0].2 > 0.0 { w[1].2 / w[0].2 - 1.0 } else { 0.0 };
            (rs, rm)
        })
        .unzip();

    let n = stock_returns.len() as f64;
    let mean_s = stock_returns.iter().sum::<f64>() / n;
    let mean_m = market_returns.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_s = 0.0;
    let mut var_m = 0.0;
    for (s, m) in stock_returns.iter().zip(&market_returns) {
        cov += (s - mean_s) * (m - mean_m);
        var_s += (s - mean_s).powi(2);
        var_m += (m - mean_m).powi(2);
    }
    cov /= n;
    var_s /= n;
    var_m /= n;

    if var_m <= 0.0 {
        return Err(DcaError::invalid(
            "benchmark",
            "benchmark returns have zero variance",
        ));
    }

    let beta = cov / var_m;
    let correlation = if var_s > 0.0 {
        cov / (var_s.sqrt() * var_m.sqrt())
    } else {
        0.0
    };

    Ok(BetaResult {
        beta,
        correlation,
        start_date: window[0].0,
        end_date: window[window.len() - 1].0,
        observations: stock_returns.len(),
    })
}
