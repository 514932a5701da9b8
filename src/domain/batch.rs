//! Parameter sweeps and side-by-side strategy comparison.

use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use super::backtest::{run_dca_backtest, BacktestConfig};
use super::error::DcaError;
use super::metrics::DcaMetrics;
use super::params::{DcaParams, NamedStrategy};
use super::price::PriceBar;

pub const MAX_COMBINATIONS: usize = 1000;
pub const MIN_STRATEGIES: usize = 2;
pub const MAX_STRATEGIES: usize = 5;

/// Values to sweep. Empty optional lists keep the base parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterGrid {
    pub grid_interval: Vec<f64>,
    pub profit_requirement: Vec<f64>,
    pub momentum_based_sell: Vec<bool>,
    pub trailing_buy_activation: Vec<f64>,
    pub trailing_sell_activation: Vec<f64>,
}

fn or_base<T: Copy>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

impl ParameterGrid {
    pub fn combination_count(&self) -> usize {
        let len = |n: usize| n.max(1);
        // saturates so an oversized sweep still trips the cap
        [
            self.profit_requirement.len(),
            len(self.momentum_based_sell.len()),
            len(self.trailing_buy_activation.len()),
            len(self.trailing_sell_activation.len()),
        ]
        .into_iter()
        .fold(self.grid_interval.len(), usize::saturating_mul)
    }

    /// Cartesian product over `base`, grid interval varying slowest.
    pub fn combinations(&self, base: &DcaParams) -> Result<Vec<DcaParams>, DcaError> {
        if self.grid_interval.is_empty() {
            return Err(DcaError::invalid("grid_interval", "at least one value required"));
        }
        if self.profit_requirement.is_empty() {
            return Err(DcaError::invalid(
                "profit_requirement",
                "at least one value required",
            ));
        }
        let count = self.combination_count();
        if count > MAX_COMBINATIONS {
            return Err(DcaError::invalid(
                "batch",
                format!("{count} combinations exceeds the limit of {MAX_COMBINATIONS}"),
            ));
        }

        let momentum = or_base(&self.momentum_based_sell, base.momentum_based_sell);
        let buy_activation = or_base(&self.trailing_buy_activation, base.trailing_buy_activation);
        let sell_activation = or_base(&self.trailing_sell_activation, base.trailing_sell_activation);

        let mut out = Vec::with_capacity(count);
        for &grid_interval in &self.grid_interval {
            for &profit_requirement in &self.profit_requirement {
                for &momentum_based_sell in &momentum {
                    for &trailing_buy_activation in &buy_activation {
                        for &trailing_sell_activation in &sell_activation {
                            out.push(DcaParams {
                                grid_interval,
                                profit_requirement,
                                momentum_based_sell,
                                trailing_buy_activation,
                                trailing_sell_activation,
                                ..base.clone()
                            });
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    TotalReturn,
    Sharpe,
    Calmar,
    Suitability,
}

impl RankBy {
    pub fn score(self, metrics: &DcaMetrics) -> f64 {
        let value = match self {
            RankBy::TotalReturn => metrics.returns.total_return,
            RankBy::Sharpe => metrics.returns.sharpe_ratio,
            RankBy::Calmar => metrics.returns.calmar_ratio,
            RankBy::Suitability => metrics.suitability.score,
        };
        if value.is_nan() {
            f64::NEG_INFINITY
        } else {
            value
        }
    }
}

impl FromStr for RankBy {
    type Err = DcaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "total_return" | "return" => Ok(RankBy::TotalReturn),
            "sharpe" | "sharpe_ratio" => Ok(RankBy::Sharpe),
            "calmar" | "calmar_ratio" => Ok(RankBy::Calmar),
            "suitability" | "dca_suitability_score" => Ok(RankBy::Suitability),
            other => Err(DcaError::invalid(
                "rank_by",
                format!("unknown ranking '{other}'"),
            )),
        }
    }
}

impl fmt::Display for RankBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RankBy::TotalReturn => "total_return",
            RankBy::Sharpe => "sharpe",
            RankBy::Calmar => "calmar",
            RankBy::Suitability => "suitability",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    /// Position in the combination order.
    pub combination: usize,
    pub params: DcaParams,
    pub metrics: DcaMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub symbol: String,
    pub rank_by: RankBy,
    pub total_combinations: usize,
    pub skipped: usize,
    /// Best first.
    pub entries: Vec<BatchEntry>,
}

impl BatchResult {
    pub fn best(&self) -> Option<&BatchEntry> {
        self.entries.first()
    }

    pub fn top(&self, n: usize) -> &[BatchEntry] {
        &self.entries[..n.min(self.entries.len())]
    }
}

pub fn run_batch(
    symbol: &str,
    bars: &[PriceBar],
    base: &DcaParams,
    grid: &ParameterGrid,
    config: &BacktestConfig,
    rank_by: RankBy,
) -> Result<BatchResult, DcaError> {
    let combinations = grid.combinations(base)?;
    let total_combinations = combinations.len();
    info!(symbol, total_combinations, %rank_by, "starting batch");

    let outcomes: Vec<(usize, Result<(DcaParams, DcaMetrics), DcaError>)> = combinations
        .into_par_iter()
        .enumerate()
        .map(|(i, params)| {
            let outcome = run_dca_backtest(symbol, bars, &params, config)
                .map(|result| (result.params, result.metrics));
            (i, outcome)
        })
        .collect();

    let mut entries = Vec::with_capacity(total_combinations);
    let mut first_error = None;
    let mut skipped = 0usize;
    for (combination, outcome) in outcomes {
        match outcome {
            Ok((params, metrics)) => entries.push(BatchEntry {
                combination,
                params,
                metrics,
            }),
            Err(e) => {
                warn!(symbol, combination, error = %e, "skipping combination");
                skipped += 1;
                first_error.get_or_insert(e);
            }
        }
    }

    if entries.is_empty() {
        if let Some(e) = first_error {
            return Err(e);
        }
    }

    // stable: ties keep combination order
    entries.sort_by(|a, b| {
        rank_by
            .score(&b.metrics)
            .partial_cmp(&rank_by.score(&a.metrics))
            .unwrap_or(Ordering::Equal)
    });

    Ok(BatchResult {
        symbol: symbol.to_string(),
        rank_by,
        total_combinations,
        skipped,
        entries,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRow {
    pub name: String,
    pub params: DcaParams,
    pub metrics: DcaMetrics,
    pub outperformance: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyComparison {
    pub symbol: String,
    pub rows: Vec<ComparisonRow>,
    pub best: usize,
    pub reason: String,
}

impl StrategyComparison {
    pub fn best_row(&self) -> &ComparisonRow {
        &self.rows[self.best]
    }
}

/// Run each strategy once on the same bars and pick the best Sharpe ratio.
pub fn compare_strategies(
    symbol: &str,
    bars: &[PriceBar],
    strategies: &[NamedStrategy],
    config: &BacktestConfig,
) -> Result<StrategyComparison, DcaError> {
    if !(MIN_STRATEGIES..=MAX_STRATEGIES).contains(&strategies.len()) {
        return Err(DcaError::invalid(
            "strategies",
            format!("between {MIN_STRATEGIES} and {MAX_STRATEGIES} strategies required"),
        ));
    }

    let rows = strategies
        .iter()
        .map(|s| {
            let result = run_dca_backtest(symbol, bars, &s.params, config)?;
            Ok(ComparisonRow {
                name: s.name.clone(),
                params: result.params,
                metrics: result.metrics,
                outperformance: result.outperformance,
            })
        })
        .collect::<Result<Vec<_>, DcaError>>()?;

    let mut best = 0usize;
    for (i, row) in rows.iter().enumerate().skip(1) {
        if RankBy::Sharpe.score(&row.metrics) > RankBy::Sharpe.score(&rows[best].metrics) {
            best = i;
        }
    }
    let reason = format!(
        "Highest Sharpe ratio ({:.3})",
        rows[best].metrics.returns.sharpe_ratio
    );

    Ok(StrategyComparison {
        symbol: symbol.to_string(),
        rows,
        best,
        reason,
    })
}
