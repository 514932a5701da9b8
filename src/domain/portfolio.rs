//! Portfolio backtest: several DCA engines stepping through one timeline
//! and drawing on a common capital base.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use super::engine::{CapitalLedger, DcaEngine, SingleLedger};
use super::error::DcaError;
use super::metrics::{CapitalStats, DeploymentPoint, EquityPoint, ReturnStats};
use super::params::DcaParams;
use super::price::{build_unified_timeline, SymbolData};
use super::transaction::{TradeReason, Transaction, TransactionKind};

const CASH_TOLERANCE: f64 = 1e-9;
const WEIGHT_TOLERANCE: f64 = 1e-3;

/// How the portfolio's capital is split between symbols.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CapitalAllocation {
    /// Every symbol draws from one pool, first come first served.
    SharedPool,
    /// Fixed budget per symbol; weights are decimal fractions.
    Weighted(Vec<(String, f64)>),
    /// Budgets proportional to `1 / beta`.
    BetaWeighted,
}

impl fmt::Display for CapitalAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapitalAllocation::SharedPool => f.write_str("shared"),
            CapitalAllocation::Weighted(_) => f.write_str("weighted"),
            CapitalAllocation::BetaWeighted => f.write_str("beta_weighted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioConfig {
    pub total_capital: f64,
    /// Fraction of total capital that is never spent.
    pub cash_reserve: f64,
    pub allocation: CapitalAllocation,
    pub risk_free_rate: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl PortfolioConfig {
    pub fn validate(&self) -> Result<(), DcaError> {
        if !(self.total_capital.is_finite() && self.total_capital > 0.0) {
            return Err(DcaError::invalid("total_capital", "must be positive"));
        }
        if !(self.cash_reserve.is_finite() && (0.0..1.0).contains(&self.cash_reserve)) {
            return Err(DcaError::invalid("cash_reserve", "must be in [0, 1)"));
        }
        if self.start_date > self.end_date {
            return Err(DcaError::invalid(
                "start_date",
                format!("{} is after end date {}", self.start_date, self.end_date),
            ));
        }
        if let CapitalAllocation::Weighted(weights) = &self.allocation {
            if weights.iter().any(|(_, w)| !(w.is_finite() && *w > 0.0)) {
                return Err(DcaError::invalid("allocations", "weights must be positive"));
            }
            let total: f64 = weights.iter().map(|(_, w)| w).sum();
            if (total - 1.0).abs() > WEIGHT_TOLERANCE {
                return Err(DcaError::invalid(
                    "allocations",
                    format!("weights sum to {:.2}%, expected 100%", total * 100.0),
                ));
            }
        }
        Ok(())
    }
}

/// One symbol in a portfolio run. `params` should already be beta-scaled
/// if scaling is wanted.
#[derive(Debug, Clone)]
pub struct PortfolioStock {
    pub data: SymbolData,
    pub params: DcaParams,
    pub beta: Option<f64>,
}

/// Shared cash pool that refuses any withdrawal dipping into the reserve.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservePool {
    cash: f64,
    floor: f64,
}

impl ReservePool {
    pub fn new(cash: f64, floor: f64) -> Self {
        Self { cash, floor }
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }
}

impl CapitalLedger for ReservePool {
    fn cash(&self) -> f64 {
        self.cash
    }

    fn available(&self) -> f64 {
        (self.cash - self.floor).max(0.0)
    }

    fn reserve(&mut self, amount: f64) -> bool {
        if amount <= self.available() + CASH_TOLERANCE {
            self.cash -= amount;
            true
        } else {
            false
        }
    }

    fn release(&mut self, amount: f64) {
        self.cash += amount;
    }
}

enum Ledgers {
    Shared(ReservePool),
    PerSymbol {
        ledgers: Vec<SingleLedger>,
        reserve: f64,
    },
}

impl Ledgers {
    fn total_cash(&self) -> f64 {
        match self {
            Ledgers::Shared(pool) => pool.cash(),
            Ledgers::PerSymbol { ledgers, reserve } => {
                reserve + ledgers.iter().map(|l| l.cash()).sum::<f64>()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub date: NaiveDate,
    pub cash: f64,
    pub deployed_capital: f64,
    pub market_value: f64,
    pub equity: f64,
    pub utilization: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockResult {
    pub symbol: String,
    /// Budget under weighted allocation; `None` for a shared pool.
    pub capital_allocated: Option<f64>,
    pub beta: Option<f64>,
    pub final_value: f64,
    pub total_pnl: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    /// P/L over the budget, or over peak deployment for a shared pool.
    pub total_return: f64,
    pub max_deployed_capital: f64,
    pub num_trades: usize,
    pub rejected_buys: usize,
    pub final_lots: usize,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub returns: ReturnStats,
    pub capital: CapitalStats,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_pnl: f64,
    pub final_value: f64,
    pub total_buys: usize,
    pub total_sells: usize,
    pub rejected_buys: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioBacktestResult {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_capital: f64,
    pub cash_reserve: f64,
    pub allocation: CapitalAllocation,
    pub metrics: PortfolioMetrics,
    pub stocks: Vec<StockResult>,
    pub snapshots: Vec<PortfolioSnapshot>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Per-symbol budget weights for the allocation, in `stocks` order.
pub fn allocation_weights(
    allocation: &CapitalAllocation,
    stocks: &[PortfolioStock],
) -> Option<Vec<f64>> {
    match allocation {
        CapitalAllocation::SharedPool => None,
        CapitalAllocation::Weighted(weights) => {
            let found: Vec<f64> = stocks
                .iter()
                .map(|s| {
                    weights
                        .iter()
                        .find(|(sym, _)| sym.eq_ignore_ascii_case(&s.data.symbol))
                        .map(|(_, w)| *w)
                        .unwrap_or_else(|| {
                            warn!(symbol = %s.data.symbol, "no allocation weight, budget is zero");
                            0.0
                        })
                })
                .collect();
            // weights of symbols that were not loaded go to the ones that were
            let total: f64 = found.iter().sum();
            if total > 0.0 && (total - 1.0).abs() > WEIGHT_TOLERANCE {
                info!(
                    loaded_weight = total,
                    "renormalising allocation weights over loaded symbols"
                );
                Some(found.iter().map(|w| w / total).collect())
            } else {
                Some(found)
            }
        }
        CapitalAllocation::BetaWeighted => {
            let inverse: Vec<f64> = stocks
                .iter()
                .map(|s| match s.beta {
                    Some(b) if b.is_finite() && b > 0.0 => 1.0 / b,
                    _ => 1.0,
                })
                .collect();
            let total: f64 = inverse.iter().sum();
            Some(inverse.iter().map(|w| w / total).collect())
        }
    }
}

pub fn run_portfolio_backtest(
    stocks: &[PortfolioStock],
    config: &PortfolioConfig,
) -> Result<PortfolioBacktestResult, DcaError> {
    config.validate()?;
    if stocks.is_empty() {
        return Err(DcaError::invalid("symbols", "portfolio needs at least one symbol"));
    }
    for stock in stocks {
        stock.params.validate()?;
    }

    let reserve_amount = config.total_capital * config.cash_reserve;
    let investable = config.total_capital - reserve_amount;
    let weights = allocation_weights(&config.allocation, stocks);
    let budgets: Option<Vec<f64>> = weights
        .as_ref()
        .map(|w| w.iter().map(|w| investable * w).collect());

    let mut ledgers = match &budgets {
        None => Ledgers::Shared(ReservePool::new(config.total_capital, reserve_amount)),
        // anything not budgeted stays in cash rather than leaving the books
        Some(budgets) => Ledgers::PerSymbol {
            ledgers: budgets.iter().map(|&b| SingleLedger::new(b)).collect(),
            reserve: config.total_capital - budgets.iter().sum::<f64>(),
        },
    };

    let mut engines: Vec<DcaEngine> = stocks
        .iter()
        .map(|s| DcaEngine::new(s.data.symbol.clone(), s.params.clone()))
        .collect();

    let datasets: Vec<SymbolData> = stocks.iter().map(|s| s.data.clone()).collect();
    let timeline: Vec<NaiveDate> = build_unified_timeline(&datasets)
        .into_iter()
        .filter(|d| *d >= config.start_date && *d <= config.end_date)
        .collect();
    if timeline.is_empty() {
        return Err(DcaError::NoData {
            symbol: "portfolio".to_string(),
        });
    }

    let mut snapshots = Vec::with_capacity(timeline.len());
    let mut equity_curve = Vec::with_capacity(timeline.len());
    let mut deployment = Vec::with_capacity(timeline.len());

    for &date in &timeline {
        for (i, stock) in stocks.iter().enumerate() {
            let Some(bar) = stock.data.get_bar(date) else {
                continue;
            };
            let engine = &mut engines[i];
            match &mut ledgers {
                Ledgers::Shared(pool) => engine.process_day(date, bar.close, pool),
                Ledgers::PerSymbol { ledgers, .. } => {
                    engine.process_day(date, bar.close, &mut ledgers[i])
                }
            }
        }

        let cash = ledgers.total_cash();
        let deployed_capital: f64 = engines.iter().map(|e| e.lots().cost_basis()).sum();
        let market_value: f64 = engines.iter().map(DcaEngine::market_value).sum();
        let equity = cash + market_value;

        snapshots.push(PortfolioSnapshot {
            date,
            cash,
            deployed_capital,
            market_value,
            equity,
            utilization: deployed_capital / config.total_capital,
        });
        equity_curve.push(EquityPoint { date, equity });
        deployment.push(DeploymentPoint {
            deployed_capital,
            total_pnl: equity - config.total_capital,
        });
    }

    let returns = ReturnStats::compute(&equity_curve, config.total_capital, config.risk_free_rate);
    let capital = CapitalStats::compute(&deployment, config.total_capital);

    let stock_results: Vec<StockResult> = engines
        .into_iter()
        .enumerate()
        .map(|(i, engine)| {
            let budget = budgets.as_ref().map(|b| b[i]);
            let ledger_cash = match &ledgers {
                Ledgers::PerSymbol { ledgers, .. } => Some(ledgers[i].cash()),
                Ledgers::Shared(_) => None,
            };
            stock_result(engine, budget, ledger_cash, stocks[i].beta)
        })
        .collect();

    let realized_pnl = stock_results.iter().map(|s| s.realized_pnl).sum();
    let unrealized_pnl = stock_results.iter().map(|s| s.unrealized_pnl).sum();
    let count = |kind: TransactionKind| {
        stock_results
            .iter()
            .flat_map(|s| &s.transactions)
            .filter(|t| t.kind == kind)
            .count()
    };
    let final_value = equity_curve
        .last()
        .map(|p| p.equity)
        .unwrap_or(config.total_capital);

    let metrics = PortfolioMetrics {
        returns,
        capital,
        realized_pnl,
        unrealized_pnl,
        total_pnl: final_value - config.total_capital,
        final_value,
        total_buys: count(TransactionKind::Buy),
        total_sells: count(TransactionKind::Sell),
        rejected_buys: stock_results.iter().map(|s| s.rejected_buys).sum(),
    };

    info!(
        symbols = stocks.len(),
        days = timeline.len(),
        allocation = %config.allocation,
        total_return = metrics.returns.total_return,
        rejected_buys = metrics.rejected_buys,
        "portfolio backtest complete"
    );

    Ok(PortfolioBacktestResult {
        start_date: timeline[0],
        end_date: timeline[timeline.len() - 1],
        total_capital: config.total_capital,
        cash_reserve: config.cash_reserve,
        allocation: config.allocation.clone(),
        metrics,
        stocks: stock_results,
        snapshots,
        equity_curve,
    })
}

fn stock_result(
    engine: DcaEngine,
    budget: Option<f64>,
    ledger_cash: Option<f64>,
    beta: Option<f64>,
) -> StockResult {
    let symbol = engine.symbol().to_string();
    let market_value = engine.market_value();
    let output = engine.into_output();
    let last = output.snapshots.last();
    let total_pnl = last.map(|s| s.total_pnl).unwrap_or(0.0);
    let unrealized_pnl = last.map(|s| s.unrealized_pnl).unwrap_or(0.0);
    let max_deployed_capital = output
        .snapshots
        .iter()
        .map(|s| s.deployed_capital)
        .fold(0.0_f64, f64::max);

    let (final_value, total_return) = match (budget, ledger_cash) {
        (Some(budget), Some(cash)) => {
            let value = cash + market_value;
            let ret = if budget > 0.0 {
                (value - budget) / budget
            } else {
                0.0
            };
            (value, ret)
        }
        _ => {
            let ret = if max_deployed_capital > 0.0 {
                total_pnl / max_deployed_capital
            } else {
                0.0
            };
            (market_value, ret)
        }
    };

    let num_trades = output
        .transactions
        .iter()
        .filter(|t| t.kind.is_executed())
        .count();
    let rejected_buys = output
        .transactions
        .iter()
        .filter(|t| {
            t.kind == TransactionKind::AbortedBuy && t.reason == TradeReason::InsufficientCapital
        })
        .count();

    StockResult {
        symbol,
        capital_allocated: budget,
        beta,
        final_value,
        total_pnl,
        realized_pnl: output.realized_pnl,
        unrealized_pnl,
        total_return,
        max_deployed_capital,
        num_trades,
        rejected_buys,
        final_lots: output.final_lots.len(),
        transactions: output.transactions,
    }
}
