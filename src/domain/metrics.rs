//! Performance metrics: returns, drawdown, risk-adjusted ratios, capital
//! deployment, trade statistics, and the DCA suitability score.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use super::engine::DailySnapshot;
use super::transaction::{ClosedLot, Transaction, TransactionKind};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

const TARGET_SELLS_PER_YEAR: f64 = 12.0;
const TARGET_ANNUAL_TWR: f64 = 0.30;
const ACTIVITY_WEIGHT: f64 = 40.0;
const REVERSION_WEIGHT: f64 = 30.0;
const EFFICIENCY_WEIGHT: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Return and risk figures derived from an equity curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnStats {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: i64,
}

impl ReturnStats {
    pub fn compute(equity_curve: &[EquityPoint], initial_capital: f64, risk_free_rate: f64) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let annualized_return = annualize(total_return, years_of(equity_curve.len()));
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, daily_rf);

        let calmar_ratio = if max_drawdown > 0.0 {
            annualized_return / max_drawdown
        } else {
            0.0
        };

        ReturnStats {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            max_drawdown,
            max_drawdown_duration,
        }
    }
}

/// How much capital was at work and what it earned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapitalStats {
    pub avg_deployed_capital: f64,
    pub max_deployed_capital: f64,
    pub capital_utilization: f64,
    pub return_on_deployed_capital: f64,
    pub time_weighted_return: f64,
    pub annualized_twr: f64,
}

/// One day of deployment: cost basis held and cumulative P/L.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeploymentPoint {
    pub deployed_capital: f64,
    pub total_pnl: f64,
}

impl From<&DailySnapshot> for DeploymentPoint {
    fn from(s: &DailySnapshot) -> Self {
        DeploymentPoint {
            deployed_capital: s.deployed_capital,
            total_pnl: s.total_pnl,
        }
    }
}

impl CapitalStats {
    pub fn compute(series: &[DeploymentPoint], initial_capital: f64) -> Self {
        if series.is_empty() {
            return CapitalStats {
                avg_deployed_capital: 0.0,
                max_deployed_capital: 0.0,
                capital_utilization: 0.0,
                return_on_deployed_capital: 0.0,
                time_weighted_return: 0.0,
                annualized_twr: 0.0,
            };
        }

        let n = series.len() as f64;
        let avg_deployed_capital = series.iter().map(|p| p.deployed_capital).sum::<f64>() / n;
        let max_deployed_capital = series
            .iter()
            .map(|p| p.deployed_capital)
            .fold(0.0_f64, f64::max);
        let capital_utilization = if initial_capital > 0.0 {
            avg_deployed_capital / initial_capital
        } else {
            0.0
        };

        let final_pnl = series.last().map(|p| p.total_pnl).unwrap_or(0.0);
        let return_on_deployed_capital = if avg_deployed_capital > 0.0 {
            final_pnl / avg_deployed_capital
        } else {
            0.0
        };

        let time_weighted_return = compute_twr(series);
        let annualized_twr = annualize(time_weighted_return, years_of(series.len()));

        CapitalStats {
            avg_deployed_capital,
            max_deployed_capital,
            capital_utilization,
            return_on_deployed_capital,
            time_weighted_return,
            annualized_twr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeStats {
    pub total_buys: usize,
    pub total_sells: usize,
    pub aborted_buys: usize,
    pub aborted_sells: usize,
    pub lots_closed: usize,
    pub winning_lots: usize,
    pub losing_lots: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_buy_price: f64,
    pub avg_sell_price: f64,
    pub avg_holding_days: f64,
    pub total_commission: f64,
}

impl TradeStats {
    pub fn compute(transactions: &[Transaction], closed_lots: &[ClosedLot]) -> Self {
        let mut total_buys = 0usize;
        let mut total_sells = 0usize;
        let mut aborted_buys = 0usize;
        let mut aborted_sells = 0usize;
        let mut buy_value = 0.0_f64;
        let mut buy_shares = 0.0_f64;
        let mut sell_value = 0.0_f64;
        let mut sell_shares = 0.0_f64;
        let mut total_commission = 0.0_f64;

        for tx in transactions {
            total_commission += tx.commission;
            match tx.kind {
                TransactionKind::Buy => {
                    total_buys += 1;
                    buy_value += tx.value;
                    buy_shares += tx.shares;
                }
                TransactionKind::Sell => {
                    total_sells += 1;
                    sell_value += tx.value;
                    sell_shares += tx.shares;
                }
                TransactionKind::AbortedBuy => aborted_buys += 1,
                TransactionKind::AbortedSell => aborted_sells += 1,
            }
        }

        let mut winning_lots = 0usize;
        let mut losing_lots = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut holding_days = 0i64;

        for lot in closed_lots {
            if lot.pnl > 0.0 {
                winning_lots += 1;
                total_wins += lot.pnl;
                largest_win = largest_win.max(lot.pnl);
            } else if lot.pnl < 0.0 {
                losing_lots += 1;
                total_losses += lot.pnl.abs();
                largest_loss = largest_loss.max(lot.pnl.abs());
            }
            holding_days += lot.holding_days();
        }

        let lots_closed = closed_lots.len();
        let win_rate = if lots_closed > 0 {
            winning_lots as f64 / lots_closed as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        TradeStats {
            total_buys,
            total_sells,
            aborted_buys,
            aborted_sells,
            lots_closed,
            winning_lots,
            losing_lots,
            win_rate,
            profit_factor,
            largest_win,
            largest_loss,
            avg_buy_price: ratio(buy_value, buy_shares),
            avg_sell_price: ratio(sell_value, sell_shares),
            avg_holding_days: ratio(holding_days as f64, lots_closed as f64),
            total_commission,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SuitabilityClass {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl SuitabilityClass {
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            SuitabilityClass::Poor
        } else if score < 50.0 {
            SuitabilityClass::Fair
        } else if score < 70.0 {
            SuitabilityClass::Good
        } else {
            SuitabilityClass::Excellent
        }
    }
}

impl fmt::Display for SuitabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SuitabilityClass::Poor => "Poor",
            SuitabilityClass::Fair => "Fair",
            SuitabilityClass::Good => "Good",
            SuitabilityClass::Excellent => "Excellent",
        };
        f.write_str(s)
    }
}

/// How well a symbol suits grid DCA: frequent round trips, lots that come
/// back into profit, and a decent return on the capital actually deployed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suitability {
    pub score: f64,
    pub trade_activity: f64,
    pub mean_reversion: f64,
    pub capital_efficiency: f64,
    pub class: SuitabilityClass,
}

impl Suitability {
    pub fn compute(trades: &TradeStats, capital: &CapitalStats, trading_days: usize) -> Self {
        let years = years_of(trading_days);
        let sells_per_year = if years > 0.0 {
            trades.total_sells as f64 / years
        } else {
            0.0
        };
        let trade_activity = (sells_per_year / TARGET_SELLS_PER_YEAR).min(1.0) * ACTIVITY_WEIGHT;

        let mean_reversion = if trades.total_buys > 0 {
            (trades.lots_closed as f64 / trades.total_buys as f64).min(1.0) * REVERSION_WEIGHT
        } else {
            0.0
        };

        let capital_efficiency =
            (capital.annualized_twr / TARGET_ANNUAL_TWR).clamp(0.0, 1.0) * EFFICIENCY_WEIGHT;

        let raw = trade_activity + mean_reversion + capital_efficiency;
        let score = (raw * 10.0).round() / 10.0;

        Suitability {
            score,
            trade_activity,
            mean_reversion,
            capital_efficiency,
            class: SuitabilityClass::from_score(score),
        }
    }
}

/// Inputs for [`DcaMetrics::compute`].
pub struct MetricsInput<'a> {
    pub initial_capital: f64,
    pub equity_curve: &'a [EquityPoint],
    pub snapshots: &'a [DailySnapshot],
    pub transactions: &'a [Transaction],
    pub closed_lots: &'a [ClosedLot],
    pub risk_free_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DcaMetrics {
    pub returns: ReturnStats,
    pub capital: CapitalStats,
    pub trades: TradeStats,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_pnl: f64,
    pub final_value: f64,
    pub suitability: Suitability,
}

impl DcaMetrics {
    pub fn compute(input: &MetricsInput<'_>) -> Self {
        let returns =
            ReturnStats::compute(input.equity_curve, input.initial_capital, input.risk_free_rate);

        let deployment: Vec<DeploymentPoint> =
            input.snapshots.iter().map(DeploymentPoint::from).collect();
        let capital = CapitalStats::compute(&deployment, input.initial_capital);
        let trades = TradeStats::compute(input.transactions, input.closed_lots);
        let suitability = Suitability::compute(&trades, &capital, input.equity_curve.len());

        let last = input.snapshots.last();
        let realized_pnl = last.map(|s| s.realized_pnl).unwrap_or(0.0);
        let unrealized_pnl = last.map(|s| s.unrealized_pnl).unwrap_or(0.0);
        let total_pnl = last.map(|s| s.total_pnl).unwrap_or(0.0);
        let final_value = input
            .equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(input.initial_capital);

        DcaMetrics {
            returns,
            capital,
            trades,
            realized_pnl,
            unrealized_pnl,
            total_pnl,
            final_value,
            suitability,
        }
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 { num / den } else { 0.0 }
}

fn years_of(trading_days: usize) -> f64 {
    trading_days as f64 / TRADING_DAYS_PER_YEAR
}

fn annualize(total: f64, years: f64) -> f64 {
    if years <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    if 1.0 + total <= 0.0 {
        return -1.0;
    }
    (1.0 + total).powf(1.0 / years) - 1.0
}

pub fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    if equity_curve.is_empty() {
        return (0.0, 0);
    }

    let mut peak = equity_curve[0].equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            max_dd = max_dd.max(dd);
            if dd > 0.0 {
                current_dd_duration += 1;
                max_dd_duration = max_dd_duration.max(current_dd_duration);
            }
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], daily_rf: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let excess_return = mean - daily_rf;

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sq / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}

/// Chain daily returns on the capital deployed the day before. Days with
/// nothing deployed contribute nothing.
fn compute_twr(series: &[DeploymentPoint]) -> f64 {
    let growth = series.windows(2).fold(1.0_f64, |acc, w| {
        let deployed = w[0].deployed_capital;
        let r = if deployed > 0.0 {
            (w[1].total_pnl - w[0].total_pnl) / deployed
        } else {
            0.0
        };
        acc * (1.0 + r)
    });
    growth - 1.0
}
