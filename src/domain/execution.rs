//! Fill simulation: slippage, commissions, and the cash/P&L arithmetic of
//! buying one lot or selling a set of lots.

use chrono::NaiveDate;

use super::lot::Lot;
use super::params::DcaParams;
use super::transaction::ClosedLot;

/// Trading costs. Both percentages are in percent units (0.1 = 0.1%).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExecutionCosts {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

impl From<&DcaParams> for ExecutionCosts {
    fn from(params: &DcaParams) -> Self {
        ExecutionCosts {
            commission_per_trade: params.commission_per_trade,
            commission_pct: params.commission_pct,
            slippage_pct: params.slippage_pct,
        }
    }
}

/// flat_fee + (trade_value * pct / 100)
pub fn calculate_commission(trade_value: f64, costs: &ExecutionCosts) -> f64 {
    costs.commission_per_trade + (trade_value * costs.commission_pct / 100.0)
}

/// Buys fill above the quoted price.
pub fn apply_slippage_buy(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Sells fill below the quoted price.
pub fn apply_slippage_sell(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuyFill {
    pub execution_price: f64,
    pub shares: f64,
    pub value: f64,
    pub commission: f64,
}

impl BuyFill {
    pub fn total_cost(&self) -> f64 {
        self.value + self.commission
    }
}

/// Spend `amount` at `execution_price`. Fractional shares are allowed.
pub fn compute_buy_fill(execution_price: f64, amount: f64, costs: &ExecutionCosts) -> BuyFill {
    BuyFill {
        execution_price,
        shares: amount / execution_price,
        value: amount,
        commission: calculate_commission(amount, costs),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SellFill {
    pub execution_price: f64,
    pub shares: f64,
    pub gross_value: f64,
    pub commission: f64,
    pub proceeds: f64,
    pub realized_pnl: f64,
    pub closed_lots: Vec<ClosedLot>,
}

/// Sell `lots` at `execution_price` in a single order. The commission is
/// charged once and spread over the lots by share count.
pub fn compute_sell_fill(
    lots: &[Lot],
    execution_price: f64,
    sell_date: NaiveDate,
    costs: &ExecutionCosts,
) -> SellFill {
    let shares: f64 = lots.iter().map(|l| l.shares).sum();
    let gross_value = shares * execution_price;
    let commission = if lots.is_empty() {
        0.0
    } else {
        calculate_commission(gross_value, costs)
    };

    let closed_lots: Vec<ClosedLot> = lots
        .iter()
        .map(|lot| {
            let share_of_commission = if shares > 0.0 {
                commission * lot.shares / shares
            } else {
                0.0
            };
            ClosedLot {
                buy_date: lot.date,
                buy_price: lot.price,
                sell_date,
                sell_price: execution_price,
                shares: lot.shares,
                pnl: lot.shares * (execution_price - lot.price) - share_of_commission,
            }
        })
        .collect();

    let realized_pnl = closed_lots.iter().map(|c| c.pnl).sum();

    SellFill {
        execution_price,
        shares,
        gross_value,
        commission,
        proceeds: gross_value - commission,
        realized_pnl,
        closed_lots,
    }
}
