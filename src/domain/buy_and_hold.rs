//! Buy-and-hold benchmark over the same bars as a DCA run.

use serde::Serialize;

use super::metrics::{compute_drawdown, EquityPoint};
use super::price::PriceBar;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyAndHold {
    pub entry_price: f64,
    pub exit_price: f64,
    pub shares: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub max_drawdown: f64,
}

impl BuyAndHold {
    /// Put all of `initial_capital` into the first close and hold to the end.
    /// `bars` are expected sorted and split-adjusted.
    pub fn compute(bars: &[PriceBar], initial_capital: f64) -> Option<Self> {
        let first = bars.iter().find(|b| b.close > 0.0)?;
        let entry_price = first.close;
        let shares = initial_capital / entry_price;

        let curve: Vec<EquityPoint> = bars
            .iter()
            .filter(|b| b.date >= first.date && b.close > 0.0)
            .map(|b| EquityPoint {
                date: b.date,
                equity: shares * b.close,
            })
            .collect();

        let exit_price = bars
            .iter()
            .rev()
            .find(|b| b.close > 0.0)
            .map(|b| b.close)
            .unwrap_or(entry_price);
        let final_value = shares * exit_price;
        let total_return = if initial_capital > 0.0 {
            (final_value - initial_capital) / initial_capital
        } else {
            0.0
        };
        let (max_drawdown, _) = compute_drawdown(&curve);

        Some(BuyAndHold {
            entry_price,
            exit_price,
            shares,
            final_value,
            total_return,
            max_drawdown,
        })
    }
}
