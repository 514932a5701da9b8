//! Open DCA lots and their bookkeeping.

use chrono::NaiveDate;
use serde::Serialize;

const GRID_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lot {
    pub price: f64,
    pub shares: f64,
    pub date: NaiveDate,
}

impl Lot {
    pub fn cost(&self) -> f64 {
        self.price * self.shares
    }

    pub fn is_profitable_at(&self, price: f64, profit_requirement: f64) -> bool {
        self.price * (1.0 + profit_requirement) <= price
    }
}

/// Open lots in purchase order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LotBook {
    lots: Vec<Lot>,
}

impl LotBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, lot: Lot) {
        self.lots.push(lot);
    }

    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn total_shares(&self) -> f64 {
        self.lots.iter().map(|l| l.shares).sum()
    }

    pub fn cost_basis(&self) -> f64 {
        self.lots.iter().map(Lot::cost).sum()
    }

    pub fn average_cost(&self) -> f64 {
        let shares = self.total_shares();
        if shares > 0.0 {
            self.cost_basis() / shares
        } else {
            0.0
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.total_shares() * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.market_value(price) - self.cost_basis()
    }

    pub fn lowest_price(&self) -> Option<f64> {
        self.lots.iter().map(|l| l.price).reduce(f64::min)
    }

    pub fn highest_price(&self) -> Option<f64> {
        self.lots.iter().map(|l| l.price).reduce(f64::max)
    }

    pub fn last_lot(&self) -> Option<&Lot> {
        self.lots.last()
    }

    pub fn any_profitable(&self, price: f64, profit_requirement: f64) -> bool {
        self.lots
            .iter()
            .any(|l| l.is_profitable_at(price, profit_requirement))
    }

    /// Indices of lots to sell at `price`: profitable lots only, highest
    /// purchase price first, at most `max_lots`.
    pub fn select_for_sale(&self, price: f64, profit_requirement: f64, max_lots: usize) -> Vec<usize> {
        let mut candidates: Vec<usize> = self
            .lots
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_profitable_at(price, profit_requirement))
            .map(|(i, _)| i)
            .collect();
        // stable sort keeps purchase order among equal prices
        candidates.sort_by(|&a, &b| {
            self.lots[b]
                .price
                .partial_cmp(&self.lots[a].price)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(max_lots);
        candidates
    }

    /// Remove the lots at `indices` and return them in the order given.
    pub fn remove(&mut self, indices: &[usize]) -> Vec<Lot> {
        let removed: Vec<Lot> = indices
            .iter()
            .filter_map(|&i| self.lots.get(i).cloned())
            .collect();
        let mut idx = 0usize;
        self.lots.retain(|_| {
            let keep = !indices.contains(&idx);
            idx += 1;
            keep
        });
        removed
    }

    pub fn drain_all(&mut self) -> Vec<Lot> {
        std::mem::take(&mut self.lots)
    }

    /// True when `price` is at least `interval` away from every open lot.
    pub fn respects_grid(&self, price: f64, interval: f64) -> bool {
        self.lots.iter().all(|l| {
            if l.price <= 0.0 {
                return true;
            }
            (price - l.price).abs() / l.price + GRID_TOLERANCE >= interval
        })
    }
}
