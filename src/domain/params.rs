//! DCA strategy parameters. Every rate is a decimal fraction.

use serde::Serialize;

use super::error::DcaError;
use super::percent::{is_closed_fraction, is_open_fraction, is_positive_fraction};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DcaParams {
    pub lot_size_usd: f64,
    pub max_lots: usize,
    pub max_lots_to_sell: usize,
    pub grid_interval: f64,
    pub profit_requirement: f64,
    pub trailing_buy_activation: f64,
    pub trailing_buy_rebound: f64,
    pub trailing_sell_activation: f64,
    pub trailing_sell_pullback: f64,
    pub enable_trailing_buy: bool,
    pub enable_trailing_sell: bool,
    pub enable_dynamic_grid: bool,
    pub normalize_to_reference: bool,
    pub dynamic_grid_multiplier: f64,
    pub enable_consecutive_incremental_buy_grid: bool,
    pub grid_consecutive_increment: f64,
    pub enable_consecutive_incremental_sell_profit: bool,
    pub momentum_based_buy: bool,
    pub momentum_based_sell: bool,
    pub momentum_lookback_days: usize,
    pub hard_stop_loss: f64,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

impl Default for DcaParams {
    fn default() -> Self {
        DcaParams {
            lot_size_usd: 10_000.0,
            max_lots: 10,
            max_lots_to_sell: 1,
            grid_interval: 0.10,
            profit_requirement: 0.05,
            trailing_buy_activation: 0.10,
            trailing_buy_rebound: 0.05,
            trailing_sell_activation: 0.20,
            trailing_sell_pullback: 0.10,
            enable_trailing_buy: true,
            enable_trailing_sell: true,
            enable_dynamic_grid: false,
            normalize_to_reference: true,
            dynamic_grid_multiplier: 1.0,
            enable_consecutive_incremental_buy_grid: false,
            grid_consecutive_increment: 0.05,
            enable_consecutive_incremental_sell_profit: false,
            momentum_based_buy: false,
            momentum_based_sell: false,
            momentum_lookback_days: 20,
            hard_stop_loss: 0.0,
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
        }
    }
}

impl DcaParams {
    /// Capital needed to fill every lot.
    pub fn max_capital(&self) -> f64 {
        self.lot_size_usd * self.max_lots as f64
    }

    pub fn validate(&self) -> Result<(), DcaError> {
        if !(self.lot_size_usd.is_finite() && self.lot_size_usd > 0.0) {
            return Err(DcaError::invalid("lot_size_usd", "must be positive"));
        }
        if self.max_lots < 1 {
            return Err(DcaError::invalid("max_lots", "must be at least 1"));
        }
        if self.max_lots_to_sell < 1 || self.max_lots_to_sell > self.max_lots {
            return Err(DcaError::invalid(
                "max_lots_to_sell",
                "must be between 1 and max_lots",
            ));
        }
        if !is_positive_fraction(self.grid_interval) {
            return Err(DcaError::invalid("grid_interval", "must be in (0, 1]"));
        }
        if !is_closed_fraction(self.profit_requirement) {
            return Err(DcaError::invalid("profit_requirement", "must be in [0, 1]"));
        }
        if !is_open_fraction(self.trailing_buy_activation) {
            return Err(DcaError::invalid(
                "trailing_buy_activation",
                "must be in [0, 1)",
            ));
        }
        if !is_open_fraction(self.trailing_buy_rebound) {
            return Err(DcaError::invalid("trailing_buy_rebound", "must be in [0, 1)"));
        }
        if !is_closed_fraction(self.trailing_sell_activation) {
            return Err(DcaError::invalid(
                "trailing_sell_activation",
                "must be in [0, 1]",
            ));
        }
        if !is_open_fraction(self.trailing_sell_pullback) {
            return Err(DcaError::invalid(
                "trailing_sell_pullback",
                "must be in [0, 1)",
            ));
        }
        if !(self.dynamic_grid_multiplier.is_finite() && self.dynamic_grid_multiplier > 0.0) {
            return Err(DcaError::invalid(
                "dynamic_grid_multiplier",
                "must be positive",
            ));
        }
        if !is_closed_fraction(self.grid_consecutive_increment) {
            return Err(DcaError::invalid(
                "grid_consecutive_increment",
                "must be in [0, 1]",
            ));
        }
        if self.momentum_lookback_days < 1 {
            return Err(DcaError::invalid(
                "momentum_lookback_days",
                "must be at least 1",
            ));
        }
        if !is_open_fraction(self.hard_stop_loss) {
            return Err(DcaError::invalid("hard_stop_loss", "must be in [0, 1)"));
        }
        for (field, value) in [
            ("commission_per_trade", self.commission_per_trade),
            ("commission_pct", self.commission_pct),
            ("slippage_pct", self.slippage_pct),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(DcaError::invalid(field, "must be non-negative"));
            }
        }
        Ok(())
    }
}

/// A labelled parameter set, used when comparing strategies side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedStrategy {
    pub name: String,
    pub params: DcaParams,
}
