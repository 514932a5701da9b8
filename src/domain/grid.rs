//! Grid spacing and profit requirement as they evolve during a run.

use super::params::DcaParams;

const REFERENCE_LEVEL: f64 = 100.0;

/// Spacing required between a new buy and every open lot.
///
/// With the dynamic grid enabled the price is normalised so the reference
/// price sits at 100, and spacing is `multiplier / sqrt(normalised)`: 10% at
/// the reference, wider as the price falls, narrower as it rises.
pub fn effective_grid_interval(
    params: &DcaParams,
    price: f64,
    reference_price: f64,
    consecutive_buys: usize,
) -> f64 {
    let base = if params.enable_dynamic_grid {
        let reference = if params.normalize_to_reference && reference_price > 0.0 {
            reference_price
        } else {
            REFERENCE_LEVEL
        };
        let normalized = REFERENCE_LEVEL * price / reference;
        if normalized > 0.0 {
            params.dynamic_grid_multiplier / normalized.sqrt()
        } else {
            params.grid_interval
        }
    } else {
        params.grid_interval
    };

    if params.enable_consecutive_incremental_buy_grid {
        base + consecutive_buys as f64 * params.grid_consecutive_increment
    } else {
        base
    }
}

pub fn effective_profit_requirement(params: &DcaParams, consecutive_sells: usize) -> f64 {
    if params.enable_consecutive_incremental_sell_profit {
        params.profit_requirement + consecutive_sells as f64 * params.grid_consecutive_increment
    } else {
        params.profit_requirement
    }
}
