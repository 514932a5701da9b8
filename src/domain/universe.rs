//! Symbol universe for portfolio runs.
//!
//! Parses symbol and allocation lists from configuration and checks that
//! each symbol has enough price history to backtest.

use crate::domain::error::DcaError;
use crate::domain::price::PriceBar;
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{info, warn};

pub const MIN_PRICE_BARS: usize = 20;

const ALLOCATION_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("malformed allocation '{0}', expected SYMBOL:PERCENT")]
    MalformedAllocation(String),

    #[error("allocation for {0} must be a positive percentage")]
    InvalidWeight(String),

    #[error("allocations sum to {0:.2}%, expected 100%")]
    WeightsDoNotSum(f64),
}

impl From<UniverseError> for DcaError {
    fn from(err: UniverseError) -> Self {
        DcaError::invalid("symbols", err.to_string())
    }
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Parse `"AAPL:30,GOOGL:30,MSFT:40"` into `(symbol, weight)` pairs with
/// weights as decimal fractions. Percentages must total 100.
pub fn parse_allocations(input: &str) -> Result<Vec<(String, f64)>, UniverseError> {
    let mut allocations = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let (symbol, pct) = trimmed
            .split_once(':')
            .ok_or_else(|| UniverseError::MalformedAllocation(trimmed.to_string()))?;
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(UniverseError::MalformedAllocation(trimmed.to_string()));
        }
        let pct: f64 = pct
            .trim()
            .trim_end_matches('%')
            .parse()
            .map_err(|_| UniverseError::MalformedAllocation(trimmed.to_string()))?;
        if !(pct.is_finite() && pct > 0.0) {
            return Err(UniverseError::InvalidWeight(symbol));
        }
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        allocations.push((symbol, pct));
    }

    let total: f64 = allocations.iter().map(|(_, pct)| pct).sum();
    if (total - 100.0).abs() > ALLOCATION_TOLERANCE {
        return Err(UniverseError::WeightsDoNotSum(total));
    }

    Ok(allocations
        .into_iter()
        .map(|(symbol, pct)| (symbol, pct / 100.0))
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize },
}

#[derive(Debug, Clone)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

pub struct UniverseValidationResult {
    /// Symbols that passed, with their bars, in input order.
    pub loaded: Vec<(String, Vec<PriceBar>)>,
    pub skipped: Vec<SkippedSymbol>,
}

impl UniverseValidationResult {
    pub fn symbols(&self) -> Vec<&str> {
        self.loaded.iter().map(|(s, _)| s.as_str()).collect()
    }
}

pub fn validate_universe(
    data_port: &dyn PriceDataPort,
    symbols: Vec<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<UniverseValidationResult, DcaError> {
    let mut loaded = Vec::new();
    let mut skipped = Vec::new();
    let requested = symbols.len();

    for symbol in symbols {
        let bars = match data_port.fetch_prices(&symbol, start_date, end_date) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(%symbol, error = %e, "skipping symbol");
                skipped.push(SkippedSymbol {
                    symbol,
                    reason: SkipReason::NoData,
                });
                continue;
            }
        };

        if bars.is_empty() {
            warn!(%symbol, "skipping symbol: no data found");
            skipped.push(SkippedSymbol {
                symbol,
                reason: SkipReason::NoData,
            });
            continue;
        }

        if bars.len() < MIN_PRICE_BARS {
            warn!(
                %symbol,
                bars = bars.len(),
                minimum = MIN_PRICE_BARS,
                "skipping symbol: not enough bars"
            );
            skipped.push(SkippedSymbol {
                symbol,
                reason: SkipReason::InsufficientBars { bars: bars.len() },
            });
            continue;
        }

        info!(%symbol, bars = bars.len(), "loaded");
        loaded.push((symbol, bars));
    }

    if loaded.is_empty() {
        return Err(DcaError::InsufficientData {
            symbol: "all".to_string(),
            bars: 0,
            minimum: MIN_PRICE_BARS,
        });
    }

    if !skipped.is_empty() {
        info!(
            used = loaded.len(),
            requested, "running portfolio on a subset of symbols"
        );
    }

    Ok(UniverseValidationResult { loaded, skipped })
}
