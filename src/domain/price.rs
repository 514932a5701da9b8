//! Daily price bars, per-symbol series and the unified timeline.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjusted_close: Option<f64>,
    pub volume: i64,
}

impl PriceBar {
    /// Scale OHLC by `adjusted_close / close` so splits do not show up as
    /// price gaps. Bars without a usable adjusted close are returned as-is.
    pub fn split_adjusted(&self) -> PriceBar {
        match self.adjusted_close {
            Some(adj) if adj > 0.0 && self.close > 0.0 => {
                let ratio = adj / self.close;
                PriceBar {
                    symbol: self.symbol.clone(),
                    date: self.date,
                    open: self.open * ratio,
                    high: self.high * ratio,
                    low: self.low * ratio,
                    close: adj,
                    adjusted_close: Some(adj),
                    volume: self.volume,
                }
            }
            _ => self.clone(),
        }
    }
}

/// Metadata for a stock in the price store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockInfo {
    pub symbol: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    pub beta: Option<f64>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub total_days: usize,
}

/// One symbol's split-adjusted bars with a date lookup.
#[derive(Debug, Clone)]
pub struct SymbolData {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl SymbolData {
    pub fn new(symbol: String, bars: Vec<PriceBar>) -> Self {
        let mut bars: Vec<PriceBar> = bars.iter().map(PriceBar::split_adjusted).collect();
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            symbol,
            bars,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&PriceBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    pub fn get_bar_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    /// Last close at or before `date`, used to value a position on days the
    /// symbol did not trade.
    pub fn close_on_or_before(&self, date: NaiveDate) -> Option<f64> {
        let idx = self.bars.partition_point(|b| b.date <= date);
        if idx == 0 {
            None
        } else {
            Some(self.bars[idx - 1].close)
        }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }
}

pub fn build_unified_timeline(symbols: &[SymbolData]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = symbols
        .iter()
        .flat_map(|sd| sd.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}
