//! Price store access port.

use crate::domain::error::DcaError;
use crate::domain::price::{PriceBar, StockInfo};
use chrono::NaiveDate;

/// One page of symbols plus the size of the whole list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SymbolPage {
    pub symbols: Vec<String>,
    pub total_count: usize,
}

pub trait PriceDataPort {
    /// Bars for `symbol` between the two dates inclusive, oldest first.
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, DcaError>;

    /// Symbols in alphabetical order.
    fn list_symbols(&self, limit: usize, offset: usize) -> Result<SymbolPage, DcaError>;

    fn get_stock_info(&self, symbol: &str) -> Result<Option<StockInfo>, DcaError>;
}

/// Slice a sorted symbol list into a page.
pub fn paginate(all: Vec<String>, limit: usize, offset: usize) -> SymbolPage {
    let total_count = all.len();
    let symbols = all.into_iter().skip(offset).take(limit).collect();
    SymbolPage {
        symbols,
        total_count,
    }
}
