//! CSV directory price store.
//!
//! One file per symbol at `<base>/<SYMBOL>.csv` with the header
//! `date,open,high,low,close,adjusted_close,volume`. An optional
//! `<base>/stocks.csv` (`symbol,company_name,sector,market_cap,beta`)
//! supplies descriptive data.

use crate::domain::error::DcaError;
use crate::domain::price::{PriceBar, StockInfo};
use crate::ports::data_port::{paginate, PriceDataPort, SymbolPage};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

const STOCKS_FILE: &str = "stocks.csv";

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    adjusted_close: Option<f64>,
    volume: i64,
}

#[derive(Debug, Deserialize)]
struct StockRow {
    symbol: String,
    company_name: Option<String>,
    sector: Option<String>,
    market_cap: Option<f64>,
    beta: Option<f64>,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    fn read_all(&self, symbol: &str) -> Result<Vec<PriceBar>, DcaError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Err(DcaError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let mut rdr = csv::Reader::from_path(&path).map_err(|e| DcaError::Database {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

        let mut bars = Vec::new();
        for row in rdr.deserialize::<PriceRow>() {
            let row = row.map_err(|e| DcaError::Database {
                reason: format!("CSV parse error in {}: {e}", path.display()),
            })?;
            bars.push(PriceBar {
                symbol: symbol.to_string(),
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                adjusted_close: row.adjusted_close,
                volume: row.volume,
            });
        }
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn read_stock_row(&self, symbol: &str) -> Result<Option<StockRow>, DcaError> {
        let path = self.base_path.join(STOCKS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let mut rdr = csv::Reader::from_path(&path).map_err(|e| DcaError::Database {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        for row in rdr.deserialize::<StockRow>() {
            let row = row.map_err(|e| DcaError::Database {
                reason: format!("CSV parse error in {}: {e}", path.display()),
            })?;
            if row.symbol.eq_ignore_ascii_case(symbol) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }
}

impl PriceDataPort for CsvAdapter {
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, DcaError> {
        let mut bars = self.read_all(symbol)?;
        bars.retain(|b| b.date >= start_date && b.date <= end_date);
        Ok(bars)
    }

    fn list_symbols(&self, limit: usize, offset: usize) -> Result<SymbolPage, DcaError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| DcaError::Database {
            reason: format!(
                "failed to read directory {}: {e}",
                self.base_path.display()
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DcaError::Database {
                reason: format!("directory entry error: {e}"),
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == STOCKS_FILE {
                continue;
            }
            if let Some(symbol) = name.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }
        symbols.sort();
        Ok(paginate(symbols, limit, offset))
    }

    fn get_stock_info(&self, symbol: &str) -> Result<Option<StockInfo>, DcaError> {
        let row = self.read_stock_row(symbol)?;
        let bars = match self.read_all(symbol) {
            Ok(bars) => bars,
            Err(DcaError::NoData { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };
        if row.is_none() && bars.is_empty() {
            return Ok(None);
        }

        let mut info = StockInfo {
            symbol: symbol.to_string(),
            company_name: None,
            sector: None,
            market_cap: None,
            beta: None,
            first_date: bars.first().map(|b| b.date),
            last_date: bars.last().map(|b| b.date),
            total_days: bars.len(),
        };
        if let Some(row) = row {
            info.company_name = row.company_name.filter(|s| !s.is_empty());
            info.sector = row.sector.filter(|s| !s.is_empty());
            info.market_cap = row.market_cap;
            info.beta = row.beta;
        }
        Ok(Some(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        fs::write(
            path.join("AAPL.csv"),
            "date,open,high,low,close,adjusted_close,volume\n\
             2024-01-17,110.0,120.0,105.0,115.0,,55000\n\
             2024-01-15,100.0,110.0,90.0,105.0,,50000\n\
             2024-01-16,105.0,115.0,100.0,110.0,55.0,60000\n",
        )
        .unwrap();
        fs::write(
            path.join("MSFT.csv"),
            "date,open,high,low,close,adjusted_close,volume\n",
        )
        .unwrap();
        fs::write(
            path.join(STOCKS_FILE),
            "symbol,company_name,sector,market_cap,beta\n\
             AAPL,Apple Inc.,Technology,2900000000000,1.25\n\
             TSLA,Tesla,,,\n",
        )
        .unwrap();
        fs::write(path.join("notes.txt"), "ignore me").unwrap();

        (dir, path)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn fetch_prices_sorted_with_optional_adjusted_close() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let bars = adapter.fetch_prices("AAPL", day(1), day(31)).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, day(15));
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].adjusted_close, None);
        assert_eq!(bars[1].adjusted_close, Some(55.0));
        assert_eq!(bars[2].volume, 55000);
        assert_eq!(bars[0].symbol, "AAPL");
    }

    #[test]
    fn fetch_prices_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let bars = adapter.fetch_prices("AAPL", day(16), day(16)).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, day(16));
    }

    #[test]
    fn missing_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let result = adapter.fetch_prices("XYZ", day(1), day(31));
        assert!(matches!(result, Err(DcaError::NoData { symbol }) if symbol == "XYZ"));
    }

    #[test]
    fn malformed_row_is_database_error() {
        let (_dir, path) = setup_test_data();
        fs::write(
            path.join("BAD.csv"),
            "date,open,high,low,close,adjusted_close,volume\n2024-01-15,x,1,1,1,,1\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(path);
        assert!(matches!(
            adapter.fetch_prices("BAD", day(1), day(31)),
            Err(DcaError::Database { .. })
        ));
    }

    #[test]
    fn list_symbols_skips_stock_file() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let page = adapter.list_symbols(10, 0).unwrap();
        assert_eq!(page.symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(page.total_count, 2);
        assert_eq!(adapter.list_symbols(1, 1).unwrap().symbols, vec!["MSFT"]);
    }

    #[test]
    fn stock_info_merges_metadata_and_range() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let info = adapter.get_stock_info("AAPL").unwrap().unwrap();
        assert_eq!(info.company_name.as_deref(), Some("Apple Inc."));
        assert_eq!(info.beta, Some(1.25));
        assert_eq!(info.first_date, Some(day(15)));
        assert_eq!(info.last_date, Some(day(17)));
        assert_eq!(info.total_days, 3);

        let tesla = adapter.get_stock_info("TSLA").unwrap().unwrap();
        assert_eq!(tesla.sector, None);
        assert_eq!(tesla.total_days, 0);

        assert!(adapter.get_stock_info("NOPE").unwrap().is_none());
    }
}
