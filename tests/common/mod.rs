#![allow(dead_code)]

use chrono::NaiveDate;
use dcagrid::domain::backtest::BacktestConfig;
use dcagrid::domain::error::DcaError;
use dcagrid::domain::params::DcaParams;
pub use dcagrid::domain::price::{PriceBar, StockInfo};
use dcagrid::ports::data_port::{paginate, PriceDataPort, SymbolPage};
use std::collections::HashMap;
use std::io::Write;
use std::process::ExitCode;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub info: HashMap<String, StockInfo>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            info: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_beta(mut self, symbol: &str, beta: f64) -> Self {
        self.info.insert(
            symbol.to_string(),
            StockInfo {
                symbol: symbol.to_string(),
                company_name: None,
                sector: None,
                market_cap: None,
                beta: Some(beta),
                first_date: None,
                last_date: None,
                total_days: 0,
            },
        );
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl PriceDataPort for MockDataPort {
    fn fetch_prices(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, DcaError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(DcaError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self, limit: usize, offset: usize) -> Result<SymbolPage, DcaError> {
        let mut all: Vec<String> = self.data.keys().cloned().collect();
        all.sort();
        Ok(paginate(all, limit, offset))
    }

    fn get_stock_info(&self, symbol: &str) -> Result<Option<StockInfo>, DcaError> {
        Ok(self.info.get(symbol).cloned())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(symbol: &str, date: NaiveDate, close: f64) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        date,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        adjusted_close: None,
        volume: 1000,
    }
}

/// Consecutive calendar days starting at `start`, one bar per close.
pub fn bars_from_closes(symbol: &str, start: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(symbol, start + chrono::Duration::days(i as i64), c))
        .collect()
}

/// A price that oscillates around `base` with the given amplitude (a
/// fraction of `base`) and period in days.
pub fn oscillating_bars(
    symbol: &str,
    start: NaiveDate,
    count: usize,
    base: f64,
    amplitude: f64,
    period: f64,
) -> Vec<PriceBar> {
    let closes: Vec<f64> = (0..count)
        .map(|i| {
            let phase = (i as f64) * std::f64::consts::TAU / period;
            base * (1.0 + amplitude * phase.sin())
        })
        .collect();
    bars_from_closes(symbol, start, &closes)
}

pub fn trending_bars(symbol: &str, start: NaiveDate, count: usize, from: f64, daily: f64) -> Vec<PriceBar> {
    let closes: Vec<f64> = (0..count).map(|i| from * (1.0 + daily).powi(i as i32)).collect();
    bars_from_closes(symbol, start, &closes)
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        start_date: date(2022, 1, 1),
        end_date: date(2024, 12, 31),
        initial_capital: None,
        risk_free_rate: 0.0,
    }
}

pub fn small_params() -> DcaParams {
    DcaParams {
        lot_size_usd: 1_000.0,
        max_lots: 5,
        ..Default::default()
    }
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Write bars as `<dir>/<SYMBOL>.csv` in the price store layout.
pub fn write_price_csv(dir: &std::path::Path, symbol: &str, bars: &[PriceBar]) {
    let mut out = String::from("date,open,high,low,close,adjusted_close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},,{}\n",
            b.date.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    std::fs::write(dir.join(format!("{symbol}.csv")), out).unwrap();
}

/// ExitCode has no PartialEq on every toolchain; compare debug output.
pub fn same_exit(a: ExitCode, b: ExitCode) -> bool {
    format!("{a:?}") == format!("{b:?}")
}
