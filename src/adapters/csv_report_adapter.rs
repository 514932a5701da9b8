//! Transaction log as CSV, one row per executed or aborted transaction.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::backtest::DcaBacktestResult;
use crate::domain::error::DcaError;
use crate::domain::portfolio::PortfolioBacktestResult;
use crate::domain::transaction::Transaction;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Serialize)]
struct TransactionRow<'a> {
    symbol: &'a str,
    date: String,
    kind: String,
    reason: String,
    price: f64,
    shares: f64,
    value: f64,
    commission: f64,
    realized_pnl: f64,
    lots_after: usize,
    average_cost_after: f64,
}

impl<'a> TransactionRow<'a> {
    fn new(symbol: &'a str, tx: &Transaction) -> Self {
        Self {
            symbol,
            date: tx.date.format("%Y-%m-%d").to_string(),
            kind: tx.kind.to_string(),
            reason: tx.reason.to_string(),
            price: tx.price,
            shares: tx.shares,
            value: tx.value,
            commission: tx.commission,
            realized_pnl: tx.realized_pnl,
            lots_after: tx.lots_after,
            average_cost_after: tx.average_cost_after,
        }
    }
}

pub struct CsvTransactionReport;

impl CsvTransactionReport {
    pub fn new() -> Self {
        Self
    }

    fn write_rows<'a>(
        rows: impl Iterator<Item = TransactionRow<'a>>,
        output_path: &str,
    ) -> Result<(), DcaError> {
        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let report_err = |e: csv::Error| DcaError::Report {
            reason: format!("writing {output_path}: {e}"),
        };
        let mut writer = csv::Writer::from_path(path).map_err(report_err)?;
        for row in rows {
            writer.serialize(row).map_err(report_err)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Default for CsvTransactionReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for CsvTransactionReport {
    fn write(&self, result: &DcaBacktestResult, output_path: &str) -> Result<(), DcaError> {
        let rows = result
            .transactions
            .iter()
            .map(|tx| TransactionRow::new(&result.symbol, tx));
        Self::write_rows(rows, output_path)
    }

    /// Every symbol's transactions, merged in date order.
    fn write_portfolio(
        &self,
        result: &PortfolioBacktestResult,
        output_path: &str,
    ) -> Result<(), DcaError> {
        let mut rows: Vec<TransactionRow<'_>> = result
            .stocks
            .iter()
            .flat_map(|s| s.transactions.iter().map(|tx| TransactionRow::new(&s.symbol, tx)))
            .collect();
        // stable, so same-day rows keep symbol order
        rows.sort_by(|a, b| a.date.cmp(&b.date));
        Self::write_rows(rows.into_iter(), output_path)
    }
}
