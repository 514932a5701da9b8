//! Pretty-printed JSON report.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::backtest::DcaBacktestResult;
use crate::domain::error::DcaError;
use crate::domain::portfolio::PortfolioBacktestResult;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize `value` to `output_path`, creating parent directories.
pub(crate) fn write_json<T: Serialize>(value: &T, output_path: &str) -> Result<(), DcaError> {
    let json = serde_json::to_string_pretty(value)?;
    let path = Path::new(output_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json)?;
    Ok(())
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, result: &DcaBacktestResult, output_path: &str) -> Result<(), DcaError> {
        write_json(result, output_path)
    }

    fn write_portfolio(
        &self,
        result: &PortfolioBacktestResult,
        output_path: &str,
    ) -> Result<(), DcaError> {
        write_json(result, output_path)
    }
}
