//! Report output port.

use crate::domain::backtest::DcaBacktestResult;
use crate::domain::error::DcaError;
use crate::domain::portfolio::PortfolioBacktestResult;

pub trait ReportPort {
    fn write(&self, result: &DcaBacktestResult, output_path: &str) -> Result<(), DcaError>;

    fn write_portfolio(
        &self,
        result: &PortfolioBacktestResult,
        output_path: &str,
    ) -> Result<(), DcaError>;
}
