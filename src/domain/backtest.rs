//! Single-symbol DCA backtest: configuration, the day loop, and the result.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use super::buy_and_hold::BuyAndHold;
use super::engine::{CapitalLedger, DailySnapshot, DcaEngine, SingleLedger};
use super::error::DcaError;
use super::lot::Lot;
use super::metrics::{DcaMetrics, EquityPoint, MetricsInput};
use super::params::DcaParams;
use super::price::{PriceBar, SymbolData};
use super::transaction::{ClosedLot, Transaction};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Defaults to enough cash to fill every lot.
    pub initial_capital: Option<f64>,
    pub risk_free_rate: f64,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), DcaError> {
        if self.start_date > self.end_date {
            return Err(DcaError::invalid(
                "start_date",
                format!("{} is after end date {}", self.start_date, self.end_date),
            ));
        }
        if let Some(capital) = self.initial_capital {
            if !(capital.is_finite() && capital > 0.0) {
                return Err(DcaError::invalid("initial_capital", "must be positive"));
            }
        }
        if !self.risk_free_rate.is_finite() {
            return Err(DcaError::invalid("risk_free_rate", "must be a number"));
        }
        Ok(())
    }

    pub fn capital_for(&self, params: &DcaParams) -> f64 {
        self.initial_capital.unwrap_or_else(|| params.max_capital())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DcaBacktestResult {
    pub symbol: String,
    pub params: DcaParams,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub final_cash: f64,
    pub final_price: f64,
    pub final_lots: Vec<Lot>,
    pub metrics: DcaMetrics,
    pub buy_and_hold: Option<BuyAndHold>,
    /// Strategy total return minus buy-and-hold total return.
    pub outperformance: Option<f64>,
    pub transactions: Vec<Transaction>,
    pub closed_lots: Vec<ClosedLot>,
    pub snapshots: Vec<DailySnapshot>,
    pub equity_curve: Vec<EquityPoint>,
}

impl DcaBacktestResult {
    pub fn executed_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|t| t.kind.is_executed())
    }
}

/// Run the DCA strategy for one symbol over `[start_date, end_date]`.
///
/// `params` are used as given; apply beta scaling beforehand if wanted.
pub fn run_dca_backtest(
    symbol: &str,
    bars: &[PriceBar],
    params: &DcaParams,
    config: &BacktestConfig,
) -> Result<DcaBacktestResult, DcaError> {
    params.validate()?;
    config.validate()?;

    let in_range: Vec<PriceBar> = bars
        .iter()
        .filter(|b| b.date >= config.start_date && b.date <= config.end_date)
        .cloned()
        .collect();
    let data = SymbolData::new(symbol.to_string(), in_range);
    if data.bars.is_empty() {
        return Err(DcaError::NoData {
            symbol: symbol.to_string(),
        });
    }

    let initial_capital = config.capital_for(params);
    let mut ledger = SingleLedger::new(initial_capital);
    let mut engine = DcaEngine::new(symbol, params.clone());
    let mut equity_curve = Vec::with_capacity(data.bars.len());

    for bar in &data.bars {
        engine.process_day(bar.date, bar.close, &mut ledger);
        equity_curve.push(EquityPoint {
            date: bar.date,
            equity: ledger.cash() + engine.market_value(),
        });
    }

    let output = engine.into_output();
    let metrics = DcaMetrics::compute(&MetricsInput {
        initial_capital,
        equity_curve: &equity_curve,
        snapshots: &output.snapshots,
        transactions: &output.transactions,
        closed_lots: &output.closed_lots,
        risk_free_rate: config.risk_free_rate,
    });
    let buy_and_hold = BuyAndHold::compute(&data.bars, initial_capital);
    let outperformance = buy_and_hold
        .as_ref()
        .map(|bh| metrics.returns.total_return - bh.total_return);

    info!(
        symbol,
        days = data.bars.len(),
        buys = metrics.trades.total_buys,
        sells = metrics.trades.total_sells,
        total_return = metrics.returns.total_return,
        "backtest complete"
    );

    let first_bar_date = data.first_date().unwrap_or(config.start_date);
    let last_bar_date = data.last_date().unwrap_or(config.end_date);

    Ok(DcaBacktestResult {
        symbol: symbol.to_string(),
        params: params.clone(),
        start_date: first_bar_date,
        end_date: last_bar_date,
        initial_capital,
        final_cash: ledger.cash(),
        final_price: output.last_price.unwrap_or(0.0),
        final_lots: output.final_lots,
        metrics,
        buy_and_hold,
        outperformance,
        transactions: output.transactions,
        closed_lots: output.closed_lots,
        snapshots: output.snapshots,
        equity_curve,
    })
}
