//! Executed and aborted transactions.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Buy,
    Sell,
    AbortedBuy,
    AbortedSell,
}

impl TransactionKind {
    pub fn is_executed(self) -> bool {
        matches!(self, TransactionKind::Buy | TransactionKind::Sell)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
            TransactionKind::AbortedBuy => "ABORTED_BUY",
            TransactionKind::AbortedSell => "ABORTED_SELL",
        };
        f.write_str(s)
    }
}

/// What triggered a transaction, or which check stopped it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeReason {
    TrailingStopBuy,
    MomentumBuy,
    DirectBuy,
    TrailingStopSell,
    DirectSell,
    StopLoss,
    MaxLotsReached,
    GridSpacing,
    InsufficientCapital,
    NegativePositionPnl,
    NoProfitableLots,
}

impl fmt::Display for TradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradeReason::TrailingStopBuy => "trailing stop buy",
            TradeReason::MomentumBuy => "momentum buy",
            TradeReason::DirectBuy => "direct buy",
            TradeReason::TrailingStopSell => "trailing stop sell",
            TradeReason::DirectSell => "direct sell",
            TradeReason::StopLoss => "stop loss",
            TradeReason::MaxLotsReached => "max lots reached",
            TradeReason::GridSpacing => "grid spacing",
            TradeReason::InsufficientCapital => "insufficient capital",
            TradeReason::NegativePositionPnl => "negative position P/L",
            TradeReason::NoProfitableLots => "no profitable lots",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub reason: TradeReason,
    pub price: f64,
    pub shares: f64,
    pub value: f64,
    pub commission: f64,
    pub realized_pnl: f64,
    pub lots_after: usize,
    pub average_cost_after: f64,
}

impl Transaction {
    pub fn aborted(
        date: NaiveDate,
        kind: TransactionKind,
        reason: TradeReason,
        price: f64,
        lots_after: usize,
        average_cost_after: f64,
    ) -> Self {
        Transaction {
            date,
            kind,
            reason,
            price,
            shares: 0.0,
            value: 0.0,
            commission: 0.0,
            realized_pnl: 0.0,
            lots_after,
            average_cost_after,
        }
    }
}

/// A single lot that was bought and later sold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedLot {
    pub buy_date: NaiveDate,
    pub buy_price: f64,
    pub sell_date: NaiveDate,
    pub sell_price: f64,
    pub shares: f64,
    pub pnl: f64,
}

impl ClosedLot {
    pub fn holding_days(&self) -> i64 {
        (self.sell_date - self.buy_date).num_days()
    }
}
