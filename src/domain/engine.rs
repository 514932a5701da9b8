//! Per-symbol DCA state machine: lots, trailing stops, grid checks.
//!
//! The engine does not own cash. Buys reserve money from a
//! [`CapitalLedger`] and sells release proceeds back to it, so the same
//! engine runs alone or as one leg of a portfolio.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use super::execution::{
    apply_slippage_buy, apply_slippage_sell, compute_buy_fill, compute_sell_fill, ExecutionCosts,
};
use super::grid::{effective_grid_interval, effective_profit_requirement};
use super::lot::{Lot, LotBook};
use super::params::DcaParams;
use super::trailing::{StopEvent, StopSide, TrailingStop};
use super::transaction::{ClosedLot, TradeReason, Transaction, TransactionKind};

const CASH_TOLERANCE: f64 = 1e-9;

/// Source of buying power for one or more engines.
pub trait CapitalLedger {
    /// Cash currently held, including any reserve.
    fn cash(&self) -> f64;

    /// Cash that may be spent right now.
    fn available(&self) -> f64;

    /// Withdraw `amount` if the ledger allows it.
    fn reserve(&mut self, amount: f64) -> bool;

    /// Return sale proceeds.
    fn release(&mut self, amount: f64);
}

/// Plain cash balance that never goes below zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleLedger {
    cash: f64,
}

impl SingleLedger {
    pub fn new(cash: f64) -> Self {
        Self { cash }
    }
}

impl CapitalLedger for SingleLedger {
    fn cash(&self) -> f64 {
        self.cash
    }

    fn available(&self) -> f64 {
        self.cash.max(0.0)
    }

    fn reserve(&mut self, amount: f64) -> bool {
        if amount <= self.available() + CASH_TOLERANCE {
            self.cash -= amount;
            true
        } else {
            false
        }
    }

    fn release(&mut self, amount: f64) {
        self.cash += amount;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub price: f64,
    pub lots: usize,
    pub shares: f64,
    pub average_cost: f64,
    pub deployed_capital: f64,
    pub market_value: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    /// Realized plus unrealized, net of every commission paid.
    pub total_pnl: f64,
}

/// Everything an engine accumulated over a run.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub transactions: Vec<Transaction>,
    pub closed_lots: Vec<ClosedLot>,
    pub snapshots: Vec<DailySnapshot>,
    pub final_lots: Vec<Lot>,
    pub realized_pnl: f64,
    pub total_commission: f64,
    pub last_price: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct DcaEngine {
    symbol: String,
    params: DcaParams,
    costs: ExecutionCosts,
    lots: LotBook,
    buy_stop: TrailingStop,
    sell_stop: TrailingStop,
    recent_peak: Option<f64>,
    recent_bottom: Option<f64>,
    reference_price: Option<f64>,
    reference_from_buy: bool,
    last_buy_price: Option<f64>,
    consecutive_buys: usize,
    consecutive_sells: usize,
    realized_pnl: f64,
    buy_commission: f64,
    total_commission: f64,
    closes: Vec<f64>,
    last_price: Option<f64>,
    transactions: Vec<Transaction>,
    closed_lots: Vec<ClosedLot>,
    snapshots: Vec<DailySnapshot>,
}

impl DcaEngine {
    pub fn new(symbol: impl Into<String>, params: DcaParams) -> Self {
        let costs = ExecutionCosts::from(&params);
        let buy_stop = TrailingStop::new(StopSide::Buy, params.trailing_buy_rebound);
        let sell_stop = TrailingStop::new(StopSide::Sell, params.trailing_sell_pullback);
        Self {
            symbol: symbol.into(),
            params,
            costs,
            lots: LotBook::new(),
            buy_stop,
            sell_stop,
            recent_peak: None,
            recent_bottom: None,
            reference_price: None,
            reference_from_buy: false,
            last_buy_price: None,
            consecutive_buys: 0,
            consecutive_sells: 0,
            realized_pnl: 0.0,
            buy_commission: 0.0,
            total_commission: 0.0,
            closes: Vec::new(),
            last_price: None,
            transactions: Vec::new(),
            closed_lots: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn params(&self) -> &DcaParams {
        &self.params
    }

    pub fn lots(&self) -> &LotBook {
        &self.lots
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn snapshots(&self) -> &[DailySnapshot] {
        &self.snapshots
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    pub fn reference_price(&self) -> Option<f64> {
        self.reference_price
    }

    pub fn is_buy_stop_active(&self) -> bool {
        self.buy_stop.is_active()
    }

    pub fn is_sell_stop_active(&self) -> bool {
        self.sell_stop.is_active()
    }

    /// Value of open lots at the last seen price.
    pub fn market_value(&self) -> f64 {
        self.last_price
            .map(|p| self.lots.market_value(p))
            .unwrap_or(0.0)
    }

    /// Feed one day's close. Executes at most one buy or one sell.
    pub fn process_day<L: CapitalLedger + ?Sized>(
        &mut self,
        date: NaiveDate,
        price: f64,
        ledger: &mut L,
    ) {
        if !(price.is_finite() && price > 0.0) {
            warn!(symbol = %self.symbol, %date, price, "skipping non-positive price");
            return;
        }

        self.closes.push(price);
        self.last_price = Some(price);
        if self.reference_price.is_none() {
            self.reference_price = Some(price);
        }
        self.recent_peak = Some(self.recent_peak.map_or(price, |p| p.max(price)));
        self.recent_bottom = Some(self.recent_bottom.map_or(price, |b| b.min(price)));

        if !self.check_stop_loss(date, price, ledger) {
            let sold = self.process_sell_side(date, price, ledger);
            if !sold {
                self.process_buy_side(date, price, ledger);
            }
        }

        self.record_snapshot(date, price);
    }

    pub fn into_output(self) -> EngineOutput {
        EngineOutput {
            transactions: self.transactions,
            closed_lots: self.closed_lots,
            snapshots: self.snapshots,
            final_lots: self.lots.lots().to_vec(),
            realized_pnl: self.realized_pnl,
            total_commission: self.total_commission,
            last_price: self.last_price,
        }
    }

    fn check_stop_loss<L: CapitalLedger + ?Sized>(
        &mut self,
        date: NaiveDate,
        price: f64,
        ledger: &mut L,
    ) -> bool {
        if self.params.hard_stop_loss <= 0.0 || self.lots.is_empty() {
            return false;
        }
        let threshold = self.lots.average_cost() * (1.0 - self.params.hard_stop_loss);
        if price > threshold {
            return false;
        }

        let exec_price = apply_slippage_sell(price, self.costs.slippage_pct);
        let lots = self.lots.drain_all();
        self.execute_sell(date, price, exec_price, lots, TradeReason::StopLoss, ledger);
        self.buy_stop.cancel();
        self.sell_stop.cancel();
        true
    }

    fn process_sell_side<L: CapitalLedger + ?Sized>(
        &mut self,
        date: NaiveDate,
        price: f64,
        ledger: &mut L,
    ) -> bool {
        if self.lots.is_empty() {
            self.sell_stop.cancel();
            return false;
        }
        let profit_requirement = effective_profit_requirement(&self.params, self.consecutive_sells);

        if self.sell_stop.is_active() {
            match self.sell_stop.update(price) {
                StopEvent::Triggered { stop_price } => {
                    debug!(symbol = %self.symbol, %date, price, stop_price, "sell stop triggered");
                    self.sell_stop.cancel();
                    return self.attempt_sell(
                        date,
                        price,
                        profit_requirement,
                        TradeReason::TrailingStopSell,
                        ledger,
                    );
                }
                StopEvent::Trailed { stop_price } => {
                    debug!(symbol = %self.symbol, %date, stop_price, "sell stop raised");
                }
                StopEvent::Idle => {}
            }
            return false;
        }

        if !self.lots.any_profitable(price, profit_requirement) {
            return false;
        }
        let activated = self.params.momentum_based_sell
            || self
                .recent_bottom
                .is_some_and(|bottom| price >= bottom * (1.0 + self.params.trailing_sell_activation));
        if !activated {
            return false;
        }

        if self.params.enable_trailing_sell {
            let stop_price = self.sell_stop.activate(price, date);
            debug!(symbol = %self.symbol, %date, price, stop_price, "sell stop armed");
            false
        } else {
            self.attempt_sell(date, price, profit_requirement, TradeReason::DirectSell, ledger)
        }
    }

    fn process_buy_side<L: CapitalLedger + ?Sized>(
        &mut self,
        date: NaiveDate,
        price: f64,
        ledger: &mut L,
    ) {
        if self.params.momentum_based_buy {
            self.process_momentum_buy(date, price, ledger);
            return;
        }

        if self.buy_stop.is_active() {
            match self.buy_stop.update(price) {
                StopEvent::Triggered { stop_price } => {
                    debug!(symbol = %self.symbol, %date, price, stop_price, "buy stop triggered");
                    self.buy_stop.cancel();
                    self.attempt_buy(date, price, TradeReason::TrailingStopBuy, ledger);
                }
                StopEvent::Trailed { stop_price } => {
                    debug!(symbol = %self.symbol, %date, stop_price, "buy stop lowered");
                }
                StopEvent::Idle => {}
            }
            return;
        }

        let should_arm = self.lots.is_empty()
            || self
                .recent_peak
                .is_some_and(|peak| price <= peak * (1.0 - self.params.trailing_buy_activation));
        if !should_arm {
            return;
        }

        if self.params.enable_trailing_buy {
            // no stop is armed for a lot that could never be bought
            if self.lots.len() >= self.params.max_lots {
                return;
            }
            let stop_price = self.buy_stop.activate(price, date);
            debug!(symbol = %self.symbol, %date, price, stop_price, "buy stop armed");
        } else {
            self.attempt_buy(date, price, TradeReason::DirectBuy, ledger);
        }
    }

    fn process_momentum_buy<L: CapitalLedger + ?Sized>(
        &mut self,
        date: NaiveDate,
        price: f64,
        ledger: &mut L,
    ) {
        // a full book would otherwise log an aborted buy every rising day
        if self.lots.len() >= self.params.max_lots {
            return;
        }
        let lookback = self.params.momentum_lookback_days;
        let n = self.closes.len();
        if n <= lookback {
            return;
        }
        if price <= self.closes[n - 1 - lookback] {
            return;
        }
        if !self.lots.is_empty() {
            if let Some(last_buy) = self.last_buy_price {
                let interval = self.current_grid_interval(price);
                if price < last_buy * (1.0 + interval) {
                    return;
                }
            }
        }
        self.attempt_buy(date, price, TradeReason::MomentumBuy, ledger);
    }

    fn current_grid_interval(&self, price: f64) -> f64 {
        effective_grid_interval(
            &self.params,
            price,
            self.reference_price.unwrap_or(price),
            self.consecutive_buys,
        )
    }

    fn attempt_buy<L: CapitalLedger + ?Sized>(
        &mut self,
        date: NaiveDate,
        price: f64,
        reason: TradeReason,
        ledger: &mut L,
    ) -> bool {
        if self.lots.len() >= self.params.max_lots {
            self.abort(date, TransactionKind::AbortedBuy, TradeReason::MaxLotsReached, price);
            return false;
        }

        let exec_price = apply_slippage_buy(price, self.costs.slippage_pct);
        if self.params.momentum_based_buy {
            if self.lots.unrealized_pnl(price) < 0.0 {
                self.abort(
                    date,
                    TransactionKind::AbortedBuy,
                    TradeReason::NegativePositionPnl,
                    price,
                );
                return false;
            }
        } else {
            let interval = self.current_grid_interval(price);
            if !self.lots.respects_grid(exec_price, interval) {
                self.abort(date, TransactionKind::AbortedBuy, TradeReason::GridSpacing, price);
                return false;
            }
        }

        let fill = compute_buy_fill(exec_price, self.params.lot_size_usd, &self.costs);
        if !ledger.reserve(fill.total_cost()) {
            self.abort(
                date,
                TransactionKind::AbortedBuy,
                TradeReason::InsufficientCapital,
                price,
            );
            return false;
        }

        if self.params.normalize_to_reference && !self.reference_from_buy {
            self.reference_price = Some(price);
            self.reference_from_buy = true;
        }

        self.lots.push(Lot {
            price: exec_price,
            shares: fill.shares,
            date,
        });
        self.buy_commission += fill.commission;
        self.total_commission += fill.commission;
        self.transactions.push(Transaction {
            date,
            kind: TransactionKind::Buy,
            reason,
            price: exec_price,
            shares: fill.shares,
            value: fill.value,
            commission: fill.commission,
            realized_pnl: 0.0,
            lots_after: self.lots.len(),
            average_cost_after: self.lots.average_cost(),
        });
        debug!(
            symbol = %self.symbol,
            %date,
            price = exec_price,
            shares = fill.shares,
            lots = self.lots.len(),
            %reason,
            "buy"
        );
        self.after_trade(TransactionKind::Buy, price);
        true
    }

    fn attempt_sell<L: CapitalLedger + ?Sized>(
        &mut self,
        date: NaiveDate,
        price: f64,
        profit_requirement: f64,
        reason: TradeReason,
        ledger: &mut L,
    ) -> bool {
        let exec_price = apply_slippage_sell(price, self.costs.slippage_pct);
        let picked =
            self.lots
                .select_for_sale(exec_price, profit_requirement, self.params.max_lots_to_sell);
        if picked.is_empty() {
            self.abort(
                date,
                TransactionKind::AbortedSell,
                TradeReason::NoProfitableLots,
                price,
            );
            return false;
        }
        let lots = self.lots.remove(&picked);
        self.execute_sell(date, price, exec_price, lots, reason, ledger);
        true
    }

    fn execute_sell<L: CapitalLedger + ?Sized>(
        &mut self,
        date: NaiveDate,
        price: f64,
        exec_price: f64,
        lots: Vec<Lot>,
        reason: TradeReason,
        ledger: &mut L,
    ) {
        let fill = compute_sell_fill(&lots, exec_price, date, &self.costs);
        ledger.release(fill.proceeds);
        self.realized_pnl += fill.realized_pnl;
        self.total_commission += fill.commission;
        self.closed_lots.extend(fill.closed_lots);
        self.transactions.push(Transaction {
            date,
            kind: TransactionKind::Sell,
            reason,
            price: exec_price,
            shares: fill.shares,
            value: fill.gross_value,
            commission: fill.commission,
            realized_pnl: fill.realized_pnl,
            lots_after: self.lots.len(),
            average_cost_after: self.lots.average_cost(),
        });
        debug!(
            symbol = %self.symbol,
            %date,
            price = exec_price,
            lots_sold = lots.len(),
            pnl = fill.realized_pnl,
            %reason,
            "sell"
        );
        self.after_trade(TransactionKind::Sell, price);
    }

    fn abort(&mut self, date: NaiveDate, kind: TransactionKind, reason: TradeReason, price: f64) {
        debug!(symbol = %self.symbol, %date, price, %kind, %reason, "aborted");
        self.transactions.push(Transaction::aborted(
            date,
            kind,
            reason,
            price,
            self.lots.len(),
            self.lots.average_cost(),
        ));
    }

    fn after_trade(&mut self, kind: TransactionKind, price: f64) {
        self.recent_peak = Some(price);
        self.recent_bottom = Some(price);
        match kind {
            TransactionKind::Buy => {
                self.consecutive_buys += 1;
                self.consecutive_sells = 0;
                self.last_buy_price = Some(price);
            }
            TransactionKind::Sell => {
                self.consecutive_sells += 1;
                self.consecutive_buys = 0;
            }
            TransactionKind::AbortedBuy | TransactionKind::AbortedSell => {}
        }
    }

    fn record_snapshot(&mut self, date: NaiveDate, price: f64) {
        let market_value = self.lots.market_value(price);
        let unrealized_pnl = self.lots.unrealized_pnl(price);
        self.snapshots.push(DailySnapshot {
            date,
            price,
            lots: self.lots.len(),
            shares: self.lots.total_shares(),
            average_cost: self.lots.average_cost(),
            deployed_capital: self.lots.cost_basis(),
            market_value,
            realized_pnl: self.realized_pnl,
            unrealized_pnl,
            total_pnl: self.realized_pnl + unrealized_pnl - self.buy_commission,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    fn direct() -> DcaParams {
        DcaParams {
            lot_size_usd: 1000.0,
            max_lots: 3,
            enable_trailing_buy: false,
            enable_trailing_sell: false,
            ..Default::default()
        }
    }

    fn run(engine: &mut DcaEngine, ledger: &mut SingleLedger, prices: &[f64]) {
        for (i, &p) in prices.iter().enumerate() {
            engine.process_day(date(i as i64), p, ledger);
        }
    }

    fn executed(engine: &DcaEngine) -> Vec<(TransactionKind, TradeReason)> {
        engine
            .transactions()
            .iter()
            .filter(|t| t.kind.is_executed())
            .map(|t| (t.kind, t.reason))
            .collect()
    }

    #[test]
    fn single_ledger_refuses_overdraft() {
        let mut ledger = SingleLedger::new(100.0);
        assert!(!ledger.reserve(100.01));
        assert!(ledger.reserve(60.0));
        assert_relative_eq!(ledger.cash(), 40.0);
        ledger.release(10.0);
        assert_relative_eq!(ledger.available(), 50.0);
    }

    #[test]
    fn direct_buy_on_first_day() {
        let mut engine = DcaEngine::new("TEST", direct());
        let mut ledger = SingleLedger::new(3000.0);
        engine.process_day(date(0), 100.0, &mut ledger);

        assert_eq!(executed(&engine), vec![(TransactionKind::Buy, TradeReason::DirectBuy)]);
        assert_eq!(engine.lots().len(), 1);
        assert_relative_eq!(engine.lots().total_shares(), 10.0);
        assert_relative_eq!(ledger.cash(), 2000.0);
        assert_eq!(engine.snapshots().len(), 1);
    }

    #[test]
    fn grid_spacing_blocks_close_buys() {
        let mut engine = DcaEngine::new("TEST", direct());
        let mut ledger = SingleLedger::new(3000.0);
        // 94 is over 10% below the 105 peak but only 6% below the 100 lot
        run(&mut engine, &mut ledger, &[100.0, 105.0, 94.0]);

        assert_eq!(engine.lots().len(), 1);
        let aborted: Vec<_> = engine
            .transactions()
            .iter()
            .filter(|t| t.kind == TransactionKind::AbortedBuy)
            .collect();
        assert_eq!(aborted.len(), 1);
        assert_eq!(aborted[0].reason, TradeReason::GridSpacing);
    }

    #[test]
    fn second_buy_after_drop_past_grid() {
        let mut engine = DcaEngine::new("TEST", direct());
        let mut ledger = SingleLedger::new(3000.0);
        run(&mut engine, &mut ledger, &[100.0, 89.0]);
        assert_eq!(engine.lots().len(), 2);
        assert_relative_eq!(ledger.cash(), 1000.0);
    }

    #[test]
    fn insufficient_capital_aborts() {
        let mut engine = DcaEngine::new("TEST", direct());
        let mut ledger = SingleLedger::new(1500.0);
        run(&mut engine, &mut ledger, &[100.0, 89.0]);
        assert_eq!(engine.lots().len(), 1);
        let last = engine.transactions().last().unwrap();
        assert_eq!(last.kind, TransactionKind::AbortedBuy);
        assert_eq!(last.reason, TradeReason::InsufficientCapital);
        assert_relative_eq!(ledger.cash(), 500.0);
    }

    #[test]
    fn direct_sell_after_rally() {
        let mut engine = DcaEngine::new("TEST", direct());
        let mut ledger = SingleLedger::new(3000.0);
        // bottom 100, activation 20%: 121 clears it
        run(&mut engine, &mut ledger, &[100.0, 110.0, 121.0]);

        assert_eq!(
            executed(&engine),
            vec![
                (TransactionKind::Buy, TradeReason::DirectBuy),
                (TransactionKind::Sell, TradeReason::DirectSell),
            ]
        );
        assert!(engine.lots().is_empty());
        assert_relative_eq!(engine.realized_pnl(), 210.0, epsilon = 1e-9);
        assert_relative_eq!(ledger.cash(), 3210.0, epsilon = 1e-9);
    }

    #[test]
    fn no_buy_on_a_sell_day() {
        let mut engine = DcaEngine::new("TEST", direct());
        let mut ledger = SingleLedger::new(3000.0);
        run(&mut engine, &mut ledger, &[100.0, 125.0]);
        let day_two: Vec<_> = engine
            .transactions()
            .iter()
            .filter(|t| t.date == date(1))
            .collect();
        assert_eq!(day_two.len(), 1);
        assert_eq!(day_two[0].kind, TransactionKind::Sell);
    }

    #[test]
    fn trailing_buy_waits_for_rebound() {
        let params = DcaParams {
            lot_size_usd: 1000.0,
            max_lots: 3,
            ..Default::default()
        };
        let mut engine = DcaEngine::new("TEST", params);
        let mut ledger = SingleLedger::new(3000.0);

        engine.process_day(date(0), 100.0, &mut ledger);
        assert!(engine.is_buy_stop_active());
        assert!(engine.lots().is_empty());

        // stop trails down to 80 * 1.05 = 84
        engine.process_day(date(1), 80.0, &mut ledger);
        assert!(engine.lots().is_empty());
        engine.process_day(date(2), 85.0, &mut ledger);

        assert_eq!(
            executed(&engine),
            vec![(TransactionKind::Buy, TradeReason::TrailingStopBuy)]
        );
        assert!(!engine.is_buy_stop_active());
        assert_relative_eq!(engine.lots().lots()[0].price, 85.0);
    }

    #[test]
    fn trailing_sell_follows_rally_then_sells_on_pullback() {
        let params = DcaParams {
            lot_size_usd: 1000.0,
            max_lots: 3,
            enable_trailing_buy: false,
            ..Default::default()
        };
        let mut engine = DcaEngine::new("TEST", params);
        let mut ledger = SingleLedger::new(3000.0);

        run(&mut engine, &mut ledger, &[100.0, 125.0]);
        assert!(engine.is_sell_stop_active());
        // stop raised to 135, then hit
        engine.process_day(date(2), 150.0, &mut ledger);
        engine.process_day(date(3), 134.0, &mut ledger);

        let sells: Vec<_> = engine
            .transactions()
            .iter()
            .filter(|t| t.kind == TransactionKind::Sell)
            .collect();
        assert_eq!(sells.len(), 1);
        assert_eq!(sells[0].reason, TradeReason::TrailingStopSell);
        assert_relative_eq!(sells[0].price, 134.0);
        assert!(!engine.is_sell_stop_active());
    }

    #[test]
    fn triggered_sell_without_profit_is_aborted() {
        let params = DcaParams {
            lot_size_usd: 1000.0,
            max_lots: 3,
            enable_trailing_buy: false,
            profit_requirement: 0.30,
            trailing_sell_activation: 0.0,
            trailing_sell_pullback: 0.20,
            ..Default::default()
        };
        let mut engine = DcaEngine::new("TEST", params);
        let mut ledger = SingleLedger::new(3000.0);

        // 131 arms the stop at 104.8, the pullback to 104 finds no lot 30% up
        run(&mut engine, &mut ledger, &[100.0, 131.0, 104.0]);
        assert!(engine.transactions().iter().any(|t| {
            t.kind == TransactionKind::AbortedSell && t.reason == TradeReason::NoProfitableLots
        }));
        assert_eq!(engine.lots().len(), 1);
        assert!(!engine.is_sell_stop_active());
    }

    #[test]
    fn hard_stop_loss_liquidates() {
        let params = DcaParams {
            hard_stop_loss: 0.25,
            ..direct()
        };
        let mut engine = DcaEngine::new("TEST", params);
        let mut ledger = SingleLedger::new(3000.0);
        run(&mut engine, &mut ledger, &[100.0, 89.0, 70.0]);

        let last = engine.transactions().last().unwrap();
        assert_eq!(last.kind, TransactionKind::Sell);
        assert_eq!(last.reason, TradeReason::StopLoss);
        assert!(engine.lots().is_empty());
        assert!(engine.realized_pnl() < 0.0);
    }

    #[test]
    fn max_lots_never_exceeded() {
        let params = DcaParams {
            max_lots: 2,
            max_lots_to_sell: 1,
            ..direct()
        };
        let mut engine = DcaEngine::new("TEST", params);
        let mut ledger = SingleLedger::new(10_000.0);
        run(&mut engine, &mut ledger, &[100.0, 85.0, 70.0, 60.0, 50.0]);
        assert_eq!(engine.lots().len(), 2);
        assert!(engine.snapshots().iter().all(|s| s.lots <= 2));
    }

    #[test]
    fn full_book_aborts_direct_buy() {
        let params = DcaParams {
            max_lots: 1,
            ..direct()
        };
        let mut engine = DcaEngine::new("TEST", params);
        let mut ledger = SingleLedger::new(10_000.0);
        run(&mut engine, &mut ledger, &[100.0, 85.0]);

        assert_eq!(engine.lots().len(), 1);
        let kinds: Vec<_> = engine.transactions().iter().map(|t| (t.kind, t.reason)).collect();
        assert_eq!(
            kinds,
            vec![
                (TransactionKind::Buy, TradeReason::DirectBuy),
                (TransactionKind::AbortedBuy, TradeReason::MaxLotsReached),
            ]
        );
        assert_relative_eq!(ledger.cash(), 9000.0);
    }

    #[test]
    fn momentum_buy_needs_rising_price() {
        let params = DcaParams {
            momentum_based_buy: true,
            momentum_lookback_days: 2,
            ..direct()
        };
        let mut engine = DcaEngine::new("TEST", params);
        let mut ledger = SingleLedger::new(3000.0);

        run(&mut engine, &mut ledger, &[100.0, 99.0, 98.0]);
        assert!(engine.lots().is_empty());
        engine.process_day(date(3), 101.0, &mut ledger);
        assert_eq!(
            executed(&engine),
            vec![(TransactionKind::Buy, TradeReason::MomentumBuy)]
        );
    }

    #[test]
    fn momentum_buy_requires_grid_above_last_buy() {
        let params = DcaParams {
            momentum_based_buy: true,
            momentum_lookback_days: 1,
            trailing_sell_activation: 1.0,
            ..direct()
        };
        let mut engine = DcaEngine::new("TEST", params);
        let mut ledger = SingleLedger::new(3000.0);
        run(&mut engine, &mut ledger, &[100.0, 101.0, 105.0, 112.0]);

        let buys: Vec<_> = engine
            .transactions()
            .iter()
            .filter(|t| t.kind == TransactionKind::Buy)
            .map(|t| t.price)
            .collect();
        assert_eq!(buys, vec![101.0, 112.0]);
    }

    #[test]
    fn momentum_sell_skips_activation() {
        let params = DcaParams {
            momentum_based_sell: true,
            ..direct()
        };
        let mut engine = DcaEngine::new("TEST", params);
        let mut ledger = SingleLedger::new(3000.0);
        run(&mut engine, &mut ledger, &[100.0, 106.0]);
        assert!(engine.lots().is_empty());
        assert_eq!(engine.transactions().last().unwrap().reason, TradeReason::DirectSell);
    }

    #[test]
    fn slippage_and_commission_reduce_cash() {
        let params = DcaParams {
            commission_per_trade: 1.0,
            slippage_pct: 1.0,
            ..direct()
        };
        let mut engine = DcaEngine::new("TEST", params);
        let mut ledger = SingleLedger::new(3000.0);
        engine.process_day(date(0), 100.0, &mut ledger);

        let buy = &engine.transactions()[0];
        assert_relative_eq!(buy.price, 101.0);
        assert_relative_eq!(buy.value, 1000.0, epsilon = 1e-9);
        assert_relative_eq!(ledger.cash(), 1999.0, epsilon = 1e-9);
        let expected = -1.0 - 1000.0 * (1.0 - 100.0 / 101.0);
        assert_relative_eq!(engine.snapshots()[0].total_pnl, expected, epsilon = 1e-9);
    }

    #[test]
    fn total_pnl_matches_cash_accounting() {
        let params = DcaParams {
            commission_per_trade: 2.0,
            commission_pct: 0.1,
            slippage_pct: 0.05,
            ..direct()
        };
        let mut engine = DcaEngine::new("TEST", params);
        let mut ledger = SingleLedger::new(3000.0);
        run(&mut engine, &mut ledger, &[100.0, 88.0, 76.0, 95.0, 115.0, 98.0, 130.0]);

        let snap = engine.snapshots().last().unwrap();
        let equity = ledger.cash() + snap.market_value;
        assert_relative_eq!(equity - 3000.0, snap.total_pnl, epsilon = 1e-6);
    }

    #[test]
    fn bad_price_is_skipped() {
        let mut engine = DcaEngine::new("TEST", direct());
        let mut ledger = SingleLedger::new(3000.0);
        engine.process_day(date(0), f64::NAN, &mut ledger);
        engine.process_day(date(1), 0.0, &mut ledger);
        assert!(engine.transactions().is_empty());
        assert!(engine.snapshots().is_empty());
    }

    #[test]
    fn reference_price_set_by_first_buy() {
        let params = DcaParams {
            lot_size_usd: 1000.0,
            ..Default::default()
        };
        let mut engine = DcaEngine::new("TEST", params);
        let mut ledger = SingleLedger::new(10_000.0);
        run(&mut engine, &mut ledger, &[100.0, 80.0, 90.0]);
        assert_relative_eq!(engine.reference_price().unwrap(), 90.0);
    }
}
