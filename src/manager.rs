//! OrderManager: pre-trade risk, positions, and P&L around the engine.
//!
//! The manager owns the matching engine. Every order passes the risk gate
//! before submission; every execution flows back through the manager, which
//! updates the per-symbol position, realizes P&L, tracks drawdown, and then
//! fans the event out to the registered callbacks.
//!
//! Positions are per symbol, not per (trader, symbol): the signed delta
//! applied for each execution is the aggressor side's. The per-trader table
//! tracks *orders* (for ownership checks and fill latency), not positions.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::engine::{MatchingEngine, SubmitError};
use crate::position::Position;
use crate::risk::{self, RiskContext, RiskLimits, RiskViolation};
use crate::time::Clock;
use crate::{
    Execution, Order, OrderBook, OrderId, Price, Quantity, Side, Symbol, Timestamp, TraderId,
};

/// Why `place` refused an order.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaceError {
    /// Failed a pre-trade risk check.
    Risk(RiskViolation),
    /// Failed the engine's own validation (quantity, price, symbol) or the
    /// engine is stopped.
    Submit(SubmitError),
}

impl fmt::Display for PlaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceError::Risk(v) => write!(f, "{v}"),
            PlaceError::Submit(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PlaceError {}

/// A round trip closed by an execution: some quantity left the position.
///
/// Consumed by analytics to build trade records; `latency` is the taker
/// order's submit-to-fill time when the closing order is known to this
/// manager.
#[derive(Clone, Debug)]
pub struct ClosedTrade {
    pub symbol: Symbol,
    /// Side of the closing fill (the aggressor's).
    pub side: Side,
    pub entry_price: Price,
    pub exit_price: Price,
    pub quantity: Quantity,
    /// Realized P&L in cents.
    pub pnl: i64,
    pub entry_time: Timestamp,
    pub exit_time: Timestamp,
    pub latency_ns: Option<u64>,
    pub trader: TraderId,
}

pub type ExecutionCallback = Arc<dyn Fn(&Execution) + Send + Sync>;
pub type PositionCallback = Arc<dyn Fn(&Position) + Send + Sync>;
pub type RiskAlertCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type ClosedTradeCallback = Arc<dyn Fn(&ClosedTrade) + Send + Sync>;

#[derive(Default)]
struct ManagerCallbacks {
    execution: Option<ExecutionCallback>,
    position: Option<PositionCallback>,
    risk_alert: Option<RiskAlertCallback>,
    closed_trade: Option<ClosedTradeCallback>,
}

struct PositionEntry {
    position: Position,
    /// When the current open position was first entered.
    entry_time: Timestamp,
}

#[derive(Clone, Copy)]
struct ActiveOrder {
    symbol: Symbol,
    submitted_at: Timestamp,
}

#[derive(Default)]
struct PnlState {
    /// Cumulative realized P&L for the session day (cents).
    daily_pnl: i64,
    peak_equity: i64,
    max_drawdown: f64,
    /// Alert once per breach episode, not once per tick.
    drawdown_breached: bool,
}

struct ManagerState {
    positions: Mutex<FxHashMap<Symbol, PositionEntry>>,
    /// (trader, order) → submit info; authoritative for ownership checks.
    active: Mutex<FxHashMap<TraderId, FxHashMap<OrderId, ActiveOrder>>>,
    limits: RwLock<RiskLimits>,
    pnl: Mutex<PnlState>,
    /// Latest observed mark per symbol (mid or last trade, in cents).
    marks: Mutex<FxHashMap<Symbol, Price>>,
    callbacks: Mutex<ManagerCallbacks>,
    clock: Clock,
}

/// Order-lifecycle and risk manager. See module docs.
pub struct OrderManager {
    engine: MatchingEngine,
    state: Arc<ManagerState>,
}

impl OrderManager {
    pub fn new(clock: Clock) -> Self {
        Self::with_limits(clock, RiskLimits::default())
    }

    /// # Panics
    ///
    /// Panics if `limits` fails validation — misconfiguration should fail
    /// at construction, not at the first order.
    pub fn with_limits(clock: Clock, limits: RiskLimits) -> Self {
        if let Err(msg) = limits.validate() {
            panic!("invalid RiskLimits: {msg}");
        }

        let engine = MatchingEngine::new(clock.clone());
        let state = Arc::new(ManagerState {
            positions: Mutex::new(FxHashMap::default()),
            active: Mutex::new(FxHashMap::default()),
            limits: RwLock::new(limits),
            pnl: Mutex::new(PnlState::default()),
            marks: Mutex::new(FxHashMap::default()),
            callbacks: Mutex::new(ManagerCallbacks::default()),
            clock,
        });

        let on_exec = Arc::clone(&state);
        engine.set_execution_callback(Arc::new(move |execution: &Execution| {
            on_exec.handle_execution(execution);
        }));

        Self { engine, state }
    }

    // === Lifecycle ===

    pub fn start(&self) {
        self.engine.start();
    }

    pub fn stop(&self) {
        self.engine.stop();
    }

    pub fn add_symbol(&self, symbol: Symbol) {
        self.engine.add_symbol(symbol);
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    // === Callbacks (set once, before start) ===

    pub fn set_execution_callback(&self, callback: ExecutionCallback) {
        self.state.callbacks.lock().expect("callbacks lock").execution = Some(callback);
    }

    pub fn set_position_callback(&self, callback: PositionCallback) {
        self.state.callbacks.lock().expect("callbacks lock").position = Some(callback);
    }

    pub fn set_risk_alert_callback(&self, callback: RiskAlertCallback) {
        self.state.callbacks.lock().expect("callbacks lock").risk_alert = Some(callback);
    }

    pub fn set_closed_trade_callback(&self, callback: ClosedTradeCallback) {
        self.state.callbacks.lock().expect("callbacks lock").closed_trade = Some(callback);
    }

    // === Order flow ===

    /// Risk-check and submit an order. On rejection the risk-alert callback
    /// fires with the human-readable reason and no state changes.
    ///
    /// Checks run in the documented order: well-formedness (quantity,
    /// price, symbol) first, then the risk limits.
    pub fn place(&self, order: Order) -> Result<OrderId, PlaceError> {
        if let Err(error) = self.engine.validate(&order) {
            let reason = error.to_string();
            warn!("REJECTED {} {}: {}", order.trader, order.symbol, reason);
            self.state.alert(&reason);
            return Err(PlaceError::Submit(error));
        }

        let context = self.risk_context(&order);
        let limits = self.state.limits.read().expect("limits lock").clone();
        if let Err(violation) = risk::evaluate(&limits, &order, &context) {
            let reason = violation.to_string();
            warn!("REJECTED {} {} {}: {}", order.trader, order.side, order.symbol, reason);
            self.state.alert(&reason);
            return Err(PlaceError::Risk(violation));
        }

        let (symbol, trader) = (order.symbol, order.trader);
        match self.engine.submit(order) {
            Ok(id) => {
                self.state
                    .active
                    .lock()
                    .expect("active lock")
                    .entry(trader)
                    .or_default()
                    .insert(
                        id,
                        ActiveOrder {
                            symbol,
                            submitted_at: self.state.clock.now(),
                        },
                    );
                Ok(id)
            }
            Err(error) => {
                let reason = error.to_string();
                warn!("REJECTED {} {}: {}", trader, symbol, reason);
                self.state.alert(&reason);
                Err(PlaceError::Submit(error))
            }
        }
    }

    /// Cancel if `trader` owns the order. The per-trader table is checked
    /// first; the engine re-verifies against the book.
    pub fn cancel(&self, order_id: OrderId, trader: TraderId) -> bool {
        if !self.owns(trader, order_id) {
            return false;
        }
        let cancelled = self.engine.cancel(order_id, trader);
        if cancelled {
            self.forget_order(trader, order_id);
        }
        cancelled
    }

    /// Modify if `trader` owns the order (re-queue semantics, see the book).
    pub fn modify(
        &self,
        order_id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
        trader: TraderId,
    ) -> bool {
        if !self.owns(trader, order_id) {
            return false;
        }
        self.engine.modify(order_id, new_price, new_quantity, trader)
    }

    // === Positions and P&L ===

    /// The position for a symbol (flat if never traded).
    pub fn position(&self, symbol: Symbol) -> Position {
        self.state
            .positions
            .lock()
            .expect("positions lock")
            .get(&symbol)
            .map(|e| e.position.clone())
            .unwrap_or_else(|| Position::new(symbol))
    }

    /// All non-trivial positions.
    pub fn positions(&self) -> Vec<Position> {
        self.state
            .positions
            .lock()
            .expect("positions lock")
            .values()
            .map(|e| e.position.clone())
            .collect()
    }

    /// Realized P&L for the session day (cents).
    pub fn daily_pnl(&self) -> i64 {
        self.state.pnl.lock().expect("pnl lock").daily_pnl
    }

    /// Running maximum drawdown fraction of peak equity.
    pub fn max_drawdown(&self) -> f64 {
        self.state.pnl.lock().expect("pnl lock").max_drawdown
    }

    /// Realized plus unrealized P&L at current marks (cents).
    pub fn total_pnl(&self) -> i64 {
        self.state.total_pnl()
    }

    pub fn set_risk_limits(&self, limits: RiskLimits) -> Result<(), String> {
        limits.validate()?;
        *self.state.limits.write().expect("limits lock") = limits;
        Ok(())
    }

    pub fn risk_limits(&self) -> RiskLimits {
        self.state.limits.read().expect("limits lock").clone()
    }

    /// Record a fresh mark (mid or last trade) for a symbol. The feed and
    /// monitor drive this; executions also update it.
    pub fn update_mark(&self, symbol: Symbol, price: Price) {
        self.state.marks.lock().expect("marks lock").insert(symbol, price);
    }

    pub fn mark(&self, symbol: Symbol) -> Option<Price> {
        self.state.marks.lock().expect("marks lock").get(&symbol).copied()
    }

    // === Book queries (for strategies) ===

    pub fn best_bid(&self, symbol: Symbol) -> Option<Price> {
        self.engine.with_book(symbol, OrderBook::best_bid).flatten()
    }

    pub fn best_ask(&self, symbol: Symbol) -> Option<Price> {
        self.engine.with_book(symbol, OrderBook::best_ask).flatten()
    }

    /// Mid in cents, falling back to the last trade price.
    pub fn mid_price(&self, symbol: Symbol) -> Option<f64> {
        self.engine.with_book(symbol, OrderBook::mid_price).flatten()
    }

    /// Spread in cents (0 when one-sided).
    pub fn spread(&self, symbol: Symbol) -> i64 {
        self.engine.with_book(symbol, OrderBook::spread).unwrap_or(0)
    }

    // === Internals ===

    fn owns(&self, trader: TraderId, order_id: OrderId) -> bool {
        self.state
            .active
            .lock()
            .expect("active lock")
            .get(&trader)
            .is_some_and(|orders| orders.contains_key(&order_id))
    }

    fn forget_order(&self, trader: TraderId, order_id: OrderId) {
        if let Some(orders) = self.state.active.lock().expect("active lock").get_mut(&trader) {
            orders.remove(&order_id);
        }
    }

    fn risk_context(&self, order: &Order) -> RiskContext {
        let reference_price = if order.kind.has_limit_price() {
            Some(order.price)
        } else {
            self.mark_or_mid(order.symbol)
        };

        let position_qty = self
            .state
            .positions
            .lock()
            .expect("positions lock")
            .get(&order.symbol)
            .map(|e| e.position.quantity)
            .unwrap_or(0);

        RiskContext {
            position_qty,
            reference_price,
            daily_pnl: self.daily_pnl(),
            gross_exposure: self.state.gross_exposure(),
        }
    }

    fn mark_or_mid(&self, symbol: Symbol) -> Option<Price> {
        self.mark(symbol)
            .or_else(|| self.mid_price(symbol).map(|cents| Price(cents.round() as i64)))
    }
}

impl ManagerState {
    fn alert(&self, reason: &str) {
        let callback = self.callbacks.lock().expect("callbacks lock").risk_alert.clone();
        if let Some(cb) = callback {
            cb(reason);
        }
    }

    /// Sum of |position value| across symbols at current marks, in cents.
    fn gross_exposure(&self) -> i64 {
        let positions = self.positions.lock().expect("positions lock");
        let marks = self.marks.lock().expect("marks lock");
        positions
            .values()
            .filter_map(|entry| {
                let mark = marks.get(&entry.position.symbol)?;
                Some(entry.position.market_value(*mark).saturating_abs())
            })
            .fold(0_i64, i64::saturating_add)
    }

    fn total_pnl(&self) -> i64 {
        let positions = self.positions.lock().expect("positions lock");
        let marks = self.marks.lock().expect("marks lock");
        positions
            .values()
            .map(|entry| {
                let unrealized = marks
                    .get(&entry.position.symbol)
                    .map(|mark| entry.position.unrealized_pnl(*mark))
                    .unwrap_or(0);
                entry.position.realized_pnl + unrealized
            })
            .sum()
    }

    /// Engine execution callback: position, P&L, drawdown, then fan-out.
    fn handle_execution(&self, execution: &Execution) {
        let delta = execution.side.sign() * execution.quantity as i64;

        let (position_snapshot, realized, entry_price, entry_time) = {
            let mut positions = self.positions.lock().expect("positions lock");
            let entry = positions
                .entry(execution.symbol)
                .or_insert_with(|| PositionEntry {
                    position: Position::new(execution.symbol),
                    entry_time: execution.timestamp,
                });
            if entry.position.is_flat() {
                entry.entry_time = execution.timestamp;
            }
            let entry_price = Price(entry.position.avg_price);
            let entry_time = entry.entry_time;
            let realized = entry.position.apply_fill(delta, execution.price.0);
            if entry.position.is_flat() {
                // Next open re-stamps its own entry time.
                entry.entry_time = execution.timestamp;
            }
            (entry.position.clone(), realized, entry_price, entry_time)
        };

        self.marks
            .lock()
            .expect("marks lock")
            .insert(execution.symbol, execution.price);

        if realized.quantity != 0 {
            self.pnl.lock().expect("pnl lock").daily_pnl += realized.pnl;
        }
        self.update_drawdown();

        let callbacks = {
            let cb = self.callbacks.lock().expect("callbacks lock");
            (cb.execution.clone(), cb.position.clone(), cb.closed_trade.clone())
        };

        if let Some(cb) = &callbacks.0 {
            cb(execution);
        }
        if let Some(cb) = &callbacks.1 {
            cb(&position_snapshot);
        }
        if realized.quantity != 0 {
            if let Some(cb) = &callbacks.2 {
                let latency_ns = self.taker_latency(execution);
                cb(&ClosedTrade {
                    symbol: execution.symbol,
                    side: execution.side,
                    entry_price,
                    exit_price: execution.price,
                    quantity: realized.quantity.unsigned_abs(),
                    pnl: realized.pnl,
                    entry_time,
                    exit_time: execution.timestamp,
                    latency_ns,
                    trader: execution.taker_trader,
                });
            }
        }
    }

    fn taker_latency(&self, execution: &Execution) -> Option<u64> {
        let active = self.active.lock().expect("active lock");
        let info = active.get(&execution.taker_trader)?.get(&execution.taker_order)?;
        debug_assert_eq!(info.symbol, execution.symbol);
        Some(execution.timestamp.saturating_sub(info.submitted_at))
    }

    fn update_drawdown(&self) {
        let equity = self.total_pnl();
        let limits_max_drawdown = self.limits.read().expect("limits lock").max_drawdown;

        let alert = {
            let mut pnl = self.pnl.lock().expect("pnl lock");
            if equity > pnl.peak_equity {
                pnl.peak_equity = equity;
            }
            let drawdown = if pnl.peak_equity > 0 {
                (pnl.peak_equity - equity) as f64 / pnl.peak_equity as f64
            } else {
                0.0
            };
            if drawdown > pnl.max_drawdown {
                pnl.max_drawdown = drawdown;
            }

            if drawdown > limits_max_drawdown {
                if !pnl.drawdown_breached {
                    pnl.drawdown_breached = true;
                    Some(drawdown)
                } else {
                    None
                }
            } else {
                pnl.drawdown_breached = false;
                None
            }
        };

        // Alert only; positions are never auto-flattened.
        if let Some(drawdown) = alert {
            info!("drawdown {:.1}% breached limit", drawdown * 100.0);
            self.alert(&format!(
                "drawdown {:.1}% exceeds limit {:.1}%",
                drawdown * 100.0,
                limits_max_drawdown * 100.0
            ));
        }
    }
}

impl Drop for OrderManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn sym() -> Symbol {
        Symbol::new("AAPL")
    }

    fn trader(name: &str) -> TraderId {
        TraderId::new(name)
    }

    fn manager(limits: RiskLimits) -> OrderManager {
        let manager = OrderManager::with_limits(Clock::new(), limits);
        manager.add_symbol(sym());
        manager.start();
        manager
    }

    fn settle(manager: &OrderManager) {
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn place_and_fill_updates_position() {
        let m = manager(RiskLimits::default());
        m.place(Order::limit(sym(), Side::Sell, Price(150_00), 100, trader("MAKER"))).unwrap();
        m.place(Order::limit(sym(), Side::Buy, Price(150_00), 100, trader("TAKER"))).unwrap();
        settle(&m);

        // Aggressor was the buy: per-symbol position is long 100.
        let position = m.position(sym());
        assert_eq!(position.quantity, 100);
        assert_eq!(position.avg_price, 150_00);
        assert_eq!(m.daily_pnl(), 0);
        m.stop();
    }

    #[test]
    fn oversize_order_rejected_without_state_change() {
        let limits = RiskLimits {
            max_order_size: 1_000,
            ..RiskLimits::default()
        };
        let m = manager(limits);

        let alerts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&alerts);
        m.set_risk_alert_callback(Arc::new(move |reason: &str| {
            sink.lock().unwrap().push(reason.to_string());
        }));

        let result = m.place(Order::limit(sym(), Side::Buy, Price(150_00), 2_000, trader("T")));
        assert!(matches!(result, Err(PlaceError::Risk(RiskViolation::OrderSize { .. }))));

        settle(&m);
        assert!(m.position(sym()).is_flat());
        m.engine().with_book(sym(), |b| assert_eq!(b.best_bid(), None)).unwrap();

        let alerts = alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].contains("size"));
        m.stop();
    }

    #[test]
    fn engine_validation_also_alerts() {
        let m = manager(RiskLimits::default());
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        m.set_risk_alert_callback(Arc::new(move |_: &str| {
            sink.fetch_add(1, Ordering::SeqCst);
        }));

        let result = m.place(Order::limit(sym(), Side::Buy, Price::ZERO, 100, trader("T")));
        assert!(matches!(result, Err(PlaceError::Submit(SubmitError::InvalidPrice))));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        m.stop();
    }

    #[test]
    fn well_formedness_precedes_risk_checks() {
        let limits = RiskLimits {
            max_order_size: 1_000,
            ..RiskLimits::default()
        };
        let m = manager(limits);

        // Malformed (zero price) AND oversized: the well-formedness
        // rejection wins, not the size check.
        let result = m.place(Order::limit(sym(), Side::Buy, Price::ZERO, 2_000, trader("T")));
        assert!(matches!(result, Err(PlaceError::Submit(SubmitError::InvalidPrice))));

        // Same for an unknown symbol.
        let result = m.place(Order::limit(Symbol::new("XXXX"), Side::Buy, Price(150_00), 2_000, trader("T")));
        assert!(matches!(result, Err(PlaceError::Submit(SubmitError::UnknownSymbol))));
        m.stop();
    }

    #[test]
    fn realized_pnl_reaches_daily_pnl() {
        let m = manager(RiskLimits::default());
        let t = trader("FLOW");
        let maker = trader("MAKER");

        // Buy 100 @ 150 (aggressor buy).
        m.place(Order::limit(sym(), Side::Sell, Price(150_00), 100, maker)).unwrap();
        m.place(Order::limit(sym(), Side::Buy, Price(150_00), 100, t)).unwrap();
        // Sell 100 @ 155 (aggressor sell).
        m.place(Order::limit(sym(), Side::Buy, Price(155_00), 100, maker)).unwrap();
        m.place(Order::limit(sym(), Side::Sell, Price(155_00), 100, t)).unwrap();
        settle(&m);

        assert_eq!(m.daily_pnl(), 100 * 5_00);
        assert!(m.position(sym()).is_flat());
        assert_eq!(m.total_pnl(), 100 * 5_00);
        m.stop();
    }

    #[test]
    fn closed_trades_are_reported() {
        let m = manager(RiskLimits::default());
        let trades = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&trades);
        m.set_closed_trade_callback(Arc::new(move |t: &ClosedTrade| {
            sink.lock().unwrap().push(t.clone());
        }));

        let t = trader("FLOW");
        let maker = trader("MAKER");
        m.place(Order::limit(sym(), Side::Sell, Price(150_00), 100, maker)).unwrap();
        m.place(Order::limit(sym(), Side::Buy, Price(150_00), 100, t)).unwrap();
        m.place(Order::limit(sym(), Side::Buy, Price(155_00), 40, maker)).unwrap();
        m.place(Order::limit(sym(), Side::Sell, Price(155_00), 40, t)).unwrap();
        settle(&m);

        let trades = trades.lock().unwrap();
        assert_eq!(trades.len(), 1);
        let trade = &trades[0];
        assert_eq!(trade.quantity, 40);
        assert_eq!(trade.entry_price, Price(150_00));
        assert_eq!(trade.exit_price, Price(155_00));
        assert_eq!(trade.pnl, 40 * 5_00);
        assert!(trade.exit_time >= trade.entry_time);
        m.stop();
    }

    #[test]
    fn ownership_enforced_on_cancel_and_modify() {
        let m = manager(RiskLimits::default());
        let id = m
            .place(Order::limit(sym(), Side::Buy, Price(150_00), 100, trader("OWNER")))
            .unwrap();
        settle(&m);

        assert!(!m.cancel(id, trader("THIEF")));
        assert!(!m.modify(id, Price(151_00), 100, trader("THIEF")));
        assert!(m.modify(id, Price(149_00), 100, trader("OWNER")));
        assert!(m.cancel(id, trader("OWNER")));
        assert!(!m.cancel(id, trader("OWNER"))); // already gone
        m.stop();
    }

    #[test]
    fn daily_loss_floor_blocks_new_orders() {
        let limits = RiskLimits {
            max_daily_loss: 100_00, // $100
            ..RiskLimits::default()
        };
        let m = manager(limits);
        let t = trader("FLOW");
        let maker = trader("MAKER");

        // Lose $500: buy 100 @ 150, sell 100 @ 145.
        m.place(Order::limit(sym(), Side::Sell, Price(150_00), 100, maker)).unwrap();
        m.place(Order::limit(sym(), Side::Buy, Price(150_00), 100, t)).unwrap();
        m.place(Order::limit(sym(), Side::Buy, Price(145_00), 100, maker)).unwrap();
        m.place(Order::limit(sym(), Side::Sell, Price(145_00), 100, t)).unwrap();
        settle(&m);
        assert_eq!(m.daily_pnl(), -100 * 5_00);

        let result = m.place(Order::limit(sym(), Side::Buy, Price(150_00), 10, t));
        assert!(matches!(result, Err(PlaceError::Risk(RiskViolation::DailyLoss { .. }))));
        m.stop();
    }

    #[test]
    fn drawdown_alert_fires_once_per_breach() {
        let limits = RiskLimits {
            max_drawdown: 0.05,
            ..RiskLimits::default()
        };
        let m = manager(limits);
        let alerts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&alerts);
        m.set_risk_alert_callback(Arc::new(move |reason: &str| {
            sink.lock().unwrap().push(reason.to_string());
        }));

        let t = trader("FLOW");
        let maker = trader("MAKER");
        // Win $1,000, then lose $900 of it: drawdown 90% of peak.
        m.place(Order::limit(sym(), Side::Sell, Price(150_00), 100, maker)).unwrap();
        m.place(Order::limit(sym(), Side::Buy, Price(150_00), 100, t)).unwrap();
        m.place(Order::limit(sym(), Side::Buy, Price(160_00), 100, maker)).unwrap();
        m.place(Order::limit(sym(), Side::Sell, Price(160_00), 100, t)).unwrap();

        m.place(Order::limit(sym(), Side::Sell, Price(160_00), 100, maker)).unwrap();
        m.place(Order::limit(sym(), Side::Buy, Price(160_00), 100, t)).unwrap();
        m.place(Order::limit(sym(), Side::Buy, Price(151_00), 100, maker)).unwrap();
        m.place(Order::limit(sym(), Side::Sell, Price(151_00), 100, t)).unwrap();
        settle(&m);

        let drawdown_alerts: Vec<_> = alerts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.contains("drawdown"))
            .cloned()
            .collect();
        assert_eq!(drawdown_alerts.len(), 1);
        assert!(m.max_drawdown() > 0.05);
        // Positions are not auto-flattened.
        assert!(m.position(sym()).is_flat()); // flat because we traded round trips
        m.stop();
    }

    #[test]
    fn marks_drive_unrealized_pnl() {
        let m = manager(RiskLimits::default());
        let t = trader("FLOW");
        m.place(Order::limit(sym(), Side::Sell, Price(150_00), 100, trader("MAKER"))).unwrap();
        m.place(Order::limit(sym(), Side::Buy, Price(150_00), 100, t)).unwrap();
        settle(&m);

        // Mark moved by the execution itself.
        assert_eq!(m.mark(sym()), Some(Price(150_00)));
        assert_eq!(m.total_pnl(), 0);

        m.update_mark(sym(), Price(153_00));
        assert_eq!(m.total_pnl(), 100 * 3_00);
        m.stop();
    }
}
