//! MatchingEngine: the intake queue, the matching worker, and callbacks.
//!
//! `submit` validates, stamps an id and timestamp, and enqueues; a single
//! dedicated worker drains the queue strictly in enqueue order, which is the
//! engine's primary ordering guarantee — two orders submitted in program
//! order by one thread are always processed in that order.
//!
//! Cancels and modifies are synchronous: they first scan the intake queue
//! (the target may not have been processed yet) and otherwise forward to the
//! book. A modify that makes the order marketable is matched inline on the
//! calling thread, under the same book lock the worker uses.
//!
//! Callbacks are invoked after the book lock is released; implementations
//! must not block indefinitely.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};
use rustc_hash::FxHashMap;

use crate::matching::Fill;
use crate::stop::{StopBook, StopOrder, StopStatus};
use crate::time::Clock;
use crate::{
    Execution, ExecutionId, Order, OrderBook, OrderId, OrderStatus, OrderType, Price, Quantity,
    Symbol, TraderId,
};

/// Why a submission was refused before reaching the intake queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitError {
    /// The engine is not running.
    Stopped,
    /// No book exists for the order's symbol (or the symbol is empty).
    UnknownSymbol,
    /// Quantity must be positive.
    ZeroQuantity,
    /// Non-market orders need a positive (limit or stop) price.
    InvalidPrice,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Stopped => write!(f, "engine is stopped"),
            SubmitError::UnknownSymbol => write!(f, "unknown symbol"),
            SubmitError::ZeroQuantity => write!(f, "quantity must be positive"),
            SubmitError::InvalidPrice => write!(f, "price must be positive"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Callback invoked once per fill.
pub type ExecutionCallback = Arc<dyn Fn(&Execution) + Send + Sync>;
/// Callback invoked when a processed order reaches a new status.
pub type OrderStatusCallback = Arc<dyn Fn(&Order) + Send + Sync>;

/// Running totals, advanced only on successful operations.
#[derive(Debug, Default)]
pub struct EngineStats {
    orders_submitted: AtomicU64,
    executions: AtomicU64,
    /// Total traded notional in cents.
    volume_cents: AtomicU64,
}

impl EngineStats {
    pub fn total_orders(&self) -> u64 {
        self.orders_submitted.load(Ordering::Relaxed)
    }

    pub fn total_executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Total traded notional in dollars.
    pub fn total_volume(&self) -> f64 {
        self.volume_cents.load(Ordering::Relaxed) as f64 / 100.0
    }
}

/// Per-symbol state: the live book plus pending stops.
struct SymbolState {
    symbol: Symbol,
    book: Mutex<OrderBook>,
    stops: Mutex<StopBook>,
}

#[derive(Default)]
struct Callbacks {
    execution: Option<ExecutionCallback>,
    order_status: Option<OrderStatusCallback>,
}

struct Intake {
    queue: VecDeque<Order>,
    running: bool,
    /// True while the worker is mid-order (used by `wait_idle`).
    busy: bool,
}

struct EngineShared {
    intake: Mutex<Intake>,
    /// Wakes the worker on enqueue and on stop.
    work_cv: Condvar,
    /// Wakes `wait_idle` when the queue empties.
    idle_cv: Condvar,
    symbols: RwLock<FxHashMap<Symbol, Arc<SymbolState>>>,
    /// Order id → symbol, for cancels/modifies after processing.
    order_symbols: Mutex<FxHashMap<OrderId, Symbol>>,
    callbacks: Mutex<Callbacks>,
    next_order_id: AtomicU64,
    next_execution_id: AtomicU64,
    stats: EngineStats,
    running: AtomicBool,
    clock: Clock,
}

/// The matching engine. See the module docs for the threading model.
pub struct MatchingEngine {
    shared: Arc<EngineShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Stop-trigger cascades are bounded; deeper chains indicate a pathological
/// configuration and are dropped with a warning.
const MAX_STOP_CASCADE: usize = 100;

impl MatchingEngine {
    pub fn new(clock: Clock) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                intake: Mutex::new(Intake {
                    queue: VecDeque::new(),
                    running: false,
                    busy: false,
                }),
                work_cv: Condvar::new(),
                idle_cv: Condvar::new(),
                symbols: RwLock::new(FxHashMap::default()),
                order_symbols: Mutex::new(FxHashMap::default()),
                callbacks: Mutex::new(Callbacks::default()),
                next_order_id: AtomicU64::new(1),
                next_execution_id: AtomicU64::new(1),
                stats: EngineStats::default(),
                running: AtomicBool::new(false),
                clock,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Create an order book for a symbol. Idempotent.
    pub fn add_symbol(&self, symbol: Symbol) {
        let mut symbols = self.shared.symbols.write().expect("symbols lock");
        symbols.entry(symbol).or_insert_with(|| {
            debug!("engine: added symbol {symbol}");
            Arc::new(SymbolState {
                symbol,
                book: Mutex::new(OrderBook::new(symbol)),
                stops: Mutex::new(StopBook::new()),
            })
        });
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.shared
            .symbols
            .read()
            .expect("symbols lock")
            .keys()
            .copied()
            .collect()
    }

    /// Register the execution callback. Set once, before `start`.
    pub fn set_execution_callback(&self, callback: ExecutionCallback) {
        self.shared.callbacks.lock().expect("callbacks lock").execution = Some(callback);
    }

    /// Register the order-status callback. Set once, before `start`.
    pub fn set_order_status_callback(&self, callback: OrderStatusCallback) {
        self.shared.callbacks.lock().expect("callbacks lock").order_status = Some(callback);
    }

    pub fn stats(&self) -> &EngineStats {
        &self.shared.stats
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Spawn the matching worker. Idempotent.
    pub fn start(&self) {
        let mut worker = self.worker.lock().expect("worker lock");
        if worker.is_some() {
            return;
        }
        self.shared.intake.lock().expect("intake lock").running = true;
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        *worker = Some(
            std::thread::Builder::new()
                .name("matching".into())
                .spawn(move || matching_loop(shared))
                .expect("spawn matching worker"),
        );
        info!("matching engine started");
    }

    /// Signal the worker, let it drain the queue, and join it.
    pub fn stop(&self) {
        let handle = {
            let mut worker = self.worker.lock().expect("worker lock");
            let Some(handle) = worker.take() else { return };
            self.shared.running.store(false, Ordering::SeqCst);
            self.shared.intake.lock().expect("intake lock").running = false;
            self.shared.work_cv.notify_all();
            handle
        };
        let _ = handle.join();
        info!("matching engine stopped");
    }

    /// The well-formedness checks `submit` applies, exposed so callers
    /// layered above the engine (the order manager's pre-trade gate) can
    /// run them ahead of their own checks.
    pub fn validate(&self, order: &Order) -> Result<(), SubmitError> {
        if !self.is_running() {
            return Err(SubmitError::Stopped);
        }
        if order.original_quantity == 0 {
            return Err(SubmitError::ZeroQuantity);
        }
        if order.symbol.is_empty() || !self.knows(order.symbol) {
            return Err(SubmitError::UnknownSymbol);
        }
        if order.kind.has_limit_price() && !order.price.is_valid_limit() {
            return Err(SubmitError::InvalidPrice);
        }
        if order.kind == OrderType::StopLimit
            && !order.limit_price.is_some_and(Price::is_valid_limit)
        {
            return Err(SubmitError::InvalidPrice);
        }
        Ok(())
    }

    /// Validate, stamp, and enqueue an order. Returns the assigned id.
    pub fn submit(&self, mut order: Order) -> Result<OrderId, SubmitError> {
        self.validate(&order)?;

        order.id = OrderId(self.shared.next_order_id.fetch_add(1, Ordering::SeqCst));
        order.timestamp = self.shared.clock.now();
        let id = order.id;

        self.shared
            .order_symbols
            .lock()
            .expect("order symbols lock")
            .insert(id, order.symbol);

        {
            let mut intake = self.shared.intake.lock().expect("intake lock");
            if !intake.running {
                return Err(SubmitError::Stopped);
            }
            intake.queue.push_back(order);
        }
        self.shared.work_cv.notify_one();
        self.shared.stats.orders_submitted.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    /// Cancel an order if `trader` owns it. Scans the intake queue first;
    /// otherwise forwards to the book (or the stop book). Returns false on
    /// unknown id or wrong owner, with no state change.
    pub fn cancel(&self, order_id: OrderId, trader: TraderId) -> bool {
        if !self.is_running() {
            return false;
        }

        // Not yet processed? Pull it straight out of the queue.
        {
            let mut intake = self.shared.intake.lock().expect("intake lock");
            if let Some(pos) = intake.queue.iter().position(|o| o.id == order_id) {
                if intake.queue[pos].trader != trader {
                    return false;
                }
                // Remaining queue order is preserved.
                intake.queue.remove(pos);
                return true;
            }
        }

        let Some(state) = self.symbol_state_for(order_id) else {
            return false;
        };

        // Pending stop orders live outside the main book.
        {
            let mut stops = state.stops.lock().expect("stop book lock");
            match stops.owner(order_id) {
                Some(owner) if owner == trader => return stops.cancel(order_id).is_some(),
                Some(_) => return false,
                None => {}
            }
        }

        let mut book = state.book.lock().expect("book lock");
        match book.order(order_id) {
            Some(order) if order.trader == trader => book.cancel(order_id).is_some(),
            _ => false,
        }
    }

    /// Replace an order's price and quantity if `trader` owns it.
    ///
    /// A queued order is updated in place (its queue position is
    /// irrelevant — it has no book priority yet). A resting order is
    /// re-queued at the new price and loses time priority; if the new price
    /// crosses, it is matched inline.
    pub fn modify(
        &self,
        order_id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
        trader: TraderId,
    ) -> bool {
        if !self.is_running() || new_quantity == 0 || !new_price.is_valid_limit() {
            return false;
        }

        {
            let mut intake = self.shared.intake.lock().expect("intake lock");
            if let Some(order) = intake.queue.iter_mut().find(|o| o.id == order_id) {
                if order.trader != trader {
                    return false;
                }
                order.price = new_price;
                order.original_quantity = new_quantity;
                order.remaining_quantity = new_quantity;
                return true;
            }
        }

        let Some(state) = self.symbol_state_for(order_id) else {
            return false;
        };

        let fills = {
            let mut book = state.book.lock().expect("book lock");
            match book.order(order_id) {
                Some(order) if order.trader == trader => {}
                _ => return false,
            }
            if !book.modify(order_id, new_price, new_quantity, self.shared.clock.now()) {
                return false;
            }
            book.uncross()
        };
        self.emit_fills(&state, fills);
        self.run_stop_triggers(&state, 0);
        true
    }

    /// Run a closure against a symbol's book.
    pub fn with_book<R>(&self, symbol: Symbol, f: impl FnOnce(&OrderBook) -> R) -> Option<R> {
        let state = self.symbol_state(symbol)?;
        let book = state.book.lock().expect("book lock");
        Some(f(&book))
    }

    /// Block until the intake queue is drained and the worker is idle.
    /// Returns false on timeout. Intended for tests and orderly shutdown.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut intake = self.shared.intake.lock().expect("intake lock");
        while !intake.queue.is_empty() || intake.busy {
            let Some(remaining) = deadline.checked_duration_since(std::time::Instant::now()) else {
                return false;
            };
            let (guard, result) = self
                .shared
                .idle_cv
                .wait_timeout(intake, remaining)
                .expect("idle wait");
            intake = guard;
            if result.timed_out() && (!intake.queue.is_empty() || intake.busy) {
                return false;
            }
        }
        true
    }

    // === Internals ===

    fn knows(&self, symbol: Symbol) -> bool {
        self.shared.symbols.read().expect("symbols lock").contains_key(&symbol)
    }

    fn symbol_state(&self, symbol: Symbol) -> Option<Arc<SymbolState>> {
        self.shared.symbol_state(symbol)
    }

    fn symbol_state_for(&self, order_id: OrderId) -> Option<Arc<SymbolState>> {
        let symbol = *self
            .shared
            .order_symbols
            .lock()
            .expect("order symbols lock")
            .get(&order_id)?;
        self.symbol_state(symbol)
    }

    fn emit_fills(&self, state: &SymbolState, fills: Vec<Fill>) {
        self.shared.emit_fills(state, fills);
    }

    fn run_stop_triggers(&self, state: &SymbolState, cascade_depth: usize) {
        self.shared.run_stop_triggers(state, cascade_depth);
    }
}

impl EngineShared {
    fn symbol_state(&self, symbol: Symbol) -> Option<Arc<SymbolState>> {
        self.symbols.read().expect("symbols lock").get(&symbol).cloned()
    }

    fn execution_callback(&self) -> Option<ExecutionCallback> {
        self.callbacks.lock().expect("callbacks lock").execution.clone()
    }

    fn notify_status(&self, order: &Order) {
        let callback = self.callbacks.lock().expect("callbacks lock").order_status.clone();
        if let Some(cb) = callback {
            cb(order);
        }
    }

    /// Turn fills into executions: bump counters, then invoke the callback
    /// outside any book lock.
    fn emit_fills(&self, state: &SymbolState, fills: Vec<Fill>) {
        if fills.is_empty() {
            return;
        }
        let symbol = state.symbol;
        let callback = self.execution_callback();
        for fill in fills {
            let execution = Execution {
                id: ExecutionId(self.next_execution_id.fetch_add(1, Ordering::SeqCst)),
                symbol,
                side: fill.aggressor_side,
                price: fill.price,
                quantity: fill.quantity,
                timestamp: self.clock.now(),
                taker_order: fill.taker_order,
                taker_trader: fill.taker_trader,
                maker_order: fill.maker_order,
                maker_trader: fill.maker_trader,
            };
            self.stats.executions.fetch_add(1, Ordering::Relaxed);
            self.stats
                .volume_cents
                .fetch_add(execution.notional().max(0) as u64, Ordering::Relaxed);
            debug!("execution {execution}");
            if let Some(cb) = &callback {
                cb(&execution);
            }
        }
    }

    /// Process one dequeued order against its symbol's book.
    fn process_order(&self, order: Order, cascade_depth: usize) {
        let Some(state) = self.symbol_state(order.symbol) else {
            // Symbol validated at submit; only reachable if removed since.
            warn!("dropping order {} for unknown symbol {}", order.id, order.symbol);
            return;
        };

        match order.kind {
            OrderType::Market => {
                let mut taker = order;
                let fills = {
                    let mut book = state.book.lock().expect("book lock");
                    book.sweep_market(&mut taker)
                };
                // Unfilled residual of a market order is discarded.
                if taker.remaining_quantity > 0 {
                    let residual = taker.remaining_quantity;
                    taker.remaining_quantity = 0;
                    taker.status = if taker.filled_quantity > 0 {
                        OrderStatus::Filled
                    } else {
                        OrderStatus::Cancelled
                    };
                    debug!("market order {} residual {} discarded", taker.id, residual);
                }
                self.emit_fills(&state, fills);
                self.notify_status(&taker);
            }
            OrderType::Limit => {
                let fills = {
                    let mut book = state.book.lock().expect("book lock");
                    book.insert(order.clone());
                    book.uncross()
                };
                self.emit_fills(&state, fills);
                let snapshot = state
                    .book
                    .lock()
                    .expect("book lock")
                    .order(order.id)
                    .cloned()
                    .unwrap_or(order);
                self.notify_status(&snapshot);
            }
            OrderType::Stop | OrderType::StopLimit => {
                let stop = StopOrder {
                    id: order.id,
                    side: order.side,
                    stop_price: order.price,
                    limit_price: order.limit_price,
                    quantity: order.original_quantity,
                    timestamp: order.timestamp,
                    trader: order.trader,
                    status: StopStatus::Pending,
                };
                state.stops.lock().expect("stop book lock").insert(stop);
            }
        }

        self.run_stop_triggers(&state, cascade_depth);
    }

    /// Fire any stops reached by the latest trade price, feeding the
    /// converted orders back through processing. Cascades are bounded.
    fn run_stop_triggers(&self, state: &SymbolState, cascade_depth: usize) {
        loop {
            let Some(last) = state.book.lock().expect("book lock").last_trade_price() else {
                return;
            };
            let triggered = state.stops.lock().expect("stop book lock").collect_triggered(last);
            if triggered.is_empty() {
                return;
            }
            if cascade_depth >= MAX_STOP_CASCADE {
                warn!(
                    "stop cascade depth {} exceeded; dropping {} stops",
                    MAX_STOP_CASCADE,
                    triggered.len()
                );
                return;
            }
            for stop in triggered {
                let mut converted = match stop.limit_price {
                    Some(limit) => {
                        Order::limit(state.symbol, stop.side, limit, stop.quantity, stop.trader)
                    }
                    None => Order::market(state.symbol, stop.side, stop.quantity, stop.trader),
                };
                converted.id = stop.id;
                converted.timestamp = self.clock.now();
                debug!("stop {} triggered at {}", stop.id, last);
                self.process_order(converted, cascade_depth + 1);
            }
        }
    }
}

impl Drop for MatchingEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The matching worker: drain the intake queue in FIFO order, parking on
/// the condvar when empty, draining any remainder before exit.
fn matching_loop(shared: Arc<EngineShared>) {
    loop {
        let order = {
            let mut intake = shared.intake.lock().expect("intake lock");
            loop {
                if let Some(order) = intake.queue.pop_front() {
                    intake.busy = true;
                    break Some(order);
                }
                if !intake.running {
                    break None;
                }
                shared.idle_cv.notify_all();
                intake = shared.work_cv.wait(intake).expect("work wait");
            }
        };

        let Some(order) = order else {
            shared.idle_cv.notify_all();
            return;
        };

        shared.process_order(order, 0);

        let mut intake = shared.intake.lock().expect("intake lock");
        intake.busy = false;
        if intake.queue.is_empty() {
            shared.idle_cv.notify_all();
        }
    }
}
