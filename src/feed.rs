//! MarketDataFeed: synthetic price formation.
//!
//! The feed owns one synthetic order book per symbol. A producer thread
//! ticks at a configured period and, for each symbol, samples a zero-mean
//! normal price increment, probabilistically injects a synthetic limit
//! order around the new price, and publishes the top of book through the
//! price callback. Callbacks run synchronously on the feed thread and must
//! not block; the feed provides no backpressure.
//!
//! The RNG is a seeded ChaCha8 stream, so a fixed seed reproduces the same
//! synthetic tape.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rustc_hash::FxHashMap;

use crate::time::Clock;
use crate::{Order, OrderBook, OrderId, Price, Side, Symbol, TraderId};

/// Pseudo-trader stamped on all synthetic liquidity.
pub const SYNTHETIC_TRADER: &str = "MARKET_MAKER";

/// Relative standard deviation of one tick's price increment before the
/// volatility multiplier is applied.
const BASE_TICK_SIGMA: f64 = 0.001;

/// Probability that a tick injects a synthetic resting order.
const INJECT_PROBABILITY: f64 = 0.3;

/// Synthetic order size range (shares).
const INJECT_SIZE: std::ops::RangeInclusive<u64> = 100..=1000;

/// Feed configuration.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Tick period (default 100 ms).
    pub tick_period: Duration,
    /// Scales the standard deviation of price increments.
    pub volatility_multiplier: f64,
    /// RNG seed; a fixed seed gives a reproducible tape.
    pub seed: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(100),
            volatility_multiplier: 1.0,
            seed: 0x5EED,
        }
    }
}

/// `(symbol, best_bid, best_ask)` published on every tick per symbol.
pub type PriceCallback = Arc<dyn Fn(Symbol, Option<Price>, Option<Price>) + Send + Sync>;
/// Invoked for every synthetic order the feed injects.
pub type SyntheticOrderCallback = Arc<dyn Fn(&Order) + Send + Sync>;

#[derive(Default)]
struct FeedCallbacks {
    price: Option<PriceCallback>,
    order: Option<SyntheticOrderCallback>,
}

struct FeedShared {
    books: Mutex<FxHashMap<Symbol, OrderBook>>,
    callbacks: Mutex<FeedCallbacks>,
    running: AtomicBool,
    /// Wakes the ticker early on stop.
    stop_cv: Condvar,
    stop_lock: Mutex<()>,
    config: FeedConfig,
    clock: Clock,
    /// Ids for synthetic orders, distinct from engine ids only within the
    /// feed's own books.
    next_order_id: AtomicU64,
}

/// The synthetic market-data feed. See module docs.
pub struct MarketDataFeed {
    shared: Arc<FeedShared>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl MarketDataFeed {
    pub fn new(clock: Clock, config: FeedConfig) -> Self {
        Self {
            shared: Arc::new(FeedShared {
                books: Mutex::new(FxHashMap::default()),
                callbacks: Mutex::new(FeedCallbacks::default()),
                running: AtomicBool::new(false),
                stop_cv: Condvar::new(),
                stop_lock: Mutex::new(()),
                config,
                clock,
                next_order_id: AtomicU64::new(1),
            }),
            ticker: Mutex::new(None),
        }
    }

    /// Seed a symbol's synthetic book: one bid at `initial_price` and one
    /// ask a cent above, both from the MARKET_MAKER pseudo-trader, so the
    /// top of book is populated before the first tick.
    pub fn add_symbol(&self, symbol: Symbol, initial_price: Price) {
        let mut books = self.shared.books.lock().expect("feed books lock");
        let book = books.entry(symbol).or_insert_with(|| OrderBook::new(symbol));

        let trader = TraderId::new(SYNTHETIC_TRADER);
        for (side, price) in [
            (Side::Buy, initial_price),
            (Side::Sell, Price(initial_price.0 + 1)),
        ] {
            let mut order = Order::limit(symbol, side, price, 1000, trader);
            order.id = OrderId(self.shared.next_order_id.fetch_add(1, Ordering::Relaxed));
            order.timestamp = self.shared.clock.now();
            book.insert(order);
        }
        debug!("feed: seeded {symbol} at {initial_price}");
    }

    /// Register the top-of-book callback. Set once, before `start`.
    pub fn set_price_callback(&self, callback: PriceCallback) {
        self.shared.callbacks.lock().expect("feed callbacks lock").price = Some(callback);
    }

    /// Register the synthetic-order callback. Set once, before `start`.
    pub fn set_order_callback(&self, callback: SyntheticOrderCallback) {
        self.shared.callbacks.lock().expect("feed callbacks lock").order = Some(callback);
    }

    /// Run a closure against a symbol's synthetic book.
    pub fn with_book<R>(&self, symbol: Symbol, f: impl FnOnce(&OrderBook) -> R) -> Option<R> {
        let books = self.shared.books.lock().expect("feed books lock");
        books.get(&symbol).map(|b| f(b))
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Spawn the ticker thread. Idempotent.
    pub fn start(&self) {
        let mut ticker = self.ticker.lock().expect("ticker lock");
        if ticker.is_some() {
            return;
        }
        self.shared.running.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        *ticker = Some(
            std::thread::Builder::new()
                .name("md-feed".into())
                .spawn(move || feed_loop(shared))
                .expect("spawn feed ticker"),
        );
        info!("market data feed started");
    }

    /// Set the stop flag, wake the ticker, and join it.
    pub fn stop(&self) {
        let handle = {
            let mut ticker = self.ticker.lock().expect("ticker lock");
            let Some(handle) = ticker.take() else { return };
            self.shared.running.store(false, Ordering::SeqCst);
            let _guard = self.shared.stop_lock.lock().expect("stop lock");
            self.shared.stop_cv.notify_all();
            handle
        };
        let _ = handle.join();
        info!("market data feed stopped");
    }

    /// Run exactly one tick inline (deterministic tests; no thread needed).
    pub fn tick_once(&self, rng: &mut ChaCha8Rng) {
        self.shared.tick(rng);
    }
}

impl Drop for MarketDataFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

fn feed_loop(shared: Arc<FeedShared>) {
    let mut rng = ChaCha8Rng::seed_from_u64(shared.config.seed);
    while shared.running.load(Ordering::SeqCst) {
        shared.tick(&mut rng);

        // Park for the tick period, but wake promptly on stop.
        let guard = shared.stop_lock.lock().expect("stop lock");
        if !shared.running.load(Ordering::SeqCst) {
            break;
        }
        let _ = shared
            .stop_cv
            .wait_timeout(guard, shared.config.tick_period)
            .expect("tick wait");
    }
}

impl FeedShared {
    /// One tick: evolve each symbol's price, maybe inject liquidity, then
    /// publish the top of book.
    fn tick(&self, rng: &mut ChaCha8Rng) {
        let sigma = BASE_TICK_SIGMA * self.config.volatility_multiplier;
        let increment = Normal::new(0.0, sigma.max(f64::EPSILON)).expect("valid normal");

        let mut published = Vec::new();
        {
            let mut books = self.books.lock().expect("feed books lock");
            for (symbol, book) in books.iter_mut() {
                let Some(mid_cents) = book.mid_price() else { continue };
                if mid_cents <= 0.0 {
                    continue;
                }

                let new_price = Price(((mid_cents * (1.0 + increment.sample(rng))).round() as i64).max(1));

                let injected = if rng.gen_bool(INJECT_PROBABILITY) {
                    let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
                    let quantity = rng.gen_range(INJECT_SIZE);
                    let mut order = Order::limit(
                        *symbol,
                        side,
                        new_price,
                        quantity,
                        TraderId::new(SYNTHETIC_TRADER),
                    );
                    order.id = OrderId(self.next_order_id.fetch_add(1, Ordering::Relaxed));
                    order.timestamp = self.clock.now();
                    book.insert(order.clone());
                    // A synthetic order crossing its own book just uncrosses
                    // the feed book; the prints are not real executions.
                    book.uncross();
                    Some(order)
                } else {
                    None
                };

                published.push((*symbol, book.best_bid(), book.best_ask(), injected));
            }
        }

        // Callbacks run outside the book lock, synchronously per tick.
        let callbacks = {
            let cb = self.callbacks.lock().expect("feed callbacks lock");
            (cb.price.clone(), cb.order.clone())
        };
        for (symbol, bid, ask, injected) in published {
            if let (Some(cb), Some(order)) = (&callbacks.1, &injected) {
                cb(order);
            }
            if let Some(cb) = &callbacks.0 {
                cb(symbol, bid, ask);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn sym() -> Symbol {
        Symbol::new("AAPL")
    }

    #[test]
    fn bootstrap_seeds_top_of_book() {
        let feed = MarketDataFeed::new(Clock::new(), FeedConfig::default());
        feed.add_symbol(sym(), Price(150_00));

        feed.with_book(sym(), |book| {
            assert_eq!(book.best_bid(), Some(Price(150_00)));
            assert_eq!(book.best_ask(), Some(Price(150_01)));
        })
        .unwrap();
    }

    #[test]
    fn ticks_publish_top_of_book() {
        let feed = MarketDataFeed::new(Clock::new(), FeedConfig::default());
        feed.add_symbol(sym(), Price(150_00));

        let published = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&published);
        feed.set_price_callback(Arc::new(move |symbol, bid, ask| {
            assert_eq!(symbol, Symbol::new("AAPL"));
            assert!(bid.is_some());
            assert!(ask.is_some());
            sink.fetch_add(1, Ordering::SeqCst);
        }));

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..10 {
            feed.tick_once(&mut rng);
        }
        assert_eq!(published.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn same_seed_reproduces_same_tape() {
        let run = |seed: u64| {
            let feed = MarketDataFeed::new(Clock::new(), FeedConfig::default());
            feed.add_symbol(sym(), Price(150_00));
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for _ in 0..50 {
                feed.tick_once(&mut rng);
            }
            feed.with_book(sym(), |b| (b.best_bid(), b.best_ask(), b.bids().total_quantity()))
                .unwrap()
        };

        assert_eq!(run(42), run(42));
    }

    #[test]
    fn injection_grows_the_book() {
        let feed = MarketDataFeed::new(Clock::new(), FeedConfig::default());
        feed.add_symbol(sym(), Price(150_00));

        let injected = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&injected);
        feed.set_order_callback(Arc::new(move |order: &Order| {
            assert_eq!(order.trader, TraderId::new(SYNTHETIC_TRADER));
            assert!(order.original_quantity >= 100 && order.original_quantity <= 1000);
            sink.fetch_add(1, Ordering::SeqCst);
        }));

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..200 {
            feed.tick_once(&mut rng);
        }

        // ~30% of 200 ticks inject; well away from 0 and 200.
        let count = injected.load(Ordering::SeqCst);
        assert!(count > 20 && count < 120, "unexpected injection count {count}");
    }

    #[test]
    fn feed_book_never_stays_crossed() {
        let feed = MarketDataFeed::new(Clock::new(), FeedConfig::default());
        feed.add_symbol(sym(), Price(150_00));

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..300 {
            feed.tick_once(&mut rng);
            feed.with_book(sym(), |b| assert!(!b.is_crossed())).unwrap();
        }
    }

    #[test]
    fn start_stop_joins_promptly() {
        let feed = MarketDataFeed::new(
            Clock::new(),
            FeedConfig {
                tick_period: Duration::from_secs(3600), // park essentially forever
                ..FeedConfig::default()
            },
        );
        feed.add_symbol(sym(), Price(150_00));
        feed.start();
        assert!(feed.is_running());
        // Must return promptly despite the long tick period.
        feed.stop();
        assert!(!feed.is_running());
    }

    #[test]
    fn empty_symbol_set_ticks_quietly() {
        let feed = MarketDataFeed::new(Clock::new(), FeedConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        feed.tick_once(&mut rng); // no symbols, no panic
    }
}
