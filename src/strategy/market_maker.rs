//! Market-making agent: quote both sides around the mid.
//!
//! On every quote update the agent re-prices: effective spread is the wider
//! of the observed spread and the configured minimum, the quote width is
//! that spread times the multiplier, and quotes straddle the mid. Old
//! quotes are cancelled before new ones go out, so the agent holds at most
//! one resting bid and one resting ask per symbol.

use std::collections::HashMap;

use log::debug;
use rustc_hash::FxHashMap;

use super::{param, Strategy, StrategyCore, StrategyMetrics};
use crate::{Execution, OrderId, Price, Quantity, Side, Symbol, TraderId};

#[derive(Clone, Debug)]
pub struct MarketMakerConfig {
    /// Multiplier applied to the effective spread.
    pub spread_multiplier: f64,
    /// Quantity quoted on each side.
    pub base_quantity: Quantity,
    /// Position cap: no new bids above +cap, no new asks below −cap.
    pub max_position: i64,
    /// Floor for the effective spread, in cents.
    pub min_spread: i64,
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            spread_multiplier: 1.5,
            base_quantity: 1000,
            max_position: 10_000,
            min_spread: 1,
        }
    }
}

impl MarketMakerConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            spread_multiplier: param(params, "spread_multiplier", defaults.spread_multiplier),
            base_quantity: param(params, "base_quantity", defaults.base_quantity),
            max_position: param(params, "max_position", defaults.max_position),
            min_spread: params
                .get("min_spread")
                .and_then(|raw| raw.parse::<f64>().ok())
                .map(|dollars| Price::from_dollars(dollars).0)
                .unwrap_or(defaults.min_spread),
        }
    }
}

pub struct MarketMakerStrategy {
    core: StrategyCore,
    config: MarketMakerConfig,
    active_bids: FxHashMap<Symbol, OrderId>,
    active_asks: FxHashMap<Symbol, OrderId>,
}

impl MarketMakerStrategy {
    pub fn new(core: StrategyCore, config: MarketMakerConfig) -> Self {
        Self {
            core,
            config,
            active_bids: FxHashMap::default(),
            active_asks: FxHashMap::default(),
        }
    }

    fn update_quotes(&mut self, symbol: Symbol) {
        let Some(mid) = self.core.mid_price(symbol) else {
            return;
        };
        if mid <= 0.0 {
            return;
        }

        let spread = (self.core.spread(symbol).abs().max(self.config.min_spread)) as f64;
        let half = spread * self.config.spread_multiplier / 2.0;
        let mut bid_price = Price((mid - half).round() as i64);
        let mut ask_price = Price((mid + half).round() as i64);
        if bid_price >= ask_price {
            // Rounded on top of each other; force a one-tick market.
            bid_price = Price((mid - 1.0).floor() as i64);
            ask_price = Price((mid + 1.0).ceil() as i64);
        }
        if !bid_price.is_valid_limit() {
            return;
        }

        self.cancel_quotes(symbol);

        let position = self.core.manager().position(symbol).quantity;
        if position <= self.config.max_position {
            if let Some(id) =
                self.core
                    .place_limit_order(symbol, Side::Buy, bid_price, self.config.base_quantity)
            {
                self.active_bids.insert(symbol, id);
            }
        }
        if position >= -self.config.max_position {
            if let Some(id) =
                self.core
                    .place_limit_order(symbol, Side::Sell, ask_price, self.config.base_quantity)
            {
                self.active_asks.insert(symbol, id);
            }
        }
    }

    fn cancel_quotes(&mut self, symbol: Symbol) {
        if let Some(id) = self.active_bids.remove(&symbol) {
            self.core.cancel_order(id);
        }
        if let Some(id) = self.active_asks.remove(&symbol) {
            self.core.cancel_order(id);
        }
    }
}

impl Strategy for MarketMakerStrategy {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn trader_id(&self) -> TraderId {
        self.core.trader()
    }

    fn start(&mut self) {
        self.core.set_running(true);
    }

    fn stop(&mut self) {
        self.core.set_running(false);
        let symbols: Vec<Symbol> = self.core.symbols().to_vec();
        for symbol in symbols {
            self.cancel_quotes(symbol);
        }
    }

    fn is_running(&self) -> bool {
        self.core.is_running()
    }

    fn on_market_data(&mut self, symbol: Symbol, _bid: Option<Price>, _ask: Option<Price>) {
        if !self.core.is_running() || !self.core.subscribed(symbol) {
            return;
        }
        self.update_quotes(symbol);
    }

    fn on_execution(&mut self, execution: &Execution) {
        if !execution.involves(self.core.trader()) {
            return;
        }
        self.core.record_execution(execution);

        // A filled quote is no longer ours to cancel.
        let symbol = execution.symbol;
        for table in [&mut self.active_bids, &mut self.active_asks] {
            if let Some(id) = table.get(&symbol).copied() {
                if id == execution.maker_order || id == execution.taker_order {
                    debug!("quote {id} filled");
                    table.remove(&symbol);
                }
            }
        }
    }

    fn metrics(&self) -> StrategyMetrics {
        self.core.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::OrderManager;
    use crate::risk::RiskLimits;
    use crate::time::Clock;
    use crate::{Order, OrderBook};
    use std::sync::Arc;
    use std::time::Duration;

    fn sym() -> Symbol {
        Symbol::new("AAPL")
    }

    fn setup() -> (Arc<OrderManager>, MarketMakerStrategy) {
        let clock = Clock::new();
        let manager = Arc::new(OrderManager::with_limits(clock.clone(), RiskLimits::default()));
        manager.add_symbol(sym());
        manager.start();

        let core = StrategyCore::new(
            "mm",
            TraderId::new("MM_TRADER_01"),
            Arc::clone(&manager),
            clock,
            vec![sym()],
        );
        let strategy = MarketMakerStrategy::new(core, MarketMakerConfig::default());
        (manager, strategy)
    }

    fn seed_book(manager: &OrderManager) {
        let seeder = TraderId::new("SEED");
        manager.place(Order::limit(sym(), Side::Buy, Price(149_00), 100, seeder)).unwrap();
        manager.place(Order::limit(sym(), Side::Sell, Price(151_00), 100, seeder)).unwrap();
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));
    }

    #[test]
    fn quotes_both_sides_of_mid() {
        let (manager, mut strategy) = setup();
        seed_book(&manager);

        strategy.start();
        strategy.on_market_data(sym(), Some(Price(149_00)), Some(Price(151_00)));
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));

        // Mid 150.00, spread 200, multiplier 1.5 → quotes at 148.50 / 151.50.
        // The new bid at 148.50 is behind the seed at 149.00; the seed book
        // is still the top, but our quotes rest.
        assert_eq!(strategy.active_bids.len(), 1);
        assert_eq!(strategy.active_asks.len(), 1);
        let bid_id = strategy.active_bids[&sym()];
        manager.engine().with_book(sym(), |book: &OrderBook| {
            let order = book.order(bid_id).unwrap();
            assert_eq!(order.price, Price(148_50));
            assert_eq!(order.original_quantity, 1000);
        }).unwrap();
        manager.stop();
    }

    #[test]
    fn requote_cancels_previous_quotes() {
        let (manager, mut strategy) = setup();
        seed_book(&manager);

        strategy.start();
        strategy.on_market_data(sym(), Some(Price(149_00)), Some(Price(151_00)));
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));
        let first_bid = strategy.active_bids[&sym()];

        strategy.on_market_data(sym(), Some(Price(149_00)), Some(Price(151_00)));
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));
        let second_bid = strategy.active_bids[&sym()];

        assert_ne!(first_bid, second_bid);
        // At most one resting bid and one resting ask: the first quote pair
        // is gone from the book.
        manager.engine().with_book(sym(), |book: &OrderBook| {
            assert!(!book.order(first_bid).unwrap().is_active());
        }).unwrap();
        manager.stop();
    }

    #[test]
    fn respects_position_cap() {
        let (manager, strategy) = setup();
        let mut strategy = {
            let mut s = strategy;
            s.config.max_position = 50;
            s
        };
        seed_book(&manager);

        // Manufacture a long position beyond the cap: aggressor buy of 100.
        let seeder = TraderId::new("SEED");
        manager.place(Order::limit(sym(), Side::Sell, Price(150_00), 100, seeder)).unwrap();
        manager
            .place(Order::limit(sym(), Side::Buy, Price(150_00), 100, TraderId::new("X")))
            .unwrap();
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));
        assert_eq!(manager.position(sym()).quantity, 100);

        strategy.start();
        strategy.on_market_data(sym(), None, None);
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));

        // Long beyond +cap: no new bid, but the ask still quotes.
        assert!(strategy.active_bids.is_empty());
        assert_eq!(strategy.active_asks.len(), 1);
        manager.stop();
    }

    #[test]
    fn stop_cancels_open_quotes() {
        let (manager, mut strategy) = setup();
        seed_book(&manager);

        strategy.start();
        strategy.on_market_data(sym(), Some(Price(149_00)), Some(Price(151_00)));
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));
        let bid_id = strategy.active_bids[&sym()];

        strategy.stop();
        assert!(strategy.active_bids.is_empty());
        assert!(strategy.active_asks.is_empty());
        manager.engine().with_book(sym(), |book: &OrderBook| {
            assert!(!book.order(bid_id).unwrap().is_active());
        }).unwrap();
        manager.stop();
    }

    #[test]
    fn ignores_unsubscribed_symbols() {
        let (manager, mut strategy) = setup();
        manager.add_symbol(Symbol::new("MSFT"));
        strategy.start();
        strategy.on_market_data(Symbol::new("MSFT"), Some(Price(300_00)), Some(Price(300_10)));
        assert!(strategy.active_bids.is_empty());
        manager.stop();
    }
}
