//! TradingEngine: the top-level orchestrator.
//!
//! Owns the order manager (and through it the matching engine), the
//! synthetic feed, the strategy agents, analytics, and the background
//! monitor/publisher, and wires the event flow between them:
//!
//! ```text
//! feed ticks ─→ marks + strategies.on_market_data ─→ orders
//!   orders ─→ risk gate ─→ matching engine ─→ executions
//!   executions ─→ positions/P&L ─→ analytics + strategies.on_execution
//!   monitor ─→ equity curve;  publisher ─→ dashboard snapshots
//! ```
//!
//! Synthetic feed liquidity is forwarded into the engine books (bypassing
//! the risk gate — the feed is the market, not a managed trader), so
//! strategies always have real resting orders to trade against.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{info, warn};

use crate::analytics::{AnalyticsConfig, PerformanceAnalytics, PerformanceMetrics, RiskMetrics};
use crate::config::EngineConfig;
use crate::feed::{FeedConfig, MarketDataFeed, SYNTHETIC_TRADER};
use crate::manager::{OrderManager, PlaceError};
use crate::monitor::{build_snapshot, DashboardSnapshot, PerformanceMonitor, SnapshotCallback, SnapshotPublisher};
use crate::position::Position;
use crate::strategy::{create_strategy, Strategy, StrategyMetrics};
use crate::time::Clock;
use crate::{Order, OrderId, Price, Quantity, Symbol, TraderId};

/// The assembled simulator. See module docs for the wiring.
pub struct TradingEngine {
    config: EngineConfig,
    clock: Clock,
    manager: Arc<OrderManager>,
    feed: Arc<MarketDataFeed>,
    analytics: Arc<Mutex<PerformanceAnalytics>>,
    monitor: PerformanceMonitor,
    publisher: Mutex<Option<SnapshotPublisher>>,
    strategies: Arc<Mutex<Vec<Box<dyn Strategy>>>>,
    snapshot_callback: Mutex<Option<SnapshotCallback>>,
    running: Mutex<bool>,
}

impl TradingEngine {
    /// Build and wire all components. Call [`start`](Self::start) to run.
    pub fn new(config: EngineConfig) -> Result<Self, String> {
        config.validate()?;

        let clock = Clock::new();
        let manager = Arc::new(OrderManager::with_limits(clock.clone(), config.risk.clone()));
        let feed = Arc::new(MarketDataFeed::new(
            clock.clone(),
            FeedConfig {
                tick_period: config.market_data_frequency,
                volatility_multiplier: config.volatility_multiplier,
                seed: config.feed_seed,
            },
        ));
        let analytics = Arc::new(Mutex::new(PerformanceAnalytics::new(AnalyticsConfig::default())));
        let strategies: Arc<Mutex<Vec<Box<dyn Strategy>>>> = Arc::new(Mutex::new(Vec::new()));

        // Feed top-of-book → marks and strategy quotes.
        {
            let manager = Arc::clone(&manager);
            let strategies = Arc::clone(&strategies);
            feed.set_price_callback(Arc::new(move |symbol, bid, ask| {
                if let (Some(b), Some(a)) = (bid, ask) {
                    manager.update_mark(symbol, Price((b.0 + a.0) / 2));
                }
                let mut strategies = strategies.lock().expect("strategies lock");
                for strategy in strategies.iter_mut() {
                    strategy.on_market_data(symbol, bid, ask);
                }
            }));
        }

        // Feed synthetic liquidity → the engine's books.
        {
            let manager = Arc::clone(&manager);
            feed.set_order_callback(Arc::new(move |synthetic: &Order| {
                let order = Order::limit(
                    synthetic.symbol,
                    synthetic.side,
                    synthetic.price,
                    synthetic.original_quantity,
                    synthetic.trader,
                );
                if let Err(error) = manager.engine().submit(order) {
                    warn!("feed liquidity dropped: {error}");
                }
            }));
        }

        // Executions → analytics trade log + strategy callbacks.
        {
            let analytics = Arc::clone(&analytics);
            let strategies = Arc::clone(&strategies);
            manager.set_execution_callback(Arc::new(move |execution| {
                {
                    let mut strategies = strategies.lock().expect("strategies lock");
                    for strategy in strategies.iter_mut() {
                        strategy.on_execution(execution);
                    }
                }
                analytics.lock().expect("analytics lock").record_execution(execution);
            }));
        }

        // Round trips → analytics trade records.
        {
            let analytics = Arc::clone(&analytics);
            manager.set_closed_trade_callback(Arc::new(move |trade| {
                analytics.lock().expect("analytics lock").record_closed_trade(trade);
            }));
        }

        let monitor = PerformanceMonitor::new(
            Arc::clone(&manager),
            Arc::clone(&analytics),
            clock.clone(),
            config.performance_update_frequency,
        );

        let engine = Self {
            config,
            clock,
            manager,
            feed,
            analytics,
            monitor,
            publisher: Mutex::new(None),
            strategies,
            snapshot_callback: Mutex::new(None),
            running: Mutex::new(false),
        };
        engine.register_symbols();
        Ok(engine)
    }

    fn register_symbols(&self) {
        for symbol in &self.config.symbols {
            let price = self.config.initial_prices[symbol];
            self.manager.add_symbol(*symbol);
            self.feed.add_symbol(*symbol, price);
            self.manager.update_mark(*symbol, price);
        }
    }

    /// Receive every published dashboard snapshot. Set before `start`.
    pub fn set_snapshot_callback(&self, callback: SnapshotCallback) {
        *self.snapshot_callback.lock().expect("snapshot callback lock") = Some(callback);
    }

    /// Store top-of-book captures on every monitor poll (memory-heavy;
    /// off by default).
    pub fn enable_detailed_logging(&self, enable: bool) {
        self.analytics.lock().expect("analytics lock").enable_detailed_logging(enable);
    }

    /// Create and register an agent from the factory. Unknown types are
    /// rejected. Agents added while running start immediately.
    pub fn add_strategy(
        &self,
        strategy_type: &str,
        name: &str,
        trader_id: &str,
        params: &HashMap<String, String>,
    ) -> Result<(), String> {
        let trader = TraderId::try_new(trader_id)
            .ok_or_else(|| format!("trader id '{trader_id}' too long"))?;
        let mut strategy = create_strategy(
            strategy_type,
            name,
            trader,
            Arc::clone(&self.manager),
            self.clock.clone(),
            self.config.symbols.clone(),
            params,
        )
        .ok_or_else(|| format!("unknown strategy type '{strategy_type}'"))?;

        strategy.initialize();
        if *self.running.lock().expect("running lock") {
            strategy.start();
        }
        self.analytics
            .lock()
            .expect("analytics lock")
            .register_strategy(trader, name);
        self.strategies.lock().expect("strategies lock").push(strategy);
        info!("added strategy {name} ({strategy_type}) as {trader_id}");
        Ok(())
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies
            .lock()
            .expect("strategies lock")
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    pub fn strategy_metrics(&self, name: &str) -> Option<StrategyMetrics> {
        self.strategies
            .lock()
            .expect("strategies lock")
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.metrics())
    }

    pub fn stop_strategy(&self, name: &str) -> bool {
        let mut strategies = self.strategies.lock().expect("strategies lock");
        match strategies.iter_mut().find(|s| s.name() == name) {
            Some(strategy) => {
                strategy.stop();
                true
            }
            None => false,
        }
    }

    pub fn remove_strategy(&self, name: &str) -> bool {
        let mut strategies = self.strategies.lock().expect("strategies lock");
        match strategies.iter_mut().find(|s| s.name() == name) {
            Some(strategy) => {
                strategy.stop();
            }
            None => return false,
        }
        strategies.retain(|s| s.name() != name);
        true
    }

    // === Lifecycle ===

    /// Start everything: engine worker, agents configured via
    /// `enabled_strategies`, bootstrap liquidity, monitor, publisher, feed.
    pub fn start(&self) -> Result<(), String> {
        {
            let mut running = self.running.lock().expect("running lock");
            if *running {
                return Ok(());
            }
            *running = true;
        }

        self.manager.start();

        // Mirror the feed bootstrap into the engine books so agents see a
        // populated top of book before the first tick.
        let bootstrap_trader = TraderId::new(SYNTHETIC_TRADER);
        for symbol in &self.config.symbols {
            let price = self.config.initial_prices[symbol];
            for (side, px) in [(crate::Side::Buy, price), (crate::Side::Sell, Price(price.0 + 1))] {
                let order = Order::limit(*symbol, side, px, 1000, bootstrap_trader);
                if let Err(error) = self.manager.engine().submit(order) {
                    return Err(format!("bootstrap failed for {symbol}: {error}"));
                }
            }
        }

        // Spin up configured agents (numbered trader ids, factory-built).
        for (index, strategy_type) in self.config.enabled_strategies.clone().iter().enumerate() {
            let name = format!("{strategy_type}_{index}");
            let trader_id = format!("{}_{:02}", strategy_type.to_uppercase(), index);
            let trader_id = if trader_id.len() > 16 { trader_id[..16].to_string() } else { trader_id };
            let params = self
                .config
                .strategy_params
                .get(strategy_type)
                .cloned()
                .unwrap_or_default();
            self.add_strategy(strategy_type, &name, &trader_id, &params)?;
        }

        for strategy in self.strategies.lock().expect("strategies lock").iter_mut() {
            strategy.start();
        }

        self.monitor.start();

        if let Some(interval) = self.config.publish_interval {
            let callback = self
                .snapshot_callback
                .lock()
                .expect("snapshot callback lock")
                .clone()
                .unwrap_or_else(|| {
                    Arc::new(|snapshot: &DashboardSnapshot| {
                        info!(
                            "snapshot: equity ${:.2}, {} executions",
                            snapshot.current_equity, snapshot.total_executions
                        );
                    })
                });
            let publisher = SnapshotPublisher::new(
                Arc::clone(&self.manager),
                Arc::clone(&self.analytics),
                self.clock.clone(),
                interval,
                callback,
            );
            publisher.start();
            *self.publisher.lock().expect("publisher lock") = Some(publisher);
        }

        self.feed.start();
        info!("trading engine started with {} symbols", self.config.symbols.len());
        Ok(())
    }

    /// Stop all workers in dependency order and, when logging is enabled,
    /// export the CSV artefacts.
    pub fn stop(&self) {
        {
            let mut running = self.running.lock().expect("running lock");
            if !*running {
                return;
            }
            *running = false;
        }

        self.feed.stop();
        for strategy in self.strategies.lock().expect("strategies lock").iter_mut() {
            strategy.stop();
        }
        // Let in-flight orders finish matching before tearing down.
        let _ = self.manager.engine().wait_idle(Duration::from_secs(5));
        if let Some(publisher) = self.publisher.lock().expect("publisher lock").take() {
            publisher.stop();
        }
        self.monitor.stop();
        self.manager.stop();

        if self.config.enable_logging {
            let analytics = self.analytics.lock().expect("analytics lock");
            if let Err(error) = crate::export::export_all(&self.config.log_directory, &analytics) {
                warn!("export failed: {error}");
            }
        }
        info!("trading engine stopped");
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock().expect("running lock")
    }

    // === Operator surface ===

    pub fn place_order(&self, order: Order) -> Result<OrderId, PlaceError> {
        self.manager.place(order)
    }

    pub fn cancel_order(&self, order_id: OrderId, trader: TraderId) -> bool {
        self.manager.cancel(order_id, trader)
    }

    pub fn modify_order(
        &self,
        order_id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
        trader: TraderId,
    ) -> bool {
        self.manager.modify(order_id, new_price, new_quantity, trader)
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.config.symbols
    }

    pub fn order_manager(&self) -> &Arc<OrderManager> {
        &self.manager
    }

    pub fn feed(&self) -> &MarketDataFeed {
        &self.feed
    }

    pub fn positions(&self) -> Vec<Position> {
        self.manager.positions()
    }

    pub fn performance_metrics(&self) -> PerformanceMetrics {
        self.analytics.lock().expect("analytics lock").performance_metrics()
    }

    pub fn risk_metrics(&self) -> RiskMetrics {
        self.analytics.lock().expect("analytics lock").risk_metrics()
    }

    /// Current dashboard view, independent of the periodic publisher.
    pub fn dashboard_snapshot(&self) -> DashboardSnapshot {
        build_snapshot(&self.manager, &self.analytics, &self.clock)
    }
}

impl Drop for TradingEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::builder()
            .add_symbol("AAPL", 150.0)
            .add_symbol("MSFT", 300.0)
            .market_data_frequency(Duration::from_millis(10))
            .performance_update_frequency(Duration::from_millis(10))
            .disable_logging()
            .build()
            .unwrap()
    }

    #[test]
    fn builds_and_bootstraps() {
        let engine = TradingEngine::new(config()).unwrap();
        engine.start().unwrap();

        // Engine books mirror the feed bootstrap.
        let manager = engine.order_manager();
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));
        assert_eq!(manager.best_bid(Symbol::new("AAPL")), Some(Price(150_00)));
        assert_eq!(manager.best_ask(Symbol::new("AAPL")), Some(Price(150_01)));
        assert_eq!(manager.best_bid(Symbol::new("MSFT")), Some(Price(300_00)));

        engine.stop();
        assert!(!engine.is_running());
    }

    #[test]
    fn enabled_strategies_start_with_engine() {
        let mut config = config();
        config.enabled_strategies.push("market_orders".into());
        config
            .strategy_params
            .entry("market_orders".into())
            .or_default()
            .insert("order_interval_ms".into(), "1".into());

        let engine = TradingEngine::new(config).unwrap();
        engine.start().unwrap();
        assert_eq!(engine.strategy_names(), vec!["market_orders_0"]);

        // The pacer guarantees flow: wait for at least one execution.
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while engine.order_manager().engine().stats().total_executions() == 0 {
            assert!(std::time::Instant::now() < deadline, "no trade flow");
            std::thread::sleep(Duration::from_millis(10));
        }

        engine.stop();
        let metrics = engine.performance_metrics();
        let _ = metrics; // metrics computable after shutdown
    }

    #[test]
    fn rejects_unknown_strategy_type() {
        let engine = TradingEngine::new(config()).unwrap();
        let result = engine.add_strategy("clairvoyance", "c", "C_01", &HashMap::new());
        assert!(result.is_err());
    }

    #[test]
    fn snapshot_available_without_publisher() {
        let engine = TradingEngine::new(config()).unwrap();
        engine.start().unwrap();
        assert!(engine.order_manager().engine().wait_idle(Duration::from_secs(5)));

        let snapshot = engine.dashboard_snapshot();
        assert!(snapshot.total_orders >= 4); // two bootstrap orders per symbol
        engine.stop();
    }

    #[test]
    fn remove_strategy_stops_it() {
        let engine = TradingEngine::new(config()).unwrap();
        engine
            .add_strategy("momentum", "momo", "MOMO_01", &HashMap::new())
            .unwrap();
        assert_eq!(engine.strategy_names().len(), 1);
        assert!(engine.remove_strategy("momo"));
        assert!(engine.strategy_names().is_empty());
        assert!(!engine.remove_strategy("momo"));
    }
}
