//! Periodic market-order agent.
//!
//! Submits a market order of fixed size on a timer, alternating buy and
//! sell, up to a configured maximum. Its purpose is to guarantee trade flow
//! through the engine (and through tests) regardless of what the other
//! agents are doing.

use std::collections::HashMap;
use std::time::Duration;

use log::debug;

use super::{param, Strategy, StrategyCore, StrategyMetrics};
use crate::{Execution, Price, Quantity, Symbol, Side, Timestamp, TraderId};

#[derive(Clone, Debug)]
pub struct MarketOrderConfig {
    /// Minimum time between submissions.
    pub order_interval: Duration,
    pub order_size: Quantity,
    /// Total number of orders to submit before going quiet.
    pub max_orders: u32,
}

impl Default for MarketOrderConfig {
    fn default() -> Self {
        Self {
            order_interval: Duration::from_millis(2000),
            order_size: 500,
            max_orders: 10,
        }
    }
}

impl MarketOrderConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            order_interval: Duration::from_millis(param(
                params,
                "order_interval_ms",
                defaults.order_interval.as_millis() as u64,
            )),
            order_size: param(params, "order_size", defaults.order_size),
            max_orders: param(params, "max_orders", defaults.max_orders),
        }
    }
}

pub struct MarketOrderStrategy {
    core: StrategyCore,
    config: MarketOrderConfig,
    last_submit: Option<Timestamp>,
    submitted: u32,
}

impl MarketOrderStrategy {
    pub fn new(core: StrategyCore, config: MarketOrderConfig) -> Self {
        Self {
            core,
            config,
            last_submit: None,
            submitted: 0,
        }
    }

    fn due(&self, now: Timestamp) -> bool {
        match self.last_submit {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.config.order_interval.as_nanos() as u64,
        }
    }
}

impl Strategy for MarketOrderStrategy {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn trader_id(&self) -> TraderId {
        self.core.trader()
    }

    fn start(&mut self) {
        self.core.set_running(true);
        self.last_submit = None;
    }

    fn stop(&mut self) {
        self.core.set_running(false);
    }

    fn is_running(&self) -> bool {
        self.core.is_running()
    }

    fn on_market_data(&mut self, symbol: Symbol, _bid: Option<Price>, _ask: Option<Price>) {
        if !self.core.is_running() || !self.core.subscribed(symbol) {
            return;
        }
        if self.submitted >= self.config.max_orders {
            return;
        }
        let now = self.core.now();
        if !self.due(now) {
            return;
        }

        // Alternate buy/sell so net flow stays roughly balanced.
        let side = if self.submitted % 2 == 0 { Side::Buy } else { Side::Sell };
        if self.core.place_market_order(symbol, side, self.config.order_size).is_some() {
            debug!(
                "market-order pacer: {} {} {} ({}/{})",
                side,
                self.config.order_size,
                symbol,
                self.submitted + 1,
                self.config.max_orders
            );
            self.submitted += 1;
            self.last_submit = Some(now);
        }
    }

    fn on_execution(&mut self, execution: &Execution) {
        if execution.involves(self.core.trader()) {
            self.core.record_execution(execution);
        }
    }

    fn metrics(&self) -> StrategyMetrics {
        self.core.metrics()
    }
}
