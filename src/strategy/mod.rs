//! Strategy agents: the common contract and shared plumbing.
//!
//! An agent is a [`Strategy`] trait object wired to the engine through two
//! event inputs — `on_market_data` and `on_execution` — and one output, order
//! submissions through the shared [`OrderManager`]. Agents own no threads:
//! callbacks run inline on whichever thread delivers the event (the feed
//! ticker or the matching worker), so implementations must not block.

mod market_maker;
mod market_orders;
mod momentum;
mod pairs;

pub use market_maker::{MarketMakerConfig, MarketMakerStrategy};
pub use market_orders::{MarketOrderConfig, MarketOrderStrategy};
pub use momentum::{MomentumConfig, MomentumStrategy};
pub use pairs::{PairsConfig, PairsStrategy};

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use log::debug;

use crate::manager::OrderManager;
use crate::stats;
use crate::time::Clock;
use crate::{Execution, Order, OrderId, Price, Quantity, Side, Symbol, TraderId};

/// Position-size probe used by agents before adding exposure.
const POSITION_PROBE_LIMIT: i64 = 10_000;

/// The agent contract.
pub trait Strategy: Send {
    fn name(&self) -> &str;
    fn trader_id(&self) -> TraderId;

    /// One-time setup before the first event.
    fn initialize(&mut self) {}
    fn start(&mut self);
    fn stop(&mut self);
    fn is_running(&self) -> bool;

    /// A top-of-book update for `symbol`. Serialized per symbol.
    fn on_market_data(&mut self, symbol: Symbol, bid: Option<Price>, ask: Option<Price>);

    /// Every engine execution; implementations filter for their own fills.
    fn on_execution(&mut self, execution: &Execution);

    fn metrics(&self) -> StrategyMetrics;
}

/// Self-reported agent performance.
#[derive(Clone, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct StrategyMetrics {
    /// Net traded cashflow in dollars (sells positive, buys negative).
    pub total_pnl: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: u64,
    pub winning_trades: u64,
}

/// State and helpers shared by all agents: identity, the order-manager
/// handle, subscription list, and self-metrics.
pub struct StrategyCore {
    name: String,
    trader: TraderId,
    manager: Arc<OrderManager>,
    clock: Clock,
    symbols: Vec<Symbol>,
    running: bool,
    metrics: StrategyMetrics,
    pnl_cents: i64,
    peak_pnl_cents: i64,
    returns: Vec<f64>,
}

impl StrategyCore {
    pub fn new(
        name: impl Into<String>,
        trader: TraderId,
        manager: Arc<OrderManager>,
        clock: Clock,
        symbols: Vec<Symbol>,
    ) -> Self {
        Self {
            name: name.into(),
            trader,
            manager,
            clock,
            symbols,
            running: false,
            metrics: StrategyMetrics::default(),
            pnl_cents: 0,
            peak_pnl_cents: 0,
            returns: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trader(&self) -> TraderId {
        self.trader
    }

    pub fn manager(&self) -> &OrderManager {
        &self.manager
    }

    pub fn now(&self) -> crate::Timestamp {
        self.clock.now()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn subscribed(&self, symbol: Symbol) -> bool {
        self.symbols.contains(&symbol)
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    // === Order helpers ===

    pub fn place_market_order(&self, symbol: Symbol, side: Side, quantity: Quantity) -> Option<OrderId> {
        self.manager
            .place(Order::market(symbol, side, quantity, self.trader))
            .ok()
    }

    pub fn place_limit_order(
        &self,
        symbol: Symbol,
        side: Side,
        price: Price,
        quantity: Quantity,
    ) -> Option<OrderId> {
        self.manager
            .place(Order::limit(symbol, side, price, quantity, self.trader))
            .ok()
    }

    pub fn cancel_order(&self, order_id: OrderId) -> bool {
        self.manager.cancel(order_id, self.trader)
    }

    // === Market data helpers ===

    pub fn best_bid(&self, symbol: Symbol) -> Option<Price> {
        self.manager.best_bid(symbol)
    }

    pub fn best_ask(&self, symbol: Symbol) -> Option<Price> {
        self.manager.best_ask(symbol)
    }

    /// Mid in cents (falls back to the last trade price).
    pub fn mid_price(&self, symbol: Symbol) -> Option<f64> {
        self.manager.mid_price(symbol)
    }

    /// Spread in cents.
    pub fn spread(&self, symbol: Symbol) -> i64 {
        self.manager.spread(symbol)
    }

    /// True if adding `additional` signed quantity keeps the symbol's
    /// position inside the probe limit.
    pub fn check_position_limit(&self, symbol: Symbol, additional: i64) -> bool {
        let projected = self.manager.position(symbol).quantity + additional;
        projected.abs() <= POSITION_PROBE_LIMIT
    }

    // === Metrics ===

    /// Fold one of our own fills into the self-metrics.
    pub fn record_execution(&mut self, execution: &Execution) {
        let Some(side) = execution.side_for(self.trader) else {
            return;
        };

        // Signed cashflow: sells bring cash in, buys pay it out.
        let cashflow = match side {
            Side::Buy => -execution.notional(),
            Side::Sell => execution.notional(),
        };
        self.pnl_cents += cashflow;
        self.metrics.total_trades += 1;
        if cashflow > 0 {
            self.metrics.winning_trades += 1;
        }
        self.metrics.win_rate =
            self.metrics.winning_trades as f64 / self.metrics.total_trades as f64;
        self.metrics.total_pnl = self.pnl_cents as f64 / 100.0;

        if execution.notional() != 0 {
            self.returns.push(cashflow as f64 / execution.notional() as f64);
        }
        let sd = stats::stddev(&self.returns);
        self.metrics.sharpe_ratio = if sd > 0.0 {
            stats::mean(&self.returns) / sd
        } else {
            0.0
        };

        if self.pnl_cents > self.peak_pnl_cents {
            self.peak_pnl_cents = self.pnl_cents;
        }
        if self.peak_pnl_cents > 0 {
            let drawdown =
                (self.peak_pnl_cents - self.pnl_cents) as f64 / self.peak_pnl_cents as f64;
            if drawdown > self.metrics.max_drawdown {
                self.metrics.max_drawdown = drawdown;
            }
        }
    }

    pub fn metrics(&self) -> StrategyMetrics {
        self.metrics.clone()
    }
}

/// Fetch and parse a strategy parameter, falling back to a default.
pub(crate) fn param<T: FromStr + Copy>(params: &HashMap<String, String>, key: &str, default: T) -> T {
    params
        .get(key)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

/// Build an agent by type name. Unknown names return `None`.
///
/// Recognised types: `market_making`, `momentum`, `stat_arb`,
/// `market_orders`.
pub fn create_strategy(
    strategy_type: &str,
    name: &str,
    trader: TraderId,
    manager: Arc<OrderManager>,
    clock: Clock,
    symbols: Vec<Symbol>,
    params: &HashMap<String, String>,
) -> Option<Box<dyn Strategy>> {
    let core = StrategyCore::new(name, trader, manager, clock, symbols.clone());
    let strategy: Box<dyn Strategy> = match strategy_type {
        "market_making" => Box::new(MarketMakerStrategy::new(core, MarketMakerConfig::from_params(params))),
        "momentum" => Box::new(MomentumStrategy::new(core, MomentumConfig::from_params(params))),
        "stat_arb" => {
            let config = PairsConfig::from_params(params, &symbols)?;
            Box::new(PairsStrategy::new(core, config))
        }
        "market_orders" => Box::new(MarketOrderStrategy::new(core, MarketOrderConfig::from_params(params))),
        other => {
            debug!("unknown strategy type '{other}'");
            return None;
        }
    };
    Some(strategy)
}
