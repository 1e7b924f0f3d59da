//! Statistical-arbitrage pairs agent.
//!
//! Watches the spread `mid(A) − mid(B)` over a rolling window. When the
//! spread's z-score stretches past the entry threshold the agent opens one
//! pair position (short the rich leg, long the cheap leg) and holds it
//! until the spread reverts: the z-score crosses the mean or falls inside
//! the exit band. At most one pair position is open at any time.

use std::collections::{HashMap, VecDeque};

use log::debug;

use super::{param, Strategy, StrategyCore, StrategyMetrics};
use crate::stats;
use crate::{Execution, Price, Quantity, Side, Symbol, TraderId};

#[derive(Clone, Debug)]
pub struct PairsConfig {
    pub symbol_a: Symbol,
    pub symbol_b: Symbol,
    /// |z| that opens a pair.
    pub z_score_threshold: f64,
    /// Rolling window length for the spread statistics.
    pub lookback_period: usize,
    /// Shares per leg.
    pub position_size: Quantity,
    /// |z| at or below which an open pair closes (0 = close on mean cross).
    pub exit_band: f64,
}

impl PairsConfig {
    /// Build from parameter strings; the pair legs default to the agent's
    /// first two subscribed symbols. `None` without two distinct legs.
    pub fn from_params(params: &HashMap<String, String>, symbols: &[Symbol]) -> Option<Self> {
        let symbol_a = params
            .get("pair_symbol_a")
            .and_then(|s| Symbol::try_new(s))
            .or_else(|| symbols.first().copied())?;
        let symbol_b = params
            .get("pair_symbol_b")
            .and_then(|s| Symbol::try_new(s))
            .or_else(|| symbols.get(1).copied())?;
        if symbol_a == symbol_b {
            return None;
        }
        Some(Self {
            symbol_a,
            symbol_b,
            z_score_threshold: param(params, "z_score_threshold", 2.0),
            lookback_period: param(params, "lookback_period", 20),
            position_size: param(params, "position_size", 100),
            exit_band: param(params, "exit_band", 0.0),
        })
    }
}

/// The open pair: which leg is short.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PairPosition {
    /// z was high: short A, long B.
    ShortA,
    /// z was low: long A, short B.
    LongA,
}

pub struct PairsStrategy {
    core: StrategyCore,
    config: PairsConfig,
    mid_a: Option<f64>,
    mid_b: Option<f64>,
    spread_history: VecDeque<f64>,
    open: Option<PairPosition>,
}

impl PairsStrategy {
    pub fn new(core: StrategyCore, config: PairsConfig) -> Self {
        let lookback = config.lookback_period;
        Self {
            core,
            config,
            mid_a: None,
            mid_b: None,
            spread_history: VecDeque::with_capacity(lookback + 1),
            open: None,
        }
    }

    fn z_score(&self) -> Option<f64> {
        if self.spread_history.len() < self.config.lookback_period {
            return None;
        }
        let window: Vec<f64> = self.spread_history.iter().copied().collect();
        let mean = stats::mean(&window);
        let sd = stats::stddev(&window);
        if sd <= 0.0 {
            return None;
        }
        Some((window[window.len() - 1] - mean) / sd)
    }

    fn open_pair(&mut self, z: f64) {
        let size = self.config.position_size;
        let (a_side, b_side, position) = if z > 0.0 {
            (Side::Sell, Side::Buy, PairPosition::ShortA)
        } else {
            (Side::Buy, Side::Sell, PairPosition::LongA)
        };
        debug!("pairs: opening {:?} at z={z:.2}", position);
        self.core.place_market_order(self.config.symbol_a, a_side, size);
        self.core.place_market_order(self.config.symbol_b, b_side, size);
        self.open = Some(position);
    }

    fn close_pair(&mut self, position: PairPosition, z: f64) {
        let size = self.config.position_size;
        let (a_side, b_side) = match position {
            PairPosition::ShortA => (Side::Buy, Side::Sell),
            PairPosition::LongA => (Side::Sell, Side::Buy),
        };
        debug!("pairs: closing {:?} at z={z:.2}", position);
        self.core.place_market_order(self.config.symbol_a, a_side, size);
        self.core.place_market_order(self.config.symbol_b, b_side, size);
        self.open = None;
    }

    /// True once the spread has reverted for the open position.
    fn should_close(&self, position: PairPosition, z: f64) -> bool {
        if z.abs() <= self.config.exit_band {
            return true;
        }
        match position {
            PairPosition::ShortA => z <= 0.0,
            PairPosition::LongA => z >= 0.0,
        }
    }
}

impl Strategy for PairsStrategy {
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
    }

    fn is_running(&self) -> bool {
        self.core.is_running()
    }

    fn on_market_data(&mut self, symbol: Symbol, bid: Option<Price>, ask: Option<Price>) {
        if !self.core.is_running() {
            return;
        }
        let mid = match (bid, ask) {
            (Some(b), Some(a)) => (b.0 + a.0) as f64 / 2.0,
            _ => return,
        };
        if symbol == self.config.symbol_a {
            self.mid_a = Some(mid);
        } else if symbol == self.config.symbol_b {
            self.mid_b = Some(mid);
        } else {
            return;
        }
        let (Some(a), Some(b)) = (self.mid_a, self.mid_b) else {
            return;
        };

        self.spread_history.push_back(a - b);
        if self.spread_history.len() > self.config.lookback_period {
            self.spread_history.pop_front();
        }

        let Some(z) = self.z_score() else { return };
        match self.open {
            None if z.abs() > self.config.z_score_threshold => self.open_pair(z),
            Some(position) if self.should_close(position, z) => self.close_pair(position, z),
            _ => {}
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::OrderManager;
    use crate::time::Clock;
    use crate::{Order, TraderId};
    use std::sync::Arc;
    use std::time::Duration;

    fn aapl() -> Symbol {
        Symbol::new("AAPL")
    }

    fn msft() -> Symbol {
        Symbol::new("MSFT")
    }

    fn config() -> PairsConfig {
        PairsConfig {
            symbol_a: aapl(),
            symbol_b: msft(),
            z_score_threshold: 1.5,
            lookback_period: 6,
            position_size: 10,
            exit_band: 0.0,
        }
    }

    fn setup() -> (Arc<OrderManager>, PairsStrategy) {
        let clock = Clock::new();
        let manager = Arc::new(OrderManager::new(clock.clone()));
        manager.add_symbol(aapl());
        manager.add_symbol(msft());
        manager.start();

        // Deep two-sided liquidity on both legs.
        let lp = TraderId::new("LP");
        for symbol in [aapl(), msft()] {
            manager.place(Order::limit(symbol, Side::Buy, Price(99_00), 5_000, lp)).unwrap();
            manager.place(Order::limit(symbol, Side::Sell, Price(101_00), 5_000, lp)).unwrap();
        }
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));

        let core = StrategyCore::new(
            "pairs",
            TraderId::new("STAT_ARB_01"),
            Arc::clone(&manager),
            clock,
            vec![aapl(), msft()],
        );
        let mut strategy = PairsStrategy::new(core, config());
        strategy.start();
        (manager, strategy)
    }

    /// Push one spread observation through both legs.
    fn observe(strategy: &mut PairsStrategy, spread_cents: i64) {
        strategy.on_market_data(msft(), Some(Price(100_00 - 1)), Some(Price(100_00 + 1)));
        let a = 100_00 + spread_cents;
        strategy.on_market_data(aapl(), Some(Price(a - 1)), Some(Price(a + 1)));
    }

    #[test]
    fn config_requires_two_distinct_legs() {
        let params = HashMap::new();
        assert!(PairsConfig::from_params(&params, &[aapl()]).is_none());
        assert!(PairsConfig::from_params(&params, &[aapl(), aapl()]).is_none());
        let config = PairsConfig::from_params(&params, &[aapl(), msft()]).unwrap();
        assert_eq!(config.symbol_a, aapl());
        assert_eq!(config.symbol_b, msft());
    }

    #[test]
    fn no_entry_while_window_warm() {
        let (manager, mut strategy) = setup();
        for _ in 0..4 {
            observe(&mut strategy, 100);
        }
        assert!(strategy.open.is_none());
        manager.stop();
    }

    #[test]
    fn wide_spread_opens_short_a_long_b() {
        let (manager, mut strategy) = setup();

        // Stable spread, then a blowout.
        for _ in 0..5 {
            observe(&mut strategy, 100);
        }
        observe(&mut strategy, 400);
        assert_eq!(strategy.open, Some(PairPosition::ShortA));
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));

        // Short A (aggressor sell), long B (aggressor buy).
        assert_eq!(manager.position(aapl()).quantity, -10);
        assert_eq!(manager.position(msft()).quantity, 10);
        manager.stop();
    }

    #[test]
    fn reversion_closes_the_pair() {
        let (manager, mut strategy) = setup();
        for _ in 0..5 {
            observe(&mut strategy, 100);
        }
        observe(&mut strategy, 400);
        assert_eq!(strategy.open, Some(PairPosition::ShortA));

        // Spread collapses back through the mean.
        for _ in 0..6 {
            observe(&mut strategy, 50);
        }
        assert!(strategy.open.is_none());
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));
        assert_eq!(manager.position(aapl()).quantity, 0);
        assert_eq!(manager.position(msft()).quantity, 0);
        manager.stop();
    }

    #[test]
    fn only_one_pair_at_a_time() {
        let (manager, mut strategy) = setup();
        for _ in 0..5 {
            observe(&mut strategy, 100);
        }
        observe(&mut strategy, 400);
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));
        let orders_after_open = manager.engine().stats().total_orders();

        // Still stretched: no re-entry while a pair is open.
        observe(&mut strategy, 500);
        observe(&mut strategy, 450);
        assert!(manager.engine().wait_idle(Duration::from_secs(5)));
        assert_eq!(manager.engine().stats().total_orders(), orders_after_open);
        manager.stop();
    }
}
