//! Momentum agent: moving-average crossover on observed mids.
//!
//! A buy signal fires when the short moving average moves above the long
//! one by more than the relative threshold; a sell signal is symmetric.
//! Signals are edge-triggered — the agent acts only when the signal
//! changes — and a signal already reflected in the position is suppressed.

use std::collections::{HashMap, VecDeque};

use log::debug;
use rustc_hash::FxHashMap;

use super::{param, Strategy, StrategyCore, StrategyMetrics};
use crate::{Execution, Price, Quantity, Side, Symbol, TraderId};

#[derive(Clone, Debug)]
pub struct MomentumConfig {
    pub short_window: usize,
    pub long_window: usize,
    /// Relative divergence of the short MA from the long MA that counts as
    /// a signal (e.g. 0.02 = 2%).
    pub momentum_threshold: f64,
    pub position_size: Quantity,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            short_window: 5,
            long_window: 20,
            momentum_threshold: 0.02,
            position_size: 100,
        }
    }
}

impl MomentumConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let mut config = Self {
            short_window: param(params, "short_window", defaults.short_window),
            long_window: param(params, "long_window", defaults.long_window),
            momentum_threshold: param(params, "momentum_threshold", defaults.momentum_threshold),
            position_size: param(params, "position_size", defaults.position_size),
        };
        if config.short_window == 0 || config.short_window >= config.long_window {
            // Degenerate windows collapse to the defaults.
            config.short_window = defaults.short_window;
            config.long_window = defaults.long_window.max(config.short_window + 1);
        }
        config
    }
}

struct SymbolState {
    prices: VecDeque<f64>,
    signal: Option<Side>,
}

pub struct MomentumStrategy {
    core: StrategyCore,
    config: MomentumConfig,
    state: FxHashMap<Symbol, SymbolState>,
}

impl MomentumStrategy {
    pub fn new(core: StrategyCore, config: MomentumConfig) -> Self {
        Self {
            core,
            config,
            state: FxHashMap::default(),
        }
    }

    fn window_mean(prices: &VecDeque<f64>, window: usize) -> f64 {
        let take = window.min(prices.len());
        prices.iter().rev().take(take).sum::<f64>() / take as f64
    }

    /// The current signal for a fully warmed-up window, if any.
    fn evaluate_signal(&self, prices: &VecDeque<f64>) -> Option<Side> {
        if prices.len() < self.config.long_window {
            return None;
        }
        let short_ma = Self::window_mean(prices, self.config.short_window);
        let long_ma = Self::window_mean(prices, self.config.long_window);
        if long_ma <= 0.0 {
            return None;
        }
        let divergence = (short_ma - long_ma) / long_ma;
        if divergence > self.config.momentum_threshold {
            Some(Side::Buy)
        } else if divergence < -self.config.momentum_threshold {
            Some(Side::Sell)
        } else {
            None
        }
    }

    fn act_on(&mut self, symbol: Symbol, signal: Side) {
        // Skip when the position already reflects the signal.
        let position = self.core.manager().position(symbol).quantity;
        let already_positioned = match signal {
            Side::Buy => position > 0,
            Side::Sell => position < 0,
        };
        if already_positioned {
            return;
        }

        let delta = match signal {
            Side::Buy => self.config.position_size as i64,
            Side::Sell => -(self.config.position_size as i64),
        };
        if !self.core.check_position_limit(symbol, delta) {
            return;
        }

        debug!("momentum signal {signal} on {symbol}");
        self.core.place_market_order(symbol, signal, self.config.position_size);
    }
}

impl Strategy for MomentumStrategy {
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
        if !self.core.is_running() || !self.core.subscribed(symbol) {
            return;
        }
        // Mid from the published quote, not a book re-read, so the window
        // tracks exactly what the feed showed us.
        let mid = match (bid, ask) {
            (Some(b), Some(a)) => (b.0 + a.0) as f64 / 2.0,
            _ => return,
        };

        let long_window = self.config.long_window;
        let state = self.state.entry(symbol).or_insert_with(|| SymbolState {
            prices: VecDeque::with_capacity(long_window + 1),
            signal: None,
        });
        state.prices.push_back(mid);
        if state.prices.len() > long_window {
            state.prices.pop_front();
        }

        let new_signal = self.evaluate_signal(&self.state[&symbol].prices);
        let previous = self.state.get_mut(&symbol).expect("state just inserted");
        if new_signal == previous.signal {
            return;
        }
        previous.signal = new_signal;

        if let Some(signal) = new_signal {
            self.act_on(symbol, signal);
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
