//! Engine configuration and the fluent builder.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::risk::RiskLimits;
use crate::{Price, Symbol};

/// Full configuration for a [`crate::runtime::TradingEngine`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Active symbols, in registration order.
    pub symbols: Vec<Symbol>,
    /// Seed price per symbol for the market-data bootstrap.
    pub initial_prices: HashMap<Symbol, Price>,
    /// Scales the feed's price-increment standard deviation.
    pub volatility_multiplier: f64,
    /// Feed tick period.
    pub market_data_frequency: Duration,
    /// Pre-trade risk caps.
    pub risk: RiskLimits,
    /// Agent type names to spin up at start (see the strategy factory).
    pub enabled_strategies: Vec<String>,
    /// Per-agent parameter strings: `strategy_params[agent][key]`.
    pub strategy_params: HashMap<String, HashMap<String, String>>,
    /// Write CSV artefacts on shutdown.
    pub enable_logging: bool,
    pub log_directory: PathBuf,
    /// Performance-monitor poll period.
    pub performance_update_frequency: Duration,
    /// Snapshot publisher period; `None` disables publishing.
    pub publish_interval: Option<Duration>,
    /// Feed RNG seed for reproducible tapes.
    pub feed_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            initial_prices: HashMap::new(),
            volatility_multiplier: 1.0,
            market_data_frequency: Duration::from_millis(100),
            risk: RiskLimits::default(),
            enabled_strategies: Vec::new(),
            strategy_params: HashMap::new(),
            enable_logging: true,
            log_directory: PathBuf::from("./logs"),
            performance_update_frequency: Duration::from_millis(1000),
            publish_interval: None,
            feed_seed: 0x5EED,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Sanity-check the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.symbols.is_empty() {
            return Err("no symbols configured".into());
        }
        for symbol in &self.symbols {
            match self.initial_prices.get(symbol) {
                None => return Err(format!("no initial price for {symbol}")),
                Some(price) if !price.is_valid_limit() => {
                    return Err(format!("initial price for {symbol} must be positive"))
                }
                Some(_) => {}
            }
        }
        if !self.volatility_multiplier.is_finite() || self.volatility_multiplier <= 0.0 {
            return Err(format!(
                "volatility_multiplier must be positive, got {}",
                self.volatility_multiplier
            ));
        }
        if self.market_data_frequency.is_zero() {
            return Err("market_data_frequency must be non-zero".into());
        }
        self.risk.validate()
    }
}

/// Fluent construction of an [`EngineConfig`].
#[derive(Clone, Debug, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn add_symbol(mut self, symbol: &str, initial_price: f64) -> Self {
        let symbol = Symbol::new(symbol);
        if !self.config.symbols.contains(&symbol) {
            self.config.symbols.push(symbol);
        }
        self.config
            .initial_prices
            .insert(symbol, Price::from_dollars(initial_price));
        self
    }

    pub fn volatility(mut self, multiplier: f64) -> Self {
        self.config.volatility_multiplier = multiplier;
        self
    }

    pub fn market_data_frequency(mut self, period: Duration) -> Self {
        self.config.market_data_frequency = period;
        self
    }

    pub fn max_order_size(mut self, size: u64) -> Self {
        self.config.risk.max_order_size = size;
        self
    }

    pub fn max_position_value(mut self, dollars: f64) -> Self {
        self.config.risk.max_position_value = Price::from_dollars(dollars).0;
        self
    }

    pub fn max_daily_loss(mut self, dollars: f64) -> Self {
        self.config.risk.max_daily_loss = Price::from_dollars(dollars).0;
        self
    }

    pub fn max_drawdown(mut self, fraction: f64) -> Self {
        self.config.risk.max_drawdown = fraction;
        self
    }

    pub fn max_leverage(mut self, leverage: f64) -> Self {
        self.config.risk.max_leverage = leverage;
        self
    }

    /// Enable an agent type, optionally with parameters.
    pub fn add_strategy(mut self, strategy_type: &str, params: HashMap<String, String>) -> Self {
        self.config.enabled_strategies.push(strategy_type.to_string());
        self.config.strategy_params.insert(strategy_type.to_string(), params);
        self
    }

    pub fn strategy_param(mut self, strategy_type: &str, key: &str, value: &str) -> Self {
        self.config
            .strategy_params
            .entry(strategy_type.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn enable_logging(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.enable_logging = true;
        self.config.log_directory = directory.into();
        self
    }

    pub fn disable_logging(mut self) -> Self {
        self.config.enable_logging = false;
        self
    }

    pub fn performance_update_frequency(mut self, period: Duration) -> Self {
        self.config.performance_update_frequency = period;
        self
    }

    pub fn publish_interval(mut self, period: Duration) -> Self {
        self.config.publish_interval = Some(period);
        self
    }

    pub fn feed_seed(mut self, seed: u64) -> Self {
        self.config.feed_seed = seed;
        self
    }

    pub fn build(self) -> Result<EngineConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}
