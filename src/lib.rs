//! # ticksim
//!
//! A simulated high-frequency equities trading engine: a price-time-priority
//! limit order book, a threaded continuous-double-auction matching engine,
//! an order manager with pre-trade risk and position/P&L accounting, a
//! synthetic market-data feed, a family of strategy agents, and an
//! analytics/monitoring layer.
//!
//! ## Architecture
//!
//! - [`OrderBook`] is a pure data structure: inserting at a crossing price
//!   never matches. The matching pass ([`OrderBook::uncross`]) and the
//!   market-order sweep live in the `matching` module and are driven by the
//!   [`MatchingEngine`]'s single worker thread, which drains a FIFO intake
//!   queue — orders submitted in program order are processed in that order.
//! - [`OrderManager`] wraps the engine: ordered pre-trade risk checks, a
//!   per-trader order table for ownership checks, per-symbol positions with
//!   VWAP entries and realized P&L, and peak-equity drawdown tracking
//!   (alert-only).
//! - [`MarketDataFeed`] evolves per-symbol synthetic books with zero-mean
//!   normal increments on a seeded RNG and publishes tops of book.
//! - Strategy agents ([`strategy::Strategy`]) react to quotes and fills
//!   inline on the delivering thread; the factory builds them by name.
//! - [`PerformanceAnalytics`] keeps bounded trade/equity histories and
//!   computes Sharpe, Sortino, drawdown, VaR/CVaR, and distribution moments;
//!   [`TradingEngine`] ties everything together from an [`EngineConfig`].
//!
//! ## Quick start (book level)
//!
//! ```
//! use ticksim::{Order, OrderBook, OrderId, Price, Side, Symbol, TraderId};
//!
//! let mut book = OrderBook::new(Symbol::new("AAPL"));
//! let trader = TraderId::new("T1");
//!
//! let mut sell = Order::limit(Symbol::new("AAPL"), Side::Sell, Price(150_00), 100, trader);
//! sell.id = OrderId(1);
//! sell.timestamp = 1;
//! book.insert(sell);
//!
//! let mut buy = Order::limit(Symbol::new("AAPL"), Side::Buy, Price(150_00), 40, trader);
//! buy.id = OrderId(2);
//! buy.timestamp = 2;
//! book.insert(buy);
//!
//! // Matching is an explicit step; trades print at the maker's price.
//! let fills = book.uncross();
//! assert_eq!(fills.len(), 1);
//! assert_eq!(fills[0].price, Price(150_00));
//! assert_eq!(book.asks().total_quantity(), 60);
//! ```
//!
//! ## Running the full simulator
//!
//! ```no_run
//! use std::time::Duration;
//! use ticksim::{EngineConfig, TradingEngine};
//!
//! let config = EngineConfig::builder()
//!     .add_symbol("AAPL", 150.0)
//!     .add_symbol("GOOGL", 2800.0)
//!     .add_strategy("market_making", Default::default())
//!     .add_strategy("market_orders", Default::default())
//!     .enable_logging("./logs")
//!     .build()
//!     .unwrap();
//!
//! let engine = TradingEngine::new(config).unwrap();
//! engine.start().unwrap();
//! std::thread::sleep(Duration::from_secs(30));
//! engine.stop(); // exports trades.csv, performance.csv, risk_report.txt, ...
//! ```

mod book;
mod exec;
mod matching;
mod order;
mod price_levels;
mod stop;
mod types;

pub mod analytics;
pub mod config;
pub mod engine;
pub mod export;
pub mod feed;
pub mod manager;
pub mod monitor;
pub mod position;
pub mod risk;
pub mod runtime;
pub mod stats;
pub mod strategy;
pub mod time;

// Re-export the core API at the crate root.
pub use analytics::{AnalyticsConfig, PerformanceAnalytics, PerformanceMetrics, RiskMetrics};
pub use book::{DepthLevel, DepthSnapshot, OrderBook};
pub use config::{EngineBuilder, EngineConfig};
pub use engine::{EngineStats, MatchingEngine, SubmitError};
pub use exec::Execution;
pub use feed::{FeedConfig, MarketDataFeed};
pub use manager::{ClosedTrade, OrderManager, PlaceError};
pub use matching::Fill;
pub use monitor::{DashboardSnapshot, PerformanceMonitor, SnapshotPublisher};
pub use order::{Order, OrderStatus, OrderType, Side};
pub use position::Position;
pub use price_levels::{Level, PriceLevels};
pub use risk::{RiskLimits, RiskViolation};
pub use runtime::TradingEngine;
pub use stop::{StopBook, StopOrder, StopStatus};
pub use types::{ExecutionId, OrderId, Price, Quantity, Symbol, Timestamp, TraderId};
