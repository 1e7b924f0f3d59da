//! Performance analytics: trade records, equity curve, and risk statistics.
//!
//! Sinks execution and equity events from the order manager and computes
//! metrics on demand. Histories are bounded (252 returns, 1,000 pnl/equity
//! samples by default) so memory stays constant over long runs.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::manager::ClosedTrade;
use crate::stats;
use crate::{DepthLevel, Execution, Price, Quantity, Side, Symbol, Timestamp, TraderId};

/// Analytics configuration.
#[derive(Clone, Debug)]
pub struct AnalyticsConfig {
    /// Rolling returns window (default 252).
    pub lookback_period: usize,
    /// Bounded length for pnl/equity series (default 1,000).
    pub history_length: usize,
    /// Per-period risk-free rate used by Sharpe/Sortino.
    pub risk_free_rate: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            lookback_period: 252,
            history_length: 1_000,
            risk_free_rate: 0.0,
        }
    }
}

/// A completed round trip.
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct TradeRecord {
    pub id: u64,
    pub symbol: Symbol,
    /// Side of the closing fill.
    pub side: Side,
    pub entry_price: Price,
    pub exit_price: Price,
    pub quantity: Quantity,
    /// Realized P&L in cents.
    pub pnl: i64,
    pub entry_time: Timestamp,
    pub exit_time: Timestamp,
    /// Submit-to-fill latency of the closing order, when known.
    pub latency_ns: Option<u64>,
}

/// One fill as seen by the trade log (per-execution granularity).
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct TradeLogEntry {
    pub id: u64,
    pub symbol: Symbol,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    /// Realized P&L this fill produced (0 for opening fills).
    pub pnl: i64,
    pub timestamp: Timestamp,
    pub trader: TraderId,
    pub strategy: String,
}

/// Order submit-to-fill latency sample.
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct LatencyMeasurement {
    pub symbol: Symbol,
    pub side: Side,
    pub latency_ns: u64,
}

/// Point-in-time book capture (top levels), stored when detailed logging
/// is enabled.
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct BookCapture {
    pub symbol: Symbol,
    pub timestamp: Timestamp,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub mid_price: Option<f64>,
    pub spread: i64,
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

/// One periodic row of the performance log.
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct PerformanceRow {
    pub timestamp: Timestamp,
    pub total_pnl: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: u64,
}

/// Aggregate performance over all recorded trades.
#[derive(Clone, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct PerformanceMetrics {
    /// Latest equity (dollars).
    pub total_pnl: f64,
    /// Sum of realized round-trip P&L (dollars).
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub avg_latency_us: f64,
    pub max_latency_us: f64,
    pub min_latency_us: f64,
}

/// Distributional risk statistics over the returns window.
#[derive(Clone, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct RiskMetrics {
    pub var_95: f64,
    pub var_99: f64,
    pub cvar_95: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub volatility: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    /// Latest cumulative P&L (dollars).
    pub exposure: f64,
}

/// P&L distribution histogram: one `[lo, lo+width)` bin per entry.
#[derive(Clone, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct PnlHistogram {
    pub bins: Vec<f64>,
    pub frequencies: Vec<u32>,
    pub min_pnl: f64,
    pub max_pnl: f64,
    pub bin_width: f64,
}

/// The analytics store. Wrap in a `Mutex` to share across threads; all
/// methods take `&mut self` or `&self` without interior locking.
pub struct PerformanceAnalytics {
    config: AnalyticsConfig,
    trades: Vec<TradeRecord>,
    trade_log: Vec<TradeLogEntry>,
    latencies: Vec<LatencyMeasurement>,
    /// Per-round-trip simple returns, bounded by `lookback_period`.
    returns: VecDeque<f64>,
    /// Cumulative realized P&L series in dollars, bounded.
    pnl_history: VecDeque<f64>,
    /// Periodic equity samples in dollars, bounded.
    equity_curve: VecDeque<f64>,
    performance_rows: Vec<PerformanceRow>,
    book_captures: Vec<BookCapture>,
    detailed_logging: bool,
    strategy_names: FxHashMap<TraderId, String>,
    next_trade_id: u64,
    realized_pnl_cents: i64,
}

impl PerformanceAnalytics {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            config,
            trades: Vec::new(),
            trade_log: Vec::new(),
            latencies: Vec::new(),
            returns: VecDeque::new(),
            pnl_history: VecDeque::new(),
            equity_curve: VecDeque::new(),
            performance_rows: Vec::new(),
            book_captures: Vec::new(),
            detailed_logging: false,
            strategy_names: FxHashMap::default(),
            next_trade_id: 1,
            realized_pnl_cents: 0,
        }
    }

    /// Map a trader id to its strategy name for trade-log attribution.
    pub fn register_strategy(&mut self, trader: TraderId, strategy: impl Into<String>) {
        self.strategy_names.insert(trader, strategy.into());
    }

    pub fn enable_detailed_logging(&mut self, enable: bool) {
        self.detailed_logging = enable;
    }

    // === Event sinks ===

    /// Record one fill into the trade log.
    pub fn record_execution(&mut self, execution: &Execution) {
        let strategy = self
            .strategy_names
            .get(&execution.taker_trader)
            .cloned()
            .unwrap_or_default();
        self.trade_log.push(TradeLogEntry {
            id: execution.id.0,
            symbol: execution.symbol,
            side: execution.side,
            price: execution.price,
            quantity: execution.quantity,
            pnl: 0,
            timestamp: execution.timestamp,
            trader: execution.taker_trader,
            strategy,
        });
    }

    /// Record a completed round trip (the order manager emits these right
    /// after the closing execution, so the matching trade-log row gets the
    /// realized P&L attributed to it).
    pub fn record_closed_trade(&mut self, trade: &ClosedTrade) {
        let id = self.next_trade_id;
        self.next_trade_id += 1;

        self.trades.push(TradeRecord {
            id,
            symbol: trade.symbol,
            side: trade.side,
            entry_price: trade.entry_price,
            exit_price: trade.exit_price,
            quantity: trade.quantity,
            pnl: trade.pnl,
            entry_time: trade.entry_time,
            exit_time: trade.exit_time,
            latency_ns: trade.latency_ns,
        });

        if let Some(last) = self
            .trade_log
            .iter_mut()
            .rev()
            .find(|row| row.symbol == trade.symbol && row.timestamp == trade.exit_time)
        {
            last.pnl += trade.pnl;
        }

        let entry_notional = trade.entry_price.0 * trade.quantity as i64;
        if entry_notional != 0 {
            self.push_bounded_return(trade.pnl as f64 / entry_notional.abs() as f64);
        }

        if let Some(latency_ns) = trade.latency_ns {
            self.latencies.push(LatencyMeasurement {
                symbol: trade.symbol,
                side: trade.side,
                latency_ns,
            });
        }

        self.realized_pnl_cents += trade.pnl;
        let cumulative = self.realized_pnl_cents as f64 / 100.0;
        self.pnl_history.push_back(cumulative);
        if self.pnl_history.len() > self.config.history_length {
            self.pnl_history.pop_front();
        }
    }

    /// Push a periodic equity sample (dollars are derived from cents here)
    /// and a matching performance-log row.
    pub fn update_equity(&mut self, equity_cents: i64, timestamp: Timestamp) {
        let equity = equity_cents as f64 / 100.0;
        self.equity_curve.push_back(equity);
        if self.equity_curve.len() > self.config.history_length {
            self.equity_curve.pop_front();
        }

        let metrics = self.performance_metrics();
        self.performance_rows.push(PerformanceRow {
            timestamp,
            total_pnl: metrics.total_pnl,
            sharpe_ratio: metrics.sharpe_ratio,
            max_drawdown: metrics.max_drawdown,
            win_rate: metrics.win_rate,
            total_trades: metrics.total_trades,
        });
        if self.performance_rows.len() > self.config.history_length {
            self.performance_rows.remove(0);
        }
    }

    /// Store a book capture when detailed logging is on.
    pub fn capture_book(&mut self, capture: BookCapture) {
        if self.detailed_logging {
            self.book_captures.push(capture);
        }
    }

    // === Accessors ===

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn trade_log(&self) -> &[TradeLogEntry] {
        &self.trade_log
    }

    pub fn latencies(&self) -> &[LatencyMeasurement] {
        &self.latencies
    }

    pub fn equity_curve(&self) -> Vec<f64> {
        self.equity_curve.iter().copied().collect()
    }

    /// Drawdown fraction at each equity sample.
    pub fn drawdown_curve(&self) -> Vec<f64> {
        let mut peak = f64::MIN;
        self.equity_curve
            .iter()
            .map(|&equity| {
                if equity > peak {
                    peak = equity;
                }
                if peak > 0.0 {
                    (peak - equity) / peak
                } else {
                    0.0
                }
            })
            .collect()
    }

    pub fn performance_rows(&self) -> &[PerformanceRow] {
        &self.performance_rows
    }

    pub fn book_captures(&self) -> &[BookCapture] {
        &self.book_captures
    }

    // === Metrics ===

    pub fn performance_metrics(&self) -> PerformanceMetrics {
        let mut metrics = PerformanceMetrics {
            realized_pnl: self.realized_pnl_cents as f64 / 100.0,
            total_pnl: self.equity_curve.back().copied().unwrap_or(0.0),
            ..PerformanceMetrics::default()
        };
        metrics.unrealized_pnl = metrics.total_pnl - metrics.realized_pnl;

        let returns: Vec<f64> = self.returns.iter().copied().collect();
        let rf = self.config.risk_free_rate;
        let excess_mean = stats::mean(&returns) - rf;
        let sd = stats::stddev(&returns);
        metrics.sharpe_ratio = if sd > 0.0 { excess_mean / sd } else { 0.0 };

        let downside: Vec<f64> = returns
            .iter()
            .map(|r| (r - rf).min(0.0))
            .filter(|d| *d < 0.0)
            .collect();
        let downside_dev = if downside.is_empty() {
            0.0
        } else {
            (downside.iter().map(|d| d * d).sum::<f64>() / downside.len() as f64).sqrt()
        };
        metrics.sortino_ratio = if downside_dev > 0.0 {
            excess_mean / downside_dev
        } else {
            0.0
        };

        metrics.max_drawdown = self.drawdown_curve().into_iter().fold(0.0, f64::max);

        let (mut wins, mut losses) = (0u64, 0u64);
        let (mut gross_win, mut gross_loss) = (0.0f64, 0.0f64);
        for trade in &self.trades {
            let pnl = trade.pnl as f64 / 100.0;
            if trade.pnl > 0 {
                wins += 1;
                gross_win += pnl;
                metrics.largest_win = metrics.largest_win.max(pnl);
            } else if trade.pnl < 0 {
                losses += 1;
                gross_loss += -pnl;
                metrics.largest_loss = metrics.largest_loss.max(-pnl);
            }
        }
        metrics.total_trades = self.trades.len() as u64;
        metrics.winning_trades = wins;
        metrics.losing_trades = losses;
        metrics.win_rate = if self.trades.is_empty() {
            0.0
        } else {
            wins as f64 / self.trades.len() as f64
        };
        metrics.profit_factor = if gross_loss > 0.0 { gross_win / gross_loss } else { 0.0 };
        metrics.avg_win = if wins > 0 { gross_win / wins as f64 } else { 0.0 };
        metrics.avg_loss = if losses > 0 { gross_loss / losses as f64 } else { 0.0 };

        if !self.latencies.is_empty() {
            let us: Vec<f64> = self.latencies.iter().map(|l| l.latency_ns as f64 / 1_000.0).collect();
            metrics.avg_latency_us = stats::mean(&us);
            metrics.max_latency_us = us.iter().copied().fold(f64::MIN, f64::max);
            metrics.min_latency_us = us.iter().copied().fold(f64::MAX, f64::min);
        }

        metrics
    }

    pub fn risk_metrics(&self) -> RiskMetrics {
        let returns: Vec<f64> = self.returns.iter().copied().collect();
        let mut metrics = RiskMetrics {
            exposure: self.pnl_history.back().copied().unwrap_or(0.0),
            ..RiskMetrics::default()
        };
        if returns.len() < 2 {
            return metrics;
        }

        metrics.var_95 = stats::quantile(&returns, 0.05);
        metrics.var_99 = stats::quantile(&returns, 0.01);
        let below: Vec<f64> = returns.iter().copied().filter(|r| *r <= metrics.var_95).collect();
        metrics.cvar_95 = if below.is_empty() { metrics.var_95 } else { stats::mean(&below) };

        let sd = stats::stddev(&returns);
        metrics.sharpe_ratio = if sd > 0.0 {
            (stats::mean(&returns) - self.config.risk_free_rate) / sd
        } else {
            0.0
        };
        metrics.volatility = sd;
        metrics.skewness = stats::skewness(&returns);
        metrics.kurtosis = stats::kurtosis(&returns);
        metrics.max_drawdown = self.drawdown_curve().into_iter().fold(0.0, f64::max);
        metrics
    }

    /// Histogram of the cumulative-P&L series.
    pub fn pnl_histogram(&self, num_bins: usize) -> PnlHistogram {
        let mut histogram = PnlHistogram::default();
        if self.pnl_history.is_empty() || num_bins == 0 {
            return histogram;
        }

        let min = self.pnl_history.iter().copied().fold(f64::MAX, f64::min);
        let max = self.pnl_history.iter().copied().fold(f64::MIN, f64::max);
        histogram.min_pnl = min;
        histogram.max_pnl = max;
        let width = if max > min { (max - min) / num_bins as f64 } else { 1.0 };
        histogram.bin_width = width;
        histogram.bins = (0..num_bins).map(|i| min + i as f64 * width).collect();
        histogram.frequencies = vec![0; num_bins];

        for &pnl in &self.pnl_history {
            let index = (((pnl - min) / width) as usize).min(num_bins - 1);
            histogram.frequencies[index] += 1;
        }
        histogram
    }

    fn push_bounded_return(&mut self, value: f64) {
        self.returns.push_back(value);
        if self.returns.len() > self.config.lookback_period {
            self.returns.pop_front();
        }
    }
}

impl Default for PerformanceAnalytics {
    fn default() -> Self {
        Self::new(AnalyticsConfig::default())
    }
}
