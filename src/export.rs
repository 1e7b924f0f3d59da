//! CSV and report serialization for the analytics records.
//!
//! Four artefacts, written into the configured log directory:
//!
//! - `trades.csv` — one row per completed round trip
//! - `performance.csv` — periodic performance-log rows
//! - `risk_report.txt` — human-readable risk dump plus the P&L histogram
//! - `trade_analysis.csv` — one row per fill with trader/strategy attribution

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::Utc;
use log::info;

use crate::analytics::{PerformanceAnalytics, PnlHistogram, RiskMetrics};

/// Number of histogram bins in the risk report.
const HISTOGRAM_BINS: usize = 20;

/// Write all four artefacts into `dir`, creating it if needed.
pub fn export_all(dir: &Path, analytics: &PerformanceAnalytics) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    write_trades_csv(&dir.join("trades.csv"), analytics)?;
    write_performance_csv(&dir.join("performance.csv"), analytics)?;
    write_risk_report(&dir.join("risk_report.txt"), analytics)?;
    write_trade_analysis_csv(&dir.join("trade_analysis.csv"), analytics)?;
    info!("exported analytics artefacts to {}", dir.display());
    Ok(())
}

/// `TradeID,Symbol,Side,EntryPrice,ExitPrice,Quantity,PnL,EntryTimeNs,ExitTimeNs,LatencyUs`
pub fn write_trades_csv(path: &Path, analytics: &PerformanceAnalytics) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(
        writer,
        "TradeID,Symbol,Side,EntryPrice,ExitPrice,Quantity,PnL,EntryTimeNs,ExitTimeNs,LatencyUs"
    )?;
    for trade in analytics.trades() {
        writeln!(
            writer,
            "{},{},{},{:.2},{:.2},{},{:.2},{},{},{:.1}",
            trade.id,
            trade.symbol,
            trade.side,
            trade.entry_price.as_dollars(),
            trade.exit_price.as_dollars(),
            trade.quantity,
            trade.pnl as f64 / 100.0,
            trade.entry_time,
            trade.exit_time,
            trade.latency_ns.unwrap_or(0) as f64 / 1_000.0,
        )?;
    }
    writer.flush()
}

/// `TimestampNs,TotalPnL,SharpeRatio,MaxDrawdown,WinRate,TotalTrades`
pub fn write_performance_csv(path: &Path, analytics: &PerformanceAnalytics) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "TimestampNs,TotalPnL,SharpeRatio,MaxDrawdown,WinRate,TotalTrades")?;
    for row in analytics.performance_rows() {
        writeln!(
            writer,
            "{},{:.2},{:.4},{:.4},{:.4},{}",
            row.timestamp, row.total_pnl, row.sharpe_ratio, row.max_drawdown, row.win_rate, row.total_trades,
        )?;
    }
    writer.flush()
}

/// Human-readable risk dump followed by the P&L histogram, one
/// `[lo, hi): freq` line per bin.
pub fn write_risk_report(path: &Path, analytics: &PerformanceAnalytics) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let risk = analytics.risk_metrics();
    let histogram = analytics.pnl_histogram(HISTOGRAM_BINS);

    writeln!(writer, "Risk Report")?;
    writeln!(writer, "===========")?;
    writeln!(writer, "Generated: {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(writer)?;
    write_risk_metrics(&mut writer, &risk)?;
    writeln!(writer)?;
    writeln!(writer, "PnL Distribution")?;
    writeln!(writer, "================")?;
    write_histogram(&mut writer, &histogram)?;
    writer.flush()
}

fn write_risk_metrics(writer: &mut impl Write, risk: &RiskMetrics) -> io::Result<()> {
    writeln!(writer, "VaR (95%): {:.6}", risk.var_95)?;
    writeln!(writer, "VaR (99%): {:.6}", risk.var_99)?;
    writeln!(writer, "CVaR (95%): {:.6}", risk.cvar_95)?;
    writeln!(writer, "Sharpe Ratio: {:.4}", risk.sharpe_ratio)?;
    writeln!(writer, "Max Drawdown: {:.4}", risk.max_drawdown)?;
    writeln!(writer, "Volatility: {:.6}", risk.volatility)?;
    writeln!(writer, "Skewness: {:.4}", risk.skewness)?;
    writeln!(writer, "Kurtosis: {:.4}", risk.kurtosis)?;
    writeln!(writer, "Current Exposure: {:.2}", risk.exposure)
}

fn write_histogram(writer: &mut impl Write, histogram: &PnlHistogram) -> io::Result<()> {
    for (lo, freq) in histogram.bins.iter().zip(&histogram.frequencies) {
        writeln!(writer, "[{:.2}, {:.2}): {}", lo, lo + histogram.bin_width, freq)?;
    }
    Ok(())
}

/// `TradeID,Symbol,Side,Price,Quantity,PnL,TimestampNs,TraderID,Strategy`
pub fn write_trade_analysis_csv(path: &Path, analytics: &PerformanceAnalytics) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "TradeID,Symbol,Side,Price,Quantity,PnL,TimestampNs,TraderID,Strategy")?;
    for row in analytics.trade_log() {
        writeln!(
            writer,
            "{},{},{},{:.2},{},{:.2},{},{},{}",
            row.id,
            row.symbol,
            row.side,
            row.price.as_dollars(),
            row.quantity,
            row.pnl as f64 / 100.0,
            row.timestamp,
            row.trader,
            row.strategy,
        )?;
    }
    writer.flush()
}
