//! Simulator runner: configure, run for a bounded interval, report.
//!
//! Usage:
//!   cargo run --bin sim [seconds]

use std::collections::HashMap;
use std::time::Duration;

use ticksim::{EngineConfig, TradingEngine};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let seconds: u64 = std::env::args()
        .nth(1)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(30);

    let mm_params: HashMap<String, String> = [
        ("spread_multiplier", "0.5"),
        ("base_quantity", "1000"),
        ("max_position", "10000"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let momentum_params: HashMap<String, String> = [
        ("short_window", "5"),
        ("long_window", "20"),
        ("momentum_threshold", "0.001"),
        ("position_size", "200"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let pacer_params: HashMap<String, String> = [
        ("order_interval_ms", "2000"),
        ("order_size", "500"),
        ("max_orders", "10"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let config = EngineConfig::builder()
        .add_symbol("AAPL", 150.0)
        .add_symbol("GOOGL", 2800.0)
        .add_symbol("MSFT", 300.0)
        .add_symbol("TSLA", 800.0)
        .add_symbol("AMZN", 3300.0)
        .volatility(1.5)
        .market_data_frequency(Duration::from_millis(50))
        .max_order_size(10_000)
        .max_position_value(1_000_000.0)
        .max_daily_loss(50_000.0)
        .add_strategy("market_making", mm_params)
        .add_strategy("momentum", momentum_params)
        .add_strategy("market_orders", pacer_params)
        .enable_logging("./logs")
        .publish_interval(Duration::from_secs(5))
        .build()
        .expect("valid config");

    let engine = TradingEngine::new(config).expect("engine construction");
    engine.start().expect("engine start");
    println!("simulator running for {seconds}s...");

    std::thread::sleep(Duration::from_secs(seconds));

    engine.stop();
    print_summary(&engine);
}

fn print_summary(engine: &TradingEngine) {
    let metrics = engine.performance_metrics();
    let risk = engine.risk_metrics();
    let stats = engine.order_manager().engine().stats();

    println!("\n=== RUN SUMMARY ===");
    println!("Orders submitted:  {}", stats.total_orders());
    println!("Executions:        {}", stats.total_executions());
    println!("Notional volume:   ${:.2}", stats.total_volume());
    println!("Round trips:       {}", metrics.total_trades);
    println!("Win rate:          {:.1}%", metrics.win_rate * 100.0);
    println!("Realized P&L:      ${:.2}", metrics.realized_pnl);
    println!("Sharpe:            {:.3}", metrics.sharpe_ratio);
    println!("Max drawdown:      {:.1}%", metrics.max_drawdown * 100.0);
    println!("VaR 95%:           {:.6}", risk.var_95);

    println!("\nPositions:");
    let positions = engine.positions();
    if positions.is_empty() {
        println!("  (flat)");
    }
    for position in positions {
        println!(
            "  {}: {} @ ${:.2} (realized ${:.2})",
            position.symbol,
            position.quantity,
            position.avg_price as f64 / 100.0,
            position.realized_pnl as f64 / 100.0,
        );
    }
    println!("Artefacts written to ./logs");
}
