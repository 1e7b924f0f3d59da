//! Pre-trade risk limits and checks.
//!
//! Checks run in a fixed order and short-circuit on the first failure; the
//! reason is surfaced through the order manager's risk-alert callback and
//! logged as a rejection.

use std::fmt;

use crate::{Order, Price, Quantity};

/// Risk caps enforced by the order manager. Read-mostly configuration.
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct RiskLimits {
    /// Largest single-order quantity.
    pub max_order_size: Quantity,
    /// Largest absolute notional of any one projected position (cents).
    pub max_position_value: i64,
    /// Daily loss beyond which new orders are refused (cents, positive).
    pub max_daily_loss: i64,
    /// Drawdown fraction that triggers a risk alert (alert only).
    pub max_drawdown: f64,
    /// Gross leverage cap against `reference_equity`; 0 disables the check.
    pub max_leverage: f64,
    /// Equity base for the leverage check (cents).
    pub reference_equity: i64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_order_size: 10_000,
            max_position_value: 100_000_000, // $1M
            max_daily_loss: 5_000_000,       // $50K
            max_drawdown: 0.10,
            max_leverage: 2.0,
            reference_equity: 100_000_000, // $1M
        }
    }
}

impl RiskLimits {
    /// Validate the limits. Fail-fast at configuration time.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_order_size == 0 {
            return Err("max_order_size must be positive".into());
        }
        if self.max_position_value <= 0 {
            return Err(format!(
                "max_position_value must be positive, got {}",
                self.max_position_value
            ));
        }
        if self.max_daily_loss <= 0 {
            return Err(format!("max_daily_loss must be positive, got {}", self.max_daily_loss));
        }
        if !self.max_drawdown.is_finite() || !(0.0..=1.0).contains(&self.max_drawdown) {
            return Err(format!("max_drawdown must be in [0, 1], got {}", self.max_drawdown));
        }
        if !self.max_leverage.is_finite() || self.max_leverage < 0.0 {
            return Err(format!("max_leverage must be >= 0, got {}", self.max_leverage));
        }
        Ok(())
    }
}

/// Why an order failed pre-trade risk. The `Display` text is what reaches
/// the risk-alert callback and the operator log.
#[derive(Clone, Debug, PartialEq)]
pub enum RiskViolation {
    OrderSize {
        quantity: Quantity,
        limit: Quantity,
    },
    PositionValue {
        projected_cents: i64,
        limit_cents: i64,
    },
    DailyLoss {
        daily_pnl_cents: i64,
        limit_cents: i64,
    },
    Leverage {
        gross_cents: i64,
        cap_cents: i64,
    },
}

impl fmt::Display for RiskViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskViolation::OrderSize { quantity, limit } => {
                write!(f, "order size {} exceeds max order size {}", quantity, limit)
            }
            RiskViolation::PositionValue { projected_cents, limit_cents } => write!(
                f,
                "projected position value ${:.2} exceeds limit ${:.2}",
                *projected_cents as f64 / 100.0,
                *limit_cents as f64 / 100.0
            ),
            RiskViolation::DailyLoss { daily_pnl_cents, limit_cents } => write!(
                f,
                "daily loss ${:.2} breaches max daily loss ${:.2}",
                -*daily_pnl_cents as f64 / 100.0,
                *limit_cents as f64 / 100.0
            ),
            RiskViolation::Leverage { gross_cents, cap_cents } => write!(
                f,
                "gross exposure ${:.2} exceeds leverage cap ${:.2}",
                *gross_cents as f64 / 100.0,
                *cap_cents as f64 / 100.0
            ),
        }
    }
}

impl std::error::Error for RiskViolation {}

/// Inputs the checks need beyond the order itself.
pub struct RiskContext {
    /// Current signed position in the order's symbol.
    pub position_qty: i64,
    /// Reference price for notional math: the limit price for priced
    /// orders, the symbol's mark for market orders. `None` when no mark
    /// exists yet (the notional checks are then skipped).
    pub reference_price: Option<Price>,
    /// Realized P&L so far today (cents).
    pub daily_pnl: i64,
    /// Gross |position value| across all symbols, excluding this order
    /// (cents).
    pub gross_exposure: i64,
}

/// Run the pre-trade checks in order; the first failure rejects.
///
/// Order well-formedness (quantity, price, symbol) is the matching engine's
/// own validation and happens before these checks.
pub fn evaluate(limits: &RiskLimits, order: &Order, ctx: &RiskContext) -> Result<(), RiskViolation> {
    // 1. Single-order quantity cap.
    if order.original_quantity > limits.max_order_size {
        return Err(RiskViolation::OrderSize {
            quantity: order.original_quantity,
            limit: limits.max_order_size,
        });
    }

    // 2. Projected position notional, |qty'| * price.
    if let Some(price) = ctx.reference_price {
        let projected_qty = ctx.position_qty + order.side.sign() * order.original_quantity as i64;
        let projected = projected_qty.saturating_abs().saturating_mul(price.0.saturating_abs());
        if projected > limits.max_position_value {
            return Err(RiskViolation::PositionValue {
                projected_cents: projected,
                limit_cents: limits.max_position_value,
            });
        }
    }

    // 3. Daily loss floor.
    if ctx.daily_pnl <= -limits.max_daily_loss {
        return Err(RiskViolation::DailyLoss {
            daily_pnl_cents: ctx.daily_pnl,
            limit_cents: limits.max_daily_loss,
        });
    }

    // 4. Gross leverage, when enabled.
    if limits.max_leverage > 0.0 {
        if let Some(price) = ctx.reference_price {
            let order_notional =
                (order.original_quantity as i64).saturating_mul(price.0.saturating_abs());
            let gross = ctx.gross_exposure.saturating_add(order_notional);
            let cap = (limits.max_leverage * limits.reference_equity as f64) as i64;
            if gross > cap {
                return Err(RiskViolation::Leverage {
                    gross_cents: gross,
                    cap_cents: cap,
                });
            }
        }
    }

    Ok(())
}
