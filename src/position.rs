//! Per-symbol position tracking.

use crate::types::{Price, Symbol};

/// What a fill did to the position's realized P&L.
///
/// Non-zero only when the fill reduced or flipped the position; `quantity`
/// is the number of units closed and `pnl` the realized amount in cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Realized {
    pub quantity: i64,
    pub pnl: i64,
}

/// A signed position in one symbol.
///
/// Quantity is positive for long, negative for short. The average entry
/// price is volume-weighted and only meaningful while the position is open;
/// a flat position carries its whole history in `realized_pnl`.
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    /// Net quantity: positive = long, negative = short, zero = flat.
    pub quantity: i64,
    /// Volume-weighted average entry price (cents). 0 when flat.
    pub avg_price: i64,
    /// Cumulative realized P&L (cents).
    pub realized_pnl: i64,
    /// Entry cost basis (quantity × avg), kept exact for VWAP updates.
    total_cost: i64,
}

impl Position {
    /// A new flat position.
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            quantity: 0,
            avg_price: 0,
            realized_pnl: 0,
            total_cost: 0,
        }
    }

    /// Apply a fill. `qty` is signed (+buy / -sell); `price` is in cents.
    ///
    /// Same-direction fills update the VWAP entry. Opposite-direction fills
    /// close up to `|quantity|` units at `price - avg` per unit
    /// (sign-respecting) and either shrink, flatten, or flip the position;
    /// a flip re-opens the remainder at the fill price.
    pub fn apply_fill(&mut self, qty: i64, price: i64) -> Realized {
        if qty == 0 {
            return Realized::default();
        }

        let same_direction = (self.quantity >= 0 && qty > 0) || (self.quantity <= 0 && qty < 0);

        if self.quantity == 0 {
            self.quantity = qty;
            self.avg_price = price;
            self.total_cost = qty * price;
            Realized::default()
        } else if same_direction {
            self.total_cost += qty * price;
            self.quantity += qty;
            self.avg_price = self.total_cost / self.quantity;
            Realized::default()
        } else {
            let close_qty = qty.abs().min(self.quantity.abs());
            let pnl_per_unit = if self.quantity > 0 {
                price - self.avg_price
            } else {
                self.avg_price - price
            };
            let pnl = pnl_per_unit * close_qty;
            self.realized_pnl += pnl;

            let net = self.quantity + qty;
            if net == 0 {
                self.quantity = 0;
                self.avg_price = 0;
                self.total_cost = 0;
            } else if (net > 0) == (self.quantity > 0) {
                // Partial close: entry price unchanged, cost basis shrinks by
                // the closed portion.
                self.total_cost -= close_qty * self.avg_price * self.quantity.signum();
                self.quantity = net;
                self.avg_price = self.total_cost / self.quantity;
            } else {
                // Flipped through flat: remainder opens at the fill price.
                self.quantity = net;
                self.avg_price = price;
                self.total_cost = net * price;
            }

            Realized {
                quantity: close_qty,
                pnl,
            }
        }
    }

    /// Mark-to-market value at `price` (cents).
    #[inline]
    pub fn market_value(&self, price: Price) -> i64 {
        self.quantity * price.0
    }

    /// Unrealized P&L at `price` (cents); 0 when flat.
    #[inline]
    pub fn unrealized_pnl(&self, price: Price) -> i64 {
        if self.quantity == 0 {
            return 0;
        }
        (price.0 - self.avg_price) * self.quantity
    }

    #[inline]
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }
}
