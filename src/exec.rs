//! Execution records emitted by the matching engine.

use std::fmt;

use crate::{ExecutionId, OrderId, Price, Quantity, Side, Symbol, Timestamp, TraderId};

/// A single fill, immutable once emitted.
///
/// One execution is emitted per fill and identifies both parties: the maker
/// (resting, price-setting) order and the taker (aggressor). Consumers that
/// care about one side — a strategy watching its own fills, say — filter by
/// trader id with [`Execution::involves`] / [`Execution::side_for`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Execution {
    /// Strictly increasing across all executions from one engine.
    pub id: ExecutionId,
    pub symbol: Symbol,
    /// Side of the aggressor (taker).
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub timestamp: Timestamp,
    pub taker_order: OrderId,
    pub taker_trader: TraderId,
    pub maker_order: OrderId,
    pub maker_trader: TraderId,
}

impl Execution {
    /// Notional value in cents.
    #[inline]
    pub fn notional(&self) -> i64 {
        self.price.0 * self.quantity as i64
    }

    /// True if the trader was on either side of this fill.
    pub fn involves(&self, trader: TraderId) -> bool {
        self.taker_trader == trader || self.maker_trader == trader
    }

    /// The side the given trader traded on, if they were a party.
    ///
    /// The maker is on the opposite side of the aggressor.
    pub fn side_for(&self, trader: TraderId) -> Option<Side> {
        if self.taker_trader == trader {
            Some(self.side)
        } else if self.maker_trader == trader {
            Some(self.side.opposite())
        } else {
            None
        }
    }
}

impl fmt::Display for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} @ {} ({} x {})",
            self.id, self.symbol, self.side, self.quantity, self.price, self.taker_order, self.maker_order
        )
    }
}
