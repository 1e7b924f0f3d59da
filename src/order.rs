//! Order representation and lifecycle: side, type, status, and the order
//! struct itself.

use std::fmt;

use crate::{OrderId, Price, Quantity, Symbol, Timestamp, TraderId};

/// Which way an order trades.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side this order trades against.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Signed direction for position math: +1 for buys, -1 for sells.
    #[inline]
    pub fn sign(self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Upper-case names, matching the CSV artefact layouts.
        f.write_str(match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        })
    }
}

/// How an order interacts with the book.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum OrderType {
    /// Execute immediately at the best available prices; never rests.
    Market,
    /// Execute at `price` or better; remainder rests on the book.
    #[default]
    Limit,
    /// Becomes a market order once the last trade reaches the stop price.
    Stop,
    /// Becomes a limit order once the last trade reaches the stop price.
    StopLimit,
}

impl OrderType {
    /// True for the order types that carry a meaningful limit price.
    #[inline]
    pub fn has_limit_price(self) -> bool {
        !matches!(self, OrderType::Market)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::Stop => write!(f, "STOP"),
            OrderType::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

/// Status of an order in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum OrderStatus {
    /// Accepted, no fills yet.
    #[default]
    Pending,
    /// Some quantity filled, remainder live.
    PartiallyFilled,
    /// Fully executed.
    Filled,
    /// Removed by request, or the unfilled residual was discarded.
    Cancelled,
    /// Refused before reaching the book; never live.
    Rejected,
}

impl OrderStatus {
    /// True while the order can still fill or be cancelled.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::PartiallyFilled)
    }

    /// True once no further state change is possible.
    #[inline]
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

/// An order flowing through the engine.
///
/// Quantity is tracked as the `original / filled / remaining` triple with the
/// invariant `original = filled + remaining`; status mirrors the fill state
/// (`Filled` iff `filled == original`, `PartiallyFilled` iff
/// `0 < filled < original`).
#[derive(Clone, Debug, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Order {
    /// Assigned by the engine on acceptance.
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub kind: OrderType,
    /// Limit price; meaningless for market orders. For stop orders this is
    /// the stop trigger price (stop-limits carry `limit_price` as well).
    pub price: Price,
    /// Limit price applied after a stop-limit triggers.
    pub limit_price: Option<Price>,
    pub original_quantity: Quantity,
    pub filled_quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub status: OrderStatus,
    /// Acceptance timestamp, nanoseconds. Reset on modify (priority loss).
    pub timestamp: Timestamp,
    pub trader: TraderId,
}

impl Order {
    /// Create a limit order awaiting engine acceptance (id and timestamp are
    /// assigned by the engine).
    pub fn limit(symbol: Symbol, side: Side, price: Price, quantity: Quantity, trader: TraderId) -> Self {
        Self::with_kind(symbol, side, OrderType::Limit, price, None, quantity, trader)
    }

    /// Create a market order awaiting engine acceptance.
    pub fn market(symbol: Symbol, side: Side, quantity: Quantity, trader: TraderId) -> Self {
        Self::with_kind(symbol, side, OrderType::Market, Price::ZERO, None, quantity, trader)
    }

    /// Create a stop order: becomes a market order at `stop_price`.
    pub fn stop(symbol: Symbol, side: Side, stop_price: Price, quantity: Quantity, trader: TraderId) -> Self {
        Self::with_kind(symbol, side, OrderType::Stop, stop_price, None, quantity, trader)
    }

    /// Create a stop-limit order: becomes a limit at `limit_price` once the
    /// last trade reaches `stop_price`.
    pub fn stop_limit(
        symbol: Symbol,
        side: Side,
        stop_price: Price,
        limit_price: Price,
        quantity: Quantity,
        trader: TraderId,
    ) -> Self {
        Self::with_kind(symbol, side, OrderType::StopLimit, stop_price, Some(limit_price), quantity, trader)
    }

    fn with_kind(
        symbol: Symbol,
        side: Side,
        kind: OrderType,
        price: Price,
        limit_price: Option<Price>,
        quantity: Quantity,
        trader: TraderId,
    ) -> Self {
        Self {
            id: OrderId::default(),
            symbol,
            side,
            kind,
            price,
            limit_price,
            original_quantity: quantity,
            filled_quantity: 0,
            remaining_quantity: quantity,
            status: OrderStatus::Pending,
            timestamp: 0,
            trader,
        }
    }

    /// True while the order can still fill or be cancelled.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Apply a fill, updating the quantity triple and status.
    ///
    /// # Panics
    ///
    /// Panics if `quantity` exceeds the remaining quantity (internal
    /// invariant; the matching pass never over-fills).
    pub fn fill(&mut self, quantity: Quantity) {
        assert!(
            quantity <= self.remaining_quantity,
            "fill quantity {} exceeds remaining {}",
            quantity,
            self.remaining_quantity
        );

        self.remaining_quantity -= quantity;
        self.filled_quantity += quantity;
        self.status = if self.remaining_quantity == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    /// Cancel the order; returns the quantity taken off the book.
    ///
    /// # Panics
    ///
    /// Panics if the order is already terminal.
    pub fn cancel(&mut self) -> Quantity {
        assert!(
            self.is_active(),
            "cannot cancel order in terminal state {:?}",
            self.status
        );

        let cancelled = self.remaining_quantity;
        self.remaining_quantity = 0;
        self.status = OrderStatus::Cancelled;
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_order(quantity: Quantity) -> Order {
        Order::limit(
            Symbol::new("AAPL"),
            Side::Buy,
            Price(150_00),
            quantity,
            TraderId::new("T1"),
        )
    }

    #[test]
    fn new_order_initial_state() {
        let order = make_order(100);

        assert_eq!(order.original_quantity, 100);
        assert_eq!(order.remaining_quantity, 100);
        assert_eq!(order.filled_quantity, 0);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.kind, OrderType::Limit);
        assert!(order.is_active());
    }

    #[test]
    fn market_order_has_no_limit_price() {
        let order = Order::market(Symbol::new("AAPL"), Side::Sell, 50, TraderId::new("T1"));
        assert_eq!(order.kind, OrderType::Market);
        assert!(!order.kind.has_limit_price());
        assert_eq!(order.price, Price::ZERO);
    }

    #[test]
    fn stop_limit_carries_both_prices() {
        let order = Order::stop_limit(
            Symbol::new("AAPL"),
            Side::Buy,
            Price(155_00),
            Price(156_00),
            100,
            TraderId::new("T1"),
        );
        assert_eq!(order.price, Price(155_00));
        assert_eq!(order.limit_price, Some(Price(156_00)));
    }

    #[test]
    fn partial_then_full_fill() {
        let mut order = make_order(100);

        order.fill(30);
        assert_eq!(order.remaining_quantity, 70);
        assert_eq!(order.filled_quantity, 30);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);

        order.fill(70);
        assert_eq!(order.remaining_quantity, 0);
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(!order.is_active());
    }

    #[test]
    fn quantity_triple_invariant() {
        let mut order = make_order(100);
        order.fill(30);
        order.fill(50);
        assert_eq!(
            order.original_quantity,
            order.remaining_quantity + order.filled_quantity
        );
    }

    #[test]
    #[should_panic(expected = "exceeds remaining")]
    fn overfill_panics() {
        let mut order = make_order(100);
        order.fill(101);
    }

    #[test]
    fn cancel_returns_remaining() {
        let mut order = make_order(100);
        order.fill(30);

        let cancelled = order.cancel();
        assert_eq!(cancelled, 70);
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.filled_quantity, 30);
    }

    #[test]
    #[should_panic(expected = "terminal state")]
    fn cancel_filled_panics() {
        let mut order = make_order(100);
        order.fill(100);
        order.cancel();
    }

    #[test]
    fn status_classification() {
        assert!(OrderStatus::Pending.is_active());
        assert!(OrderStatus::PartiallyFilled.is_active());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }

    #[test]
    fn side_direction_helpers() {
        // `opposite` pairs the sides symmetrically; `sign` matches the
        // signed-quantity convention used by positions.
        for (side, other, sign) in [(Side::Buy, Side::Sell, 1), (Side::Sell, Side::Buy, -1)] {
            assert_eq!(side.opposite(), other);
            assert_eq!(side.opposite().opposite(), side);
            assert_eq!(side.sign(), sign);
            assert_eq!(side.sign(), -other.sign());
        }
    }

    #[test]
    fn side_renders_csv_names() {
        assert_eq!(Side::Buy.to_string(), "BUY");
        assert_eq!(Side::Sell.to_string(), "SELL");
    }
}
