//! OrderBook: the per-symbol limit order book.
//!
//! The book is a pure data structure: `insert` never matches, even at a
//! crossing price. Uncrossing is an explicit step owned by the matching
//! engine (see the `matching` module), which keeps the book testable in
//! isolation and the matching semantics in one place.

use rustc_hash::FxHashMap;

use crate::{Order, OrderId, Price, PriceLevels, Quantity, Side, Symbol, Timestamp};

/// A single symbol's order book.
///
/// Holds both sides, a central index of every order ever accepted (active
/// and historical), the cached best prices, the last trade price, and a
/// monotonic sequence number advanced by every mutation.
#[derive(Clone, Debug)]
pub struct OrderBook {
    symbol: Symbol,
    bids: PriceLevels,
    asks: PriceLevels,
    /// Every order accepted by this book, keyed by id. Terminal orders stay
    /// for history and idempotent cancels.
    orders: FxHashMap<OrderId, Order>,
    last_trade_price: Option<Price>,
    sequence: u64,
}

impl OrderBook {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: PriceLevels::new(Side::Buy),
            asks: PriceLevels::new(Side::Sell),
            orders: FxHashMap::default(),
            last_trade_price: None,
            sequence: 0,
        }
    }

    #[inline]
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    // === Queries ===

    /// Best bid (highest resting buy price). `None` when the side is empty.
    #[inline]
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    /// Best ask (lowest resting sell price). `None` when the side is empty.
    #[inline]
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    /// Last price at which this symbol traded.
    #[inline]
    pub fn last_trade_price(&self) -> Option<Price> {
        self.last_trade_price
    }

    /// Mid price in cents: the mean of the bests when both sides are
    /// populated, otherwise the last trade price.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.0 + ask.0) as f64 / 2.0),
            _ => self.last_trade_price.map(|p| p.0 as f64),
        }
    }

    /// Spread in cents; 0 unless both sides are populated.
    pub fn spread(&self) -> i64 {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask.0 - bid.0,
            _ => 0,
        }
    }

    /// True while the bests cross (bid >= ask). A matching pass must leave
    /// this false.
    pub fn is_crossed(&self) -> bool {
        matches!(
            (self.best_bid(), self.best_ask()),
            (Some(bid), Some(ask)) if bid >= ask
        )
    }

    pub fn bids(&self) -> &PriceLevels {
        &self.bids
    }

    pub fn asks(&self) -> &PriceLevels {
        &self.asks
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub(crate) fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(&id)
    }

    /// Number of orders currently live on the book.
    pub fn active_order_count(&self) -> usize {
        self.orders.values().filter(|o| o.is_active()).count()
    }

    pub(crate) fn side(&self, side: Side) -> &PriceLevels {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub(crate) fn side_mut(&mut self, side: Side) -> &mut PriceLevels {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    // === Mutations ===

    /// Rest an order on the book.
    ///
    /// The order must already carry its engine-assigned id and acceptance
    /// timestamp. Inserting at a crossing price is allowed — the book stays
    /// crossed until the matching engine runs its pass.
    ///
    /// # Panics
    ///
    /// Panics if an order with the same id was already accepted (engine ids
    /// are unique; a duplicate is a programmer error).
    pub fn insert(&mut self, order: Order) {
        assert!(
            !self.orders.contains_key(&order.id),
            "order {} already on book",
            order.id
        );
        self.sequence += 1;

        let (side, price, remaining, id) =
            (order.side, order.price, order.remaining_quantity, order.id);
        self.orders.insert(id, order);
        self.side_mut(side).enqueue_order(price, id, remaining);
    }

    /// Cancel a resting order, removing its remaining quantity.
    ///
    /// Idempotent: unknown ids and already-terminal orders return `None`
    /// with no state change.
    pub fn cancel(&mut self, order_id: OrderId) -> Option<Quantity> {
        let order = self.orders.get_mut(&order_id)?;
        if !order.is_active() {
            return None;
        }
        self.sequence += 1;

        let (side, price) = (order.side, order.price);
        let remaining = order.cancel();
        self.side_mut(side).remove_order(price, order_id);
        Some(remaining)
    }

    /// Modify = atomic cancel-then-re-add with the new attributes.
    ///
    /// The order keeps its id but receives the supplied fresh timestamp and
    /// joins the back of the queue at the new price: a modify always
    /// forfeits time priority. Fill progress does not carry over; the
    /// re-queued order is a fresh `new_quantity` at `new_price`.
    ///
    /// Returns false (no state change) for unknown or terminal orders.
    pub fn modify(
        &mut self,
        order_id: OrderId,
        new_price: Price,
        new_quantity: Quantity,
        timestamp: Timestamp,
    ) -> bool {
        let Some(order) = self.orders.get(&order_id) else {
            return false;
        };
        if !order.is_active() {
            return false;
        }
        let (side, old_price) = (order.side, order.price);

        self.sequence += 1;
        self.side_mut(side).remove_order(old_price, order_id);

        let order = self.orders.get_mut(&order_id).expect("checked above");
        order.price = new_price;
        order.original_quantity = new_quantity;
        order.filled_quantity = 0;
        order.remaining_quantity = new_quantity;
        order.status = crate::OrderStatus::Pending;
        order.timestamp = timestamp;

        self.side_mut(side).enqueue_order(new_price, order_id, new_quantity);
        true
    }

    /// Record a trade print (used by the matching pass and stop triggers).
    pub(crate) fn record_trade_price(&mut self, price: Price) {
        self.last_trade_price = Some(price);
    }

    // === Depth ===

    /// Top-`k` levels per side, best first, each with price and aggregate
    /// quantity.
    pub fn depth(&self, k: usize) -> DepthSnapshot {
        fn take(levels: &PriceLevels, k: usize) -> Vec<DepthLevel> {
            levels
                .iter_best_first()
                .take(k)
                .map(|(price, level)| DepthLevel {
                    price: *price,
                    quantity: level.total_quantity(),
                    order_count: level.order_count(),
                })
                .collect()
        }

        DepthSnapshot {
            symbol: self.symbol,
            bids: take(&self.bids, k),
            asks: take(&self.asks, k),
        }
    }
}

/// One aggregated price level in a depth snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    pub quantity: Quantity,
    pub order_count: usize,
}

/// Top-of-book depth for one symbol.
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct DepthSnapshot {
    pub symbol: Symbol,
    /// Best (highest) bid first.
    pub bids: Vec<DepthLevel>,
    /// Best (lowest) ask first.
    pub asks: Vec<DepthLevel>,
}

impl DepthSnapshot {
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|l| l.price)
    }
}
