//! The matching pass: continuous double auction over a crossed book.
//!
//! Rules:
//! 1. While best bid >= best ask and both sides are populated, the front
//!    resting order of each top level trades.
//! 2. Trade quantity = min of the two residuals.
//! 3. Trade price = the maker's limit price, where the maker is the order
//!    that reached the book first (earlier timestamp; ids break ties since
//!    they are assigned in acceptance order).
//! 4. Fully filled orders leave their level; empty levels leave the book.
//!
//! Market orders are never inserted: they sweep the opposite side from the
//! best price until exhausted, one fill per consumed resting order, and any
//! residual is discarded by the caller.

use crate::{Order, OrderBook, OrderId, Price, Quantity, Side, TraderId};

/// One fill produced by a matching pass or a market-order sweep.
///
/// Carries both parties so the engine can build the execution record
/// without re-reading the book.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fill {
    pub price: Price,
    pub quantity: Quantity,
    /// The resting (price-setting) order.
    pub maker_order: OrderId,
    pub maker_trader: TraderId,
    /// The incoming or later-queued order.
    pub taker_order: OrderId,
    pub taker_trader: TraderId,
    /// Side of the taker.
    pub aggressor_side: Side,
}

impl OrderBook {
    /// Run the matching pass until the book is no longer crossed.
    ///
    /// Idempotent on an uncrossed book: returns an empty vec and changes
    /// nothing.
    pub fn uncross(&mut self) -> Vec<Fill> {
        let mut fills = Vec::new();

        loop {
            let (Some(best_bid), Some(best_ask)) = (self.best_bid(), self.best_ask()) else {
                break;
            };
            if best_bid < best_ask {
                break;
            }

            let bid_id = self
                .bids()
                .best_level()
                .and_then(|l| l.front())
                .expect("crossed book has a front bid");
            let ask_id = self
                .asks()
                .best_level()
                .and_then(|l| l.front())
                .expect("crossed book has a front ask");

            let bid = self.order(bid_id).expect("front bid exists in index");
            let ask = self.order(ask_id).expect("front ask exists in index");

            // Maker = whichever order reached the book first. Ids advance in
            // acceptance order, so they break timestamp ties.
            let bid_is_maker = (bid.timestamp, bid.id) < (ask.timestamp, ask.id);
            let quantity = bid.remaining_quantity.min(ask.remaining_quantity);
            let (price, maker_order, maker_trader, taker_order, taker_trader, aggressor_side) =
                if bid_is_maker {
                    (best_bid, bid_id, bid.trader, ask_id, ask.trader, Side::Sell)
                } else {
                    (best_ask, ask_id, ask.trader, bid_id, bid.trader, Side::Buy)
                };

            self.apply_fill(bid_id, quantity);
            self.apply_fill(ask_id, quantity);
            self.record_trade_price(price);

            fills.push(Fill {
                price,
                quantity,
                maker_order,
                maker_trader,
                taker_order,
                taker_trader,
                aggressor_side,
            });
        }

        fills
    }

    /// Sweep a market order against the opposite side.
    ///
    /// Fills `taker` at the best available prices, one fill per consumed
    /// resting order, until its quantity is exhausted or the opposite side
    /// empties. The taker is mutated in place; its unfilled residual is the
    /// caller's to discard.
    pub fn sweep_market(&mut self, taker: &mut Order) -> Vec<Fill> {
        let mut fills = Vec::new();
        let opposite = taker.side.opposite();

        while taker.remaining_quantity > 0 {
            let Some(maker_id) = self.side(opposite).best_level().and_then(|l| l.front()) else {
                break;
            };
            let maker = self.order(maker_id).expect("front order exists in index");
            let price = maker.price;
            let maker_trader = maker.trader;
            let quantity = taker.remaining_quantity.min(maker.remaining_quantity);

            taker.fill(quantity);
            self.apply_fill(maker_id, quantity);
            self.record_trade_price(price);

            fills.push(Fill {
                price,
                quantity,
                maker_order: maker_id,
                maker_trader,
                taker_order: taker.id,
                taker_trader: taker.trader,
                aggressor_side: taker.side,
            });
        }

        fills
    }

    /// Fill a resting order, keeping its level slot in step with the
    /// central index. Fills always land on the front of the top level.
    fn apply_fill(&mut self, order_id: OrderId, quantity: Quantity) {
        let order = self.order_mut(order_id).expect("filling a known order");
        order.fill(quantity);
        let (side, price) = (order.side, order.price);

        let updated = self.side_mut(side).fill_front(price, order_id, quantity);
        debug_assert!(updated, "fill target was not at the front of its level");
    }
}
