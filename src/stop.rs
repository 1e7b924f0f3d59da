//! Stop orders: conditional orders triggered by the trade price.
//!
//! Stop and stop-limit orders rest in a separate per-symbol book until the
//! last trade price reaches their stop price. On trigger they re-enter the
//! intake path as ordinary market or limit orders (same id, same trader,
//! fresh timestamp).
//!
//! Trigger rules: buy stops fire when `last_trade >= stop_price`, sell
//! stops when `last_trade <= stop_price`.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::{OrderId, Price, Quantity, Side, Timestamp, TraderId};

/// Lifecycle of a stop order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[derive(serde::Serialize, serde::Deserialize)]
pub enum StopStatus {
    /// Waiting for the trigger price.
    Pending,
    /// Stop price reached; the converted order went to the book.
    Triggered,
    /// Cancelled before triggering.
    Cancelled,
}

/// A stop order waiting to trigger.
#[derive(Clone, Debug)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct StopOrder {
    /// Shares the regular order id space.
    pub id: OrderId,
    pub side: Side,
    pub stop_price: Price,
    /// Limit price applied after trigger; `None` = stop-market.
    pub limit_price: Option<Price>,
    pub quantity: Quantity,
    pub timestamp: Timestamp,
    pub trader: TraderId,
    pub status: StopStatus,
}

/// Pending stop orders for one symbol, indexed for trigger sweeps.
#[derive(Clone, Debug, Default)]
pub struct StopBook {
    /// Buy stops by stop price (trigger at trade >= price).
    buy_stops: BTreeMap<Price, Vec<OrderId>>,
    /// Sell stops by stop price (trigger at trade <= price).
    sell_stops: BTreeMap<Price, Vec<OrderId>>,
    orders: FxHashMap<OrderId, StopOrder>,
}

impl StopBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rest a stop order until its trigger.
    pub fn insert(&mut self, order: StopOrder) {
        let (id, price, side) = (order.id, order.stop_price, order.side);
        self.side_index(side).entry(price).or_default().push(id);
        self.orders.insert(id, order);
    }

    /// Cancel a pending stop. Returns the resting quantity if it was pending.
    pub fn cancel(&mut self, order_id: OrderId) -> Option<Quantity> {
        let order = self.orders.get_mut(&order_id)?;
        if order.status != StopStatus::Pending {
            return None;
        }
        order.status = StopStatus::Cancelled;
        let (price, side, quantity) = (order.stop_price, order.side, order.quantity);

        let index = self.side_index(side);
        if let Some(ids) = index.get_mut(&price) {
            ids.retain(|id| *id != order_id);
            if ids.is_empty() {
                index.remove(&price);
            }
        }
        Some(quantity)
    }

    /// Collect every stop fired by a trade at `trade_price`, in submission
    /// order (FIFO by timestamp). Fired stops leave the pending index.
    pub fn collect_triggered(&mut self, trade_price: Price) -> Vec<StopOrder> {
        let mut triggered = Vec::new();

        let buy_keys: Vec<Price> = self.buy_stops.range(..=trade_price).map(|(k, _)| *k).collect();
        for key in buy_keys {
            if let Some(ids) = self.buy_stops.remove(&key) {
                triggered.extend(self.mark_triggered(ids));
            }
        }

        let sell_keys: Vec<Price> = self.sell_stops.range(trade_price..).map(|(k, _)| *k).collect();
        for key in sell_keys {
            if let Some(ids) = self.sell_stops.remove(&key) {
                triggered.extend(self.mark_triggered(ids));
            }
        }

        triggered.sort_by_key(|o| (o.timestamp, o.id));
        triggered
    }

    pub fn get(&self, order_id: OrderId) -> Option<&StopOrder> {
        self.orders.get(&order_id)
    }

    /// Trader that owns a pending stop, if the id names one.
    pub fn owner(&self, order_id: OrderId) -> Option<TraderId> {
        self.orders
            .get(&order_id)
            .filter(|o| o.status == StopStatus::Pending)
            .map(|o| o.trader)
    }

    pub fn pending_count(&self) -> usize {
        self.buy_stops.values().map(Vec::len).sum::<usize>()
            + self.sell_stops.values().map(Vec::len).sum::<usize>()
    }

    fn side_index(&mut self, side: Side) -> &mut BTreeMap<Price, Vec<OrderId>> {
        match side {
            Side::Buy => &mut self.buy_stops,
            Side::Sell => &mut self.sell_stops,
        }
    }

    fn mark_triggered(&mut self, ids: Vec<OrderId>) -> Vec<StopOrder> {
        ids.into_iter()
            .filter_map(|id| {
                let order = self.orders.get_mut(&id)?;
                if order.status != StopStatus::Pending {
                    return None;
                }
                order.status = StopStatus::Triggered;
                Some(order.clone())
            })
            .collect()
    }
}
