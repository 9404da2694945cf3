//! Order book operations like adding, modifying and canceling orders

use super::book::OrderBook;
use super::error::OrderBookError;
use super::order::{
    Order, OrderId, OrderKind, OrderStatus, Price, Quantity, Side, TimeInForce, TimestampNs,
};
use super::trade::MatchResult;
use std::sync::Arc;
use tracing::trace;

impl OrderBook {
    /// Add a fully-formed order to the book.
    ///
    /// Limit orders match while they cross and rest any remainder; market
    /// orders fill what they can and discard the rest (IOC). Stop and
    /// StopLimit orders are rejected here; they are parked and activated
    /// by the simulation engine, not the book.
    ///
    /// # Errors
    /// [`OrderBookError::InvalidQuantity`] for zero quantity,
    /// [`OrderBookError::InvalidPrice`] / [`OrderBookError::InvalidTickSize`]
    /// for bad limit prices, [`OrderBookError::DuplicateOrderId`] when the id
    /// is already resting, and [`OrderBookError::UnsupportedOrderKind`] for
    /// stop kinds. A failed operation leaves the book untouched.
    pub fn add_order(&self, order: Order) -> Result<MatchResult, OrderBookError> {
        let op_start = std::time::Instant::now();
        let result = self.add_order_inner(order);
        self.stats.record_latency(op_start.elapsed());
        result
    }

    fn add_order_inner(&self, order: Order) -> Result<MatchResult, OrderBookError> {
        match order.kind {
            OrderKind::Limit => {
                self.validate_limit(&order)?;
                trace!(
                    "Adding limit order {} {} {} {} {}",
                    order.id, order.price, order.quantity, order.side, order.time_in_force
                );
                self.stats.record_add();
                Ok(self.execute_limit(order))
            }
            OrderKind::Market => {
                if order.quantity == 0 {
                    self.stats.record_reject();
                    return Err(OrderBookError::InvalidQuantity {
                        order_id: order.id,
                        quantity: 0,
                    });
                }
                trace!(
                    "Submitting market order {} {} {}",
                    order.id, order.quantity, order.side
                );
                self.stats.record_add();
                self.observe_order_id(order.id);
                Ok(self.match_order(order.id, order.side, order.quantity, None, order.timestamp))
            }
            kind @ (OrderKind::Stop | OrderKind::StopLimit) => {
                self.stats.record_reject();
                Err(OrderBookError::UnsupportedOrderKind { kind })
            }
        }
    }

    /// Add a limit order to the book.
    pub fn add_limit_order(
        &self,
        id: OrderId,
        price: Price,
        quantity: Quantity,
        side: Side,
        time_in_force: TimeInForce,
        timestamp: TimestampNs,
    ) -> Result<MatchResult, OrderBookError> {
        self.add_order(
            Order::limit(id, side, price, quantity, timestamp).with_time_in_force(time_in_force),
        )
    }

    /// Submit a market order: fill up to `quantity` against the opposite
    /// side, discard any remainder. An empty opposite side yields an empty
    /// result, not an error.
    pub fn submit_market_order(
        &self,
        id: OrderId,
        quantity: Quantity,
        side: Side,
        timestamp: TimestampNs,
    ) -> Result<MatchResult, OrderBookError> {
        self.add_order(Order::market(id, side, quantity, timestamp))
    }

    /// Cancel a resting order by id.
    ///
    /// Unlinks the order from its level, erases the level if it emptied and
    /// returns the order in `Cancelled` state.
    ///
    /// # Errors
    /// [`OrderBookError::OrderNotFound`] when the id is not resting.
    pub fn cancel_order(&self, order_id: OrderId) -> Result<Order, OrderBookError> {
        let op_start = std::time::Instant::now();
        let result = self.cancel_order_inner(order_id);
        self.stats.record_latency(op_start.elapsed());
        result
    }

    fn cancel_order_inner(&self, order_id: OrderId) -> Result<Order, OrderBookError> {
        let Some((_, (price, side))) = self.order_locations.remove(&order_id) else {
            return Err(OrderBookError::OrderNotFound(order_id));
        };

        let levels = match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };

        let Some(entry) = levels.get(&price) else {
            return Err(OrderBookError::OrderNotFound(order_id));
        };
        let Some(mut order) = entry.value().remove_order(order_id) else {
            return Err(OrderBookError::OrderNotFound(order_id));
        };
        if entry.value().is_empty() {
            levels.remove(&price);
        }

        order.status = OrderStatus::Cancelled;
        self.stats.record_cancel();
        self.cache.invalidate();
        trace!("Cancelled order {} on {}", order_id, self.symbol);
        Ok(order)
    }

    /// Modify a resting order.
    ///
    /// Reducing the quantity at an unchanged price rewrites the order in
    /// place and keeps its queue position. Raising the quantity or moving
    /// the price re-enters the order at the tail of its (new) level, losing
    /// priority and matching immediately if the new price crosses.
    /// `new_quantity == 0` is a cancel.
    ///
    /// # Errors
    /// [`OrderBookError::OrderNotFound`] when the id is not resting; price
    /// validation errors when re-pricing onto an invalid price.
    pub fn modify_order(
        &self,
        order_id: OrderId,
        new_price: Option<Price>,
        new_quantity: Quantity,
        timestamp: TimestampNs,
    ) -> Result<MatchResult, OrderBookError> {
        let op_start = std::time::Instant::now();
        let result = self.modify_order_inner(order_id, new_price, new_quantity, timestamp);
        self.stats.record_latency(op_start.elapsed());
        result
    }

    fn modify_order_inner(
        &self,
        order_id: OrderId,
        new_price: Option<Price>,
        new_quantity: Quantity,
        timestamp: TimestampNs,
    ) -> Result<MatchResult, OrderBookError> {
        let Some(location) = self.order_locations.get(&order_id) else {
            return Err(OrderBookError::OrderNotFound(order_id));
        };
        let (price, side) = *location;
        drop(location);

        if new_quantity == 0 {
            self.cancel_order(order_id)?;
            let mut result = MatchResult::new(order_id, 0);
            result.is_complete = true;
            return Ok(result);
        }

        let target_price = new_price.unwrap_or(price);

        // Reduce-in-place path: same price, non-increasing quantity.
        if target_price == price {
            let levels = match side {
                Side::Bid => &self.bids,
                Side::Ask => &self.asks,
            };
            if let Some(entry) = levels.get(&price)
                && entry.value().reduce_order(order_id, new_quantity).is_some()
            {
                trace!(
                    "Reduced order {} to {} in place on {}",
                    order_id, new_quantity, self.symbol
                );
                self.stats.record_modify();
                self.cache.invalidate();
                let mut result = MatchResult::new(order_id, 0);
                result.is_complete = true;
                return Ok(result);
            }
        }

        // Replace path: unlink and re-enter at the tail of the new level.
        let removed = self.unlink_order(order_id, price, side)?;
        let replacement = Order {
            id: order_id,
            side,
            kind: OrderKind::Limit,
            time_in_force: removed.time_in_force,
            price: target_price,
            stop_price: None,
            quantity: new_quantity,
            remaining: new_quantity,
            timestamp,
            client_id: removed.client_id,
            status: OrderStatus::New,
        };

        if let Err(error) = self.validate_limit(&replacement) {
            // Validation failed after the unlink: put the original back.
            self.rest_order(removed);
            return Err(error);
        }

        trace!(
            "Replaced order {} at {}x{} on {}",
            order_id, target_price, new_quantity, self.symbol
        );
        self.stats.record_modify();
        Ok(self.execute_limit(replacement))
    }

    /// Validation shared by the limit add and replace paths.
    fn validate_limit(&self, order: &Order) -> Result<(), OrderBookError> {
        if order.quantity == 0 {
            self.stats.record_reject();
            return Err(OrderBookError::InvalidQuantity {
                order_id: order.id,
                quantity: 0,
            });
        }
        if order.price == 0 {
            self.stats.record_reject();
            return Err(OrderBookError::InvalidPrice { price: 0 });
        }
        if !order.price.is_multiple_of(self.tick_size) {
            self.stats.record_reject();
            return Err(OrderBookError::InvalidTickSize {
                price: order.price,
                tick_size: self.tick_size,
            });
        }
        if self.order_locations.contains_key(&order.id) {
            self.stats.record_reject();
            return Err(OrderBookError::DuplicateOrderId(order.id));
        }
        Ok(())
    }

    /// Match a validated limit order and rest whatever remains.
    fn execute_limit(&self, order: Order) -> MatchResult {
        self.observe_order_id(order.id);

        // Fill-or-kill probes the book first; anything short of a full fill
        // executes nothing.
        if order.time_in_force == TimeInForce::Fok
            && self.peek_match(order.side, order.quantity, Some(order.price)) < order.quantity
        {
            return MatchResult::new(order.id, order.quantity);
        }

        let result = self.match_order(
            order.id,
            order.side,
            order.quantity,
            Some(order.price),
            order.timestamp,
        );

        let rests = result.remaining_quantity > 0
            && !matches!(order.time_in_force, TimeInForce::Ioc | TimeInForce::Fok);
        if rests {
            let mut resting = order;
            resting.remaining = result.remaining_quantity;
            if resting.remaining < resting.quantity {
                resting.status = OrderStatus::PartiallyFilled;
            }
            self.rest_order(resting);
        }

        result
    }

    /// Place an order at the tail of its level, creating the level if this
    /// is the first order at that price.
    fn rest_order(&self, order: Order) {
        let levels = match order.side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };

        let level = levels
            .get_or_insert_with(order.price, || {
                Arc::new(super::level::PriceLevel::new(order.price, order.side))
            })
            .value()
            .clone();

        self.order_locations
            .insert(order.id, (order.price, order.side));
        level.add_order(order);
        self.cache.invalidate();
    }

    /// Unlink a resting order without counting it as a cancellation.
    fn unlink_order(
        &self,
        order_id: OrderId,
        price: Price,
        side: Side,
    ) -> Result<Order, OrderBookError> {
        let levels = match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };

        let Some(entry) = levels.get(&price) else {
            return Err(OrderBookError::OrderNotFound(order_id));
        };
        let Some(order) = entry.value().remove_order(order_id) else {
            return Err(OrderBookError::OrderNotFound(order_id));
        };
        if entry.value().is_empty() {
            levels.remove(&price);
        }
        self.order_locations.remove(&order_id);
        self.cache.invalidate();
        Ok(order)
    }
}
