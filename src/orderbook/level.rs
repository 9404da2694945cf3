//! A single price level: a FIFO queue of orders sharing one price.
//!
//! Aggregates (`total_quantity`, `order_count`) are kept in atomics so read
//! paths never take the queue lock. The queue itself is interior-mutable,
//! which keeps the whole book behind a `&self` API.

use crate::orderbook::order::{Order, OrderId, Price, Quantity, Side, TimestampNs};
use std::collections::VecDeque;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// One fill produced while matching against a level.
#[derive(Debug, Clone)]
pub struct LevelFill {
    /// The resting (maker) order that was hit
    pub maker_order_id: OrderId,
    /// Quantity matched against that order
    pub quantity: Quantity,
    /// The maker's arrival timestamp
    pub maker_timestamp: TimestampNs,
    /// True when the maker was fully consumed and left the queue
    pub maker_filled: bool,
}

/// Result of [`PriceLevel::match_up_to`].
#[derive(Debug, Clone, Default)]
pub struct LevelMatch {
    /// Per-maker fills in FIFO order
    pub fills: Vec<LevelFill>,
    /// Total quantity executed at this level
    pub executed: Quantity,
}

/// FIFO queue of orders resting at one price on one side.
///
/// Invariants: `total_quantity == sum(order.remaining)` and
/// `order_count == queue length` after every public operation; the front of
/// the queue is the oldest order at the price.
pub struct PriceLevel {
    price: Price,
    side: Side,
    total_quantity: AtomicU64,
    order_count: AtomicU64,
    orders: RwLock<VecDeque<Order>>,
}

/// Recover the guard from a poisoned lock; the queue stays consistent
/// because every mutation completes before the guard drops.
macro_rules! lock {
    ($lock:expr) => {
        $lock.unwrap_or_else(|poisoned| poisoned.into_inner())
    };
}

impl PriceLevel {
    /// Create an empty level.
    pub fn new(price: Price, side: Side) -> Self {
        Self {
            price,
            side,
            total_quantity: AtomicU64::new(0),
            order_count: AtomicU64::new(0),
            orders: RwLock::new(VecDeque::new()),
        }
    }

    /// The price shared by every order in this level.
    #[inline]
    pub fn price(&self) -> Price {
        self.price
    }

    /// The side this level belongs to.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Sum of `remaining` across resting orders.
    #[inline]
    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity.load(Ordering::Acquire)
    }

    /// Number of resting orders.
    #[inline]
    pub fn order_count(&self) -> u64 {
        self.order_count.load(Ordering::Acquire)
    }

    /// True when no orders rest here. Empty levels are erased by the book.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order_count() == 0
    }

    /// Append an order at the tail, preserving time priority.
    pub fn add_order(&self, order: Order) {
        debug_assert_eq!(order.price, self.price);
        debug_assert_eq!(order.side, self.side);

        self.total_quantity
            .fetch_add(order.remaining, Ordering::AcqRel);
        self.order_count.fetch_add(1, Ordering::AcqRel);
        lock!(self.orders.write()).push_back(order);
    }

    /// Unlink an order by id, returning it. The caller erases the level if
    /// this left it empty.
    pub fn remove_order(&self, order_id: OrderId) -> Option<Order> {
        let mut queue = lock!(self.orders.write());
        let position = queue.iter().position(|order| order.id == order_id)?;
        let order = queue.remove(position)?;

        self.total_quantity
            .fetch_sub(order.remaining, Ordering::AcqRel);
        self.order_count.fetch_sub(1, Ordering::AcqRel);
        Some(order)
    }

    /// Write a smaller `remaining` onto an order without moving it in the
    /// queue. Used only for non-increasing changes; returns the updated
    /// order, or `None` when the id is not here or the change would grow it.
    pub fn reduce_order(&self, order_id: OrderId, new_remaining: Quantity) -> Option<Order> {
        let mut queue = lock!(self.orders.write());
        let order = queue.iter_mut().find(|order| order.id == order_id)?;
        if new_remaining > order.remaining {
            return None;
        }

        let delta = order.remaining - new_remaining;
        order.remaining = new_remaining;
        self.total_quantity.fetch_sub(delta, Ordering::AcqRel);
        Some(order.clone())
    }

    /// The oldest resting order, cloned.
    pub fn front(&self) -> Option<Order> {
        lock!(self.orders.read()).front().cloned()
    }

    /// All resting orders in time order, cloned.
    pub fn iter_orders(&self) -> Vec<Order> {
        lock!(self.orders.read()).iter().cloned().collect()
    }

    /// Consume up to `quantity` units from the front of the queue, strict
    /// FIFO. Fully-consumed makers are removed; a partially-consumed maker
    /// stays at the front with its `remaining` reduced.
    pub fn match_up_to(&self, quantity: Quantity) -> LevelMatch {
        let mut result = LevelMatch::default();
        let mut wanted = quantity;
        let mut queue = lock!(self.orders.write());

        while wanted > 0 {
            let Some(maker) = queue.front_mut() else {
                break;
            };
            let match_qty = wanted.min(maker.remaining);
            maker.fill(match_qty);
            wanted -= match_qty;
            result.executed += match_qty;
            self.total_quantity.fetch_sub(match_qty, Ordering::AcqRel);

            let maker_filled = maker.remaining == 0;
            result.fills.push(LevelFill {
                maker_order_id: maker.id,
                quantity: match_qty,
                maker_timestamp: maker.timestamp,
                maker_filled,
            });

            if maker_filled {
                queue.pop_front();
                self.order_count.fetch_sub(1, Ordering::AcqRel);
            }
        }

        result
    }
}

impl std::fmt::Debug for PriceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceLevel")
            .field("price", &self.price)
            .field("side", &self.side)
            .field("total_quantity", &self.total_quantity())
            .field("order_count", &self.order_count())
            .finish()
    }
}
