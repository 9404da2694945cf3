//! Core order types shared by the book and the simulation engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer price in ticks. The engine is unit-agnostic; conversion to and
/// from floating point happens only at the boundary helpers in [`crate::utils`].
pub type Price = u128;

/// Order quantity in units.
pub type Quantity = u64;

/// Unique 64-bit order identifier.
pub type OrderId = u64;

/// Event-stream timestamp in nanoseconds. Time is injected by the data feed;
/// nothing in the core reads the system clock.
pub type TimestampNs = u64;

/// Side of the book an order rests on (or would rest on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side
    Bid,
    /// Sell side
    Ask,
}

impl Side {
    /// The side an aggressor on this side matches against.
    #[inline]
    pub fn opposite(&self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "BID"),
            Side::Ask => write!(f, "ASK"),
        }
    }
}

/// The kind of an order.
///
/// `Limit` and `Market` are handled by the book directly. `Stop` and
/// `StopLimit` are parked by the simulation engine and re-enter as market or
/// limit orders when their trigger touches; the book itself rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Rests at its price; matches while crossed.
    Limit,
    /// Fills against the opposite side, remainder discarded (IOC).
    Market,
    /// Parked until the mark touches `stop_price`, then becomes a market order.
    Stop,
    /// Parked until the mark touches `stop_price`, then becomes a limit order
    /// at the order's `price`.
    StopLimit,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Limit => write!(f, "LIMIT"),
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Stop => write!(f, "STOP"),
            OrderKind::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

/// Time-in-force policy for resting orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeInForce {
    /// Good till cancelled
    #[default]
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Fill or kill
    Fok,
    /// Good till date
    Gtd,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Gtc => write!(f, "GTC"),
            TimeInForce::Ioc => write!(f, "IOC"),
            TimeInForce::Fok => write!(f, "FOK"),
            TimeInForce::Gtd => write!(f, "GTD"),
        }
    }
}

/// Lifecycle state of an order. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted, nothing filled yet
    New,
    /// Some quantity filled, some still resting
    PartiallyFilled,
    /// Fully filled
    Filled,
    /// Cancelled before completion
    Cancelled,
}

/// A single order.
///
/// Orders are owned by the price level they rest in; everything else refers
/// to them by id or receives clones. `remaining` is the only field the book
/// mutates after placement (fills and in-place reductions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier
    pub id: OrderId,
    /// Bid or Ask
    pub side: Side,
    /// Limit, Market, Stop or StopLimit
    pub kind: OrderKind,
    /// Time-in-force policy
    pub time_in_force: TimeInForce,
    /// Limit price in ticks. Ignored for market orders.
    pub price: Price,
    /// Trigger price for Stop / StopLimit orders
    pub stop_price: Option<Price>,
    /// Original quantity
    pub quantity: Quantity,
    /// Quantity still resting. `0 <= remaining <= quantity`.
    pub remaining: Quantity,
    /// Timestamp from the event stream, nanoseconds
    pub timestamp: TimestampNs,
    /// Opaque client tag
    pub client_id: u64,
    /// Lifecycle state
    pub status: OrderStatus,
}

impl Order {
    /// Create a limit order.
    pub fn limit(
        id: OrderId,
        side: Side,
        price: Price,
        quantity: Quantity,
        timestamp: TimestampNs,
    ) -> Self {
        Self {
            id,
            side,
            kind: OrderKind::Limit,
            time_in_force: TimeInForce::Gtc,
            price,
            stop_price: None,
            quantity,
            remaining: quantity,
            timestamp,
            client_id: 0,
            status: OrderStatus::New,
        }
    }

    /// Create a market order. The price field is zero and ignored.
    pub fn market(id: OrderId, side: Side, quantity: Quantity, timestamp: TimestampNs) -> Self {
        Self {
            id,
            side,
            kind: OrderKind::Market,
            time_in_force: TimeInForce::Ioc,
            price: 0,
            stop_price: None,
            quantity,
            remaining: quantity,
            timestamp,
            client_id: 0,
            status: OrderStatus::New,
        }
    }

    /// Create a stop order that triggers at `stop_price`.
    pub fn stop(
        id: OrderId,
        side: Side,
        stop_price: Price,
        quantity: Quantity,
        timestamp: TimestampNs,
    ) -> Self {
        Self {
            id,
            side,
            kind: OrderKind::Stop,
            time_in_force: TimeInForce::Gtc,
            price: 0,
            stop_price: Some(stop_price),
            quantity,
            remaining: quantity,
            timestamp,
            client_id: 0,
            status: OrderStatus::New,
        }
    }

    /// Create a stop-limit order: triggers at `stop_price`, rests at `price`.
    pub fn stop_limit(
        id: OrderId,
        side: Side,
        stop_price: Price,
        price: Price,
        quantity: Quantity,
        timestamp: TimestampNs,
    ) -> Self {
        Self {
            id,
            side,
            kind: OrderKind::StopLimit,
            time_in_force: TimeInForce::Gtc,
            price,
            stop_price: Some(stop_price),
            quantity,
            remaining: quantity,
            timestamp,
            client_id: 0,
            status: OrderStatus::New,
        }
    }

    /// Attach a client tag.
    pub fn with_client_id(mut self, client_id: u64) -> Self {
        self.client_id = client_id;
        self
    }

    /// Attach a time-in-force policy.
    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    /// Quantity filled so far.
    #[inline]
    pub fn filled(&self) -> Quantity {
        self.quantity - self.remaining
    }

    /// An order is active while it still rests and is not in a terminal state.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.remaining > 0
            && matches!(self.status, OrderStatus::New | OrderStatus::PartiallyFilled)
    }

    /// Apply a fill of `quantity` units. Saturates at zero remaining and
    /// moves the status along `New -> PartiallyFilled -> Filled`.
    pub(crate) fn fill(&mut self, quantity: Quantity) {
        self.remaining = self.remaining.saturating_sub(quantity);
        self.status = if self.remaining == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}@{} ({}/{} resting)",
            self.id, self.kind, self.side, self.quantity, self.price, self.remaining, self.quantity
        )
    }
}
