//! Simulation events and the timestamp-ordered queue.

use crate::orderbook::order::{Order, OrderId, Price, Quantity, Side, TimestampNs};
use crate::orderbook::trade::Trade;
use crate::signals::Signal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One market-data record from the feed.
///
/// `Trade` and `Snapshot` variants are informational: the feed's own
/// add/modify/cancel stream is authoritative for book reconstruction, so
/// they never mutate the book. `NoOp` is the best-effort product of an
/// unparsable feed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketDataUpdate {
    /// Reconstruct a resting order with the feed's id.
    AddOrder {
        /// Feed-assigned order id
        order_id: OrderId,
        /// Side of the new order
        side: Side,
        /// Limit price in ticks
        price: Price,
        /// Order quantity
        quantity: Quantity,
    },
    /// Change an existing order's quantity and optionally its price.
    ModifyOrder {
        /// Order to modify
        order_id: OrderId,
        /// New resting quantity (0 cancels)
        new_quantity: Quantity,
        /// New price, when the feed re-prices the order
        new_price: Option<Price>,
    },
    /// Remove an existing order.
    CancelOrder {
        /// Order to remove
        order_id: OrderId,
    },
    /// A trade reported by the feed. Informational.
    Trade {
        /// Aggressor side as reported by the feed
        side: Side,
        /// Trade price
        price: Price,
        /// Trade quantity
        quantity: Quantity,
    },
    /// Wipe all book state for the symbol.
    Clear,
    /// A depth snapshot reported by the feed. Informational.
    Snapshot {
        /// Bid levels, best first, as (price, quantity)
        bids: Vec<(Price, Quantity)>,
        /// Ask levels, best first, as (price, quantity)
        asks: Vec<(Price, Quantity)>,
    },
    /// A row the feed could not interpret. Dispatched and ignored.
    NoOp,
}

/// The payload of a simulation event.
#[derive(Debug, Clone)]
pub enum EventPayload {
    /// A market-data record to route into the symbol's book
    MarketData(MarketDataUpdate),
    /// A signal observation for the strategies
    Signal(Signal),
    /// A strategy-originated order entering the engine
    Order(Order),
    /// An execution to apply to the portfolio
    Fill(Trade),
    /// End-of-day marker: snapshot the portfolio
    EndOfDay,
}

/// A timestamped, symbol-tagged event.
///
/// Ordering compares only the timestamp; the queue adds an insertion
/// sequence so same-timestamp events dispatch in arrival order.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event-stream timestamp, nanoseconds
    pub timestamp: TimestampNs,
    /// The symbol this event concerns; empty for EndOfDay markers
    pub symbol: String,
    /// What happened
    pub payload: EventPayload,
}

impl Event {
    /// A market-data event.
    pub fn market_data(
        timestamp: TimestampNs,
        symbol: impl Into<String>,
        update: MarketDataUpdate,
    ) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            payload: EventPayload::MarketData(update),
        }
    }

    /// A signal event.
    pub fn signal(timestamp: TimestampNs, symbol: impl Into<String>, signal: Signal) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            payload: EventPayload::Signal(signal),
        }
    }

    /// A strategy order event.
    pub fn order(timestamp: TimestampNs, symbol: impl Into<String>, order: Order) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            payload: EventPayload::Order(order),
        }
    }

    /// A fill event.
    pub fn fill(timestamp: TimestampNs, symbol: impl Into<String>, trade: Trade) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            payload: EventPayload::Fill(trade),
        }
    }

    /// An end-of-day marker.
    pub fn end_of_day(timestamp: TimestampNs) -> Self {
        Self {
            timestamp,
            symbol: String::new(),
            payload: EventPayload::EndOfDay,
        }
    }
}

/// Heap entry: `(timestamp, seq)` forms the total order.
struct QueuedEvent {
    event: Event,
    seq: u64,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.event.timestamp == other.event.timestamp && self.seq == other.seq
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap pops the earliest (timestamp, seq).
        (other.event.timestamp, other.seq).cmp(&(self.event.timestamp, self.seq))
    }
}

/// Min-heap of events keyed by `(timestamp, insertion_seq)`.
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<QueuedEvent>,
    next_seq: u64,
}

impl EventQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an event. Same-timestamp events pop in push order.
    pub fn push(&mut self, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedEvent { event, seq });
    }

    /// Remove and return the earliest event.
    pub fn pop(&mut self) -> Option<Event> {
        self.heap.pop().map(|queued| queued.event)
    }

    /// Timestamp of the earliest event without removing it.
    pub fn peek_timestamp(&self) -> Option<TimestampNs> {
        self.heap.peek().map(|queued| queued.event.timestamp)
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
