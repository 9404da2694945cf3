//! Trades and match results.

use crate::orderbook::order::{OrderId, Price, Quantity, Side, TimestampNs};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// One execution between an aggressor and a resting order.
///
/// The price is always the resting order's price (price improvement goes to
/// the aggressor); the timestamp is the later of the two orders' timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Deterministic identifier for this execution
    pub trade_id: Uuid,
    /// The incoming (aggressor) order
    pub taker_order_id: OrderId,
    /// The resting (passive) order
    pub maker_order_id: OrderId,
    /// Side of the aggressor
    pub taker_side: Side,
    /// Execution price: the maker's resting price
    pub price: Price,
    /// Quantity exchanged
    pub quantity: Quantity,
    /// `max(taker.timestamp, maker.timestamp)`
    pub timestamp: TimestampNs,
}

/// Aggregate outcome of submitting a matchable order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// The taker order this result belongs to
    pub order_id: OrderId,
    /// Quantity originally requested
    pub requested_quantity: Quantity,
    /// Quantity left unexecuted (resting for limits, discarded for markets)
    pub remaining_quantity: Quantity,
    /// Executions in emission order
    pub trades: Vec<Trade>,
    /// Resting orders fully consumed by this match
    pub filled_order_ids: Vec<OrderId>,
    /// True when nothing was left unexecuted
    pub is_complete: bool,
}

impl MatchResult {
    /// A result with no executions yet.
    pub fn new(order_id: OrderId, requested_quantity: Quantity) -> Self {
        Self {
            order_id,
            requested_quantity,
            remaining_quantity: requested_quantity,
            trades: Vec::new(),
            filled_order_ids: Vec::new(),
            is_complete: false,
        }
    }

    /// Total quantity executed.
    #[inline]
    pub fn executed_quantity(&self) -> Quantity {
        self.requested_quantity - self.remaining_quantity
    }
}

/// Callback invoked by the book after each match that produced trades.
/// Receives the book's symbol and the match outcome.
pub type TradeListener = Arc<dyn Fn(&str, &MatchResult) + Send + Sync>;

/// Deterministic trade-id source.
///
/// Ids are UUIDv5 of a per-symbol namespace and a monotonic counter, so a
/// replay of the same event stream reproduces the same trade ids.
pub struct TradeIdGenerator {
    namespace: Uuid,
    counter: AtomicU64,
}

impl TradeIdGenerator {
    /// Create a generator namespaced by symbol.
    pub fn new(symbol: &str) -> Self {
        Self {
            namespace: Uuid::new_v5(&Uuid::NAMESPACE_OID, symbol.as_bytes()),
            counter: AtomicU64::new(0),
        }
    }

    /// Next trade id.
    pub fn next_id(&self) -> Uuid {
        let seq = self.counter.fetch_add(1, Ordering::AcqRel);
        Uuid::new_v5(&self.namespace, &seq.to_be_bytes())
    }
}
