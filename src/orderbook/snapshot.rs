//! Order book snapshot for market data

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::trace;

use super::book::OrderBook;
use super::order::{Order, Price, Quantity, Side, TimestampNs};

/// A snapshot of one price level, best-first within its side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelSnapshot {
    /// Level price in ticks
    pub price: Price,
    /// Sum of resting `remaining`
    pub total_quantity: Quantity,
    /// Number of resting orders
    pub order_count: u64,
    /// Resting orders in time order
    pub orders: Vec<Order>,
}

/// A snapshot of the order book state at a specific point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// The symbol or identifier for this order book
    pub symbol: String,

    /// Event-stream timestamp the snapshot was taken at
    pub timestamp: TimestampNs,

    /// Bid levels, best (highest) first
    pub bids: Vec<LevelSnapshot>,

    /// Ask levels, best (lowest) first
    pub asks: Vec<LevelSnapshot>,
}

impl OrderBookSnapshot {
    /// Get the best bid price and quantity
    pub fn best_bid(&self) -> Option<(Price, Quantity)> {
        self.bids
            .first()
            .map(|level| (level.price, level.total_quantity))
    }

    /// Get the best ask price and quantity
    pub fn best_ask(&self) -> Option<(Price, Quantity)> {
        self.asks
            .first()
            .map(|level| (level.price, level.total_quantity))
    }

    /// Get the mid price (average of best bid and best ask)
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some((bid as f64 + ask as f64) / 2.0),
            _ => None,
        }
    }

    /// Get the spread (best ask - best bid)
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask.saturating_sub(bid)),
            _ => None,
        }
    }

    /// Calculate the total volume on the bid side
    pub fn total_bid_volume(&self) -> Quantity {
        self.bids.iter().map(|level| level.total_quantity).sum()
    }

    /// Calculate the total volume on the ask side
    pub fn total_ask_volume(&self) -> Quantity {
        self.asks.iter().map(|level| level.total_quantity).sum()
    }
}

impl OrderBook {
    /// Take a full-depth snapshot of the book, levels best-first.
    pub fn snapshot(&self, timestamp: TimestampNs) -> OrderBookSnapshot {
        let capture = |side: Side| -> Vec<LevelSnapshot> {
            let levels = match side {
                Side::Bid => &self.bids,
                Side::Ask => &self.asks,
            };
            let iter: Box<dyn Iterator<Item = _>> = match side {
                Side::Bid => Box::new(levels.iter().rev()),
                Side::Ask => Box::new(levels.iter()),
            };
            iter.map(|entry| LevelSnapshot {
                price: *entry.key(),
                total_quantity: entry.value().total_quantity(),
                order_count: entry.value().order_count(),
                orders: entry.value().iter_orders(),
            })
            .collect()
        };

        trace!("Snapshotting book {}", self.symbol);
        OrderBookSnapshot {
            symbol: self.symbol.clone(),
            timestamp,
            bids: capture(Side::Bid),
            asks: capture(Side::Ask),
        }
    }
}

/// Format version used for checksum-enabled order book snapshots.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Wrapper that provides checksum validation for [`OrderBookSnapshot`]
/// instances exchanged as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPackage {
    /// Version of the snapshot schema for forward compatibility.
    pub version: u32,
    /// Snapshot payload.
    pub snapshot: OrderBookSnapshot,
    /// Hex-encoded SHA-256 of the serialized snapshot.
    pub checksum: String,
}

impl SnapshotPackage {
    /// Creates a new snapshot package computing the checksum of the
    /// snapshot contents.
    pub fn new(snapshot: OrderBookSnapshot) -> Result<Self, serde_json::Error> {
        let checksum = Self::compute_checksum(&snapshot)?;
        Ok(Self {
            version: SNAPSHOT_FORMAT_VERSION,
            snapshot,
            checksum,
        })
    }

    /// Serializes the package to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the package from JSON.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// True when the payload still matches its checksum and the schema
    /// version is one this build understands.
    pub fn verify(&self) -> bool {
        if self.version != SNAPSHOT_FORMAT_VERSION {
            return false;
        }
        Self::compute_checksum(&self.snapshot)
            .map(|checksum| checksum == self.checksum)
            .unwrap_or(false)
    }

    fn compute_checksum(snapshot: &OrderBookSnapshot) -> Result<String, serde_json::Error> {
        let payload = serde_json::to_vec(snapshot)?;
        let mut hasher = Sha256::new();
        hasher.update(&payload);
        Ok(hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect())
    }
}
