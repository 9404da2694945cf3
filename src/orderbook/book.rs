//! Core OrderBook implementation for managing price levels and orders

use super::cache::BestPriceCache;
use super::level::PriceLevel;
use super::order::{Order, OrderId, Price, Quantity, Side};
use super::stats::{BookStats, BookStatsSnapshot};
use super::trade::{Trade, TradeIdGenerator, TradeListener};
use crossbeam::atomic::AtomicCell;
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::trace;

/// Basis points multiplier: one basis point = 0.01% = 0.0001
const BASIS_POINTS_MULTIPLIER: f64 = 10_000.0;

/// Aggregated view of one price level, returned by depth queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelView {
    /// Level price in ticks
    pub price: Price,
    /// Sum of resting `remaining` at this price
    pub total_quantity: Quantity,
    /// Number of resting orders at this price
    pub order_count: u64,
}

/// Per-symbol price-time-priority matching engine.
///
/// Both sides are skip lists keyed by price, so levels iterate in price
/// order without sorting: best ask is the first ask entry, best bid the last
/// bid entry. A `DashMap` keyed by order id holds each resting order's
/// `(price, side)` location so cancel/modify reach their level directly.
///
/// The book is single-writer by contract (the simulation engine owns it);
/// the interior-mutable containers exist to keep the whole API on `&self`.
pub struct OrderBook {
    /// The symbol or identifier for this order book
    pub(super) symbol: String,

    /// Minimum price increment; order prices must be exact multiples
    pub(super) tick_size: Price,

    /// Bid side price levels, ordered ascending (best bid is the last entry)
    pub(super) bids: SkipMap<Price, Arc<PriceLevel>>,

    /// Ask side price levels, ordered ascending (best ask is the first entry)
    pub(super) asks: SkipMap<Price, Arc<PriceLevel>>,

    /// Order id -> (price, side) of the level the order rests in
    pub(super) order_locations: DashMap<OrderId, (Price, Side)>,

    /// Next id handed out to strategy-originated orders. Kept past any
    /// feed-supplied id so allocated ids never collide with replayed ones.
    pub(super) next_order_id: AtomicU64,

    /// The last price at which a trade occurred
    pub(super) last_trade_price: AtomicCell<Price>,

    /// Flag indicating if there was a trade
    pub(super) has_traded: AtomicBool,

    /// Lazy best bid/ask cache, invalidated on every mutation
    pub(super) cache: BestPriceCache,

    /// Executions in emission order
    pub(super) trades: RwLock<Vec<Trade>>,

    /// Deterministic trade-id source
    pub(super) trade_ids: TradeIdGenerator,

    /// Operation counters
    pub(super) stats: BookStats,

    /// Listens to possible trades when an order is added
    pub trade_listener: Option<TradeListener>,
}

impl OrderBook {
    /// Create a new order book for the given symbol with tick size 1.
    pub fn new(symbol: &str) -> Self {
        Self::with_tick_size(symbol, 1)
    }

    /// Create a new order book with tick size validation.
    ///
    /// Order prices must be exact multiples of `tick_size`; a zero tick size
    /// is treated as 1.
    pub fn with_tick_size(symbol: &str, tick_size: Price) -> Self {
        Self {
            symbol: symbol.to_string(),
            tick_size: tick_size.max(1),
            bids: SkipMap::new(),
            asks: SkipMap::new(),
            order_locations: DashMap::new(),
            next_order_id: AtomicU64::new(1),
            last_trade_price: AtomicCell::new(0),
            has_traded: AtomicBool::new(false),
            cache: BestPriceCache::new(),
            trades: RwLock::new(Vec::new()),
            trade_ids: TradeIdGenerator::new(symbol),
            stats: BookStats::new(),
            trade_listener: None,
        }
    }

    /// Create a new order book with a trade listener attached.
    pub fn with_trade_listener(symbol: &str, listener: TradeListener) -> Self {
        let mut book = Self::new(symbol);
        book.trade_listener = Some(listener);
        book
    }

    /// Get the symbol of this order book
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The configured minimum price increment.
    pub fn tick_size(&self) -> Price {
        self.tick_size
    }

    /// Allocate a fresh order id. Monotonic; never repeats and never
    /// collides with feed-supplied ids already seen by this book.
    pub fn allocate_order_id(&self) -> OrderId {
        self.next_order_id.fetch_add(1, Ordering::AcqRel)
    }

    /// Keep the allocator ahead of an externally supplied id.
    pub(super) fn observe_order_id(&self, id: OrderId) {
        self.next_order_id.fetch_max(id + 1, Ordering::AcqRel);
    }

    /// Get the best bid price, if any.
    ///
    /// Served from the lazy cache when valid; otherwise recomputed from the
    /// skip list (highest bid price is the last entry) and re-cached.
    pub fn best_bid(&self) -> Option<Price> {
        if let Some(cached) = self.cache.bid() {
            return cached;
        }

        let best_price = self.bids.iter().next_back().map(|entry| *entry.key());
        self.cache.set_bid(best_price);
        best_price
    }

    /// Get the best ask price, if any.
    pub fn best_ask(&self) -> Option<Price> {
        if let Some(cached) = self.cache.ask() {
            return cached;
        }

        let best_price = self.asks.iter().next().map(|entry| *entry.key());
        self.cache.set_ask(best_price);
        best_price
    }

    /// Total resting quantity at the best bid, 0 when the side is empty.
    pub fn best_bid_quantity(&self) -> Quantity {
        self.best_bid()
            .and_then(|price| self.bids.get(&price))
            .map(|entry| entry.value().total_quantity())
            .unwrap_or(0)
    }

    /// Total resting quantity at the best ask, 0 when the side is empty.
    pub fn best_ask_quantity(&self) -> Quantity {
        self.best_ask()
            .and_then(|price| self.asks.get(&price))
            .map(|entry| entry.value().total_quantity())
            .unwrap_or(0)
    }

    /// Get the mid price (average of best bid and best ask)
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid as f64 + ask as f64) / 2.0),
            _ => None,
        }
    }

    /// Get the last trade price, if any
    pub fn last_trade_price(&self) -> Option<Price> {
        if self.has_traded.load(Ordering::Relaxed) {
            Some(self.last_trade_price.load())
        } else {
            None
        }
    }

    /// Get the spread (best ask - best bid)
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.saturating_sub(bid)),
            _ => None,
        }
    }

    /// Returns the spread in basis points: `((ask - bid) / mid) * 10_000`.
    pub fn spread_bps(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask(), self.mid_price()) {
            (Some(bid), Some(ask), Some(mid)) if mid > 0.0 => {
                let spread = ask.saturating_sub(bid) as f64;
                Some((spread / mid) * BASIS_POINTS_MULTIPLIER)
            }
            _ => None,
        }
    }

    /// True when the book is crossed (`best_bid >= best_ask`). Matching
    /// resolves crossings before any public operation returns, so this is
    /// observable only transiently inside the book itself.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    /// Number of resting orders across both sides.
    pub fn order_count(&self) -> usize {
        self.order_locations.len()
    }

    /// Look up a resting order by id, cloned.
    pub fn get_order(&self, order_id: OrderId) -> Option<Order> {
        let (price, side) = *self.order_locations.get(&order_id)?;
        let levels = match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };
        levels
            .get(&price)?
            .value()
            .iter_orders()
            .into_iter()
            .find(|order| order.id == order_id)
    }

    /// Resting orders at a price in time order (oldest first).
    pub fn orders_at_price(&self, price: Price, side: Side) -> Vec<Order> {
        let levels = match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };
        levels
            .get(&price)
            .map(|entry| entry.value().iter_orders())
            .unwrap_or_default()
    }

    /// Up to `n` bid levels from the best outward.
    pub fn bid_levels(&self, n: usize) -> Vec<LevelView> {
        self.level_views(Side::Bid, n)
    }

    /// Up to `n` ask levels from the best outward.
    pub fn ask_levels(&self, n: usize) -> Vec<LevelView> {
        self.level_views(Side::Ask, n)
    }

    fn level_views(&self, side: Side, n: usize) -> Vec<LevelView> {
        if n == 0 {
            return Vec::new();
        }

        let levels = match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };

        // Iterate in price-priority order (bids from the back, asks from
        // the front)
        let iter: Box<dyn Iterator<Item = _>> = match side {
            Side::Bid => Box::new(levels.iter().rev()),
            Side::Ask => Box::new(levels.iter()),
        };

        iter.take(n)
            .map(|entry| LevelView {
                price: *entry.key(),
                total_quantity: entry.value().total_quantity(),
                order_count: entry.value().order_count(),
            })
            .collect()
    }

    /// Calculates total depth available in the first N price levels.
    pub fn total_depth_at_levels(&self, levels: usize, side: Side) -> Quantity {
        self.level_views(side, levels)
            .iter()
            .map(|view| view.total_quantity)
            .fold(0u64, |acc, quantity| acc.saturating_add(quantity))
    }

    /// Volume-weighted average price for executing `quantity` against the
    /// book (Bid executes against asks, Ask against bids). `None` when
    /// liquidity is insufficient or `quantity` is zero.
    pub fn vwap(&self, quantity: Quantity, side: Side) -> Option<f64> {
        if quantity == 0 {
            return None;
        }

        let levels = match side {
            Side::Bid => &self.asks,
            Side::Ask => &self.bids,
        };

        let iter: Box<dyn Iterator<Item = _>> = match side {
            Side::Bid => Box::new(levels.iter()),
            Side::Ask => Box::new(levels.iter().rev()),
        };

        let mut remaining = quantity;
        let mut total_cost = 0u128;
        let mut total_filled = 0u64;

        for entry in iter {
            if remaining == 0 {
                break;
            }
            let available = entry.value().total_quantity();
            if available == 0 {
                continue;
            }
            let fill_qty = remaining.min(available);
            total_cost = total_cost.saturating_add(*entry.key() * fill_qty as u128);
            total_filled = total_filled.saturating_add(fill_qty);
            remaining -= fill_qty;
        }

        if total_filled == quantity {
            Some(total_cost as f64 / total_filled as f64)
        } else {
            None
        }
    }

    /// Bid share of resting volume over the top `levels` levels per side:
    /// `bid / (bid + ask)`, in `[0, 1]`. Returns 0.5 when both sides are
    /// empty, 1.0 / 0.0 when only one side has volume.
    pub fn order_imbalance_ratio(&self, levels: usize) -> f64 {
        let bid_volume = self.total_depth_at_levels(levels.max(1), Side::Bid) as f64;
        let ask_volume = self.total_depth_at_levels(levels.max(1), Side::Ask) as f64;

        if bid_volume + ask_volume == 0.0 {
            return 0.5;
        }
        bid_volume / (bid_volume + ask_volume)
    }

    /// Signed order book imbalance over the top `levels` levels per side:
    /// `(bid - ask) / (bid + ask)`, in `[-1, 1]`. 0.0 when both sides are
    /// empty or `levels` is 0.
    pub fn order_book_imbalance(&self, levels: usize) -> f64 {
        if levels == 0 {
            return 0.0;
        }

        let bid_volume = self.total_depth_at_levels(levels, Side::Bid) as f64;
        let ask_volume = self.total_depth_at_levels(levels, Side::Ask) as f64;
        let total = bid_volume + ask_volume;

        if total == 0.0 {
            return 0.0;
        }
        (bid_volume - ask_volume) / total
    }

    /// Microprice over the top `levels` levels: mid nudged toward the thin
    /// side, `mid + (2/pi) * atan(2I - 1) * spread / 2` with `I` the bid
    /// volume share. 0.0 when either side is empty.
    pub fn micro_price(&self, levels: usize) -> f64 {
        let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) else {
            return 0.0;
        };

        let mid = (bid as f64 + ask as f64) / 2.0;
        let spread = ask.saturating_sub(bid) as f64;
        let imbalance = self.order_imbalance_ratio(levels);

        mid + std::f64::consts::FRAC_2_PI * (2.0 * imbalance - 1.0).atan() * spread / 2.0
    }

    /// How much of `quantity` could execute right now at or inside
    /// `price_limit` (`None` for a market order probe), without mutating
    /// the book.
    pub fn peek_match(&self, side: Side, quantity: Quantity, price_limit: Option<Price>) -> Quantity {
        let levels = match side {
            Side::Bid => &self.asks,
            Side::Ask => &self.bids,
        };

        let iter: Box<dyn Iterator<Item = _>> = match side {
            Side::Bid => Box::new(levels.iter()),
            Side::Ask => Box::new(levels.iter().rev()),
        };

        let mut matched = 0u64;
        for entry in iter {
            if matched >= quantity {
                break;
            }
            let price = *entry.key();
            if let Some(limit) = price_limit {
                match side {
                    Side::Bid if price > limit => break,
                    Side::Ask if price < limit => break,
                    _ => {}
                }
            }
            let available = entry.value().total_quantity();
            matched = matched.saturating_add((quantity - matched).min(available));
        }

        matched
    }

    /// Executions so far, in emission order.
    pub fn trades(&self) -> Vec<Trade> {
        self.trades
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of executions so far.
    pub fn trade_count(&self) -> usize {
        self.trades
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Point-in-time operation counters.
    pub fn stats(&self) -> BookStatsSnapshot {
        self.stats.snapshot()
    }

    /// Wipe all resting orders, levels and the trade log. Operation
    /// counters survive; the id allocator is not rewound.
    pub fn clear(&self) {
        trace!("Clearing book {}", self.symbol);
        while let Some(entry) = self.bids.pop_front() {
            drop(entry);
        }
        while let Some(entry) = self.asks.pop_front() {
            drop(entry);
        }
        self.order_locations.clear();
        self.trades
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.has_traded.store(false, Ordering::Relaxed);
        self.cache.invalidate();
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("symbol", &self.symbol)
            .field("best_bid", &self.best_bid())
            .field("best_ask", &self.best_ask())
            .field("orders", &self.order_count())
            .finish()
    }
}
