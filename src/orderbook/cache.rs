//! Lazy best-price cache.
//!
//! Every mutating book operation calls [`BestPriceCache::invalidate`]; the
//! `best_bid`/`best_ask` getters recompute on the next read and re-arm the
//! cache. The outer `Option` is validity, the inner one distinguishes an
//! empty side from a populated one.

use crate::orderbook::order::Price;
use crossbeam::atomic::AtomicCell;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct BestPriceCache {
    bid_valid: AtomicBool,
    ask_valid: AtomicBool,
    bid: AtomicCell<Option<Price>>,
    ask: AtomicCell<Option<Price>>,
}

impl BestPriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached best bid: `None` when stale, `Some(None)` for an empty side.
    #[inline]
    pub fn bid(&self) -> Option<Option<Price>> {
        if self.bid_valid.load(Ordering::Acquire) {
            Some(self.bid.load())
        } else {
            None
        }
    }

    /// Cached best ask: `None` when stale, `Some(None)` for an empty side.
    #[inline]
    pub fn ask(&self) -> Option<Option<Price>> {
        if self.ask_valid.load(Ordering::Acquire) {
            Some(self.ask.load())
        } else {
            None
        }
    }

    /// Store a freshly computed best bid and mark it valid.
    #[inline]
    pub fn set_bid(&self, price: Option<Price>) {
        self.bid.store(price);
        self.bid_valid.store(true, Ordering::Release);
    }

    /// Store a freshly computed best ask and mark it valid.
    #[inline]
    pub fn set_ask(&self, price: Option<Price>) {
        self.ask.store(price);
        self.ask_valid.store(true, Ordering::Release);
    }

    /// Drop both sides. Called after any mutation that can move the touch.
    #[inline]
    pub fn invalidate(&self) {
        self.bid_valid.store(false, Ordering::Release);
        self.ask_valid.store(false, Ordering::Release);
    }
}
