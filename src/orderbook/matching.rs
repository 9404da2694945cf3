//! Contains the core matching engine logic for the order book.
//!
//! Matching walks the opposite side from its best price outward, consuming
//! level FIFOs in strict arrival order. Executions always print at the
//! resting order's price, so any price improvement goes to the aggressor.

use super::book::OrderBook;
use super::order::{OrderId, Price, Quantity, Side, TimestampNs};
use super::trade::{MatchResult, Trade};
use std::sync::atomic::Ordering;
use tracing::trace;

impl OrderBook {
    /// Match an incoming order against the opposite side.
    ///
    /// `limit_price` bounds how deep the sweep may go (`None` for market
    /// orders: every price crosses). Stops as soon as the aggressor is
    /// exhausted, the price limit is violated, or the opposite side runs
    /// dry. Emptied levels are erased before returning, so the book is
    /// never observably crossed.
    ///
    /// Trade timestamps are `max(taker_timestamp, maker_timestamp)`, the
    /// later of the two arrivals.
    pub(super) fn match_order(
        &self,
        order_id: OrderId,
        side: Side,
        quantity: Quantity,
        limit_price: Option<Price>,
        timestamp: TimestampNs,
    ) -> MatchResult {
        self.cache.invalidate();
        let mut result = MatchResult::new(order_id, quantity);
        let mut remaining = quantity;

        let match_side = match side {
            Side::Bid => &self.asks,
            Side::Ask => &self.bids,
        };

        if match_side.is_empty() {
            result.remaining_quantity = remaining;
            result.is_complete = false;
            return result;
        }

        let mut empty_levels: Vec<Price> = Vec::new();

        // Prices iterate best-first: asks ascending for a bid aggressor,
        // bids descending for an ask aggressor.
        let price_iter: Box<dyn Iterator<Item = _>> = match side {
            Side::Bid => Box::new(match_side.iter()),
            Side::Ask => Box::new(match_side.iter().rev()),
        };

        for entry in price_iter {
            if remaining == 0 {
                break;
            }

            let price = *entry.key();
            if let Some(limit) = limit_price {
                match side {
                    Side::Bid if price > limit => break,
                    Side::Ask if price < limit => break,
                    _ => {}
                }
            }

            let level = entry.value();
            let level_match = level.match_up_to(remaining);

            for fill in &level_match.fills {
                let trade = Trade {
                    trade_id: self.trade_ids.next_id(),
                    taker_order_id: order_id,
                    maker_order_id: fill.maker_order_id,
                    taker_side: side,
                    price,
                    quantity: fill.quantity,
                    timestamp: timestamp.max(fill.maker_timestamp),
                };
                trace!(
                    "{}: trade {} x {} @ {} (taker {}, maker {})",
                    self.symbol, fill.quantity, side, price, order_id, fill.maker_order_id
                );
                result.trades.push(trade);
                self.stats.record_trade(fill.quantity);

                if fill.maker_filled {
                    result.filled_order_ids.push(fill.maker_order_id);
                    self.order_locations.remove(&fill.maker_order_id);
                }
            }

            if level_match.executed > 0 {
                self.last_trade_price.store(price);
                self.has_traded.store(true, Ordering::Relaxed);
            }

            remaining -= level_match.executed;

            if level.is_empty() {
                empty_levels.push(price);
            }
        }

        for price in &empty_levels {
            match_side.remove(price);
        }

        if !result.trades.is_empty() {
            self.trades
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .extend(result.trades.iter().cloned());
        }

        self.cache.invalidate();

        result.remaining_quantity = remaining;
        result.is_complete = remaining == 0;

        if let Some(listener) = &self.trade_listener
            && !result.trades.is_empty()
        {
            listener(&self.symbol, &result);
        }

        result
    }
}
