//! Stateless microstructure measures.
//!
//! Every function returns a finite double; inputs that leave a measure
//! undefined (empty side, zero denominator) yield 0.0. The one exception
//! is the top-of-book imbalance, which is 0.5 when both touches are empty
//! so that a flat book reads as neutral.

use crate::orderbook::order::{Price, Quantity, Side};
use crate::orderbook::trade::Trade;
use crate::orderbook::OrderBook;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// How deep the price-impact walk looks before giving up.
const IMPACT_MAX_LEVELS: usize = 20;

/// Levels per side considered near-touch for resilience.
const RESILIENCE_LEVELS: usize = 3;

/// Top-of-book imbalance: `bid_qty / (bid_qty + ask_qty)` in `[0, 1]`,
/// 0.5 when both touch quantities are zero.
pub fn order_imbalance(book: &OrderBook) -> f64 {
    let bid = book.best_bid_quantity() as f64;
    let ask = book.best_ask_quantity() as f64;
    if bid + ask == 0.0 {
        return 0.5;
    }
    bid / (bid + ask)
}

/// Aggregated imbalance over the top `levels` levels per side:
/// `(sum_bid - sum_ask) / (sum_bid + sum_ask)` in `[-1, 1]`.
pub fn aggregated_imbalance(book: &OrderBook, levels: usize) -> f64 {
    book.order_book_imbalance(levels)
}

/// Stoikov-style microprice:
/// `mid + (2/pi) * atan(2I - 1) * spread / 2` with `I` the top-of-book
/// imbalance. 0.0 when either side is empty.
pub fn microprice(book: &OrderBook) -> f64 {
    book.micro_price(1)
}

/// Imbalance-weighted mid: `I * ask + (1 - I) * bid`. Leans toward the ask
/// when bids dominate (the heavy side pushes price away from itself).
pub fn weighted_mid(book: &OrderBook) -> f64 {
    let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) else {
        return 0.0;
    };
    let imbalance = order_imbalance(book);
    imbalance * ask as f64 + (1.0 - imbalance) * bid as f64
}

/// Depth-decayed buy pressure over up to `levels` levels per side.
///
/// Level `k` from the touch is weighted `decay^k`; the result is the bid
/// share of the weighted volume, 0.0 when both sides are empty.
pub fn book_pressure(book: &OrderBook, levels: usize, decay: f64) -> f64 {
    let weigh = |views: Vec<crate::orderbook::LevelView>| -> f64 {
        views
            .iter()
            .enumerate()
            .map(|(k, view)| decay.powi(k as i32) * view.total_quantity as f64)
            .sum()
    };

    let bid_pressure = weigh(book.bid_levels(levels));
    let ask_pressure = weigh(book.ask_levels(levels));
    let total = bid_pressure + ask_pressure;

    if total == 0.0 {
        return 0.0;
    }
    bid_pressure / total
}

/// Relative price impact of sweeping `size` units against the opposite side.
///
/// Walks up to 20 levels consuming `size` and returns
/// `|last_touched - first_touched| / first_touched`. 0.0 when the opposite
/// side is empty or `size` is zero.
pub fn price_impact(book: &OrderBook, side: Side, size: Quantity) -> f64 {
    if size == 0 {
        return 0.0;
    }

    let levels = match side {
        Side::Bid => book.ask_levels(IMPACT_MAX_LEVELS),
        Side::Ask => book.bid_levels(IMPACT_MAX_LEVELS),
    };
    let Some(first) = levels.first() else {
        return 0.0;
    };

    let initial: Price = first.price;
    let mut last = initial;
    let mut remaining = size;
    for view in &levels {
        last = view.price;
        if remaining <= view.total_quantity {
            break;
        }
        remaining -= view.total_quantity;
    }

    let initial = initial as f64;
    if initial == 0.0 {
        return 0.0;
    }
    (last as f64 - initial).abs() / initial
}

/// Effective (relative) spread: `(ask - bid) / mid`. 0.0 when undefined.
pub fn effective_spread(book: &OrderBook) -> f64 {
    match (book.best_bid(), book.best_ask(), book.mid_price()) {
        (Some(bid), Some(ask), Some(mid)) if mid > 0.0 => {
            ask.saturating_sub(bid) as f64 / mid
        }
        _ => 0.0,
    }
}

/// Order-flow toxicity (VPIN) over the supplied trades:
/// `|sum_buy - sum_sell| / sum_qty` with buys identified by the taker side.
/// Pass the last `k` trades of interest; 0.0 for an empty slice.
pub fn vpin(trades: &[Trade]) -> f64 {
    let mut buy = 0u64;
    let mut sell = 0u64;
    for trade in trades {
        match trade.taker_side {
            Side::Bid => buy += trade.quantity,
            Side::Ask => sell += trade.quantity,
        }
    }
    let total = buy + sell;
    if total == 0 {
        return 0.0;
    }
    (buy as f64 - sell as f64).abs() / total as f64
}

/// Near-touch depth (3 levels per side) divided by the current spread.
/// A deep, tight book scores high. 0.0 when the spread is undefined or zero.
pub fn book_resilience(book: &OrderBook) -> f64 {
    let Some(spread) = book.spread() else {
        return 0.0;
    };
    if spread == 0 {
        return 0.0;
    }

    let depth = book.total_depth_at_levels(RESILIENCE_LEVELS, Side::Bid)
        + book.total_depth_at_levels(RESILIENCE_LEVELS, Side::Ask);
    depth as f64 / spread as f64
}

/// Queue position a hypothetical order at `(side, price)` would join at:
/// 1 when the price betters the touch, otherwise one past the orders
/// already resting at that level.
pub fn queue_position(book: &OrderBook, side: Side, price: Price) -> u64 {
    let betters_touch = match side {
        Side::Bid => book.best_bid().is_none_or(|best| price > best),
        Side::Ask => book.best_ask().is_none_or(|best| price < best),
    };
    if betters_touch {
        return 1;
    }
    book.orders_at_price(price, side).len() as u64 + 1
}

bitflags! {
    /// Selects which [`MarketQuality`] fields to compute.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MetricFlags: u32 {
        /// Spread in basis points
        const SPREAD_BPS = 1 << 0;
        /// Resting quantity at both touches
        const DEPTH_AT_TOUCH = 1 << 1;
        /// Top-of-book imbalance
        const IMBALANCE = 1 << 2;
        /// Stoikov microprice
        const MICROPRICE = 1 << 3;
        /// Relative spread
        const EFFECTIVE_SPREAD = 1 << 4;
        /// Near-touch depth over spread
        const RESILIENCE = 1 << 5;
        /// Depth-decayed pressure
        const PRESSURE = 1 << 6;
        /// Spread-and-imbalance volatility proxy
        const VOLATILITY = 1 << 7;
    }
}

impl MetricFlags {
    /// Every metric.
    pub fn full() -> Self {
        Self::all()
    }
}

/// Bundle of market-quality measures computed in one pass over the touch.
/// Fields whose flag was not requested are 0.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketQuality {
    /// Spread in basis points
    pub spread_bps: f64,
    /// Resting quantity at the best bid
    pub bid_depth_at_touch: f64,
    /// Resting quantity at the best ask
    pub ask_depth_at_touch: f64,
    /// Top-of-book imbalance in `[0, 1]`
    pub imbalance: f64,
    /// Stoikov microprice
    pub microprice: f64,
    /// Relative spread
    pub effective_spread: f64,
    /// Near-touch depth over spread
    pub resilience: f64,
    /// Depth-decayed buy pressure in `[0, 1]`
    pub pressure: f64,
    /// `spread_bps * (1 - |0.5 - imbalance|)`: tight balanced books score low
    pub volatility_proxy: f64,
}

/// Default decay for the pressure term of the quality bundle.
const QUALITY_PRESSURE_DECAY: f64 = 0.75;
/// Default depth for the pressure term of the quality bundle.
const QUALITY_PRESSURE_LEVELS: usize = 5;

/// Compute the selected market-quality metrics.
pub fn market_quality(book: &OrderBook, flags: MetricFlags) -> MarketQuality {
    let mut quality = MarketQuality::default();
    let imbalance = order_imbalance(book);

    if flags.contains(MetricFlags::SPREAD_BPS) {
        quality.spread_bps = book.spread_bps().unwrap_or(0.0);
    }
    if flags.contains(MetricFlags::DEPTH_AT_TOUCH) {
        quality.bid_depth_at_touch = book.best_bid_quantity() as f64;
        quality.ask_depth_at_touch = book.best_ask_quantity() as f64;
    }
    if flags.contains(MetricFlags::IMBALANCE) {
        quality.imbalance = imbalance;
    }
    if flags.contains(MetricFlags::MICROPRICE) {
        quality.microprice = microprice(book);
    }
    if flags.contains(MetricFlags::EFFECTIVE_SPREAD) {
        quality.effective_spread = effective_spread(book);
    }
    if flags.contains(MetricFlags::RESILIENCE) {
        quality.resilience = book_resilience(book);
    }
    if flags.contains(MetricFlags::PRESSURE) {
        quality.pressure = book_pressure(book, QUALITY_PRESSURE_LEVELS, QUALITY_PRESSURE_DECAY);
    }
    if flags.contains(MetricFlags::VOLATILITY) {
        let spread_bps = book.spread_bps().unwrap_or(0.0);
        quality.volatility_proxy = spread_bps * (1.0 - (0.5 - imbalance).abs());
    }

    quality
}
