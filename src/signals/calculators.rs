//! Stateful signal calculators.
//!
//! The simulation engine calls [`SignalCalculator::update`] after every
//! market event and [`SignalCalculator::on_trade`] for every execution,
//! then polls [`SignalCalculator::calculate`] to synthesize signal events
//! for the strategies.

use super::Signal;
use super::indicators;
use crate::orderbook::OrderBook;
use crate::orderbook::order::Side;
use crate::orderbook::trade::Trade;
use std::collections::VecDeque;

/// A calculator the engine drives across market events.
pub trait SignalCalculator: Send {
    /// Stable name used for the emitted signals.
    fn name(&self) -> &str;

    /// Observe the book after a market event. Default: no book state kept.
    fn update(&mut self, _book: &OrderBook) {}

    /// Observe one execution. Default: no trade state kept.
    fn on_trade(&mut self, _trade: &Trade) {}

    /// Current signal value, if the calculator has seen enough input.
    fn calculate(&self, book: &OrderBook) -> Option<Signal>;
}

/// Volume-synchronized probability of informed trading over a rolling
/// window of the last `window` trades.
pub struct VpinCalculator {
    window: usize,
    trades: VecDeque<(Side, u64)>,
}

impl VpinCalculator {
    /// A VPIN window over the last `window` trades (at least 1).
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            trades: VecDeque::new(),
        }
    }
}

impl SignalCalculator for VpinCalculator {
    fn name(&self) -> &str {
        "vpin"
    }

    fn on_trade(&mut self, trade: &Trade) {
        if self.trades.len() == self.window {
            self.trades.pop_front();
        }
        self.trades.push_back((trade.taker_side, trade.quantity));
    }

    fn calculate(&self, _book: &OrderBook) -> Option<Signal> {
        if self.trades.is_empty() {
            return None;
        }

        let mut buy = 0u64;
        let mut sell = 0u64;
        for (side, quantity) in &self.trades {
            match side {
                Side::Bid => buy += quantity,
                Side::Ask => sell += quantity,
            }
        }
        let total = (buy + sell) as f64;
        if total == 0.0 {
            return None;
        }
        Some(Signal::new(
            self.name(),
            (buy as f64 - sell as f64).abs() / total,
        ))
    }
}

/// Z-score of the current spread against a rolling window of spreads.
pub struct SpreadZScore {
    window: usize,
    spreads: VecDeque<f64>,
}

impl SpreadZScore {
    /// Rolling spread window of `window` observations (at least 2).
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(2),
            spreads: VecDeque::new(),
        }
    }
}

impl SignalCalculator for SpreadZScore {
    fn name(&self) -> &str {
        "spread_zscore"
    }

    fn update(&mut self, book: &OrderBook) {
        let Some(spread) = book.spread() else {
            return;
        };
        if self.spreads.len() == self.window {
            self.spreads.pop_front();
        }
        self.spreads.push_back(spread as f64);
    }

    fn calculate(&self, book: &OrderBook) -> Option<Signal> {
        if self.spreads.len() < 2 {
            return None;
        }
        let current = book.spread()? as f64;

        let n = self.spreads.len() as f64;
        let mean = self.spreads.iter().sum::<f64>() / n;
        let variance = self
            .spreads
            .iter()
            .map(|spread| (spread - mean).powi(2))
            .sum::<f64>()
            / n;
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            return Some(Signal::new(self.name(), 0.0));
        }
        Some(Signal::new(self.name(), (current - mean) / std_dev))
    }
}

/// Exponentially decayed signed trade flow: buys add, sells subtract, and
/// every new trade decays what came before.
pub struct TradeFlowIndex {
    decay: f64,
    flow: f64,
    seen: bool,
}

impl TradeFlowIndex {
    /// `decay` in `(0, 1]`: how much of the accumulated flow survives each
    /// new trade.
    pub fn new(decay: f64) -> Self {
        Self {
            decay: decay.clamp(f64::MIN_POSITIVE, 1.0),
            flow: 0.0,
            seen: false,
        }
    }
}

impl SignalCalculator for TradeFlowIndex {
    fn name(&self) -> &str {
        "trade_flow"
    }

    fn on_trade(&mut self, trade: &Trade) {
        let signed = match trade.taker_side {
            Side::Bid => trade.quantity as f64,
            Side::Ask => -(trade.quantity as f64),
        };
        self.flow = self.flow * self.decay + signed;
        self.seen = true;
    }

    fn calculate(&self, _book: &OrderBook) -> Option<Signal> {
        self.seen.then(|| Signal::new(self.name(), self.flow))
    }
}

/// Exponential moving average of the depth-decayed book pressure.
pub struct BookPressureTracker {
    levels: usize,
    level_decay: f64,
    alpha: f64,
    value: Option<f64>,
}

impl BookPressureTracker {
    /// Track pressure over `levels` levels with per-level `level_decay`,
    /// smoothed by EMA factor `alpha` in `(0, 1]`.
    pub fn new(levels: usize, level_decay: f64, alpha: f64) -> Self {
        Self {
            levels: levels.max(1),
            level_decay,
            alpha: alpha.clamp(f64::MIN_POSITIVE, 1.0),
            value: None,
        }
    }
}

impl SignalCalculator for BookPressureTracker {
    fn name(&self) -> &str {
        "book_pressure"
    }

    fn update(&mut self, book: &OrderBook) {
        let observed = indicators::book_pressure(book, self.levels, self.level_decay);
        self.value = Some(match self.value {
            Some(previous) => previous + self.alpha * (observed - previous),
            None => observed,
        });
    }

    fn calculate(&self, _book: &OrderBook) -> Option<Signal> {
        self.value.map(|value| Signal::new(self.name(), value))
    }
}
