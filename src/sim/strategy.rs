//! The strategy contract.

use super::event::MarketDataUpdate;
use super::portfolio::Portfolio;
use crate::orderbook::OrderBook;
use crate::orderbook::order::Order;
use crate::orderbook::trade::Trade;
use crate::signals::Signal;
use std::collections::HashMap;

/// String-keyed strategy parameters.
#[derive(Debug, Clone, Default)]
pub struct StrategyParams(HashMap<String, f64>);

impl StrategyParams {
    /// An empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one parameter, builder style.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    /// Read a parameter, falling back to `default` when unset.
    pub fn param_or(&self, name: &str, default: f64) -> f64 {
        self.0.get(name).copied().unwrap_or(default)
    }
}

impl FromIterator<(String, f64)> for StrategyParams {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A trading strategy driven by the simulation engine.
///
/// Callbacks run synchronously inside the event loop and must be total:
/// no panics, no blocking, no spawning. The book and portfolio references
/// are valid only for the duration of the call.
#[allow(unused_variables)]
pub trait Strategy {
    /// Display name.
    fn name(&self) -> &str;

    /// Receive parameters once, at registration.
    fn initialize(&mut self, params: &StrategyParams) {}

    /// The backtest is about to start.
    fn on_start(&mut self) {}

    /// A market-data update was applied to `book`.
    fn on_market_data(
        &mut self,
        update: &MarketDataUpdate,
        book: &OrderBook,
        portfolio: &Portfolio,
    ) {
    }

    /// A signal event fired for `book`'s symbol.
    fn on_signal(&mut self, signal: &Signal, book: &OrderBook, portfolio: &Portfolio) {}

    /// One of this backtest's fills was applied to the portfolio.
    fn on_fill(&mut self, trade: &Trade, portfolio: &Portfolio) {}

    /// The backtest finished.
    fn on_end(&mut self, portfolio: &Portfolio) {}

    /// Emit orders after a market event. Orders with id 0 get an
    /// engine-allocated id; Stop/StopLimit orders are parked until touched.
    fn generate_orders(&mut self, book: &OrderBook, portfolio: &Portfolio) -> Vec<Order> {
        Vec::new()
    }
}
