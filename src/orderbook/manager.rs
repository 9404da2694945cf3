//! Multi-book management with centralized trade event routing.
//!
//! The simulation engine owns its books directly; this registry exists for
//! embedders that drive several books themselves and want one place to
//! observe every execution.

use crate::orderbook::OrderBook;
use crate::orderbook::trade::{MatchResult, TradeListener};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

/// A routed execution report: which book it came from and what matched.
#[derive(Debug, Clone)]
pub struct TradeEvent {
    /// The trading symbol for this event
    pub symbol: String,
    /// The match outcome containing the individual executions
    pub result: MatchResult,
}

/// Trait for managing multiple order books with centralized trade event
/// routing.
pub trait BookManager {
    /// Add a new order book for a symbol with an automatically configured
    /// trade listener.
    fn add_book(&mut self, symbol: &str);

    /// Get a reference to an order book by symbol.
    fn get_book(&self, symbol: &str) -> Option<&OrderBook>;

    /// Get the list of all symbols with order books in this manager.
    fn symbols(&self) -> Vec<String>;

    /// Remove an order book for a specific symbol.
    fn remove_book(&mut self, symbol: &str) -> Option<OrderBook>;

    /// Check if a book exists for a specific symbol.
    fn has_book(&self, symbol: &str) -> bool;

    /// Get the number of order books in this manager.
    fn book_count(&self) -> usize;
}

/// BookManager implementation using standard library mpsc channels.
pub struct BookManagerStd {
    /// Collection of order books indexed by symbol
    books: HashMap<String, OrderBook>,
    /// Sender for trade events
    trade_sender: std::sync::mpsc::Sender<TradeEvent>,
    /// Receiver for trade events (taken when draining starts)
    trade_receiver: Option<std::sync::mpsc::Receiver<TradeEvent>>,
}

impl BookManagerStd {
    /// Create a new BookManagerStd with a standard library mpsc channel.
    pub fn new() -> Self {
        let (sender, receiver) = std::sync::mpsc::channel();

        Self {
            books: HashMap::new(),
            trade_sender: sender,
            trade_receiver: Some(receiver),
        }
    }

    /// Take the receiver side of the trade channel. The caller drains it
    /// however it likes (inline after each operation, or from a thread).
    pub fn take_trade_receiver(&mut self) -> Option<std::sync::mpsc::Receiver<TradeEvent>> {
        self.trade_receiver.take()
    }
}

impl BookManager for BookManagerStd {
    fn add_book(&mut self, symbol: &str) {
        let sender = self.trade_sender.clone();
        let symbol_clone = symbol.to_string();

        let trade_listener: TradeListener = Arc::new(move |symbol: &str, result: &MatchResult| {
            let event = TradeEvent {
                symbol: symbol.to_string(),
                result: result.clone(),
            };
            if let Err(e) = sender.send(event) {
                error!("Failed to send trade event for {}: {}", symbol_clone, e);
            }
        });

        let book = OrderBook::with_trade_listener(symbol, trade_listener);
        self.books.insert(symbol.to_string(), book);
        info!("Added order book for symbol: {}", symbol);
    }

    fn get_book(&self, symbol: &str) -> Option<&OrderBook> {
        self.books.get(symbol)
    }

    fn symbols(&self) -> Vec<String> {
        self.books.keys().cloned().collect()
    }

    fn remove_book(&mut self, symbol: &str) -> Option<OrderBook> {
        let result = self.books.remove(symbol);
        if result.is_some() {
            info!("Removed order book for symbol: {}", symbol);
        }
        result
    }

    fn has_book(&self, symbol: &str) -> bool {
        self.books.contains_key(symbol)
    }

    fn book_count(&self) -> usize {
        self.books.len()
    }
}

impl Default for BookManagerStd {
    fn default() -> Self {
        Self::new()
    }
}
