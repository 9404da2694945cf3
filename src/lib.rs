//! # Limit-Order-Book Simulator & Event-Driven Backtester
//!
//! A price–time-priority limit order book, a library of microstructure
//! signals over it, and a deterministic event-driven engine for replaying
//! historical market data against algorithmic strategies.
//!
//! ## Key Features
//!
//! - **Faithful matching engine**: strict price priority across levels and
//!   FIFO time priority within a level. Executions always print at the
//!   resting order's price, and the book is never observably crossed.
//!
//! - **Queue-position-aware modification**: shrinking an order in place
//!   keeps its spot in the queue; raising its quantity or moving its price
//!   re-enters it at the tail, exactly as on a real venue.
//!
//! - **Microstructure signals**: imbalance, Stoikov microprice, weighted
//!   mid, depth-decayed book pressure, price impact, VPIN, resilience,
//!   queue position, and a selectable market-quality bundle.
//!
//! - **Deterministic replay**: the engine pulls time-sorted events from a
//!   [`sim::DataSource`], routes them into per-symbol books, invokes
//!   strategy callbacks synchronously, and applies fills to the portfolio.
//!   No system clock, no background threads: the same input always
//!   produces the same output, down to the trade ids.
//!
//! - **Portfolio & metrics**: per-symbol positions with realized and
//!   mark-to-market PnL, commission and slippage models, drawdown
//!   tracking, and a standard performance report (Sharpe, Sortino, Calmar,
//!   max drawdown, turnover) over the equity series.
//!
//! ## Architecture
//!
//! ```text
//! DataSource -> Event -> SimulationEngine -+-> OrderBook (market data)
//!                                          +-> Strategy callbacks
//!                                          +-> Portfolio (fills)
//! ```
//!
//! Strategies read the book and the signals and emit orders; those orders
//! re-enter the engine's queue with the engine's current time and are
//! processed strictly after the event that triggered them.
//!
//! ## Example
//!
//! ```
//! use lobsim::prelude::*;
//!
//! let book = OrderBook::new("AAPL");
//! let _ = book.add_limit_order(1, 10_000, 100, Side::Bid, TimeInForce::Gtc, 1);
//! let _ = book.add_limit_order(2, 10_010, 80, Side::Ask, TimeInForce::Gtc, 2);
//!
//! assert_eq!(book.best_bid(), Some(10_000));
//! assert_eq!(book.spread(), Some(10));
//!
//! // A marketable ask sweeps the bid at the bid's price.
//! let result = book
//!     .add_limit_order(3, 9_990, 40, Side::Ask, TimeInForce::Gtc, 3)
//!     .unwrap();
//! assert_eq!(result.trades[0].price, 10_000);
//! assert_eq!(book.best_bid_quantity(), 60);
//! ```
//!
//! ## Concurrency model
//!
//! The book's containers (skip lists, concurrent maps, atomics) keep the
//! entire API on `&self`, but the simulator is single-threaded by
//! contract: one engine owns its books and is their only mutator. Views
//! returned by accessors are clones; nothing borrows into the book across
//! a mutating call.

pub mod orderbook;
pub mod signals;
pub mod sim;
pub mod utils;

pub mod prelude;

pub use orderbook::manager::{BookManager, BookManagerStd, TradeEvent};
pub use orderbook::{
    LevelView, MatchResult, Order, OrderBook, OrderBookError, OrderBookSnapshot, OrderId,
    OrderKind, OrderStatus, Price, Quantity, Side, SnapshotPackage, TimeInForce, TimestampNs,
    Trade, TradeListener,
};
pub use signals::{MarketQuality, MetricFlags, Signal, SignalCalculator};
pub use sim::{
    BacktestResult, CsvDataSource, DataSource, Event, EventPayload, MarketDataUpdate, Portfolio,
    PortfolioSnapshot, Position, ReplayDataSource, SimulationEngine, Strategy, StrategyParams,
};
pub use utils::{price_from_f64, price_to_f64};
