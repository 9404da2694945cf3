//! Prelude module that re-exports commonly used types and traits.
//!
//! ```rust
//! use lobsim::prelude::*;
//! ```

// Core order book types
pub use crate::orderbook::order::{
    Order, OrderId, OrderKind, OrderStatus, Price, Quantity, Side, TimeInForce, TimestampNs,
};
pub use crate::orderbook::{LevelView, MatchResult, OrderBook, OrderBookError, Trade};

// Snapshot types
pub use crate::orderbook::{LevelSnapshot, OrderBookSnapshot, SnapshotPackage};

// Multi-book management
pub use crate::orderbook::manager::{BookManager, BookManagerStd};

// Signals
pub use crate::signals::{
    MarketQuality, MetricFlags, Signal, SignalCalculator, indicators,
};

// Simulation
pub use crate::sim::{
    BacktestResult, CsvDataSource, DataSource, Event, EventPayload, MarketDataUpdate, Portfolio,
    PortfolioSnapshot, Position, ReplayDataSource, SimulationEngine, StopHandle, Strategy,
    StrategyParams,
};

// Boundary helpers
pub use crate::utils::{price_from_f64, price_to_f64};
