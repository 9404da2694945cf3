//! The event-driven simulation engine.
//!
//! Owns the event queue, the per-symbol books, the portfolio and the
//! registered strategies/calculators. Everything runs on the caller's
//! thread: events dispatch one at a time, each handler runs to completion,
//! and replaying the same source reproduces the same state exactly.

use super::data::DataSource;
use super::event::{Event, EventPayload, EventQueue, MarketDataUpdate};
use super::metrics::BacktestResult;
use super::portfolio::{Portfolio, PortfolioSnapshot};
use super::strategy::{Strategy, StrategyParams};
use crate::orderbook::OrderBook;
use crate::orderbook::order::{Order, OrderKind, Price, TimestampNs};
use crate::orderbook::trade::Trade;
use crate::signals::calculators::SignalCalculator;
use crate::utils::price_to_f64;
use std::collections::HashMap;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Cooperative cancellation handle for a running backtest. Cloneable;
/// `stop` takes effect after the event being dispatched completes.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Request the engine drain to a clean state after the current event.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Timestamp-ordered event dispatcher over per-symbol order books.
pub struct SimulationEngine {
    queue: EventQueue,
    books: HashMap<String, OrderBook>,
    portfolio: Portfolio,
    strategies: Vec<Box<dyn Strategy>>,
    calculators: Vec<Box<dyn SignalCalculator>>,
    current_prices: HashMap<String, f64>,
    parked_stops: HashMap<String, Vec<Order>>,
    snapshots: Vec<PortfolioSnapshot>,
    current_time: TimestampNs,
    stop_flag: Arc<AtomicBool>,
    events_processed: u64,
    traded_notional: f64,
    book_tick_size: Price,
}

impl SimulationEngine {
    /// A fresh engine around `portfolio`.
    pub fn new(portfolio: Portfolio) -> Self {
        Self {
            queue: EventQueue::new(),
            books: HashMap::new(),
            portfolio,
            strategies: Vec::new(),
            calculators: Vec::new(),
            current_prices: HashMap::new(),
            parked_stops: HashMap::new(),
            snapshots: Vec::new(),
            current_time: 0,
            stop_flag: Arc::new(AtomicBool::new(false)),
            events_processed: 0,
            traded_notional: 0.0,
            book_tick_size: 1,
        }
    }

    /// Tick size applied to books the engine creates on demand.
    pub fn with_book_tick_size(mut self, tick_size: Price) -> Self {
        self.book_tick_size = tick_size.max(1);
        self
    }

    /// Register a strategy, handing it its parameters.
    pub fn register_strategy(&mut self, mut strategy: Box<dyn Strategy>, params: StrategyParams) {
        strategy.initialize(&params);
        info!("Registered strategy {}", strategy.name());
        self.strategies.push(strategy);
    }

    /// Register a stateful signal calculator. It is updated after every
    /// market event and its signals are dispatched to the strategies.
    pub fn register_calculator(&mut self, calculator: Box<dyn SignalCalculator>) {
        info!("Registered signal calculator {}", calculator.name());
        self.calculators.push(calculator);
    }

    /// The book for `symbol`, if one exists yet.
    pub fn book(&self, symbol: &str) -> Option<&OrderBook> {
        self.books.get(symbol)
    }

    /// The portfolio.
    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Mark price for `symbol` in converted price units: the mid, or 0.0
    /// when a side is empty.
    pub fn mark_price(&self, symbol: &str) -> f64 {
        self.current_prices.get(symbol).copied().unwrap_or(0.0)
    }

    /// Engine time: the timestamp of the latest dispatched event.
    pub fn current_time(&self) -> TimestampNs {
        self.current_time
    }

    /// Portfolio history captured at EndOfDay events.
    pub fn snapshots(&self) -> &[PortfolioSnapshot] {
        &self.snapshots
    }

    /// Events dispatched so far.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// A handle that stops the run loop between events.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop_flag.clone())
    }

    /// Request a cooperative stop.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Inject an event directly (tests, custom drivers). Ordering against
    /// source events still holds: the queue orders by `(timestamp, seq)`.
    pub fn inject(&mut self, event: Event) {
        self.queue.push(event);
    }

    /// Dispatch the next event, first pulling one from `source` if it has
    /// any. Returns false when both the source and the queue are exhausted
    /// or a stop was requested.
    pub fn step(&mut self, source: &mut dyn DataSource) -> bool {
        if self.stop_flag.load(Ordering::SeqCst) {
            return false;
        }

        // Keeping exactly one unpopped source event in the queue preserves
        // the global (timestamp, seq) order: the source is time-sorted, so
        // everything it will produce later is >= the event pushed here.
        if source.has_next()
            && let Some(event) = source.next()
        {
            self.queue.push(event);
        }

        let Some(event) = self.queue.pop() else {
            return false;
        };
        self.dispatch(event);
        self.events_processed += 1;
        true
    }

    /// Run the full backtest: drain `source` and every consequent event,
    /// then close out and compute metrics from the snapshot history.
    pub fn run(&mut self, source: &mut dyn DataSource) -> BacktestResult {
        info!(
            "Starting backtest with {} strategies, {} calculators",
            self.strategies.len(),
            self.calculators.len()
        );

        let mut strategies = mem::take(&mut self.strategies);
        for strategy in strategies.iter_mut() {
            strategy.on_start();
        }
        self.strategies = strategies;

        while self.step(source) {}

        // Guarantee the equity series covers the end of the run.
        let needs_final = self
            .snapshots
            .last()
            .is_none_or(|snapshot| snapshot.timestamp < self.current_time);
        if needs_final {
            self.snapshots
                .push(self.portfolio.snapshot(self.current_time, &self.current_prices));
        }

        let mut strategies = mem::take(&mut self.strategies);
        for strategy in strategies.iter_mut() {
            strategy.on_end(&self.portfolio);
        }
        self.strategies = strategies;

        let equity_curve: Vec<(TimestampNs, f64)> = self
            .snapshots
            .iter()
            .map(|snapshot| (snapshot.timestamp, snapshot.equity))
            .collect();

        info!(
            "Backtest finished: {} events, {} fills",
            self.events_processed,
            self.portfolio.fills_applied()
        );

        BacktestResult::from_equity_curve(
            self.portfolio.initial_capital(),
            equity_curve,
            self.portfolio.fills_applied(),
            self.traded_notional,
        )
    }

    fn dispatch(&mut self, event: Event) {
        self.current_time = self.current_time.max(event.timestamp);
        match event.payload {
            EventPayload::MarketData(update) => {
                self.apply_market_data(&event.symbol, update);
            }
            EventPayload::Signal(signal) => {
                self.ensure_book(&event.symbol);
                let mut strategies = mem::take(&mut self.strategies);
                if let Some(book) = self.books.get(&event.symbol) {
                    for strategy in strategies.iter_mut() {
                        strategy.on_signal(&signal, book, &self.portfolio);
                    }
                }
                self.strategies = strategies;
            }
            EventPayload::Order(order) => {
                self.apply_order(&event.symbol, order);
            }
            EventPayload::Fill(trade) => {
                self.apply_fill(&event.symbol, &trade);
            }
            EventPayload::EndOfDay => {
                debug!("End of day at {}", self.current_time);
                self.snapshots
                    .push(self.portfolio.snapshot(event.timestamp, &self.current_prices));
            }
        }
    }

    /// Route a market-data update into its book, dispatch the resulting
    /// fills inline, re-mark, then drive calculators and strategies.
    fn apply_market_data(&mut self, symbol: &str, update: MarketDataUpdate) {
        self.ensure_book(symbol);
        let timestamp = self.current_time;

        let fills: Vec<Trade> = {
            let Some(book) = self.books.get(symbol) else {
                return;
            };
            match &update {
                MarketDataUpdate::AddOrder {
                    order_id,
                    side,
                    price,
                    quantity,
                } => book
                    .add_limit_order(
                        *order_id,
                        *price,
                        *quantity,
                        *side,
                        crate::orderbook::order::TimeInForce::Gtc,
                        timestamp,
                    )
                    .map(|result| result.trades)
                    .unwrap_or_else(|error| {
                        warn!("{}: feed add rejected: {}", symbol, error);
                        Vec::new()
                    }),
                MarketDataUpdate::ModifyOrder {
                    order_id,
                    new_quantity,
                    new_price,
                } => book
                    .modify_order(*order_id, *new_price, *new_quantity, timestamp)
                    .map(|result| result.trades)
                    .unwrap_or_default(),
                MarketDataUpdate::CancelOrder { order_id } => {
                    let _ = book.cancel_order(*order_id);
                    Vec::new()
                }
                MarketDataUpdate::Clear => {
                    book.clear();
                    Vec::new()
                }
                // The feed's add/cancel stream is authoritative; trade and
                // snapshot rows are informational.
                MarketDataUpdate::Trade { .. }
                | MarketDataUpdate::Snapshot { .. }
                | MarketDataUpdate::NoOp => Vec::new(),
            }
        };

        // Fills dispatch inline: strategies observe a consistent book and
        // portfolio before the next queued event pops.
        for trade in fills {
            self.apply_fill(symbol, &trade);
        }

        self.remark(symbol);

        let mut calculators = mem::take(&mut self.calculators);
        let mut strategies = mem::take(&mut self.strategies);
        let mut signals = Vec::new();
        let mut orders = Vec::new();

        if let Some(book) = self.books.get(symbol) {
            for calculator in calculators.iter_mut() {
                calculator.update(book);
            }
            for strategy in strategies.iter_mut() {
                strategy.on_market_data(&update, book, &self.portfolio);
            }
            for calculator in calculators.iter() {
                if let Some(signal) = calculator.calculate(book) {
                    signals.push(signal);
                }
            }
            for strategy in strategies.iter_mut() {
                orders.extend(strategy.generate_orders(book, &self.portfolio));
            }
        }

        self.calculators = calculators;
        self.strategies = strategies;

        for signal in signals {
            self.queue
                .push(Event::signal(self.current_time, symbol, signal));
        }
        for order in orders {
            self.queue.push(Event::order(self.current_time, symbol, order));
        }

        self.activate_stops(symbol);
    }

    /// Process a strategy-originated order: market and limit orders hit the
    /// book now (their fills dispatch inline), stops get parked.
    fn apply_order(&mut self, symbol: &str, order: Order) {
        self.ensure_book(symbol);

        match order.kind {
            OrderKind::Stop | OrderKind::StopLimit => {
                let mut parked = order;
                if parked.id == 0
                    && let Some(book) = self.books.get(symbol)
                {
                    parked.id = book.allocate_order_id();
                }
                debug!(
                    "{}: parking {} order {} (trigger {:?})",
                    symbol, parked.kind, parked.id, parked.stop_price
                );
                self.parked_stops
                    .entry(symbol.to_string())
                    .or_default()
                    .push(parked);
                // A stop can trigger on the mark that existed when it
                // arrived.
                self.activate_stops(symbol);
            }
            OrderKind::Limit | OrderKind::Market => {
                let fills: Vec<Trade> = {
                    let Some(book) = self.books.get(symbol) else {
                        return;
                    };
                    let mut submitted = order;
                    if submitted.id == 0 {
                        submitted.id = book.allocate_order_id();
                    }
                    submitted.timestamp = self.current_time;
                    match book.add_order(submitted) {
                        Ok(result) => result.trades,
                        Err(error) => {
                            warn!("{}: strategy order rejected: {}", symbol, error);
                            Vec::new()
                        }
                    }
                };

                for trade in fills {
                    self.apply_fill(symbol, &trade);
                }
                self.remark(symbol);
            }
        }
    }

    /// Apply one execution: portfolio first (signed by the aggressor
    /// side), then calculators, then strategy callbacks.
    fn apply_fill(&mut self, symbol: &str, trade: &Trade) {
        self.portfolio.apply_fill(symbol, trade);
        self.traded_notional += price_to_f64(trade.price) * trade.quantity as f64;

        for calculator in self.calculators.iter_mut() {
            calculator.on_trade(trade);
        }

        let mut strategies = mem::take(&mut self.strategies);
        for strategy in strategies.iter_mut() {
            strategy.on_fill(trade, &self.portfolio);
        }
        self.strategies = strategies;
    }

    /// Refresh the symbol's mark (mid, 0.0 when undefined) and the
    /// portfolio's drawdown tracking. Marks live in converted price units,
    /// matching the portfolio's accounting.
    fn remark(&mut self, symbol: &str) {
        let mid = self
            .books
            .get(symbol)
            .and_then(|book| match (book.best_bid(), book.best_ask()) {
                (Some(bid), Some(ask)) => {
                    Some((price_to_f64(bid) + price_to_f64(ask)) / 2.0)
                }
                _ => None,
            })
            .unwrap_or(0.0);
        self.current_prices.insert(symbol.to_string(), mid);
        self.portfolio.mark(&self.current_prices);
    }

    /// Fire parked stops whose trigger the current mark has touched:
    /// a Bid stop at `mark >= stop`, an Ask stop at `mark <= stop`. The
    /// mark is the mid, falling back to the last trade price when a side
    /// is empty. Triggered stops re-enter the queue as market or limit
    /// orders stamped with engine time.
    fn activate_stops(&mut self, symbol: &str) {
        let mut mark = self.mark_price(symbol);
        if mark <= 0.0 {
            mark = self
                .books
                .get(symbol)
                .and_then(|book| book.last_trade_price())
                .map(price_to_f64)
                .unwrap_or(0.0);
        }
        if mark <= 0.0 {
            return;
        }

        let mut triggered = Vec::new();
        if let Some(parked) = self.parked_stops.get_mut(symbol) {
            parked.retain(|order| {
                let stop = order.stop_price.map(price_to_f64).unwrap_or(0.0);
                let fires = match order.side {
                    crate::orderbook::order::Side::Bid => mark >= stop,
                    crate::orderbook::order::Side::Ask => mark <= stop,
                };
                if fires {
                    triggered.push(order.clone());
                }
                !fires
            });
        }

        for order in triggered {
            let activated = match order.kind {
                OrderKind::Stop => {
                    Order::market(order.id, order.side, order.remaining, self.current_time)
                }
                _ => Order::limit(
                    order.id,
                    order.side,
                    order.price,
                    order.remaining,
                    self.current_time,
                )
                .with_time_in_force(order.time_in_force),
            }
            .with_client_id(order.client_id);

            debug!(
                "{}: stop {} triggered at mark {:.4}",
                symbol, order.id, mark
            );
            self.queue
                .push(Event::order(self.current_time, symbol, activated));
        }
    }

    fn ensure_book(&mut self, symbol: &str) {
        if symbol.is_empty() {
            return;
        }
        if !self.books.contains_key(symbol) {
            debug!("Creating book for {}", symbol);
            self.books.insert(
                symbol.to_string(),
                OrderBook::with_tick_size(symbol, self.book_tick_size),
            );
        }
    }
}
