//! End-to-end simulation engine tests

use lobsim::prelude::*;
use lobsim::signals::calculators::VpinCalculator;
use std::cell::RefCell;
use std::rc::Rc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn add(timestamp: u64, symbol: &str, id: u64, side: Side, price: u128, quantity: u64) -> Event {
    Event::market_data(
        timestamp,
        symbol,
        MarketDataUpdate::AddOrder {
            order_id: id,
            side,
            price,
            quantity,
        },
    )
}

/// Records every callback it sees; optionally emits a fixed order stream.
#[derive(Default)]
struct Recorder {
    market_data_seen: usize,
    signals_seen: Vec<String>,
    fills_seen: Vec<Trade>,
    started: bool,
    ended: bool,
    pending_orders: Vec<Order>,
}

struct RecorderStrategy(Rc<RefCell<Recorder>>);

impl Strategy for RecorderStrategy {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_start(&mut self) {
        self.0.borrow_mut().started = true;
    }

    fn on_market_data(&mut self, _update: &MarketDataUpdate, _book: &OrderBook, _pf: &Portfolio) {
        self.0.borrow_mut().market_data_seen += 1;
    }

    fn on_signal(&mut self, signal: &Signal, _book: &OrderBook, _pf: &Portfolio) {
        self.0.borrow_mut().signals_seen.push(signal.name.clone());
    }

    fn on_fill(&mut self, trade: &Trade, _pf: &Portfolio) {
        self.0.borrow_mut().fills_seen.push(trade.clone());
    }

    fn on_end(&mut self, _pf: &Portfolio) {
        self.0.borrow_mut().ended = true;
    }

    fn generate_orders(&mut self, _book: &OrderBook, _pf: &Portfolio) -> Vec<Order> {
        std::mem::take(&mut self.0.borrow_mut().pending_orders)
    }
}

#[test]
fn test_engine_round_trip_feed_cross() {
    init_tracing();
    // A feed add that crosses produces a fill the portfolio sees.
    let mut engine = SimulationEngine::new(Portfolio::new(100_000.0));
    let mut source = ReplayDataSource::new(vec![
        add(1, "AAPL", 1, Side::Bid, 100, 50),
        add(2, "AAPL", 2, Side::Ask, 99, 40),
    ]);

    engine.run(&mut source);

    // The aggressor was the ask: the tracked position is short 40 at the
    // resting bid's price of 100 ticks.
    let position = engine.portfolio().position("AAPL").unwrap();
    assert_eq!(position.quantity, -40);
    assert!((position.average_price - price_to_f64(100)).abs() < 1e-9);

    let book = engine.book("AAPL").unwrap();
    assert_eq!(book.best_bid_quantity(), 10);
    assert_eq!(book.trade_count(), 1);
    assert_eq!(book.trades()[0].price, 100);
}

#[test]
fn test_events_dispatch_in_timestamp_order() {
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let mut engine = SimulationEngine::new(Portfolio::new(100_000.0));
    engine.register_strategy(
        Box::new(RecorderStrategy(recorder.clone())),
        StrategyParams::new(),
    );

    // Inject out-of-order extra events; the queue reorders them against
    // the source stream.
    engine.inject(add(5, "AAPL", 10, Side::Bid, 90, 1));
    engine.inject(add(3, "AAPL", 11, Side::Bid, 91, 1));

    let mut source = ReplayDataSource::new(vec![
        add(1, "AAPL", 1, Side::Bid, 95, 1),
        add(4, "AAPL", 2, Side::Bid, 94, 1),
    ]);
    engine.run(&mut source);

    assert_eq!(recorder.borrow().market_data_seen, 4);
    assert_eq!(engine.events_processed(), 4);
    assert_eq!(engine.current_time(), 5);
    // All four bids rest (none cross).
    assert_eq!(engine.book("AAPL").unwrap().order_count(), 4);
}

#[test]
fn test_strategy_order_flow_and_fill_callbacks() {
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    // The strategy sells 30 at market as soon as it sees market data.
    recorder.borrow_mut().pending_orders = vec![Order::market(0, Side::Ask, 30, 0)];

    let mut engine = SimulationEngine::new(Portfolio::new(100_000.0));
    engine.register_strategy(
        Box::new(RecorderStrategy(recorder.clone())),
        StrategyParams::new(),
    );

    let mut source = ReplayDataSource::new(vec![add(1, "AAPL", 1, Side::Bid, 100, 50)]);
    engine.run(&mut source);

    let recorder = recorder.borrow();
    assert!(recorder.started);
    assert!(recorder.ended);
    assert_eq!(recorder.fills_seen.len(), 1);
    assert_eq!(recorder.fills_seen[0].quantity, 30);
    assert_eq!(recorder.fills_seen[0].taker_side, Side::Ask);

    let position = engine.portfolio().position("AAPL").unwrap();
    assert_eq!(position.quantity, -30);
    assert_eq!(engine.book("AAPL").unwrap().best_bid_quantity(), 20);
}

#[test]
fn test_feed_trade_rows_are_informational_for_the_book() {
    let mut engine = SimulationEngine::new(Portfolio::new(100_000.0));
    let mut source = ReplayDataSource::new(vec![
        add(1, "AAPL", 1, Side::Bid, 100, 50),
        Event::market_data(
            2,
            "AAPL",
            MarketDataUpdate::Trade {
                side: Side::Ask,
                price: 100,
                quantity: 10,
            },
        ),
        Event::market_data(
            3,
            "AAPL",
            MarketDataUpdate::Snapshot {
                bids: vec![(90, 1)],
                asks: vec![(110, 1)],
            },
        ),
    ]);
    engine.run(&mut source);

    // The book reflects only the add/cancel stream.
    let book = engine.book("AAPL").unwrap();
    assert_eq!(book.best_bid_quantity(), 50);
    assert_eq!(book.trade_count(), 0);
    assert!(engine.portfolio().position("AAPL").is_none());
}

#[test]
fn test_fill_events_update_portfolio() {
    let mut engine = SimulationEngine::new(Portfolio::new(100_000.0));
    let mut source = CsvFillSource::new();
    engine.run(&mut source);

    let position = engine.portfolio().position("AAPL").unwrap();
    assert_eq!(position.quantity, 25);
}

/// A tiny hand-rolled source standing in for a CSV TRADE row stream.
struct CsvFillSource {
    sent: bool,
}

impl CsvFillSource {
    fn new() -> Self {
        Self { sent: false }
    }
}

impl DataSource for CsvFillSource {
    fn has_next(&self) -> bool {
        !self.sent
    }

    fn next(&mut self) -> Option<Event> {
        if self.sent {
            return None;
        }
        self.sent = true;
        Some(Event::fill(
            1,
            "AAPL",
            Trade {
                trade_id: uuid::Uuid::nil(),
                taker_order_id: 0,
                maker_order_id: 0,
                taker_side: Side::Bid,
                price: 10_000,
                quantity: 25,
                timestamp: 1,
            },
        ))
    }

    fn reset(&mut self) {
        self.sent = false;
    }
}

#[test]
fn test_end_of_day_snapshots_history() {
    let mut engine = SimulationEngine::new(Portfolio::new(100_000.0));
    let mut source = ReplayDataSource::new(vec![
        add(1, "AAPL", 1, Side::Bid, 100, 50),
        Event::end_of_day(10),
        add(20, "AAPL", 2, Side::Ask, 102, 50),
        Event::end_of_day(30),
    ]);
    engine.run(&mut source);

    // Two EOD snapshots plus the implicit final one at the end of the run.
    let snapshots = engine.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].timestamp, 10);
    assert_eq!(snapshots[1].timestamp, 30);
    assert!((snapshots[0].equity - 100_000.0).abs() < 1e-9);
}

#[test]
fn test_equity_stays_at_initial_without_fills() {
    let mut engine = SimulationEngine::new(Portfolio::new(50_000.0));
    let mut source = ReplayDataSource::new(vec![
        add(1, "AAPL", 1, Side::Bid, 100, 50),
        add(2, "AAPL", 2, Side::Ask, 104, 50),
        Event::end_of_day(3),
    ]);
    let result = engine.run(&mut source);

    assert_eq!(result.trade_count, 0);
    assert_eq!(result.total_return, 0.0);
    for (_, equity) in &result.equity_curve {
        assert!((equity - 50_000.0).abs() < 1e-9);
    }
}

#[test]
fn test_stop_order_activates_on_touch() {
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    // Park a sell stop triggered when the mark drops to 95 (ticks 9_500
    // convert to 95.0; marks are converted prices).
    recorder.borrow_mut().pending_orders =
        vec![Order::stop(0, Side::Ask, 9_500, 10, 0)];

    let mut engine = SimulationEngine::new(Portfolio::new(100_000.0));
    engine.register_strategy(
        Box::new(RecorderStrategy(recorder.clone())),
        StrategyParams::new(),
    );

    let mut source = ReplayDataSource::new(vec![
        // Mark settles at 100.0: stop stays parked.
        add(1, "AAPL", 1, Side::Bid, 9_990, 50),
        add(2, "AAPL", 2, Side::Ask, 10_010, 50),
        // Bid collapses: the mid (89.0 + 100.1) / 2 = 94.55 touches the
        // 95.0 trigger, the stop becomes a market sell and hits the
        // remaining bid.
        Event::market_data(3, "AAPL", MarketDataUpdate::CancelOrder { order_id: 1 }),
        add(4, "AAPL", 3, Side::Bid, 8_900, 50),
    ]);
    engine.run(&mut source);

    let recorder = recorder.borrow();
    assert_eq!(recorder.fills_seen.len(), 1);
    assert_eq!(recorder.fills_seen[0].quantity, 10);
    assert_eq!(recorder.fills_seen[0].price, 8_900);

    let position = engine.portfolio().position("AAPL").unwrap();
    assert_eq!(position.quantity, -10);
}

#[test]
fn test_calculator_signals_reach_strategies() {
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let mut engine = SimulationEngine::new(Portfolio::new(100_000.0));
    engine.register_strategy(
        Box::new(RecorderStrategy(recorder.clone())),
        StrategyParams::new(),
    );
    engine.register_calculator(Box::new(VpinCalculator::new(16)));

    let mut source = ReplayDataSource::new(vec![
        add(1, "AAPL", 1, Side::Bid, 100, 50),
        // Crossing ask produces a trade, arming the VPIN window; the
        // following market event synthesizes a signal.
        add(2, "AAPL", 2, Side::Ask, 100, 10),
        add(3, "AAPL", 3, Side::Ask, 105, 10),
    ]);
    engine.run(&mut source);

    assert!(recorder.borrow().signals_seen.contains(&"vpin".to_string()));
}

#[test]
fn test_clear_event_wipes_book() {
    let mut engine = SimulationEngine::new(Portfolio::new(100_000.0));
    let mut source = ReplayDataSource::new(vec![
        add(1, "AAPL", 1, Side::Bid, 100, 50),
        Event::market_data(2, "AAPL", MarketDataUpdate::Clear),
    ]);
    engine.run(&mut source);

    let book = engine.book("AAPL").unwrap();
    assert_eq!(book.order_count(), 0);
    assert_eq!(book.best_bid(), None);
    assert_eq!(engine.mark_price("AAPL"), 0.0);
}

#[test]
fn test_stop_handle_halts_run() {
    let mut engine = SimulationEngine::new(Portfolio::new(100_000.0));
    let handle = engine.stop_handle();
    handle.stop();

    let mut source = ReplayDataSource::new(vec![
        add(1, "AAPL", 1, Side::Bid, 100, 50),
        add(2, "AAPL", 2, Side::Ask, 105, 50),
    ]);
    engine.run(&mut source);

    // Stopped before the first event was dispatched.
    assert_eq!(engine.events_processed(), 0);
    assert!(engine.book("AAPL").is_none());
}

#[test]
fn test_deterministic_replay() {
    let events = vec![
        add(1, "AAPL", 1, Side::Bid, 100, 50),
        add(2, "AAPL", 2, Side::Ask, 99, 40),
        add(3, "AAPL", 3, Side::Ask, 101, 25),
        Event::end_of_day(4),
    ];

    let run = |events: Vec<Event>| {
        let mut engine = SimulationEngine::new(Portfolio::new(100_000.0));
        let mut source = ReplayDataSource::new(events);
        engine.run(&mut source);
        engine.book("AAPL").unwrap().trades()
    };

    let first = run(events.clone());
    let second = run(events);
    // Identical inputs reproduce identical executions, trade ids included.
    assert_eq!(first, second);
}

#[test]
fn test_modify_and_cancel_feed_round_trip() {
    let mut engine = SimulationEngine::new(Portfolio::new(100_000.0));
    let mut source = ReplayDataSource::new(vec![
        add(1, "AAPL", 1, Side::Bid, 100, 50),
        add(2, "AAPL", 2, Side::Bid, 100, 20),
        Event::market_data(
            3,
            "AAPL",
            MarketDataUpdate::ModifyOrder {
                order_id: 1,
                new_quantity: 10,
                new_price: None,
            },
        ),
        Event::market_data(4, "AAPL", MarketDataUpdate::CancelOrder { order_id: 2 }),
    ]);
    engine.run(&mut source);

    let book = engine.book("AAPL").unwrap();
    assert_eq!(book.best_bid_quantity(), 10);
    let orders = book.orders_at_price(100, Side::Bid);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, 1);
}
