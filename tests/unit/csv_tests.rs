//! CSV data source: column mapping and malformed-row tolerance

use lobsim::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const HEADER: &str = "timestamp_ns,symbol,type,side,price,quantity,order_id";

fn source_from(rows: &[&str]) -> CsvDataSource {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{HEADER}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
    file.flush().unwrap();
    CsvDataSource::open(file.path()).unwrap()
}

fn drain(source: &mut CsvDataSource) -> Vec<Event> {
    let mut events = Vec::new();
    while source.has_next() {
        events.push(source.next().unwrap());
    }
    events
}

#[test]
fn test_add_row_maps_to_add_order() {
    let mut source = source_from(&["1000,AAPL,ADD,BID,10000,50,1"]);
    let events = drain(&mut source);

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.timestamp, 1000);
    assert_eq!(event.symbol, "AAPL");
    match &event.payload {
        EventPayload::MarketData(MarketDataUpdate::AddOrder {
            order_id,
            side,
            price,
            quantity,
        }) => {
            assert_eq!(*order_id, 1);
            assert_eq!(*side, Side::Bid);
            assert_eq!(*price, 10_000);
            assert_eq!(*quantity, 50);
        }
        other => panic!("expected AddOrder, got {other:?}"),
    }
}

#[test]
fn test_modify_and_cancel_rows() {
    let mut source = source_from(&[
        "1000,AAPL,MODIFY,BID,0,30,1",
        "1001,AAPL,MODIFY,BID,10100,30,1",
        "1002,AAPL,CANCEL,BID,0,0,1",
    ]);
    let events = drain(&mut source);

    match &events[0].payload {
        EventPayload::MarketData(MarketDataUpdate::ModifyOrder {
            order_id,
            new_quantity,
            new_price,
        }) => {
            assert_eq!(*order_id, 1);
            assert_eq!(*new_quantity, 30);
            // Non-positive price column means quantity-only modify.
            assert_eq!(*new_price, None);
        }
        other => panic!("expected ModifyOrder, got {other:?}"),
    }
    match &events[1].payload {
        EventPayload::MarketData(MarketDataUpdate::ModifyOrder { new_price, .. }) => {
            assert_eq!(*new_price, Some(10_100));
        }
        other => panic!("expected ModifyOrder, got {other:?}"),
    }
    match &events[2].payload {
        EventPayload::MarketData(MarketDataUpdate::CancelOrder { order_id }) => {
            assert_eq!(*order_id, 1);
        }
        other => panic!("expected CancelOrder, got {other:?}"),
    }
}

#[test]
fn test_trade_row_maps_to_fill_with_feed_side() {
    let mut source = source_from(&["2000,AAPL,TRADE,ASK,10000,40,0"]);
    let events = drain(&mut source);

    match &events[0].payload {
        EventPayload::Fill(trade) => {
            // The side column is authoritative for the aggressor.
            assert_eq!(trade.taker_side, Side::Ask);
            assert_eq!(trade.price, 10_000);
            assert_eq!(trade.quantity, 40);
            assert_eq!(trade.taker_order_id, 0);
            assert_eq!(trade.maker_order_id, 0);
        }
        other => panic!("expected Fill, got {other:?}"),
    }
}

#[test]
fn test_eod_row() {
    let mut source = source_from(&["3000,,EOD,,0,0,0"]);
    let events = drain(&mut source);
    assert!(matches!(events[0].payload, EventPayload::EndOfDay));
    assert_eq!(events[0].timestamp, 3000);
}

#[test]
fn test_unknown_type_is_noop() {
    let mut source = source_from(&["1000,AAPL,HALT,BID,10000,50,1"]);
    let events = drain(&mut source);
    assert!(matches!(
        events[0].payload,
        EventPayload::MarketData(MarketDataUpdate::NoOp)
    ));
}

#[test]
fn test_malformed_rows_degrade_to_noop() {
    let mut source = source_from(&[
        "1000,AAPL,ADD,SIDEWAYS,10000,50,1", // bad side
        "1001,AAPL,ADD,BID,-5,50,2",         // negative price
        "1002,AAPL,ADD,BID,abc,50,3",        // unparsable price
        "notanumber,AAPL,ADD,BID,10000,50,4",
    ]);
    let events = drain(&mut source);

    assert_eq!(events.len(), 4);
    for event in &events[..3] {
        assert!(matches!(
            event.payload,
            EventPayload::MarketData(MarketDataUpdate::NoOp)
        ));
    }
    // Unparsable timestamp degrades to 0 but the row itself is well-formed.
    assert_eq!(events[3].timestamp, 0);
    assert!(matches!(
        events[3].payload,
        EventPayload::MarketData(MarketDataUpdate::AddOrder { .. })
    ));
}

#[test]
fn test_quoted_symbol_with_comma() {
    let mut source = source_from(&["1000,\"A,B\",ADD,BID,10000,50,1"]);
    let events = drain(&mut source);
    assert_eq!(events[0].symbol, "A,B");
}

#[test]
fn test_reset_rewinds() {
    let mut source = source_from(&["1000,AAPL,ADD,BID,10000,50,1"]);
    assert!(source.has_next());
    let _ = source.next();
    assert!(!source.has_next());

    source.reset();
    assert!(source.has_next());
    assert_eq!(source.next().unwrap().timestamp, 1000);
}

#[test]
fn test_open_missing_file_errors() {
    assert!(CsvDataSource::open("/definitely/not/here.csv").is_err());
}
