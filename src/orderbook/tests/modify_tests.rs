//! Tests for modify semantics: queue position is the whole point

use crate::orderbook::order::{Side, TimeInForce};
use crate::orderbook::{OrderBook, OrderBookError};

fn two_bids_at_100() -> OrderBook {
    let book = OrderBook::new("TEST");
    let _ = book.add_limit_order(1, 100, 30, Side::Bid, TimeInForce::Gtc, 1);
    let _ = book.add_limit_order(2, 100, 20, Side::Bid, TimeInForce::Gtc, 2);
    book
}

#[test]
fn test_shrink_preserves_queue_position() {
    let book = two_bids_at_100();

    let result = book.modify_order(1, None, 20, 3).unwrap();
    assert!(result.trades.is_empty());

    let orders = book.orders_at_price(100, Side::Bid);
    assert_eq!(orders[0].id, 1);
    assert_eq!(orders[0].remaining, 20);
    assert_eq!(orders[1].id, 2);
    assert_eq!(book.best_bid_quantity(), 40);
}

#[test]
fn test_increase_loses_queue_position() {
    let book = two_bids_at_100();

    let _ = book.modify_order(1, None, 50, 3).unwrap();

    let orders = book.orders_at_price(100, Side::Bid);
    assert_eq!(orders[0].id, 2);
    assert_eq!(orders[1].id, 1);
    assert_eq!(orders[1].remaining, 50);
    assert_eq!(book.best_bid_quantity(), 70);
}

#[test]
fn test_price_change_moves_to_new_level_tail() {
    let book = two_bids_at_100();
    let _ = book.add_limit_order(3, 99, 10, Side::Bid, TimeInForce::Gtc, 3);

    let _ = book.modify_order(1, Some(99), 30, 4).unwrap();

    // Old level kept the other order, new level appended at the tail.
    assert_eq!(book.best_bid_quantity(), 20);
    let orders = book.orders_at_price(99, Side::Bid);
    assert_eq!(orders[0].id, 3);
    assert_eq!(orders[1].id, 1);
}

#[test]
fn test_price_change_can_cross() {
    let book = OrderBook::new("TEST");
    let _ = book.add_limit_order(1, 100, 10, Side::Bid, TimeInForce::Gtc, 1);
    let _ = book.add_limit_order(2, 105, 10, Side::Ask, TimeInForce::Gtc, 2);

    // Re-pricing the bid through the ask matches immediately.
    let result = book.modify_order(1, Some(105), 10, 3).unwrap();
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].price, 105);
    assert_eq!(book.order_count(), 0);
}

#[test]
fn test_modify_to_zero_is_cancel() {
    let book = two_bids_at_100();

    let _ = book.modify_order(1, None, 0, 3).unwrap();
    assert_eq!(book.best_bid_quantity(), 20);
    assert!(book.get_order(1).is_none());
    assert_eq!(book.stats().orders_cancelled, 1);
}

#[test]
fn test_modify_unknown_order() {
    let book = OrderBook::new("TEST");
    assert_eq!(
        book.modify_order(42, None, 10, 1),
        Err(OrderBookError::OrderNotFound(42))
    );
}

#[test]
fn test_modify_empties_and_erases_level() {
    let book = OrderBook::new("TEST");
    let _ = book.add_limit_order(1, 100, 10, Side::Bid, TimeInForce::Gtc, 1);

    let _ = book.modify_order(1, Some(99), 10, 2).unwrap();
    assert_eq!(book.best_bid(), Some(99));
    assert!(book.orders_at_price(100, Side::Bid).is_empty());
}

#[test]
fn test_modify_onto_invalid_price_restores_order() {
    let book = OrderBook::with_tick_size("TEST", 5);
    let _ = book.add_limit_order(1, 100, 10, Side::Bid, TimeInForce::Gtc, 1);

    let result = book.modify_order(1, Some(103), 10, 2);
    assert!(matches!(
        result,
        Err(OrderBookError::InvalidTickSize { .. })
    ));

    // The original order is still resting (at the tail, but present).
    let order = book.get_order(1).unwrap();
    assert_eq!(order.price, 100);
    assert_eq!(order.remaining, 10);
}

#[test]
fn test_modify_counts_in_stats() {
    let book = two_bids_at_100();
    let _ = book.modify_order(1, None, 25, 3).unwrap();
    let _ = book.modify_order(2, None, 40, 4).unwrap();

    let stats = book.stats();
    assert_eq!(stats.orders_modified, 2);
}
