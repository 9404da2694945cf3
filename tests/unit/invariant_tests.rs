//! Property tests: book invariants under random operation sequences

use lobsim::prelude::*;
use proptest::prelude::*;
use proptest::strategy::Strategy;

#[derive(Debug, Clone)]
enum Op {
    Add { side: Side, price: u128, quantity: u64 },
    Cancel { slot: usize },
    Modify { slot: usize, quantity: u64 },
    Market { side: Side, quantity: u64 },
}

fn op_strategy() -> impl proptest::strategy::Strategy<Value = Op> {
    prop_oneof![
        4 => (prop::bool::ANY, 90u128..111, 1u64..50).prop_map(|(bid, price, quantity)| Op::Add {
            side: if bid { Side::Bid } else { Side::Ask },
            price,
            quantity,
        }),
        2 => (0usize..64).prop_map(|slot| Op::Cancel { slot }),
        2 => (0usize..64, 1u64..60).prop_map(|(slot, quantity)| Op::Modify { slot, quantity }),
        1 => (prop::bool::ANY, 1u64..80).prop_map(|(bid, quantity)| Op::Market {
            side: if bid { Side::Bid } else { Side::Ask },
            quantity,
        }),
    ]
}

/// Walk every level and check the structural invariants.
fn assert_book_consistent(book: &OrderBook) {
    // Never crossed after a public operation returns.
    if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
        assert!(bid < ask, "book crossed: bid {bid} >= ask {ask}");
    }

    let mut seen = std::collections::HashSet::new();
    let mut resting = 0usize;
    for side in [Side::Bid, Side::Ask] {
        let views = match side {
            Side::Bid => book.bid_levels(usize::MAX),
            Side::Ask => book.ask_levels(usize::MAX),
        };
        for view in views {
            let orders = book.orders_at_price(view.price, side);
            // No empty levels survive.
            assert!(!orders.is_empty(), "empty level at {}", view.price);
            // Aggregates match the queue contents.
            assert_eq!(
                view.total_quantity,
                orders.iter().map(|order| order.remaining).sum::<u64>()
            );
            assert_eq!(view.order_count as usize, orders.len());
            for order in &orders {
                // Remaining within bounds, ids unique across the book.
                assert!(order.remaining > 0 && order.remaining <= order.quantity);
                assert!(seen.insert(order.id), "duplicate id {}", order.id);
            }
            resting += orders.len();
        }
    }
    assert_eq!(resting, book.order_count());

    // Cache coherence: cached best equals the first level's price.
    assert_eq!(
        book.best_bid(),
        book.bid_levels(1).first().map(|view| view.price)
    );
    assert_eq!(
        book.best_ask(),
        book.ask_levels(1).first().map(|view| view.price)
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariants_hold_under_random_sequences(ops in prop::collection::vec(op_strategy(), 1..120)) {
        let book = OrderBook::new("PROP");
        let mut next_id: u64 = 1;
        let mut live_ids: Vec<u64> = Vec::new();
        let mut timestamp: u64 = 0;

        for op in ops {
            timestamp += 1;
            match op {
                Op::Add { side, price, quantity } => {
                    let id = next_id;
                    next_id += 1;
                    let before = book.trades().len();
                    let result = book
                        .add_limit_order(id, price, quantity, side, TimeInForce::Gtc, timestamp)
                        .unwrap();

                    // Conservation: the aggressor's executed quantity equals
                    // the sum of the per-trade quantities.
                    let traded: u64 = result.trades.iter().map(|t| t.quantity).sum();
                    prop_assert_eq!(result.executed_quantity(), traded);
                    prop_assert_eq!(book.trades().len(), before + result.trades.len());

                    if result.remaining_quantity > 0 {
                        live_ids.push(id);
                    }
                    for filled in &result.filled_order_ids {
                        live_ids.retain(|live| live != filled);
                    }
                }
                Op::Cancel { slot } => {
                    if live_ids.is_empty() {
                        prop_assert_eq!(
                            book.cancel_order(99_999_999),
                            Err(OrderBookError::OrderNotFound(99_999_999))
                        );
                    } else {
                        let id = live_ids[slot % live_ids.len()];
                        // Cancels can race fills in this model only through
                        // our own bookkeeping; a live id must cancel cleanly.
                        if book.get_order(id).is_some() {
                            prop_assert!(book.cancel_order(id).is_ok());
                        }
                        live_ids.retain(|live| *live != id);
                    }
                }
                Op::Modify { slot, quantity } => {
                    if !live_ids.is_empty() {
                        let id = live_ids[slot % live_ids.len()];
                        if book.get_order(id).is_some() {
                            let result = book.modify_order(id, None, quantity, timestamp).unwrap();
                            for filled in &result.filled_order_ids {
                                live_ids.retain(|live| live != filled);
                            }
                            if book.get_order(id).is_none() {
                                live_ids.retain(|live| *live != id);
                            }
                        }
                    }
                }
                Op::Market { side, quantity } => {
                    let id = next_id;
                    next_id += 1;
                    let result = book.submit_market_order(id, quantity, side, timestamp).unwrap();
                    let traded: u64 = result.trades.iter().map(|t| t.quantity).sum();
                    prop_assert_eq!(result.executed_quantity(), traded);
                    for filled in &result.filled_order_ids {
                        live_ids.retain(|live| live != filled);
                    }
                }
            }

            assert_book_consistent(&book);
        }
    }

    #[test]
    fn time_priority_survives_shrinks(
        quantities in prop::collection::vec(5u64..50, 2..8),
        shrink_index in 0usize..8,
    ) {
        let book = OrderBook::new("PROP");
        for (offset, quantity) in quantities.iter().enumerate() {
            let id = offset as u64 + 1;
            book.add_limit_order(id, 100, *quantity, Side::Bid, TimeInForce::Gtc, id)
                .unwrap();
        }

        // Shrink one resting order in place; arrival order must not change.
        let target = (shrink_index % quantities.len()) as u64 + 1;
        let new_quantity = quantities[(target - 1) as usize] - 1;
        book.modify_order(target, None, new_quantity.max(1), 100).unwrap();

        let ids: Vec<u64> = book
            .orders_at_price(100, Side::Bid)
            .iter()
            .map(|order| order.id)
            .collect();
        let expected: Vec<u64> = (1..=quantities.len() as u64).collect();
        prop_assert_eq!(ids, expected);
    }
}
