//! Order book error types

use crate::orderbook::order::{OrderId, OrderKind, Price, Quantity};
use std::fmt;

/// Errors that can occur within the OrderBook.
///
/// Every public book operation is total: invalid input maps to one of these
/// variants and leaves the book untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrderBookError {
    /// Order not found in the book
    OrderNotFound(OrderId),

    /// An order with this id is already resting
    DuplicateOrderId(OrderId),

    /// Order quantity must be positive
    InvalidQuantity {
        /// The rejected order id
        order_id: OrderId,
        /// The offending quantity
        quantity: Quantity,
    },

    /// Limit price must be positive
    InvalidPrice {
        /// The offending price
        price: Price,
    },

    /// Order price is not a multiple of the configured tick size
    InvalidTickSize {
        /// The order price that failed validation
        price: Price,
        /// The configured tick size
        tick_size: Price,
    },

    /// The book does not accept this order kind directly (Stop and StopLimit
    /// are parked and activated by the simulation engine)
    UnsupportedOrderKind {
        /// The rejected kind
        kind: OrderKind,
    },
}

impl fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBookError::OrderNotFound(id) => write!(f, "Order not found: {id}"),
            OrderBookError::DuplicateOrderId(id) => write!(f, "Duplicate order id: {id}"),
            OrderBookError::InvalidQuantity { order_id, quantity } => {
                write!(f, "Invalid quantity {quantity} for order {order_id}")
            }
            OrderBookError::InvalidPrice { price } => write!(f, "Invalid price: {price}"),
            OrderBookError::InvalidTickSize { price, tick_size } => {
                write!(
                    f,
                    "invalid tick size: price {price} is not a multiple of tick size {tick_size}"
                )
            }
            OrderBookError::UnsupportedOrderKind { kind } => {
                write!(f, "order kind {kind} is not accepted by the book")
            }
        }
    }
}

impl std::error::Error for OrderBookError {}
