//! Data sources: where the engine pulls its time-sorted events from.

use super::event::{Event, MarketDataUpdate};
use crate::orderbook::order::{Price, Quantity, Side};
use crate::orderbook::trade::Trade;
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

/// Errors opening or reading a data source. Per-row problems are not
/// errors: a malformed row degrades to a no-op market-data event.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// The underlying file could not be read
    #[error("I/O error reading market data: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV layer failed before any row could be interpreted
    #[error("CSV error reading market data: {0}")]
    Csv(#[from] csv::Error),
}

/// A producer of time-sorted simulation events.
///
/// Implementations must deliver events in non-decreasing timestamp order;
/// the engine's global ordering depends on it.
pub trait DataSource {
    /// True while `next` will yield another event.
    fn has_next(&self) -> bool;

    /// The next event. Returns `None` once exhausted.
    fn next(&mut self) -> Option<Event>;

    /// Rewind to the first event.
    fn reset(&mut self);
}

/// An in-memory source over a pre-built event vector. The caller is
/// responsible for timestamp ordering.
pub struct ReplayDataSource {
    events: Vec<Event>,
    cursor: usize,
}

impl ReplayDataSource {
    /// Wrap a vector of events.
    pub fn new(events: Vec<Event>) -> Self {
        Self { events, cursor: 0 }
    }
}

impl DataSource for ReplayDataSource {
    fn has_next(&self) -> bool {
        self.cursor < self.events.len()
    }

    fn next(&mut self) -> Option<Event> {
        let event = self.events.get(self.cursor).cloned();
        if event.is_some() {
            self.cursor += 1;
        }
        event
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Reference CSV source.
///
/// Expects a header row and the columns
/// `timestamp_ns, symbol, type, side, price, quantity, order_id`, with
/// `type` one of `ADD | MODIFY | CANCEL | TRADE | EOD` (anything else maps
/// to a no-op market-data event) and `side` one of `BID | ASK`. Prices are
/// signed integers in ticks; quantities unsigned. Quoted fields with
/// escaped commas are handled by the CSV layer.
///
/// For `MODIFY` rows a non-positive price means "quantity change only".
/// `TRADE` rows become fill events whose aggressor side is taken from the
/// `side` column; their order ids are zero.
pub struct CsvDataSource {
    events: Vec<Event>,
    cursor: usize,
}

impl CsvDataSource {
    /// Load and map every row of `path` eagerly.
    ///
    /// # Errors
    /// [`DataError`] when the file cannot be opened or the CSV layer fails
    /// outright. Individual malformed rows do not error; they yield no-op
    /// events so replay positions stay aligned with the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path.as_ref())?;

        let mut events = Vec::new();
        for row in reader.records() {
            let record = row?;
            events.push(Self::map_record(&record));
        }
        Ok(Self { events, cursor: 0 })
    }

    /// Map one CSV record to an event, degrading to a no-op on any
    /// missing or unparsable field.
    fn map_record(record: &csv::StringRecord) -> Event {
        let timestamp = record
            .get(0)
            .and_then(|field| field.parse::<u64>().ok())
            .unwrap_or(0);
        let symbol = record.get(1).unwrap_or("").to_string();

        let Some(row_type) = record.get(2) else {
            return Event::market_data(timestamp, symbol, MarketDataUpdate::NoOp);
        };

        match row_type {
            "ADD" => {
                let Some((side, price, quantity, order_id)) = Self::order_fields(record) else {
                    return Self::noop(timestamp, symbol, record);
                };
                Event::market_data(
                    timestamp,
                    symbol,
                    MarketDataUpdate::AddOrder {
                        order_id,
                        side,
                        price,
                        quantity,
                    },
                )
            }
            "MODIFY" => {
                let Some(order_id) = Self::parse_u64(record.get(6)) else {
                    return Self::noop(timestamp, symbol, record);
                };
                let Some(new_quantity) = Self::parse_u64(record.get(5)) else {
                    return Self::noop(timestamp, symbol, record);
                };
                let new_price = Self::parse_i64(record.get(4))
                    .filter(|price| *price > 0)
                    .map(|price| price as Price);
                Event::market_data(
                    timestamp,
                    symbol,
                    MarketDataUpdate::ModifyOrder {
                        order_id,
                        new_quantity,
                        new_price,
                    },
                )
            }
            "CANCEL" => {
                let Some(order_id) = Self::parse_u64(record.get(6)) else {
                    return Self::noop(timestamp, symbol, record);
                };
                Event::market_data(timestamp, symbol, MarketDataUpdate::CancelOrder { order_id })
            }
            "TRADE" => {
                let Some((side, price, quantity, _)) = Self::order_fields(record) else {
                    return Self::noop(timestamp, symbol, record);
                };
                let trade = Trade {
                    trade_id: Uuid::nil(),
                    taker_order_id: 0,
                    maker_order_id: 0,
                    taker_side: side,
                    price,
                    quantity,
                    timestamp,
                };
                Event::fill(timestamp, symbol, trade)
            }
            "EOD" => Event::end_of_day(timestamp),
            _ => Event::market_data(timestamp, symbol, MarketDataUpdate::NoOp),
        }
    }

    /// The shared `(side, price, quantity, order_id)` block of ADD/TRADE
    /// rows. Negative or unparsable prices invalidate the row.
    fn order_fields(record: &csv::StringRecord) -> Option<(Side, Price, Quantity, u64)> {
        let side = match record.get(3)? {
            "BID" => Side::Bid,
            "ASK" => Side::Ask,
            _ => return None,
        };
        let price = Self::parse_i64(record.get(4)).filter(|price| *price > 0)? as Price;
        let quantity = Self::parse_u64(record.get(5))?;
        let order_id = Self::parse_u64(record.get(6)).unwrap_or(0);
        Some((side, price, quantity, order_id))
    }

    fn parse_u64(field: Option<&str>) -> Option<u64> {
        field.and_then(|value| value.parse::<u64>().ok())
    }

    fn parse_i64(field: Option<&str>) -> Option<i64> {
        field.and_then(|value| value.parse::<i64>().ok())
    }

    fn noop(timestamp: u64, symbol: String, record: &csv::StringRecord) -> Event {
        warn!("Discarding unparsable feed row: {:?}", record);
        Event::market_data(timestamp, symbol, MarketDataUpdate::NoOp)
    }
}

impl DataSource for CsvDataSource {
    fn has_next(&self) -> bool {
        self.cursor < self.events.len()
    }

    fn next(&mut self) -> Option<Event> {
        let event = self.events.get(self.cursor).cloned();
        if event.is_some() {
            self.cursor += 1;
        }
        event
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}
