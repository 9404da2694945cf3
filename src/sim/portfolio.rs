//! Positions, PnL and drawdown bookkeeping.
//!
//! Accounting convention: `cash` starts at `initial_capital` and moves only
//! through commissions and slippage costs; trade PnL lives in the positions
//! as realized/unrealized amounts. Equity is therefore
//! `cash + sum(realized) + sum(unrealized at current marks)`, and equals the
//! initial capital exactly until the first fill.

use crate::orderbook::order::{Quantity, Side, TimestampNs};
use crate::orderbook::trade::Trade;
use crate::utils::price_to_f64;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Per-unit price adjustment applied to a fill before it hits the
/// portfolio: buys execute that much higher, sells that much lower.
/// Receives the actual execution being applied.
pub type SlippageModel = Box<dyn Fn(&Trade) -> f64 + Send>;

/// A signed per-symbol position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// The instrument
    pub symbol: String,
    /// Signed quantity: long positive, short negative
    pub quantity: i64,
    /// Average entry price of the open quantity; 0 when flat
    pub average_price: f64,
    /// PnL locked in by reducing/closing fills
    pub realized_pnl: f64,
    /// Total unsigned quantity traded through this position
    pub total_traded: Quantity,
}

impl Position {
    /// A flat position in `symbol`.
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            ..Self::default()
        }
    }

    /// Apply a signed fill at `price`. Same-direction fills extend the
    /// position at a blended average price; opposite-direction fills
    /// realize PnL against the average and may flip the position.
    pub fn apply_fill(&mut self, signed_quantity: i64, price: f64) {
        if signed_quantity == 0 {
            return;
        }
        self.total_traded += signed_quantity.unsigned_abs();

        if self.quantity == 0 || (self.quantity > 0) == (signed_quantity > 0) {
            // Extending (or opening): blend the average.
            let old_abs = self.quantity.unsigned_abs() as f64;
            let add_abs = signed_quantity.unsigned_abs() as f64;
            self.average_price =
                (self.average_price * old_abs + price * add_abs) / (old_abs + add_abs);
            self.quantity += signed_quantity;
            return;
        }

        // Reducing: realize against the average on the closed amount.
        let closing = self.quantity.unsigned_abs().min(signed_quantity.unsigned_abs()) as i64;
        let direction = if self.quantity > 0 { 1.0 } else { -1.0 };
        self.realized_pnl += (price - self.average_price) * closing as f64 * direction;
        self.quantity += signed_quantity;

        if self.quantity == 0 {
            self.average_price = 0.0;
        } else if (self.quantity > 0) != (direction > 0.0) {
            // Flipped through flat: the remainder opens at the fill price.
            self.average_price = price;
        }
    }

    /// Mark-to-market PnL of the open quantity at `mark`.
    pub fn unrealized_pnl(&self, mark: f64) -> f64 {
        if self.quantity == 0 || mark == 0.0 {
            return 0.0;
        }
        (mark - self.average_price) * self.quantity as f64
    }
}

/// A point-in-time record of the portfolio, appended on EndOfDay events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// When the snapshot was taken
    pub timestamp: TimestampNs,
    /// Equity at current marks
    pub equity: f64,
    /// Cash component
    pub cash: f64,
    /// Sum of realized PnL across positions
    pub realized_pnl: f64,
    /// Sum of unrealized PnL across positions
    pub unrealized_pnl: f64,
    /// Open positions keyed by symbol
    pub positions: HashMap<String, Position>,
}

/// Cash, positions and drawdown tracking for one backtest.
pub struct Portfolio {
    initial_capital: f64,
    cash: f64,
    positions: HashMap<String, Position>,
    commission_rate: f64,
    slippage: Option<SlippageModel>,
    max_equity: f64,
    max_drawdown: f64,
    fills_applied: u64,
}

impl Portfolio {
    /// A fresh portfolio holding only cash.
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: HashMap::new(),
            commission_rate: 0.0,
            slippage: None,
            max_equity: initial_capital,
            max_drawdown: 0.0,
            fills_applied: 0,
        }
    }

    /// Set the proportional commission rate (e.g. 0.001 = 10 bps of
    /// notional per fill).
    pub fn with_commission_rate(mut self, commission_rate: f64) -> Self {
        self.commission_rate = commission_rate;
        self
    }

    /// Attach a slippage model. It receives each actual execution and
    /// returns a per-unit price penalty.
    pub fn with_slippage(mut self, slippage: SlippageModel) -> Self {
        self.slippage = Some(slippage);
        self
    }

    /// The starting capital.
    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    /// Cash component: initial capital minus cumulative fees and slippage.
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Number of fills applied so far.
    pub fn fills_applied(&self) -> u64 {
        self.fills_applied
    }

    /// The position for `symbol`, if one was ever opened.
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// All positions.
    pub fn positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    /// Sum of realized PnL across positions.
    pub fn realized_pnl(&self) -> f64 {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }

    /// Sum of unrealized PnL across positions at the given marks.
    pub fn unrealized_pnl(&self, marks: &HashMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|position| {
                let mark = marks.get(&position.symbol).copied().unwrap_or(0.0);
                position.unrealized_pnl(mark)
            })
            .sum()
    }

    /// Equity at the given marks: `cash + realized + unrealized`.
    pub fn equity(&self, marks: &HashMap<String, f64>) -> f64 {
        self.cash + self.realized_pnl() + self.unrealized_pnl(marks)
    }

    /// Worst peak-to-trough equity decline seen so far, as a fraction of
    /// the peak.
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    /// Apply one execution. The sign of the position change follows the
    /// aggressor side of the trade: a Bid taker buys, an Ask taker sells.
    pub fn apply_fill(&mut self, symbol: &str, trade: &Trade) {
        let signed_quantity = match trade.taker_side {
            Side::Bid => trade.quantity as i64,
            Side::Ask => -(trade.quantity as i64),
        };

        let mut price = price_to_f64(trade.price);
        if let Some(slippage) = &self.slippage {
            let penalty = slippage(trade);
            price += match trade.taker_side {
                Side::Bid => penalty,
                Side::Ask => -penalty,
            };
        }

        let commission = self.commission_rate * price.abs() * trade.quantity as f64;
        self.cash -= commission;
        self.fills_applied += 1;

        self.positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::new(symbol))
            .apply_fill(signed_quantity, price);

        debug!(
            "Fill applied: {} {} x {} @ {:.4} (commission {:.4})",
            symbol, signed_quantity, trade.quantity, price, commission
        );
    }

    /// Re-mark the portfolio: updates the running equity peak and max
    /// drawdown. Returns the equity at these marks.
    pub fn mark(&mut self, marks: &HashMap<String, f64>) -> f64 {
        let equity = self.equity(marks);
        if equity > self.max_equity {
            self.max_equity = equity;
        }
        if self.max_equity > 0.0 {
            let drawdown = (self.max_equity - equity) / self.max_equity;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
        equity
    }

    /// Capture a snapshot at `timestamp` and the given marks.
    pub fn snapshot(&self, timestamp: TimestampNs, marks: &HashMap<String, f64>) -> PortfolioSnapshot {
        PortfolioSnapshot {
            timestamp,
            equity: self.equity(marks),
            cash: self.cash,
            realized_pnl: self.realized_pnl(),
            unrealized_pnl: self.unrealized_pnl(marks),
            positions: self.positions.clone(),
        }
    }
}
