//! Backtest performance metrics over an equity series.
//!
//! Pure arithmetic: no engine state. Degenerate inputs (empty or
//! single-point series, zero denominators) produce zeros, never NaN.

use crate::orderbook::order::TimestampNs;
use serde::{Deserialize, Serialize};

/// Nanoseconds in a (365-day) year, for annualization.
const YEAR_NS: f64 = 365.0 * 24.0 * 3600.0 * 1e9;

/// Summary of a finished backtest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Final equity over initial capital, minus one
    pub total_return: f64,
    /// Total return scaled to a one-year horizon
    pub annualized_return: f64,
    /// Annualized standard deviation of per-step returns
    pub volatility: f64,
    /// Annualized mean return over volatility
    pub sharpe_ratio: f64,
    /// Like Sharpe, but only downside deviation in the denominator
    pub sortino_ratio: f64,
    /// Worst peak-to-trough equity decline, as a fraction of the peak
    pub max_drawdown: f64,
    /// Annualized return over max drawdown
    pub calmar_ratio: f64,
    /// Total traded notional over initial capital
    pub turnover: f64,
    /// Capacity proxy: capital the strategy could run at the observed
    /// turnover (`initial_capital / turnover`); 0 when nothing traded
    pub capacity_estimate: f64,
    /// Number of fills applied
    pub trade_count: u64,
    /// The equity series the metrics were computed from
    pub equity_curve: Vec<(TimestampNs, f64)>,
    /// Drawdown fraction at each equity point
    pub drawdown_curve: Vec<(TimestampNs, f64)>,
}

impl BacktestResult {
    /// Compute the full metric set from an equity series.
    ///
    /// `equity_curve` must be in timestamp order. Fewer than two points, a
    /// non-positive initial capital or a zero time span all yield zeros for
    /// the derived ratios (the curves are still returned).
    pub fn from_equity_curve(
        initial_capital: f64,
        equity_curve: Vec<(TimestampNs, f64)>,
        trade_count: u64,
        traded_notional: f64,
    ) -> Self {
        let mut result = BacktestResult {
            trade_count,
            drawdown_curve: drawdown_curve(&equity_curve),
            ..Default::default()
        };

        result.max_drawdown = result
            .drawdown_curve
            .iter()
            .map(|(_, drawdown)| *drawdown)
            .fold(0.0, f64::max);
        if initial_capital > 0.0 {
            result.turnover = traded_notional / initial_capital;
            if result.turnover > 0.0 {
                result.capacity_estimate = initial_capital / result.turnover;
            }
        }

        let Some((first_ts, _)) = equity_curve.first().copied() else {
            return result;
        };
        let Some((last_ts, last_equity)) = equity_curve.last().copied() else {
            return result;
        };

        if initial_capital > 0.0 {
            result.total_return = last_equity / initial_capital - 1.0;
        }

        let span_ns = last_ts.saturating_sub(first_ts) as f64;
        if equity_curve.len() < 2 || span_ns <= 0.0 || initial_capital <= 0.0 {
            result.equity_curve = equity_curve;
            return result;
        }

        let years = span_ns / YEAR_NS;
        result.annualized_return = result.total_return / years;

        // Per-step simple returns, annualized by the average step length.
        let returns: Vec<f64> = equity_curve
            .windows(2)
            .filter_map(|pair| {
                let (_, previous) = pair[0];
                let (_, current) = pair[1];
                (previous != 0.0).then(|| current / previous - 1.0)
            })
            .collect();

        if !returns.is_empty() {
            let steps_per_year = returns.len() as f64 / years;
            let mean = returns.iter().sum::<f64>() / returns.len() as f64;
            let variance = returns
                .iter()
                .map(|r| (r - mean).powi(2))
                .sum::<f64>()
                / returns.len() as f64;
            let std_dev = variance.sqrt();
            result.volatility = std_dev * steps_per_year.sqrt();

            if std_dev > 0.0 {
                result.sharpe_ratio = mean / std_dev * steps_per_year.sqrt();
            }

            let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
            if !downside.is_empty() {
                let downside_variance =
                    downside.iter().map(|r| r.powi(2)).sum::<f64>() / returns.len() as f64;
                let downside_dev = downside_variance.sqrt();
                if downside_dev > 0.0 {
                    result.sortino_ratio = mean / downside_dev * steps_per_year.sqrt();
                }
            }
        }

        if result.max_drawdown > 0.0 {
            result.calmar_ratio = result.annualized_return / result.max_drawdown;
        }

        result.equity_curve = equity_curve;
        result
    }
}

/// Drawdown fraction at each point of an equity series.
fn drawdown_curve(equity_curve: &[(TimestampNs, f64)]) -> Vec<(TimestampNs, f64)> {
    let mut peak = f64::MIN;
    equity_curve
        .iter()
        .map(|&(timestamp, equity)| {
            peak = peak.max(equity);
            let drawdown = if peak > 0.0 { (peak - equity) / peak } else { 0.0 };
            (timestamp, drawdown)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_series_yields_zeros() {
        let result = BacktestResult::from_equity_curve(100_000.0, Vec::new(), 0, 0.0);
        assert_eq!(result.total_return, 0.0);
        assert_eq!(result.sharpe_ratio, 0.0);
        assert_eq!(result.max_drawdown, 0.0);
        assert!(result.equity_curve.is_empty());
    }

    #[test]
    fn test_single_point_yields_total_return_only() {
        let result =
            BacktestResult::from_equity_curve(100_000.0, vec![(0, 110_000.0)], 1, 10_000.0);
        assert!((result.total_return - 0.1).abs() < 1e-9);
        assert_eq!(result.annualized_return, 0.0);
        assert_eq!(result.volatility, 0.0);
        assert!((result.turnover - 0.1).abs() < 1e-9);
        assert!((result.capacity_estimate - 1_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_capital_yields_zeros() {
        let result =
            BacktestResult::from_equity_curve(0.0, vec![(0, 1.0), (10, 2.0)], 0, 100.0);
        assert_eq!(result.total_return, 0.0);
        assert_eq!(result.turnover, 0.0);
    }

    #[test]
    fn test_monotone_growth_has_no_drawdown() {
        let curve = vec![(0, 100.0), (10, 110.0), (20, 121.0)];
        let result = BacktestResult::from_equity_curve(100.0, curve, 2, 50.0);

        assert!((result.total_return - 0.21).abs() < 1e-9);
        assert_eq!(result.max_drawdown, 0.0);
        assert_eq!(result.sortino_ratio, 0.0); // no downside observations
        assert!(result.sharpe_ratio == 0.0); // constant returns, zero stddev
    }

    #[test]
    fn test_drawdown_curve_tracks_peak() {
        let curve = vec![(0, 100.0), (1, 120.0), (2, 90.0), (3, 130.0)];
        let result = BacktestResult::from_equity_curve(100.0, curve, 0, 0.0);

        let expected = (120.0 - 90.0) / 120.0;
        assert!((result.max_drawdown - expected).abs() < 1e-9);
        assert_eq!(result.drawdown_curve.len(), 4);
        assert_eq!(result.drawdown_curve[3].1, 0.0);
    }

    #[test]
    fn test_volatile_series_has_ratios() {
        let curve = vec![(0, 100.0), (1_000, 105.0), (2_000, 98.0), (3_000, 112.0)];
        let result = BacktestResult::from_equity_curve(100.0, curve, 3, 300.0);

        assert!(result.volatility > 0.0);
        assert!(result.sharpe_ratio != 0.0);
        assert!(result.sortino_ratio != 0.0);
        assert!(result.max_drawdown > 0.0);
        assert!(result.calmar_ratio != 0.0);
    }
}
