//! Backtest Metrics
//!
//! Summary statistics derived once from a completed trade list and the
//! per-bar realized PnL of a simulation.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::trade::Trade;

/// Summary of a simulated run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub n_trades: usize,
    pub winners: usize,
    /// winners / n_trades (0 without trades)
    pub hit_ratio: f64,
    /// Total net log-return
    pub sum_pnl: f64,
    /// Net log-return per trade
    pub avg_pnl: f64,
    /// Last equity value (log-equity, start = 0)
    pub equity_end: f64,
    /// Largest fall from a running peak (always <= 0)
    pub max_drawdown: f64,
    /// Mean / sample std of the per-bar PnL on bars where a trade closed.
    /// Flat and holding bars are excluded, so this is a per-trade ratio,
    /// not a conventional per-bar Sharpe.
    pub trade_sharpe: f64,
}

impl BacktestMetrics {
    /// Derive metrics from the trades, the equity path and the per-bar PnL
    pub fn compute(trades: &[Trade], equity_path: &[f64], bar_pnl: &[f64], max_drawdown: f64) -> Self {
        let n_trades = trades.len();
        let winners = trades.iter().filter(|t| t.is_winner()).count();
        let sum_pnl: f64 = trades.iter().map(|t| t.pnl).sum();

        let (hit_ratio, avg_pnl) = if n_trades > 0 {
            (winners as f64 / n_trades as f64, sum_pnl / n_trades as f64)
        } else {
            (0.0, 0.0)
        };

        Self {
            n_trades,
            winners,
            hit_ratio,
            sum_pnl,
            avg_pnl,
            equity_end: equity_path.last().copied().unwrap_or(0.0),
            max_drawdown,
            trade_sharpe: trade_sharpe(bar_pnl),
        }
    }
}

/// Sharpe-like ratio over the non-zero entries of `bar_pnl`
///
/// Returns 0 with fewer than two closing bars or zero dispersion.
pub fn trade_sharpe(bar_pnl: &[f64]) -> f64 {
    let closed: Vec<f64> = bar_pnl.iter().copied().filter(|v| *v != 0.0).collect();
    if closed.len() < 2 {
        return 0.0;
    }
    let mean = closed.iter().mean();
    let std = closed.iter().std_dev().max(0.0);
    // Equal values leave rounding noise in the sample std
    if std > f64::EPSILON * mean.abs().max(1.0) {
        mean / std
    } else {
        0.0
    }
}

/// Minimum over i of equity[i] - max(0, equity[0..=i])
pub fn max_drawdown(equity_path: &[f64]) -> f64 {
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for &equity in equity_path {
        peak = peak.max(equity);
        max_dd = max_dd.min(equity - peak);
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_trade_sharpe_needs_two_closes() {
        assert_eq!(trade_sharpe(&[]), 0.0);
        assert_eq!(trade_sharpe(&[0.0, 0.5, 0.0]), 0.0);
    }

    #[test]
    fn test_trade_sharpe_ignores_flat_bars() {
        let with_gaps = [0.0, 0.1, 0.0, 0.0, 0.3, 0.0];
        let compact = [0.1, 0.3];
        assert_relative_eq!(trade_sharpe(&with_gaps), trade_sharpe(&compact));
        // mean 0.2, sample std 0.1414...
        assert_relative_eq!(trade_sharpe(&compact), 0.2 / 0.02_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_trade_sharpe_zero_variance() {
        assert_eq!(trade_sharpe(&[0.2, 0.2, 0.2]), 0.0);
        // 0.1 is not exact in binary, the mean picks up rounding error
        assert_eq!(trade_sharpe(&[0.1; 7]), 0.0);
        assert_eq!(trade_sharpe(&[-0.3; 11]), 0.0);
    }

    #[test]
    fn test_max_drawdown() {
        assert_eq!(max_drawdown(&[]), 0.0);
        assert_eq!(max_drawdown(&[0.0, 1.0, 2.0]), 0.0);
        assert_relative_eq!(max_drawdown(&[0.0, 1.0, 0.25, 2.0, 1.0]), -1.0);
        // Peak starts at zero, so an initial loss counts
        assert_relative_eq!(max_drawdown(&[-0.5, -0.2]), -0.5);
    }

    #[test]
    fn test_compute_without_trades() {
        let metrics = BacktestMetrics::compute(&[], &[0.0, 0.0], &[0.0, 0.0], 0.0);
        assert_eq!(metrics.n_trades, 0);
        assert_eq!(metrics.hit_ratio, 0.0);
        assert_eq!(metrics.avg_pnl, 0.0);
        assert_eq!(metrics.equity_end, 0.0);
        assert_eq!(metrics.trade_sharpe, 0.0);
    }
}
