//! Band Strategy Simulator
//!
//! Single-position state machine run bar by bar over an out-of-sample
//! series. At most one transition happens per bar; a position still open at
//! the end of the series is left unrealized.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::params::BacktestConfig;
use crate::domain::metrics::BacktestMetrics;
use crate::domain::series::{SpreadObservation, SpreadSeries};
use crate::domain::trade::Trade;

/// Trades, equity and summary of one simulation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    /// Cumulative realized net PnL, one value per bar
    pub equity_path: Vec<f64>,
    pub equity_time: Vec<NaiveDateTime>,
    pub metrics: BacktestMetrics,
}

/// Open position bookkeeping
#[derive(Debug, Clone, Copy)]
struct Open {
    idx: usize,
    time: NaiveDateTime,
    z: f64,
    x: f64,
    /// Signed: positive long-spread, negative short-spread
    leverage: f64,
    entry_cost: f64,
}

#[derive(Debug, Clone, Copy)]
enum PositionState {
    Flat,
    Long(Open),
    Short(Open),
}

/// Half of the bar's round-trip cost, charged on each of entry and exit
fn half_cost(obs: &SpreadObservation) -> f64 {
    0.5 * obs.round_trip_cost()
}

/// Run the band strategy over `series`
pub fn backtest(series: &SpreadSeries, config: &BacktestConfig) -> BacktestResult {
    if series.len() < 2 {
        return BacktestResult::default();
    }
    if !config.ou.is_valid() {
        warn!(k = config.ou.k, sigma = config.ou.sigma, "Backtest skipped: invalid OU parameters");
        return BacktestResult::default();
    }
    if let Err(e) = config.bands.validate() {
        warn!(error = %e, "Backtest skipped: infeasible bands");
        return BacktestResult::default();
    }

    let ou = &config.ou;
    let bands = &config.bands;
    let size = bands.leverage.position_size();

    let mut state = PositionState::Flat;
    let mut trades = Vec::new();
    let mut equity_path = Vec::with_capacity(series.len());
    let mut equity_time = Vec::with_capacity(series.len());
    let mut bar_pnl = Vec::with_capacity(series.len());

    let mut equity = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;

    for (idx, obs) in series.iter().enumerate() {
        let x = obs.log_spread;
        let z = ou.z_score(x);
        let cost = half_cost(obs);
        let mut realized = 0.0;

        state = match state {
            PositionState::Flat => {
                let open = |leverage: f64| Open {
                    idx,
                    time: obs.timestamp,
                    z,
                    x,
                    leverage,
                    entry_cost: cost * leverage.abs(),
                };
                if z <= bands.d {
                    PositionState::Long(open(size))
                } else if bands.symmetric && z >= -bands.d {
                    PositionState::Short(open(-size))
                } else {
                    PositionState::Flat
                }
            }
            PositionState::Long(pos) => {
                if z >= bands.u || z <= bands.l {
                    let trade = close(&pos, idx, obs, z, (x - pos.x) * pos.leverage, cost);
                    realized = trade.pnl;
                    trades.push(trade);
                    PositionState::Flat
                } else {
                    PositionState::Long(pos)
                }
            }
            PositionState::Short(pos) => {
                if z <= -bands.u || z >= -bands.l {
                    let trade = close(&pos, idx, obs, z, (pos.x - x) * -pos.leverage, cost);
                    realized = trade.pnl;
                    trades.push(trade);
                    PositionState::Flat
                } else {
                    PositionState::Short(pos)
                }
            }
        };

        equity += realized;
        peak = peak.max(equity);
        max_dd = max_dd.min(equity - peak);

        bar_pnl.push(realized);
        equity_path.push(equity);
        equity_time.push(obs.timestamp);
    }

    let metrics = BacktestMetrics::compute(&trades, &equity_path, &bar_pnl, max_dd);
    info!(
        bars = series.len(),
        trades = metrics.n_trades,
        hit_ratio = metrics.hit_ratio,
        equity_end = metrics.equity_end,
        max_drawdown = metrics.max_drawdown,
        "Backtest complete"
    );

    BacktestResult {
        trades,
        equity_path,
        equity_time,
        metrics,
    }
}

fn close(pos: &Open, idx: usize, obs: &SpreadObservation, z: f64, gross: f64, cost: f64) -> Trade {
    let costs = pos.entry_cost + cost * pos.leverage.abs();
    Trade {
        entry_idx: pos.idx,
        exit_idx: idx,
        entry_time: pos.time,
        exit_time: obs.timestamp,
        z_entry: pos.z,
        z_exit: z,
        x_entry: pos.x,
        x_exit: obs.log_spread,
        leverage: pos.leverage,
        costs,
        pnl: gross - costs,
        bars: idx - pos.idx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::Quote;
    use crate::domain::metrics::max_drawdown;
    use crate::domain::trade::Side;
    use crate::strategy::ou_process::OuParameters;
    use crate::strategy::params::{BandConfiguration, Leverage};
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    // ========================================================================
    // Test Fixtures
    // ========================================================================

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    /// Frictionless series with log-spread exactly `xs` (mid2 = 1)
    fn frictionless(xs: &[f64]) -> SpreadSeries {
        series_with_spread(xs, 0.0)
    }

    /// Series whose legs each carry a relative half-spread `h`
    fn series_with_spread(xs: &[f64], h: f64) -> SpreadSeries {
        let observations = xs
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let time = start() + Duration::minutes(30 * i as i64);
                let mut obs = SpreadObservation::from_quotes(
                    time,
                    Quote::new(x.exp() * (1.0 - h), x.exp() * (1.0 + h)),
                    Quote::new(1.0 - h, 1.0 + h),
                );
                obs.mid1 = x.exp();
                obs.mid2 = 1.0;
                obs.log_spread = x;
                obs
            })
            .collect();
        SpreadSeries::new(observations).unwrap()
    }

    /// eta = 0, k = 0.5, sigma = 1 gives sigma_stat = 1 so z = x
    fn unit_process() -> OuParameters {
        OuParameters::new(0.5, 0.0, 1.0)
    }

    fn config(symmetric: bool, leverage: Leverage) -> BacktestConfig {
        BacktestConfig::new(
            unit_process(),
            BandConfiguration::new(-1.0, 1.0, -2.0, leverage, symmetric).unwrap(),
        )
    }

    // ========================================================================
    // Scenario tests
    // ========================================================================

    #[test]
    fn test_single_long_round_trip() {
        let series = frictionless(&[0.0, -1.2, -0.5, 1.1, 0.2]);
        let result = backtest(&series, &config(false, Leverage::Fixed(1.0)));

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_idx, 1);
        assert_eq!(trade.exit_idx, 3);
        assert_eq!(trade.bars, 2);
        assert_eq!(trade.side(), Side::Long);
        assert_relative_eq!(trade.pnl, 2.3, epsilon = 1e-12);
        assert_eq!(trade.costs, 0.0);

        let expected = [0.0, 0.0, 0.0, 2.3, 2.3];
        assert_eq!(result.equity_path.len(), expected.len());
        for (got, want) in result.equity_path.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }
        assert_eq!(result.equity_time.len(), 5);
        assert_eq!(result.metrics.max_drawdown, 0.0);
        assert_eq!(result.metrics.n_trades, 1);
        assert_eq!(result.metrics.hit_ratio, 1.0);
    }

    #[test]
    fn test_stop_loss_exit() {
        let series = frictionless(&[0.0, -1.5, -2.1, -0.3]);
        let result = backtest(&series, &config(false, Leverage::Fixed(1.0)));

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!((trade.entry_idx, trade.exit_idx), (1, 2));
        assert_relative_eq!(trade.pnl, -0.6, epsilon = 1e-12);
        assert!(!trade.is_winner());
        assert_relative_eq!(result.metrics.max_drawdown, -0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_symmetric_short_trade() {
        let series = frictionless(&[0.0, 1.3, 0.4, -1.1, 0.0]);
        let result = backtest(&series, &config(true, Leverage::Fixed(2.0)));

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.side(), Side::Short);
        assert_eq!(trade.leverage, -2.0);
        assert_eq!((trade.entry_idx, trade.exit_idx), (1, 3));
        // (x_entry - x) * (-f) with f = -2
        assert_relative_eq!(trade.pnl, 4.8, epsilon = 1e-12);
    }

    #[test]
    fn test_short_side_ignored_when_not_symmetric() {
        let series = frictionless(&[0.0, 1.3, 0.4, -1.1, 0.0]);
        let result = backtest(&series, &config(false, Leverage::Fixed(1.0)));
        // Only the long entry at z = -1.1 fires and stays open
        assert!(result.trades.is_empty());
        assert!(result.equity_path.iter().all(|&e| e == 0.0));
    }

    #[test]
    fn test_one_transition_per_bar() {
        // The long exit at bar 1 must not also open a short on that bar
        let series = frictionless(&[-1.5, 1.2, 1.2, -1.0]);
        let result = backtest(&series, &config(true, Leverage::Fixed(1.0)));

        assert_eq!(result.trades.len(), 2);
        assert_eq!((result.trades[0].entry_idx, result.trades[0].exit_idx), (0, 1));
        assert_eq!(result.trades[1].side(), Side::Short);
        assert_eq!(result.trades[1].entry_idx, 2);
        assert_eq!(result.trades[1].exit_idx, 3);
    }

    #[test]
    fn test_costs_are_charged_half_each_side() {
        let h = 0.001;
        let series = series_with_spread(&[0.0, -1.2, -0.5, 1.1, 0.2], h);
        let result = backtest(&series, &config(false, Leverage::Fixed(3.0)));

        let per_bar = 2.0 * ((1.0 + h) / (1.0 - h)).ln();
        let trade = &result.trades[0];
        assert_relative_eq!(trade.costs, 3.0 * per_bar, epsilon = 1e-12);
        assert_relative_eq!(trade.gross_pnl(), 3.0 * 2.3, epsilon = 1e-12);
        assert_relative_eq!(trade.pnl, 3.0 * 2.3 - 3.0 * per_bar, epsilon = 1e-12);
    }

    #[test]
    fn test_non_finite_leverage_trades_unit_size() {
        let series = frictionless(&[0.0, -1.2, -0.5, 1.1, 0.2]);
        let result = backtest(&series, &config(false, Leverage::Fixed(f64::NAN)));
        assert_eq!(result.trades[0].leverage, 1.0);
        assert_relative_eq!(result.trades[0].pnl, 2.3, epsilon = 1e-12);
    }

    // ========================================================================
    // Invariants
    // ========================================================================

    #[test]
    fn test_equity_path_identity() {
        let xs: Vec<f64> = (0..200).map(|i| 1.8 * ((i as f64) * 0.37).sin()).collect();
        let series = series_with_spread(&xs, 0.0005);
        let result = backtest(&series, &config(true, Leverage::Fixed(1.5)));

        assert_eq!(result.equity_path.len(), series.len());
        assert!(result.metrics.n_trades > 2);
        let total: f64 = result.trades.iter().map(|t| t.pnl).sum();
        assert_relative_eq!(*result.equity_path.last().unwrap(), total, epsilon = 1e-9);
        assert_relative_eq!(result.metrics.equity_end, total, epsilon = 1e-9);
        assert_relative_eq!(result.metrics.sum_pnl, total, epsilon = 1e-9);
        assert_relative_eq!(result.metrics.max_drawdown, max_drawdown(&result.equity_path), epsilon = 1e-12);
        assert!(result.metrics.max_drawdown <= 0.0);
        for t in &result.trades {
            assert_eq!(t.bars, t.exit_idx - t.entry_idx);
            assert!(t.bars >= 1);
        }
    }

    #[test]
    fn test_short_series_is_empty() {
        let cfg = config(false, Leverage::Fixed(1.0));
        assert_eq!(backtest(&frictionless(&[]), &cfg), BacktestResult::default());
        assert_eq!(backtest(&frictionless(&[-3.0]), &cfg), BacktestResult::default());
    }

    #[test]
    fn test_invalid_inputs_are_not_simulated() {
        let series = frictionless(&[0.0, -1.2, -0.5, 1.1, 0.2]);

        let mut unordered = config(false, Leverage::Fixed(1.0));
        unordered.bands.l = 0.5;
        assert!(backtest(&series, &unordered).equity_path.is_empty());

        let degenerate = BacktestConfig::new(OuParameters::default(), config(false, Leverage::Fixed(1.0)).bands);
        assert!(backtest(&series, &degenerate).equity_path.is_empty());
    }
}
