//! Strategy Layer - OU Calibration, Optimal Bands and Simulation
//!
//! Implements the research pipeline for a mean-reverting log-spread:
//! - Closed-form OU maximum likelihood on evenly spaced observations
//! - Parametric bootstrap with percentile confidence intervals
//! - Long-run return of a band strategy and its (d, u) optimization
//! - Bar-by-bar simulation of the optimized bands out of sample
//!
//! Flow: `ou_bootstrap` -> `BandOptimizer::optimize` -> `backtest`

pub mod params;
pub mod ou_process;
pub mod bootstrap;
pub mod quadrature;
pub mod bands;
pub mod simulator;

pub use params::{
    BacktestConfig, BandConfigError, BandConfiguration, BandRequest, BootstrapRequest, CostUnits, Leverage, RequestError,
    HALF_HOUR_IN_YEARS,
};
pub use ou_process::{ou_mle, simulate_path, OuParameters, OuTransition};
pub use bootstrap::{ou_bootstrap, percentile, percentile_interval, OuBootstrapResult};
pub use quadrature::tail_integral;
pub use bands::{long_return, BandOptimizer, LongReturn, OptimalBandsResult, SweepPoint};
pub use simulator::{backtest, BacktestResult};
