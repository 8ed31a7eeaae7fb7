//! Domain Layer - Core data types for spread research
//!
//! Pure value types with no knowledge of calibration or optimization:
//! - `series`: quote observations and the time-ordered log-spread series
//! - `trade`: closed round-trips produced by the simulator
//! - `metrics`: summary statistics of a simulated run

pub mod series;
pub mod trade;
pub mod metrics;

pub use series::{Quote, SeriesError, SpreadObservation, SpreadSeries, safe_log_ratio};
pub use trade::{Side, Trade};
pub use metrics::{BacktestMetrics, max_drawdown, trade_sharpe};
