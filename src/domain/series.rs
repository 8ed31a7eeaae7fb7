//! Spread Series
//!
//! Time-ordered quote observations for a pair of instruments and the derived
//! log-spread x = ln(mid1 / mid2). Produced by the data-prep layer, consumed
//! read-only by calibration and backtesting.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when assembling a spread series
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("Observation {index} at {timestamp} is earlier than its predecessor")]
    OutOfOrder { index: usize, timestamp: NaiveDateTime },
    #[error("Non-positive mid price at observation {index} (mid1={mid1}, mid2={mid2})")]
    NonPositiveMid { index: usize, mid1: f64, mid2: f64 },
}

/// Bid/ask quote for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    pub fn new(bid: f64, ask: f64) -> Self {
        Self { bid, ask }
    }

    pub fn mid(&self) -> f64 {
        0.5 * (self.bid + self.ask)
    }
}

/// One bar of the pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadObservation {
    pub timestamp: NaiveDateTime,
    pub bid1: f64,
    pub ask1: f64,
    pub mid1: f64,
    pub bid2: f64,
    pub ask2: f64,
    pub mid2: f64,
    /// ln(mid1 / mid2)
    pub log_spread: f64,
}

impl SpreadObservation {
    /// Build an observation from raw quotes, deriving mids and the log-spread
    pub fn from_quotes(timestamp: NaiveDateTime, leg1: Quote, leg2: Quote) -> Self {
        let mid1 = leg1.mid();
        let mid2 = leg2.mid();
        Self {
            timestamp,
            bid1: leg1.bid,
            ask1: leg1.ask,
            mid1,
            bid2: leg2.bid,
            ask2: leg2.ask,
            mid2,
            log_spread: safe_log_ratio(mid1, mid2),
        }
    }

    /// Round-trip cost of crossing both books on this bar, in log units
    pub fn round_trip_cost(&self) -> f64 {
        safe_log_ratio(self.ask1, self.bid1) + safe_log_ratio(self.ask2, self.bid2)
    }
}

/// ln(a/b), or 0 when either argument is not strictly positive
pub fn safe_log_ratio(a: f64, b: f64) -> f64 {
    if a > 0.0 && b > 0.0 {
        (a / b).ln()
    } else {
        0.0
    }
}

/// Immutable, time-ordered sequence of spread observations
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SpreadSeries {
    observations: Vec<SpreadObservation>,
}

impl SpreadSeries {
    /// Create a series, checking the time ordering and mid prices
    pub fn new(observations: Vec<SpreadObservation>) -> Result<Self, SeriesError> {
        for (index, obs) in observations.iter().enumerate() {
            if obs.mid1 <= 0.0 || obs.mid2 <= 0.0 {
                return Err(SeriesError::NonPositiveMid {
                    index,
                    mid1: obs.mid1,
                    mid2: obs.mid2,
                });
            }
            if index > 0 && obs.timestamp < observations[index - 1].timestamp {
                return Err(SeriesError::OutOfOrder {
                    index,
                    timestamp: obs.timestamp,
                });
            }
        }
        Ok(Self { observations })
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[SpreadObservation] {
        &self.observations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SpreadObservation> {
        self.observations.iter()
    }

    /// Log-spread values in time order
    pub fn log_spreads(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.log_spread).collect()
    }

    /// Mean per-bar round-trip cost, used as the average transaction cost C
    pub fn average_round_trip_cost(&self) -> f64 {
        if self.observations.is_empty() {
            return 0.0;
        }
        let total: f64 = self.observations.iter().map(|o| o.round_trip_cost()).sum();
        total / self.observations.len() as f64
    }

    /// Split into (in-sample, out-of-sample) windows at `index`
    pub fn split_at(&self, index: usize) -> (SpreadSeries, SpreadSeries) {
        let index = index.min(self.observations.len());
        let (head, tail) = self.observations.split_at(index);
        (
            SpreadSeries { observations: head.to_vec() },
            SpreadSeries { observations: tail.to_vec() },
        )
    }
}

impl<'a> IntoIterator for &'a SpreadSeries {
    type Item = &'a SpreadObservation;
    type IntoIter = std::slice::Iter<'a, SpreadObservation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2015, 4, 22)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_from_quotes_derives_mid_and_spread() {
        let obs = SpreadObservation::from_quotes(ts(0), Quote::new(99.0, 101.0), Quote::new(49.0, 51.0));
        assert_relative_eq!(obs.mid1, 100.0);
        assert_relative_eq!(obs.mid2, 50.0);
        assert_relative_eq!(obs.log_spread, 2.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_round_trip_cost() {
        let obs = SpreadObservation::from_quotes(ts(0), Quote::new(100.0, 101.0), Quote::new(50.0, 50.5));
        let expected = (101.0_f64 / 100.0).ln() + (50.5_f64 / 50.0).ln();
        assert_relative_eq!(obs.round_trip_cost(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_round_trip_cost_ignores_bad_quotes() {
        let mut obs = SpreadObservation::from_quotes(ts(0), Quote::new(100.0, 101.0), Quote::new(50.0, 50.0));
        obs.bid1 = 0.0;
        assert_eq!(obs.round_trip_cost(), 0.0);
    }

    #[test]
    fn test_series_rejects_out_of_order() {
        let a = SpreadObservation::from_quotes(ts(5), Quote::new(1.0, 1.0), Quote::new(1.0, 1.0));
        let b = SpreadObservation::from_quotes(ts(1), Quote::new(1.0, 1.0), Quote::new(1.0, 1.0));
        let err = SpreadSeries::new(vec![a, b]).unwrap_err();
        assert!(matches!(err, SeriesError::OutOfOrder { index: 1, .. }));
    }

    #[test]
    fn test_series_rejects_non_positive_mid() {
        let a = SpreadObservation::from_quotes(ts(0), Quote::new(0.0, 0.0), Quote::new(1.0, 1.0));
        assert!(matches!(
            SpreadSeries::new(vec![a]),
            Err(SeriesError::NonPositiveMid { index: 0, .. })
        ));
    }

    #[test]
    fn test_split_at() {
        let obs: Vec<_> = (0..10)
            .map(|i| SpreadObservation::from_quotes(ts(i), Quote::new(1.0, 1.0), Quote::new(1.0, 1.0)))
            .collect();
        let series = SpreadSeries::new(obs).unwrap();
        let (is, os) = series.split_at(7);
        assert_eq!(is.len(), 7);
        assert_eq!(os.len(), 3);
        assert_eq!(os.observations()[0].timestamp, ts(7));

        let (all, none) = series.split_at(100);
        assert_eq!(all.len(), 10);
        assert!(none.is_empty());
    }

    #[test]
    fn test_average_cost_empty_series() {
        assert_eq!(SpreadSeries::default().average_round_trip_cost(), 0.0);
    }
}
