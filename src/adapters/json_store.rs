//! JSON Series and Report Files
//!
//! Reads cleaned spread observations exported by the data-prep layer and
//! writes research reports. Series files are JSON arrays of
//! `SpreadObservation` records in time order.

use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::domain::series::{SeriesError, SpreadObservation, SpreadSeries};

/// Series/report file errors
#[derive(Debug, Error)]
pub enum JsonStoreError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid series in {path}: {source}")]
    Series {
        path: String,
        #[source]
        source: SeriesError,
    },
}

/// Load and validate a spread series
pub fn load_series<P: AsRef<Path>>(path: P) -> Result<SpreadSeries, JsonStoreError> {
    let path = path.as_ref();
    let shown = path.display().to_string();

    let file = File::open(path).map_err(|source| JsonStoreError::Io {
        path: shown.clone(),
        source,
    })?;
    let observations: Vec<SpreadObservation> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| JsonStoreError::Json {
            path: shown.clone(),
            source,
        })?;

    let series = SpreadSeries::new(observations).map_err(|source| JsonStoreError::Series {
        path: shown.clone(),
        source,
    })?;
    debug!(path = %path.display(), bars = series.len(), "Loaded spread series");
    Ok(series)
}

/// Write any serializable value as pretty-printed JSON
pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<(), JsonStoreError> {
    let path = path.as_ref();
    let shown = path.display().to_string();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| JsonStoreError::Io {
            path: shown.clone(),
            source,
        })?;
    }

    let file = File::create(path).map_err(|source| JsonStoreError::Io {
        path: shown.clone(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(|source| JsonStoreError::Json {
        path: shown,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::Quote;
    use chrono::{Duration, NaiveDate};
    use tempfile::tempdir;

    fn observations(n: usize) -> Vec<SpreadObservation> {
        let t0 = NaiveDate::from_ymd_opt(2015, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| {
                SpreadObservation::from_quotes(
                    t0 + Duration::minutes(30 * i as i64),
                    Quote::new(1.10 + 0.001 * i as f64, 1.1002 + 0.001 * i as f64),
                    Quote::new(1.50, 1.5003),
                )
            })
            .collect()
    }

    #[test]
    fn test_series_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("series.json");
        let series = SpreadSeries::new(observations(5)).unwrap();

        write_json(&path, &series).unwrap();
        let loaded = load_series(&path).unwrap();
        assert_eq!(loaded.len(), series.len());
        for (a, b) in loaded.iter().zip(series.iter()) {
            assert_eq!(a.timestamp, b.timestamp);
            assert!((a.log_spread - b.log_spread).abs() < 1e-12);
            assert!((a.round_trip_cost() - b.round_trip_cost()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_out_of_order_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("series.json");
        let mut obs = observations(3);
        obs.swap(0, 2);
        write_json(&path, &obs).unwrap();

        let err = load_series(&path).unwrap_err();
        assert!(matches!(
            err,
            JsonStoreError::Series { source: SeriesError::OutOfOrder { index: 1, .. }, .. }
        ));
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_series(dir.path().join("missing.json")).unwrap_err(),
            JsonStoreError::Io { .. }
        ));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_series(&path).unwrap_err(), JsonStoreError::Json { .. }));
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports").join("nested").join("out.json");
        write_json(&path, &vec![1.0, 2.0]).unwrap();
        assert!(path.exists());
    }
}
