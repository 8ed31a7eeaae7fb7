//! Configuration Loader
//!
//! Loads and validates research configuration from TOML files.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::strategy::params::{
    validate_leverage, BandRequest, BootstrapRequest, CostUnits, Leverage, RequestError, HALF_HOUR_IN_YEARS,
};

/// Main configuration structure matching research.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data: DataSection,
    #[serde(default)]
    pub calibration: CalibrationSection,
    pub bands: BandsSection,
    #[serde(default)]
    pub backtest: BacktestSection,
    /// Optional stop-loss / leverage grid
    #[serde(default)]
    pub sweep: Option<SweepSection>,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Input series locations
#[derive(Debug, Clone, Deserialize)]
pub struct DataSection {
    /// JSON array of observations used for calibration
    pub in_sample: String,
    /// JSON array of observations used for the backtest
    pub out_of_sample: String,
    /// Where to write the JSON report (optional)
    #[serde(default)]
    pub report: Option<String>,
}

impl DataSection {
    /// In-sample path, SPREAD_BANDS_IN_SAMPLE overrides the file value
    pub fn in_sample_path(&self) -> PathBuf {
        expand(std::env::var("SPREAD_BANDS_IN_SAMPLE").unwrap_or_else(|_| self.in_sample.clone()))
    }

    /// Out-of-sample path, SPREAD_BANDS_OUT_OF_SAMPLE overrides the file value
    pub fn out_of_sample_path(&self) -> PathBuf {
        expand(std::env::var("SPREAD_BANDS_OUT_OF_SAMPLE").unwrap_or_else(|_| self.out_of_sample.clone()))
    }

    pub fn report_path(&self) -> Option<PathBuf> {
        self.report.clone().map(expand)
    }
}

fn expand(path: String) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path).into_owned())
}

/// OU calibration section
#[derive(Debug, Clone, Deserialize)]
pub struct CalibrationSection {
    /// Bootstrap replicates
    #[serde(default = "default_replicates")]
    pub replicates: usize,
    /// Two-sided significance level
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Bar length in years (30 minutes by default)
    #[serde(default = "default_dt")]
    pub dt: f64,
}

fn default_replicates() -> usize {
    1000
}

fn default_alpha() -> f64 {
    0.05
}

fn default_seed() -> u64 {
    42
}

fn default_dt() -> f64 {
    HALF_HOUR_IN_YEARS
}

impl Default for CalibrationSection {
    fn default() -> Self {
        Self {
            replicates: default_replicates(),
            alpha: default_alpha(),
            seed: default_seed(),
            dt: default_dt(),
        }
    }
}

/// Band optimization section
#[derive(Debug, Clone, Deserialize)]
pub struct BandsSection {
    /// Stop-loss in standardized units (negative)
    pub stop_loss: f64,
    /// "solve" or { fixed = f }
    #[serde(default = "default_leverage")]
    pub leverage: Leverage,
    /// Average round-trip cost; measured on the in-sample series when absent
    #[serde(default)]
    pub avg_cost: Option<f64>,
    #[serde(default)]
    pub u_floor_cost: CostUnits,
    #[serde(default = "default_max_eval")]
    pub max_eval: usize,
    #[serde(default = "default_xtol_rel")]
    pub xtol_rel: f64,
    /// Attach bootstrap intervals to the optimized bands
    #[serde(default)]
    pub with_ci: bool,
}

fn default_leverage() -> Leverage {
    Leverage::Solve
}

fn default_max_eval() -> usize {
    500
}

fn default_xtol_rel() -> f64 {
    1e-8
}

/// Simulation section
#[derive(Debug, Clone, Deserialize)]
pub struct BacktestSection {
    /// Also trade the short-spread side
    #[serde(default = "default_symmetric")]
    pub symmetric: bool,
}

fn default_symmetric() -> bool {
    true
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self { symmetric: default_symmetric() }
    }
}

/// Stop-loss / leverage grid
#[derive(Debug, Clone, Deserialize)]
pub struct SweepSection {
    pub stop_losses: Vec<f64>,
    pub leverages: Vec<Leverage>,
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "warn".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.in_sample.is_empty() {
            return Err(ConfigError::ValidationError(
                "in_sample cannot be empty".to_string(),
            ));
        }

        if self.data.out_of_sample.is_empty() {
            return Err(ConfigError::ValidationError(
                "out_of_sample cannot be empty".to_string(),
            ));
        }

        // Calibration and bands
        BootstrapRequest::from(self).validate().map_err(invalid)?;
        BandRequest::from(self).validate().map_err(invalid)?;

        // Sweep
        if let Some(sweep) = &self.sweep {
            if sweep.stop_losses.is_empty() || sweep.leverages.is_empty() {
                return Err(ConfigError::ValidationError(
                    "sweep needs at least one stop_loss and one leverage".to_string(),
                ));
            }
            if let Some(l) = sweep.stop_losses.iter().find(|l| !(**l < 0.0 && l.is_finite())) {
                return Err(ConfigError::ValidationError(format!(
                    "sweep stop_loss must be < 0, got {}",
                    l
                )));
            }
            for leverage in &sweep.leverages {
                validate_leverage(leverage).map_err(invalid)?;
            }
        }

        Ok(())
    }
}

fn invalid(e: RequestError) -> ConfigError {
    ConfigError::ValidationError(e.to_string())
}

// Conversion from Config to the strategy request types
impl From<&Config> for BootstrapRequest {
    fn from(config: &Config) -> Self {
        BootstrapRequest::default()
            .with_replicates(config.calibration.replicates)
            .with_alpha(config.calibration.alpha)
            .with_seed(config.calibration.seed)
            .with_dt(config.calibration.dt)
    }
}

impl From<&Config> for BandRequest {
    /// Band settings only; k, sigma and cost are filled in after calibration
    fn from(config: &Config) -> Self {
        BandRequest {
            stop_loss: config.bands.stop_loss,
            leverage: config.bands.leverage,
            avg_cost: config.bands.avg_cost.unwrap_or(0.0),
            alpha: config.calibration.alpha,
            max_eval: config.bands.max_eval,
            xtol_rel: config.bands.xtol_rel,
            u_floor_cost: config.bands.u_floor_cost,
            ..BandRequest::default()
        }
    }
}
