//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    BacktestSection, BandsSection, CalibrationSection, Config, ConfigError, DataSection, LoggingSection,
    SweepSection, load_config,
};
