//! spread-bands - OU Spread Arbitrage Research Library
//!
//! Calibrates an Ornstein-Uhlenbeck model of a two-instrument log-spread,
//! derives cost-aware entry/exit bands that maximize long-run return and
//! simulates them on held-out data.
//!
//! # Modules
//!
//! - `domain`: Core data (SpreadSeries, Trade, BacktestMetrics)
//! - `ports`: Trait abstractions (BoxSolver) and test doubles
//! - `strategy`: OU estimation, bootstrap, band optimization, simulation
//! - `adapters`: External implementations (solver, JSON files, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Research pipeline use case

pub mod domain;
pub mod ports;
pub mod strategy;
pub mod adapters;
pub mod config;
pub mod application;
