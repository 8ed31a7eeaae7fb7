//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits and the outer
//! surfaces of the tool:
//! - Solver: projected quasi-Newton `BoxSolver`
//! - JSON store: series input and report output
//! - CLI: Command-line interface handlers

pub mod solver;
pub mod json_store;
pub mod cli;

pub use solver::ProjectedBfgs;
pub use json_store::{load_series, write_json, JsonStoreError};
pub use cli::CliApp;
