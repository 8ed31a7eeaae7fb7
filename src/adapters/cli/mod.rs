//! CLI Adapter
//!
//! Command-line interface for the spread-bands research tool.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    execute, parse_leverage, BacktestCmd, BandsCmd, CalibrateCmd, CliApp, Command, RunCmd,
};

/// Initialize the CLI application
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}
