//! spread-bands - OU Spread Arbitrage Research Tool
//!
//! Calibrates, optimizes and backtests trading bands for a pair spread.

use anyhow::Result;
use spread_bands::adapters::cli;

fn main() -> Result<()> {
    // Load .env file if it exists (data path overrides go here)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app)
}
