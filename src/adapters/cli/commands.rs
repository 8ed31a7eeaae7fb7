//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the spread-bands research tool.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::adapters::json_store::{load_series, write_json};
use crate::adapters::solver::ProjectedBfgs;
use crate::application::{PipelineSettings, ResearchPipeline};
use crate::config::{load_config, Config};
use crate::strategy::bands::BandOptimizer;
use crate::strategy::bootstrap::ou_bootstrap;
use crate::strategy::ou_process::OuParameters;
use crate::strategy::params::{
    BacktestConfig, BandConfiguration, BandRequest, BootstrapRequest, CostUnits, Leverage, HALF_HOUR_IN_YEARS,
};
use crate::strategy::simulator::backtest;

/// spread-bands - OU calibration and optimal trading bands for pair spreads
#[derive(Parser, Debug)]
#[command(
    name = "spread-bands",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "OU calibration and optimal trading bands for pair spreads",
    long_about = "spread-bands fits an Ornstein-Uhlenbeck model to a log-spread, \
                  derives entry/take-profit bands maximizing long-run return net of \
                  costs and simulates them on held-out data."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Estimate OU parameters with bootstrap confidence intervals
    Calibrate(CalibrateCmd),

    /// Optimize trading bands for given OU parameters
    Bands(BandsCmd),

    /// Simulate fixed bands on a series
    Backtest(BacktestCmd),

    /// Run calibration, band optimization and backtest from a config file
    Run(RunCmd),
}

/// Parse "solve" or a fixed multiplier
pub fn parse_leverage(value: &str) -> Result<Leverage, String> {
    if value.eq_ignore_ascii_case("solve") {
        return Ok(Leverage::Solve);
    }
    value
        .parse::<f64>()
        .map(Leverage::Fixed)
        .map_err(|_| format!("expected 'solve' or a number, got '{}'", value))
}

/// Estimate OU parameters
#[derive(Parser, Debug)]
pub struct CalibrateCmd {
    /// JSON series file
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Bootstrap replicates
    #[arg(short = 'm', long, default_value = "1000")]
    pub replicates: usize,

    /// Two-sided significance level
    #[arg(long, default_value = "0.05")]
    pub alpha: f64,

    /// Master seed for the bootstrap
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Bar length in years (default: 30 minutes)
    #[arg(long)]
    pub dt: Option<f64>,

    /// Export results to JSON
    #[arg(long, value_name = "FILE")]
    pub export_json: Option<PathBuf>,
}

/// Optimize bands
#[derive(Parser, Debug)]
pub struct BandsCmd {
    /// OU mean reversion speed
    #[arg(short, long)]
    pub k: f64,

    /// OU volatility
    #[arg(short, long)]
    pub sigma: f64,

    /// Stop-loss in standardized units
    #[arg(short = 'l', long, default_value = "-2.0", allow_hyphen_values = true)]
    pub stop_loss: f64,

    /// Leverage: "solve" or a fixed multiplier
    #[arg(short = 'f', long, default_value = "solve", value_parser = parse_leverage)]
    pub leverage: Leverage,

    /// Average round-trip cost in spread units
    #[arg(short, long, default_value = "0.0")]
    pub cost: f64,

    /// Use the standardized cost in the lower bound of u
    #[arg(long)]
    pub standardized_floor: bool,

    /// Objective evaluation budget
    #[arg(long, default_value = "500")]
    pub max_eval: usize,

    /// Export results to JSON
    #[arg(long, value_name = "FILE")]
    pub export_json: Option<PathBuf>,
}

/// Simulate bands
#[derive(Parser, Debug)]
pub struct BacktestCmd {
    /// JSON series file
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    #[arg(short, long)]
    pub k: f64,

    #[arg(short, long, allow_hyphen_values = true)]
    pub eta: f64,

    #[arg(short, long)]
    pub sigma: f64,

    /// Entry threshold (negative)
    #[arg(short, long, allow_hyphen_values = true)]
    pub d: f64,

    /// Take-profit threshold
    #[arg(short, long, allow_hyphen_values = true)]
    pub u: f64,

    /// Stop-loss threshold
    #[arg(short, long, allow_hyphen_values = true)]
    pub l: f64,

    /// Fixed leverage ("solve" trades unit size)
    #[arg(short = 'f', long, default_value = "1.0", value_parser = parse_leverage)]
    pub leverage: Leverage,

    /// Also trade the short-spread side
    #[arg(long)]
    pub symmetric: bool,

    /// Print every trade
    #[arg(long)]
    pub trades: bool,

    /// Export results to JSON
    #[arg(long, value_name = "FILE")]
    pub export_json: Option<PathBuf>,
}

/// Full pipeline
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/research.toml")]
    pub config: PathBuf,

    /// Export the report to JSON (overrides [data].report)
    #[arg(long, value_name = "FILE")]
    pub export_json: Option<PathBuf>,
}

/// Execute the CLI command
pub fn execute(app: CliApp) -> Result<()> {
    let (verbose, debug) = (app.verbose, app.debug);

    match app.command {
        Command::Run(cmd) => {
            let config = load_config(&cmd.config)
                .with_context(|| format!("Failed to load configuration {}", cmd.config.display()))?;
            init_logging(verbose, debug, Some(&config.logging.level))?;
            run_command(cmd, config)
        }
        Command::Calibrate(cmd) => {
            init_logging(verbose, debug, None)?;
            calibrate_command(cmd)
        }
        Command::Bands(cmd) => {
            init_logging(verbose, debug, None)?;
            bands_command(cmd)
        }
        Command::Backtest(cmd) => {
            init_logging(verbose, debug, None)?;
            backtest_command(cmd)
        }
    }
}

/// Initialize logging system
fn init_logging(verbose: bool, debug: bool, configured: Option<&str>) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        configured.unwrap_or("warn")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn export<T: serde::Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    if let Some(path) = path {
        write_json(path, value).with_context(|| format!("Failed to export {}", path.display()))?;
        println!("\nExported: {}", path.display());
    }
    Ok(())
}

/// Handle calibrate command
fn calibrate_command(cmd: CalibrateCmd) -> Result<()> {
    let request = bootstrap_request(&cmd)?;
    let series = load_series(&cmd.input).context("Failed to load series")?;
    tracing::info!("Calibrating on {} observations", series.len());

    let result = ou_bootstrap(&series.log_spreads(), &request);

    println!("{}", result);
    println!("Half-life : {}", result.params.half_life());
    println!("Avg cost  : {}", series.average_round_trip_cost());

    export(cmd.export_json.as_deref(), &result)
}

fn bootstrap_request(cmd: &CalibrateCmd) -> Result<BootstrapRequest> {
    let request = BootstrapRequest::default()
        .with_replicates(cmd.replicates)
        .with_alpha(cmd.alpha)
        .with_seed(cmd.seed)
        .with_dt(cmd.dt.unwrap_or(HALF_HOUR_IN_YEARS));
    request.validate().context("Invalid calibration settings")?;
    Ok(request)
}

fn band_request(cmd: &BandsCmd) -> Result<BandRequest> {
    let mut request = BandRequest::for_process(cmd.k, cmd.sigma)
        .with_stop_loss(cmd.stop_loss)
        .with_leverage(cmd.leverage)
        .with_cost(cmd.cost)
        .with_max_eval(cmd.max_eval);
    if cmd.standardized_floor {
        request.u_floor_cost = CostUnits::Standardized;
    }
    request.validate().context("Invalid band settings")?;
    Ok(request)
}

/// Handle bands command
fn bands_command(cmd: BandsCmd) -> Result<()> {
    let request = band_request(&cmd)?;
    let result = BandOptimizer::new(ProjectedBfgs::new()).optimize(&request);
    println!("{}", result);

    export(cmd.export_json.as_deref(), &result)
}

/// Handle backtest command
fn backtest_command(cmd: BacktestCmd) -> Result<()> {
    let series = load_series(&cmd.input).context("Failed to load series")?;
    let bands = BandConfiguration::new(cmd.d, cmd.u, cmd.l, cmd.leverage, cmd.symmetric)
        .context("Invalid bands")?;
    let config = BacktestConfig::new(OuParameters::new(cmd.k, cmd.eta, cmd.sigma), bands);

    if !config.ou.is_valid() {
        bail!("OU parameters must have k > 0 and sigma > 0");
    }
    let cost = series.average_round_trip_cost() / config.ou.sigma_stat();
    if !bands.is_feasible(cost) {
        bail!(
            "Bands do not clear the average cost: u - d = {} must exceed {} (standardized)",
            bands.u - bands.d,
            cost
        );
    }

    let result = backtest(&series, &config);

    if cmd.trades {
        for trade in &result.trades {
            println!("{}", trade);
        }
        println!();
    }
    let m = &result.metrics;
    println!("Backtest Results:");
    println!("  Trades:        {} ({} winners, hit ratio {:.2})", m.n_trades, m.winners, m.hit_ratio);
    println!("  Total PnL:     {:.6}", m.sum_pnl);
    println!("  Avg PnL:       {:.6}", m.avg_pnl);
    println!("  Final equity:  {:.6}", m.equity_end);
    println!("  Max drawdown:  {:.6}", m.max_drawdown);
    println!("  Trade Sharpe:  {:.4}", m.trade_sharpe);

    export(cmd.export_json.as_deref(), &result)
}

/// Handle run command
fn run_command(cmd: RunCmd, config: Config) -> Result<()> {
    tracing::info!("Config: {}", cmd.config.display());

    let in_sample = load_series(config.data.in_sample_path()).context("Failed to load in-sample series")?;
    let out_of_sample =
        load_series(config.data.out_of_sample_path()).context("Failed to load out-of-sample series")?;

    let pipeline = ResearchPipeline::new(PipelineSettings::from(&config), ProjectedBfgs::new());
    let report = pipeline
        .run(&in_sample, &out_of_sample)
        .context("Pipeline failed")?;

    println!("{}", report.calibration);
    println!();
    println!("Average round-trip cost: {}", report.avg_cost);
    println!();
    println!("{}", report.primary.bands);
    match &report.primary.backtest {
        Some(bt) => println!(
            "\nOut-of-sample: {} trades, PnL {:.6}, max drawdown {:.6}",
            bt.metrics.n_trades, bt.metrics.sum_pnl, bt.metrics.max_drawdown
        ),
        None => println!("\nOut-of-sample: not simulated"),
    }

    if !report.sweep.is_empty() {
        println!("\n{:>8} {:>10} {:>10} {:>10} {:>12} {:>8} {:>12}", "l", "f", "d", "u", "mu", "trades", "pnl");
        for eval in &report.sweep {
            let f = match eval.bands.trading_leverage() {
                Leverage::Fixed(f) => format!("{:.3}", f),
                Leverage::Solve => "solve".to_string(),
            };
            let (trades, pnl) = eval
                .backtest
                .as_ref()
                .map(|bt| (bt.metrics.n_trades.to_string(), format!("{:.6}", bt.metrics.sum_pnl)))
                .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
            println!(
                "{:>8.2} {:>10} {:>10.4} {:>10.4} {:>12.4} {:>8} {:>12}",
                eval.stop_loss, f, eval.bands.d_estimated, eval.bands.u_estimated, eval.bands.mu_estimated, trades, pnl
            );
        }
    }

    let report_path = cmd.export_json.or_else(|| config.data.report_path());
    export(report_path.as_deref(), &report)
}
