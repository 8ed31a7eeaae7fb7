//! Research Pipeline
//!
//! Calibrates the OU model on an in-sample window, optimizes bands for the
//! configured stop-loss (and optional sweep grid), then simulates each set of
//! bands on the out-of-sample window.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::series::SpreadSeries;
use crate::ports::solver::BoxSolver;
use crate::strategy::bands::{BandOptimizer, OptimalBandsResult, SweepPoint};
use crate::strategy::bootstrap::{ou_bootstrap, OuBootstrapResult};
use crate::strategy::params::{BacktestConfig, BandRequest, BootstrapRequest, Leverage};
use crate::strategy::simulator::{backtest, BacktestResult};

/// Fewest in-sample bars the MLE can work with
const MIN_IN_SAMPLE: usize = 3;
/// Fewest out-of-sample bars the simulator can work with
const MIN_OUT_OF_SAMPLE: usize = 2;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{window} window has {len} observations, need at least {required}")]
    InsufficientData {
        window: &'static str,
        len: usize,
        required: usize,
    },
}

/// Stop-loss / leverage grid evaluated next to the main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSettings {
    pub stop_losses: Vec<f64>,
    pub leverages: Vec<Leverage>,
}

/// Everything the pipeline needs besides the data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub bootstrap: BootstrapRequest,
    /// Band settings; k and sigma are replaced by the calibrated values
    pub bands: BandRequest,
    /// Fixed average cost; measured on the in-sample window when `None`
    pub avg_cost: Option<f64>,
    pub with_ci: bool,
    pub symmetric: bool,
    pub sweep: Option<SweepSettings>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            bootstrap: BootstrapRequest::default(),
            bands: BandRequest::default(),
            avg_cost: None,
            with_ci: false,
            symmetric: true,
            sweep: None,
        }
    }
}

impl PipelineSettings {
    pub fn with_bootstrap(mut self, bootstrap: BootstrapRequest) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_bands(mut self, bands: BandRequest) -> Self {
        self.bands = bands;
        self
    }

    pub fn with_avg_cost(mut self, avg_cost: f64) -> Self {
        self.avg_cost = Some(avg_cost);
        self
    }

    pub fn with_ci(mut self, with_ci: bool) -> Self {
        self.with_ci = with_ci;
        self
    }

    pub fn with_symmetric(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }

    pub fn with_sweep(mut self, stop_losses: Vec<f64>, leverages: Vec<Leverage>) -> Self {
        self.sweep = Some(SweepSettings { stop_losses, leverages });
        self
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            bootstrap: BootstrapRequest::from(config),
            bands: BandRequest::from(config),
            avg_cost: config.bands.avg_cost,
            with_ci: config.bands.with_ci,
            symmetric: config.backtest.symmetric,
            sweep: config.sweep.as_ref().map(|s| SweepSettings {
                stop_losses: s.stop_losses.clone(),
                leverages: s.leverages.clone(),
            }),
        }
    }
}

/// Optimized bands and their out-of-sample simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandEvaluation {
    pub stop_loss: f64,
    pub bands: OptimalBandsResult,
    /// None when the bands could not be simulated
    pub backtest: Option<BacktestResult>,
}

/// Full pipeline output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub calibration: OuBootstrapResult,
    /// Average round-trip cost C used for the band search
    pub avg_cost: f64,
    pub primary: BandEvaluation,
    pub sweep: Vec<BandEvaluation>,
}

/// Calibrator -> BandOptimizer -> Simulator
pub struct ResearchPipeline<S: BoxSolver> {
    settings: PipelineSettings,
    optimizer: BandOptimizer<S>,
}

impl<S: BoxSolver> ResearchPipeline<S> {
    pub fn new(settings: PipelineSettings, solver: S) -> Self {
        Self {
            settings,
            optimizer: BandOptimizer::new(solver),
        }
    }

    /// OU estimates with bootstrap intervals for a series
    pub fn calibrate(&self, series: &SpreadSeries) -> OuBootstrapResult {
        ou_bootstrap(&series.log_spreads(), &self.settings.bootstrap)
    }

    /// Run the full pipeline on an in-sample and an out-of-sample window
    pub fn run(&self, in_sample: &SpreadSeries, out_of_sample: &SpreadSeries) -> Result<PipelineReport, PipelineError> {
        if in_sample.len() < MIN_IN_SAMPLE {
            return Err(PipelineError::InsufficientData {
                window: "in-sample",
                len: in_sample.len(),
                required: MIN_IN_SAMPLE,
            });
        }
        if out_of_sample.len() < MIN_OUT_OF_SAMPLE {
            return Err(PipelineError::InsufficientData {
                window: "out-of-sample",
                len: out_of_sample.len(),
                required: MIN_OUT_OF_SAMPLE,
            });
        }

        let calibration = self.calibrate(in_sample);
        let ou = calibration.params;
        let avg_cost = self
            .settings
            .avg_cost
            .unwrap_or_else(|| in_sample.average_round_trip_cost());

        info!(
            k = ou.k,
            eta = ou.eta,
            sigma = ou.sigma,
            half_life = ou.half_life(),
            avg_cost,
            "In-sample calibration"
        );

        let request = BandRequest {
            k: ou.k,
            sigma: ou.sigma,
            avg_cost,
            ..self.settings.bands
        };

        let bands = if self.settings.with_ci {
            self.optimizer.optimize_with_ci(&request, &calibration)
        } else {
            self.optimizer.optimize(&request)
        };
        let primary = self.evaluate(request.stop_loss, bands, &calibration, out_of_sample);

        let sweep = match &self.settings.sweep {
            Some(grid) => self
                .optimizer
                .sweep_bands(&request, &grid.stop_losses, &grid.leverages)
                .into_iter()
                .map(|SweepPoint { stop_loss, result, .. }| {
                    self.evaluate(stop_loss, result, &calibration, out_of_sample)
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(PipelineReport {
            calibration,
            avg_cost,
            primary,
            sweep,
        })
    }

    fn evaluate(
        &self,
        stop_loss: f64,
        bands: OptimalBandsResult,
        calibration: &OuBootstrapResult,
        out_of_sample: &SpreadSeries,
    ) -> BandEvaluation {
        let backtest = if bands.is_converged() {
            match bands.to_bands(stop_loss, self.settings.symmetric) {
                Ok(config) => Some(backtest(out_of_sample, &BacktestConfig::new(calibration.params, config))),
                Err(e) => {
                    warn!(stop_loss, error = %e, "Optimized bands cannot be simulated");
                    None
                }
            }
        } else {
            warn!(stop_loss, status = %bands.status, "Skipping backtest for unconverged bands");
            None
        };

        BandEvaluation {
            stop_loss,
            bands,
            backtest,
        }
    }
}
