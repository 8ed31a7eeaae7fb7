//! Optimal Trading Bands
//!
//! Long-run expected log-return of a long-spread band strategy under an OU
//! process, following the first-passage formulation in standardized units:
//! enter at `d`, take profit at `u`, stop out at `l`, with cost `c` charged
//! per round trip. The optimizer maximizes that return over `(d, u)` for a
//! fixed stop-loss through a swappable [`BoxSolver`].
//!
//! Infeasible bands are reported through [`LongReturn::infeasible`] rather
//! than an error so the objective stays a plain function of `(d, u)`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use tracing::{debug, info, warn};

use super::bootstrap::{percentile_interval, OuBootstrapResult};
use super::params::{BandConfigError, BandConfiguration, BandRequest, Leverage};
use super::quadrature::tail_integral;
use crate::ports::solver::{BoxProblem, BoxSolver, SolverStatus};

/// Expected return per unit of OU time and the leverage it was evaluated at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongReturn {
    pub mu: f64,
    pub leverage: f64,
}

impl LongReturn {
    /// Sentinel for bands violating l < d < u or u - d > c
    pub fn infeasible() -> Self {
        Self {
            mu: f64::NEG_INFINITY,
            leverage: f64::NAN,
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.mu.is_finite()
    }
}

/// Long-run return of the long-spread band strategy.
///
/// `sigma` is the stationary standard deviation of the spread, `c` the
/// round-trip cost in the same standardized units as `d`, `u` and `l`.
pub fn long_return(d: f64, u: f64, c: f64, l: f64, sigma: f64, leverage: Leverage) -> LongReturn {
    if u - d <= c || d <= l || u <= d {
        return LongReturn::infeasible();
    }

    let expo_ud = (sigma * (u - d - c)).exp() - 1.0;
    let expo_ld = (sigma * (l - d - c)).exp() - 1.0;

    let i_ud = tail_integral(u, d);
    let i_dl = tail_integral(d, l);

    let f = match leverage {
        Leverage::Fixed(f) => f,
        Leverage::Solve => {
            let i_ul = tail_integral(u, l);
            -i_dl / (expo_ld * i_ul) - i_ud / (expo_ud * i_ul)
        }
    };

    let win = 1.0 + f * expo_ud;
    let loss = 1.0 + f * expo_ld;
    if win <= 0.0 || loss <= 0.0 {
        return LongReturn { mu: f64::NEG_INFINITY, leverage: f };
    }

    let mu = (2.0 / PI) * (win.ln() / i_ud + loss.ln() / i_dl);
    LongReturn {
        mu: if mu.is_finite() { mu } else { f64::NEG_INFINITY },
        leverage: f,
    }
}

/// Optimized thresholds for one stop-loss / leverage setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalBandsResult {
    /// Magnitude of the entry threshold; the long entry sits at `-d_estimated`
    pub d_estimated: f64,
    pub u_estimated: f64,
    /// Expected return per unit time (already divided by theta = 1/k)
    pub mu_estimated: f64,
    /// Growth-optimal leverage; only present when it was solved for
    pub f_estimated: Option<f64>,
    pub f_input: Leverage,
    pub status: SolverStatus,
    pub d_ci: Option<(f64, f64)>,
    pub u_ci: Option<(f64, f64)>,
    pub mu_ci: Option<(f64, f64)>,
    pub f_ci: Option<(f64, f64)>,
}

impl OptimalBandsResult {
    fn unset(f_input: Leverage, status: SolverStatus) -> Self {
        Self {
            d_estimated: f64::NAN,
            u_estimated: f64::NAN,
            mu_estimated: f64::NAN,
            f_estimated: None,
            f_input,
            status,
            d_ci: None,
            u_ci: None,
            mu_ci: None,
            f_ci: None,
        }
    }

    /// Solver produced a usable point with a finite return
    pub fn is_converged(&self) -> bool {
        self.status.is_success()
            && self.d_estimated.is_finite()
            && self.u_estimated.is_finite()
            && self.mu_estimated.is_finite()
    }

    /// Leverage to trade these bands with: the solved value when available
    pub fn trading_leverage(&self) -> Leverage {
        match self.f_estimated {
            Some(f) if f.is_finite() => Leverage::Fixed(f),
            _ => self.f_input,
        }
    }

    /// Simulator bands for this result with stop-loss `l`
    pub fn to_bands(&self, l: f64, symmetric: bool) -> Result<BandConfiguration, BandConfigError> {
        BandConfiguration::new(-self.d_estimated, self.u_estimated, l, self.trading_leverage(), symmetric)
    }
}

fn fmt_ci(ci: &Option<(f64, f64)>) -> String {
    match ci {
        Some((lo, hi)) => format!("[{}, {}]", lo, hi),
        None => "not computed".to_string(),
    }
}

impl fmt::Display for OptimalBandsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimal Trading Bands ({})", self.status)?;
        writeln!(f, "---------------------------------------------")?;
        writeln!(f, "d     : Estimate = {}, CI = {}", self.d_estimated, fmt_ci(&self.d_ci))?;
        writeln!(f, "u     : Estimate = {}, CI = {}", self.u_estimated, fmt_ci(&self.u_ci))?;
        write!(f, "mu    : Estimate = {}, CI = {}", self.mu_estimated, fmt_ci(&self.mu_ci))?;
        match (self.f_input, self.f_estimated) {
            (Leverage::Fixed(input), _) => write!(f, "\nf     : Input = {}", input),
            (Leverage::Solve, Some(solved)) => {
                write!(f, "\nf     : Estimate = {}, CI = {}", solved, fmt_ci(&self.f_ci))
            }
            (Leverage::Solve, None) => write!(f, "\nf     : Estimate = NaN"),
        }
    }
}

/// One grid point of a stop-loss / leverage sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub stop_loss: f64,
    pub leverage: Leverage,
    pub result: OptimalBandsResult,
}

/// Band optimizer over a pluggable box solver
#[derive(Debug, Clone, Default)]
pub struct BandOptimizer<S: BoxSolver> {
    solver: S,
}

impl<S: BoxSolver> BandOptimizer<S> {
    pub fn new(solver: S) -> Self {
        Self { solver }
    }

    /// Maximize the long-run return over (d, u) for the request's stop-loss
    pub fn optimize(&self, request: &BandRequest) -> OptimalBandsResult {
        if !(request.k > 0.0 && request.k.is_finite() && request.sigma > 0.0 && request.sigma.is_finite()) {
            warn!(k = request.k, sigma = request.sigma, "Band optimization skipped: invalid OU parameters");
            return OptimalBandsResult::unset(
                request.leverage,
                SolverStatus::Failed("invalid OU parameters".to_string()),
            );
        }

        let theta = 1.0 / request.k;
        let sigma_stat = request.sigma_stat();
        let c = request.standardized_cost();
        let l = request.stop_loss;
        let leverage = request.leverage;

        let objective = move |x: &[f64; 2]| {
            let r = long_return(x[0], x[1], c, l, sigma_stat, leverage);
            if r.is_feasible() {
                -r.mu
            } else {
                f64::INFINITY
            }
        };

        let (lower, upper) = request.bounds();
        let problem = BoxProblem {
            lower,
            upper,
            start: request.initial_guess,
            xtol_rel: request.xtol_rel,
            max_eval: request.max_eval,
        };

        let outcome = self.solver.minimize(&objective, &problem);
        if !outcome.status.is_success() {
            warn!(
                stop_loss = l,
                status = %outcome.status,
                evaluations = outcome.evaluations,
                "Band optimization did not converge"
            );
            return OptimalBandsResult::unset(leverage, outcome.status);
        }

        let d = outcome.x[0].abs();
        let u = outcome.x[1];
        let at_optimum = long_return(-d, u, c, l, sigma_stat, leverage);
        let mu = at_optimum.mu / theta;

        debug!(d, u, mu, evaluations = outcome.evaluations, status = %outcome.status, "Band search finished");

        OptimalBandsResult {
            d_estimated: d,
            u_estimated: u,
            mu_estimated: mu,
            f_estimated: leverage.is_solve().then_some(at_optimum.leverage),
            f_input: leverage,
            status: outcome.status,
            d_ci: None,
            u_ci: None,
            mu_ci: None,
            f_ci: None,
        }
    }

    /// Optimize at the point estimate, then re-optimize at every bootstrap
    /// replicate's (k, sigma) and attach percentile intervals
    pub fn optimize_with_ci(&self, request: &BandRequest, bootstrap: &OuBootstrapResult) -> OptimalBandsResult {
        let mut result = self.optimize(request);

        let replicates: Vec<_> = bootstrap.replicates().collect();
        let runs: Vec<OptimalBandsResult> = replicates
            .par_iter()
            .map(|p| {
                let replicate_request = BandRequest {
                    k: p.k,
                    sigma: p.sigma,
                    ..*request
                };
                self.optimize(&replicate_request)
            })
            .collect();

        let converged: Vec<&OptimalBandsResult> = runs.iter().filter(|r| r.is_converged()).collect();
        if converged.is_empty() {
            warn!(replicates = runs.len(), "No bootstrap replicate produced usable bands");
            return result;
        }

        let interval = |values: Vec<f64>| Some(percentile_interval(&values, request.alpha));
        result.d_ci = interval(converged.iter().map(|r| r.d_estimated).collect());
        result.u_ci = interval(converged.iter().map(|r| r.u_estimated).collect());
        result.mu_ci = interval(converged.iter().map(|r| r.mu_estimated).collect());
        if request.leverage.is_solve() {
            result.f_ci = interval(converged.iter().filter_map(|r| r.f_estimated).collect());
        }

        info!(
            replicates = runs.len(),
            converged = converged.len(),
            "Band confidence intervals computed"
        );
        result
    }

    /// Optimize every (stop-loss, leverage) pair, stop-loss major
    pub fn sweep_bands(&self, base: &BandRequest, stop_losses: &[f64], leverages: &[Leverage]) -> Vec<SweepPoint> {
        let grid: Vec<(f64, Leverage)> = stop_losses
            .iter()
            .flat_map(|&l| leverages.iter().map(move |&f| (l, f)))
            .collect();

        grid.into_par_iter()
            .map(|(stop_loss, leverage)| {
                let request = base.with_stop_loss(stop_loss).with_leverage(leverage);
                SweepPoint {
                    stop_loss,
                    leverage,
                    result: self.optimize(&request),
                }
            })
            .collect()
    }
}
