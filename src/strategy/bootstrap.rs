//! Parametric Bootstrap for OU Estimates
//!
//! Regenerates synthetic OU paths from the point estimate, re-estimates each
//! one and turns the replicate distribution into percentile confidence
//! intervals.
//!
//! Every replicate draws from its own generator seeded from
//! (seed, replicate index), so the replicate arrays do not depend on how the
//! rayon pool schedules the work.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use super::ou_process::{ou_mle, simulate_path, OuParameters};
use super::params::BootstrapRequest;

/// Point estimates, bootstrap replicates and percentile intervals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OuBootstrapResult {
    /// MLE on the supplied series
    pub params: OuParameters,
    pub boot_k: Vec<f64>,
    pub boot_eta: Vec<f64>,
    pub boot_sigma: Vec<f64>,
    /// (lower, upper); NaN when there are no replicates
    pub ci_k: (f64, f64),
    pub ci_eta: (f64, f64),
    pub ci_sigma: (f64, f64),
    /// Confidence level of the intervals, 1 - alpha
    pub confidence: f64,
}

impl OuBootstrapResult {
    fn point_only(params: OuParameters, alpha: f64) -> Self {
        Self {
            params,
            boot_k: Vec::new(),
            boot_eta: Vec::new(),
            boot_sigma: Vec::new(),
            ci_k: (f64::NAN, f64::NAN),
            ci_eta: (f64::NAN, f64::NAN),
            ci_sigma: (f64::NAN, f64::NAN),
            confidence: 1.0 - alpha,
        }
    }

    pub fn replicate_count(&self) -> usize {
        self.boot_k.len()
    }

    /// Replicates as parameter triples, in replicate order
    pub fn replicates(&self) -> impl Iterator<Item = OuParameters> + '_ {
        self.boot_k
            .iter()
            .zip(&self.boot_eta)
            .zip(&self.boot_sigma)
            .map(|((&k, &eta), &sigma)| OuParameters { k, eta, sigma })
    }
}

impl fmt::Display for OuBootstrapResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = self.confidence * 100.0;
        writeln!(f, "Ornstein-Uhlenbeck Parameter Estimates")?;
        writeln!(f, "---------------------------------------------")?;
        writeln!(
            f,
            "k     : Estimate = {}, {level}% CI = [{}, {}]",
            self.params.k, self.ci_k.0, self.ci_k.1
        )?;
        writeln!(
            f,
            "eta   : Estimate = {}, {level}% CI = [{}, {}]",
            self.params.eta, self.ci_eta.0, self.ci_eta.1
        )?;
        write!(
            f,
            "sigma : Estimate = {}, {level}% CI = [{}, {}]",
            self.params.sigma, self.ci_sigma.0, self.ci_sigma.1
        )
    }
}

/// Percentile of `values` at `p` in [0, 1], interpolating linearly between
/// order statistics at position p * (n - 1). NaN for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let w = pos - lo as f64;
    (1.0 - w) * sorted[lo] + w * sorted[hi]
}

/// (alpha/2, 1 - alpha/2) percentile interval
pub fn percentile_interval(values: &[f64], alpha: f64) -> (f64, f64) {
    (percentile(values, alpha / 2.0), percentile(values, 1.0 - alpha / 2.0))
}

/// Seed for replicate `index`, derived from the master seed only
pub fn replicate_seed(seed: u64, index: u64) -> u64 {
    // splitmix64 finalizer over the combined key
    let mut z = seed
        .wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Re-estimate one synthetic path generated from `params`
pub fn bootstrap_replicate(
    x0: f64,
    steps: usize,
    params: &OuParameters,
    dt: f64,
    seed: u64,
    index: u64,
) -> OuParameters {
    let mut rng = StdRng::seed_from_u64(replicate_seed(seed, index));
    let path = simulate_path(x0, params, dt, steps, &mut rng);
    ou_mle(&path, dt)
}

/// MLE plus parametric bootstrap on a log-spread series
pub fn ou_bootstrap(xs: &[f64], request: &BootstrapRequest) -> OuBootstrapResult {
    let params = ou_mle(xs, request.dt);
    if xs.len() < 3 {
        debug!(len = xs.len(), "Series too short for OU bootstrap");
        return OuBootstrapResult::point_only(params, request.alpha);
    }

    let x0 = xs[0];
    let steps = xs.len() - 1;
    let replicates: Vec<OuParameters> = (0..request.replicates as u64)
        .into_par_iter()
        .map(|m| bootstrap_replicate(x0, steps, &params, request.dt, request.seed, m))
        .collect();

    let boot_k: Vec<f64> = replicates.iter().map(|p| p.k).collect();
    let boot_eta: Vec<f64> = replicates.iter().map(|p| p.eta).collect();
    let boot_sigma: Vec<f64> = replicates.iter().map(|p| p.sigma).collect();

    let result = OuBootstrapResult {
        params,
        ci_k: percentile_interval(&boot_k, request.alpha),
        ci_eta: percentile_interval(&boot_eta, request.alpha),
        ci_sigma: percentile_interval(&boot_sigma, request.alpha),
        boot_k,
        boot_eta,
        boot_sigma,
        confidence: 1.0 - request.alpha,
    };

    info!(
        k = result.params.k,
        eta = result.params.eta,
        sigma = result.params.sigma,
        replicates = request.replicates,
        "OU calibration complete"
    );
    result
}
