//! Ornstein-Uhlenbeck Process Parameter Estimation
//!
//! Closed-form Maximum Likelihood Estimation (MLE) of OU parameters from an
//! equally spaced log-spread series:
//! - k: Mean reversion speed (higher = faster reversion)
//! - eta: Long-run equilibrium level
//! - sigma: Volatility
//!
//! The OU process follows: dX(t) = k(eta - X(t))dt + sigma*dW(t)
//!
//! Sampled at step dt it is an AR(1) with coefficient a = exp(-k*dt), which is
//! also the exact one-step transition used to simulate synthetic paths.
//!
//! Spreads are standardized with z = (x - eta) / (sigma / sqrt(2k)).

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Clamp for the lag-1 autocorrelation, keeps ln(rho) finite and negative
const RHO_EPSILON: f64 = 1e-8;
/// Floor for variance-like denominators
const MIN_VARIANCE: f64 = 1e-12;
/// Minimum number of observations for estimation
const MIN_OBSERVATIONS: usize = 3;

/// OU process parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OuParameters {
    /// Mean reversion speed
    pub k: f64,
    /// Long-run mean of the spread
    pub eta: f64,
    /// Volatility of the process
    pub sigma: f64,
}

impl OuParameters {
    pub fn new(k: f64, eta: f64, sigma: f64) -> Self {
        Self { k, eta, sigma }
    }

    /// Stationary standard deviation sigma / sqrt(2k)
    pub fn sigma_stat(&self) -> f64 {
        self.sigma / (2.0 * self.k).sqrt()
    }

    /// Standardized spread z = (x - eta) / sigma_stat
    pub fn z_score(&self, x: f64) -> f64 {
        (x - self.eta) / self.sigma_stat()
    }

    /// Characteristic time 1/k
    pub fn theta(&self) -> f64 {
        1.0 / self.k
    }

    /// Half-life of mean reversion: ln(2) / k, in the time unit of dt
    pub fn half_life(&self) -> f64 {
        2.0_f64.ln() / self.k
    }

    /// Check if parameters describe a usable mean-reverting process
    pub fn is_valid(&self) -> bool {
        self.k.is_finite()
            && self.k > 0.0
            && self.sigma.is_finite()
            && self.sigma > 0.0
            && self.eta.is_finite()
    }

    /// Exact one-step transition for bars of length `dt`
    pub fn transition(&self, dt: f64) -> OuTransition {
        let a = (-self.k * dt).exp();
        OuTransition {
            a,
            b: self.eta * (1.0 - a),
            sd: self.sigma * ((1.0 - a * a) / (2.0 * self.k)).sqrt(),
        }
    }
}

/// x[t+1] = a * x[t] + b + sd * Z
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OuTransition {
    pub a: f64,
    pub b: f64,
    pub sd: f64,
}

impl OuTransition {
    pub fn step(&self, x: f64, z: f64) -> f64 {
        self.a * x + self.b + self.sd * z
    }
}

/// Sample moments of consecutive pairs (x[t], x[t+1])
#[derive(Debug, Clone, Copy)]
struct LagMoments {
    y_m: f64,
    y_p: f64,
    y_mm: f64,
    y_pp: f64,
    y_pm: f64,
}

impl LagMoments {
    fn from_series(xs: &[f64]) -> Self {
        let n = (xs.len() - 1) as f64;
        let (mut s_m, mut s_p, mut s_mm, mut s_pp, mut s_pm) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for pair in xs.windows(2) {
            let (xm, xp) = (pair[0], pair[1]);
            s_m += xm;
            s_p += xp;
            s_mm += xm * xm;
            s_pp += xp * xp;
            s_pm += xm * xp;
        }
        Self {
            y_m: s_m / n,
            y_p: s_p / n,
            y_mm: s_mm / n,
            y_pp: s_pp / n,
            y_pm: s_pm / n,
        }
    }

    fn variance(&self) -> f64 {
        self.y_mm - self.y_m * self.y_m
    }

    fn covariance(&self) -> f64 {
        self.y_pm - self.y_m * self.y_p
    }
}

/// Estimate OU parameters from an equally spaced series sampled every `dt`.
///
/// Fewer than three observations yield all-zero parameters.
pub fn ou_mle(xs: &[f64], dt: f64) -> OuParameters {
    if xs.len() < MIN_OBSERVATIONS {
        return OuParameters::default();
    }

    let n = (xs.len() - 1) as f64;
    let m = LagMoments::from_series(xs);
    let var = m.variance();
    let cov = m.covariance();

    let rho = if var != 0.0 { cov / var } else { 0.0 };
    let rho = if rho <= 0.0 {
        RHO_EPSILON
    } else if rho >= 1.0 {
        1.0 - RHO_EPSILON
    } else {
        rho
    };

    let k = -rho.ln() / dt;

    let first = xs[0];
    let last = xs[xs.len() - 1];
    let eta = m.y_p + ((last - first) / n) * cov / (var - cov).max(MIN_VARIANCE);

    let residual_var = (m.y_pp - m.y_p * m.y_p - cov * cov / var.max(MIN_VARIANCE)).max(MIN_VARIANCE);
    let sigma = ((2.0 * k * residual_var) / (1.0 - (-2.0 * k * dt).exp())).sqrt();

    OuParameters { k, eta, sigma }
}

/// Simulate `steps` exact OU transitions starting at `x0`.
///
/// The returned path has `steps + 1` points, the first being `x0`.
pub fn simulate_path<R: Rng + ?Sized>(
    x0: f64,
    params: &OuParameters,
    dt: f64,
    steps: usize,
    rng: &mut R,
) -> Vec<f64> {
    let transition = params.transition(dt);
    let mut path = Vec::with_capacity(steps + 1);
    let mut x = x0;
    path.push(x);
    for _ in 0..steps {
        let z: f64 = rng.sample(StandardNormal);
        x = transition.step(x, z);
        path.push(x);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn generate_ou_series(n: usize, params: OuParameters, dt: f64, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        simulate_path(params.eta, &params, dt, n - 1, &mut rng)
    }

    #[test]
    fn test_short_series_yields_zero_params() {
        assert_eq!(ou_mle(&[], 1.0), OuParameters::default());
        assert_eq!(ou_mle(&[0.1, 0.2], 1.0), OuParameters::default());
    }

    #[test]
    fn test_constant_series_stays_finite() {
        let params = ou_mle(&[0.3; 50], 0.01);
        assert!(params.k.is_finite() && params.k > 0.0);
        assert!(params.sigma.is_finite() && params.sigma > 0.0);
        assert!(params.eta.is_finite());
        assert_relative_eq!(params.eta, 0.3, epsilon = 1e-9);
    }

    #[test]
    fn test_negative_autocorrelation_is_clamped() {
        let xs: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let params = ou_mle(&xs, 1.0);
        // rho clamped to 1e-8 -> k = -ln(1e-8)
        assert_relative_eq!(params.k, -(1e-8_f64).ln(), epsilon = 1e-9);
        assert!(params.sigma.is_finite());
    }

    #[test]
    fn test_trending_series_is_clamped_below_unit_root() {
        let xs: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let params = ou_mle(&xs, 1.0);
        assert!(params.k > 0.0);
        assert!(params.k.is_finite());
    }

    #[test]
    fn test_mle_recovers_generating_parameters() {
        let truth = OuParameters::new(2.0, 0.1, 0.5);
        let dt = 0.01;
        let xs = generate_ou_series(50_000, truth, dt, 7);
        let est = ou_mle(&xs, dt);

        assert!((est.k - truth.k).abs() < 0.6, "k = {}", est.k);
        assert!((est.eta - truth.eta).abs() < 0.08, "eta = {}", est.eta);
        assert!((est.sigma - truth.sigma).abs() / truth.sigma < 0.05, "sigma = {}", est.sigma);
    }

    #[test]
    fn test_mle_error_shrinks_with_length() {
        let truth = OuParameters::new(4.0, -0.2, 0.3);
        let dt = 0.01;
        let sigma_error = |n: usize| {
            let mean_abs: f64 = (0..8)
                .map(|seed| (ou_mle(&generate_ou_series(n, truth, dt, seed), dt).sigma - truth.sigma).abs())
                .sum::<f64>()
                / 8.0;
            mean_abs
        };
        assert!(sigma_error(40_000) < sigma_error(400));
    }

    #[test]
    fn test_z_score_and_sigma_stat() {
        let params = OuParameters::new(0.5, 0.0, 1.0);
        assert_relative_eq!(params.sigma_stat(), 1.0);
        assert_relative_eq!(params.z_score(-1.2), -1.2);

        let params = OuParameters::new(8.0, 0.1, 2.0);
        assert_relative_eq!(params.sigma_stat(), 0.5);
        assert_relative_eq!(params.z_score(0.6), 1.0, epsilon = 1e-12);
        assert!(params.z_score(0.0) < 0.0);
    }

    #[test]
    fn test_half_life_and_theta() {
        let params = OuParameters::new(2.0_f64.ln(), 0.0, 1.0);
        assert_relative_eq!(params.half_life(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(OuParameters::new(4.0, 0.0, 1.0).theta(), 0.25);
    }

    #[test]
    fn test_params_validity() {
        assert!(OuParameters::new(1.0, 0.0, 0.1).is_valid());
        assert!(!OuParameters::default().is_valid());
        assert!(!OuParameters::new(-1.0, 0.0, 0.1).is_valid());
        assert!(!OuParameters::new(1.0, f64::NAN, 0.1).is_valid());
    }

    #[test]
    fn test_transition_coefficients() {
        let params = OuParameters::new(1.0, 2.0, 0.5);
        let t = params.transition(0.1);
        let a = (-0.1_f64).exp();
        assert_relative_eq!(t.a, a);
        assert_relative_eq!(t.b, 2.0 * (1.0 - a));
        assert_relative_eq!(t.sd, 0.5 * ((1.0 - a * a) / 2.0).sqrt());
        // Without noise the path decays towards eta
        assert!((t.step(0.0, 0.0) - 2.0).abs() < 2.0);
    }

    #[test]
    fn test_simulate_path_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let path = simulate_path(0.25, &OuParameters::new(1.0, 0.0, 0.1), 0.1, 9, &mut rng);
        assert_eq!(path.len(), 10);
        assert_eq!(path[0], 0.25);
    }
}
