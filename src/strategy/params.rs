//! Strategy Parameters
//!
//! Request and configuration structs for calibration, band optimization and
//! backtesting. Defaults reproduce the research setup: 30-minute bars measured
//! in years, 1000 bootstrap replicates, 95% intervals.

use serde::{Deserialize, Serialize};

use super::ou_process::OuParameters;

/// Length of one 30-minute bar in years
pub const HALF_HOUR_IN_YEARS: f64 = (0.5 / 24.0) / 365.0;

/// Leverage policy for band optimization and simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leverage {
    /// Trade with this fixed multiplier
    Fixed(f64),
    /// Let the band optimizer pick the growth-optimal leverage
    Solve,
}

impl Leverage {
    pub fn is_solve(&self) -> bool {
        matches!(self, Leverage::Solve)
    }

    /// Multiplier used when opening a position; 1 unless a finite value is fixed
    pub fn position_size(&self) -> f64 {
        match self {
            Leverage::Fixed(f) if f.is_finite() => *f,
            _ => 1.0,
        }
    }
}

impl Default for Leverage {
    fn default() -> Self {
        Leverage::Fixed(1.0)
    }
}

/// Trading thresholds in standardized (sigma_stat) units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandConfiguration {
    /// Entry threshold (negative)
    pub d: f64,
    /// Take-profit threshold (positive)
    pub u: f64,
    /// Stop-loss threshold (below d)
    pub l: f64,
    pub leverage: Leverage,
    /// Also trade the mirrored short-spread side
    pub symmetric: bool,
}

impl BandConfiguration {
    /// Create a band configuration, rejecting mis-ordered thresholds
    pub fn new(d: f64, u: f64, l: f64, leverage: Leverage, symmetric: bool) -> Result<Self, BandConfigError> {
        let config = Self { d, u, l, leverage, symmetric };
        config.validate()?;
        Ok(config)
    }

    /// l < d < u with all thresholds finite
    pub fn is_ordered(&self) -> bool {
        self.validate().is_ok()
    }

    /// Ordering plus the cost gate u - d > c (c in standardized units)
    pub fn is_feasible(&self, c: f64) -> bool {
        self.is_ordered() && self.u - self.d > c
    }

    pub fn validate(&self) -> Result<(), BandConfigError> {
        if !(self.d.is_finite() && self.u.is_finite() && self.l.is_finite()) {
            return Err(BandConfigError::NonFinite);
        }
        if self.l >= self.d {
            return Err(BandConfigError::StopLossNotBelowEntry { l: self.l, d: self.d });
        }
        if self.d >= self.u {
            return Err(BandConfigError::EntryNotBelowTakeProfit { d: self.d, u: self.u });
        }
        Ok(())
    }
}

/// OU estimates plus bands: everything the simulator needs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub ou: OuParameters,
    pub bands: BandConfiguration,
}

impl BacktestConfig {
    pub fn new(ou: OuParameters, bands: BandConfiguration) -> Self {
        Self { ou, bands }
    }
}

/// Parametric bootstrap settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapRequest {
    /// Number of bootstrap replicates (M)
    pub replicates: usize,
    /// Two-sided significance level; bounds are the alpha/2 and 1-alpha/2 percentiles
    pub alpha: f64,
    pub seed: u64,
    /// Bar length in the time unit the parameters are expressed in
    pub dt: f64,
}

impl Default for BootstrapRequest {
    fn default() -> Self {
        Self {
            replicates: 1000,
            alpha: 0.05,
            seed: 42,
            dt: HALF_HOUR_IN_YEARS,
        }
    }
}

impl BootstrapRequest {
    pub fn with_replicates(mut self, replicates: usize) -> Self {
        self.replicates = replicates;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        validate_alpha(self.alpha)?;
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(RequestError::TimeStep(self.dt));
        }
        Ok(())
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }
}

/// Units of the cost term in the lower bound of u during the band search.
///
/// `Raw` keeps `u >= l + C` with C in spread units, which mixes units with the
/// standardized search variables. `Standardized` uses `u >= l + c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostUnits {
    #[default]
    Raw,
    Standardized,
}

/// Band optimization settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRequest {
    /// Stop-loss in standardized units (negative)
    pub stop_loss: f64,
    pub leverage: Leverage,
    /// OU speed
    pub k: f64,
    /// OU volatility
    pub sigma: f64,
    /// Average round-trip transaction cost C in spread units
    pub avg_cost: f64,
    /// Significance level for band confidence intervals
    pub alpha: f64,
    /// Objective evaluation budget
    pub max_eval: usize,
    /// Relative step tolerance
    pub xtol_rel: f64,
    /// Starting point (d, u)
    pub initial_guess: [f64; 2],
    /// Upper bound of the entry threshold search
    pub d_max: f64,
    /// Upper bound of the take-profit search
    pub u_max: f64,
    /// Margin kept between stop-loss and the lowest admissible entry
    pub d_margin: f64,
    pub u_floor_cost: CostUnits,
}

impl Default for BandRequest {
    fn default() -> Self {
        Self {
            stop_loss: -2.0,
            leverage: Leverage::Solve,
            k: 1.0,
            sigma: 1.0,
            avg_cost: 0.0,
            alpha: 0.05,
            max_eval: 500,
            xtol_rel: 1e-8,
            initial_guess: [-0.5, 0.5],
            d_max: 0.6,
            u_max: 3.0,
            d_margin: 0.01,
            u_floor_cost: CostUnits::Raw,
        }
    }
}

impl BandRequest {
    /// Request for the given OU speed/volatility, other settings defaulted
    pub fn for_process(k: f64, sigma: f64) -> Self {
        Self { k, sigma, ..Self::default() }
    }

    pub fn with_stop_loss(mut self, stop_loss: f64) -> Self {
        self.stop_loss = stop_loss;
        self
    }

    pub fn with_leverage(mut self, leverage: Leverage) -> Self {
        self.leverage = leverage;
        self
    }

    pub fn with_cost(mut self, avg_cost: f64) -> Self {
        self.avg_cost = avg_cost;
        self
    }

    pub fn with_max_eval(mut self, max_eval: usize) -> Self {
        self.max_eval = max_eval;
        self
    }

    /// sigma / sqrt(2k)
    pub fn sigma_stat(&self) -> f64 {
        self.sigma / (2.0 * self.k).sqrt()
    }

    /// Cost expressed in standardized units
    pub fn standardized_cost(&self) -> f64 {
        self.avg_cost / self.sigma_stat()
    }

    /// Range checks on the user-facing settings; k and sigma are checked by the optimizer
    pub fn validate(&self) -> Result<(), RequestError> {
        if !(self.stop_loss < 0.0 && self.stop_loss.is_finite()) {
            return Err(RequestError::StopLoss(self.stop_loss));
        }
        validate_leverage(&self.leverage)?;
        if !(self.avg_cost >= 0.0 && self.avg_cost.is_finite()) {
            return Err(RequestError::Cost(self.avg_cost));
        }
        validate_alpha(self.alpha)?;
        if self.max_eval == 0 {
            return Err(RequestError::EvaluationBudget);
        }
        if !(self.xtol_rel > 0.0) {
            return Err(RequestError::Tolerance(self.xtol_rel));
        }
        Ok(())
    }

    /// Box bounds ([d_min, u_min], [d_max, u_max]) for the search
    pub fn bounds(&self) -> ([f64; 2], [f64; 2]) {
        let cost = match self.u_floor_cost {
            CostUnits::Raw => self.avg_cost,
            CostUnits::Standardized => self.standardized_cost(),
        };
        (
            [self.stop_loss + self.d_margin, self.stop_loss + cost],
            [self.d_max, self.u_max],
        )
    }
}

/// Band configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BandConfigError {
    #[error("Band thresholds must be finite")]
    NonFinite,
    #[error("Stop-loss {l} must be strictly below entry {d}")]
    StopLossNotBelowEntry { l: f64, d: f64 },
    #[error("Entry {d} must be strictly below take-profit {u}")]
    EntryNotBelowTakeProfit { d: f64, u: f64 },
}

/// Out-of-range request settings
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("alpha must be in (0, 1), got {0}")]
    Alpha(f64),
    #[error("dt must be > 0, got {0}")]
    TimeStep(f64),
    #[error("stop_loss must be < 0, got {0}")]
    StopLoss(f64),
    #[error("fixed leverage must be finite and > 0, got {0}")]
    Leverage(f64),
    #[error("avg_cost must be >= 0, got {0}")]
    Cost(f64),
    #[error("max_eval must be > 0")]
    EvaluationBudget,
    #[error("xtol_rel must be > 0, got {0}")]
    Tolerance(f64),
}

fn validate_alpha(alpha: f64) -> Result<(), RequestError> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(RequestError::Alpha(alpha))
    }
}

pub fn validate_leverage(leverage: &Leverage) -> Result<(), RequestError> {
    match leverage {
        Leverage::Fixed(f) if !(f.is_finite() && *f > 0.0) => Err(RequestError::Leverage(*f)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_band_configuration_ordering() {
        assert!(BandConfiguration::new(-1.0, 1.0, -2.0, Leverage::Fixed(1.0), false).is_ok());

        assert!(matches!(
            BandConfiguration::new(-1.0, 1.0, -1.0, Leverage::Fixed(1.0), false),
            Err(BandConfigError::StopLossNotBelowEntry { .. })
        ));
        assert!(matches!(
            BandConfiguration::new(0.5, 0.5, -2.0, Leverage::Fixed(1.0), false),
            Err(BandConfigError::EntryNotBelowTakeProfit { .. })
        ));
        assert!(matches!(
            BandConfiguration::new(f64::NAN, 0.5, -2.0, Leverage::Solve, false),
            Err(BandConfigError::NonFinite)
        ));
    }

    #[test]
    fn test_band_feasibility_includes_cost() {
        let bands = BandConfiguration::new(-0.5, 0.5, -2.0, Leverage::Fixed(1.0), true).unwrap();
        assert!(bands.is_feasible(0.5));
        assert!(!bands.is_feasible(1.0));
        assert!(!bands.is_feasible(1.5));
    }

    #[test]
    fn test_bootstrap_request_ranges() {
        assert!(BootstrapRequest::default().validate().is_ok());
        assert_eq!(
            BootstrapRequest::default().with_alpha(1.5).validate(),
            Err(RequestError::Alpha(1.5))
        );
        assert_eq!(BootstrapRequest::default().with_alpha(0.0).validate(), Err(RequestError::Alpha(0.0)));
        assert_eq!(BootstrapRequest::default().with_dt(-1.0).validate(), Err(RequestError::TimeStep(-1.0)));
        assert!(BootstrapRequest::default().with_dt(f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_band_request_ranges() {
        assert!(BandRequest::default().validate().is_ok());
        assert_eq!(
            BandRequest::default().with_stop_loss(0.5).validate(),
            Err(RequestError::StopLoss(0.5))
        );
        assert_eq!(
            BandRequest::default().with_leverage(Leverage::Fixed(-1.0)).validate(),
            Err(RequestError::Leverage(-1.0))
        );
        assert_eq!(BandRequest::default().with_cost(-0.1).validate(), Err(RequestError::Cost(-0.1)));
        assert_eq!(BandRequest::default().with_max_eval(0).validate(), Err(RequestError::EvaluationBudget));
        assert_eq!(
            BandRequest { alpha: 2.0, ..BandRequest::default() }.validate(),
            Err(RequestError::Alpha(2.0))
        );
    }

    #[test]
    fn test_leverage_position_size() {
        assert_eq!(Leverage::Fixed(2.5).position_size(), 2.5);
        assert_eq!(Leverage::Fixed(f64::NAN).position_size(), 1.0);
        assert_eq!(Leverage::Solve.position_size(), 1.0);
        assert!(Leverage::Solve.is_solve());
    }

    #[test]
    fn test_band_request_defaults() {
        let request = BandRequest::default();
        assert_eq!(request.max_eval, 500);
        assert_eq!(request.initial_guess, [-0.5, 0.5]);
        assert_eq!(request.xtol_rel, 1e-8);
        assert_eq!(request.u_floor_cost, CostUnits::Raw);
    }

    #[test]
    fn test_band_request_bounds() {
        let request = BandRequest::for_process(8.0, 2.0)
            .with_stop_loss(-2.0)
            .with_cost(0.1);
        assert_relative_eq!(request.sigma_stat(), 0.5);
        assert_relative_eq!(request.standardized_cost(), 0.2);

        let (lower, upper) = request.bounds();
        assert_relative_eq!(lower[0], -1.99, epsilon = 1e-12);
        assert_relative_eq!(lower[1], -1.9, epsilon = 1e-12);
        assert_eq!(upper, [0.6, 3.0]);

        let standardized = BandRequest { u_floor_cost: CostUnits::Standardized, ..request };
        assert_relative_eq!(standardized.bounds().0[1], -1.8, epsilon = 1e-12);
    }

    #[test]
    fn test_bootstrap_request_builder() {
        let request = BootstrapRequest::default()
            .with_replicates(10)
            .with_seed(7)
            .with_dt(1.0)
            .with_alpha(0.1);
        assert_eq!(request.replicates, 10);
        assert_eq!(request.seed, 7);
        assert_eq!(request.dt, 1.0);
        assert_eq!(request.alpha, 0.1);
        assert_relative_eq!(BootstrapRequest::default().dt, 1.0 / 17520.0, epsilon = 1e-15);
    }

    #[test]
    fn test_leverage_toml_roundtrip() {
        #[derive(Deserialize)]
        struct Wrapper {
            leverage: Leverage,
        }
        let solve: Wrapper = toml::from_str("leverage = \"solve\"").unwrap();
        assert_eq!(solve.leverage, Leverage::Solve);
        let fixed: Wrapper = toml::from_str("leverage = { fixed = 2.0 }").unwrap();
        assert_eq!(fixed.leverage, Leverage::Fixed(2.0));
    }
}
