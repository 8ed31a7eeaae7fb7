use serde::{Deserialize, Serialize};
use std::fmt;

/// Objective over the (entry, take-profit) plane; may return +inf where undefined
pub type Objective<'a> = dyn Fn(&[f64; 2]) -> f64 + Sync + 'a;

/// Box-constrained minimization problem in two variables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxProblem {
    pub lower: [f64; 2],
    pub upper: [f64; 2],
    pub start: [f64; 2],
    /// Stop when a step changes x by less than xtol_rel * |x|
    pub xtol_rel: f64,
    /// Objective evaluation budget
    pub max_eval: usize,
}

impl BoxProblem {
    /// Clamp a point into the box
    pub fn project(&self, x: [f64; 2]) -> [f64; 2] {
        [
            x[0].clamp(self.lower[0], self.upper[0]),
            x[1].clamp(self.lower[1], self.upper[1]),
        ]
    }

    /// Lower bound not above upper bound in both coordinates
    pub fn is_well_posed(&self) -> bool {
        (0..2).all(|i| {
            self.lower[i].is_finite() && self.upper[i].is_finite() && self.lower[i] <= self.upper[i]
        }) && self.start.iter().all(|v| v.is_finite())
    }
}

/// How a solve ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SolverStatus {
    /// Step size fell below the relative tolerance
    XtolReached,
    /// Projected gradient vanished
    Stationary,
    /// Evaluation budget exhausted; best point so far is returned
    MaxEvalReached,
    /// No usable minimizer
    Failed(String),
}

impl SolverStatus {
    /// Anything but `Failed` yields a usable point
    pub fn is_success(&self) -> bool {
        !matches!(self, SolverStatus::Failed(_))
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverStatus::XtolReached => write!(f, "xtol reached"),
            SolverStatus::Stationary => write!(f, "stationary point"),
            SolverStatus::MaxEvalReached => write!(f, "evaluation budget reached"),
            SolverStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Result of a solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOutcome {
    pub status: SolverStatus,
    pub x: [f64; 2],
    pub value: f64,
    pub evaluations: usize,
}

impl SolverOutcome {
    pub fn failed(x: [f64; 2], evaluations: usize, reason: impl Into<String>) -> Self {
        Self {
            status: SolverStatus::Failed(reason.into()),
            x,
            value: f64::NAN,
            evaluations,
        }
    }
}

/// Local minimizer over a box. Implementations must be deterministic for a
/// given problem and objective.
pub trait BoxSolver: Send + Sync {
    fn minimize(&self, objective: &Objective<'_>, problem: &BoxProblem) -> SolverOutcome;
}

impl<S: BoxSolver + ?Sized> BoxSolver for &S {
    fn minimize(&self, objective: &Objective<'_>, problem: &BoxProblem) -> SolverOutcome {
        (**self).minimize(objective, problem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> BoxProblem {
        BoxProblem {
            lower: [0.0, 0.0],
            upper: [1.0, 1.0],
            start: [0.5, 0.5],
            xtol_rel: 1e-8,
            max_eval: 100,
        }
    }

    #[test]
    fn test_project_clamps_into_box() {
        let problem = unit_box();
        assert_eq!(problem.project([-1.0, 2.0]), [0.0, 1.0]);
        assert_eq!(problem.project([0.3, 0.7]), [0.3, 0.7]);
    }

    #[test]
    fn test_well_posed() {
        assert!(unit_box().is_well_posed());
        let inverted = BoxProblem { lower: [1.0, 0.0], upper: [0.0, 1.0], ..unit_box() };
        assert!(!inverted.is_well_posed());
        let nan_start = BoxProblem { start: [f64::NAN, 0.0], ..unit_box() };
        assert!(!nan_start.is_well_posed());
    }

    #[test]
    fn test_status_success() {
        assert!(SolverStatus::XtolReached.is_success());
        assert!(SolverStatus::MaxEvalReached.is_success());
        assert!(!SolverStatus::Failed("x".into()).is_success());
        assert_eq!(SolverStatus::Failed("nan start".into()).to_string(), "failed: nan start");
    }
}
