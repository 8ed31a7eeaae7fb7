//! Projected BFGS Solver
//!
//! Quasi-Newton minimizer for smooth objectives on a 2-D box. Each iteration
//! builds a search direction from a BFGS inverse-Hessian estimate, freezes
//! coordinates sitting on a bound with the gradient pushing outward, and
//! backtracks along the projected path until the Armijo condition holds.
//! Gradients come from finite differences that stay inside the box.
//!
//! Non-finite objective values (outside the feasible region) are treated as
//! rejected trial points by the line search.

use tracing::{debug, trace};

use crate::ports::solver::{BoxProblem, BoxSolver, Objective, SolverOutcome, SolverStatus};

/// Armijo sufficient-decrease constant
const ARMIJO_C1: f64 = 1e-4;
/// Smallest line-search step before giving up on a direction
const MIN_STEP: f64 = 1e-12;
/// Relative finite-difference step
const FD_STEP: f64 = 1e-7;
/// Projected-gradient norm treated as stationary
const GRADIENT_TOLERANCE: f64 = 1e-10;
/// Curvature floor for accepting a BFGS update
const MIN_CURVATURE: f64 = 1e-14;

/// Box-constrained quasi-Newton solver
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectedBfgs;

impl ProjectedBfgs {
    pub fn new() -> Self {
        Self
    }
}

/// Objective wrapper that enforces the evaluation budget
struct Budgeted<'a, 'o> {
    objective: &'a Objective<'o>,
    max_eval: usize,
    used: usize,
}

impl Budgeted<'_, '_> {
    fn eval(&mut self, x: &[f64; 2]) -> Option<f64> {
        if self.used >= self.max_eval {
            return None;
        }
        self.used += 1;
        Some((self.objective)(x))
    }

    fn exhausted(&self) -> bool {
        self.used >= self.max_eval
    }
}

enum Gradient {
    Value([f64; 2]),
    OutOfBudget,
}

/// Finite-difference gradient that never samples outside the box.
/// Central differences where both sides are finite, one-sided otherwise,
/// zero when neither neighbour is finite.
fn gradient(f: &mut Budgeted<'_, '_>, x: &[f64; 2], fx: f64, problem: &BoxProblem) -> Gradient {
    let mut g = [0.0; 2];
    for i in 0..2 {
        let h = FD_STEP * x[i].abs().max(1.0);
        let up = (x[i] + h).min(problem.upper[i]);
        let down = (x[i] - h).max(problem.lower[i]);

        let f_up = if up > x[i] {
            let mut probe = *x;
            probe[i] = up;
            match f.eval(&probe) {
                Some(v) => v,
                None => return Gradient::OutOfBudget,
            }
        } else {
            f64::NAN
        };
        let f_down = if down < x[i] {
            let mut probe = *x;
            probe[i] = down;
            match f.eval(&probe) {
                Some(v) => v,
                None => return Gradient::OutOfBudget,
            }
        } else {
            f64::NAN
        };

        g[i] = match (f_up.is_finite(), f_down.is_finite()) {
            (true, true) => (f_up - f_down) / (up - down),
            (true, false) => (f_up - fx) / (up - x[i]),
            (false, true) => (fx - f_down) / (x[i] - down),
            (false, false) => 0.0,
        };
    }
    Gradient::Value(g)
}

/// Coordinates pinned at a bound by a gradient pointing out of the box
fn active_set(x: &[f64; 2], g: &[f64; 2], problem: &BoxProblem) -> [bool; 2] {
    let mut active = [false; 2];
    for i in 0..2 {
        let at_lower = x[i] <= problem.lower[i] && g[i] > 0.0;
        let at_upper = x[i] >= problem.upper[i] && g[i] < 0.0;
        active[i] = at_lower || at_upper;
    }
    active
}

fn dot(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

fn norm(a: &[f64; 2]) -> f64 {
    dot(a, a).sqrt()
}

/// H <- (I - r s y^T) H (I - r y s^T) + r s s^T, r = 1 / (y^T s)
fn bfgs_update(h: &mut [[f64; 2]; 2], s: &[f64; 2], y: &[f64; 2]) {
    let sy = dot(s, y);
    if sy <= MIN_CURVATURE {
        return;
    }
    let r = 1.0 / sy;
    let hy = [h[0][0] * y[0] + h[0][1] * y[1], h[1][0] * y[0] + h[1][1] * y[1]];
    let yhy = dot(y, &hy);
    for i in 0..2 {
        for j in 0..2 {
            h[i][j] += (1.0 + r * yhy) * r * s[i] * s[j] - r * (hy[i] * s[j] + s[i] * hy[j]);
        }
    }
}

impl BoxSolver for ProjectedBfgs {
    fn minimize(&self, objective: &Objective<'_>, problem: &BoxProblem) -> SolverOutcome {
        if !problem.is_well_posed() {
            return SolverOutcome::failed(problem.start, 0, "invalid bounds or start");
        }

        let mut f = Budgeted {
            objective,
            max_eval: problem.max_eval.max(1),
            used: 0,
        };

        let mut x = problem.project(problem.start);
        let mut fx = match f.eval(&x) {
            Some(v) if v.is_finite() => v,
            _ => return SolverOutcome::failed(x, f.used, "objective not finite at start"),
        };

        let mut g = match gradient(&mut f, &x, fx, problem) {
            Gradient::Value(g) => g,
            Gradient::OutOfBudget => return finish(SolverStatus::MaxEvalReached, x, fx, f.used),
        };
        let mut h = [[1.0, 0.0], [0.0, 1.0]];

        loop {
            let active = active_set(&x, &g, problem);
            let free_g = [
                if active[0] { 0.0 } else { g[0] },
                if active[1] { 0.0 } else { g[1] },
            ];
            if norm(&free_g) <= GRADIENT_TOLERANCE {
                return finish(SolverStatus::Stationary, x, fx, f.used);
            }

            let mut p = [
                -(h[0][0] * free_g[0] + h[0][1] * free_g[1]),
                -(h[1][0] * free_g[0] + h[1][1] * free_g[1]),
            ];
            for i in 0..2 {
                if active[i] {
                    p[i] = 0.0;
                }
            }
            if dot(&p, &free_g) >= 0.0 {
                // Curvature estimate went bad; restart from steepest descent
                h = [[1.0, 0.0], [0.0, 1.0]];
                p = [-free_g[0], -free_g[1]];
            }

            let mut step = 1.0;
            let accepted = loop {
                let trial = problem.project([x[0] + step * p[0], x[1] + step * p[1]]);
                let moved = [trial[0] - x[0], trial[1] - x[1]];
                if norm(&moved) == 0.0 {
                    break None;
                }
                let f_trial = match f.eval(&trial) {
                    Some(v) => v,
                    None => return finish(SolverStatus::MaxEvalReached, x, fx, f.used),
                };
                if f_trial.is_finite() && f_trial <= fx + ARMIJO_C1 * dot(&g, &moved) {
                    break Some((trial, f_trial));
                }
                step *= 0.5;
                if step < MIN_STEP {
                    break None;
                }
            };

            let Some((x_new, f_new)) = accepted else {
                // No decrease along the best available direction
                trace!(x0 = x[0], x1 = x[1], "line search stalled");
                return finish(SolverStatus::XtolReached, x, fx, f.used);
            };

            let s = [x_new[0] - x[0], x_new[1] - x[1]];
            let converged = (0..2).all(|i| s[i].abs() <= problem.xtol_rel * x_new[i].abs().max(f64::MIN_POSITIVE))
                || norm(&s) <= problem.xtol_rel * norm(&x_new);

            x = x_new;
            fx = f_new;
            if converged {
                return finish(SolverStatus::XtolReached, x, fx, f.used);
            }
            if f.exhausted() {
                return finish(SolverStatus::MaxEvalReached, x, fx, f.used);
            }

            let g_new = match gradient(&mut f, &x, fx, problem) {
                Gradient::Value(g) => g,
                Gradient::OutOfBudget => return finish(SolverStatus::MaxEvalReached, x, fx, f.used),
            };
            let y = [g_new[0] - g[0], g_new[1] - g[1]];
            bfgs_update(&mut h, &s, &y);
            g = g_new;
        }
    }
}

fn finish(status: SolverStatus, x: [f64; 2], value: f64, evaluations: usize) -> SolverOutcome {
    debug!(%status, d = x[0], u = x[1], value, evaluations, "box solve finished");
    SolverOutcome {
        status,
        x,
        value,
        evaluations,
    }
}
