use std::sync::{Arc, Mutex};

use super::solver::{BoxProblem, BoxSolver, Objective, SolverOutcome, SolverStatus};

/// Mock solver that returns a scripted point and records the problems it saw
#[derive(Debug, Clone)]
pub struct MockSolver {
    x: [f64; 2],
    status: SolverStatus,
    calls: Arc<Mutex<Vec<BoxProblem>>>,
}

impl MockSolver {
    /// Always "converges" to `x`
    pub fn converging_to(x: [f64; 2]) -> Self {
        Self {
            x,
            status: SolverStatus::XtolReached,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always fails with `reason`
    pub fn failing(reason: &str) -> Self {
        Self {
            x: [f64::NAN, f64::NAN],
            status: SolverStatus::Failed(reason.to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get all recorded problems
    pub fn get_calls(&self) -> Vec<BoxProblem> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl BoxSolver for MockSolver {
    fn minimize(&self, objective: &Objective<'_>, problem: &BoxProblem) -> SolverOutcome {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(*problem);
        }
        match &self.status {
            SolverStatus::Failed(reason) => SolverOutcome::failed(problem.start, 0, reason.clone()),
            status => SolverOutcome {
                status: status.clone(),
                x: self.x,
                value: objective(&self.x),
                evaluations: 1,
            },
        }
    }
}
