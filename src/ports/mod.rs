//! Ports Layer - Trait definitions for swappable collaborators
//!
//! Following hexagonal architecture, the band optimizer only depends on the
//! `BoxSolver` contract: minimize a scalar objective of (d, u) over a box.
//! Concrete solvers live in `adapters::solver`.

pub mod solver;
pub mod mocks;

pub use solver::{BoxProblem, BoxSolver, Objective, SolverOutcome, SolverStatus};
pub use mocks::MockSolver;
