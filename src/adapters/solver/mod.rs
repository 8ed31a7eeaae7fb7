//! Solver Adapters
//!
//! Concrete `BoxSolver` implementations used by the band optimizer.

mod projected_bfgs;

pub use projected_bfgs::ProjectedBfgs;
