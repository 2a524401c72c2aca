//! Curve fitting.
//!
//! Responsibilities:
//!
//! - run the Levenberg–Marquardt iteration for one dataset (`solver`)
//! - derive covariance and R² from a converged fit (`stats`)
//! - fit many independent datasets in parallel (`batch`)

pub mod batch;
pub mod solver;
pub mod stats;

pub use batch::*;
pub use solver::*;
pub use stats::*;
