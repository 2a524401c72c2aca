//! Model functions the solver can fit.
//!
//! The solver only depends on the [`Model`] capability; closures and the
//! built-in [`ModelKind`] curves both implement it.

pub mod model;

pub use model::*;
