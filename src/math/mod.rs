//! Numerical building blocks: residuals, finite-difference Jacobians, and
//! the small dense linear solves the solver needs.

pub mod jacobian;
pub mod linalg;
pub mod residuals;

pub use jacobian::*;
pub use linalg::*;
pub use residuals::*;
