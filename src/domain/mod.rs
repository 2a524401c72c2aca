//! Domain types shared by the solver, reporting, and exports.
//!
//! This module defines:
//!
//! - observations (`Observation`)
//! - solver configuration (`FitConfig`, `DifferenceScheme`)
//! - fit outputs (`FitResult`, `FitStatus`, `Termination`, `StepRecord`)

pub mod types;

pub use types::*;
