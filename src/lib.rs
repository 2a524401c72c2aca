//! `lmfit` library crate.
//!
//! The binary (`lmfit`) is a thin wrapper around this library so that:
//!
//! - the solver is testable without spawning processes
//! - any `Model` (including plain closures) can be fitted from other code
//! - presentation stays out of the numerical modules
//!
//! Entry points: [`fit::fit`] for one dataset, [`fit::fit_batch`] for many.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
