//! Independent fits over many datasets.
//!
//! Each dataset gets its own solver; nothing is shared between fits except the
//! read-only model, so the work is spread across threads with rayon. Results
//! come back in input order and are identical to running the fits one by one.

use rayon::prelude::*;

use crate::domain::{FitConfig, FitResult, FitStatus, Observation};
use crate::fit::solver::fit;
use crate::models::Model;

/// Fit the same model and starting guess to each dataset in parallel.
pub fn fit_batch<M, D>(model: &M, initial_guess: &[f64], datasets: &[D], config: &FitConfig) -> Vec<FitResult>
where
    M: Model + Sync + ?Sized,
    D: AsRef<[Observation]> + Sync,
{
    datasets
        .par_iter()
        .map(|obs| fit(model, initial_guess, obs.as_ref(), config))
        .collect()
}

/// Count of results per terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub converged: usize,
    pub max_iterations_exceeded: usize,
    pub diverged: usize,
    pub invalid_configuration: usize,
}

impl StatusCounts {
    pub fn tally(results: &[FitResult]) -> Self {
        let mut counts = Self::default();
        for r in results {
            match r.status {
                FitStatus::Converged => counts.converged += 1,
                FitStatus::MaxIterationsExceeded => counts.max_iterations_exceeded += 1,
                FitStatus::Diverged => counts.diverged += 1,
                FitStatus::InvalidConfiguration => counts.invalid_configuration += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.converged + self.max_iterations_exceeded + self.diverged + self.invalid_configuration
    }
}
