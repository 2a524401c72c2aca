//! Shared fit workflow used by the `fit` and `batch` commands.
//!
//! dataset -> configuration check -> solve -> fitted values
//!
//! The commands then only decide how to print the outputs.

use crate::data::{DatasetStats, SampleConfig, compute_stats, generate_sample, lab_observations, reference_truth};
use crate::domain::{FitConfig, FitResult, Observation};
use crate::error::AppError;
use crate::fit::{StatusCounts, check_configuration, fit, fit_batch};
use crate::models::ModelKind;
use crate::report::{FittedPoint, fitted_points};

/// Where the observations come from.
#[derive(Debug, Clone)]
pub enum DatasetSource {
    Lab,
    Synthetic { truth: Option<Vec<f64>>, sample: SampleConfig },
}

/// All computed outputs of a single fit.
#[derive(Debug, Clone)]
pub struct FitRun {
    pub kind: ModelKind,
    pub observations: Vec<Observation>,
    pub stats: Option<DatasetStats>,
    pub result: FitResult,
    /// Observed vs fitted values at the best estimate; empty if no estimate
    /// could be evaluated.
    pub points: Vec<FittedPoint>,
}

/// All computed outputs of a batch.
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub seeds: Vec<u64>,
    pub results: Vec<FitResult>,
    pub counts: StatusCounts,
}

/// Load (or generate) the observations for a source.
pub fn load_dataset(kind: ModelKind, source: &DatasetSource) -> Result<Vec<Observation>, AppError> {
    match source {
        DatasetSource::Lab => Ok(lab_observations()),
        DatasetSource::Synthetic { truth, sample } => {
            let truth = resolve_truth(kind, truth.as_deref())?;
            generate_sample(&kind, &truth, sample)
        }
    }
}

/// Execute one fit and compute fitted values at the result.
///
/// An invalid configuration is reported as an error (exit code 2) rather
/// than as a result.
pub fn run_fit(
    kind: ModelKind,
    guess: &[f64],
    source: &DatasetSource,
    config: &FitConfig,
) -> Result<FitRun, AppError> {
    check_guess_len(kind, guess)?;
    let observations = load_dataset(kind, source)?;
    check_configuration(&kind, guess, &observations, config)?;

    let result = fit(&kind, guess, &observations, config);
    let points = if result.ssr.is_some() {
        fitted_points(&kind, &observations, &result.parameters)?
    } else {
        Vec::new()
    };

    Ok(FitRun {
        kind,
        stats: compute_stats(&observations),
        observations,
        result,
        points,
    })
}

/// Fit `datasets` synthetic samples drawn with consecutive seeds.
pub fn run_batch(
    kind: ModelKind,
    guess: &[f64],
    truth: Option<&[f64]>,
    sample: &SampleConfig,
    datasets: usize,
    config: &FitConfig,
) -> Result<BatchRun, AppError> {
    if datasets == 0 {
        return Err(AppError::new(2, "Batch needs at least one dataset."));
    }
    check_guess_len(kind, guess)?;
    let truth = resolve_truth(kind, truth)?;

    let seeds: Vec<u64> = (0..datasets as u64).map(|i| sample.seed.wrapping_add(i)).collect();
    let samples = seeds
        .iter()
        .map(|&seed| {
            let cfg = SampleConfig { seed, ..sample.clone() };
            generate_sample(&kind, &truth, &cfg)
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::info!("fitting {} datasets of {} points", samples.len(), sample.count);
    let results = fit_batch(&kind, guess, &samples, config);
    let counts = StatusCounts::tally(&results);

    Ok(BatchRun { seeds, results, counts })
}

fn resolve_truth(kind: ModelKind, truth: Option<&[f64]>) -> Result<Vec<f64>, AppError> {
    let truth = truth.map(<[f64]>::to_vec).unwrap_or_else(|| reference_truth(kind));
    if truth.len() != kind.param_count() {
        return Err(AppError::new(
            2,
            format!(
                "Model '{}' needs {} true parameters, got {}.",
                kind.display_name(),
                kind.param_count(),
                truth.len()
            ),
        ));
    }
    Ok(truth)
}

fn check_guess_len(kind: ModelKind, guess: &[f64]) -> Result<(), AppError> {
    if guess.len() != kind.param_count() {
        return Err(AppError::new(
            2,
            format!(
                "Model '{}' ({}) needs {} initial values, got {}.",
                kind.display_name(),
                kind.formula(),
                kind.param_count(),
                guess.len()
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitStatus;

    #[test]
    fn lab_fit_produces_points() {
        let kind = ModelKind::ExpOffset;
        let run = run_fit(kind, &kind.default_guess(), &DatasetSource::Lab, &FitConfig::default()).unwrap();

        assert_eq!(run.result.status, FitStatus::Converged);
        assert_eq!(run.points.len(), 6);
        assert_eq!(run.stats.unwrap().n_points, 6);
    }

    #[test]
    fn wrong_guess_length_is_a_usage_error() {
        let err = run_fit(ModelKind::ExpOffset, &[1.0, 2.0], &DatasetSource::Lab, &FitConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn invalid_configuration_is_a_usage_error() {
        let config = FitConfig::default().with_max_iterations(0);
        let kind = ModelKind::Linear;
        let err = run_fit(kind, &kind.default_guess(), &DatasetSource::Lab, &config).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("max_iterations"));
    }

    #[test]
    fn synthetic_batch_uses_consecutive_seeds() {
        let kind = ModelKind::Linear;
        let sample = SampleConfig {
            count: 10,
            seed: 5,
            ..SampleConfig::default()
        };
        let run = run_batch(kind, &kind.default_guess(), None, &sample, 3, &FitConfig::default()).unwrap();

        assert_eq!(run.seeds, vec![5, 6, 7]);
        assert_eq!(run.results.len(), 3);
        assert_eq!(run.counts.converged, 3);
    }

    #[test]
    fn truth_length_is_checked() {
        let kind = ModelKind::Power;
        let err = run_batch(kind, &kind.default_guess(), Some(&[1.0]), &SampleConfig::default(), 2, &FitConfig::default())
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
