//! Observation sources: the bundled lab dataset and seeded synthetic samples.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::Observation;
use crate::error::AppError;
use crate::models::{Model, ModelKind};

/// Signal (V) against distance (mm) from the curve-fitting lab.
const LAB_DATA: [(f64, f64); 6] = [(0.0, 5.1), (1.0, 3.2), (2.0, 2.1), (3.0, 1.6), (4.0, 1.3), (5.0, 1.1)];

/// The bundled lab dataset.
pub fn lab_observations() -> Vec<Observation> {
    LAB_DATA.iter().map(|&p| p.into()).collect()
}

/// Parameters used to generate synthetic data when none are given.
/// These differ from `ModelKind::default_guess`.
pub fn reference_truth(kind: ModelKind) -> Vec<f64> {
    match kind {
        ModelKind::ExpOffset => vec![1.0, 4.0, -0.6],
        ModelKind::Linear => vec![0.5, 2.0],
        ModelKind::Power => vec![2.0, 0.5],
    }
}

/// Options for synthetic sample generation.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    /// Number of evenly spaced x-values.
    pub count: usize,
    pub x_min: f64,
    pub x_max: f64,
    /// Standard deviation of additive Gaussian noise on y.
    pub noise_sd: f64,
    pub seed: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            count: 30,
            x_min: 0.0,
            x_max: 5.0,
            noise_sd: 0.01,
            seed: 42,
        }
    }
}

/// Sample `y = model(x, truth) + noise` on an even grid over `[x_min, x_max]`.
///
/// The same config and seed always produce the same observations.
pub fn generate_sample<M: Model + ?Sized>(
    model: &M,
    truth: &[f64],
    config: &SampleConfig,
) -> Result<Vec<Observation>, AppError> {
    if let Some(expected) = model.parameter_count() {
        if expected != truth.len() {
            return Err(AppError::new(
                2,
                format!("Model needs {expected} true parameters, got {}.", truth.len()),
            ));
        }
    }
    if config.count == 0 {
        return Err(AppError::new(2, "Sample count must be > 0."));
    }
    if !(config.x_min.is_finite() && config.x_max.is_finite() && config.x_max >= config.x_min) {
        return Err(AppError::new(
            2,
            format!("Invalid x range: [{}, {}].", config.x_min, config.x_max),
        ));
    }
    if !(config.noise_sd.is_finite() && config.noise_sd >= 0.0) {
        return Err(AppError::new(2, "Noise standard deviation must be finite and >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, config.noise_sd)
        .map_err(|e| AppError::new(2, format!("Noise distribution error: {e}")))?;

    let span = config.x_max - config.x_min;
    let steps = config.count.saturating_sub(1).max(1) as f64;

    let mut out = Vec::with_capacity(config.count);
    for i in 0..config.count {
        let x = config.x_min + span * i as f64 / steps;
        let y_true = model.evaluate(x, truth);
        if !y_true.is_finite() {
            return Err(AppError::new(
                4,
                format!("Model is not finite at x={x} for the true parameters."),
            ));
        }
        out.push(Observation::new(x, y_true + normal.sample(&mut rng)));
    }
    Ok(out)
}

/// Summary stats about an observation set.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub n_points: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

pub fn compute_stats(observations: &[Observation]) -> Option<DatasetStats> {
    let first = observations.first()?;
    let mut stats = DatasetStats {
        n_points: observations.len(),
        x_min: first.x,
        x_max: first.x,
        y_min: first.y,
        y_max: first.y,
    };
    for o in &observations[1..] {
        stats.x_min = stats.x_min.min(o.x);
        stats.x_max = stats.x_max.max(o.x);
        stats.y_min = stats.y_min.min(o.y);
        stats.y_max = stats.y_max.max(o.y);
    }
    Some(stats)
}
