//! Shared domain types.
//!
//! These types are kept lightweight and serializable so a fit result can be
//! handed to a formatter, a plotter, or written to JSON without conversion.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, EvaluationFailure};

/// A single observed `(x, y)` sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub x: f64,
    pub y: f64,
}

impl Observation {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Observation {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Finite-difference scheme used by the Jacobian estimator.
///
/// One scheme is used for the whole fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifferenceScheme {
    /// `(f(p + ε) - f(p)) / ε`; one extra model evaluation per parameter.
    #[default]
    Forward,
    /// `(f(p + ε) - f(p - ε)) / 2ε`; twice the cost, second-order accurate.
    Central,
}

/// Solver configuration.
///
/// `max_iterations`, `relative_tolerance`, and `initial_damping` are the
/// primary knobs; the rest have defaults that rarely need changing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// Upper bound on outer iterations (Jacobian evaluations).
    pub max_iterations: usize,
    /// Converge once an accepted step decreases SSR by less than this fraction.
    pub relative_tolerance: f64,
    /// Seed for the damping parameter λ.
    pub initial_damping: f64,

    /// Converge once `‖δ‖ <= step_tolerance * (‖p‖ + step_tolerance)`.
    pub step_tolerance: f64,
    /// SSR at or below this value counts as an exact fit.
    pub ssr_floor: f64,
    /// Multiplier applied to λ on rejection (and divisor on acceptance).
    pub damping_factor: f64,
    pub min_damping: f64,
    pub max_damping: f64,
    /// Rejected or singular trial steps allowed within one iteration.
    pub max_step_retries: usize,
    pub difference: DifferenceScheme,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            relative_tolerance: 1e-8,
            initial_damping: 1e-3,
            step_tolerance: 1e-8,
            ssr_floor: 1e-20,
            damping_factor: 10.0,
            min_damping: 1e-12,
            max_damping: 1e16,
            max_step_retries: 30,
            difference: DifferenceScheme::Forward,
        }
    }
}

impl FitConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_relative_tolerance(mut self, tolerance: f64) -> Self {
        self.relative_tolerance = tolerance;
        self
    }

    pub fn with_initial_damping(mut self, damping: f64) -> Self {
        self.initial_damping = damping;
        self
    }

    pub fn with_step_tolerance(mut self, tolerance: f64) -> Self {
        self.step_tolerance = tolerance;
        self
    }

    pub fn with_difference(mut self, scheme: DifferenceScheme) -> Self {
        self.difference = scheme;
        self
    }

    pub fn with_max_step_retries(mut self, retries: usize) -> Self {
        self.max_step_retries = retries;
        self
    }

    /// Check the numeric knobs, independent of any dataset.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_iterations == 0 {
            return Err(ConfigurationError::ZeroIterations);
        }
        let positive = [
            ("relative_tolerance", self.relative_tolerance),
            ("initial_damping", self.initial_damping),
            ("step_tolerance", self.step_tolerance),
            ("ssr_floor", self.ssr_floor),
            ("min_damping", self.min_damping),
            ("max_damping", self.max_damping),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigurationError::NonPositive { name, value });
            }
        }
        if !(self.damping_factor.is_finite() && self.damping_factor > 1.0) {
            return Err(ConfigurationError::DampingFactor(self.damping_factor));
        }
        if self.min_damping > self.max_damping {
            return Err(ConfigurationError::DampingBounds {
                min: self.min_damping,
                max: self.max_damping,
            });
        }
        Ok(())
    }
}

/// Terminal state of a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FitStatus {
    Converged,
    MaxIterationsExceeded,
    Diverged,
    InvalidConfiguration,
}

impl FitStatus {
    pub fn label(self) -> &'static str {
        match self {
            FitStatus::Converged => "CONVERGED",
            FitStatus::MaxIterationsExceeded => "MAX_ITERATIONS_EXCEEDED",
            FitStatus::Diverged => "DIVERGED",
            FitStatus::InvalidConfiguration => "INVALID_CONFIGURATION",
        }
    }
}

impl std::fmt::Display for FitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which test declared convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceCriterion {
    /// Relative SSR decrease fell below `relative_tolerance`.
    RelativeReduction,
    /// Step size relative to the parameters fell below `step_tolerance`.
    SmallStep,
    /// SSR fell below `ssr_floor`.
    NegligibleResidual,
}

/// Why a fit stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    Converged { criterion: ConvergenceCriterion },
    IterationLimit,
    /// The initial guess already produced a non-finite prediction.
    InitialEvaluationFailed { failure: EvaluationFailure },
    /// The model became undefined near the current estimate.
    JacobianFailed { failure: EvaluationFailure },
    /// The damped normal equations stayed singular after every retry.
    SingularSystem,
    /// No trial step decreased SSR after every retry.
    NoImprovement,
    InvalidConfiguration { error: ConfigurationError },
}

impl Termination {
    pub fn status(&self) -> FitStatus {
        match self {
            Termination::Converged { .. } => FitStatus::Converged,
            Termination::IterationLimit => FitStatus::MaxIterationsExceeded,
            Termination::InitialEvaluationFailed { .. }
            | Termination::JacobianFailed { .. }
            | Termination::SingularSystem
            | Termination::NoImprovement => FitStatus::Diverged,
            Termination::InvalidConfiguration { .. } => FitStatus::InvalidConfiguration,
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Converged { criterion } => match criterion {
                ConvergenceCriterion::RelativeReduction => {
                    write!(f, "relative decrease in SSR below tolerance")
                }
                ConvergenceCriterion::SmallStep => write!(f, "parameter step below tolerance"),
                ConvergenceCriterion::NegligibleResidual => write!(f, "SSR is negligible"),
            },
            Termination::IterationLimit => write!(f, "iteration limit reached without convergence"),
            Termination::InitialEvaluationFailed { failure } => {
                write!(f, "initial guess is infeasible: {failure}")
            }
            Termination::JacobianFailed { failure } => {
                write!(f, "model undefined near current estimate: {failure}")
            }
            Termination::SingularSystem => {
                write!(f, "normal equations remained singular after damping increases")
            }
            Termination::NoImprovement => {
                write!(f, "no trial step reduced SSR after damping increases")
            }
            Termination::InvalidConfiguration { error } => write!(f, "{error}"),
        }
    }
}

/// State after an accepted step (iteration 0 is the initial guess).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub iteration: usize,
    pub ssr: f64,
    /// Damping in effect after the step was accepted.
    pub damping: f64,
    /// Euclidean norm of the accepted step (0 for the initial record).
    pub step_norm: f64,
}

/// Terminal output of a fit. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitResult {
    /// Converged parameters, or the best estimate found before stopping.
    pub parameters: Vec<f64>,
    /// Row-major `k × k` parameter covariance; present only when converged.
    pub covariance: Option<Vec<Vec<f64>>>,
    /// Coefficient of determination; absent unless converged with `SS_tot > 0`.
    pub r_squared: Option<f64>,
    /// `SSR / (n - k)`; `+∞` when `n = k`. Present only when converged.
    pub residual_variance: Option<f64>,
    /// SSR at `parameters`, when it was evaluated.
    pub ssr: Option<f64>,
    pub iterations: usize,
    pub observations: usize,
    pub status: FitStatus,
    pub termination: Termination,
    /// Accepted steps in order; SSR is non-increasing along it.
    pub history: Vec<StepRecord>,
}

impl FitResult {
    pub fn is_converged(&self) -> bool {
        self.status == FitStatus::Converged
    }

    /// Square roots of the covariance diagonal.
    pub fn standard_errors(&self) -> Option<Vec<f64>> {
        let cov = self.covariance.as_ref()?;
        Some(cov.iter().enumerate().map(|(i, row)| row[i].sqrt()).collect())
    }

    /// Root-mean-square residual at `parameters`.
    pub fn rmse(&self) -> Option<f64> {
        let ssr = self.ssr?;
        if self.observations == 0 {
            return None;
        }
        Some((ssr / self.observations as f64).sqrt())
    }

    /// The configuration error that prevented the fit, if any.
    pub fn configuration_error(&self) -> Option<&ConfigurationError> {
        match &self.termination {
            Termination::InvalidConfiguration { error } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = FitConfig::default();
        assert_eq!(config.max_iterations, 200);
        assert_eq!(config.relative_tolerance, 1e-8);
        assert_eq!(config.initial_damping, 1e-3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_knobs() {
        let zero = FitConfig::default().with_max_iterations(0);
        assert_eq!(zero.validate(), Err(ConfigurationError::ZeroIterations));

        let tol = FitConfig::default().with_relative_tolerance(-1.0);
        assert!(matches!(
            tol.validate(),
            Err(ConfigurationError::NonPositive {
                name: "relative_tolerance",
                ..
            })
        ));

        let damping = FitConfig::default().with_initial_damping(f64::NAN);
        assert!(matches!(
            damping.validate(),
            Err(ConfigurationError::NonPositive {
                name: "initial_damping",
                ..
            })
        ));

        let factor = FitConfig {
            damping_factor: 1.0,
            ..FitConfig::default()
        };
        assert_eq!(factor.validate(), Err(ConfigurationError::DampingFactor(1.0)));
    }

    #[test]
    fn termination_maps_to_status() {
        let converged = Termination::Converged {
            criterion: ConvergenceCriterion::SmallStep,
        };
        assert_eq!(converged.status(), FitStatus::Converged);
        assert_eq!(Termination::IterationLimit.status(), FitStatus::MaxIterationsExceeded);
        assert_eq!(Termination::SingularSystem.status(), FitStatus::Diverged);
        assert_eq!(Termination::NoImprovement.status(), FitStatus::Diverged);
        assert_eq!(
            Termination::InvalidConfiguration {
                error: ConfigurationError::EmptyGuess
            }
            .status(),
            FitStatus::InvalidConfiguration
        );
    }

    #[test]
    fn status_serializes_as_screaming_case() {
        let json = serde_json::to_string(&FitStatus::MaxIterationsExceeded).unwrap();
        assert_eq!(json, "\"MAX_ITERATIONS_EXCEEDED\"");
    }
}
