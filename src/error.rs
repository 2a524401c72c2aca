use serde::Serialize;
use thiserror::Error;

/// Application-level error carrying the process exit code.
///
/// Exit codes:
/// - `2`: usage, configuration, or IO problems
/// - `4`: numerical failures surfaced to the user
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<ConfigurationError> for AppError {
    fn from(err: ConfigurationError) -> Self {
        AppError::new(2, format!("Invalid fit configuration: {err}"))
    }
}

/// A fit that cannot be started.
///
/// These are detected before the first iteration and are never retried.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationError {
    #[error("initial guess is empty; at least one parameter is required")]
    EmptyGuess,
    #[error("model takes {expected} parameters but the initial guess has {got}")]
    ParameterCount { expected: usize, got: usize },
    #[error("too few observations: n={observations} < k={parameters}")]
    TooFewObservations { observations: usize, parameters: usize },
    #[error("max_iterations must be at least 1")]
    ZeroIterations,
    #[error("{name} must be finite and > 0 (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("damping_factor must be finite and > 1 (got {0})")]
    DampingFactor(f64),
    #[error("min_damping ({min}) must not exceed max_damping ({max})")]
    DampingBounds { min: f64, max: f64 },
    #[error("initial guess parameter {index} is not finite ({value})")]
    NonFiniteGuess { index: usize, value: f64 },
    #[error("observation {index} is not finite (x={x}, y={y})")]
    NonFiniteObservation { index: usize, x: f64, y: f64 },
}

/// The model produced a non-finite value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Error)]
#[error("model is not finite at observation {observation} (x={x}){}", parameter_suffix(.parameter))]
pub struct EvaluationFailure {
    /// Index of the offending observation.
    pub observation: usize,
    pub x: f64,
    /// Parameter being perturbed, when the failure came from the Jacobian.
    pub parameter: Option<usize>,
}

fn parameter_suffix(parameter: &Option<usize>) -> String {
    match parameter {
        Some(j) => format!(" while perturbing parameter {j}"),
        None => String::new(),
    }
}
