//! The `Model` capability, named model specifications, and built-in curves.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Anything that predicts `y` from `x` and a parameter vector.
///
/// Implementations must be pure: the same inputs always give the same output,
/// and evaluation never mutates state shared with another fit. Non-finite
/// outputs are allowed; the solver treats them as failed evaluations.
pub trait Model {
    fn evaluate(&self, x: f64, parameters: &[f64]) -> f64;

    /// Number of parameters `evaluate` expects, when the model knows it.
    ///
    /// The solver rejects a guess of any other length before evaluating.
    fn parameter_count(&self) -> Option<usize> {
        None
    }
}

impl<F> Model for F
where
    F: Fn(f64, &[f64]) -> f64,
{
    fn evaluate(&self, x: f64, parameters: &[f64]) -> f64 {
        self(x, parameters)
    }
}

/// A named model together with its initial parameter guess.
#[derive(Debug, Clone)]
pub struct ModelSpec<M> {
    pub name: String,
    pub model: M,
    pub initial_guess: Vec<f64>,
}

impl<M: Model> ModelSpec<M> {
    /// Rejects an empty guess, or one the model's parameter count disagrees
    /// with; numerical checks happen in the solver.
    pub fn new(
        name: impl Into<String>,
        model: M,
        initial_guess: Vec<f64>,
    ) -> Result<Self, ConfigurationError> {
        if initial_guess.is_empty() {
            return Err(ConfigurationError::EmptyGuess);
        }
        if let Some(expected) = model.parameter_count() {
            if expected != initial_guess.len() {
                return Err(ConfigurationError::ParameterCount {
                    expected,
                    got: initial_guess.len(),
                });
            }
        }
        Ok(Self {
            name: name.into(),
            model,
            initial_guess,
        })
    }

    pub fn parameter_count(&self) -> usize {
        self.initial_guess.len()
    }
}

/// Built-in curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// `a + b·e^(c·x)`
    ExpOffset,
    /// `a + b·x`
    Linear,
    /// `a·x^b`
    Power,
}

impl ModelKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::ExpOffset => "exp-offset",
            ModelKind::Linear => "linear",
            ModelKind::Power => "power",
        }
    }

    pub fn formula(self) -> &'static str {
        match self {
            ModelKind::ExpOffset => "y = a + b*exp(c*x)",
            ModelKind::Linear => "y = a + b*x",
            ModelKind::Power => "y = a*x^b",
        }
    }

    pub fn parameter_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::ExpOffset => &["a", "b", "c"],
            ModelKind::Linear | ModelKind::Power => &["a", "b"],
        }
    }

    pub fn param_count(self) -> usize {
        self.parameter_names().len()
    }

    /// A starting point that works for decaying/increasing data of moderate scale.
    ///
    /// The exponential starts with a negative rate. From `(1, 1, 1)` a fit to
    /// decaying data slides along the `a + b ≈ const` valley (a and b growing
    /// apart, c shrinking towards 0) and stops at the iteration limit.
    pub fn default_guess(self) -> Vec<f64> {
        match self {
            ModelKind::ExpOffset => vec![1.0, 1.0, -1.0],
            ModelKind::Linear => vec![0.0, 1.0],
            ModelKind::Power => vec![1.0, 1.0],
        }
    }

    /// Pair this curve with a guess under its display name.
    pub fn spec(self, initial_guess: Vec<f64>) -> Result<ModelSpec<ModelKind>, ConfigurationError> {
        ModelSpec::new(self.display_name(), self, initial_guess)
    }
}

impl Model for ModelKind {
    /// # Panics
    /// Panics if `parameters` is shorter than `param_count()`; the solver
    /// checks the length through `parameter_count` first.
    fn evaluate(&self, x: f64, parameters: &[f64]) -> f64 {
        match self {
            ModelKind::ExpOffset => parameters[0] + parameters[1] * (parameters[2] * x).exp(),
            ModelKind::Linear => parameters[0] + parameters[1] * x,
            ModelKind::Power => parameters[0] * x.powf(parameters[1]),
        }
    }

    fn parameter_count(&self) -> Option<usize> {
        Some(self.param_count())
    }
}
