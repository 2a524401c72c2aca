//! Levenberg–Marquardt solver for a single fit.
//!
//! Each iteration solves the damped normal equations
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr
//! ```
//!
//! where `J` is the model Jacobian and `r = y - model(x, p)`. A trial step
//! `p + δ` is accepted only if it strictly lowers SSR; otherwise `λ` grows by
//! `damping_factor` and the step is re-solved from the same `p`. Accepted steps
//! shrink `λ` again, so the method moves between gradient descent (large `λ`)
//! and Gauss–Newton (small `λ`) as the fit progresses.
//!
//! States: initialized → iterating → converged / iteration limit / diverged.
//! Configuration problems are caught before the first iteration and reported
//! as `FitStatus::InvalidConfiguration` with zero iterations.

use log::{debug, info, trace};
use nalgebra::{DMatrix, DVector};

use crate::domain::{
    ConvergenceCriterion, FitConfig, FitResult, FitStatus, Observation, StepRecord, Termination,
};
use crate::error::ConfigurationError;
use crate::fit::stats::{FitQuality, estimate_quality};
use crate::math::{jacobian, residuals, solve_damped, sum_of_squares};
use crate::models::{Model, ModelSpec};

/// Fit `model` to `observations` starting from `initial_guess`.
///
/// Always returns a well-formed result; check `status` to tell a good fit from
/// a failed one.
pub fn fit<M: Model + ?Sized>(
    model: &M,
    initial_guess: &[f64],
    observations: &[Observation],
    config: &FitConfig,
) -> FitResult {
    LevenbergMarquardt::new(model, observations, config).run(initial_guess)
}

/// Fit a named model specification.
pub fn fit_spec<M: Model>(spec: &ModelSpec<M>, observations: &[Observation], config: &FitConfig) -> FitResult {
    fit(&spec.model, &spec.initial_guess, observations, config)
}

/// Everything that must hold before a fit may start.
pub fn check_configuration<M: Model + ?Sized>(
    model: &M,
    initial_guess: &[f64],
    observations: &[Observation],
    config: &FitConfig,
) -> Result<(), ConfigurationError> {
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
    if observations.len() < initial_guess.len() {
        return Err(ConfigurationError::TooFewObservations {
            observations: observations.len(),
            parameters: initial_guess.len(),
        });
    }
    config.validate()?;

    if let Some((index, &value)) = initial_guess.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(ConfigurationError::NonFiniteGuess { index, value });
    }
    if let Some((index, obs)) = observations
        .iter()
        .enumerate()
        .find(|(_, o)| !(o.x.is_finite() && o.y.is_finite()))
    {
        return Err(ConfigurationError::NonFiniteObservation {
            index,
            x: obs.x,
            y: obs.y,
        });
    }
    Ok(())
}

/// Solver bound to one model and dataset.
///
/// Holds only borrowed inputs; all working state lives in [`LevenbergMarquardt::run`].
pub struct LevenbergMarquardt<'a, M: ?Sized> {
    model: &'a M,
    observations: &'a [Observation],
    config: &'a FitConfig,
}

/// Result of searching for an acceptable step from a fixed `p`.
enum StepOutcome {
    Accepted {
        parameters: DVector<f64>,
        residuals: DVector<f64>,
        ssr: f64,
        step_norm: f64,
    },
    /// A trial step that already meets the step tolerance failed to improve SSR.
    Stationary,
    Singular,
    NoImprovement,
}

impl<'a, M: Model + ?Sized> LevenbergMarquardt<'a, M> {
    pub fn new(model: &'a M, observations: &'a [Observation], config: &'a FitConfig) -> Self {
        Self {
            model,
            observations,
            config,
        }
    }

    pub fn run(&self, initial_guess: &[f64]) -> FitResult {
        if let Err(error) = check_configuration(self.model, initial_guess, self.observations, self.config) {
            debug!("fit rejected before iterating: {error}");
            return FitResult {
                parameters: initial_guess.to_vec(),
                covariance: None,
                r_squared: None,
                residual_variance: None,
                ssr: None,
                iterations: 0,
                observations: self.observations.len(),
                status: FitStatus::InvalidConfiguration,
                termination: Termination::InvalidConfiguration { error },
                history: Vec::new(),
            };
        }

        let config = self.config;
        let mut p = DVector::from_column_slice(initial_guess);

        let mut r = match residuals(self.model, self.observations, p.as_slice()) {
            Ok(r) => r,
            Err(failure) => {
                return self.finish(p, None, 0, Termination::InitialEvaluationFailed { failure }, Vec::new());
            }
        };
        let mut ssr = sum_of_squares(&r);
        let mut damping = config.initial_damping.clamp(config.min_damping, config.max_damping);
        let mut history = vec![StepRecord {
            iteration: 0,
            ssr,
            damping,
            step_norm: 0.0,
        }];

        if ssr <= config.ssr_floor {
            let termination = Termination::Converged {
                criterion: ConvergenceCriterion::NegligibleResidual,
            };
            return self.finish(p, Some(ssr), 0, termination, history);
        }

        let mut iterations = 0;
        let termination = loop {
            if iterations >= config.max_iterations {
                break Termination::IterationLimit;
            }
            iterations += 1;

            let jac = match jacobian(self.model, self.observations, p.as_slice(), config.difference) {
                Ok(jac) => jac,
                Err(failure) => break Termination::JacobianFailed { failure },
            };
            let jt = jac.transpose();
            let jtj = &jt * &jac;
            let gradient = &jt * &r;

            match self.search_step(&p, &jtj, &gradient, ssr, &mut damping) {
                StepOutcome::Accepted {
                    parameters,
                    residuals,
                    ssr: new_ssr,
                    step_norm,
                } => {
                    let reduction = (ssr - new_ssr) / ssr;
                    let small_step = self.is_small_step(step_norm, p.norm());

                    p = parameters;
                    r = residuals;
                    ssr = new_ssr;
                    damping = (damping / config.damping_factor).max(config.min_damping);
                    history.push(StepRecord {
                        iteration: iterations,
                        ssr,
                        damping,
                        step_norm,
                    });
                    debug!(
                        "iteration {iterations}: ssr={ssr:.6e} reduction={reduction:.3e} step={step_norm:.3e} lambda={damping:.1e}"
                    );

                    if ssr <= config.ssr_floor {
                        break Termination::Converged {
                            criterion: ConvergenceCriterion::NegligibleResidual,
                        };
                    }
                    if reduction < config.relative_tolerance {
                        break Termination::Converged {
                            criterion: ConvergenceCriterion::RelativeReduction,
                        };
                    }
                    if small_step {
                        break Termination::Converged {
                            criterion: ConvergenceCriterion::SmallStep,
                        };
                    }
                }
                StepOutcome::Stationary => {
                    break Termination::Converged {
                        criterion: ConvergenceCriterion::SmallStep,
                    };
                }
                StepOutcome::Singular => break Termination::SingularSystem,
                StepOutcome::NoImprovement => break Termination::NoImprovement,
            }
        };

        self.finish(p, Some(ssr), iterations, termination, history)
    }

    /// Solve for a step from `p`, raising `damping` until SSR strictly decreases.
    fn search_step(
        &self,
        p: &DVector<f64>,
        jtj: &DMatrix<f64>,
        gradient: &DVector<f64>,
        ssr: f64,
        damping: &mut f64,
    ) -> StepOutcome {
        let mut retries = 0;
        loop {
            let Some(delta) = solve_damped(jtj, gradient, *damping) else {
                trace!("singular damped system at lambda={:.1e}", *damping);
                if !self.escalate(damping, &mut retries) {
                    return StepOutcome::Singular;
                }
                continue;
            };

            let step_norm = delta.norm();
            let trial = p + &delta;
            let small_step = self.is_small_step(step_norm, p.norm());

            match residuals(self.model, self.observations, trial.as_slice()) {
                Ok(trial_residuals) => {
                    let trial_ssr = sum_of_squares(&trial_residuals);
                    if trial_ssr < ssr {
                        return StepOutcome::Accepted {
                            parameters: trial,
                            residuals: trial_residuals,
                            ssr: trial_ssr,
                            step_norm,
                        };
                    }
                    trace!("rejected step: ssr {trial_ssr:.6e} >= {ssr:.6e} at lambda={:.1e}", *damping);
                    if small_step {
                        return StepOutcome::Stationary;
                    }
                }
                Err(failure) => {
                    trace!("rejected step: {failure}");
                }
            }

            if !self.escalate(damping, &mut retries) {
                return StepOutcome::NoImprovement;
            }
        }
    }

    /// Raise damping for another attempt; `false` once the retry budget is spent.
    fn escalate(&self, damping: &mut f64, retries: &mut usize) -> bool {
        *retries += 1;
        if *retries > self.config.max_step_retries {
            return false;
        }
        *damping = (*damping * self.config.damping_factor).min(self.config.max_damping);
        true
    }

    fn is_small_step(&self, step_norm: f64, parameter_norm: f64) -> bool {
        let tol = self.config.step_tolerance;
        step_norm <= tol * (parameter_norm + tol)
    }

    fn finish(
        &self,
        p: DVector<f64>,
        ssr: Option<f64>,
        iterations: usize,
        termination: Termination,
        history: Vec<StepRecord>,
    ) -> FitResult {
        let status = termination.status();
        if status == FitStatus::Converged {
            debug!("fit finished after {iterations} iteration(s): {termination}");
        } else {
            info!("fit stopped after {iterations} iteration(s): {status} ({termination})");
        }

        let quality = match (&termination, ssr) {
            (Termination::Converged { .. }, Some(ssr)) => {
                estimate_quality(self.model, self.observations, p.as_slice(), ssr, self.config.difference)
            }
            _ => FitQuality::default(),
        };

        FitResult {
            parameters: p.iter().copied().collect(),
            covariance: quality.covariance,
            r_squared: quality.r_squared,
            residual_variance: quality.residual_variance,
            ssr,
            iterations,
            observations: self.observations.len(),
            status,
            termination,
            history,
        }
    }
}
