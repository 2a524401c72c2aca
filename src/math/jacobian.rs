//! Finite-difference Jacobian of the model with respect to its parameters.
//!
//! Entry `(i, j)` approximates `∂model(x_i, p) / ∂p_j`. The step for parameter
//! `j` is `ε_j = max(1e-8, 1e-8 * |p_j|)`: relative for large parameters and
//! floored so `p_j = 0` still gets a usable step.

use nalgebra::DMatrix;

use crate::domain::{DifferenceScheme, Observation};
use crate::error::EvaluationFailure;
use crate::models::Model;

/// Relative (and absolute floor) step size.
const STEP_SCALE: f64 = 1e-8;

/// Finite-difference step for a parameter value.
pub fn difference_step(value: f64) -> f64 {
    (STEP_SCALE * value.abs()).max(STEP_SCALE)
}

/// Estimate the `n × k` Jacobian at `parameters`.
pub fn jacobian<M: Model + ?Sized>(
    model: &M,
    observations: &[Observation],
    parameters: &[f64],
    scheme: DifferenceScheme,
) -> Result<DMatrix<f64>, EvaluationFailure> {
    let n = observations.len();
    let k = parameters.len();
    let mut jac = DMatrix::<f64>::zeros(n, k);

    // Unperturbed predictions are shared by every forward-difference column.
    let base: Vec<f64> = match scheme {
        DifferenceScheme::Forward => observations
            .iter()
            .enumerate()
            .map(|(i, obs)| {
                let v = model.evaluate(obs.x, parameters);
                if v.is_finite() {
                    Ok(v)
                } else {
                    Err(EvaluationFailure {
                        observation: i,
                        x: obs.x,
                        parameter: None,
                    })
                }
            })
            .collect::<Result<_, _>>()?,
        DifferenceScheme::Central => Vec::new(),
    };

    let mut plus = parameters.to_vec();
    let mut minus = parameters.to_vec();

    for j in 0..k {
        let h = difference_step(parameters[j]);
        plus[j] = parameters[j] + h;
        minus[j] = parameters[j] - h;

        for (i, obs) in observations.iter().enumerate() {
            let d = match scheme {
                DifferenceScheme::Forward => (model.evaluate(obs.x, &plus) - base[i]) / h,
                DifferenceScheme::Central => {
                    (model.evaluate(obs.x, &plus) - model.evaluate(obs.x, &minus)) / (2.0 * h)
                }
            };
            if !d.is_finite() {
                return Err(EvaluationFailure {
                    observation: i,
                    x: obs.x,
                    parameter: Some(j),
                });
            }
            jac[(i, j)] = d;
        }

        plus[j] = parameters[j];
        minus[j] = parameters[j];
    }

    Ok(jac)
}
