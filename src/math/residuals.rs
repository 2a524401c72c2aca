//! Residual evaluation: `r_i = y_i - model(x_i, p)`.

use nalgebra::DVector;

use crate::domain::Observation;
use crate::error::EvaluationFailure;
use crate::models::Model;

/// Evaluate the residual vector at `parameters`.
///
/// Returns the first observation whose prediction (or residual) is not finite.
pub fn residuals<M: Model + ?Sized>(
    model: &M,
    observations: &[Observation],
    parameters: &[f64],
) -> Result<DVector<f64>, EvaluationFailure> {
    let mut out = DVector::<f64>::zeros(observations.len());
    for (i, obs) in observations.iter().enumerate() {
        let r = obs.y - model.evaluate(obs.x, parameters);
        if !r.is_finite() {
            return Err(EvaluationFailure {
                observation: i,
                x: obs.x,
                parameter: None,
            });
        }
        out[i] = r;
    }
    Ok(out)
}

/// Sum of squared residuals.
pub fn sum_of_squares(residuals: &DVector<f64>) -> f64 {
    residuals.norm_squared()
}
