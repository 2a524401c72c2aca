//! Reporting utilities: fitted values and formatted terminal output.
//!
//! Formatting lives here so the solver stays free of presentation; callers
//! (the CLI, exports, an external plotter) consume `FitResult` plus the
//! per-observation fitted values computed below.

use serde::Serialize;

use crate::domain::Observation;
use crate::error::AppError;
use crate::models::Model;

pub mod format;

pub use format::*;

/// Observed and fitted value at one observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FittedPoint {
    pub x: f64,
    pub y_obs: f64,
    pub y_fit: f64,
    pub residual: f64,
}

/// Evaluate the fitted model at every observation x-value.
pub fn fitted_points<M: Model + ?Sized>(
    model: &M,
    observations: &[Observation],
    parameters: &[f64],
) -> Result<Vec<FittedPoint>, AppError> {
    let mut out = Vec::with_capacity(observations.len());
    for o in observations {
        let y_fit = model.evaluate(o.x, parameters);
        if !y_fit.is_finite() {
            return Err(AppError::new(
                4,
                format!("Non-finite model prediction at x={} while computing fitted values.", o.x),
            ));
        }
        out.push(FittedPoint {
            x: o.x,
            y_obs: o.y,
            y_fit,
            residual: o.y - y_fit,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelKind;
    use approx::assert_relative_eq;

    #[test]
    fn fitted_points_basic() {
        let obs = vec![Observation::new(1.0, 100.0), Observation::new(2.0, 101.0)];
        let points = fitted_points(&ModelKind::Linear, &obs, &[100.0, 0.0]).unwrap();

        assert_eq!(points.len(), 2);
        assert_relative_eq!(points[0].residual, 0.0);
        assert_relative_eq!(points[1].residual, 1.0);
        assert_relative_eq!(points[1].y_fit, 100.0);
    }

    #[test]
    fn fitted_points_reject_non_finite_predictions() {
        let obs = vec![Observation::new(0.0, 1.0)];
        let err = fitted_points(&ModelKind::Power, &obs, &[1.0, -2.0]).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
