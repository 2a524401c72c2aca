//! Post-convergence statistics: parameter covariance and R².
//!
//! - `σ² = SSR / (n - k)`, reported as `+∞` when `n = k`
//! - `cov = σ² (JᵀJ)⁻¹` with `J` evaluated at the converged parameters
//! - `R² = 1 - SS_res / SS_tot`, undefined when the observations are constant

use nalgebra::DMatrix;

use crate::domain::{DifferenceScheme, Observation};
use crate::math::{invert_symmetric, jacobian};
use crate::models::Model;

/// Derived statistics for a converged fit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitQuality {
    /// Row-major covariance; `None` if the Jacobian could not be evaluated.
    pub covariance: Option<Vec<Vec<f64>>>,
    pub residual_variance: Option<f64>,
    pub r_squared: Option<f64>,
}

/// Compute covariance and fit quality at converged `parameters`.
pub fn estimate_quality<M: Model + ?Sized>(
    model: &M,
    observations: &[Observation],
    parameters: &[f64],
    ssr: f64,
    scheme: DifferenceScheme,
) -> FitQuality {
    let sigma2 = residual_variance(ssr, observations.len(), parameters.len());

    let covariance = match jacobian(model, observations, parameters, scheme) {
        Ok(jac) => Some(covariance(&jac, sigma2)),
        Err(failure) => {
            log::warn!("covariance unavailable: {failure}");
            None
        }
    };

    FitQuality {
        covariance: covariance.map(|m| to_rows(&m)),
        residual_variance: Some(sigma2),
        r_squared: r_squared(observations, ssr),
    }
}

/// Residual variance with degrees-of-freedom correction.
pub fn residual_variance(ssr: f64, n: usize, k: usize) -> f64 {
    if n <= k {
        return f64::INFINITY;
    }
    ssr / (n - k) as f64
}

/// `σ² (JᵀJ)⁻¹`.
///
/// Rows and columns of parameters the Jacobian does not constrain are `+∞`,
/// and so is every entry when `σ²` is unbounded or `JᵀJ` is not finite.
pub fn covariance(jac: &DMatrix<f64>, sigma2: f64) -> DMatrix<f64> {
    let k = jac.ncols();
    let jtj = jac.transpose() * jac;

    match invert_symmetric(&jtj) {
        // An exact fit has σ² = 0, which must not turn `+∞` into NaN.
        Some(inv) if sigma2.is_finite() => inv.map(|v| if v.is_infinite() { v } else { v * sigma2 }),
        _ => DMatrix::from_element(k, k, f64::INFINITY),
    }
}

/// Total sum of squares about the mean of `y`.
pub fn total_sum_of_squares(observations: &[Observation]) -> f64 {
    if observations.is_empty() {
        return 0.0;
    }
    let mean = observations.iter().map(|o| o.y).sum::<f64>() / observations.len() as f64;
    observations.iter().map(|o| (o.y - mean).powi(2)).sum()
}

/// Coefficient of determination, or `None` when the observations are constant.
pub fn r_squared(observations: &[Observation], ssr: f64) -> Option<f64> {
    let first = observations.first()?.y;
    if observations.iter().all(|o| o.y == first) {
        return None;
    }

    // Rounding in the mean can leave a tiny non-zero SS_tot for constant data.
    let scale = observations.iter().map(|o| o.y.abs()).fold(0.0, f64::max);
    let noise_floor = observations.len() as f64 * (f64::EPSILON * scale).powi(2);
    let ss_tot = total_sum_of_squares(observations);
    if ss_tot <= noise_floor {
        return None;
    }
    Some(1.0 - ssr / ss_tot)
}

fn to_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    (0..m.nrows()).map(|i| m.row(i).iter().copied().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::solver::fit;
    use crate::domain::{FitConfig, FitStatus};
    use crate::models::ModelKind;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn points(pairs: &[(f64, f64)]) -> Vec<Observation> {
        pairs.iter().map(|&p| p.into()).collect()
    }

    #[test]
    fn residual_variance_uses_degrees_of_freedom() {
        assert_relative_eq!(residual_variance(6.0, 5, 2), 2.0);
        assert_eq!(residual_variance(1.0, 3, 3), f64::INFINITY);
    }

    #[test]
    fn r_squared_matches_definition() {
        let obs = points(&[(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)]);
        // SS_tot = 2
        assert_relative_eq!(total_sum_of_squares(&obs), 2.0);
        assert_relative_eq!(r_squared(&obs, 0.5).unwrap(), 0.75);
        assert_relative_eq!(r_squared(&obs, 0.0).unwrap(), 1.0);
    }

    #[test]
    fn constant_observations_have_undefined_r_squared() {
        let obs = points(&[(0.0, 0.1), (1.0, 0.1), (2.0, 0.1)]);
        assert_eq!(r_squared(&obs, 0.0), None);
        assert_eq!(r_squared(&[], 0.0), None);
    }

    #[test]
    fn linear_covariance_matches_closed_form() {
        // For y = a + b x the covariance is σ² (XᵀX)⁻¹.
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let cov = covariance(&x, 2.0);
        // XᵀX = [[4, 6], [6, 14]], det = 20.
        assert_relative_eq!(cov[(0, 0)], 2.0 * 14.0 / 20.0, epsilon = 1e-12);
        assert_relative_eq!(cov[(0, 1)], 2.0 * -6.0 / 20.0, epsilon = 1e-12);
        assert_relative_eq!(cov[(1, 1)], 2.0 * 4.0 / 20.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_jacobian_column_gives_unbounded_variance() {
        // The second parameter has no effect on any prediction.
        let jac = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        let cov = covariance(&jac, 0.6);

        assert_relative_eq!(cov[(0, 0)], 0.2, epsilon = 1e-12);
        assert_eq!(cov[(0, 1)], f64::INFINITY);
        assert_eq!(cov[(1, 0)], f64::INFINITY);
        assert_eq!(cov[(1, 1)], f64::INFINITY);

        // Zero residual variance keeps the unbounded entries infinite.
        let exact = covariance(&jac, 0.0);
        assert_eq!(exact[(0, 0)], 0.0);
        assert_eq!(exact[(1, 1)], f64::INFINITY);
    }

    #[test]
    fn saturated_exponential_rate_has_unbounded_standard_error() {
        // From (10, 10, 10) the rate runs off to a large negative value where
        // e^(c·x) underflows for every x > 0, so c no longer affects the fit.
        let exp_offset = |x: f64, p: &[f64]| p[0] + p[1] * (p[2] * x).exp();
        let obs = crate::data::lab_observations();
        let result = fit(&exp_offset, &[10.0, 10.0, 10.0], &obs, &FitConfig::default());

        assert_eq!(result.status, FitStatus::Converged);
        assert!(result.parameters[2] < -100.0, "{:?}", result.parameters);
        let se = result.standard_errors().unwrap();
        assert!(se[0].is_finite() && se[0] > 0.0);
        assert!(se[1].is_finite() && se[1] > 0.0);
        assert_eq!(se[2], f64::INFINITY);
    }

    #[test]
    fn exactly_determined_fit_reports_infinite_covariance() {
        let obs = points(&[(0.0, 1.0), (1.0, 3.0)]);
        let result = fit(&ModelKind::Linear, &[0.0, 0.0], &obs, &FitConfig::default());

        assert_eq!(result.status, FitStatus::Converged);
        assert_abs_diff_eq!(result.parameters[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.parameters[1], 2.0, epsilon = 1e-6);
        assert_eq!(result.residual_variance, Some(f64::INFINITY));
        let cov = result.covariance.unwrap();
        assert!(cov.iter().flatten().all(|v| *v == f64::INFINITY));
    }

    #[test]
    fn constant_data_fit_converges_with_undefined_r_squared() {
        let obs = points(&[(0.0, 2.0), (1.0, 2.0), (2.0, 2.0), (3.0, 2.0)]);
        let result = fit(&ModelKind::Linear, &[0.0, 1.0], &obs, &FitConfig::default());

        assert_eq!(result.status, FitStatus::Converged);
        assert_eq!(result.r_squared, None);
        assert_abs_diff_eq!(result.parameters[0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(result.parameters[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn noisy_fit_has_r_squared_below_one() {
        let obs = points(&[(0.0, 0.1), (1.0, 0.9), (2.0, 2.2), (3.0, 2.8), (4.0, 4.1)]);
        let result = fit(&ModelKind::Linear, &[0.0, 0.0], &obs, &FitConfig::default());

        assert_eq!(result.status, FitStatus::Converged);
        let r2 = result.r_squared.unwrap();
        assert!(r2 < 1.0 && r2 > 0.95, "r2={r2}");
        assert!(result.residual_variance.unwrap() > 0.0);
    }
}
