//! Dense linear algebra for the damped normal equations.
//!
//! Every solve in this crate is `k × k` with `k` the parameter count, so a
//! Cholesky factorization per trial step is cheap. An eigen-decomposition is
//! only used as a fallback when inverting a rank-deficient `JᵀJ` for the
//! covariance.

use nalgebra::{DMatrix, DVector};

/// Floor applied to `diag(JᵀJ)` before damping.
///
/// A parameter the model is locally insensitive to has a zero diagonal entry;
/// the floor keeps `λ` able to regularize that direction.
pub const DIAG_FLOOR: f64 = 1e-12;

/// Solve `(JᵀJ + λ·diag(JᵀJ)) δ = g`.
///
/// Returns `None` when the damped matrix is not positive definite or the
/// solution is not finite.
pub fn solve_damped(jtj: &DMatrix<f64>, gradient: &DVector<f64>, damping: f64) -> Option<DVector<f64>> {
    let mut a = jtj.clone();
    for j in 0..a.nrows() {
        a[(j, j)] += damping * jtj[(j, j)].max(DIAG_FLOOR);
    }

    let chol = a.cholesky()?;
    let delta = chol.solve(gradient);
    if delta.iter().all(|v| v.is_finite()) {
        Some(delta)
    } else {
        None
    }
}

/// Eigenvalues at or below this fraction of the largest count as zero.
const RANK_TOLERANCE: f64 = 1e-12;

/// Null-space eigenvector components above this mark a parameter as unidentified.
const NULL_COMPONENT: f64 = 1e-6;

/// Invert a symmetric positive semi-definite matrix.
///
/// Tries Cholesky first. For rank-deficient input the well-determined
/// eigen-directions are inverted as a pseudo-inverse, and every row and column
/// of a parameter touched by the null space is set to `+∞`: the data do not
/// bound that parameter. Returns `None` for non-finite input.
pub fn invert_symmetric(a: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if !a.iter().all(|v| v.is_finite()) {
        return None;
    }
    if let Some(chol) = a.clone().cholesky() {
        let inv = chol.inverse();
        if inv.iter().all(|v| v.is_finite()) {
            return Some(inv);
        }
    }

    let k = a.nrows();
    let eigen = a.clone().symmetric_eigen();
    let largest = eigen.eigenvalues.iter().copied().fold(0.0, f64::max);

    let mut inv = DMatrix::<f64>::zeros(k, k);
    let mut unidentified = vec![false; k];
    for (i, &value) in eigen.eigenvalues.iter().enumerate() {
        let v = eigen.eigenvectors.column(i);
        if largest > 0.0 && value > RANK_TOLERANCE * largest {
            inv += (v * v.transpose()) / value;
        } else {
            for (j, c) in v.iter().enumerate() {
                if c.abs() > NULL_COMPONENT {
                    unidentified[j] = true;
                }
            }
        }
    }

    for (j, _) in unidentified.iter().enumerate().filter(|(_, u)| **u) {
        inv.row_mut(j).fill(f64::INFINITY);
        inv.column_mut(j).fill(f64::INFINITY);
    }
    Some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn undamped_solve_matches_least_squares() {
        // Fit y = 2 + 3x on x = [0,1,2] via the normal equations.
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);
        let jtj = x.transpose() * &x;
        let g = x.transpose() * &y;

        let beta = solve_damped(&jtj, &g, 0.0).unwrap();
        assert_relative_eq!(beta[0], 2.0, epsilon = 1e-10);
        assert_relative_eq!(beta[1], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn damping_shrinks_the_step() {
        let jtj = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 8.0]);
        let g = DVector::from_row_slice(&[2.0, 8.0]);
        let full = solve_damped(&jtj, &g, 0.0).unwrap();
        let damped = solve_damped(&jtj, &g, 1.0).unwrap();
        assert_relative_eq!(full[0], 1.0);
        assert_relative_eq!(damped[0], 0.5);
        assert!(damped.norm() < full.norm());
    }

    #[test]
    fn zero_column_is_regularized_by_the_floor() {
        let jtj = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.0]);
        let g = DVector::from_row_slice(&[1.0, 0.0]);
        assert!(solve_damped(&jtj, &g, 0.0).is_none());

        let delta = solve_damped(&jtj, &g, 1e-3).unwrap();
        assert_relative_eq!(delta[1], 0.0);
    }

    #[test]
    fn inverse_of_spd_matrix() {
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let inv = invert_symmetric(&a).unwrap();
        let id = &a * &inv;
        assert_relative_eq!(id, DMatrix::identity(2, 2), epsilon = 1e-12);
    }

    #[test]
    fn collinear_parameters_are_both_unbounded() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let inv = invert_symmetric(&a).unwrap();
        assert!(inv.iter().all(|v| *v == f64::INFINITY));
    }

    #[test]
    fn dead_parameter_is_unbounded_but_the_rest_is_inverted() {
        let a = DMatrix::from_row_slice(3, 3, &[4.0, 2.0, 0.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0]);
        let inv = invert_symmetric(&a).unwrap();

        // [[4, 2], [2, 3]]⁻¹ = [[3, -2], [-2, 4]] / 8
        assert_relative_eq!(inv[(0, 0)], 3.0 / 8.0, epsilon = 1e-12);
        assert_relative_eq!(inv[(0, 1)], -2.0 / 8.0, epsilon = 1e-12);
        assert_relative_eq!(inv[(1, 1)], 4.0 / 8.0, epsilon = 1e-12);
        for j in 0..3 {
            assert_eq!(inv[(2, j)], f64::INFINITY);
            assert_eq!(inv[(j, 2)], f64::INFINITY);
        }
    }

    #[test]
    fn non_finite_input_has_no_inverse() {
        let a = DMatrix::from_row_slice(2, 2, &[f64::NAN, 0.0, 0.0, 1.0]);
        assert!(invert_symmetric(&a).is_none());
    }
}
