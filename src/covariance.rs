//! # Covariance builders
//!
//! Per-aliquot covariance matrices are assembled on demand from stored standard errors
//! and correlation coefficients, then pushed through the ratio transforms each decay
//! scheme needs (inversion, change of common denominator).
//!
//! ## Overview
//!
//! - [`cor2cov`] – standard errors + upper-triangle correlations → covariance matrix.
//! - [`errorprop`] – first-order propagation `J Σ Jᵀ`.
//! - [`log_ratio_transform`] – propagation through a transform that is linear in
//!   log-ratio space (every ratio-of-ratios transform is of this kind).
//! - [`ratio_covariance`] – covariance of two ratios sharing a nuclide, from the
//!   uncertainty of the third ratio closing the triangle.
//!
//! All builders mirror the upper triangle into the lower one, so the returned matrices
//! are exactly symmetric, and never alter the input variances on the diagonal.
use nalgebra::{DMatrix, DVector};

use crate::geochron_errors::GeochronError;

/// Covariance matrix from standard errors and correlations.
///
/// Arguments
/// -----------------
/// * `se`: standard errors `s_1 … s_p`.
/// * `rho`: correlation coefficients of the strict upper triangle in row-major order,
///   e.g. `[r12, r13, r23]` for `p = 3`.
pub fn cor2cov(se: &[f64], rho: &[f64]) -> Result<DMatrix<f64>, GeochronError> {
    let p = se.len();
    let expected = p * p.saturating_sub(1) / 2;
    if rho.len() != expected {
        return Err(GeochronError::LengthMismatch {
            expected,
            found: rho.len(),
        });
    }
    let mut cov = DMatrix::<f64>::zeros(p, p);
    let mut k = 0;
    for i in 0..p {
        cov[(i, i)] = se[i] * se[i];
        for j in (i + 1)..p {
            cov[(i, j)] = rho[k] * se[i] * se[j];
            k += 1;
        }
    }
    mirror_upper(&mut cov);
    Ok(cov)
}

/// Copy the upper triangle of a square matrix into its lower triangle.
pub fn mirror_upper(m: &mut DMatrix<f64>) {
    for i in 0..m.nrows() {
        for j in (i + 1)..m.ncols() {
            m[(j, i)] = m[(i, j)];
        }
    }
}

/// First-order error propagation `J Σ Jᵀ`, returned exactly symmetric.
pub fn errorprop(jacobian: &DMatrix<f64>, cov: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = jacobian * cov * jacobian.transpose();
    mirror_upper(&mut out);
    out
}

/// Variance of a scalar function with gradient `grad`.
pub fn errorprop1(grad: &DVector<f64>, cov: &DMatrix<f64>) -> f64 {
    (grad.transpose() * cov * grad)[(0, 0)]
}

/// Propagate a covariance matrix through a ratio transform that is linear in log space.
///
/// If `ln(out) = L · ln(inp)` the absolute Jacobian is
/// `J[i][j] = out[i] · L[i][j] / inp[j]`.
pub fn log_ratio_transform(
    inp: &DVector<f64>,
    cov: &DMatrix<f64>,
    log_jacobian: &DMatrix<f64>,
    out: &DVector<f64>,
) -> DMatrix<f64> {
    let mut jac = log_jacobian.clone();
    for i in 0..jac.nrows() {
        for j in 0..jac.ncols() {
            jac[(i, j)] *= out[i] / inp[j];
        }
    }
    errorprop(&jac, cov)
}

/// Nuclide-sharing pattern of two ratios.
///
/// `X`, `Y` are the unshared nuclides and `Z` the shared one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// `X/Z` and `Y/Z` (common denominator)
    XzYz,
    /// `Z/X` and `Z/Y` (common numerator)
    ZxZy,
    /// `X/Z` and `Z/Y`
    XzZy,
    /// `Z/X` and `Y/Z`
    ZxYz,
}

/// Covariance of two ratios sharing a nuclide.
///
/// Arguments
/// -----------------
/// * `pattern`: how the ratios share the nuclide `Z`.
/// * `a`, `b`: the two ratios as `(value, stderr)`, in the order of `pattern`.
/// * `c`: the closing ratio `X/Y` (or `Y/X`, the relative error is the same) as
///   `(value, stderr)`.
///
/// Return
/// ----------
/// * `cov(a, b)` from the log-space identities
///   `var(ln c) = var(ln a) + var(ln b) ∓ 2 cov(ln a, ln b)`.
pub fn ratio_covariance(pattern: Overlap, a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    let ra2 = (a.1 / a.0).powi(2);
    let rb2 = (b.1 / b.0).powi(2);
    let rc2 = (c.1 / c.0).powi(2);
    let rel = match pattern {
        Overlap::XzYz | Overlap::ZxZy => (ra2 + rb2 - rc2) / 2.0,
        Overlap::XzZy | Overlap::ZxYz => (rc2 - ra2 - rb2) / 2.0,
    };
    a.0 * b.0 * rel
}

/// Correlation coefficient from a 2×2 block of a covariance matrix.
pub fn correlation(cov: &DMatrix<f64>, i: usize, j: usize) -> f64 {
    let denom = (cov[(i, i)] * cov[(j, j)]).sqrt();
    if denom > 0.0 {
        cov[(i, j)] / denom
    } else {
        0.0
    }
}

#[cfg(test)]
mod covariance_test {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_symmetric(m: &DMatrix<f64>) {
        for i in 0..m.nrows() {
            for j in 0..m.ncols() {
                assert_eq!(m[(i, j)], m[(j, i)]);
            }
        }
    }

    #[test]
    fn test_cor2cov_diagonal_and_symmetry() {
        let cov = cor2cov(&[0.1, 0.2, 0.3], &[0.5, -0.2, 0.9]).unwrap();
        assert_symmetric(&cov);
        assert_eq!(cov[(0, 0)], 0.1 * 0.1);
        assert_eq!(cov[(1, 1)], 0.2 * 0.2);
        assert_eq!(cov[(2, 2)], 0.3 * 0.3);
        assert_relative_eq!(cov[(1, 2)], 0.9 * 0.2 * 0.3, epsilon = 1e-15);
    }

    #[test]
    fn test_cor2cov_rejects_wrong_length() {
        assert_eq!(
            cor2cov(&[0.1, 0.2], &[0.1, 0.2]),
            Err(GeochronError::LengthMismatch {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn test_log_ratio_transform_of_inverse() {
        // y = 1/x: var(y) = var(x) / x^4
        let inp = DVector::from_vec(vec![2.0]);
        let out = DVector::from_vec(vec![0.5]);
        let cov = DMatrix::from_element(1, 1, 0.01);
        let l = DMatrix::from_element(1, 1, -1.0);
        let res = log_ratio_transform(&inp, &cov, &l, &out);
        assert_relative_eq!(res[(0, 0)], 0.01 / 16.0, epsilon = 1e-15);
    }

    #[test]
    fn test_ratio_covariance_identities() {
        // independent X, Y, Z with 1% relative errors: cov(ln X/Z, ln Y/Z) = var(ln Z)
        let r = 0.01f64;
        let xz = (2.0, 2.0 * r * 2f64.sqrt());
        let yz = (3.0, 3.0 * r * 2f64.sqrt());
        let xy = (2.0 / 3.0, 2.0 / 3.0 * r * 2f64.sqrt());
        let c = ratio_covariance(Overlap::XzYz, xz, yz, xy);
        assert_relative_eq!(c, 2.0 * 3.0 * r * r, epsilon = 1e-15);

        // X/Z and Z/Y share Z in opposite positions: negative covariance
        let zy = (1.0 / 3.0, 1.0 / 3.0 * r * 2f64.sqrt());
        let c = ratio_covariance(Overlap::XzZy, xz, zy, xy);
        assert_relative_eq!(c, -2.0 / 3.0 * r * r, epsilon = 1e-15);
    }
}
