//! Titterington & Halliday (1979) regression of trivariate data with correlated errors.
//!
//! Fits the line `y = a + b x`, `z = A + B x` through points `(X, Y, Z)` whose errors
//! have full 3×3 covariance matrices. Each point has a latent true abscissa `x̂_i`;
//! the fit alternates between
//!
//! 1. a generalised least-squares solve for `θ = (a, b, A, B)` at fixed `x̂`, and
//! 2. the closed-form update of every `x̂_i` at fixed `θ`,
//!
//! both of which decrease `S = Σ r_iᵀ Ω_i r_i`. The covariance of `θ` is the inverse of
//! the Fisher information with the latent abscissae profiled out (Schur complement).
use log::{debug, warn};
use nalgebra::{Matrix3, Matrix3x4, Matrix4, Vector3, Vector4};

use crate::covariance::cor2cov;
use crate::geochron_errors::GeochronError;
use crate::numerics::{hessian, invert_spd, FisherBlocks, HESSIAN_STEP};
use crate::params::FitParams;
use crate::stats::FitStats;

/// Trivariate data: coordinates and per-point covariance matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct TrivariateData {
    pub points: Vec<Vector3<f64>>,
    pub cov: Vec<Matrix3<f64>>,
}

impl TrivariateData {
    pub fn new(points: Vec<Vector3<f64>>, cov: Vec<Matrix3<f64>>) -> Result<Self, GeochronError> {
        if points.len() != cov.len() {
            return Err(GeochronError::LengthMismatch {
                expected: points.len(),
                found: cov.len(),
            });
        }
        if points.len() < 3 {
            return Err(GeochronError::EmptyDataset(3));
        }
        Ok(TrivariateData { points, cov })
    }

    /// Build from rows `[X, sX, Y, sY, Z, sZ, rXY, rXZ, rYZ]`.
    pub fn from_rows(rows: &[[f64; 9]]) -> Result<Self, GeochronError> {
        let mut points = Vec::with_capacity(rows.len());
        let mut cov = Vec::with_capacity(rows.len());
        for r in rows {
            points.push(Vector3::new(r[0], r[2], r[4]));
            let c = cor2cov(&[r[1], r[3], r[5]], &[r[6], r[7], r[8]])?;
            cov.push(c.fixed_view::<3, 3>(0, 0).into_owned());
        }
        Self::new(points, cov)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Result of a Titterington regression.
#[derive(Debug, Clone, PartialEq)]
pub struct TitteringtonFit {
    /// `(a, b, A, B)`
    pub par: Vector4<f64>,
    pub cov: Matrix4<f64>,
    pub stats: FitStats,
    pub iterations: usize,
}

impl TitteringtonFit {
    pub fn se(&self) -> Vector4<f64> {
        self.cov.diagonal().map(f64::sqrt)
    }
}

fn design(xhat: f64) -> Matrix3x4<f64> {
    Matrix3x4::new(
        0.0, 0.0, 0.0, 0.0, //
        1.0, xhat, 0.0, 0.0, //
        0.0, 0.0, 1.0, xhat,
    )
}

/// Misfit of point `p` for parameters `par` with the latent abscissa profiled out,
/// and the optimal abscissa.
fn profile(p: &Vector3<f64>, omega: &Matrix3<f64>, par: &Vector4<f64>) -> (f64, f64) {
    let e = Vector3::new(
        0.0,
        p[1] - par[0] - par[1] * p[0],
        p[2] - par[2] - par[3] * p[0],
    );
    let v = Vector3::new(1.0, par[1], par[3]);
    let ov = omega * v;
    let vov = v.dot(&ov);
    let voe = ov.dot(&e);
    let s = e.dot(&(omega * e)) - voe * voe / vov;
    let delta = -voe / vov;
    (s, p[0] - delta)
}

/// Fit a line through trivariate data.
///
/// Return
/// ----------
/// * A [`TitteringtonFit`] with `2n − 4` degrees of freedom.
pub fn titterington(
    data: &TrivariateData,
    params: &FitParams,
) -> Result<TitteringtonFit, GeochronError> {
    let n = data.len();
    let omegas = data
        .cov
        .iter()
        .map(|c| c.try_inverse().ok_or(GeochronError::SingularMatrix("point covariance")))
        .collect::<Result<Vec<_>, _>>()?;

    // ordinary least squares start
    let mx = data.points.iter().map(|p| p[0]).sum::<f64>() / n as f64;
    let my = data.points.iter().map(|p| p[1]).sum::<f64>() / n as f64;
    let mz = data.points.iter().map(|p| p[2]).sum::<f64>() / n as f64;
    let sxx: f64 = data.points.iter().map(|p| (p[0] - mx).powi(2)).sum();
    if !(sxx > 0.0) {
        return Err(GeochronError::InvalidParameter(
            "Titterington regression needs at least two distinct x values".into(),
        ));
    }
    let b = data.points.iter().map(|p| (p[0] - mx) * (p[1] - my)).sum::<f64>() / sxx;
    let bb = data.points.iter().map(|p| (p[0] - mx) * (p[2] - mz)).sum::<f64>() / sxx;
    let mut par = Vector4::new(my - b * mx, b, mz - bb * mx, bb);
    let mut xhat: Vec<f64> = data.points.iter().map(|p| p[0]).collect();

    let mut iterations = 0;
    let mut converged = false;
    while iterations < params.max_iter {
        iterations += 1;
        let mut lhs = Matrix4::<f64>::zeros();
        let mut rhs = Vector4::<f64>::zeros();
        for i in 0..n {
            let d = design(xhat[i]);
            let p = &data.points[i];
            let obs = Vector3::new(p[0] - xhat[i], p[1], p[2]);
            let dto = d.transpose() * omegas[i];
            lhs += dto * d;
            rhs += dto * obs;
        }
        let next = lhs
            .try_inverse()
            .ok_or(GeochronError::SingularMatrix("normal equations"))?
            * rhs;
        for i in 0..n {
            xhat[i] = profile(&data.points[i], &omegas[i], &next).1;
        }
        let change = (next - par).abs().max();
        par = next;
        if change <= params.tol * par.abs().max() {
            converged = true;
            break;
        }
    }
    if converged {
        debug!("Titterington regression converged in {iterations} iterations");
    } else {
        warn!("Titterington regression reached {iterations} iterations without converging");
    }

    let mut chi2 = 0.0;
    let mut blocks = FisherBlocks::new(4);
    for i in 0..n {
        let (s, xh) = profile(&data.points[i], &omegas[i], &par);
        chi2 += s;
        let v = nalgebra::DVector::from_vec(vec![1.0, par[1], par[3]]);
        let d = design(xh);
        let dj = nalgebra::DMatrix::from_fn(3, 4, |r, c| d[(r, c)]);
        let om = nalgebra::DMatrix::from_fn(3, 3, |r, c| omegas[i][(r, c)]);
        blocks.push(&v, &dj, &om);
    }
    let cov = match blocks.covariance() {
        Some(cov) => cov,
        None => {
            warn!("singular Fisher information; falling back to the numerical Hessian");
            let half_misfit = |q: &[f64]| {
                let q = Vector4::new(q[0], q[1], q[2], q[3]);
                0.5 * (0..n)
                    .map(|i| profile(&data.points[i], &omegas[i], &q).0)
                    .sum::<f64>()
            };
            invert_spd(&hessian(&half_misfit, par.as_slice(), HESSIAN_STEP))
                .ok_or(GeochronError::SingularMatrix("Titterington information matrix"))?
        }
    };

    Ok(TitteringtonFit {
        par,
        cov: cov.fixed_view::<4, 4>(0, 0).into_owned(),
        stats: FitStats::new(chi2, 2 * n - 4),
        iterations,
    })
}

#[cfg(test)]
mod titterington_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_line() {
        let rows: Vec<[f64; 9]> = [1.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .map(|&x| [x, 0.01, 1.0 + 0.5 * x, 0.02, 2.0 - 0.3 * x, 0.02, 0.5, 0.3, 0.2])
            .collect();
        let data = TrivariateData::from_rows(&rows).unwrap();
        let fit = titterington(&data, &FitParams::default()).unwrap();
        assert_relative_eq!(fit.par[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(fit.par[1], 0.5, epsilon = 1e-9);
        assert_relative_eq!(fit.par[2], 2.0, epsilon = 1e-9);
        assert_relative_eq!(fit.par[3], -0.3, epsilon = 1e-9);
        assert_eq!(fit.stats.df, 6);
        assert!(fit.se().iter().all(|s| s.is_finite() && *s > 0.0));
    }
}
