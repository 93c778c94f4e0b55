//! # Numerical toolkit
//!
//! Small, dependency-backed building blocks shared by the estimation engines:
//!
//! - [`hessian`] – central-difference Hessian with relative step sizes.
//! - [`invert_spd`] – inversion of a (nominally) symmetric positive-definite matrix,
//!   Cholesky first and LU as a fallback.
//! - [`FisherBlocks`] / [`FisherBlocks::covariance`] – Schur-complement elimination of
//!   one latent nuisance variable per aliquot from a block Fisher information matrix.
//! - [`brent_root`] and [`solve_overdispersion`] – bracketed root searches
//!   (`roots` crate), the latter used to drive an MSWD to one.
//! - [`optimizer`] – multivariate (L-BFGS with Nelder–Mead fallback) and univariate
//!   (Brent) minimisation through `argmin`.
use log::debug;
use nalgebra::{DMatrix, DVector};
use roots::{find_root_brent, SimpleConvergency};

use crate::geochron_errors::GeochronError;

pub mod optimizer;

/// Default relative step of [`hessian`].
pub const HESSIAN_STEP: f64 = 1e-4;

/// Central-difference Hessian of `f` at `x`.
///
/// The step along coordinate `i` is `rel_step * max(|x_i|, 1)`. The result is symmetric
/// by construction.
pub fn hessian<F>(f: &F, x: &[f64], rel_step: f64) -> DMatrix<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let n = x.len();
    let steps: Vec<f64> = x.iter().map(|xi| rel_step * xi.abs().max(1.0)).collect();
    let f0 = f(x);
    let mut h = DMatrix::<f64>::zeros(n, n);
    let mut work = x.to_vec();

    let eval = |work: &mut Vec<f64>, moves: &[(usize, f64)]| -> f64 {
        for &(k, d) in moves {
            work[k] += d;
        }
        let v = f(work.as_slice());
        for &(k, d) in moves {
            work[k] -= d;
        }
        v
    };

    for i in 0..n {
        let hi = steps[i];
        let fp = eval(&mut work, &[(i, hi)]);
        let fm = eval(&mut work, &[(i, -hi)]);
        h[(i, i)] = (fp - 2.0 * f0 + fm) / (hi * hi);
        for j in 0..i {
            let hj = steps[j];
            let fpp = eval(&mut work, &[(i, hi), (j, hj)]);
            let fpm = eval(&mut work, &[(i, hi), (j, -hj)]);
            let fmp = eval(&mut work, &[(i, -hi), (j, hj)]);
            let fmm = eval(&mut work, &[(i, -hi), (j, -hj)]);
            let hij = (fpp - fpm - fmp + fmm) / (4.0 * hi * hj);
            h[(i, j)] = hij;
            h[(j, i)] = hij;
        }
    }
    h
}

/// Invert a symmetric positive-definite matrix.
///
/// Tries a Cholesky factorisation first, then a general LU inverse. Returns `None` if
/// the matrix is singular or the inverse contains non-finite entries.
pub fn invert_spd(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let inv = match m.clone().cholesky() {
        Some(chol) => chol.inverse(),
        None => m.clone().try_inverse()?,
    };
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}

/// Expected Fisher information of a model with `p` structural parameters and one
/// latent nuisance variable per aliquot.
///
/// The full information matrix has the block form
///
/// ```text
/// | D   Bᵀ |     D = diag(d_1 … d_n)      latent × latent
/// | B   A  |     B = [b_1 … b_n]          structural × latent
///                A                        structural × structural
/// ```
///
/// and the covariance of the structural parameters is the inverse of the Schur
/// complement `A − Σ b_i b_iᵀ / d_i`.
#[derive(Debug, Clone)]
pub struct FisherBlocks {
    pub a: DMatrix<f64>,
    pub b: Vec<DVector<f64>>,
    pub d: Vec<f64>,
}

impl FisherBlocks {
    pub fn new(p: usize) -> Self {
        FisherBlocks {
            a: DMatrix::zeros(p, p),
            b: Vec::new(),
            d: Vec::new(),
        }
    }

    /// Accumulate the contribution `Jᵀ Ω J` of one aliquot whose residual Jacobian is
    /// `[j_latent | j_par]` and whose inverse covariance is `omega`.
    pub fn push(&mut self, j_latent: &DVector<f64>, j_par: &DMatrix<f64>, omega: &DMatrix<f64>) {
        let oj = omega * j_latent;
        self.d.push(j_latent.dot(&oj));
        self.b.push(j_par.transpose() * &oj);
        self.a += j_par.transpose() * omega * j_par;
    }

    /// Covariance of the structural parameters, or `None` if any latent block or the
    /// Schur complement is singular.
    pub fn covariance(&self) -> Option<DMatrix<f64>> {
        let mut reduced = self.a.clone();
        for (b, &d) in self.b.iter().zip(&self.d) {
            if !(d.is_finite() && d > 0.0) {
                debug!("latent information block is not positive ({d})");
                return None;
            }
            reduced -= b * b.transpose() / d;
        }
        invert_spd(&reduced)
    }
}

/// Brent root search of `f` on `[lo, hi]`.
pub fn brent_root<F>(
    f: F,
    lo: f64,
    hi: f64,
    eps: f64,
    max_iter: usize,
) -> Result<f64, GeochronError>
where
    F: Fn(f64) -> f64,
{
    let mut conv = SimpleConvergency { eps, max_iter };
    Ok(find_root_brent(lo, hi, &f, &mut conv)?)
}

/// Find the overdispersion `w ≥ 0` for which `excess(w) = 0`.
///
/// `excess` is typically `MSWD(w) − 1` and must be decreasing in `w`. If the data are
/// not overdispersed (`excess(0) ≤ 0`) the result is exactly zero. The upper bracket
/// starts at `guess` and is doubled until the sign changes.
pub fn solve_overdispersion<F>(excess: F, guess: f64) -> Result<f64, GeochronError>
where
    F: Fn(f64) -> f64,
{
    let e0 = excess(0.0);
    if !(e0 > 0.0) {
        return Ok(0.0);
    }
    let mut hi = if guess > 0.0 && guess.is_finite() {
        guess
    } else {
        1.0
    };
    let mut doublings = 0;
    while excess(hi) > 0.0 {
        hi *= 2.0;
        doublings += 1;
        if doublings > 200 {
            return Err(GeochronError::NotConverged(
                "could not bracket the overdispersion".into(),
            ));
        }
    }
    brent_root(&excess, 0.0, hi, 1e-12 * hi.max(1e-300), 200)
}

#[cfg(test)]
mod numerics_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hessian_of_quadratic() {
        let f = |x: &[f64]| 3.0 * x[0] * x[0] + 2.0 * x[0] * x[1] + 0.5 * x[1] * x[1];
        let h = hessian(&f, &[1.0, -2.0], HESSIAN_STEP);
        assert_relative_eq!(h[(0, 0)], 6.0, epsilon = 1e-5);
        assert_relative_eq!(h[(0, 1)], 2.0, epsilon = 1e-5);
        assert_relative_eq!(h[(1, 0)], 2.0, epsilon = 1e-5);
        assert_relative_eq!(h[(1, 1)], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_invert_spd() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let inv = invert_spd(&m).unwrap();
        let id = &m * inv;
        assert_relative_eq!(id[(0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(id[(0, 1)], 0.0, epsilon = 1e-12);
        assert!(invert_spd(&DMatrix::zeros(2, 2)).is_none());
    }

    #[test]
    fn test_schur_matches_full_inverse() {
        // two aliquots, one structural parameter
        let omega = DMatrix::<f64>::identity(2, 2);
        let mut blocks = FisherBlocks::new(1);
        let j1 = DVector::from_vec(vec![1.0, 0.5]);
        let p1 = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let j2 = DVector::from_vec(vec![1.0, 2.0]);
        let p2 = DMatrix::from_row_slice(2, 1, &[0.0, 3.0]);
        blocks.push(&j1, &p1, &omega);
        blocks.push(&j2, &p2, &omega);

        // full 3x3 information matrix (latent1, latent2, structural)
        let mut full = DMatrix::<f64>::zeros(4, 3);
        full[(0, 0)] = 1.0;
        full[(1, 0)] = 0.5;
        full[(1, 2)] = 1.0;
        full[(2, 1)] = 1.0;
        full[(3, 1)] = 2.0;
        full[(3, 2)] = 3.0;
        let info = full.transpose() * &full;
        let inv = info.try_inverse().unwrap();

        let cov = blocks.covariance().unwrap();
        assert_relative_eq!(cov[(0, 0)], inv[(2, 2)], epsilon = 1e-12);
    }

    #[test]
    fn test_solve_overdispersion() {
        // excess(w) = 4 / (1 + w^2) - 1 vanishes at w = sqrt(3)
        let w = solve_overdispersion(|w| 4.0 / (1.0 + w * w) - 1.0, 0.5).unwrap();
        assert_relative_eq!(w, 3f64.sqrt(), epsilon = 1e-9);
        assert_eq!(solve_overdispersion(|w| 0.5 / (1.0 + w) - 1.0, 1.0).unwrap(), 0.0);
    }
}
