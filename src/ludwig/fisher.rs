//! Covariance of the discordia parameters.
//!
//! The analytical route assembles the Fisher information of the mixing model over the
//! structural parameters `θ = (t, a0[, b0])` and one mixing fraction per aliquot, and
//! eliminates the fractions with a Schur complement ([`FisherBlocks`]). When external
//! errors are requested the decay constants join `θ` as scale factors `u = λ / λ̂`
//! with Gaussian priors of precision `(λ̂ / σ_λ)²`, and only the `θ` block of the
//! inverse is kept.
//!
//! The numerical route differentiates half the concentrated misfit twice, in
//! log-parameter space, and maps the inverse back with `D = diag(θ)`.
use nalgebra::DMatrix;

use super::model::Problem;
use crate::numerics::{hessian, invert_spd, FisherBlocks, HESSIAN_STEP};

/// Decay constant promoted to a nuisance parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lambda {
    U238,
    U235,
}

/// Decay constants with a non-zero uncertainty, if external errors are requested.
fn external(problem: &Problem, exterr: bool) -> Vec<Lambda> {
    if !exterr {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(2);
    if problem.dc.s8 > 0.0 {
        out.push(Lambda::U238);
    }
    if problem.dc.s5 > 0.0 {
        out.push(Lambda::U235);
    }
    out
}

/// Prior precision of the scale factor of `l`.
fn prior(problem: &Problem, l: Lambda) -> f64 {
    match l {
        Lambda::U238 => (problem.dc.l8 / problem.dc.s8).powi(2),
        Lambda::U235 => (problem.dc.l5 / problem.dc.s5).powi(2),
    }
}

/// Decay constant scales `(k8, k5)` from the trailing entries of `x`.
fn scales(ext: &[Lambda], x: &[f64]) -> (f64, f64) {
    let mut k = (1.0, 1.0);
    for (l, v) in ext.iter().zip(x) {
        match l {
            Lambda::U238 => k.0 = *v,
            Lambda::U235 => k.1 = *v,
        }
    }
    k
}

/// Schur-complement covariance of `par` for the weighted models.
pub(crate) fn fisher_covariance(
    problem: &Problem,
    par: &[f64],
    omegas: &[DMatrix<f64>],
    exterr: bool,
) -> Option<DMatrix<f64>> {
    let p = par.len();
    let ext = external(problem, exterr);
    let q = p + ext.len();
    let rad = problem.dc.radiogenic(par[0], 1.0, 1.0);
    let (e_rad, e_com) = problem.endmembers(par, 1.0, 1.0);
    let g = &e_com - &e_rad;

    let mut blocks = FisherBlocks::new(q);
    for (obs, omega) in problem.obs.iter().zip(omegas) {
        let og = omega * &g;
        let f = og.dot(&(obs - &e_rad)) / g.dot(&og);
        let r = 1.0 - f;

        let mut j = DMatrix::<f64>::zeros(problem.dims, q);
        j[(0, 0)] = r * rad.dx_dt;
        j[(1, 0)] = r * rad.dy_dt;
        if problem.dims == 2 {
            j[(1, 1)] = f;
        } else {
            let (a0, b0) = (par[1], par[2]);
            j[(1, 1)] = -f * b0 / (a0 * a0);
            j[(2, 1)] = -f / (a0 * a0);
            j[(1, 2)] = f / a0;
        }
        for (c, l) in ext.iter().enumerate() {
            match l {
                Lambda::U238 => {
                    j[(0, p + c)] = r * rad.dx_dl8 * problem.dc.l8;
                    j[(1, p + c)] = r * rad.dy_dl8 * problem.dc.l8;
                }
                Lambda::U235 => {
                    j[(1, p + c)] = r * rad.dy_dl5 * problem.dc.l5;
                }
            }
        }
        blocks.push(&g, &j, omega);
    }
    for (c, l) in ext.iter().enumerate() {
        blocks.a[(p + c, p + c)] += prior(problem, *l);
    }
    let cov = blocks.covariance()?;
    Some(cov.view((0, 0), (p, p)).into_owned())
}

/// Covariance of `par` from the numerical Hessian of `½ misfit / sigma2`.
///
/// `misfit(θ, k8, k5)` is evaluated at natural parameters; `sigma2` is one for the
/// weighted models and the residual variance for the unweighted one.
pub(crate) fn hessian_covariance<F>(
    problem: &Problem,
    par: &[f64],
    misfit: F,
    sigma2: f64,
    exterr: bool,
) -> Option<DMatrix<f64>>
where
    F: Fn(&[f64], f64, f64) -> f64,
{
    let p = par.len();
    let ext = external(problem, exterr);
    let x0: Vec<f64> = par
        .iter()
        .map(|v| v.ln())
        .chain(ext.iter().map(|_| 1.0))
        .collect();
    let half = |x: &[f64]| {
        let theta: Vec<f64> = x[..p].iter().map(|v| v.exp()).collect();
        let (k8, k5) = scales(&ext, &x[p..]);
        0.5 * misfit(&theta, k8, k5) / sigma2
    };
    let mut info = hessian(&half, &x0, HESSIAN_STEP);
    for (c, l) in ext.iter().enumerate() {
        info[(p + c, p + c)] += prior(problem, *l);
    }
    let inv = invert_spd(&info)?;
    Some(DMatrix::from_fn(p, p, |i, j| par[i] * par[j] * inv[(i, j)]))
}

#[cfg(test)]
mod fisher_test {
    use super::*;
    use crate::ludwig::model::DecayConstants;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    fn problem() -> Problem {
        let dc = DecayConstants {
            l8: 1.55125e-4,
            s8: 8.3e-8,
            l5: 9.8485e-4,
            s5: 6.7e-7,
            u85: 137.818,
        };
        let rad = dc.radiogenic(1000.0, 1.0, 1.0);
        let (obs, cov): (Vec<_>, Vec<_>) = [0.05, 0.2, 0.35, 0.5, 0.65]
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let jitter = if i % 2 == 0 { 1.0 + 2e-3 } else { 1.0 - 2e-3 };
                let x = (1.0 - f) * rad.x;
                let y = (rad.y + f * (0.9 - rad.y)) * jitter;
                (
                    DVector::from_vec(vec![x, y]),
                    DMatrix::from_row_slice(
                        2,
                        2,
                        &[(0.01 * x).powi(2), 0.0, 0.0, (0.005 * y).powi(2)],
                    ),
                )
            })
            .unzip();
        Problem {
            dims: 2,
            obs,
            cov,
            dc,
        }
    }

    #[test]
    fn test_analytical_and_numerical_covariance_agree() {
        let problem = problem();
        let omegas = problem.omegas(0.0).unwrap();
        let par = [1000.0, 0.9];
        let analytical = fisher_covariance(&problem, &par, &omegas, false).unwrap();
        let numerical = hessian_covariance(
            &problem,
            &par,
            |theta, k8, k5| problem.misfit(theta, &omegas, k8, k5),
            1.0,
            false,
        )
        .unwrap();
        // expected and observed information differ by the residual curvature
        assert_relative_eq!(
            analytical[(0, 0)].sqrt(),
            numerical[(0, 0)].sqrt(),
            max_relative = 0.1
        );
        assert_relative_eq!(
            analytical[(1, 1)].sqrt(),
            numerical[(1, 1)].sqrt(),
            max_relative = 0.1
        );
    }

    #[test]
    fn test_external_errors_inflate_the_age_variance() {
        let problem = problem();
        let omegas = problem.omegas(0.0).unwrap();
        let par = [1000.0, 0.9];
        let internal = fisher_covariance(&problem, &par, &omegas, false).unwrap();
        let total = fisher_covariance(&problem, &par, &omegas, true).unwrap();
        assert!(total[(0, 0)] > internal[(0, 0)]);
        assert_eq!(total.shape(), (2, 2));
    }
}
