//! Three-parameter minimum age model (Galbraith & Laslett 1993).
//!
//! A fraction `π` of the grains belongs to a discrete youngest population at `γ`;
//! the rest follows a normal distribution truncated below at `γ`, with dispersion
//! `σ`. On the log scale, with `ω = √(σ² + s²)` and `α = σ / s`, observation `z`
//! has density
//!
//! ```text
//! π φ((z − γ) / s) / s  +  (1 − π) (2 / ω) φ((z − γ) / ω) Φ(α (z − γ) / ω)
//! ```
//!
//! The likelihood is maximised over a `(γ, σ, π)` grid that is repeatedly narrowed
//! around the best node; the covariance comes from the numerical Hessian there.
use itertools::{iproduct, Itertools, MinMaxResult};
use log::debug;
use nalgebra::DMatrix;

use crate::age::AgeEstimate;
use crate::geochron_errors::GeochronError;
use crate::numerics::{hessian, invert_spd, HESSIAN_STEP};
use crate::params::FitParams;
use crate::stats::{normal_cdf, normal_pdf};

/// Bounds of the mixing proportion on the search grid.
const PROPORTION_BOUNDS: (f64, f64) = (1e-3, 1.0 - 1e-3);

/// Result of the minimum age model.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimumAgeFit {
    pub age: AgeEstimate,
    pub gamma: f64,
    pub sigma: f64,
    pub proportion: f64,
    /// Covariance of `(γ, σ, π)`.
    pub cov: DMatrix<f64>,
    pub loglik: f64,
}

fn loglik(z: &[f64], s: &[f64], gamma: f64, sigma: f64, pi: f64) -> f64 {
    z.iter()
        .zip(s)
        .map(|(zi, si)| {
            let omega = (sigma * sigma + si * si).sqrt();
            let alpha = sigma / si;
            let u = (zi - gamma) / omega;
            let discrete = pi * normal_pdf((zi - gamma) / si) / si;
            let truncated = (1.0 - pi) * 2.0 / omega * normal_pdf(u) * normal_cdf(alpha * u);
            (discrete + truncated).ln()
        })
        .sum()
}

fn linspace(lo: f64, hi: f64, steps: usize) -> impl Iterator<Item = f64> + Clone {
    let h = (hi - lo) / (steps - 1) as f64;
    (0..steps).map(move |i| lo + h * i as f64)
}

/// Fit the minimum age model to positive `values` with standard `errors`.
///
/// Arguments
/// -----------------
/// * `values`, `errors`: at least three pairs.
/// * `log`: work with log-values (relative errors).
/// * `params`: `mam_grid_steps` nodes per axis, `mam_refinements` zoom passes.
///
/// Return
/// ----------
/// * A [`MinimumAgeFit`], or [`GeochronError::SingularMatrix`] if the Hessian at the
///   optimum cannot be inverted.
pub fn minimum_age(
    values: &[f64],
    errors: &[f64],
    log: bool,
    params: &FitParams,
) -> Result<MinimumAgeFit, GeochronError> {
    if values.len() != errors.len() {
        return Err(GeochronError::LengthMismatch {
            expected: values.len(),
            found: errors.len(),
        });
    }
    if values.len() < 3 {
        return Err(GeochronError::EmptyDataset(3));
    }
    if errors.iter().any(|e| !(*e > 0.0)) || (log && values.iter().any(|v| !(*v > 0.0))) {
        return Err(GeochronError::InvalidParameter(
            "minimum age model needs positive errors (and values on the log scale)".into(),
        ));
    }
    let (z, s): (Vec<f64>, Vec<f64>) = if log {
        values.iter().zip(errors).map(|(v, e)| (v.ln(), e / v)).unzip()
    } else {
        (values.to_vec(), errors.to_vec())
    };
    let (zmin, zmax) = match z.iter().minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::MinMax(lo, hi) => (*lo, *hi),
        MinMaxResult::OneElement(v) => (*v, *v),
        MinMaxResult::NoElements => return Err(GeochronError::EmptyDataset(3)),
    };
    let range = (zmax - zmin).max(s.iter().cloned().fold(0.0, f64::max));

    let steps = params.mam_grid_steps;
    let mut box_gamma = (zmin - range * 0.1, zmax);
    let mut box_sigma = (0.0, 2.0 * range);
    let mut box_pi = PROPORTION_BOUNDS;
    let mut best = (f64::NEG_INFINITY, [z[0], 0.0, 0.5]);
    for pass in 0..=params.mam_refinements {
        for (g, sg, p) in iproduct!(
            linspace(box_gamma.0, box_gamma.1, steps),
            linspace(box_sigma.0, box_sigma.1, steps),
            linspace(box_pi.0, box_pi.1, steps)
        ) {
            let ll = loglik(&z, &s, g, sg, p);
            if ll > best.0 {
                best = (ll, [g, sg, p]);
            }
        }
        debug!("minimum age grid pass {pass}: loglik {} at {:?}", best.0, best.1);
        let zoom = |(lo, hi): (f64, f64), c: f64, bounds: (f64, f64)| {
            let half = 2.0 * (hi - lo) / (steps - 1) as f64;
            ((c - half).max(bounds.0), (c + half).min(bounds.1))
        };
        box_gamma = zoom(box_gamma, best.1[0], (f64::NEG_INFINITY, f64::INFINITY));
        box_sigma = zoom(box_sigma, best.1[1], (0.0, f64::INFINITY));
        box_pi = zoom(box_pi, best.1[2], PROPORTION_BOUNDS);
    }

    let [gamma, sigma, pi] = best.1;
    let negll = |x: &[f64]| -loglik(&z, &s, x[0], x[1].abs(), x[2]);
    let cov = invert_spd(&hessian(&negll, &best.1, HESSIAN_STEP))
        .ok_or(GeochronError::SingularMatrix("minimum age model Hessian"))?;
    let se_gamma = cov[(0, 0)].sqrt();
    let age = if log {
        AgeEstimate::new(gamma.exp(), gamma.exp() * se_gamma)
    } else {
        AgeEstimate::new(gamma, se_gamma)
    };
    Ok(MinimumAgeFit {
        age,
        gamma,
        sigma,
        proportion: pi,
        cov,
        loglik: best.0,
    })
}

#[cfg(test)]
mod mam_test {
    use super::*;

    #[test]
    fn test_minimum_age_sits_at_the_young_cluster() {
        let values = [
            10.0, 10.3, 9.8, 10.1, 13.0, 15.5, 18.0, 21.0, 12.2, 16.8, 25.0, 14.1,
        ];
        let errors: Vec<f64> = values.iter().map(|v| 0.03 * v).collect();
        let fit = minimum_age(&values, &errors, true, &FitParams::default()).unwrap();
        assert!(fit.age.t > 9.5 && fit.age.t < 10.8, "{}", fit.age.t);
        assert!(fit.proportion > 0.1 && fit.proportion < 0.7);
        assert!(fit.age.se.is_finite() && fit.age.se > 0.0);
    }

    #[test]
    fn test_needs_three_values() {
        assert!(minimum_age(&[1.0, 2.0], &[0.1, 0.1], true, &FitParams::default()).is_err());
    }
}
