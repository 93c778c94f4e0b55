//! # Central ages
//!
//! Geometric-mean "central" values of heteroscedastic, possibly overdispersed data,
//! after Galbraith & Laslett (1993).
//!
//! - [`central_age`]: lognormal random-effects model of positive values with standard
//!   errors (single-grain ages of any scheme).
//! - [`fissiontracks`]: binomial version working directly on track counts.
//! - [`uthhe`]: logistic-normal version on U-Th-(Sm)-He log-ratios, with the three
//!   error models.
//!
//! The lognormal model writes `z_i = ln t_i ~ N(μ, σ² + s_i²)` with
//! `s_i = se_i / t_i`, and alternates
//!
//! ```text
//! w_i = 1 / (σ² + s_i²)
//! μ   = Σ w_i z_i / Σ w_i
//! σ   : Σ w_i² (z_i − μ)² / Σ w_i = 1
//! ```
//!
//! until both `μ` and `σ` change by less than `central_tol`. Each `σ` update minimises
//! the squared residual of the last equation on `[0, 4 sd(z)]`, which puts it at zero
//! for underdispersed data.
use log::{debug, warn};

use crate::age::{AgeConverter, AgeEstimate, AgeOptions};
use crate::constants::Constants;
use crate::data::Dataset;
use crate::geochron_errors::GeochronError;
use crate::numerics::optimizer::minimize_scalar;
use crate::params::FitParams;
use crate::stats::FitStats;

pub mod fissiontracks;
pub mod uthhe;

/// Central value and overdispersion.
#[derive(Debug, Clone, PartialEq)]
pub struct CentralFit {
    pub t: f64,
    pub se: f64,
    /// Relative overdispersion σ.
    pub disp: f64,
    /// Homogeneity test against the analytical errors only.
    pub stats: FitStats,
    pub iterations: usize,
}

impl CentralFit {
    pub fn age(&self) -> AgeEstimate {
        AgeEstimate::new(self.t, self.se)
    }

    /// Half-width of the `1 − alpha` confidence interval of the central value.
    pub fn ci(&self, alpha: f64) -> Result<f64, GeochronError> {
        self.stats.ci(self.se, alpha, true)
    }
}

fn check(values: &[f64], errors: &[f64]) -> Result<(), GeochronError> {
    if values.len() != errors.len() {
        return Err(GeochronError::LengthMismatch {
            expected: values.len(),
            found: errors.len(),
        });
    }
    if values.is_empty() {
        return Err(GeochronError::EmptyDataset(1));
    }
    if values.iter().any(|v| !(*v > 0.0 && v.is_finite())) {
        return Err(GeochronError::InvalidParameter(
            "central ages need positive values".into(),
        ));
    }
    if errors.iter().any(|e| !(*e >= 0.0 && e.is_finite())) {
        return Err(GeochronError::InvalidParameter(
            "standard errors must be finite and non-negative".into(),
        ));
    }
    Ok(())
}

/// Chi-square of `z` about its inverse-variance weighted mean.
fn homogeneity(z: &[f64], s: &[f64]) -> f64 {
    let (mut sw, mut swz, mut swz2) = (0.0, 0.0, 0.0);
    for (zi, si) in z.iter().zip(s) {
        let w = 1.0 / (si * si);
        sw += w;
        swz += w * zi;
        swz2 += w * zi * zi;
    }
    swz2 - swz * swz / sw
}

/// Central value of positive `values` with standard `errors`.
///
/// Arguments
/// -----------------
/// * `values`, `errors`: equally long, values positive, errors non-negative.
/// * `params`: `central_max_iter` and `central_tol` bound the fixed-point loop.
///
/// Return
/// ----------
/// * A [`CentralFit`] with `n − 1` degrees of freedom. Identical values give the
///   value itself, zero dispersion and, with zero errors, a NaN MSWD.
pub fn central_age(
    values: &[f64],
    errors: &[f64],
    params: &FitParams,
) -> Result<CentralFit, GeochronError> {
    check(values, errors)?;
    let n = values.len();
    let z: Vec<f64> = values.iter().map(|v| v.ln()).collect();
    let s: Vec<f64> = values.iter().zip(errors).map(|(v, e)| e / v).collect();
    let df = n - 1;

    let zmean = z.iter().sum::<f64>() / n as f64;
    let ss = z.iter().map(|zi| (zi - zmean).powi(2)).sum::<f64>();
    let spread = (ss / n.max(2).saturating_sub(1) as f64).sqrt();
    if spread == 0.0 {
        let sw: f64 = s.iter().map(|si| 1.0 / (si * si)).sum();
        let se_z = if sw.is_finite() { 1.0 / sw.sqrt() } else { 0.0 };
        return Ok(CentralFit {
            t: values[0],
            se: values[0] * se_z,
            disp: 0.0,
            stats: FitStats::new(homogeneity(&z, &s), df),
            iterations: 0,
        });
    }

    let mut sigma = 0.6 * spread;
    let mut mu = zmean;
    let mut iterations = 0;
    let mut converged = false;
    let weights = |sigma: f64| -> Vec<f64> {
        s.iter()
            .map(|si| 1.0 / (sigma * sigma + si * si))
            .collect()
    };
    while iterations < params.central_max_iter {
        iterations += 1;
        let w = weights(sigma);
        let mu_new = w.iter().zip(&z).map(|(wi, zi)| wi * zi).sum::<f64>() / w.iter().sum::<f64>();
        let residual = |sig: f64| {
            let w = weights(sig);
            let lhs: f64 = w.iter().zip(&z).map(|(wi, zi)| (wi * (zi - mu_new)).powi(2)).sum();
            (lhs / w.iter().sum::<f64>() - 1.0).powi(2)
        };
        let sigma_new = minimize_scalar(&residual, 0.0, 4.0 * spread, params.optim_max_iter)?;
        let change = (mu_new - mu).abs() + (sigma_new - sigma).abs();
        mu = mu_new;
        sigma = sigma_new;
        if change < params.central_tol {
            converged = true;
            break;
        }
    }
    if converged {
        debug!("central age converged in {iterations} iterations, σ = {sigma}");
    } else {
        warn!("central age reached {iterations} iterations without converging");
    }

    let sw: f64 = weights(sigma).iter().sum();
    let t = mu.exp();
    Ok(CentralFit {
        t,
        se: t / sw.sqrt(),
        disp: sigma,
        stats: FitStats::new(homogeneity(&z, &s), df),
        iterations,
    })
}

/// Central age of any dataset.
///
/// Fission-track data use the binomial model; every other scheme goes through its
/// single-aliquot ages.
pub fn central(
    dataset: &Dataset,
    consts: &Constants,
    params: &FitParams,
) -> Result<CentralFit, GeochronError> {
    if let Dataset::FissionTracks(d) = dataset {
        return d.central_age(consts, params);
    }
    // systematic errors are shared by every aliquot and carry no dispersion information
    let analytical = FitParams {
        exterr: false,
        ..params.clone()
    };
    let ages = dataset.ages(consts, &AgeOptions::default(), &analytical)?;
    let t: Vec<f64> = ages.iter().map(|a| a.t).collect();
    let se: Vec<f64> = ages.iter().map(|a| a.se).collect();
    central_age(&t, &se, params)
}
