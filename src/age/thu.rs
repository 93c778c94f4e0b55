//! Th-U disequilibrium ages (ka).
//!
//! With activity ratios `A48 = (U234/U238)` and `A08 = (Th230/U238)` and no initial
//! Th230, the age solves
//!
//! ```text
//! A08 = 1 − e^{−λ0 t} + (A48 − 1) · λ0 / (λ0 − λ4) · (1 − e^{−(λ0 − λ4) t})
//! ```
//!
//! and the initial activity ratio is `A48_0 = 1 + (A48 − 1) e^{λ4 t}`.
use nalgebra::{Matrix2, Vector2};

use super::{AgeConverter, AgeEstimate, AgeOptions};
use crate::constants::Constants;
use crate::data::thu::ThUData;
use crate::geochron_errors::GeochronError;
use crate::params::FitParams;
use crate::numerics::brent_root;

/// Th-U age together with the initial (U234/U238) activity ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThUAge {
    /// age (ka)
    pub t: f64,
    /// initial (U234/U238)
    pub a48_0: f64,
    /// covariance of `(t, a48_0)`
    pub cov: Matrix2<f64>,
}

fn th230_growth(t: f64, a48: f64, l0: f64, l4: f64) -> f64 {
    let d = l0 - l4;
    -(-l0 * t).exp_m1() - (a48 - 1.0) * l0 / d * (-d * t).exp_m1()
}

fn solve_age(a48: f64, a08: f64, l0: f64, l4: f64) -> Result<f64, GeochronError> {
    let f = |t: f64| th230_growth(t, a48, l0, l4) - a08;
    let mut hi = 100.0;
    while f(hi) < 0.0 {
        hi *= 2.0;
        if hi > 1.0e5 {
            return Err(GeochronError::InvalidParameter(format!(
                "(Th230/U238) = {a08} is beyond secular equilibrium"
            )));
        }
    }
    brent_root(f, 0.0, hi, 1e-13, 500)
}

/// Age and initial (U234/U238) from one pair of activity ratios.
///
/// Arguments
/// -----------------
/// * `x`: `(A48, A08)`.
/// * `cov`: covariance of `x`.
/// * `consts`: provides the Th230 and U234 decay constants (ka⁻¹).
/// * `exterr`: add the decay constant uncertainties.
pub fn thu_age(
    x: &Vector2<f64>,
    cov: &Matrix2<f64>,
    consts: &Constants,
    exterr: bool,
) -> Result<ThUAge, GeochronError> {
    let (l0, s0) = consts.lambda("Th230")?;
    let (l4, s4) = consts.lambda("U234")?;
    let (a48, a08) = (x[0], x[1]);
    let t = solve_age(a48, a08, l0, l4)?;
    let d = l0 - l4;

    // implicit differentiation of the growth equation
    let dm_dt = l0 * (-l0 * t).exp() + (a48 - 1.0) * l0 * (-d * t).exp();
    let dm_da48 = -l0 / d * (-d * t).exp_m1();
    let dt_da08 = 1.0 / dm_dt;
    let dt_da48 = -dm_da48 / dm_dt;

    let e4 = (l4 * t).exp();
    let a48_0 = 1.0 + (a48 - 1.0) * e4;
    let k = (a48 - 1.0) * l4 * e4;
    let jac = Matrix2::new(dt_da48, dt_da08, e4 + k * dt_da48, k * dt_da08);
    let mut out = jac * cov * jac.transpose();

    if exterr {
        let dt_dl0 = (solve_age(a48, a08, l0 * (1.0 + 1e-6), l4)?
            - solve_age(a48, a08, l0 * (1.0 - 1e-6), l4)?)
            / (2e-6 * l0);
        let dt_dl4 = (solve_age(a48, a08, l0, l4 * (1.0 + 1e-6))?
            - solve_age(a48, a08, l0, l4 * (1.0 - 1e-6))?)
            / (2e-6 * l4);
        let jl = Matrix2::new(
            dt_dl0,
            dt_dl4,
            k * dt_dl0,
            (a48 - 1.0) * e4 * t + k * dt_dl4,
        );
        let cov_l = Matrix2::new(s0 * s0, 0.0, 0.0, s4 * s4);
        out += jl * cov_l * jl.transpose();
    }
    out[(1, 0)] = out[(0, 1)];
    Ok(ThUAge { t, a48_0, cov: out })
}

impl ThUData {
    /// Ages and initial (U234/U238) ratios of every aliquot.
    pub fn ages_with_initial(
        &self,
        consts: &Constants,
        exterr: bool,
    ) -> Result<Vec<ThUAge>, GeochronError> {
        (0..self.len())
            .map(|i| {
                let (x, cov) = self.activities(i)?;
                thu_age(&x, &cov, consts, exterr)
            })
            .collect()
    }
}

impl AgeConverter for ThUData {
    fn ages(
        &self,
        consts: &Constants,
        _opts: &AgeOptions,
        params: &FitParams,
    ) -> Result<Vec<AgeEstimate>, GeochronError> {
        Ok(self
            .ages_with_initial(consts, params.exterr)?
            .into_iter()
            .map(|a| AgeEstimate::new(a.t, a.cov[(0, 0)].sqrt()))
            .collect())
    }
}

#[cfg(test)]
mod thu_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_thu_age_round_trip() {
        let consts = Constants::default();
        let l0 = consts.lambda("Th230").unwrap().0;
        let l4 = consts.lambda("U234").unwrap().0;
        let t = 120.0;
        let a48 = 1.15;
        let a08 = th230_growth(t, a48, l0, l4);
        let x = Vector2::new(a48, a08);
        let cov = Matrix2::new(1e-6, 0.0, 0.0, 4e-6);
        let age = thu_age(&x, &cov, &consts, false).unwrap();
        assert_relative_eq!(age.t, t, epsilon = 1e-7);
        assert_relative_eq!(age.a48_0, 1.0 + 0.15 * (l4 * t).exp(), epsilon = 1e-9);
        assert_eq!(age.cov[(0, 1)], age.cov[(1, 0)]);
        assert!(age.cov[(0, 0)] > 0.0);
    }

    #[test]
    fn test_beyond_equilibrium_is_rejected() {
        let consts = Constants::default();
        let x = Vector2::new(1.0, 1.2);
        let cov = Matrix2::identity() * 1e-6;
        assert!(thu_age(&x, &cov, &consts, false).is_err());
    }
}
