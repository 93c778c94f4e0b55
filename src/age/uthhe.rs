//! U-Th-(Sm)-He ages.
//!
//! The age solves the He production equation
//!
//! ```text
//! He = 8 U238 (e^{λ238 t} − 1) + 7 U235 (e^{λ235 t} − 1) + 6 Th (e^{λ232 t} − 1)
//!      + f147 Sm (e^{λ147 t} − 1)
//! ```
//!
//! by Newton–Raphson iteration, with U238 and U235 split from total U by the
//! U238/U235 ratio.
use nalgebra::{DMatrix, DVector};
use roots::{find_root_newton_raphson, SimpleConvergency};

use super::{AgeConverter, AgeEstimate, AgeOptions};
use crate::constants::{Constants, ALPHA_TH232, ALPHA_U235, ALPHA_U238, SM147_ABUNDANCE};
use crate::covariance::errorprop1;
use crate::data::uthhe::UThHeData;
use crate::geochron_errors::GeochronError;
use crate::params::FitParams;

/// Decay constants and isotope split needed by the He production equation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeProduction {
    l8: f64,
    l5: f64,
    l2: f64,
    l7: f64,
    f238: f64,
    f235: f64,
}

impl HeProduction {
    pub(crate) fn from(consts: &Constants) -> Result<Self, GeochronError> {
        let u85 = consts.iratio("U238U235")?.0;
        Ok(HeProduction {
            l8: consts.lambda("U238")?.0,
            l5: consts.lambda("U235")?.0,
            l2: consts.lambda("Th232")?.0,
            l7: consts.lambda("Sm147")?.0,
            f238: u85 / (1.0 + u85),
            f235: 1.0 / (1.0 + u85),
        })
    }

    /// Per-unit production rates `(∂P/∂U, ∂P/∂Th, ∂P/∂Sm)` at age `t`.
    fn rates(&self, t: f64) -> [f64; 3] {
        [
            ALPHA_U238 * self.f238 * (self.l8 * t).exp_m1()
                + ALPHA_U235 * self.f235 * (self.l5 * t).exp_m1(),
            ALPHA_TH232 * (self.l2 * t).exp_m1(),
            SM147_ABUNDANCE * (self.l7 * t).exp_m1(),
        ]
    }

    /// Time derivatives of [`HeProduction::rates`].
    fn rates_dt(&self, t: f64) -> [f64; 3] {
        [
            ALPHA_U238 * self.f238 * self.l8 * (self.l8 * t).exp()
                + ALPHA_U235 * self.f235 * self.l5 * (self.l5 * t).exp(),
            ALPHA_TH232 * self.l2 * (self.l2 * t).exp(),
            SM147_ABUNDANCE * self.l7 * (self.l7 * t).exp(),
        ]
    }

    /// Age of a (He, U, Th, Sm) composition.
    pub(crate) fn age(&self, he: f64, u: f64, th: f64, sm: f64) -> Result<f64, GeochronError> {
        let f = |t: f64| {
            let r = self.rates(t);
            r[0] * u + r[1] * th + r[2] * sm - he
        };
        let df = |t: f64| {
            let r = self.rates_dt(t);
            r[0] * u + r[1] * th + r[2] * sm
        };
        // linearised production as the starting point
        let t0 = he / df(0.0);
        let mut conv = SimpleConvergency {
            eps: 1e-12,
            max_iter: 100,
        };
        Ok(find_root_newton_raphson(t0, &f, &df, &mut conv)?)
    }

    /// Gradient of the age with respect to (He, U, Th, Sm) at the solution `t`.
    pub(crate) fn gradient(&self, t: f64, u: f64, th: f64, sm: f64) -> [f64; 4] {
        let r = self.rates(t);
        let d = self.rates_dt(t);
        let dp_dt = d[0] * u + d[1] * th + d[2] * sm;
        [1.0 / dp_dt, -r[0] / dp_dt, -r[1] / dp_dt, -r[2] / dp_dt]
    }
}

/// U-Th-(Sm)-He age of one composition with its standard error.
///
/// Arguments
/// -----------------
/// * `x`: amounts (He, U, Th[, Sm]).
/// * `cov`: covariance of `x`.
/// * `consts`: decay constants and U238/U235.
/// * `exterr`: add the decay constant uncertainties.
pub fn uthhe_age(
    x: &DVector<f64>,
    cov: &DMatrix<f64>,
    consts: &Constants,
    exterr: bool,
) -> Result<AgeEstimate, GeochronError> {
    let prod = HeProduction::from(consts)?;
    let sm = if x.len() > 3 { x[3] } else { 0.0 };
    let t = prod.age(x[0], x[1], x[2], sm)?;
    let g = prod.gradient(t, x[1], x[2], sm);
    let grad = DVector::from_column_slice(&g[..x.len()]);
    let mut var = errorprop1(&grad, cov);
    if exterr {
        let (_, s8) = consts.lambda("U238")?;
        let (_, s5) = consts.lambda("U235")?;
        let (_, s2) = consts.lambda("Th232")?;
        let (_, s7) = consts.lambda("Sm147")?;
        let d = prod.rates_dt(t);
        let dp_dt = d[0] * x[1] + d[1] * x[2] + d[2] * sm;
        // ∂P/∂λ = α · amount · t · e^{λt}
        let dp_dl = [
            ALPHA_U238 * prod.f238 * x[1] * t * (prod.l8 * t).exp(),
            ALPHA_U235 * prod.f235 * x[1] * t * (prod.l5 * t).exp(),
            ALPHA_TH232 * x[2] * t * (prod.l2 * t).exp(),
            SM147_ABUNDANCE * sm * t * (prod.l7 * t).exp(),
        ];
        var += [s8, s5, s2, s7]
            .iter()
            .zip(dp_dl.iter())
            .map(|(s, d)| (d / dp_dt * s).powi(2))
            .sum::<f64>();
    }
    Ok(AgeEstimate::new(t, var.sqrt()))
}

impl AgeConverter for UThHeData {
    fn ages(
        &self,
        consts: &Constants,
        _opts: &AgeOptions,
        params: &FitParams,
    ) -> Result<Vec<AgeEstimate>, GeochronError> {
        (0..self.len())
            .map(|i| {
                let (x, cov) = self.composition(i)?;
                uthhe_age(&x, &cov, consts, params.exterr)
            })
            .collect()
    }
}

#[cfg(test)]
mod uthhe_age_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_production_round_trip() {
        let consts = Constants::default();
        let prod = HeProduction::from(&consts).unwrap();
        let (u, th, sm) = (100.0, 50.0, 20.0);
        let r = prod.rates(75.0);
        let he = r[0] * u + r[1] * th + r[2] * sm;
        let t = prod.age(he, u, th, sm).unwrap();
        assert_relative_eq!(t, 75.0, epsilon = 1e-8);
    }

    #[test]
    fn test_age_error_grows_with_he_error() {
        let consts = Constants::default();
        let x = DVector::from_vec(vec![2.0, 100.0, 50.0]);
        let small = DMatrix::from_diagonal(&DVector::from_vec(vec![1e-4, 1.0, 0.25]));
        let large = DMatrix::from_diagonal(&DVector::from_vec(vec![4e-2, 1.0, 0.25]));
        let a = uthhe_age(&x, &small, &consts, false).unwrap();
        let b = uthhe_age(&x, &large, &consts, false).unwrap();
        assert_relative_eq!(a.t, b.t, epsilon = 1e-12);
        assert!(b.se > a.se);
    }
}
