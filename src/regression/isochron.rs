//! Isochrons: York regressions in ratio spaces where the slope is an age proxy.
//!
//! | Scheme | x | y | slope | intercept |
//! |--------|---|---|-------|-----------|
//! | Parent–daughter | P/Ds | D/Ds | `e^{λt} − 1` | initial D/Ds |
//! | Ar-Ar | Ar39/Ar36 | Ar40/Ar36 | Ar40*/Ar39 | trapped Ar40/Ar36 |
//! | Pb-Pb | Pb206/Pb204 | Pb207/Pb204 | Pb207*/Pb206* | Pb207/Pb204 at Pb206/Pb204 = 0 |
use nalgebra::{Matrix2, Vector2};

use super::york::{york, YorkData, YorkFit};
use crate::age::arar::arar_age;
use crate::age::concordia::pb207pb206_age;
use crate::age::{simple_age, AgeEstimate};
use crate::constants::Constants;
use crate::data::arar::ArArData;
use crate::data::pbpb::PbPbData;
use crate::data::pd::PDData;
use crate::geochron_errors::GeochronError;
use crate::params::FitParams;

/// Isochron age and intercept.
#[derive(Debug, Clone, PartialEq)]
pub struct IsochronFit {
    pub age: AgeEstimate,
    /// `(value, stderr)` of the initial/trapped ratio
    pub intercept: (f64, f64),
    pub york: YorkFit,
}

/// Regression of a dataset on its isochron.
pub trait Isochron {
    fn isochron(
        &self,
        consts: &Constants,
        params: &FitParams,
    ) -> Result<IsochronFit, GeochronError>;
}

fn collect<F>(n: usize, point: F) -> Result<YorkData, GeochronError>
where
    F: Fn(usize) -> Result<(Vector2<f64>, Matrix2<f64>), GeochronError>,
{
    if n < 3 {
        return Err(GeochronError::EmptyDataset(3));
    }
    let points = (0..n).map(point).collect::<Result<Vec<_>, _>>()?;
    YorkData::from_points(&points)
}

impl Isochron for PDData {
    fn isochron(
        &self,
        consts: &Constants,
        params: &FitParams,
    ) -> Result<IsochronFit, GeochronError> {
        let fit = york(&collect(self.len(), |i| self.normal(i))?, params)?;
        let lambda = consts.lambda(self.system().parent())?;
        let age = simple_age(fit.b, fit.se_b(), lambda, params.exterr)?;
        Ok(IsochronFit {
            age,
            intercept: (fit.a, fit.se_a()),
            york: fit,
        })
    }
}

impl Isochron for ArArData {
    fn isochron(
        &self,
        consts: &Constants,
        params: &FitParams,
    ) -> Result<IsochronFit, GeochronError> {
        let fit = york(&collect(self.len(), |i| self.normal(i))?, params)?;
        let age = arar_age(fit.b, fit.se_b(), self.j(), consts, params.exterr)?;
        Ok(IsochronFit {
            age,
            intercept: (fit.a, fit.se_a()),
            york: fit,
        })
    }
}

impl ArArData {
    /// Inverse isochron: Ar36/Ar40 against Ar39/Ar40.
    ///
    /// The y-intercept is the inverse of the trapped Ar40/Ar36 ratio and the
    /// x-intercept the inverse of the radiogenic Ar40*/Ar39 ratio. The returned
    /// `intercept` is the trapped Ar40/Ar36 ratio.
    pub fn inverse_isochron(
        &self,
        consts: &Constants,
        params: &FitParams,
    ) -> Result<IsochronFit, GeochronError> {
        let fit = york(&collect(self.len(), |i| self.inverse(i))?, params)?;
        let (a, b) = (fit.a, fit.b);
        // Ar40*/Ar39 = -b/a and trapped Ar40/Ar36 = 1/a
        let r = -b / a;
        let g_r = Vector2::new(b / (a * a), -1.0 / a);
        let s_r = (g_r.transpose() * fit.cov * g_r)[(0, 0)].sqrt();
        let trapped = (1.0 / a, fit.se_a() / (a * a));
        let age = arar_age(r, s_r, self.j(), consts, params.exterr)?;
        Ok(IsochronFit {
            age,
            intercept: trapped,
            york: fit,
        })
    }
}

impl Isochron for PbPbData {
    fn isochron(
        &self,
        consts: &Constants,
        params: &FitParams,
    ) -> Result<IsochronFit, GeochronError> {
        let fit = york(&collect(self.len(), |i| self.normal(i))?, params)?;
        let age = pb207pb206_age(fit.b, fit.se_b(), consts, params.exterr)?;
        Ok(IsochronFit {
            age,
            intercept: (fit.a, fit.se_a()),
            york: fit,
        })
    }
}
