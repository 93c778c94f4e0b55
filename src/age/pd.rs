//! Parent–daughter ages for Re-Os, Sm-Nd, Rb-Sr and Lu-Hf.
use nalgebra::Vector2;

use super::{simple_age, AgeConverter, AgeEstimate, AgeOptions};
use crate::constants::Constants;
use crate::data::pd::PDData;
use crate::geochron_errors::GeochronError;
use crate::params::FitParams;
use crate::regression::isochron::Isochron;

impl AgeConverter for PDData {
    /// Model ages `t = ln(1 + (D/Ds − D0/Ds) / (P/Ds)) / λ`.
    ///
    /// `D0/Ds` is zero, or the isochron intercept when `i2i` is set. The uncertainty of
    /// the intercept is not propagated.
    fn ages(
        &self,
        consts: &Constants,
        opts: &AgeOptions,
        params: &FitParams,
    ) -> Result<Vec<AgeEstimate>, GeochronError> {
        let lambda = consts.lambda(self.system().parent())?;
        let d0 = if opts.i2i {
            self.isochron(consts, params)?.intercept.0
        } else {
            0.0
        };
        (0..self.len())
            .map(|i| {
                let (x, cov) = self.normal(i)?;
                let r = (x[1] - d0) / x[0];
                let g = Vector2::new(-r / x[0], 1.0 / x[0]);
                let var = (g.transpose() * cov * g)[(0, 0)];
                simple_age(r, var.sqrt(), lambda, params.exterr)
            })
            .collect()
    }
}
