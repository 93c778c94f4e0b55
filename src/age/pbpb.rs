//! Single-aliquot Pb-Pb ages with optional common-Pb subtraction.
use nalgebra::Vector2;

use super::concordia::{pb207pb206_age, stacey_kramers_age};
use super::{AgeConverter, AgeEstimate, AgeOptions, CommonPb};
use crate::constants::Constants;
use crate::data::pbpb::PbPbData;
use crate::geochron_errors::GeochronError;
use crate::params::FitParams;

/// Radiogenic Pb207*/Pb206* from (Pb204/Pb206, Pb207/Pb206) after removal of the common
/// composition `(c64, c74)`, with its gradient.
fn radiogenic_ratio(q: f64, r76: f64, c64: f64, c74: f64) -> (f64, Vector2<f64>) {
    let num = r76 - c74 * q;
    let den = 1.0 - c64 * q;
    let r = num / den;
    let g = Vector2::new((-c74 * den + num * c64) / (den * den), 1.0 / den);
    (r, g)
}

impl AgeConverter for PbPbData {
    fn ages(
        &self,
        consts: &Constants,
        opts: &AgeOptions,
        params: &FitParams,
    ) -> Result<Vec<AgeEstimate>, GeochronError> {
        (0..self.len())
            .map(|i| {
                let (x, cov) = self.inverse(i)?;
                let age_with = |c64: f64, c74: f64| -> Result<AgeEstimate, GeochronError> {
                    let (r, g) = radiogenic_ratio(x[0], x[1], c64, c74);
                    let var = (g.transpose() * cov * g)[(0, 0)];
                    pb207pb206_age(r, var.sqrt(), consts, params.exterr)
                };
                match opts.common_pb {
                    CommonPb::None => age_with(0.0, 0.0),
                    CommonPb::Given(c64, c74) => age_with(c64, c74),
                    CommonPb::StaceyKramers => {
                        stacey_kramers_age(age_with(0.0, 0.0)?, consts, age_with)
                    }
                }
            })
            .collect()
    }
}
