//! Ar-Ar ages.
use super::{AgeConverter, AgeEstimate, AgeOptions};
use crate::constants::Constants;
use crate::data::arar::ArArData;
use crate::geochron_errors::GeochronError;
use crate::params::FitParams;
use crate::regression::isochron::Isochron;

/// Age from the radiogenic Ar40*/Ar39 ratio `r`.
///
/// `t = ln(1 + J r) / λ40`. With `exterr`, the J-factor and decay constant
/// uncertainties are added.
pub fn arar_age(
    r: f64,
    s_r: f64,
    j: (f64, f64),
    consts: &Constants,
    exterr: bool,
) -> Result<AgeEstimate, GeochronError> {
    let (l, s_l) = consts.lambda("K40")?;
    let jr = j.0 * r;
    if !(jr > -1.0) {
        return Err(GeochronError::InvalidParameter(format!(
            "Ar40*/Ar39 ratio {r} gives a negative age argument"
        )));
    }
    let t = jr.ln_1p() / l;
    let dt_dr = j.0 / (l * (1.0 + jr));
    let mut var = (dt_dr * s_r).powi(2);
    if exterr {
        let dt_dj = r / (l * (1.0 + jr));
        var += (dt_dj * j.1).powi(2) + (t / l * s_l).powi(2);
    }
    Ok(AgeEstimate::new(t, var.sqrt()))
}

impl AgeConverter for ArArData {
    /// Atmosphere-corrected single-step ages.
    ///
    /// The trapped Ar40/Ar36 ratio is the atmospheric value, or the isochron intercept
    /// when `i2i` is set.
    fn ages(
        &self,
        consts: &Constants,
        opts: &AgeOptions,
        params: &FitParams,
    ) -> Result<Vec<AgeEstimate>, GeochronError> {
        let trapped = if opts.i2i {
            self.isochron(consts, params)?.intercept
        } else {
            consts.iratio("Ar40Ar36")?
        };
        (0..self.len())
            .map(|i| {
                let (x, cov) = self.normal(i)?;
                // Ar40*/Ar39 = (Ar40/Ar36 - trapped) / (Ar39/Ar36)
                let r = (x[1] - trapped.0) / x[0];
                let g = nalgebra::Vector2::new(-r / x[0], 1.0 / x[0]);
                let mut var = (g.transpose() * cov * g)[(0, 0)];
                if params.exterr {
                    var += (trapped.1 / x[0]).powi(2);
                }
                arar_age(r, var.sqrt(), self.j(), consts, params.exterr)
            })
            .collect()
    }
}

#[cfg(test)]
mod arar_test {
    use super::*;
    use crate::data::{arar::ArArFormat, Aliquot};
    use approx::assert_relative_eq;

    #[test]
    fn test_arar_age_round_trip() {
        let consts = Constants::default();
        let j = (0.01, 1e-5);
        let l = consts.lambda("K40").unwrap().0;
        let t = 100.0;
        let r = (l * t).exp_m1() / j.0;
        let a = arar_age(r, 0.01 * r, j, &consts, false).unwrap();
        assert_relative_eq!(a.t, t, epsilon = 1e-9);
        let b = arar_age(r, 0.01 * r, j, &consts, true).unwrap();
        assert!(b.se > a.se);
    }

    #[test]
    fn test_atmosphere_correction() {
        let consts = Constants::default();
        let j = (0.01, 0.0);
        let l = consts.lambda("K40").unwrap().0;
        let r = (l * 50.0).exp_m1() / j.0;
        let atm = consts.iratio("Ar40Ar36").unwrap().0;
        let x39 = 100.0;
        let x40 = atm + r * x39;
        let a = Aliquot::new(vec![x39, x40], vec![1.0, 5.0], vec![0.2]).unwrap();
        let d = ArArData::new(ArArFormat::Normal, j, vec![a]).unwrap();
        let ages = d.ages(&consts, &AgeOptions::default(), &FitParams::default()).unwrap();
        assert_relative_eq!(ages[0].t, 50.0, epsilon = 1e-9);
    }
}
