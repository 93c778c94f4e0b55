//! U-Pb concordia geometry, single-aliquot U-Pb ages and the Stacey & Kramers
//! common-Pb model.
//!
//! The forward functions map an age (Ma) to the radiogenic ratios of a closed system;
//! the inverse functions map a ratio and its standard error back to an
//! [`AgeEstimate`].
use nalgebra::{Vector2, Vector3};

use super::{simple_age, AgeConverter, AgeEstimate, AgeOptions, CommonPb, UPbAgeType};
use crate::constants::{
    Constants, SK_MU, SK_MU1, SK_PB206PB204_T0, SK_PB206PB204_T1, SK_PB207PB204_T0,
    SK_PB207PB204_T1, SK_T0,
};
use crate::data::upb::UPbData;
use crate::geochron_errors::GeochronError;
use crate::params::FitParams;
use crate::numerics::brent_root;

/// Oldest age accepted by the root searches (Ma).
pub const MAX_AGE: f64 = 1.0e4;

/// Youngest age accepted by the root searches (Ma).
const MIN_AGE: f64 = 1.0e-6;

struct Lambdas {
    l8: f64,
    l5: f64,
    u85: f64,
}

impl Lambdas {
    fn from(consts: &Constants) -> Result<Self, GeochronError> {
        Ok(Lambdas {
            l8: consts.lambda("U238")?.0,
            l5: consts.lambda("U235")?.0,
            u85: consts.iratio("U238U235")?.0,
        })
    }
}

pub fn age_to_pb206u238_ratio(t: f64, consts: &Constants) -> Result<f64, GeochronError> {
    Ok((consts.lambda("U238")?.0 * t).exp_m1())
}

pub fn age_to_pb207u235_ratio(t: f64, consts: &Constants) -> Result<f64, GeochronError> {
    Ok((consts.lambda("U235")?.0 * t).exp_m1())
}

pub fn age_to_u238pb206_ratio(t: f64, consts: &Constants) -> Result<f64, GeochronError> {
    Ok(1.0 / age_to_pb206u238_ratio(t, consts)?)
}

pub fn age_to_pb207pb206_ratio(t: f64, consts: &Constants) -> Result<f64, GeochronError> {
    let l = Lambdas::from(consts)?;
    Ok(pb76(t, &l))
}

fn pb76(t: f64, l: &Lambdas) -> f64 {
    (l.l5 * t).exp_m1() / (l.u85 * (l.l8 * t).exp_m1())
}

/// Point `(U238/Pb206, Pb207/Pb206)` of the Tera-Wasserburg concordia at age `t`,
/// together with its derivative with respect to `t`.
pub fn tera_wasserburg_point(
    t: f64,
    consts: &Constants,
) -> Result<(Vector2<f64>, Vector2<f64>), GeochronError> {
    let l = Lambdas::from(consts)?;
    let e8 = (l.l8 * t).exp();
    let e5 = (l.l5 * t).exp();
    let x = 1.0 / (e8 - 1.0);
    let y = (e5 - 1.0) / (l.u85 * (e8 - 1.0));
    let dx = -l.l8 * e8 / (e8 - 1.0).powi(2);
    let dy = (l.l5 * e5 * (e8 - 1.0) - (e5 - 1.0) * l.l8 * e8) / (l.u85 * (e8 - 1.0).powi(2));
    Ok((Vector2::new(x, y), Vector2::new(dx, dy)))
}

/// Pb206/U238 age.
pub fn pb206u238_age(
    r: f64,
    s_r: f64,
    consts: &Constants,
    exterr: bool,
) -> Result<AgeEstimate, GeochronError> {
    simple_age(r, s_r, consts.lambda("U238")?, exterr)
}

/// Pb207/U235 age.
pub fn pb207u235_age(
    r: f64,
    s_r: f64,
    consts: &Constants,
    exterr: bool,
) -> Result<AgeEstimate, GeochronError> {
    simple_age(r, s_r, consts.lambda("U235")?, exterr)
}

/// Pb207/Pb206 age, found by a Brent root search of the transcendental equation
/// `(e^{λ5 t} − 1) / (U85 (e^{λ8 t} − 1)) = r`.
pub fn pb207pb206_age(
    r: f64,
    s_r: f64,
    consts: &Constants,
    exterr: bool,
) -> Result<AgeEstimate, GeochronError> {
    let l = Lambdas::from(consts)?;
    let (l8, s8) = consts.lambda("U238")?;
    let (l5, s5) = consts.lambda("U235")?;
    let lo = pb76(MIN_AGE, &l);
    let hi = pb76(MAX_AGE, &l);
    if !(r > lo && r < hi) {
        return Err(GeochronError::InvalidParameter(format!(
            "Pb207/Pb206 ratio {r} outside the concordia range ({lo}, {hi})"
        )));
    }
    let t = brent_root(|t| pb76(t, &l) - r, MIN_AGE, MAX_AGE, 1e-12, 500)?;

    let e8 = (l8 * t).exp();
    let e5 = (l5 * t).exp();
    let b = l.u85 * (e8 - 1.0);
    let dr_dt = (l5 * e5 * b - (e5 - 1.0) * l.u85 * l8 * e8) / (b * b);
    let dt_dr = 1.0 / dr_dt;
    let mut var = (dt_dr * s_r).powi(2);
    if exterr {
        let dr_dl5 = t * e5 / b;
        let dr_dl8 = -(e5 - 1.0) * l.u85 * t * e8 / (b * b);
        var += (dr_dl5 * dt_dr * s5).powi(2) + (dr_dl8 * dt_dr * s8).powi(2);
    }
    Ok(AgeEstimate::new(t, var.sqrt()))
}

/// Stacey & Kramers (1975) two-stage common-Pb composition
/// `(Pb206/Pb204, Pb207/Pb204)` at age `t` (Ma).
pub fn stacey_kramers(t: f64, consts: &Constants) -> Result<(f64, f64), GeochronError> {
    let l = Lambdas::from(consts)?;
    let (t0, pb64_0, pb74_0, mu) = if t <= SK_T0 {
        (SK_T0, SK_PB206PB204_T0, SK_PB207PB204_T0, SK_MU)
    } else {
        (
            crate::constants::SK_T1,
            SK_PB206PB204_T1,
            SK_PB207PB204_T1,
            SK_MU1,
        )
    };
    let pb64 = pb64_0 + mu * ((l.l8 * t0).exp() - (l.l8 * t).exp());
    let pb74 = pb74_0 + mu / l.u85 * ((l.l5 * t0).exp() - (l.l5 * t).exp());
    Ok((pb64, pb74))
}

/// Iterations of the age / Stacey & Kramers composition fixed point.
const SK_ITERATIONS: usize = 20;

/// Age corrected with the Stacey & Kramers composition at its own age.
///
/// Starts from the uncorrected age `first`; `age_with(c64, c74)` gives the age after
/// subtraction of a common Pb composition.
pub(crate) fn stacey_kramers_age<F>(
    first: AgeEstimate,
    consts: &Constants,
    age_with: F,
) -> Result<AgeEstimate, GeochronError>
where
    F: Fn(f64, f64) -> Result<AgeEstimate, GeochronError>,
{
    let mut age = first;
    for _ in 0..SK_ITERATIONS {
        let (c64, c74) = stacey_kramers(age.t, consts)?;
        let next = age_with(c64, c74)?;
        let done = (next.t - age.t).abs() < 1e-8 * age.t.abs().max(1.0);
        age = next;
        if done {
            break;
        }
    }
    Ok(age)
}

impl UPbData {
    fn radiogenic_age(
        &self,
        i: usize,
        upb: UPbAgeType,
        consts: &Constants,
        exterr: bool,
    ) -> Result<AgeEstimate, GeochronError> {
        let u85 = consts.iratio("U238U235")?.0;
        let (x, cov) = self.wetherill(i, u85)?;
        match upb {
            UPbAgeType::Pb206U238 => pb206u238_age(x[1], cov[(1, 1)].sqrt(), consts, exterr),
            UPbAgeType::Pb207U235 => pb207u235_age(x[0], cov[(0, 0)].sqrt(), consts, exterr),
            UPbAgeType::Pb207Pb206 => {
                let r = x[0] / (u85 * x[1]);
                let g = Vector2::new(r / x[0], -r / x[1]);
                let var = (g.transpose() * cov * g)[(0, 0)];
                pb207pb206_age(r, var.sqrt(), consts, exterr)
            }
        }
    }

    /// Age after subtraction of a common Pb with Pb206/Pb204 = `c64` and
    /// Pb207/Pb204 = `c74`, using the measured Pb204.
    fn pb204_corrected_age(
        &self,
        i: usize,
        (c64, c74): (f64, f64),
        upb: UPbAgeType,
        consts: &Constants,
        exterr: bool,
    ) -> Result<AgeEstimate, GeochronError> {
        let u85 = consts.iratio("U238U235")?.0;
        // U238/Pb206, Pb207/Pb206, Pb204/Pb206
        let (x, cov) = self.tera_wasserburg3(i, u85)?;
        let pb6 = 1.0 - c64 * x[2];
        let pb7 = x[1] - c74 * x[2];
        let x2 = x[0] * x[0];
        let (r, g) = match upb {
            UPbAgeType::Pb206U238 => (pb6 / x[0], Vector3::new(-pb6 / x2, 0.0, -c64 / x[0])),
            UPbAgeType::Pb207U235 => (
                u85 * pb7 / x[0],
                Vector3::new(-u85 * pb7 / x2, u85 / x[0], -u85 * c74 / x[0]),
            ),
            UPbAgeType::Pb207Pb206 => (
                pb7 / pb6,
                Vector3::new(0.0, 1.0 / pb6, (pb7 * c64 - c74 * pb6) / (pb6 * pb6)),
            ),
        };
        let s = (g.transpose() * cov * g)[(0, 0)].sqrt();
        match upb {
            UPbAgeType::Pb206U238 => pb206u238_age(r, s, consts, exterr),
            UPbAgeType::Pb207U235 => pb207u235_age(r, s, consts, exterr),
            UPbAgeType::Pb207Pb206 => pb207pb206_age(r, s, consts, exterr),
        }
    }
}

impl AgeConverter for UPbData {
    /// Single-aliquot ages of the chronometer `opts.upb`.
    ///
    /// A common-Pb correction other than [`CommonPb::None`] subtracts the measured Pb204
    /// times the common composition and needs one of the Pb204-bearing formats.
    fn ages(
        &self,
        consts: &Constants,
        opts: &AgeOptions,
        params: &FitParams,
    ) -> Result<Vec<AgeEstimate>, GeochronError> {
        if opts.common_pb != CommonPb::None && !self.format().has_pb204() {
            return Err(GeochronError::UnsupportedFormat(
                "common-Pb correction of U-Pb data needs Pb204".into(),
            ));
        }
        let exterr = params.exterr;
        (0..self.len())
            .map(|i| match opts.common_pb {
                CommonPb::None => self.radiogenic_age(i, opts.upb, consts, exterr),
                CommonPb::Given(c64, c74) => {
                    self.pb204_corrected_age(i, (c64, c74), opts.upb, consts, exterr)
                }
                CommonPb::StaceyKramers => {
                    let first = self.radiogenic_age(i, opts.upb, consts, exterr)?;
                    stacey_kramers_age(first, consts, |c64, c74| {
                        self.pb204_corrected_age(i, (c64, c74), opts.upb, consts, exterr)
                    })
                }
            })
            .collect()
    }
}
