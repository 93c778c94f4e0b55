//! Fission-track ages by the external detector method (zeta calibration).
//!
//! `t = ln(1 + g λ ζ ρ_D Ns/Ni) / λ`, with `λ` the total U238 decay constant and `g`
//! the EDM geometry factor. The units of ζ set the units of the age; ages are in Ma
//! when ζ is given in Ma·cm².
use super::{AgeConverter, AgeEstimate, AgeOptions};
use crate::constants::{Constants, EDM_GEOMETRY};
use crate::data::fissiontracks::FissionTrackData;
use crate::geochron_errors::GeochronError;
use crate::params::FitParams;

/// Age from a spontaneous/induced track density ratio `r` with standard error `s_r`.
pub fn ft_age(
    r: f64,
    s_r: f64,
    zeta: (f64, f64),
    rho_d: (f64, f64),
    consts: &Constants,
    exterr: bool,
) -> Result<AgeEstimate, GeochronError> {
    if !(r >= 0.0 && r.is_finite()) {
        return Err(GeochronError::InvalidParameter(format!(
            "track ratio must be finite and non-negative, got {r}"
        )));
    }
    let (l, s_l) = consts.lambda("U238")?;
    let c = EDM_GEOMETRY * zeta.0 * rho_d.0 * r;
    let t = (l * c).ln_1p() / l;
    let k = 1.0 / (1.0 + l * c);
    let dt_dr = EDM_GEOMETRY * zeta.0 * rho_d.0 * k;
    let mut var = (dt_dr * s_r).powi(2);
    if exterr {
        let dt_dzeta = EDM_GEOMETRY * rho_d.0 * r * k;
        let dt_drho = EDM_GEOMETRY * zeta.0 * r * k;
        let dt_dl = c * k / l - t / l;
        var += (dt_dzeta * zeta.1).powi(2) + (dt_drho * rho_d.1).powi(2) + (dt_dl * s_l).powi(2);
    }
    Ok(AgeEstimate::new(t, var.sqrt()))
}

impl AgeConverter for FissionTrackData {
    /// Single-grain ages. Poisson counting errors: `var(Ns/Ni) = r² (1/Ns + 1/Ni)`,
    /// and a one-track error for grains without spontaneous tracks.
    fn ages(
        &self,
        consts: &Constants,
        _opts: &AgeOptions,
        params: &FitParams,
    ) -> Result<Vec<AgeEstimate>, GeochronError> {
        self.grains()
            .iter()
            .map(|g| {
                if g.ni == 0 {
                    return Err(GeochronError::InvalidParameter(
                        "grain without induced tracks has no finite age".into(),
                    ));
                }
                let (ns, ni) = (g.ns as f64, g.ni as f64);
                let r = ns / ni;
                let s_r = if g.ns == 0 {
                    1.0 / ni
                } else {
                    r * (1.0 / ns + 1.0 / ni).sqrt()
                };
                ft_age(r, s_r, self.zeta(), self.rho_d(), consts, params.exterr)
            })
            .collect()
    }
}

#[cfg(test)]
mod ft_test {
    use super::*;
    use crate::data::fissiontracks::TrackCounts;
    use approx::assert_relative_eq;

    #[test]
    fn test_ft_age_small_ratio_is_linear() {
        let consts = Constants::default();
        // for small λt the age is ~ g ζ ρ_D r
        let a = ft_age(0.01, 0.0, (300.0, 0.0), (1.0, 0.0), &consts, false).unwrap();
        assert_relative_eq!(a.t, 0.5 * 300.0 * 0.01, max_relative = 1e-3);
    }

    #[test]
    fn test_grain_ages() {
        let consts = Constants::default();
        let grains = vec![
            TrackCounts { ns: 30, ni: 60 },
            TrackCounts { ns: 0, ni: 12 },
        ];
        let d = FissionTrackData::new((350.0, 10.0), (1.2, 0.02), grains).unwrap();
        let ages = d.ages(&consts, &AgeOptions::default(), &FitParams::default()).unwrap();
        assert!(ages[0].t > 0.0 && ages[0].se > 0.0);
        assert_eq!(ages[1].t, 0.0);
        assert!(ages[1].se > 0.0);
        let params = FitParams::builder().exterr(true).build().unwrap();
        let ext = d.ages(&consts, &AgeOptions::default(), &params).unwrap();
        assert!(ext[0].se > ages[0].se);
    }
}
