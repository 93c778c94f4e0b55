//! Starting values of the discordia fit.
use log::debug;
use nalgebra::{Matrix2, Vector2};

use super::model::Problem;
use crate::age::concordia::{stacey_kramers, MAX_AGE};
use crate::constants::Constants;
use crate::geochron_errors::GeochronError;
use crate::numerics::brent_root;
use crate::params::FitParams;
use crate::regression::york::{york, YorkData, YorkFit};

/// Geometric growth of the age grid scanned for the lower intercept.
const GRID_FACTOR: f64 = 1.25;

/// York regression of coordinate `k` on U238/Pb206.
fn york_on(problem: &Problem, k: usize, params: &FitParams) -> Option<YorkFit> {
    let points: Vec<_> = problem
        .obs
        .iter()
        .zip(&problem.cov)
        .map(|(o, c)| {
            (
                Vector2::new(o[0], o[k]),
                Matrix2::new(c[(0, 0)], c[(0, k)], c[(k, 0)], c[(k, k)]),
            )
        })
        .collect();
    let data = YorkData::from_points(&points).ok()?;
    york(&data, params).ok()
}

/// Youngest intersection of the line `y = a + b x` with the Tera-Wasserburg concordia.
fn lower_intercept(problem: &Problem, a: f64, b: f64) -> Option<f64> {
    let h = |t: f64| {
        let r = problem.dc.radiogenic(t, 1.0, 1.0);
        r.y - a - b * r.x
    };
    let mut lo = 1.0;
    let mut h_lo = h(lo);
    while lo < MAX_AGE {
        let hi = lo * GRID_FACTOR;
        let h_hi = h(hi);
        if h_lo * h_hi <= 0.0 {
            return brent_root(h, lo, hi, 1e-10, 200).ok();
        }
        lo = hi;
        h_lo = h_hi;
    }
    None
}

/// Mean Pb206/U238 age of the aliquots, ignoring common Pb.
fn mean_pb206u238_age(problem: &Problem) -> f64 {
    let sum: f64 = problem
        .obs
        .iter()
        .map(|o| (1.0 / o[0]).ln_1p() / problem.dc.l8)
        .sum();
    sum / problem.len() as f64
}

/// Initial `(t, a0[, b0])`.
///
/// The age is the lower intercept of a York line through the Tera-Wasserburg
/// coordinates, or the mean Pb206/U238 age if the line misses the concordia. The
/// common-Pb ratios come from the York intercepts when those are positive, and from
/// the Stacey–Kramers model otherwise.
pub(crate) fn initial_guess(
    problem: &Problem,
    consts: &Constants,
    params: &FitParams,
) -> Result<Vec<f64>, GeochronError> {
    let line = york_on(problem, 1, params);
    let t = line
        .as_ref()
        .and_then(|fit| lower_intercept(problem, fit.a, fit.b))
        .filter(|t| t.is_finite() && *t > 0.0)
        .unwrap_or_else(|| mean_pb206u238_age(problem));
    if !(t.is_finite() && t > 0.0) {
        return Err(GeochronError::InvalidParameter(
            "cannot find a starting age for the discordia fit".into(),
        ));
    }
    let (pb64, pb74) = stacey_kramers(t, consts)?;

    let guess = if problem.dims == 2 {
        let a0 = line.map(|fit| fit.a).filter(|a| *a > 0.0).unwrap_or(pb74 / pb64);
        vec![t, a0]
    } else {
        // Pb207/Pb206 intercept is b0/a0, Pb204/Pb206 intercept is 1/a0
        let ay = line.map(|fit| fit.a).filter(|a| *a > 0.0);
        let az = york_on(problem, 2, params).map(|fit| fit.a).filter(|a| *a > 0.0);
        match (ay, az) {
            (Some(ay), Some(az)) => vec![t, 1.0 / az, ay / az],
            _ => vec![t, pb64, pb74],
        }
    };
    debug!("discordia starting values {guess:?}");
    Ok(guess)
}
