//! Plateau ages of step-heating experiments.
use log::debug;

use super::{weighted_mean, MeanOptions, WeightedMean};
use crate::geochron_errors::GeochronError;
use crate::params::FitParams;
use crate::stats::chi2_sf;

/// Minimum number of contiguous steps of a plateau.
pub const MIN_STEPS: usize = 3;

/// A plateau: the steps `first..=last` and their weighted mean.
#[derive(Debug, Clone, PartialEq)]
pub struct Plateau {
    pub first: usize,
    pub last: usize,
    /// Summed step weight of the plateau.
    pub weight: f64,
    pub mean: WeightedMean,
}

/// Select the plateau among ordered steps.
///
/// Every run of at least [`MIN_STEPS`] contiguous steps whose inverse-variance mean
/// passes the chi-square test at level `alpha` qualifies; the run with the largest
/// summed `step_weights` (one per step by default, i.e. the longest run) wins, the
/// earliest on ties.
///
/// Return
/// ----------
/// * `None` when no run qualifies.
pub fn plateau(
    values: &[f64],
    errors: &[f64],
    step_weights: Option<&[f64]>,
    params: &FitParams,
) -> Result<Option<Plateau>, GeochronError> {
    let n = values.len();
    if errors.len() != n {
        return Err(GeochronError::LengthMismatch {
            expected: n,
            found: errors.len(),
        });
    }
    if let Some(w) = step_weights {
        if w.len() != n {
            return Err(GeochronError::LengthMismatch {
                expected: n,
                found: w.len(),
            });
        }
    }
    if errors.iter().any(|e| !(*e > 0.0 && e.is_finite())) {
        return Err(GeochronError::InvalidParameter(
            "plateau needs positive, finite errors".into(),
        ));
    }
    let weight = |i: usize| step_weights.map_or(1.0, |w| w[i]);

    let mut best: Option<(usize, usize, f64)> = None;
    for first in 0..n {
        let (mut sw, mut swx, mut swx2) = (0.0, 0.0, 0.0);
        let mut total = 0.0;
        for last in first..n {
            let w = 1.0 / (errors[last] * errors[last]);
            sw += w;
            swx += w * values[last];
            swx2 += w * values[last] * values[last];
            total += weight(last);
            let len = last - first + 1;
            if len < MIN_STEPS {
                continue;
            }
            let chi2 = (swx2 - swx * swx / sw).max(0.0);
            if chi2_sf(chi2, len - 1) < params.alpha {
                continue;
            }
            if best.map_or(true, |(_, _, b)| total > b) {
                best = Some((first, last, total));
            }
        }
    }

    let Some((first, last, total)) = best else {
        debug!("no plateau found among {n} steps");
        return Ok(None);
    };
    debug!("plateau over steps {first}..={last}");
    let mean = weighted_mean(
        &values[first..=last],
        &errors[first..=last],
        &MeanOptions::default(),
        params,
    )?;
    Ok(Some(Plateau {
        first,
        last,
        weight: total,
        mean,
    }))
}
