//! # Weighted means
//!
//! Mean of `(value, error)` pairs under the three [`ErrorModel`]s, with optional
//! Chauvenet outlier rejection and an optional systematic error, plus the
//! [`plateau`] selection of step-heating ages.
//!
//! ## Outlier rejection
//!
//! While more than two points remain, the point with the smallest two-sided tail
//! probability
//!
//! ```text
//! p_i = 2 (1 − Φ(|x_i − μ| / σ_i))
//! ```
//!
//! is rejected if `p_i · n < 0.5`, and the mean is recomputed. `σ_i` is the analytical
//! error inflated by √MSWD when MSWD > 1 (model 1), the sample standard deviation
//! (model 2), or the analytical error with the overdispersion added (model 3).
use log::debug;

use crate::geochron_errors::GeochronError;
use crate::numerics::solve_overdispersion;
use crate::params::FitParams;
use crate::stats::{normal_cdf, ErrorModel, FitStats};

mod plateau;

pub use plateau::{plateau, Plateau};

/// Chauvenet threshold on `p · n`.
const CHAUVENET: f64 = 0.5;

/// Options of [`weighted_mean`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeanOptions {
    pub model: ErrorModel,
    pub reject_outliers: bool,
    /// External standard error of the mean, added in quadrature when `exterr` is set.
    pub systematic: f64,
}

/// Result of a weighted mean.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedMean {
    pub mean: f64,
    /// Standard error from the measurements (and overdispersion).
    pub se: f64,
    /// `se` with the systematic error added if `exterr` was set.
    pub se_total: f64,
    /// Overdispersion, for [`ErrorModel::Overdispersed`].
    pub disp: Option<f64>,
    pub stats: FitStats,
    pub model: ErrorModel,
    /// `false` for points rejected as outliers.
    pub valid: Vec<bool>,
}

impl WeightedMean {
    pub fn ci(&self, alpha: f64) -> Result<f64, GeochronError> {
        self.stats
            .ci(self.se_total, alpha, self.model != ErrorModel::Analytical)
    }

    /// Indices of the rejected points.
    pub fn outliers(&self) -> Vec<usize> {
        self.valid
            .iter()
            .enumerate()
            .filter(|(_, v)| !**v)
            .map(|(i, _)| i)
            .collect()
    }
}

struct Mean {
    mean: f64,
    se: f64,
    disp: Option<f64>,
    stats: FitStats,
}

fn inverse_variance(x: &[f64], s: &[f64], w2: f64) -> (f64, f64, f64) {
    let (sw, swx) = x
        .iter()
        .zip(s)
        .fold((0.0, 0.0), |(sw, swx), (xi, si)| {
            let w = 1.0 / (si * si + w2);
            (sw + w, swx + w * xi)
        });
    let mean = swx / sw;
    let chi2 = x
        .iter()
        .zip(s)
        .map(|(xi, si)| (xi - mean).powi(2) / (si * si + w2))
        .sum();
    (mean, 1.0 / sw.sqrt(), chi2)
}

fn sample_sd(x: &[f64], mean: f64) -> f64 {
    let n = x.len();
    if n < 2 {
        return 0.0;
    }
    (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
}

fn mean_of(x: &[f64], s: &[f64], model: ErrorModel) -> Result<Mean, GeochronError> {
    let df = x.len() - 1;
    Ok(match model {
        ErrorModel::Analytical => {
            let (mean, se, chi2) = inverse_variance(x, s, 0.0);
            Mean {
                mean,
                se,
                disp: None,
                stats: FitStats::new(chi2, df),
            }
        }
        ErrorModel::Unweighted => {
            let mean = x.iter().sum::<f64>() / x.len() as f64;
            let chi2 = x.iter().zip(s).map(|(xi, si)| ((xi - mean) / si).powi(2)).sum();
            Mean {
                mean,
                se: sample_sd(x, mean) / (x.len() as f64).sqrt(),
                disp: None,
                stats: FitStats::new(chi2, df),
            }
        }
        ErrorModel::Overdispersed => {
            let w = if df == 0 {
                0.0
            } else {
                let guess = sample_sd(x, x.iter().sum::<f64>() / x.len() as f64);
                solve_overdispersion(|w| inverse_variance(x, s, w * w).2 / df as f64 - 1.0, guess)?
            };
            let (mean, se, chi2) = inverse_variance(x, s, w * w);
            Mean {
                mean,
                se,
                disp: Some(w),
                stats: FitStats::new(chi2, df),
            }
        }
    })
}

/// Per-point standard deviation used by the outlier test.
fn spread(x: &[f64], s: &[f64], m: &Mean, model: ErrorModel) -> Vec<f64> {
    match model {
        ErrorModel::Analytical => {
            let k = if m.stats.mswd > 1.0 { m.stats.mswd.sqrt() } else { 1.0 };
            s.iter().map(|si| k * si).collect()
        }
        ErrorModel::Unweighted => vec![sample_sd(x, m.mean); x.len()],
        ErrorModel::Overdispersed => {
            let w = m.disp.unwrap_or(0.0);
            s.iter().map(|si| (si * si + w * w).sqrt()).collect()
        }
    }
}

/// Weighted mean of `values` with standard `errors`.
///
/// Arguments
/// -----------------
/// * `values`, `errors`: equally long, errors positive.
/// * `opts`: error model, outlier rejection and systematic error.
/// * `params`: `exterr` switches the systematic error on.
///
/// Return
/// ----------
/// * A [`WeightedMean`] over the retained points, with `n − 1` degrees of freedom.
pub fn weighted_mean(
    values: &[f64],
    errors: &[f64],
    opts: &MeanOptions,
    params: &FitParams,
) -> Result<WeightedMean, GeochronError> {
    if values.len() != errors.len() {
        return Err(GeochronError::LengthMismatch {
            expected: values.len(),
            found: errors.len(),
        });
    }
    if values.is_empty() {
        return Err(GeochronError::EmptyDataset(1));
    }
    if errors.iter().any(|e| !(*e > 0.0 && e.is_finite())) {
        return Err(GeochronError::InvalidParameter(
            "weighted mean needs positive, finite errors".into(),
        ));
    }

    let mut valid = vec![true; values.len()];
    let result = loop {
        let idx: Vec<usize> = (0..values.len()).filter(|i| valid[*i]).collect();
        let x: Vec<f64> = idx.iter().map(|i| values[*i]).collect();
        let s: Vec<f64> = idx.iter().map(|i| errors[*i]).collect();
        let m = mean_of(&x, &s, opts.model)?;
        if !opts.reject_outliers || idx.len() <= 2 {
            break m;
        }
        let sd = spread(&x, &s, &m, opts.model);
        let worst = x
            .iter()
            .zip(&sd)
            .map(|(xi, si)| 2.0 * (1.0 - normal_cdf((xi - m.mean).abs() / si)))
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1));
        match worst {
            Some((j, p)) if p * (idx.len() as f64) < CHAUVENET => {
                debug!("rejecting point {} (p = {p})", idx[j]);
                valid[idx[j]] = false;
            }
            _ => break m,
        }
    };

    let se_total = if params.exterr {
        result.se.hypot(opts.systematic)
    } else {
        result.se
    };
    Ok(WeightedMean {
        mean: result.mean,
        se: result.se,
        se_total,
        disp: result.disp,
        stats: result.stats,
        model: opts.model,
        valid,
    })
}
