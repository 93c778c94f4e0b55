//! # Goodness-of-fit statistics
//!
//! Every estimation engine reports its fit quality through a [`FitStats`] value:
//! the chi-square statistic, the degrees of freedom, the MSWD (reduced chi-square)
//! and the p-value of the chi-square test.
//!
//! Confidence intervals are obtained by scaling standard errors with a Student-t
//! quantile ([`FitStats::t_factor`]); for analytical-only models whose MSWD is
//! significantly larger than one, the interval is further inflated by √MSWD
//! ([`FitStats::ci`]).
use std::f64::consts::{PI, SQRT_2};

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};
use statrs::function::erf::erfc;

use crate::geochron_errors::GeochronError;

/// Error model of the engines that can absorb excess scatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorModel {
    /// Model 1: analytical uncertainties only.
    #[default]
    Analytical,
    /// Model 2: equal weights.
    Unweighted,
    /// Model 3: analytical uncertainties plus an overdispersion term solved so that
    /// the MSWD equals one.
    Overdispersed,
}

/// Chi-square goodness-of-fit summary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitStats {
    pub chi2: f64,
    pub df: usize,
    /// `chi2 / df`, NaN when `df == 0`.
    pub mswd: f64,
    /// Upper tail probability of `chi2` under a chi-square distribution, NaN when `df == 0`.
    pub p_value: f64,
}

impl FitStats {
    pub fn new(chi2: f64, df: usize) -> Self {
        if df == 0 || !chi2.is_finite() {
            return FitStats {
                chi2,
                df,
                mswd: f64::NAN,
                p_value: f64::NAN,
            };
        }
        FitStats {
            chi2,
            df,
            mswd: chi2 / df as f64,
            p_value: chi2_sf(chi2, df),
        }
    }

    /// Two-sided Student-t multiplier for a `1 - alpha` confidence interval.
    ///
    /// Falls back to the normal quantile when `df == 0`.
    pub fn t_factor(&self, alpha: f64) -> Result<f64, GeochronError> {
        t_quantile(1.0 - alpha / 2.0, self.df)
    }

    /// Half-width of the `1 - alpha` confidence interval of a parameter with standard
    /// error `se`.
    ///
    /// When `overdispersion_accounted` is false and the fit fails the chi-square test
    /// at level `alpha`, the interval is inflated by √MSWD.
    pub fn ci(
        &self,
        se: f64,
        alpha: f64,
        overdispersion_accounted: bool,
    ) -> Result<f64, GeochronError> {
        let mut half = self.t_factor(alpha)? * se;
        if !overdispersion_accounted && self.p_value < alpha && self.mswd > 1.0 {
            half *= self.mswd.sqrt();
        }
        Ok(half)
    }
}

/// Survival function of the chi-square distribution.
pub fn chi2_sf(x: f64, df: usize) -> f64 {
    if df == 0 || x.is_nan() {
        return f64::NAN;
    }
    match ChiSquared::new(df as f64) {
        Ok(dist) => dist.sf(x.max(0.0)),
        Err(_) => f64::NAN,
    }
}

/// Quantile of Student's t distribution with `df` degrees of freedom.
///
/// `df == 0` is treated as infinite degrees of freedom (standard normal).
pub fn t_quantile(p: f64, df: usize) -> Result<f64, GeochronError> {
    if !(p > 0.0 && p < 1.0) {
        return Err(GeochronError::InvalidParameter(format!(
            "quantile probability must lie in (0,1), got {p}"
        )));
    }
    if df == 0 {
        let dist = Normal::new(0.0, 1.0)
            .map_err(|e| GeochronError::StatisticsError(e.to_string()))?;
        return Ok(dist.inverse_cdf(p));
    }
    let dist = StudentsT::new(0.0, 1.0, df as f64)
        .map_err(|e| GeochronError::StatisticsError(e.to_string()))?;
    Ok(dist.inverse_cdf(p))
}

/// Standard normal cumulative distribution function.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Standard normal density.
pub fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Logarithm of the standard normal density.
pub fn normal_ln_pdf(x: f64) -> f64 {
    -0.5 * x * x - 0.5 * (2.0 * PI).ln()
}
