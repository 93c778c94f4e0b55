//! # Estimation parameters
//!
//! This module defines [`FitParams`], the configuration shared by every estimation
//! engine, and its validating builder [`FitParamsBuilder`].
//!
//! ## Purpose
//!
//! All engines are iterative, and every loop has two exit conditions:
//!
//! - a **convergence tolerance** (primary exit),
//! - an **iteration cap** (safety bound). Reaching the cap is not an error: the last
//!   iterate is returned, a warning is logged, and the caller judges the fit from its
//!   MSWD and p-value.
//!
//! `FitParams` exposes both knobs for each loop together with the statistical options
//! common to all entry points (confidence level `alpha`, external error flag `exterr`).
//!
//! ## Example
//!
//! ```rust
//! use geochron::params::FitParams;
//!
//! let params = FitParams::builder()
//!     .alpha(0.01)
//!     .exterr(true)
//!     .em_max_iter(200)
//!     .build()
//!     .unwrap();
//! assert!(params.exterr);
//! ```
use crate::geochron_errors::GeochronError;

/// Configuration shared by the estimation engines.
///
/// Fields
/// -----------------
/// **Statistics**
/// * `alpha` – significance level of the confidence intervals and chi-square tests.
/// * `exterr` – fold decay-constant / calibration uncertainty into the reported errors.
///
/// **Regression (York, Titterington)**
/// * `max_iter`, `tol` – cap and relative slope-change tolerance of the reweighting loop.
///
/// **Central ages**
/// * `central_max_iter`, `central_tol` – cap and tolerance of the fixed-point loop
///   alternating the central value and the overdispersion.
///
/// **Mixture models**
/// * `em_max_iter`, `em_tol` – cap and tolerance (squared relative change of the
///   log-likelihood) of the EM loop.
/// * `max_peaks` – largest number of components tried by automatic model selection.
/// * `mam_grid_steps`, `mam_refinements` – grid resolution and number of zoom passes of
///   the minimum-age-model grid search.
///
/// **Multivariate optimisation**
/// * `optim_max_iter` – cap of the quasi-Newton (and fallback simplex) iterations.
///
/// Defaults
/// -----------------
/// * `alpha`: 0.05, `exterr`: false
/// * `max_iter`: 100, `tol`: 1e-15
/// * `central_max_iter`: 30, `central_tol`: 1e-12
/// * `em_max_iter`: 100, `em_tol`: 1e-20, `max_peaks`: 5
/// * `mam_grid_steps`: 40, `mam_refinements`: 4
/// * `optim_max_iter`: 500
#[derive(Debug, Clone, PartialEq)]
pub struct FitParams {
    pub alpha: f64,
    pub exterr: bool,

    pub max_iter: usize,
    pub tol: f64,

    pub central_max_iter: usize,
    pub central_tol: f64,

    pub em_max_iter: usize,
    pub em_tol: f64,
    pub max_peaks: usize,
    pub mam_grid_steps: usize,
    pub mam_refinements: usize,

    pub optim_max_iter: u64,
}

impl FitParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> FitParamsBuilder {
        FitParamsBuilder::new()
    }
}

impl Default for FitParams {
    fn default() -> Self {
        FitParams {
            alpha: 0.05,
            exterr: false,

            max_iter: 100,
            tol: 1e-15,

            central_max_iter: 30,
            central_tol: 1e-12,

            em_max_iter: 100,
            em_tol: 1e-20,
            max_peaks: 5,
            mam_grid_steps: 40,
            mam_refinements: 4,

            optim_max_iter: 500,
        }
    }
}

/// Builder for [`FitParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct FitParamsBuilder {
    params: FitParams,
}

impl FitParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: FitParams::default(),
        }
    }

    pub fn alpha(mut self, v: f64) -> Self {
        self.params.alpha = v;
        self
    }
    pub fn exterr(mut self, v: bool) -> Self {
        self.params.exterr = v;
        self
    }
    pub fn max_iter(mut self, v: usize) -> Self {
        self.params.max_iter = v;
        self
    }
    pub fn tol(mut self, v: f64) -> Self {
        self.params.tol = v;
        self
    }
    pub fn central_max_iter(mut self, v: usize) -> Self {
        self.params.central_max_iter = v;
        self
    }
    pub fn central_tol(mut self, v: f64) -> Self {
        self.params.central_tol = v;
        self
    }
    pub fn em_max_iter(mut self, v: usize) -> Self {
        self.params.em_max_iter = v;
        self
    }
    pub fn em_tol(mut self, v: f64) -> Self {
        self.params.em_tol = v;
        self
    }
    pub fn max_peaks(mut self, v: usize) -> Self {
        self.params.max_peaks = v;
        self
    }
    pub fn mam_grid_steps(mut self, v: usize) -> Self {
        self.params.mam_grid_steps = v;
        self
    }
    pub fn mam_refinements(mut self, v: usize) -> Self {
        self.params.mam_refinements = v;
        self
    }
    pub fn optim_max_iter(mut self, v: u64) -> Self {
        self.params.optim_max_iter = v;
        self
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * `0 < alpha < 1`
    /// * every iteration cap ≥ 1, `max_peaks` ≥ 1, `mam_grid_steps` ≥ 3
    /// * every tolerance finite and > 0
    pub fn build(self) -> Result<FitParams, GeochronError> {
        let p = &self.params;
        if !(p.alpha > 0.0 && p.alpha < 1.0) {
            return Err(GeochronError::InvalidParameter(format!(
                "alpha must lie in (0,1), got {}",
                p.alpha
            )));
        }
        let caps = [
            ("max_iter", p.max_iter),
            ("central_max_iter", p.central_max_iter),
            ("em_max_iter", p.em_max_iter),
            ("max_peaks", p.max_peaks),
            ("optim_max_iter", p.optim_max_iter as usize),
        ];
        if let Some((name, _)) = caps.iter().find(|(_, v)| *v == 0) {
            return Err(GeochronError::InvalidParameter(format!(
                "{name} must be at least 1"
            )));
        }
        if p.mam_grid_steps < 3 {
            return Err(GeochronError::InvalidParameter(
                "mam_grid_steps must be at least 3".into(),
            ));
        }
        let tols = [
            ("tol", p.tol),
            ("central_tol", p.central_tol),
            ("em_tol", p.em_tol),
        ];
        if let Some((name, v)) = tols.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return Err(GeochronError::InvalidParameter(format!(
                "{name} must be finite and positive, got {v}"
            )));
        }
        Ok(self.params)
    }
}

#[cfg(test)]
mod params_test {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let built = FitParams::builder().build().unwrap();
        assert_eq!(built, FitParams::default());
    }

    #[test]
    fn test_rejects_bad_alpha() {
        let err = FitParams::builder().alpha(1.5).build().unwrap_err();
        assert!(matches!(err, GeochronError::InvalidParameter(_)));
    }

    #[test]
    fn test_rejects_zero_cap() {
        let err = FitParams::builder().em_max_iter(0).build().unwrap_err();
        assert_eq!(
            err,
            GeochronError::InvalidParameter("em_max_iter must be at least 1".into())
        );
    }

    #[test]
    fn test_rejects_non_positive_tolerance() {
        assert!(FitParams::builder().central_tol(0.0).build().is_err());
        assert!(FitParams::builder().tol(f64::NAN).build().is_err());
    }
}
