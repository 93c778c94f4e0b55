//! # Ludwig discordia regression
//!
//! Maximum-likelihood fit of a common-Pb discordia to an ensemble of U-Pb aliquots,
//! after Ludwig (1998). The model and its concentrated misfit are described in
//! [`model`]; this module drives the optimisation and picks a covariance estimate.
//!
//! ## Variance models
//!
//! | [`ErrorModel`] | Weights | Extra parameter |
//! |--------------------|---------|-----------------|
//! | `Analytical` | inverse analytical covariance | – |
//! | `Unweighted` | unit weights, U238/Pb206 held fixed | residual variance |
//! | `Overdispersed` | analytical + `w²` on Pb207/Pb206 | `w`, solved so that MSWD = 1 |
//!
//! ## Covariance
//!
//! The analytical Fisher information with the mixing fractions eliminated by a Schur
//! complement is tried first; if it is singular the numerical Hessian of the misfit
//! is inverted instead. [`DiscordiaFit::covariance_method`] records which one was used.
//!
//! ## References
//!
//! * Ludwig, K. R. (1998). On the treatment of concordant uranium-lead ages.
//!   *Geochimica et Cosmochimica Acta*, 62(4), 665–676.
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use crate::age::AgeEstimate;
use crate::constants::Constants;
use crate::data::upb::UPbData;
use crate::geochron_errors::GeochronError;
use crate::numerics::optimizer::minimize;
use crate::numerics::solve_overdispersion;
use crate::params::FitParams;
use crate::stats::{ErrorModel, FitStats};

mod fisher;
mod init;
pub(crate) mod model;

use fisher::{fisher_covariance, hessian_covariance};
use model::{DecayConstants, Problem};

/// How the parameter covariance was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CovarianceMethod {
    Fisher,
    NumericalHessian,
}

/// Result of a discordia fit.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscordiaFit {
    /// `(t, Pb207/Pb206₀)` or `(t, Pb206/Pb204₀, Pb207/Pb204₀)`
    pub par: DVector<f64>,
    pub cov: DMatrix<f64>,
    pub stats: FitStats,
    pub model: ErrorModel,
    /// Overdispersion of Pb207/Pb206, for [`ErrorModel::Overdispersed`].
    pub w: Option<f64>,
    /// Common-Pb fraction of every aliquot at the optimum.
    pub fractions: Vec<f64>,
    pub covariance_method: CovarianceMethod,
}

impl DiscordiaFit {
    pub fn age(&self) -> AgeEstimate {
        AgeEstimate::new(self.par[0], self.cov[(0, 0)].sqrt())
    }

    pub fn se(&self) -> DVector<f64> {
        self.cov.diagonal().map(f64::sqrt)
    }

    /// Confidence half-widths of the parameters.
    pub fn ci(&self, alpha: f64) -> Result<DVector<f64>, GeochronError> {
        let accounted = self.model != ErrorModel::Analytical;
        let half = self
            .se()
            .iter()
            .map(|se| self.stats.ci(*se, alpha, accounted))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DVector::from_vec(half))
    }
}

fn problem(data: &UPbData, consts: &Constants) -> Result<Problem, GeochronError> {
    let (l8, s8) = consts.lambda("U238")?;
    let (l5, s5) = consts.lambda("U235")?;
    let (u85, _) = consts.iratio("U238U235")?;
    let dims = if data.format().has_pb204() { 3 } else { 2 };
    let mut obs = Vec::with_capacity(data.len());
    let mut cov = Vec::with_capacity(data.len());
    for i in 0..data.len() {
        if dims == 2 {
            let (x, c) = data.tera_wasserburg(i, u85)?;
            obs.push(DVector::from_column_slice(x.as_slice()));
            cov.push(DMatrix::from_column_slice(2, 2, c.as_slice()));
        } else {
            let (x, c) = data.tera_wasserburg3(i, u85)?;
            obs.push(DVector::from_column_slice(x.as_slice()));
            cov.push(DMatrix::from_column_slice(3, 3, c.as_slice()));
        }
    }
    Ok(Problem {
        dims,
        obs,
        cov,
        dc: DecayConstants {
            l8,
            s8,
            l5,
            s5,
            u85,
        },
    })
}

/// Minimise `misfit` over log-parameters, starting from `start`.
fn optimise<F>(misfit: F, start: &[f64], max_iter: u64) -> Result<(Vec<f64>, f64), GeochronError>
where
    F: Fn(&[f64]) -> f64,
{
    let objective = |x: &[f64]| {
        let par: Vec<f64> = x.iter().map(|v| v.exp()).collect();
        misfit(&par)
    };
    let x0: Vec<f64> = start.iter().map(|v| v.ln()).collect();
    let m = minimize(&objective, &x0, max_iter)?;
    debug!(
        "discordia misfit {} after {} {} iterations",
        m.cost, m.iterations, m.method
    );
    Ok((m.x.iter().map(|v| v.exp()).collect(), m.cost))
}

fn omegas(problem: &Problem, w: f64) -> Result<Vec<DMatrix<f64>>, GeochronError> {
    problem
        .omegas(w)
        .ok_or(GeochronError::SingularMatrix("aliquot covariance"))
}

/// Analytical covariance, falling back to the numerical Hessian.
fn weighted_covariance(
    problem: &Problem,
    par: &[f64],
    omegas: &[DMatrix<f64>],
    exterr: bool,
) -> Result<(DMatrix<f64>, CovarianceMethod), GeochronError> {
    if let Some(cov) = fisher_covariance(problem, par, omegas, exterr) {
        return Ok((cov, CovarianceMethod::Fisher));
    }
    warn!("singular Fisher information; falling back to the numerical Hessian");
    hessian_covariance(
        problem,
        par,
        |theta, k8, k5| problem.misfit(theta, omegas, k8, k5),
        1.0,
        exterr,
    )
    .map(|cov| (cov, CovarianceMethod::NumericalHessian))
    .ok_or_else(|| GeochronError::NotConverged("discordia information matrix is singular".into()))
}

/// Fit a discordia line (2-D) or plane (3-D, Pb204-bearing formats) to U-Pb data.
///
/// Arguments
/// -----------------
/// * `data`: at least two aliquots, in any U-Pb format.
/// * `consts`: U238 and U235 decay constants and the U238/U235 ratio.
/// * `model`: the variance model.
/// * `params`: `optim_max_iter` caps the optimiser, `exterr` adds the decay constant
///   uncertainties to the covariance.
///
/// Return
/// ----------
/// * A [`DiscordiaFit`] with `n − 2` (2-D) or `2n − 2` (3-D) degrees of freedom.
pub fn discordia(
    data: &UPbData,
    consts: &Constants,
    model: ErrorModel,
    params: &FitParams,
) -> Result<DiscordiaFit, GeochronError> {
    if data.len() < 2 {
        return Err(GeochronError::EmptyDataset(2));
    }
    let problem = problem(data, consts)?;
    let start = init::initial_guess(&problem, consts, params)?;
    let df = problem.df();

    match model {
        ErrorModel::Analytical => {
            let om = omegas(&problem, 0.0)?;
            let (par, _) = optimise(
                |p| problem.misfit(p, &om, 1.0, 1.0),
                &start,
                params.optim_max_iter,
            )?;
            let (fractions, s) = problem.profile(&par, &om, 1.0, 1.0);
            let (cov, method) = weighted_covariance(&problem, &par, &om, params.exterr)?;
            Ok(DiscordiaFit {
                par: DVector::from_vec(par),
                cov,
                stats: FitStats::new(s, df),
                model,
                w: None,
                fractions,
                covariance_method: method,
            })
        }
        ErrorModel::Overdispersed => {
            let om = omegas(&problem, 0.0)?;
            let (first, _) = optimise(
                |p| problem.misfit(p, &om, 1.0, 1.0),
                &start,
                params.optim_max_iter,
            )?;
            let w = if df == 0 {
                warn!("no degrees of freedom left to estimate the overdispersion");
                0.0
            } else {
                let excess = |w: f64| {
                    let Ok(om) = omegas(&problem, w) else {
                        return f64::NAN;
                    };
                    match optimise(
                        |p| problem.misfit(p, &om, 1.0, 1.0),
                        &first,
                        params.optim_max_iter,
                    ) {
                        Ok((_, s)) => s / df as f64 - 1.0,
                        Err(_) => f64::NAN,
                    }
                };
                let guess = (problem.cov.iter().map(|c| c[(1, 1)]).sum::<f64>()
                    / problem.len() as f64)
                    .sqrt();
                solve_overdispersion(excess, guess)?
            };
            debug!("discordia overdispersion w = {w}");
            let om = omegas(&problem, w)?;
            let (par, _) = optimise(
                |p| problem.misfit(p, &om, 1.0, 1.0),
                &first,
                params.optim_max_iter,
            )?;
            let (fractions, s) = problem.profile(&par, &om, 1.0, 1.0);
            let (cov, method) = weighted_covariance(&problem, &par, &om, params.exterr)?;
            Ok(DiscordiaFit {
                par: DVector::from_vec(par),
                cov,
                stats: FitStats::new(s, df),
                model,
                w: Some(w),
                fractions,
                covariance_method: method,
            })
        }
        ErrorModel::Unweighted => {
            if df == 0 {
                return Err(GeochronError::EmptyDataset(if problem.dims == 2 { 3 } else { 2 }));
            }
            let (par, s) = optimise(
                |p| problem.misfit_fixed_x(p, 1.0, 1.0),
                &start,
                params.optim_max_iter,
            )?;
            let fractions = problem
                .obs
                .iter()
                .map(|o| 1.0 - o[0] * (par[0] * problem.dc.l8).exp_m1())
                .collect();
            let sigma2 = s / df as f64;
            let cov = if sigma2 > 0.0 {
                hessian_covariance(
                    &problem,
                    &par,
                    |theta, k8, k5| problem.misfit_fixed_x(theta, k8, k5),
                    sigma2,
                    params.exterr,
                )
                .ok_or_else(|| GeochronError::NotConverged("discordia Hessian is singular".into()))?
            } else {
                warn!("unweighted discordia fits the data exactly; covariance is zero");
                DMatrix::zeros(par.len(), par.len())
            };
            Ok(DiscordiaFit {
                par: DVector::from_vec(par),
                cov,
                stats: FitStats::new(s, df),
                model,
                w: None,
                fractions,
                covariance_method: CovarianceMethod::NumericalHessian,
            })
        }
    }
}
