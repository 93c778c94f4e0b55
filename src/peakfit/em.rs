//! Expectation–maximisation for one-parameter mixture components.
//!
//! Each component `a` has a proportion `π_a` and a location parameter `θ_a`; the
//! observation models only need to supply a log-density, the weighted M-step, and
//! the first and second derivatives of the log-density in `θ`.
use itertools::Itertools;
use log::{debug, warn};
use nalgebra::DMatrix;
use statrs::function::gamma::ln_gamma;

use crate::geochron_errors::GeochronError;
use crate::numerics::{hessian, invert_spd, HESSIAN_STEP};
use crate::params::FitParams;
use crate::stats::normal_ln_pdf;

/// Observation model of a mixture.
pub(crate) trait Observations {
    fn len(&self) -> usize;

    /// Log-density of observation `i` under a component with parameter `par`.
    fn ln_density(&self, i: usize, par: f64) -> f64;

    /// First and second derivative of [`Observations::ln_density`] in `par`.
    fn score(&self, i: usize, par: f64) -> (f64, f64);

    /// Parameter maximising the `weights`-weighted log-likelihood.
    fn m_step(&self, weights: &[f64]) -> f64;

    /// Location of every observation on the parameter scale, used for seeding.
    fn locations(&self) -> Vec<f64>;
}

/// Normal observations `x_i ± s_i`; the parameter is the component mean.
pub(crate) struct Gaussian {
    pub x: Vec<f64>,
    pub s: Vec<f64>,
}

impl Observations for Gaussian {
    fn len(&self) -> usize {
        self.x.len()
    }

    fn ln_density(&self, i: usize, par: f64) -> f64 {
        normal_ln_pdf((self.x[i] - par) / self.s[i]) - self.s[i].ln()
    }

    fn score(&self, i: usize, par: f64) -> (f64, f64) {
        let v = self.s[i] * self.s[i];
        ((self.x[i] - par) / v, -1.0 / v)
    }

    fn m_step(&self, weights: &[f64]) -> f64 {
        let (num, den) = weights
            .iter()
            .zip(self.x.iter().zip(&self.s))
            .fold((0.0, 0.0), |(num, den), (w, (x, s))| {
                (num + w * x / (s * s), den + w / (s * s))
            });
        num / den
    }

    fn locations(&self) -> Vec<f64> {
        self.x.clone()
    }
}

/// Binomial spontaneous counts `ns_i` out of `m_i = ns_i + ni_i` tracks; the
/// parameter is the logit `β` of the success probability.
pub(crate) struct Binomial {
    pub ns: Vec<f64>,
    pub m: Vec<f64>,
    ln_choose: Vec<f64>,
}

impl Binomial {
    pub fn new(ns: Vec<f64>, m: Vec<f64>) -> Self {
        let ln_choose = ns
            .iter()
            .zip(&m)
            .map(|(k, n)| ln_gamma(n + 1.0) - ln_gamma(k + 1.0) - ln_gamma(n - k + 1.0))
            .collect();
        Binomial { ns, m, ln_choose }
    }
}

/// Bound on the fitted logit, `θ ∈ [1.4e-11, 1 − 1.4e-11]`.
const MAX_LOGIT: f64 = 25.0;

fn logistic(beta: f64) -> f64 {
    1.0 / (1.0 + (-beta).exp())
}

impl Observations for Binomial {
    fn len(&self) -> usize {
        self.ns.len()
    }

    fn ln_density(&self, i: usize, par: f64) -> f64 {
        // ln(1 + e^β) without overflow
        let softplus = par.max(0.0) + (-par.abs()).exp().ln_1p();
        let spontaneous = if self.ns[i] > 0.0 {
            self.ns[i] * par
        } else {
            0.0
        };
        self.ln_choose[i] + spontaneous - self.m[i] * softplus
    }

    fn score(&self, i: usize, par: f64) -> (f64, f64) {
        let theta = logistic(par);
        (
            self.ns[i] - self.m[i] * theta,
            -self.m[i] * theta * (1.0 - theta),
        )
    }

    fn m_step(&self, weights: &[f64]) -> f64 {
        let (k, n) = weights
            .iter()
            .zip(self.ns.iter().zip(&self.m))
            .fold((0.0, 0.0), |(k, n), (w, (ns, m))| (k + w * ns, n + w * m));
        // a component holding only Ns = 0 (or Ni = 0) grains sits on the boundary
        (k / (n - k)).ln().clamp(-MAX_LOGIT, MAX_LOGIT)
    }

    fn locations(&self) -> Vec<f64> {
        self.ns
            .iter()
            .zip(&self.m)
            .map(|(ns, m)| ((ns + 0.5) / (m - ns + 0.5)).ln())
            .collect()
    }
}

/// A fitted mixture.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Mixture {
    pub proportions: Vec<f64>,
    pub pars: Vec<f64>,
    /// Covariance of `(π_1 … π_{k−1}, θ_1 … θ_k)`.
    pub cov: DMatrix<f64>,
    pub loglik: f64,
    pub iterations: usize,
}

impl Mixture {
    pub fn k(&self) -> usize {
        self.pars.len()
    }

    /// Bayesian information criterion with `2k − 1` free parameters.
    pub fn bic(&self, n: usize) -> f64 {
        -2.0 * self.loglik + (2 * self.k() - 1) as f64 * (n as f64).ln()
    }

    pub fn se_par(&self, a: usize) -> f64 {
        let k = self.k();
        self.cov[(k - 1 + a, k - 1 + a)].sqrt()
    }

    /// Standard error of proportion `a`; the last one follows from the others.
    pub fn se_proportion(&self, a: usize) -> f64 {
        let k = self.k();
        if a + 1 < k {
            self.cov[(a, a)].sqrt()
        } else {
            self.cov.view((0, 0), (k - 1, k - 1)).sum().sqrt()
        }
    }
}

fn log_sum_exp(v: &[f64]) -> f64 {
    let m = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !m.is_finite() {
        return m;
    }
    m + v.iter().map(|x| (x - m).exp()).sum::<f64>().ln()
}

/// Posterior memberships `p[i][a]` and the log-likelihood.
fn e_step<O: Observations>(
    obs: &O,
    proportions: &[f64],
    pars: &[f64],
) -> (Vec<Vec<f64>>, f64) {
    let mut loglik = 0.0;
    let post = (0..obs.len())
        .map(|i| {
            let terms: Vec<f64> = proportions
                .iter()
                .zip(pars)
                .map(|(pi, par)| pi.ln() + obs.ln_density(i, *par))
                .collect();
            let lse = log_sum_exp(&terms);
            loglik += lse;
            terms.iter().map(|t| (t - lse).exp()).collect()
        })
        .collect();
    (post, loglik)
}

fn loglik<O: Observations>(obs: &O, proportions: &[f64], pars: &[f64]) -> f64 {
    e_step(obs, proportions, pars).1
}

/// Observed information of `(π_1 … π_{k−1}, θ_1 … θ_k)`, with `π_k = 1 − Σ π_a`.
fn information<O: Observations>(
    obs: &O,
    proportions: &[f64],
    pars: &[f64],
    post: &[Vec<f64>],
) -> DMatrix<f64> {
    let k = pars.len();
    let q = 2 * k - 1;
    let mut info = DMatrix::<f64>::zeros(q, q);
    let pk = proportions[k - 1];
    for (i, p) in post.iter().enumerate() {
        let (d, c): (Vec<f64>, Vec<f64>) = pars.iter().map(|par| obs.score(i, *par)).unzip();
        let g: Vec<f64> = (0..k - 1)
            .map(|a| p[a] / proportions[a] - p[k - 1] / pk)
            .collect();
        for a in 0..k - 1 {
            for b in 0..k - 1 {
                info[(a, b)] += g[a] * g[b];
            }
        }
        for a in 0..k {
            for b in 0..k {
                let mut h = -p[a] * p[b] * d[a] * d[b];
                if a == b {
                    h += p[a] * (c[a] + d[a] * d[a]);
                }
                info[(k - 1 + a, k - 1 + b)] -= h;
            }
        }
        for a in 0..k - 1 {
            for b in 0..k {
                let mut h = -g[a] * p[b] * d[b];
                if a == b {
                    h += p[b] / proportions[b] * d[b];
                }
                if b == k - 1 {
                    h -= p[k - 1] / pk * d[b];
                }
                info[(a, k - 1 + b)] -= h;
                info[(k - 1 + b, a)] -= h;
            }
        }
    }
    info
}

/// Evenly spaced quantiles of the observation locations.
fn seeds<O: Observations>(obs: &O, k: usize) -> Vec<f64> {
    let loc: Vec<f64> = obs
        .locations()
        .into_iter()
        .sorted_by(|a, b| a.total_cmp(b))
        .collect();
    let n = loc.len();
    (0..k)
        .map(|a| {
            let pos = ((a as f64 + 0.5) / k as f64 * n as f64).floor() as usize;
            loc[pos.min(n - 1)]
        })
        .collect()
}

/// Fit a `k`-component mixture by EM.
pub(crate) fn fit_mixture<O: Observations>(
    obs: &O,
    k: usize,
    params: &FitParams,
) -> Result<Mixture, GeochronError> {
    if k == 0 || k > obs.len() {
        return Err(GeochronError::InvalidComponentCount(k));
    }
    let n = obs.len();
    let mut pars = seeds(obs, k);
    let mut proportions = vec![1.0 / k as f64; k];
    let mut previous = f64::NAN;
    let mut iterations = 0;
    let mut converged = false;
    while iterations < params.em_max_iter {
        iterations += 1;
        let (post, ll) = e_step(obs, &proportions, &pars);
        for a in 0..k {
            let w: Vec<f64> = post.iter().map(|p| p[a]).collect();
            let total: f64 = w.iter().sum();
            proportions[a] = total / n as f64;
            // an empty component keeps its last location
            if total > 0.0 {
                pars[a] = obs.m_step(&w);
            }
        }
        if ((ll - previous) / ll).powi(2) < params.em_tol {
            converged = true;
            break;
        }
        previous = ll;
    }
    if converged {
        debug!("EM with {k} components converged in {iterations} iterations");
    } else {
        warn!("EM with {k} components reached {iterations} iterations without converging");
    }

    let (post, ll) = e_step(obs, &proportions, &pars);
    let info = information(obs, &proportions, &pars, &post);
    let cov = match invert_spd(&info) {
        Some(cov) => cov,
        None => {
            warn!("singular mixture information; falling back to the numerical Hessian");
            let negll = |x: &[f64]| {
                let mut pi: Vec<f64> = x[..k - 1].to_vec();
                pi.push(1.0 - pi.iter().sum::<f64>());
                -loglik(obs, &pi, &x[k - 1..])
            };
            let x0: Vec<f64> = proportions[..k - 1].iter().chain(&pars).cloned().collect();
            invert_spd(&hessian(&negll, &x0, HESSIAN_STEP))
                .ok_or(GeochronError::SingularMatrix("mixture information matrix"))?
        }
    };
    Ok(Mixture {
        proportions,
        pars,
        cov,
        loglik: ll,
        iterations,
    })
}

/// Fit `1, 2, …` components and stop at the first one whose BIC does not improve.
pub(crate) fn select_mixture<O: Observations>(
    obs: &O,
    params: &FitParams,
) -> Result<Mixture, GeochronError> {
    let n = obs.len();
    let mut best = fit_mixture(obs, 1, params)?;
    for k in 2..=params.max_peaks.min(n) {
        let next = match fit_mixture(obs, k, params) {
            Ok(m) => m,
            Err(e) => {
                debug!("stopping component search at k = {k}: {e}");
                break;
            }
        };
        if next.bic(n) >= best.bic(n) {
            break;
        }
        best = next;
    }
    debug!("selected {} components", best.k());
    Ok(best)
}

#[cfg(test)]
mod em_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_component_is_the_weighted_mean() {
        let obs = Gaussian {
            x: vec![1.0, 1.2, 0.9, 1.1],
            s: vec![0.1, 0.2, 0.1, 0.3],
        };
        let m = fit_mixture(&obs, 1, &FitParams::default()).unwrap();
        let w: Vec<f64> = obs.s.iter().map(|s| 1.0 / (s * s)).collect();
        let mean = w.iter().zip(&obs.x).map(|(w, x)| w * x).sum::<f64>() / w.iter().sum::<f64>();
        assert_relative_eq!(m.pars[0], mean, epsilon = 1e-12);
        assert_relative_eq!(m.se_par(0), 1.0 / w.iter().sum::<f64>().sqrt(), epsilon = 1e-12);
        assert_relative_eq!(m.proportions[0], 1.0);
    }

    #[test]
    fn test_analytical_information_matches_numerical_hessian() {
        let obs = Gaussian {
            x: vec![1.0, 1.1, 0.95, 2.0, 2.1, 1.9, 1.05],
            s: vec![0.1; 7],
        };
        let m = fit_mixture(&obs, 2, &FitParams::default()).unwrap();
        let (post, _) = e_step(&obs, &m.proportions, &m.pars);
        let info = information(&obs, &m.proportions, &m.pars, &post);
        let negll = |x: &[f64]| -loglik(&obs, &[x[0], 1.0 - x[0]], &x[1..]);
        let x0 = [m.proportions[0], m.pars[0], m.pars[1]];
        let num = hessian(&negll, &x0, 1e-5);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(
                    info[(i, j)],
                    num[(i, j)],
                    epsilon = 1e-2,
                    max_relative = 1e-3
                );
            }
        }
    }

    #[test]
    fn test_binomial_score() {
        let obs = Binomial::new(vec![12.0], vec![40.0]);
        let h = 1e-6;
        let (d, c) = obs.score(0, -0.7);
        let fd = (obs.ln_density(0, -0.7 + h) - obs.ln_density(0, -0.7 - h)) / (2.0 * h);
        assert_relative_eq!(d, fd, max_relative = 1e-6);
        let (dp, _) = obs.score(0, -0.7 + h);
        let (dm, _) = obs.score(0, -0.7 - h);
        assert_relative_eq!(c, (dp - dm) / (2.0 * h), max_relative = 1e-6);
        // M-step of a single observation is its own logit
        assert_relative_eq!(obs.m_step(&[1.0]), (12.0f64 / 28.0).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_binomial_boundary_stays_finite() {
        let obs = Binomial::new(vec![0.0, 0.0, 30.0], vec![20.0, 25.0, 30.0]);
        assert_eq!(obs.m_step(&[1.0, 1.0, 0.0]), -MAX_LOGIT);
        assert_eq!(obs.m_step(&[0.0, 0.0, 1.0]), MAX_LOGIT);
        for i in 0..3 {
            assert!(obs.ln_density(i, -MAX_LOGIT).is_finite());
            assert!(obs.ln_density(i, MAX_LOGIT).is_finite());
        }
    }

    #[test]
    fn test_rejects_bad_component_count() {
        let obs = Gaussian {
            x: vec![1.0, 2.0],
            s: vec![0.1, 0.1],
        };
        assert_eq!(
            fit_mixture(&obs, 0, &FitParams::default()).unwrap_err(),
            GeochronError::InvalidComponentCount(0)
        );
        assert!(fit_mixture(&obs, 3, &FitParams::default()).is_err());
    }
}
