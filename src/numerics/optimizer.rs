//! Minimisation through `argmin`.
//!
//! The estimation engines express their objectives as plain closures over `&[f64]`.
//! [`ClosureProblem`] bridges such a closure to `argmin`'s [`CostFunction`] and
//! [`Gradient`] traits (finite-difference gradient via `finitediff`), and
//! [`minimize`] runs L-BFGS with a More–Thuente line search, falling back to
//! Nelder–Mead when the quasi-Newton run fails or ends on a non-finite cost.
//! [`minimize_scalar`] wraps Brent's method for one-dimensional problems.
use argmin::core::{CostFunction, Error, Executor, Gradient, State};
use argmin::solver::brent::BrentOpt;
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;
use finitediff::FiniteDiff;
use log::{debug, warn};

use crate::geochron_errors::GeochronError;

/// History length of the L-BFGS solver.
const LBFGS_MEMORY: usize = 7;

/// Cost reported to the simplex search in place of a non-finite objective value.
const SIMPLEX_PENALTY: f64 = 1e300;

/// Result of a multivariate minimisation.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub cost: f64,
    pub iterations: u64,
    pub method: &'static str,
}

/// Adapter exposing a closure as an `argmin` problem.
///
/// With `penalize` set, non-finite objective values are replaced by a large finite
/// penalty instead of aborting the run (used by the derivative-free fallback).
pub struct ClosureProblem<'a> {
    f: &'a dyn Fn(&[f64]) -> f64,
    penalize: bool,
}

impl<'a> ClosureProblem<'a> {
    pub fn new(f: &'a dyn Fn(&[f64]) -> f64) -> Self {
        ClosureProblem { f, penalize: false }
    }

    fn penalized(f: &'a dyn Fn(&[f64]) -> f64) -> Self {
        ClosureProblem { f, penalize: true }
    }
}

impl CostFunction for ClosureProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        let value = (self.f)(x.as_slice());
        if value.is_finite() {
            Ok(value)
        } else if self.penalize {
            Ok(SIMPLEX_PENALTY)
        } else {
            Err(Error::msg(format!("non-finite objective value {value}")))
        }
    }
}

impl Gradient for ClosureProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, x: &Self::Param) -> Result<Self::Gradient, Error> {
        let g = x.central_diff(&|p: &Vec<f64>| (self.f)(p.as_slice()));
        if g.iter().all(|v| v.is_finite()) {
            Ok(g)
        } else {
            Err(Error::msg("non-finite finite-difference gradient"))
        }
    }
}

/// Minimise `f` starting from `x0`.
///
/// Arguments
/// -----------------
/// * `f`: objective.
/// * `x0`: starting point, at which `f` must be finite.
/// * `max_iter`: iteration cap of each solver.
///
/// Return
/// ----------
/// * The best point found by L-BFGS, or by Nelder–Mead if L-BFGS failed or did not
///   improve on the starting point.
pub fn minimize(
    f: &dyn Fn(&[f64]) -> f64,
    x0: &[f64],
    max_iter: u64,
) -> Result<Minimum, GeochronError> {
    let f0 = f(x0);
    if !f0.is_finite() {
        return Err(GeochronError::InvalidParameter(format!(
            "objective is not finite at the starting point ({f0})"
        )));
    }
    match lbfgs(f, x0, max_iter) {
        Ok(m) if m.cost.is_finite() && m.cost <= f0 => {
            debug!("L-BFGS converged in {} iterations, cost {}", m.iterations, m.cost);
            Ok(m)
        }
        Ok(m) => {
            warn!("L-BFGS ended on cost {}; retrying with Nelder-Mead", m.cost);
            nelder_mead(f, x0, max_iter)
        }
        Err(e) => {
            warn!("L-BFGS failed ({e}); retrying with Nelder-Mead");
            nelder_mead(f, x0, max_iter)
        }
    }
}

fn lbfgs(f: &dyn Fn(&[f64]) -> f64, x0: &[f64], max_iter: u64) -> Result<Minimum, GeochronError> {
    let linesearch: MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64> = MoreThuenteLineSearch::new();
    let solver: LBFGS<_, Vec<f64>, Vec<f64>, f64> = LBFGS::new(linesearch, LBFGS_MEMORY)
        .with_tolerance_grad(1e-10)?
        .with_tolerance_cost(1e-14)?;
    let result = Executor::new(ClosureProblem::new(f), solver)
        .configure(|state| state.param(x0.to_vec()).max_iters(max_iter))
        .run()?;
    let state = result.state();
    let x = state
        .get_best_param()
        .cloned()
        .ok_or_else(|| GeochronError::OptimizerError("L-BFGS returned no parameters".into()))?;
    Ok(Minimum {
        x,
        cost: state.get_best_cost(),
        iterations: state.get_iter(),
        method: "L-BFGS",
    })
}

fn nelder_mead(
    f: &dyn Fn(&[f64]) -> f64,
    x0: &[f64],
    max_iter: u64,
) -> Result<Minimum, GeochronError> {
    let mut simplex = vec![x0.to_vec()];
    for i in 0..x0.len() {
        let mut vertex = x0.to_vec();
        vertex[i] += 0.05 * x0[i].abs().max(0.1);
        simplex.push(vertex);
    }
    let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex).with_sd_tolerance(1e-12)?;
    let result = Executor::new(ClosureProblem::penalized(f), solver)
        .configure(|state| state.max_iters(max_iter.saturating_mul(4)))
        .run()?;
    let state = result.state();
    let x = state
        .get_best_param()
        .cloned()
        .ok_or_else(|| GeochronError::OptimizerError("Nelder-Mead returned no parameters".into()))?;
    let cost = state.get_best_cost();
    if cost >= SIMPLEX_PENALTY {
        return Err(GeochronError::NotConverged(
            "no finite objective value found".into(),
        ));
    }
    Ok(Minimum {
        x,
        cost,
        iterations: state.get_iter(),
        method: "Nelder-Mead",
    })
}

struct ScalarProblem<'a> {
    f: &'a dyn Fn(f64) -> f64,
}

impl CostFunction for ScalarProblem<'_> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, x: &f64) -> Result<f64, Error> {
        let value = (self.f)(*x);
        if value.is_finite() {
            Ok(value)
        } else {
            Ok(SIMPLEX_PENALTY)
        }
    }
}

/// Minimise a univariate function on `[lo, hi]` with Brent's method.
pub fn minimize_scalar(
    f: &dyn Fn(f64) -> f64,
    lo: f64,
    hi: f64,
    max_iter: u64,
) -> Result<f64, GeochronError> {
    if !(lo < hi) {
        return Err(GeochronError::InvalidParameter(format!(
            "empty search interval [{lo}, {hi}]"
        )));
    }
    let solver = BrentOpt::new(lo, hi).set_tolerance(1e-10, 1e-12);
    let result = Executor::new(ScalarProblem { f }, solver)
        .configure(|state| state.max_iters(max_iter))
        .run()?;
    result
        .state()
        .get_best_param()
        .copied()
        .ok_or_else(|| GeochronError::OptimizerError("Brent returned no parameter".into()))
}

#[cfg(test)]
mod optimizer_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_minimize_rosenbrock() {
        let f = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let m = minimize(&f, &[-1.2, 1.0], 1000).unwrap();
        assert_relative_eq!(m.x[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(m.x[1], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_minimize_rejects_bad_start() {
        let f = |x: &[f64]| x[0].ln();
        assert!(minimize(&f, &[-1.0], 100).is_err());
    }

    #[test]
    fn test_minimize_scalar() {
        let f = |x: f64| (x - 2.5).powi(2) + 1.0;
        let x = minimize_scalar(&f, 0.0, 10.0, 200).unwrap();
        assert_relative_eq!(x, 2.5, epsilon = 1e-6);
    }
}
