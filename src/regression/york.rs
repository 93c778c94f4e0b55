//! York (2004) regression of bivariate data with correlated errors.
//!
//! The line `y = a + b x` is fitted by iterative reweighting: for the current slope,
//! each point gets the weight
//!
//! ```text
//! W_i = 1 / (sy_i² + b² sx_i² − 2 b r_i sx_i sy_i)
//! ```
//!
//! and an adjustment `β_i` moving it onto the line along its error ellipse; the slope is
//! re-estimated from the weighted, adjusted coordinates until its relative change drops
//! below [`FitParams::tol`].
//!
//! ## References
//!
//! * York, D., Evensen, N. M., Martinez, M. L., & De Basabe Delgado, J. (2004).
//!   Unified equations for the slope, intercept, and standard errors of the best
//!   straight line. *American Journal of Physics*, 72(3), 367–375.
use log::{debug, warn};
use nalgebra::{Matrix2, Vector2};

use crate::geochron_errors::GeochronError;
use crate::params::FitParams;
use crate::stats::FitStats;

/// Bivariate data with standard errors and error correlations.
#[derive(Debug, Clone, PartialEq)]
pub struct YorkData {
    pub x: Vec<f64>,
    pub sx: Vec<f64>,
    pub y: Vec<f64>,
    pub sy: Vec<f64>,
    pub rxy: Vec<f64>,
}

impl YorkData {
    pub fn new(
        x: Vec<f64>,
        sx: Vec<f64>,
        y: Vec<f64>,
        sy: Vec<f64>,
        rxy: Vec<f64>,
    ) -> Result<Self, GeochronError> {
        let n = x.len();
        for v in [&sx, &y, &sy, &rxy] {
            if v.len() != n {
                return Err(GeochronError::LengthMismatch {
                    expected: n,
                    found: v.len(),
                });
            }
        }
        if n < 2 {
            return Err(GeochronError::EmptyDataset(2));
        }
        Ok(YorkData { x, sx, y, sy, rxy })
    }

    /// Build from points and their 2×2 covariance matrices.
    pub fn from_points(points: &[(Vector2<f64>, Matrix2<f64>)]) -> Result<Self, GeochronError> {
        let mut x = Vec::with_capacity(points.len());
        let mut sx = Vec::with_capacity(points.len());
        let mut y = Vec::with_capacity(points.len());
        let mut sy = Vec::with_capacity(points.len());
        let mut rxy = Vec::with_capacity(points.len());
        for (p, c) in points {
            let (s0, s1) = (c[(0, 0)].sqrt(), c[(1, 1)].sqrt());
            x.push(p[0]);
            y.push(p[1]);
            sx.push(s0);
            sy.push(s1);
            rxy.push(if s0 > 0.0 && s1 > 0.0 {
                c[(0, 1)] / (s0 * s1)
            } else {
                0.0
            });
        }
        Self::new(x, sx, y, sy, rxy)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Result of a York regression.
#[derive(Debug, Clone, PartialEq)]
pub struct YorkFit {
    /// intercept
    pub a: f64,
    /// slope
    pub b: f64,
    /// covariance of `(a, b)`
    pub cov: Matrix2<f64>,
    pub stats: FitStats,
    pub iterations: usize,
}

impl YorkFit {
    pub fn se_a(&self) -> f64 {
        self.cov[(0, 0)].sqrt()
    }

    pub fn se_b(&self) -> f64 {
        self.cov[(1, 1)].sqrt()
    }

    /// Confidence half-widths of `(a, b)`, inflated by √MSWD when overdispersed.
    pub fn ci(&self, alpha: f64) -> Result<(f64, f64), GeochronError> {
        Ok((
            self.stats.ci(self.se_a(), alpha, false)?,
            self.stats.ci(self.se_b(), alpha, false)?,
        ))
    }
}

struct Weighted {
    w: Vec<f64>,
    xbar: f64,
    ybar: f64,
    beta: Vec<f64>,
}

fn weigh(d: &YorkData, b: f64) -> Weighted {
    let n = d.len();
    let w: Vec<f64> = (0..n)
        .map(|i| {
            1.0 / (d.sy[i].powi(2) + b * b * d.sx[i].powi(2)
                - 2.0 * b * d.rxy[i] * d.sx[i] * d.sy[i])
        })
        .collect();
    let sw: f64 = w.iter().sum();
    let xbar = (0..n).map(|i| w[i] * d.x[i]).sum::<f64>() / sw;
    let ybar = (0..n).map(|i| w[i] * d.y[i]).sum::<f64>() / sw;
    let beta = (0..n)
        .map(|i| {
            let u = d.x[i] - xbar;
            let v = d.y[i] - ybar;
            w[i] * (u * d.sy[i].powi(2) + b * v * d.sx[i].powi(2)
                - (b * u + v) * d.rxy[i] * d.sx[i] * d.sy[i])
        })
        .collect();
    Weighted {
        w,
        xbar,
        ybar,
        beta,
    }
}

/// Fit a straight line to `data`.
///
/// Arguments
/// -----------------
/// * `data`: the points, their standard errors and error correlations.
/// * `params`: `max_iter` and `tol` control the reweighting loop.
///
/// Return
/// ----------
/// * A [`YorkFit`] with `n − 2` degrees of freedom. Reaching `max_iter` is not an
///   error: the last slope is kept and a warning is logged.
pub fn york(data: &YorkData, params: &FitParams) -> Result<YorkFit, GeochronError> {
    let n = data.len();
    let mx = data.x.iter().sum::<f64>() / n as f64;
    let my = data.y.iter().sum::<f64>() / n as f64;
    let sxx: f64 = data.x.iter().map(|x| (x - mx).powi(2)).sum();
    if !(sxx > 0.0) {
        return Err(GeochronError::InvalidParameter(
            "York regression needs at least two distinct x values".into(),
        ));
    }
    let sxy: f64 = data
        .x
        .iter()
        .zip(&data.y)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum();
    let mut b = sxy / sxx;

    let mut iterations = 0;
    let mut converged = false;
    while iterations < params.max_iter {
        iterations += 1;
        let wt = weigh(data, b);
        let (num, den) = (0..n).fold((0.0, 0.0), |(num, den), i| {
            let v = data.y[i] - wt.ybar;
            let u = data.x[i] - wt.xbar;
            (num + wt.w[i] * wt.beta[i] * v, den + wt.w[i] * wt.beta[i] * u)
        });
        let b_new = num / den;
        if !b_new.is_finite() {
            return Err(GeochronError::NotConverged(
                "York slope became non-finite".into(),
            ));
        }
        let change = (b_new - b).abs();
        b = b_new;
        if change <= params.tol * b.abs() {
            converged = true;
            break;
        }
    }
    if converged {
        debug!("York regression converged in {iterations} iterations, slope {b}");
    } else {
        warn!("York regression reached {iterations} iterations without converging");
    }

    let wt = weigh(data, b);
    let a = wt.ybar - b * wt.xbar;
    let sw: f64 = wt.w.iter().sum();
    let xadj: Vec<f64> = wt.beta.iter().map(|be| wt.xbar + be).collect();
    let xm = (0..n).map(|i| wt.w[i] * xadj[i]).sum::<f64>() / sw;
    let swu2: f64 = (0..n).map(|i| wt.w[i] * (xadj[i] - xm).powi(2)).sum();
    let var_b = 1.0 / swu2;
    let var_a = 1.0 / sw + xm * xm * var_b;
    let cov_ab = -xm * var_b;

    let chi2: f64 = (0..n)
        .map(|i| wt.w[i] * (data.y[i] - b * data.x[i] - a).powi(2))
        .sum();

    Ok(YorkFit {
        a,
        b,
        cov: Matrix2::new(var_a, cov_ab, cov_ab, var_b),
        stats: FitStats::new(chi2, n - 2),
        iterations,
    })
}

#[cfg(test)]
mod york_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reduces_to_ols() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = vec![2.1, 3.9, 6.2, 7.8, 10.1, 12.2];
        let n = x.len();
        let data = YorkData::new(
            x.clone(),
            vec![1e-9; n],
            y.clone(),
            vec![0.1; n],
            vec![0.0; n],
        )
        .unwrap();
        let fit = york(&data, &FitParams::default()).unwrap();

        let mx = x.iter().sum::<f64>() / n as f64;
        let my = y.iter().sum::<f64>() / n as f64;
        let b_ols = x.iter().zip(&y).map(|(x, y)| (x - mx) * (y - my)).sum::<f64>()
            / x.iter().map(|x| (x - mx).powi(2)).sum::<f64>();
        let a_ols = my - b_ols * mx;
        assert_relative_eq!(fit.b, b_ols, max_relative = 1e-9);
        assert_relative_eq!(fit.a, a_ols, max_relative = 1e-9);
        assert_eq!(fit.stats.df, 4);
    }

    #[test]
    fn test_exact_line_has_zero_chi2() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|x| 0.5 + 2.0 * x).collect();
        let data = YorkData::new(x, vec![0.05; 4], y, vec![0.1; 4], vec![0.3; 4]).unwrap();
        let fit = york(&data, &FitParams::default()).unwrap();
        assert_relative_eq!(fit.a, 0.5, epsilon = 1e-12);
        assert_relative_eq!(fit.b, 2.0, epsilon = 1e-12);
        assert!(fit.stats.chi2 < 1e-20);
        assert!(fit.se_b() > 0.0);
    }

    #[test]
    fn test_rejects_degenerate_input() {
        assert!(YorkData::new(vec![1.0], vec![0.1], vec![1.0], vec![0.1], vec![0.0]).is_err());
        let data = YorkData::new(
            vec![1.0, 1.0],
            vec![0.1; 2],
            vec![1.0, 2.0],
            vec![0.1; 2],
            vec![0.0; 2],
        )
        .unwrap();
        assert!(york(&data, &FitParams::default()).is_err());
    }
}
