//! Mixing model behind the discordia fit.
//!
//! Every aliquot is a mixture of a radiogenic end-member on the concordia and a
//! common-Pb end-member, in Tera-Wasserburg coordinates:
//!
//! ```text
//! 2-D: E_rad = (x_t, y_t)        E_com = (0, a0)
//! 3-D: E_rad = (x_t, y_t, 0)     E_com = (0, b0/a0, 1/a0)
//!
//! x_t = 1 / (e^{λ8 t} − 1)       y_t = (e^{λ5 t} − 1) / (U85 (e^{λ8 t} − 1))
//! ```
//!
//! with `a0 = Pb207/Pb206` (2-D) or `a0 = Pb206/Pb204`, `b0 = Pb207/Pb204` (3-D) of the
//! common component. The predicted composition of aliquot `i` is
//! `m_i = E_rad + f_i (E_com − E_rad)` where the mixing fraction `f_i` is a nuisance
//! parameter. For given end-members the optimal `f_i` is closed-form, which leaves the
//! concentrated misfit
//!
//! ```text
//! S_i = dᵀ Ω d − (gᵀ Ω d)² / (gᵀ Ω g),     d = obs − E_rad,  g = E_com − E_rad
//! ```
use nalgebra::{DMatrix, DVector};

/// Decay constants, their standard errors and U238/U235.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DecayConstants {
    pub l8: f64,
    pub s8: f64,
    pub l5: f64,
    pub s5: f64,
    pub u85: f64,
}

/// Radiogenic end-member and its partial derivatives.
pub(crate) struct Radiogenic {
    pub x: f64,
    pub y: f64,
    pub dx_dt: f64,
    pub dy_dt: f64,
    pub dx_dl8: f64,
    pub dy_dl8: f64,
    pub dy_dl5: f64,
}

impl DecayConstants {
    /// Concordia point at age `t`, with decay constants scaled by `(k8, k5)`.
    pub fn radiogenic(&self, t: f64, k8: f64, k5: f64) -> Radiogenic {
        let (l8, l5) = (self.l8 * k8, self.l5 * k5);
        let e8 = (l8 * t).exp();
        let e5 = (l5 * t).exp();
        let m8 = (l8 * t).exp_m1();
        let m5 = (l5 * t).exp_m1();
        let u = self.u85;
        Radiogenic {
            x: 1.0 / m8,
            y: m5 / (u * m8),
            dx_dt: -l8 * e8 / (m8 * m8),
            dy_dt: (l5 * e5 * m8 - m5 * l8 * e8) / (u * m8 * m8),
            dx_dl8: -t * e8 / (m8 * m8),
            dy_dl8: -m5 * t * e8 / (u * m8 * m8),
            dy_dl5: t * e5 / (u * m8),
        }
    }
}

/// Observations of one discordia problem.
#[derive(Debug, Clone)]
pub(crate) struct Problem {
    /// 2 or 3
    pub dims: usize,
    pub obs: Vec<DVector<f64>>,
    pub cov: Vec<DMatrix<f64>>,
    pub dc: DecayConstants,
}

impl Problem {
    pub fn len(&self) -> usize {
        self.obs.len()
    }

    /// Degrees of freedom of the fit.
    pub fn df(&self) -> usize {
        // Ludwig (1998) may differ by factor of two; left as is until validated
        if self.dims == 2 {
            self.len().saturating_sub(2)
        } else {
            (2 * self.len()).saturating_sub(2)
        }
    }

    /// End-members for parameters `(t, a0[, b0])` and decay constant scales.
    pub fn endmembers(&self, par: &[f64], k8: f64, k5: f64) -> (DVector<f64>, DVector<f64>) {
        let rad = self.dc.radiogenic(par[0], k8, k5);
        if self.dims == 2 {
            (
                DVector::from_vec(vec![rad.x, rad.y]),
                DVector::from_vec(vec![0.0, par[1]]),
            )
        } else {
            (
                DVector::from_vec(vec![rad.x, rad.y, 0.0]),
                DVector::from_vec(vec![0.0, par[2] / par[1], 1.0 / par[1]]),
            )
        }
    }

    /// Inverse covariance matrices, with `w²` added to the Pb207/Pb206 variance.
    pub fn omegas(&self, w: f64) -> Option<Vec<DMatrix<f64>>> {
        self.cov
            .iter()
            .map(|c| {
                let mut c = c.clone();
                c[(1, 1)] += w * w;
                crate::numerics::invert_spd(&c)
            })
            .collect()
    }

    /// Mixing fraction of every aliquot and the total concentrated misfit.
    pub fn profile(
        &self,
        par: &[f64],
        omegas: &[DMatrix<f64>],
        k8: f64,
        k5: f64,
    ) -> (Vec<f64>, f64) {
        let (rad, com) = self.endmembers(par, k8, k5);
        let g = &com - &rad;
        let mut fractions = Vec::with_capacity(self.len());
        let mut s = 0.0;
        for (obs, omega) in self.obs.iter().zip(omegas) {
            let d = obs - &rad;
            let og = omega * &g;
            let gog = g.dot(&og);
            let god = og.dot(&d);
            let dod = d.dot(&(omega * &d));
            fractions.push(god / gog);
            s += dod - god * god / gog;
        }
        (fractions, s)
    }

    /// Concentrated misfit `S`.
    pub fn misfit(&self, par: &[f64], omegas: &[DMatrix<f64>], k8: f64, k5: f64) -> f64 {
        self.profile(par, omegas, k8, k5).1
    }

    /// Unit-weight misfit with the U238/Pb206 ratios held fixed (unweighted model).
    pub fn misfit_fixed_x(&self, par: &[f64], k8: f64, k5: f64) -> f64 {
        let (rad, com) = self.endmembers(par, k8, k5);
        self.obs
            .iter()
            .map(|obs| {
                let f = 1.0 - obs[0] / rad[0];
                (1..self.dims)
                    .map(|k| (obs[k] - (rad[k] + f * (com[k] - rad[k]))).powi(2))
                    .sum::<f64>()
            })
            .sum()
    }
}

#[cfg(test)]
mod model_test {
    use super::*;
    use approx::assert_relative_eq;

    fn dc() -> DecayConstants {
        DecayConstants {
            l8: 1.55125e-4,
            s8: 8.3e-8,
            l5: 9.8485e-4,
            s5: 6.7e-7,
            u85: 137.818,
        }
    }

    #[test]
    fn test_radiogenic_derivatives() {
        let dc = dc();
        let r = dc.radiogenic(800.0, 1.0, 1.0);
        let h = 1e-3;
        let rp = dc.radiogenic(800.0 + h, 1.0, 1.0);
        let rm = dc.radiogenic(800.0 - h, 1.0, 1.0);
        assert_relative_eq!((rp.x - rm.x) / (2.0 * h), r.dx_dt, max_relative = 1e-6);
        assert_relative_eq!((rp.y - rm.y) / (2.0 * h), r.dy_dt, max_relative = 1e-6);

        let k = 1e-6;
        let rp = dc.radiogenic(800.0, 1.0 + k, 1.0);
        let rm = dc.radiogenic(800.0, 1.0 - k, 1.0);
        assert_relative_eq!((rp.x - rm.x) / (2.0 * k * dc.l8), r.dx_dl8, max_relative = 1e-5);
        assert_relative_eq!((rp.y - rm.y) / (2.0 * k * dc.l8), r.dy_dl8, max_relative = 1e-5);
        let rp = dc.radiogenic(800.0, 1.0, 1.0 + k);
        let rm = dc.radiogenic(800.0, 1.0, 1.0 - k);
        assert_relative_eq!((rp.y - rm.y) / (2.0 * k * dc.l5), r.dy_dl5, max_relative = 1e-5);
    }

    #[test]
    fn test_points_on_the_mixing_line_have_zero_misfit() {
        let dc = dc();
        let par = [600.0, 0.85];
        let rad = dc.radiogenic(600.0, 1.0, 1.0);
        let obs: Vec<DVector<f64>> = [0.1, 0.4, 0.7]
            .iter()
            .map(|f| DVector::from_vec(vec![(1.0 - f) * rad.x, rad.y + f * (0.85 - rad.y)]))
            .collect();
        let cov = vec![DMatrix::from_diagonal(&DVector::from_vec(vec![1e-2, 1e-6])); 3];
        let problem = Problem {
            dims: 2,
            obs,
            cov,
            dc,
        };
        let omegas = problem.omegas(0.0).unwrap();
        let (f, s) = problem.profile(&par, &omegas, 1.0, 1.0);
        assert!(s.abs() < 1e-12);
        assert_relative_eq!(f[1], 0.4, epsilon = 1e-9);
        assert!(problem.misfit_fixed_x(&par, 1.0, 1.0) < 1e-20);
        assert_eq!(problem.df(), 1);
    }
}
