//! Central U-Th-(Sm)-He age.
//!
//! Compositions are mapped to log-ratios `x = (ln U/He, ln Th/He[, ln Sm/He])`, their
//! mean `μ` is estimated by minimising `Σ (x_i − μ)ᵀ Ω_i (x_i − μ)` and the central age
//! is the age of the composition `(He, U, Th, Sm) = (1, e^μ₀, e^μ₁, e^μ₂)`.
use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::age::uthhe::uthhe_age;
use crate::age::AgeEstimate;
use crate::constants::Constants;
use crate::data::uthhe::UThHeData;
use crate::geochron_errors::GeochronError;
use crate::numerics::optimizer::minimize;
use crate::numerics::{invert_spd, solve_overdispersion};
use crate::params::FitParams;
use crate::stats::{ErrorModel, FitStats};

/// Central U-Th-He age and mean log-ratio composition.
#[derive(Debug, Clone, PartialEq)]
pub struct UThHeCentral {
    pub age: AgeEstimate,
    /// `(ln U/He, ln Th/He[, ln Sm/He])`
    pub mean: DVector<f64>,
    pub cov: DMatrix<f64>,
    pub stats: FitStats,
    pub model: ErrorModel,
    /// Logistic-normal dispersion, for [`ErrorModel::Overdispersed`].
    pub w: Option<f64>,
}

impl UThHeCentral {
    pub fn ci(&self, alpha: f64) -> Result<f64, GeochronError> {
        self.stats
            .ci(self.age.se, alpha, self.model != ErrorModel::Analytical)
    }
}

struct LogRatios {
    x: Vec<DVector<f64>>,
    cov: Vec<DMatrix<f64>>,
}

impl LogRatios {
    fn dim(&self) -> usize {
        self.x[0].len()
    }

    fn omegas(&self, w: f64) -> Result<Vec<DMatrix<f64>>, GeochronError> {
        self.cov
            .iter()
            .map(|c| {
                let mut c = c.clone();
                for k in 0..c.nrows() {
                    c[(k, k)] += w * w;
                }
                invert_spd(&c).ok_or(GeochronError::SingularMatrix("log-ratio covariance"))
            })
            .collect()
    }

    fn misfit(&self, mu: &DVector<f64>, omegas: &[DMatrix<f64>]) -> f64 {
        self.x
            .iter()
            .zip(omegas)
            .map(|(x, om)| {
                let d = x - mu;
                d.dot(&(om * &d))
            })
            .sum()
    }

    fn arithmetic_mean(&self) -> DVector<f64> {
        let mut m = DVector::zeros(self.dim());
        for x in &self.x {
            m += x;
        }
        m / self.x.len() as f64
    }

    /// Minimum-misfit mean and its covariance `(Σ Ω_i)⁻¹`.
    fn fit(
        &self,
        omegas: &[DMatrix<f64>],
        start: &DVector<f64>,
        max_iter: u64,
    ) -> Result<(DVector<f64>, DMatrix<f64>, f64), GeochronError> {
        let objective = |mu: &[f64]| self.misfit(&DVector::from_column_slice(mu), omegas);
        let m = minimize(&objective, start.as_slice(), max_iter)?;
        let mut info = DMatrix::zeros(self.dim(), self.dim());
        for om in omegas {
            info += om;
        }
        let cov = invert_spd(&info).ok_or(GeochronError::SingularMatrix("log-ratio information"))?;
        Ok((DVector::from_vec(m.x), cov, m.cost))
    }
}

impl UThHeData {
    /// Central age of the aliquots.
    ///
    /// Arguments
    /// -----------------
    /// * `consts`: decay constants and U238/U235.
    /// * `model`: [`ErrorModel::Analytical`] weights by the analytical covariances,
    ///   [`ErrorModel::Unweighted`] takes the arithmetic mean with the sample covariance,
    ///   [`ErrorModel::Overdispersed`] adds `w²` to every log-ratio variance.
    /// * `params`: `exterr` and `optim_max_iter`.
    ///
    /// Return
    /// ----------
    /// * A [`UThHeCentral`] with `2n − 2` (`3n − 3` with Sm) degrees of freedom.
    pub fn central_age(
        &self,
        consts: &Constants,
        model: ErrorModel,
        params: &FitParams,
    ) -> Result<UThHeCentral, GeochronError> {
        let (x, cov): (Vec<_>, Vec<_>) = (0..self.len())
            .map(|i| self.log_ratios(i))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .unzip();
        let lr = LogRatios { x, cov };
        let n = lr.x.len();
        let p = lr.dim();
        let df = p * (n - 1);
        let start = lr.arithmetic_mean();
        let analytical = lr.omegas(0.0)?;

        let (mean, mean_cov, chi2, w) = match model {
            ErrorModel::Analytical => {
                let (mu, c, s) = lr.fit(&analytical, &start, params.optim_max_iter)?;
                (mu, c, s, None)
            }
            ErrorModel::Unweighted => {
                if n < 2 {
                    return Err(GeochronError::EmptyDataset(2));
                }
                let mut c = DMatrix::zeros(p, p);
                for x in &lr.x {
                    let d = x - &start;
                    c += &d * d.transpose();
                }
                c /= ((n - 1) * n) as f64;
                let s = lr.misfit(&start, &analytical);
                (start, c, s, None)
            }
            ErrorModel::Overdispersed => {
                let (first, _, _) = lr.fit(&analytical, &start, params.optim_max_iter)?;
                let excess = |w: f64| match lr
                    .omegas(w)
                    .and_then(|om| lr.fit(&om, &first, params.optim_max_iter))
                {
                    Ok((_, _, s)) if df > 0 => s / df as f64 - 1.0,
                    _ => f64::NAN,
                };
                let guess = (lr.cov.iter().map(|c| c.trace()).sum::<f64>() / (n * p) as f64).sqrt();
                let w = if df > 0 { solve_overdispersion(excess, guess)? } else { 0.0 };
                debug!("U-Th-He dispersion w = {w}");
                let (mu, c, s) = lr.fit(&lr.omegas(w)?, &first, params.optim_max_iter)?;
                (mu, c, s, Some(w))
            }
        };

        // composition (He, U, Th[, Sm]) with He fixed at one
        let mut amounts = DVector::from_element(p + 1, 1.0);
        let mut jac = DMatrix::zeros(p + 1, p);
        for k in 0..p {
            amounts[k + 1] = mean[k].exp();
            jac[(k + 1, k)] = amounts[k + 1];
        }
        let amount_cov = &jac * &mean_cov * jac.transpose();
        let age = uthhe_age(&amounts, &amount_cov, consts, params.exterr)?;

        Ok(UThHeCentral {
            age,
            mean,
            cov: mean_cov,
            stats: FitStats::new(chi2, df),
            model,
            w,
        })
    }
}

#[cfg(test)]
mod uthhe_central_test {
    use super::*;
    use crate::data::uthhe::UThHeFormat;
    use crate::data::Aliquot;
    use approx::assert_relative_eq;

    fn data(scale: &[(f64, f64)]) -> UThHeData {
        let aliquots = scale
            .iter()
            .map(|&(ku, kth)| {
                let v = vec![1.0e-9, 2.0e-6 * ku, 5.0e-6 * kth];
                let e = v.iter().map(|x| 0.02 * x).collect();
                Aliquot::new(v, e, vec![0.0; 3]).unwrap()
            })
            .collect();
        UThHeData::new(UThHeFormat::UThHe, aliquots).unwrap()
    }

    #[test]
    fn test_identical_aliquots() {
        let d = data(&[(1.0, 1.0); 4]);
        let consts = Constants::default();
        let fit = d.central_age(&consts, ErrorModel::Analytical, &FitParams::default()).unwrap();
        let (x, c) = d.composition(0).unwrap();
        let single = uthhe_age(&x, &c, &consts, false).unwrap();
        assert_relative_eq!(fit.age.t, single.t, max_relative = 1e-6);
        assert!(fit.age.se < single.se);
        assert_eq!(fit.stats.df, 6);
        assert!(fit.stats.chi2 < 1e-10);
    }

    #[test]
    fn test_overdispersed_model_has_unit_mswd() {
        let d = data(&[(1.0, 1.0), (1.3, 0.8), (0.7, 1.2), (1.1, 1.4), (0.9, 0.7)]);
        let consts = Constants::default();
        let m1 = d.central_age(&consts, ErrorModel::Analytical, &FitParams::default()).unwrap();
        assert!(m1.stats.mswd > 1.0);
        let m3 = d.central_age(&consts, ErrorModel::Overdispersed, &FitParams::default()).unwrap();
        assert!(m3.w.unwrap() > 0.0);
        assert_relative_eq!(m3.stats.mswd, 1.0, epsilon = 1e-4);
        let m2 = d.central_age(&consts, ErrorModel::Unweighted, &FitParams::default()).unwrap();
        assert!(m2.age.t > 0.0 && m2.age.se > 0.0);
    }
}
