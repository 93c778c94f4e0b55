//! Binomial central age of fission-track counts (Galbraith 2005).
//!
//! With `m_j = Ns_j + Ni_j`, the spontaneous count of grain `j` is binomial with a
//! success probability whose logit is normal with mean `β` and standard deviation `σ`.
//! The fixed-point iteration on `θ = e^β / (1 + e^β)` reads
//!
//! ```text
//! w_j = m_j / (θ(1 − θ) + (m_j − 1) θ² (1 − θ)² σ²)
//! θ   = Σ w_j Ns_j / m_j / Σ w_j
//! σ   = σ √(Σ w_j² (Ns_j / m_j − θ)² / Σ w_j)
//! ```
//!
//! The central track ratio is `θ / (1 − θ)`.
use log::{debug, warn};

use super::CentralFit;
use crate::age::fissiontracks::ft_age;
use crate::constants::Constants;
use crate::data::fissiontracks::FissionTrackData;
use crate::geochron_errors::GeochronError;
use crate::params::FitParams;
use crate::stats::FitStats;

/// Initial value of σ relative to the spread of the log track ratios.
const SIGMA_START: f64 = 0.6;

/// Galbraith's chi-square statistic for the homogeneity of track counts.
pub fn chi2_counts(data: &FissionTrackData) -> f64 {
    let ns: f64 = data.grains().iter().map(|g| g.ns as f64).sum();
    let ni: f64 = data.grains().iter().map(|g| g.ni as f64).sum();
    data.grains()
        .iter()
        .map(|g| (g.ns as f64 * ni - g.ni as f64 * ns).powi(2) / g.total() as f64)
        .sum::<f64>()
        / (ns * ni)
}

impl FissionTrackData {
    /// Central age of the grains.
    ///
    /// Return
    /// ----------
    /// * A [`CentralFit`] whose `disp` is the relative overdispersion of the single
    ///   grain ages, with `n − 1` degrees of freedom for the count chi-square.
    pub fn central_age(
        &self,
        consts: &Constants,
        params: &FitParams,
    ) -> Result<CentralFit, GeochronError> {
        let grains = self.grains();
        let n = grains.len();
        let total_ns: u64 = grains.iter().map(|g| g.ns as u64).sum();
        let total_ni: u64 = grains.iter().map(|g| g.ni as u64).sum();
        if total_ns == 0 || total_ni == 0 {
            return Err(GeochronError::InvalidParameter(
                "central age needs both spontaneous and induced tracks".into(),
            ));
        }
        let m: Vec<f64> = grains.iter().map(|g| g.total() as f64).collect();
        let p: Vec<f64> = grains.iter().zip(&m).map(|(g, mj)| g.ns as f64 / mj).collect();

        let z: Vec<f64> = grains
            .iter()
            .map(|g| ((g.ns as f64 + 0.5) / (g.ni as f64 + 0.5)).ln())
            .collect();
        let zmean = z.iter().sum::<f64>() / n as f64;
        let ss = z.iter().map(|v| (v - zmean).powi(2)).sum::<f64>();
        let zsd = (ss / (n.max(2) - 1) as f64).sqrt();

        let mut theta = total_ns as f64 / (total_ns + total_ni) as f64;
        let mut sigma = SIGMA_START * zsd;
        let weights = |theta: f64, sigma: f64| -> Vec<f64> {
            let v = theta * (1.0 - theta);
            m.iter()
                .map(|mj| mj / (v + (mj - 1.0) * v * v * sigma * sigma))
                .collect()
        };

        let mut iterations = 0;
        let mut converged = false;
        while iterations < params.central_max_iter {
            iterations += 1;
            let w = weights(theta, sigma);
            let sw: f64 = w.iter().sum();
            let theta_new = w.iter().zip(&p).map(|(wj, pj)| wj * pj).sum::<f64>() / sw;
            let spread: f64 = w
                .iter()
                .zip(&p)
                .map(|(wj, pj)| (wj * (pj - theta_new)).powi(2))
                .sum();
            let sigma_new = sigma * (spread / sw).sqrt();
            let change = (theta_new - theta).abs() + (sigma_new - sigma).abs();
            theta = theta_new;
            sigma = sigma_new;
            if change < params.central_tol {
                converged = true;
                break;
            }
        }
        if converged {
            debug!("fission-track central age converged in {iterations} iterations, σ = {sigma}");
        } else {
            warn!("fission-track central age reached {iterations} iterations without converging");
        }

        let sw: f64 = weights(theta, sigma).iter().sum();
        let se_beta = 1.0 / (theta * (1.0 - theta) * sw.sqrt());
        let r = theta / (1.0 - theta);
        let age = ft_age(r, r * se_beta, self.zeta(), self.rho_d(), consts, params.exterr)?;
        Ok(CentralFit {
            t: age.t,
            se: age.se,
            disp: sigma,
            stats: FitStats::new(chi2_counts(self), n - 1),
            iterations,
        })
    }
}

#[cfg(test)]
mod ft_central_test {
    use super::*;
    use crate::data::fissiontracks::TrackCounts;
    use approx::assert_relative_eq;

    fn data(counts: &[(u32, u32)]) -> FissionTrackData {
        let grains = counts.iter().map(|&(ns, ni)| TrackCounts { ns, ni }).collect();
        FissionTrackData::new((350.0, 10.0), (1.0, 0.01), grains).unwrap()
    }

    #[test]
    fn test_identical_ratios_give_pooled_age() {
        let d = data(&[(20, 40), (30, 60), (10, 20), (25, 50)]);
        let consts = Constants::default();
        let fit = d.central_age(&consts, &FitParams::default()).unwrap();
        let pooled = ft_age(0.5, 0.0, d.zeta(), d.rho_d(), &consts, false).unwrap();
        assert_relative_eq!(fit.t, pooled.t, max_relative = 1e-9);
        assert!(fit.disp < 1e-6);
        assert_relative_eq!(fit.stats.chi2, 0.0, epsilon = 1e-12);
        assert_eq!(fit.stats.df, 3);
    }

    #[test]
    fn test_dispersed_counts() {
        let d = data(&[(5, 60), (40, 40), (12, 30), (60, 20), (8, 50)]);
        let fit = d.central_age(&Constants::default(), &FitParams::default()).unwrap();
        assert!(fit.disp > 0.3);
        assert!(fit.stats.p_value < 1e-3);
    }

    #[test]
    fn test_requires_tracks() {
        let d = data(&[(0, 10), (0, 5)]);
        assert!(d.central_age(&Constants::default(), &FitParams::default()).is_err());
    }
}
