//! # Peak fitting
//!
//! Decomposition of a set of single-aliquot ages into discrete components with finite
//! mixture models (Galbraith & Green 1990).
//!
//! - [`peakfit`] fits normal components to `(value, error)` pairs, optionally on the
//!   log scale.
//! - [`FissionTrackData::peakfit`] fits binomial components directly to the track
//!   counts.
//! - [`minimum_age`](minimum_age::minimum_age) fits the three-parameter minimum age
//!   model.
//!
//! The number of components is either fixed or chosen by BIC: `k = 1, 2, …` are fitted
//! in turn and the search stops at the first `k` that does not lower the BIC.
use crate::age::fissiontracks::ft_age;
use crate::age::AgeEstimate;
use crate::constants::Constants;
use crate::data::fissiontracks::FissionTrackData;
use crate::geochron_errors::GeochronError;
use crate::params::FitParams;

mod em;
pub mod minimum_age;

use em::{fit_mixture, select_mixture, Binomial, Gaussian, Mixture, Observations};

pub use minimum_age::{minimum_age, MinimumAgeFit};

/// Number of mixture components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Components {
    Fixed(usize),
    /// BIC hill-climb up to [`FitParams::max_peaks`].
    Auto,
}

/// One component of a fitted mixture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub age: AgeEstimate,
    pub proportion: f64,
    pub proportion_se: f64,
}

/// Result of a peak fit.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakFit {
    /// Components in increasing order of age.
    pub peaks: Vec<Peak>,
    pub loglik: f64,
    pub bic: f64,
    pub iterations: usize,
}

impl PeakFit {
    pub fn k(&self) -> usize {
        self.peaks.len()
    }
}

fn run<O: Observations>(
    obs: &O,
    k: Components,
    params: &FitParams,
) -> Result<Mixture, GeochronError> {
    match k {
        Components::Fixed(k) => fit_mixture(obs, k, params),
        Components::Auto => select_mixture(obs, params),
    }
}

fn assemble<F>(mix: &Mixture, n: usize, to_age: F) -> Result<PeakFit, GeochronError>
where
    F: Fn(f64, f64) -> Result<AgeEstimate, GeochronError>,
{
    let mut peaks = (0..mix.k())
        .map(|a| {
            Ok(Peak {
                age: to_age(mix.pars[a], mix.se_par(a))?,
                proportion: mix.proportions[a],
                proportion_se: mix.se_proportion(a),
            })
        })
        .collect::<Result<Vec<_>, GeochronError>>()?;
    peaks.sort_by(|a, b| a.age.t.total_cmp(&b.age.t));
    Ok(PeakFit {
        peaks,
        loglik: mix.loglik,
        bic: mix.bic(n),
        iterations: mix.iterations,
    })
}

/// Normal mixture of `(value, error)` pairs.
///
/// Arguments
/// -----------------
/// * `values`, `errors`: equally long; positive values if `log` is set.
/// * `k`: fixed number of components or [`Components::Auto`].
/// * `log`: fit on the log scale, so that component errors are relative.
/// * `params`: `em_max_iter`, `em_tol` and `max_peaks`.
pub fn peakfit(
    values: &[f64],
    errors: &[f64],
    k: Components,
    log: bool,
    params: &FitParams,
) -> Result<PeakFit, GeochronError> {
    if values.len() != errors.len() {
        return Err(GeochronError::LengthMismatch {
            expected: values.len(),
            found: errors.len(),
        });
    }
    if values.is_empty() {
        return Err(GeochronError::EmptyDataset(1));
    }
    if errors.iter().any(|e| !(*e > 0.0)) {
        return Err(GeochronError::InvalidParameter(
            "peak fitting needs positive errors".into(),
        ));
    }
    let obs = if log {
        if values.iter().any(|v| !(*v > 0.0)) {
            return Err(GeochronError::InvalidParameter(
                "log-scale peak fitting needs positive values".into(),
            ));
        }
        Gaussian {
            x: values.iter().map(|v| v.ln()).collect(),
            s: values.iter().zip(errors).map(|(v, e)| e / v).collect(),
        }
    } else {
        Gaussian {
            x: values.to_vec(),
            s: errors.to_vec(),
        }
    };
    let mix = run(&obs, k, params)?;
    assemble(&mix, obs.len(), |mu, se| {
        Ok(if log {
            AgeEstimate::new(mu.exp(), mu.exp() * se)
        } else {
            AgeEstimate::new(mu, se)
        })
    })
}

impl FissionTrackData {
    /// Binomial mixture of the track counts.
    pub fn peakfit(
        &self,
        k: Components,
        consts: &Constants,
        params: &FitParams,
    ) -> Result<PeakFit, GeochronError> {
        let obs = Binomial::new(
            self.grains().iter().map(|g| g.ns as f64).collect(),
            self.grains().iter().map(|g| g.total() as f64).collect(),
        );
        let mix = run(&obs, k, params)?;
        assemble(&mix, obs.len(), |beta, se| {
            let r = beta.exp();
            ft_age(r, r * se, self.zeta(), self.rho_d(), consts, params.exterr)
        })
    }
}

#[cfg(test)]
mod peakfit_test {
    use super::*;
    use crate::data::fissiontracks::TrackCounts;
    use approx::assert_relative_eq;

    #[test]
    fn test_two_populations_are_found() {
        let values = [10.0, 10.2, 9.9, 10.1, 9.8, 20.0, 20.3, 19.8, 20.1, 19.9];
        let errors = [0.2; 10];
        let fit = peakfit(&values, &errors, Components::Auto, true, &FitParams::default()).unwrap();
        assert_eq!(fit.k(), 2);
        assert_relative_eq!(fit.peaks[0].age.t, 10.0, max_relative = 0.01);
        assert_relative_eq!(fit.peaks[1].age.t, 20.0, max_relative = 0.01);
        assert_relative_eq!(fit.peaks[0].proportion, 0.5, epsilon = 1e-3);
        assert_relative_eq!(fit.peaks[0].proportion_se, fit.peaks[1].proportion_se, epsilon = 1e-9);
    }

    #[test]
    fn test_fission_track_peaks() {
        let grains = [(10, 100), (11, 98), (9, 105), (50, 100), (48, 95), (52, 103)]
            .iter()
            .map(|&(ns, ni)| TrackCounts { ns, ni })
            .collect();
        let d = FissionTrackData::new((350.0, 5.0), (1.0, 0.01), grains).unwrap();
        let fit = d
            .peakfit(Components::Fixed(2), &Constants::default(), &FitParams::default())
            .unwrap();
        assert_eq!(fit.k(), 2);
        assert!(fit.peaks[0].age.t < fit.peaks[1].age.t);
        assert_relative_eq!(fit.peaks[0].proportion, 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_grains_without_spontaneous_tracks() {
        let grains = [(0, 20), (0, 25), (0, 18), (0, 30), (30, 30), (28, 32), (31, 29)]
            .iter()
            .map(|&(ns, ni)| TrackCounts { ns, ni })
            .collect();
        let d = FissionTrackData::new((350.0, 5.0), (1.0, 0.01), grains).unwrap();
        let consts = Constants::default();
        let params = FitParams::default();

        let fit = d.peakfit(Components::Fixed(2), &consts, &params).unwrap();
        assert!(fit.loglik.is_finite());
        assert!(fit.peaks.iter().all(|p| p.age.t.is_finite() && p.age.se.is_finite()));
        assert!(fit.peaks[0].age.t < 1e-3 * fit.peaks[1].age.t);
        assert_relative_eq!(fit.peaks[0].proportion, 4.0 / 7.0, epsilon = 1e-3);
        assert!(fit.iterations < params.em_max_iter);

        let auto = d.peakfit(Components::Auto, &consts, &params).unwrap();
        assert!(auto.loglik.is_finite());
        assert!(auto.k() >= 1);
    }
}
