//! # Datasets
//!
//! Parsed isotopic measurements, as handed over by an ingestion layer.
//!
//! ## Overview
//!
//! - [`Aliquot`] – one analysis: a vector of measured quantities, their standard errors
//!   and the correlation coefficients between them. Immutable once built.
//! - One data type per decay scheme (e.g. [`upb::UPbData`], [`arar::ArArData`]), each a
//!   list of aliquots tagged with a format variant describing the column layout, plus
//!   any calibration metadata (J-factor, zeta, ρ_D).
//! - [`Dataset`] – closed tagged union over the supported schemes.
//!
//! Covariance matrices are never stored: the scheme types rebuild them per aliquot, in
//! whatever ratio basis an engine asks for (see [`crate::covariance`]).
use nalgebra::DMatrix;

use crate::covariance::{cor2cov, ratio_covariance, Overlap};
use crate::geochron_errors::GeochronError;

pub mod arar;
pub mod fissiontracks;
pub mod pbpb;
pub mod pd;
pub mod thu;
pub mod uthhe;
pub mod upb;

use arar::ArArData;
use fissiontracks::FissionTrackData;
use pbpb::PbPbData;
use pd::{PDData, PDSystem};
use thu::ThUData;
use upb::UPbData;
use uthhe::UThHeData;

/// One measured specimen.
///
/// `correlations` holds the strict upper triangle of the correlation matrix in
/// row-major order (`[r12]` for two quantities, `[r12, r13, r23]` for three).
#[derive(Debug, Clone, PartialEq)]
pub struct Aliquot {
    values: Vec<f64>,
    errors: Vec<f64>,
    correlations: Vec<f64>,
}

impl Aliquot {
    /// Build an aliquot, checking that the three vectors fit together.
    pub fn new(
        values: Vec<f64>,
        errors: Vec<f64>,
        correlations: Vec<f64>,
    ) -> Result<Self, GeochronError> {
        if errors.len() != values.len() {
            return Err(GeochronError::LengthMismatch {
                expected: values.len(),
                found: errors.len(),
            });
        }
        let p = values.len();
        let n_rho = p * p.saturating_sub(1) / 2;
        if correlations.len() != n_rho {
            return Err(GeochronError::LengthMismatch {
                expected: n_rho,
                found: correlations.len(),
            });
        }
        Ok(Aliquot {
            values,
            errors,
            correlations,
        })
    }

    /// Aliquot without error correlations.
    pub fn uncorrelated(values: Vec<f64>, errors: Vec<f64>) -> Result<Self, GeochronError> {
        let p = values.len();
        Self::new(values, errors, vec![0.0; p * p.saturating_sub(1) / 2])
    }

    /// Two-ratio aliquot whose error correlation is implied by a third ratio.
    ///
    /// Arguments
    /// -----------------
    /// * `pattern`: how `a` and `b` share a nuclide.
    /// * `a`, `b`: the stored ratios as `(value, stderr)`.
    /// * `c`: the ratio closing the triangle, as `(value, stderr)`. Only its relative
    ///   error matters, so a ratio that differs from `X/Y` by a constant factor (e.g.
    ///   Pb207/U235 for U238/Pb207) may be passed.
    ///
    /// Return
    /// ----------
    /// * The aliquot `[a, b]`, or [`GeochronError::InvalidParameter`] if the three
    ///   errors are not mutually consistent (implied `|ρ| > 1`).
    pub fn from_ratio_pair(
        pattern: Overlap,
        a: (f64, f64),
        b: (f64, f64),
        c: (f64, f64),
    ) -> Result<Self, GeochronError> {
        if !(a.1 > 0.0 && b.1 > 0.0) {
            return Err(GeochronError::InvalidParameter(
                "ratio errors must be positive".into(),
            ));
        }
        let rho = ratio_covariance(pattern, a, b, c) / (a.1 * b.1);
        if !(rho.abs() <= 1.0) {
            return Err(GeochronError::InvalidParameter(format!(
                "ratio errors imply a correlation of {rho}"
            )));
        }
        Self::new(vec![a.0, b.0], vec![a.1, b.1], vec![rho])
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    pub fn correlations(&self) -> &[f64] {
        &self.correlations
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Covariance matrix of the stored quantities.
    pub fn covariance(&self) -> Result<DMatrix<f64>, GeochronError> {
        cor2cov(&self.errors, &self.correlations)
    }
}

/// Check that every aliquot of a dataset carries `width` quantities and that there are
/// at least `min` aliquots.
pub(crate) fn check_aliquots(
    aliquots: &[Aliquot],
    width: usize,
    min: usize,
) -> Result<(), GeochronError> {
    if aliquots.len() < min {
        return Err(GeochronError::EmptyDataset(min));
    }
    if let Some(bad) = aliquots.iter().find(|a| a.len() != width) {
        return Err(GeochronError::LengthMismatch {
            expected: width,
            found: bad.len(),
        });
    }
    Ok(())
}

/// Decay scheme tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    UPb,
    PbPb,
    ArAr,
    ThU,
    ReOs,
    SmNd,
    RbSr,
    LuHf,
    UThHe,
    FissionTracks,
}

/// A dataset of one of the supported decay schemes.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    UPb(UPbData),
    PbPb(PbPbData),
    ArAr(ArArData),
    ThU(ThUData),
    ReOs(PDData),
    SmNd(PDData),
    RbSr(PDData),
    LuHf(PDData),
    UThHe(UThHeData),
    FissionTracks(FissionTrackData),
}

impl Dataset {
    pub fn scheme(&self) -> Scheme {
        match self {
            Dataset::UPb(_) => Scheme::UPb,
            Dataset::PbPb(_) => Scheme::PbPb,
            Dataset::ArAr(_) => Scheme::ArAr,
            Dataset::ThU(_) => Scheme::ThU,
            Dataset::ReOs(_) => Scheme::ReOs,
            Dataset::SmNd(_) => Scheme::SmNd,
            Dataset::RbSr(_) => Scheme::RbSr,
            Dataset::LuHf(_) => Scheme::LuHf,
            Dataset::UThHe(_) => Scheme::UThHe,
            Dataset::FissionTracks(_) => Scheme::FissionTracks,
        }
    }

    /// Number of aliquots.
    pub fn len(&self) -> usize {
        match self {
            Dataset::UPb(d) => d.len(),
            Dataset::PbPb(d) => d.len(),
            Dataset::ArAr(d) => d.len(),
            Dataset::ThU(d) => d.len(),
            Dataset::ReOs(d) | Dataset::SmNd(d) | Dataset::RbSr(d) | Dataset::LuHf(d) => d.len(),
            Dataset::UThHe(d) => d.len(),
            Dataset::FissionTracks(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<PDData> for Dataset {
    fn from(data: PDData) -> Self {
        match data.system() {
            PDSystem::ReOs => Dataset::ReOs(data),
            PDSystem::SmNd => Dataset::SmNd(data),
            PDSystem::RbSr => Dataset::RbSr(data),
            PDSystem::LuHf => Dataset::LuHf(data),
        }
    }
}

#[cfg(test)]
mod data_test {
    use super::*;

    #[test]
    fn test_aliquot_validation() {
        assert!(Aliquot::new(vec![1.0, 2.0], vec![0.1, 0.2], vec![0.5]).is_ok());
        assert_eq!(
            Aliquot::new(vec![1.0, 2.0, 3.0], vec![0.1, 0.2, 0.3], vec![0.5]),
            Err(GeochronError::LengthMismatch {
                expected: 3,
                found: 1
            })
        );
        assert!(Aliquot::new(vec![1.0], vec![], vec![]).is_err());
    }

    #[test]
    fn test_aliquot_covariance() {
        let a = Aliquot::new(vec![1.0, 2.0], vec![0.1, 0.2], vec![0.5]).unwrap();
        let cov = a.covariance().unwrap();
        assert_eq!(cov[(0, 1)], cov[(1, 0)]);
        assert_eq!(cov[(1, 1)], 0.2 * 0.2);
    }

    #[test]
    fn test_pd_dataset_dispatch() {
        let a = Aliquot::new(vec![1.0, 0.71], vec![0.01, 0.001], vec![0.0]).unwrap();
        let data = PDData::new(PDSystem::RbSr, pd::PDFormat::Normal, vec![a]).unwrap();
        let ds = Dataset::from(data);
        assert_eq!(ds.scheme(), Scheme::RbSr);
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_ratio_pair_correlation() {
        // independent X, Y, Z with 1 % errors: ρ(X/Z, Y/Z) = 1/2
        let r = 0.01 * 2f64.sqrt();
        let a = Aliquot::from_ratio_pair(
            Overlap::XzYz,
            (2.0, 2.0 * r),
            (3.0, 3.0 * r),
            (2.0 / 3.0, 2.0 / 3.0 * r),
        )
        .unwrap();
        approx::assert_relative_eq!(a.correlations()[0], 0.5, epsilon = 1e-12);
        assert_eq!(a.values(), &[2.0, 3.0]);

        // a closing ratio far more precise than both pair members is impossible
        assert!(Aliquot::from_ratio_pair(
            Overlap::XzZy,
            (2.0, 0.2),
            (3.0, 0.0003),
            (2.0, 0.0002)
        )
        .is_err());
    }
}
