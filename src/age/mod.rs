//! # Age converters
//!
//! Closed-form (or root-searched) transforms from isotopic ratios to ages, one per decay
//! scheme, with first-order (delta-method) error propagation.
//!
//! ## Contract
//!
//! Every converter builds the gradient of the age with respect to its measured inputs
//! and forms `gᵀ Σ g` from the aliquot covariance. With [`FitParams::exterr`] set, the
//! gradient is extended to the decay constants and calibration factors (J, ζ, ρ_D,
//! atmospheric ratios) and their variances are added.
//!
//! ## Units
//!
//! Ages are in Ma, except Th-U ages which are in ka (matching the decay constant units
//! of [`crate::constants`]).
//!
//! ## Dispatch
//!
//! [`AgeConverter`] is implemented by every scheme data type and by the closed
//! [`Dataset`] union, which forwards to the scheme implementation.
use crate::constants::Constants;
use crate::data::Dataset;
use crate::geochron_errors::GeochronError;
use crate::params::FitParams;

pub mod arar;
pub mod concordia;
pub mod fissiontracks;
pub mod pbpb;
pub mod pd;
pub mod thu;
pub mod uthhe;

/// An age with its standard error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeEstimate {
    pub t: f64,
    pub se: f64,
}

impl AgeEstimate {
    pub fn new(t: f64, se: f64) -> Self {
        AgeEstimate { t, se }
    }
}

/// Which U-Pb chronometer to use for single-aliquot ages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UPbAgeType {
    #[default]
    Pb206U238,
    Pb207U235,
    Pb207Pb206,
}

/// Common-Pb correction of single-aliquot Pb-Pb ages.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CommonPb {
    /// Ratios are taken as fully radiogenic.
    #[default]
    None,
    /// Two-stage Stacey & Kramers composition at the age of the aliquot.
    StaceyKramers,
    /// Fixed (Pb206/Pb204, Pb207/Pb204) composition.
    Given(f64, f64),
}

/// Options of the single-aliquot converters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AgeOptions {
    /// Parent–daughter systems: take the initial daughter ratio from the isochron
    /// intercept instead of assuming zero.
    pub i2i: bool,
    pub upb: UPbAgeType,
    pub common_pb: CommonPb,
}

/// Conversion of every aliquot of a dataset to an age.
pub trait AgeConverter {
    /// Ages of every aliquot. `params.exterr` adds the systematic uncertainties;
    /// converters that fit an isochron first (`i2i`) use `params` for it.
    fn ages(
        &self,
        consts: &Constants,
        opts: &AgeOptions,
        params: &FitParams,
    ) -> Result<Vec<AgeEstimate>, GeochronError>;
}

impl AgeConverter for Dataset {
    fn ages(
        &self,
        consts: &Constants,
        opts: &AgeOptions,
        params: &FitParams,
    ) -> Result<Vec<AgeEstimate>, GeochronError> {
        match self {
            Dataset::UPb(d) => d.ages(consts, opts, params),
            Dataset::PbPb(d) => d.ages(consts, opts, params),
            Dataset::ArAr(d) => d.ages(consts, opts, params),
            Dataset::ThU(d) => d.ages(consts, opts, params),
            Dataset::ReOs(d) | Dataset::SmNd(d) | Dataset::RbSr(d) | Dataset::LuHf(d) => {
                d.ages(consts, opts, params)
            }
            Dataset::UThHe(d) => d.ages(consts, opts, params),
            Dataset::FissionTracks(d) => d.ages(consts, opts, params),
        }
    }
}

/// `ln(1 + r) / lambda` with its standard error.
///
/// Shared by every system whose daughter/parent ratio grows as `exp(λt) − 1`.
pub(crate) fn simple_age(
    r: f64,
    s_r: f64,
    lambda: (f64, f64),
    exterr: bool,
) -> Result<AgeEstimate, GeochronError> {
    if !(r > -1.0) {
        return Err(GeochronError::InvalidParameter(format!(
            "daughter/parent ratio must exceed -1, got {r}"
        )));
    }
    let (l, s_l) = lambda;
    let t = r.ln_1p() / l;
    let dt_dr = 1.0 / (l * (1.0 + r));
    let mut var = (dt_dr * s_r).powi(2);
    if exterr {
        var += (t / l * s_l).powi(2);
    }
    Ok(AgeEstimate::new(t, var.sqrt()))
}
