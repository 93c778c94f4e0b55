//! Statistical estimation core for radiometric geochronology.
//!
//! Parsed measurements enter as [`data::Dataset`]s, are turned into per-aliquot ages by
//! [`age::AgeConverter`], and are fitted by one of the engines: [`regression`] (York and
//! Titterington), [`ludwig`] (discordia), [`central`], [`peakfit`] and
//! [`weighted_mean`]. Decay constants come from an explicitly passed
//! [`constants::Constants`] table; iteration caps and confidence levels from
//! [`params::FitParams`].
pub mod age;
pub mod central;
pub mod constants;
pub mod covariance;
pub mod data;
pub mod geochron_errors;
pub mod ludwig;
pub mod numerics;
pub mod params;
pub mod peakfit;
pub mod regression;
pub mod stats;
pub mod weighted_mean;
