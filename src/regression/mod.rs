//! # Errors-in-variables regression
//!
//! - [`york`] – straight line through bivariate data with correlated errors.
//! - [`titterington`] – straight line through trivariate data (two dependent ordinates).
//! - [`isochron`] – York regressions in the ratio spaces of the parent–daughter, Ar-Ar
//!   and Pb-Pb systems, converted to ages.
pub mod isochron;
pub mod titterington;
pub mod york;

pub use titterington::{titterington, TitteringtonFit, TrivariateData};
pub use york::{york, YorkData, YorkFit};
