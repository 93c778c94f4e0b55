//! # Physical constants for geochronology
//!
//! This module centralizes the **decay constants**, **reference isotopic ratios** and
//! miscellaneous calibration values consumed by the age converters and estimation engines.
//!
//! ## Overview
//!
//! - [`Constants`] – a read-only table of `(value, stderr)` pairs keyed by
//!   [`Category`] and name (nuclide or ratio).
//! - [`ConstantsStore`] – a process-wide, read-mostly handle that hands out cheap
//!   [`Arc`] snapshots of a [`Constants`] table and supports explicit hot-swapping.
//! - Fixed physical factors that are not user-configurable (alpha yields, abundances).
//!
//! Engines never read ambient global state: every public entry point takes a
//! `&Constants` argument, typically obtained once from [`ConstantsStore::snapshot`].
//!
//! ## Units
//!
//! | System                          | Age unit | Decay constant unit |
//! |---------------------------------|----------|---------------------|
//! | U-Pb, Pb-Pb, Ar-Ar, PD, He, FT  | Ma       | Ma⁻¹                |
//! | Th-U                            | ka       | ka⁻¹                |
//!
//! ## Serialization
//!
//! The table serializes as a nested map `{category: {name: [value, stderr]}}`, the
//! layout used by external settings files.
//!
//! ```rust
//! use geochron::constants::{Category, Constants};
//!
//! let mut consts = Constants::default();
//! let (lambda, s_lambda) = consts.get(Category::Lambda, "U238").unwrap();
//! assert!(lambda > 0.0 && s_lambda > 0.0);
//!
//! consts.set(Category::IRatio, "U238U235", 137.88, 0.0);
//! assert_eq!(consts.get(Category::IRatio, "U238U235").unwrap(), (137.88, 0.0));
//! ```
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::geochron_errors::GeochronError;

// -------------------------------------------------------------------------------------------------
// Fixed physical factors
// -------------------------------------------------------------------------------------------------

/// Number of alpha particles emitted along the U238 decay chain
pub const ALPHA_U238: f64 = 8.0;

/// Number of alpha particles emitted along the U235 decay chain
pub const ALPHA_U235: f64 = 7.0;

/// Number of alpha particles emitted along the Th232 decay chain
pub const ALPHA_TH232: f64 = 6.0;

/// Natural atomic abundance of Sm147 in samarium
pub const SM147_ABUNDANCE: f64 = 0.1499;

/// Geometry factor of the external detector method (4π/2π)
pub const EDM_GEOMETRY: f64 = 0.5;

/// Start of the first stage of the Stacey & Kramers (1975) common-Pb model (Ma)
pub const SK_T1: f64 = 4570.0;

/// Pb206/Pb204 at the start of the first Stacey & Kramers stage
pub const SK_PB206PB204_T1: f64 = 9.307;

/// Pb207/Pb204 at the start of the first Stacey & Kramers stage
pub const SK_PB207PB204_T1: f64 = 10.294;

/// U238/Pb204 (µ) of the first Stacey & Kramers stage
pub const SK_MU1: f64 = 7.192;

/// Start of the second stage of the Stacey & Kramers (1975) common-Pb model (Ma)
pub const SK_T0: f64 = 3700.0;

/// Pb206/Pb204 at the start of the second Stacey & Kramers stage
pub const SK_PB206PB204_T0: f64 = 11.152;

/// Pb207/Pb204 at the start of the second Stacey & Kramers stage
pub const SK_PB207PB204_T0: f64 = 12.998;

/// U238/Pb204 (µ) of the second Stacey & Kramers stage
pub const SK_MU: f64 = 9.74;

// -------------------------------------------------------------------------------------------------
// Constants table
// -------------------------------------------------------------------------------------------------

/// Category of a tabulated constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Decay constants, keyed by parent nuclide (e.g. `"U238"`, `"K40"`, `"fission"`).
    Lambda,
    /// Isotopic ratios, keyed by ratio name (e.g. `"U238U235"`, `"Ar40Ar36"`).
    IRatio,
    /// Other calibration values.
    Misc,
}

/// A tabulated value with its standard error.
pub type Entry = (f64, f64);

/// Table of physical constants used by the estimators.
///
/// Values are stored as `(value, stderr)` pairs. The [`Default`] implementation loads the
/// standard reference values:
///
/// * `Lambda`: U238, U235, Th232, Th230, U234, K40, Rb87, Re187, Sm147, Lu176, fission
/// * `IRatio`: U238U235, Ar40Ar36, U234U238 (secular equilibrium activity ratio)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constants {
    lambda: BTreeMap<String, Entry>,
    iratio: BTreeMap<String, Entry>,
    #[serde(default)]
    misc: BTreeMap<String, Entry>,
}

impl Default for Constants {
    fn default() -> Self {
        let lambda = [
            // Jaffey et al. (1971)
            ("U238", (1.55125e-4, 8.3e-8)),
            ("U235", (9.8485e-4, 6.7e-7)),
            // Le Roux & Glendenin (1963)
            ("Th232", (4.9475e-5, 1.7e-7)),
            // Cheng et al. (2013), per ka
            ("Th230", (9.1705e-3, 8.0e-6)),
            ("U234", (2.82206e-3, 5.4e-7)),
            // Steiger & Jäger (1977), total K40 decay
            ("K40", (5.543e-4, 1.0e-6)),
            // Villa et al. (2015)
            ("Rb87", (1.3972e-5, 4.5e-9)),
            // Smoliar et al. (1996)
            ("Re187", (1.666e-5, 2.6e-8)),
            // Lugmair & Marti (1978)
            ("Sm147", (6.524e-6, 2.4e-8)),
            // Söderlund et al. (2004)
            ("Lu176", (1.867e-5, 4.0e-8)),
            // spontaneous fission of U238
            ("fission", (8.46e-11, 6.0e-13)),
        ];
        let iratio = [
            // Hiess et al. (2012)
            ("U238U235", (137.818, 0.0225)),
            // Lee et al. (2006)
            ("Ar40Ar36", (298.56, 0.155)),
            ("U234U238", (1.0, 0.0)),
        ];
        let to_map = |entries: &[(&str, Entry)]| {
            entries
                .iter()
                .map(|(name, entry)| (name.to_string(), *entry))
                .collect::<BTreeMap<_, _>>()
        };
        Constants {
            lambda: to_map(&lambda),
            iratio: to_map(&iratio),
            misc: BTreeMap::new(),
        }
    }
}

impl Constants {
    /// Look up a constant.
    ///
    /// Arguments
    /// -----------------
    /// * `category`: the table to search.
    /// * `name`: nuclide or ratio name.
    ///
    /// Return
    /// ----------
    /// * `(value, stderr)` or [`GeochronError::UnknownConstant`].
    pub fn get(&self, category: Category, name: &str) -> Result<Entry, GeochronError> {
        self.table(category)
            .get(name)
            .copied()
            .ok_or_else(|| GeochronError::UnknownConstant {
                category,
                name: name.to_string(),
            })
    }

    /// Insert or overwrite a constant.
    pub fn set(&mut self, category: Category, name: &str, value: f64, stderr: f64) {
        let table = match category {
            Category::Lambda => &mut self.lambda,
            Category::IRatio => &mut self.iratio,
            Category::Misc => &mut self.misc,
        };
        table.insert(name.to_string(), (value, stderr));
    }

    /// Shorthand for `get(Category::Lambda, nuclide)`.
    pub fn lambda(&self, nuclide: &str) -> Result<Entry, GeochronError> {
        self.get(Category::Lambda, nuclide)
    }

    /// Shorthand for `get(Category::IRatio, ratio)`.
    pub fn iratio(&self, ratio: &str) -> Result<Entry, GeochronError> {
        self.get(Category::IRatio, ratio)
    }

    fn table(&self, category: Category) -> &BTreeMap<String, Entry> {
        match category {
            Category::Lambda => &self.lambda,
            Category::IRatio => &self.iratio,
            Category::Misc => &self.misc,
        }
    }
}

/// Process-wide, read-mostly handle on a [`Constants`] table.
///
/// Readers take a [`snapshot`](ConstantsStore::snapshot), an `Arc` that stays valid and
/// unchanged for the whole duration of an estimation even if the store is updated
/// concurrently. Writers replace the table atomically through
/// [`update`](ConstantsStore::update) or [`replace`](ConstantsStore::replace).
#[derive(Debug, Clone, Default)]
pub struct ConstantsStore {
    inner: Arc<RwLock<Arc<Constants>>>,
}

impl ConstantsStore {
    pub fn new(constants: Constants) -> Self {
        ConstantsStore {
            inner: Arc::new(RwLock::new(Arc::new(constants))),
        }
    }

    /// Current table. A poisoned lock still yields the last written table.
    pub fn snapshot(&self) -> Arc<Constants> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Copy-on-write update of the current table.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Constants),
    {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Constants::clone(&guard);
        f(&mut next);
        *guard = Arc::new(next);
    }

    /// Swap in a whole new table.
    pub fn replace(&self, constants: Constants) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(constants);
    }
}

#[cfg(test)]
mod constants_test {
    use super::*;

    #[test]
    fn test_default_lookup() {
        let consts = Constants::default();
        let (l8, s8) = consts.lambda("U238").unwrap();
        assert_eq!(l8, 1.55125e-4);
        assert!(s8 > 0.0);
        assert_eq!(consts.iratio("U238U235").unwrap().0, 137.818);
    }

    #[test]
    fn test_unknown_constant() {
        let consts = Constants::default();
        assert_eq!(
            consts.get(Category::Lambda, "Xe129"),
            Err(GeochronError::UnknownConstant {
                category: Category::Lambda,
                name: "Xe129".into()
            })
        );
    }

    #[test]
    fn test_store_snapshot_is_isolated_from_updates() {
        let store = ConstantsStore::default();
        let before = store.snapshot();
        store.update(|c| c.set(Category::Lambda, "U238", 1.0, 0.1));
        let after = store.snapshot();
        assert_eq!(before.lambda("U238").unwrap().0, 1.55125e-4);
        assert_eq!(after.lambda("U238").unwrap(), (1.0, 0.1));
    }

    #[test]
    fn test_serialized_layout() {
        let consts = Constants::default();
        let json = serde_json::to_value(&consts).unwrap();
        let entry = &json["iratio"]["Ar40Ar36"];
        assert_eq!(entry[0].as_f64().unwrap(), 298.56);
        assert_eq!(entry[1].as_f64().unwrap(), 0.155);

        let back: Constants = serde_json::from_value(json).unwrap();
        assert_eq!(back, consts);
    }
}
