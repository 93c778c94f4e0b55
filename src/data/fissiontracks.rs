//! Fission-track counts, external detector method with zeta calibration.
use crate::geochron_errors::GeochronError;

/// Spontaneous and induced track counts of one grain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackCounts {
    pub ns: u32,
    pub ni: u32,
}

impl TrackCounts {
    pub fn total(&self) -> u64 {
        u64::from(self.ns) + u64::from(self.ni)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FissionTrackData {
    /// zeta calibration factor `(value, stderr)`
    zeta: (f64, f64),
    /// track density of the dosimeter glass `(value, stderr)`
    rho_d: (f64, f64),
    grains: Vec<TrackCounts>,
}

impl FissionTrackData {
    pub fn new(
        zeta: (f64, f64),
        rho_d: (f64, f64),
        grains: Vec<TrackCounts>,
    ) -> Result<Self, GeochronError> {
        if grains.is_empty() {
            return Err(GeochronError::EmptyDataset(1));
        }
        if !(zeta.0 > 0.0 && rho_d.0 > 0.0) {
            return Err(GeochronError::InvalidParameter(
                "zeta and rho_D must be positive".into(),
            ));
        }
        if grains.iter().any(|g| g.total() == 0) {
            return Err(GeochronError::InvalidParameter(
                "every grain needs at least one track".into(),
            ));
        }
        Ok(FissionTrackData {
            zeta,
            rho_d,
            grains,
        })
    }

    pub fn zeta(&self) -> (f64, f64) {
        self.zeta
    }

    pub fn rho_d(&self) -> (f64, f64) {
        self.rho_d
    }

    pub fn grains(&self) -> &[TrackCounts] {
        &self.grains
    }

    pub fn len(&self) -> usize {
        self.grains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grains.is_empty()
    }
}

#[cfg(test)]
mod fissiontracks_data_test {
    use super::*;

    #[test]
    fn test_total_does_not_overflow() {
        let g = TrackCounts {
            ns: u32::MAX,
            ni: u32::MAX,
        };
        assert_eq!(g.total(), 2 * u64::from(u32::MAX));
    }

    #[test]
    fn test_grain_without_tracks_rejected() {
        let grains = vec![TrackCounts { ns: 3, ni: 4 }, TrackCounts { ns: 0, ni: 0 }];
        assert!(FissionTrackData::new((350.0, 10.0), (1.0e6, 1.0e4), grains).is_err());
    }
}
