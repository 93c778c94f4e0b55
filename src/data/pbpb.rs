//! Pb-Pb data, normalised to Pb204 ("normal") or to Pb206 ("inverse").
use nalgebra::{DMatrix, DVector, Matrix2, Vector2};

use super::{check_aliquots, Aliquot};
use crate::covariance::{log_ratio_transform, Overlap};
use crate::geochron_errors::GeochronError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PbPbFormat {
    /// Pb206/Pb204, Pb207/Pb204
    Normal,
    /// Pb204/Pb206, Pb207/Pb206
    Inverse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PbPbData {
    format: PbPbFormat,
    aliquots: Vec<Aliquot>,
}

impl PbPbData {
    pub fn new(format: PbPbFormat, aliquots: Vec<Aliquot>) -> Result<Self, GeochronError> {
        check_aliquots(&aliquots, 2, 1)?;
        Ok(PbPbData { format, aliquots })
    }

    /// Data from three ratios per aliquot, without correlations.
    ///
    /// Rows are `[Pb206/Pb204, s, Pb207/Pb204, s, Pb207/Pb206, s]` for
    /// [`PbPbFormat::Normal`] and `[Pb204/Pb206, s, Pb207/Pb206, s, Pb207/Pb204, s]` for
    /// [`PbPbFormat::Inverse`]; the pair shares its denominator.
    pub fn from_ratio_triplets(
        format: PbPbFormat,
        rows: &[[f64; 6]],
    ) -> Result<Self, GeochronError> {
        let aliquots = rows
            .iter()
            .map(|r| {
                Aliquot::from_ratio_pair(Overlap::XzYz, (r[0], r[1]), (r[2], r[3]), (r[4], r[5]))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(format, aliquots)
    }

    pub fn format(&self) -> PbPbFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.aliquots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliquots.is_empty()
    }

    fn get(
        &self,
        i: usize,
        want: PbPbFormat,
    ) -> Result<(Vector2<f64>, Matrix2<f64>), GeochronError> {
        let a = self.aliquots.get(i).ok_or(GeochronError::LengthMismatch {
            expected: i + 1,
            found: self.aliquots.len(),
        })?;
        let v = DVector::from_column_slice(a.values());
        let cov = a.covariance()?;
        let (x, c) = if want == self.format {
            (v, cov)
        } else {
            // both directions are (1/p, q/p)
            let out = DVector::from_vec(vec![1.0 / v[0], v[1] / v[0]]);
            let l = DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, -1.0, 1.0]);
            let c = log_ratio_transform(&v, &cov, &l, &out);
            (out, c)
        };
        Ok((
            Vector2::new(x[0], x[1]),
            c.fixed_view::<2, 2>(0, 0).into_owned(),
        ))
    }

    /// Pb206/Pb204 and Pb207/Pb204 of aliquot `i`, with covariance.
    pub fn normal(&self, i: usize) -> Result<(Vector2<f64>, Matrix2<f64>), GeochronError> {
        self.get(i, PbPbFormat::Normal)
    }

    /// Pb204/Pb206 and Pb207/Pb206 of aliquot `i`, with covariance.
    pub fn inverse(&self, i: usize) -> Result<(Vector2<f64>, Matrix2<f64>), GeochronError> {
        self.get(i, PbPbFormat::Inverse)
    }
}

#[cfg(test)]
mod pbpb_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inverse_of_normal() {
        let a = Aliquot::new(vec![20.0, 16.0], vec![0.2, 0.16], vec![0.9]).unwrap();
        let d = PbPbData::new(PbPbFormat::Normal, vec![a]).unwrap();
        let (x, cov) = d.inverse(0).unwrap();
        assert_relative_eq!(x[0], 0.05, epsilon = 1e-15);
        assert_relative_eq!(x[1], 0.8, epsilon = 1e-15);
        assert_eq!(cov[(0, 1)], cov[(1, 0)]);
        // 1% relative error on Pb206/Pb204 carries over to Pb204/Pb206
        assert_relative_eq!(cov[(0, 0)].sqrt() / x[0], 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_ratio_triplets_agree_across_formats() {
        let r = 0.01 * 2f64.sqrt();
        let (pb64, pb74) = (20.0, 16.0);
        let pb76 = pb74 / pb64;
        let normal = PbPbData::from_ratio_triplets(
            PbPbFormat::Normal,
            &[[pb64, r * pb64, pb74, r * pb74, pb76, r * pb76]],
        )
        .unwrap();
        let inverse = PbPbData::from_ratio_triplets(
            PbPbFormat::Inverse,
            &[[1.0 / pb64, r / pb64, pb76, r * pb76, pb74, r * pb74]],
        )
        .unwrap();
        let (a, ca) = normal.inverse(0).unwrap();
        let (b, cb) = inverse.inverse(0).unwrap();
        for i in 0..2 {
            assert_relative_eq!(a[i], b[i], max_relative = 1e-12);
            for j in 0..2 {
                assert_relative_eq!(ca[(i, j)], cb[(i, j)], max_relative = 1e-9);
            }
        }
    }
}
