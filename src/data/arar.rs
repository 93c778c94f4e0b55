//! Ar-Ar data with the irradiation J-factor.
use nalgebra::{DMatrix, DVector, Matrix2, Vector2};

use super::{check_aliquots, Aliquot};
use crate::covariance::log_ratio_transform;
use crate::geochron_errors::GeochronError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArArFormat {
    /// Ar39/Ar36, Ar40/Ar36
    Normal,
    /// Ar39/Ar40, Ar36/Ar40
    Inverse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArArData {
    format: ArArFormat,
    /// J-factor as `(value, stderr)`
    j: (f64, f64),
    aliquots: Vec<Aliquot>,
}

impl ArArData {
    pub fn new(
        format: ArArFormat,
        j: (f64, f64),
        aliquots: Vec<Aliquot>,
    ) -> Result<Self, GeochronError> {
        check_aliquots(&aliquots, 2, 1)?;
        if !(j.0 > 0.0) {
            return Err(GeochronError::InvalidParameter(format!(
                "J-factor must be positive, got {}",
                j.0
            )));
        }
        Ok(ArArData {
            format,
            j,
            aliquots,
        })
    }

    pub fn format(&self) -> ArArFormat {
        self.format
    }

    pub fn j(&self) -> (f64, f64) {
        self.j
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
        want: ArArFormat,
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
            // 39/36 = (39/40)/(36/40), 40/36 = 1/(36/40), and the same the other way round
            let out = DVector::from_vec(vec![v[0] / v[1], 1.0 / v[1]]);
            let l = DMatrix::from_row_slice(2, 2, &[1.0, -1.0, 0.0, -1.0]);
            let c = log_ratio_transform(&v, &cov, &l, &out);
            (out, c)
        };
        Ok((
            Vector2::new(x[0], x[1]),
            c.fixed_view::<2, 2>(0, 0).into_owned(),
        ))
    }

    /// Ar39/Ar36 and Ar40/Ar36 of aliquot `i`, with covariance.
    pub fn normal(&self, i: usize) -> Result<(Vector2<f64>, Matrix2<f64>), GeochronError> {
        self.get(i, ArArFormat::Normal)
    }

    /// Ar39/Ar40 and Ar36/Ar40 of aliquot `i`, with covariance.
    pub fn inverse(&self, i: usize) -> Result<(Vector2<f64>, Matrix2<f64>), GeochronError> {
        self.get(i, ArArFormat::Inverse)
    }
}

#[cfg(test)]
mod arar_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normal_from_inverse() {
        let a = Aliquot::new(vec![0.05, 0.001], vec![0.0005, 0.00002], vec![-0.3]).unwrap();
        let d = ArArData::new(ArArFormat::Inverse, (0.01, 1e-5), vec![a]).unwrap();
        let (x, cov) = d.normal(0).unwrap();
        assert_relative_eq!(x[0], 50.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1000.0, epsilon = 1e-9);
        assert_eq!(cov[(0, 1)], cov[(1, 0)]);
        assert!(cov[(0, 0)] > 0.0 && cov[(1, 1)] > 0.0);
    }

    #[test]
    fn test_rejects_non_positive_j() {
        let a = Aliquot::uncorrelated(vec![50.0, 1000.0], vec![0.5, 10.0]).unwrap();
        assert!(ArArData::new(ArArFormat::Normal, (0.0, 0.0), vec![a]).is_err());
    }
}
