//! Th-U disequilibrium data as activity ratios.
use nalgebra::{DMatrix, DVector, Matrix2, Vector2};

use super::{check_aliquots, Aliquot};
use crate::covariance::log_ratio_transform;
use crate::geochron_errors::GeochronError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThUFormat {
    /// (U234/U238), (Th230/U238)
    Activity,
    /// (U238/Th232), (U234/Th232), (Th230/Th232), assuming no detrital Th230
    Th232Normalised,
}

impl ThUFormat {
    fn width(&self) -> usize {
        match self {
            ThUFormat::Activity => 2,
            ThUFormat::Th232Normalised => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThUData {
    format: ThUFormat,
    aliquots: Vec<Aliquot>,
}

impl ThUData {
    pub fn new(format: ThUFormat, aliquots: Vec<Aliquot>) -> Result<Self, GeochronError> {
        check_aliquots(&aliquots, format.width(), 1)?;
        Ok(ThUData { format, aliquots })
    }

    pub fn format(&self) -> ThUFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.aliquots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliquots.is_empty()
    }

    /// (U234/U238) and (Th230/U238) activity ratios of aliquot `i`, with covariance.
    pub fn activities(&self, i: usize) -> Result<(Vector2<f64>, Matrix2<f64>), GeochronError> {
        let a = self.aliquots.get(i).ok_or(GeochronError::LengthMismatch {
            expected: i + 1,
            found: self.aliquots.len(),
        })?;
        let v = DVector::from_column_slice(a.values());
        let cov = a.covariance()?;
        let (x, c) = match self.format {
            ThUFormat::Activity => (v, cov),
            ThUFormat::Th232Normalised => {
                let out = DVector::from_vec(vec![v[1] / v[0], v[2] / v[0]]);
                let l = DMatrix::from_row_slice(2, 3, &[-1.0, 1.0, 0.0, -1.0, 0.0, 1.0]);
                let c = log_ratio_transform(&v, &cov, &l, &out);
                (out, c)
            }
        };
        Ok((
            Vector2::new(x[0], x[1]),
            c.fixed_view::<2, 2>(0, 0).into_owned(),
        ))
    }
}

#[cfg(test)]
mod thu_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_th232_normalised_to_activities() {
        let a = Aliquot::uncorrelated(vec![2.0, 2.2, 1.0], vec![0.02, 0.022, 0.01]).unwrap();
        let d = ThUData::new(ThUFormat::Th232Normalised, vec![a]).unwrap();
        let (x, cov) = d.activities(0).unwrap();
        assert_relative_eq!(x[0], 1.1, epsilon = 1e-14);
        assert_relative_eq!(x[1], 0.5, epsilon = 1e-14);
        // shared U238/Th232 denominator
        assert!(cov[(0, 1)] > 0.0);
    }
}
