//! U-Pb data in Wetherill or Tera-Wasserburg form, with or without Pb204.
use nalgebra::{DMatrix, DVector, Matrix2, Matrix3, Vector2, Vector3};

use super::{check_aliquots, Aliquot};
use crate::covariance::{log_ratio_transform, Overlap};
use crate::geochron_errors::GeochronError;

/// Column layout of a U-Pb aliquot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UPbFormat {
    /// Pb207/U235, Pb206/U238
    Wetherill,
    /// U238/Pb206, Pb207/Pb206
    TeraWasserburg,
    /// Pb207/U235, Pb206/U238, Pb204/U238
    Wetherill204,
    /// U238/Pb206, Pb207/Pb206, Pb204/Pb206
    TeraWasserburg204,
}

impl UPbFormat {
    pub fn width(&self) -> usize {
        match self {
            UPbFormat::Wetherill | UPbFormat::TeraWasserburg => 2,
            UPbFormat::Wetherill204 | UPbFormat::TeraWasserburg204 => 3,
        }
    }

    pub fn has_pb204(&self) -> bool {
        self.width() == 3
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UPbData {
    format: UPbFormat,
    aliquots: Vec<Aliquot>,
}

impl UPbData {
    pub fn new(format: UPbFormat, aliquots: Vec<Aliquot>) -> Result<Self, GeochronError> {
        check_aliquots(&aliquots, format.width(), 1)?;
        Ok(UPbData { format, aliquots })
    }

    /// Two-dimensional data from three ratios per aliquot, without correlations.
    ///
    /// Each row holds the two ratios of `format` followed by the third ratio of the U-Pb
    /// triangle, each with its standard error:
    ///
    /// * Wetherill: `[Pb207/U235, s, Pb206/U238, s, Pb207/Pb206, s]`
    /// * Tera-Wasserburg: `[U238/Pb206, s, Pb207/Pb206, s, Pb207/U235, s]`
    ///
    /// Both pairs share a denominator (U, or Pb206), so the error correlation follows
    /// from the three relative errors.
    pub fn from_ratio_triplets(
        format: UPbFormat,
        rows: &[[f64; 6]],
    ) -> Result<Self, GeochronError> {
        if format.has_pb204() {
            return Err(GeochronError::UnsupportedFormat(
                "three-ratio input only covers the two-dimensional U-Pb formats".into(),
            ));
        }
        let aliquots = rows
            .iter()
            .map(|r| {
                Aliquot::from_ratio_pair(Overlap::XzYz, (r[0], r[1]), (r[2], r[3]), (r[4], r[5]))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(format, aliquots)
    }

    pub fn format(&self) -> UPbFormat {
        self.format
    }

    pub fn aliquots(&self) -> &[Aliquot] {
        &self.aliquots
    }

    pub fn len(&self) -> usize {
        self.aliquots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliquots.is_empty()
    }

    fn raw(&self, i: usize) -> Result<(DVector<f64>, DMatrix<f64>), GeochronError> {
        let a = self.aliquots.get(i).ok_or(GeochronError::LengthMismatch {
            expected: i + 1,
            found: self.aliquots.len(),
        })?;
        Ok((DVector::from_column_slice(a.values()), a.covariance()?))
    }

    /// Pb207/U235 and Pb206/U238 of aliquot `i`, with covariance.
    ///
    /// `u85` is the U238/U235 ratio used to convert Pb207/Pb206 into Pb207/U235.
    pub fn wetherill(
        &self,
        i: usize,
        u85: f64,
    ) -> Result<(Vector2<f64>, Matrix2<f64>), GeochronError> {
        let (v, cov) = self.raw(i)?;
        let (x, c) = match self.format {
            UPbFormat::Wetherill | UPbFormat::Wetherill204 => {
                (v.rows(0, 2).into_owned(), head2(&cov))
            }
            UPbFormat::TeraWasserburg | UPbFormat::TeraWasserburg204 => {
                let inp = v.rows(0, 2).into_owned();
                let out = DVector::from_vec(vec![inp[1] * u85 / inp[0], 1.0 / inp[0]]);
                let l = DMatrix::from_row_slice(2, 2, &[-1.0, 1.0, -1.0, 0.0]);
                let c = log_ratio_transform(&inp, &head2(&cov), &l, &out);
                (out, c)
            }
        };
        Ok((Vector2::new(x[0], x[1]), fixed2(&c)))
    }

    /// U238/Pb206 and Pb207/Pb206 of aliquot `i`, with covariance.
    pub fn tera_wasserburg(
        &self,
        i: usize,
        u85: f64,
    ) -> Result<(Vector2<f64>, Matrix2<f64>), GeochronError> {
        let (v, cov) = self.raw(i)?;
        let (x, c) = match self.format {
            UPbFormat::TeraWasserburg | UPbFormat::TeraWasserburg204 => {
                (v.rows(0, 2).into_owned(), head2(&cov))
            }
            UPbFormat::Wetherill | UPbFormat::Wetherill204 => {
                let inp = v.rows(0, 2).into_owned();
                let out = DVector::from_vec(vec![1.0 / inp[1], inp[0] / (u85 * inp[1])]);
                let l = DMatrix::from_row_slice(2, 2, &[0.0, -1.0, 1.0, -1.0]);
                let c = log_ratio_transform(&inp, &head2(&cov), &l, &out);
                (out, c)
            }
        };
        Ok((Vector2::new(x[0], x[1]), fixed2(&c)))
    }

    /// U238/Pb206, Pb207/Pb206 and Pb204/Pb206 of aliquot `i`, with covariance.
    ///
    /// Only available for the Pb204-bearing formats.
    pub fn tera_wasserburg3(
        &self,
        i: usize,
        u85: f64,
    ) -> Result<(Vector3<f64>, Matrix3<f64>), GeochronError> {
        let (v, cov) = self.raw(i)?;
        let (x, c) = match self.format {
            UPbFormat::TeraWasserburg204 => (v, cov),
            UPbFormat::Wetherill204 => {
                let out = DVector::from_vec(vec![
                    1.0 / v[1],
                    v[0] / (u85 * v[1]),
                    v[2] / v[1],
                ]);
                let l = DMatrix::from_row_slice(
                    3,
                    3,
                    &[0.0, -1.0, 0.0, 1.0, -1.0, 0.0, 0.0, -1.0, 1.0],
                );
                let c = log_ratio_transform(&v, &cov, &l, &out);
                (out, c)
            }
            UPbFormat::Wetherill | UPbFormat::TeraWasserburg => {
                return Err(GeochronError::UnsupportedFormat(
                    "three-dimensional U-Pb ratios need Pb204".into(),
                ))
            }
        };
        Ok((
            Vector3::new(x[0], x[1], x[2]),
            c.fixed_view::<3, 3>(0, 0).into_owned(),
        ))
    }
}

fn head2(cov: &DMatrix<f64>) -> DMatrix<f64> {
    cov.view((0, 0), (2, 2)).into_owned()
}

fn fixed2(cov: &DMatrix<f64>) -> Matrix2<f64> {
    cov.fixed_view::<2, 2>(0, 0).into_owned()
}
