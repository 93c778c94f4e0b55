//! U-Th-(Sm)-He data: molar amounts of He, U, Th and optionally Sm.
use nalgebra::{DMatrix, DVector};

use super::{check_aliquots, Aliquot};
use crate::geochron_errors::GeochronError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UThHeFormat {
    /// He, U, Th
    UThHe,
    /// He, U, Th, Sm
    UThSmHe,
}

impl UThHeFormat {
    pub fn width(&self) -> usize {
        match self {
            UThHeFormat::UThHe => 3,
            UThHeFormat::UThSmHe => 4,
        }
    }

    pub fn has_sm(&self) -> bool {
        matches!(self, UThHeFormat::UThSmHe)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UThHeData {
    format: UThHeFormat,
    aliquots: Vec<Aliquot>,
}

impl UThHeData {
    pub fn new(format: UThHeFormat, aliquots: Vec<Aliquot>) -> Result<Self, GeochronError> {
        check_aliquots(&aliquots, format.width(), 1)?;
        if aliquots.iter().any(|a| a.values().iter().any(|v| !(*v > 0.0))) {
            return Err(GeochronError::InvalidParameter(
                "U-Th-He amounts must be positive".into(),
            ));
        }
        Ok(UThHeData { format, aliquots })
    }

    pub fn format(&self) -> UThHeFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.aliquots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliquots.is_empty()
    }

    /// Amounts (He, U, Th[, Sm]) of aliquot `i` with their covariance.
    pub fn composition(&self, i: usize) -> Result<(DVector<f64>, DMatrix<f64>), GeochronError> {
        let a = self.aliquots.get(i).ok_or(GeochronError::LengthMismatch {
            expected: i + 1,
            found: self.aliquots.len(),
        })?;
        Ok((DVector::from_column_slice(a.values()), a.covariance()?))
    }

    /// Log-ratios `ln(U/He), ln(Th/He)[, ln(Sm/He)]` of aliquot `i` with covariance.
    pub fn log_ratios(&self, i: usize) -> Result<(DVector<f64>, DMatrix<f64>), GeochronError> {
        let (x, cov) = self.composition(i)?;
        let p = x.len() - 1;
        let mut j = DMatrix::<f64>::zeros(p, p + 1);
        let mut lr = DVector::<f64>::zeros(p);
        for k in 0..p {
            lr[k] = (x[k + 1] / x[0]).ln();
            j[(k, 0)] = -1.0 / x[0];
            j[(k, k + 1)] = 1.0 / x[k + 1];
        }
        Ok((lr, crate::covariance::errorprop(&j, &cov)))
    }
}

#[cfg(test)]
mod uthhe_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_log_ratio_covariance() {
        let a = Aliquot::uncorrelated(vec![10.0, 100.0, 50.0], vec![0.1, 2.0, 1.0]).unwrap();
        let d = UThHeData::new(UThHeFormat::UThHe, vec![a]).unwrap();
        let (lr, cov) = d.log_ratios(0).unwrap();
        assert_relative_eq!(lr[0], 10f64.ln(), epsilon = 1e-14);
        // var(ln U/He) = 0.01^2 + 0.02^2, cov = var(ln He)
        assert_relative_eq!(cov[(0, 0)], 1e-4 + 4e-4, epsilon = 1e-15);
        assert_relative_eq!(cov[(0, 1)], 1e-4, epsilon = 1e-15);
    }

    #[test]
    fn test_rejects_zero_amount() {
        let a = Aliquot::uncorrelated(vec![0.0, 100.0, 50.0], vec![0.1, 2.0, 1.0]).unwrap();
        assert!(UThHeData::new(UThHeFormat::UThHe, vec![a]).is_err());
    }
}
