//! Parent–daughter systems with a stable reference isotope: Re-Os, Sm-Nd, Rb-Sr, Lu-Hf.
use nalgebra::{DMatrix, DVector, Matrix2, Vector2};

use super::{check_aliquots, Aliquot};
use crate::covariance::log_ratio_transform;
use crate::geochron_errors::GeochronError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PDSystem {
    /// Re187 → Os187, normalised to Os188
    ReOs,
    /// Sm147 → Nd143, normalised to Nd144
    SmNd,
    /// Rb87 → Sr87, normalised to Sr86
    RbSr,
    /// Lu176 → Hf176, normalised to Hf177
    LuHf,
}

impl PDSystem {
    /// Name of the parent nuclide in the constants table.
    pub fn parent(&self) -> &'static str {
        match self {
            PDSystem::ReOs => "Re187",
            PDSystem::SmNd => "Sm147",
            PDSystem::RbSr => "Rb87",
            PDSystem::LuHf => "Lu176",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PDFormat {
    /// P/Ds, D/Ds (e.g. Rb87/Sr86, Sr87/Sr86)
    Normal,
    /// P/D, Ds/D (e.g. Rb87/Sr87, Sr86/Sr87)
    Inverse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PDData {
    system: PDSystem,
    format: PDFormat,
    aliquots: Vec<Aliquot>,
}

impl PDData {
    pub fn new(
        system: PDSystem,
        format: PDFormat,
        aliquots: Vec<Aliquot>,
    ) -> Result<Self, GeochronError> {
        check_aliquots(&aliquots, 2, 1)?;
        Ok(PDData {
            system,
            format,
            aliquots,
        })
    }

    pub fn system(&self) -> PDSystem {
        self.system
    }

    pub fn format(&self) -> PDFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.aliquots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliquots.is_empty()
    }

    /// P/Ds and D/Ds of aliquot `i`, with covariance.
    pub fn normal(&self, i: usize) -> Result<(Vector2<f64>, Matrix2<f64>), GeochronError> {
        let a = self.aliquots.get(i).ok_or(GeochronError::LengthMismatch {
            expected: i + 1,
            found: self.aliquots.len(),
        })?;
        let v = DVector::from_column_slice(a.values());
        let cov = a.covariance()?;
        let (x, c) = match self.format {
            PDFormat::Normal => (v, cov),
            PDFormat::Inverse => {
                let out = DVector::from_vec(vec![v[0] / v[1], 1.0 / v[1]]);
                let l = DMatrix::from_row_slice(2, 2, &[1.0, -1.0, 0.0, -1.0]);
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
