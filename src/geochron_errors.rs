use thiserror::Error;

use crate::constants::Category;

#[derive(Error, Debug)]
pub enum GeochronError {
    #[error("Dataset is empty or has too few aliquots: need at least {0}")]
    EmptyDataset(usize),

    #[error("Mismatched vector lengths: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Invalid number of mixture components: {0}")]
    InvalidComponentCount(usize),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown constant {name} in category {category:?}")]
    UnknownConstant { category: Category, name: String },

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("Matrix is singular (cannot be inverted): {0}")]
    SingularMatrix(&'static str),

    #[error("Fit did not converge: {0}")]
    NotConverged(String),

    #[error("ROOTS finding error: {0}")]
    RootFindingError(#[from] roots::SearchError),

    #[error("Optimizer error: {0}")]
    OptimizerError(String),

    #[error("Statistical distribution error: {0}")]
    StatisticsError(String),
}

impl From<argmin::core::Error> for GeochronError {
    fn from(err: argmin::core::Error) -> Self {
        GeochronError::OptimizerError(err.to_string())
    }
}

impl PartialEq for GeochronError {
    fn eq(&self, other: &Self) -> bool {
        use GeochronError::*;
        match (self, other) {
            (EmptyDataset(a), EmptyDataset(b)) => a == b,
            (
                LengthMismatch {
                    expected: e1,
                    found: f1,
                },
                LengthMismatch {
                    expected: e2,
                    found: f2,
                },
            ) => e1 == e2 && f1 == f2,
            (InvalidComponentCount(a), InvalidComponentCount(b)) => a == b,
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (
                UnknownConstant {
                    category: c1,
                    name: n1,
                },
                UnknownConstant {
                    category: c2,
                    name: n2,
                },
            ) => c1 == c2 && n1 == n2,
            (UnsupportedFormat(a), UnsupportedFormat(b)) => a == b,
            (SingularMatrix(a), SingularMatrix(b)) => a == b,
            (NotConverged(a), NotConverged(b)) => a == b,
            (RootFindingError(a), RootFindingError(b)) => a == b,

            // Wrapped foreign errors are only compared by variant
            (OptimizerError(_), OptimizerError(_)) => true,
            (StatisticsError(_), StatisticsError(_)) => true,

            _ => false,
        }
    }
}
