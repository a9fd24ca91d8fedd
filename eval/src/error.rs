// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Error types for the evaluation library

use thiserror::Error;

/// Result type alias for evaluation operations
pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Error, Debug)]
pub enum EvalError {
    /// A numeric field could not be converted
    #[error("line {line}: cannot parse {field} from {value:?}")]
    Parse {
        line: u64,
        field: &'static str,
        value: String,
    },

    /// A categorical token or hyperparameter outside the accepted set
    #[error("invalid value for {field}: {value:?}")]
    InvalidValue { field: String, value: String },

    #[error("length mismatch: expected {expected} labels, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Any failure surfaced by a wrapped linfa estimator
    #[error("{model} failed: {message}")]
    ExternalLibrary { model: &'static str, message: String },

    #[error("cannot split {samples} samples into {folds} folds")]
    InvalidFolds { folds: usize, samples: usize },

    #[error("hyperparameter grid has no combinations")]
    EmptyGrid,

    #[error("{0} has not been trained")]
    ModelNotFitted(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl EvalError {
    pub(crate) fn invalid(field: impl Into<String>, value: impl ToString) -> Self {
        EvalError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub(crate) fn external(model: &'static str, err: impl std::fmt::Display) -> Self {
        EvalError::ExternalLibrary {
            model,
            message: err.to_string(),
        }
    }
}
