// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Classifier evaluation harness for the Indian Liver Patient dataset
//!
//! This crate provides:
//! - CSV loading of liver function test records
//! - k-fold partitioning and cross-validated grid search
//! - Logistic regression, decision tree and SVM adapters over linfa
//! - Binary classification metrics (Accuracy, Precision, Recall, F1, MCC)
//! - Descriptive feature statistics
//! - Model cards and a reproducible, seeded evaluation pipeline

pub mod classifiers;
pub mod datasets;
pub mod error;
pub mod folds;
pub mod grid_search;
pub mod hyperparams;
pub mod metrics;
pub mod model_card;
pub mod pipeline;
pub mod statistics;

pub use classifiers::{Classifier, ModelKind};
pub use datasets::{Dataset, DatasetConfig, Gender, Label, PatientRecord};
pub use error::{EvalError, Result};
pub use folds::FoldSet;
pub use grid_search::{EvaluationResult, GridSearch, GridSearchOutcome};
pub use hyperparams::{HyperparameterGrid, Kernel, ParamSet, ParamValue};
pub use metrics::{ClassificationMetrics, ClassificationReport, ConfusionMatrix};
pub use model_card::{ModelCard, ModelCardBuilder};
pub use pipeline::{EvaluationConfig, EvaluationPipeline, EvaluationResults};
