// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Classifier adapters over linfa estimators
//!
//! Implements:
//! - Logistic regression (`linfa-logistic`)
//! - Entropy-split decision tree (`linfa-trees`)
//! - Kernel SVM trained by SMO (`linfa-svm`)
//!
//! All adapters share the [`Classifier`] interface and consume the same
//! seven-feature vector from [`PatientRecord::selected_features`], optionally
//! standardised and outlier-capped with statistics fitted on the training rows.

use crate::datasets::{Label, PatientRecord, FEATURE_COUNT};
use crate::error::{EvalError, Result};
use crate::hyperparams::{HyperparameterGrid, Kernel, ParamSet, ParamValue};
use crate::statistics::FeatureScaler;
use linfa::prelude::*;
use linfa::Dataset;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use linfa_svm::Svm;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Optimiser iteration cap for logistic regression
pub const LOGISTIC_MAX_ITERATIONS: u64 = 100;

/// Gradient tolerance at which logistic regression is considered converged
pub const LOGISTIC_TOLERANCE: f64 = 1e-4;

pub const REGULARIZATION: &str = "regularization";
pub const INTERCEPT: &str = "intercept";
pub const JOIN: &str = "join";
pub const MAX_HEIGHT: &str = "max_height";
pub const KERNEL: &str = "kernel";
pub const COMPLEXITY: &str = "complexity";

/// Common train/predict capability of every model
pub trait Classifier: Send {
    /// Fit the model on `records` with the given hyperparameters, replacing any previous fit
    fn train(&mut self, records: &[PatientRecord], params: &ParamSet) -> Result<()>;

    /// Predict a label for each record
    fn predict(&self, records: &[PatientRecord]) -> Result<Vec<Label>>;

    fn kind(&self) -> ModelKind;

    fn name(&self) -> &str {
        self.kind().name()
    }

    fn description(&self) -> &str;
}

/// The three supported estimators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    LogisticRegression,
    DecisionTree,
    Svm,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::LogisticRegression, ModelKind::DecisionTree, ModelKind::Svm];

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "Logistic Regression",
            ModelKind::DecisionTree => "Decision Tree",
            ModelKind::Svm => "SVM",
        }
    }

    /// Fresh, untrained adapter for this kind
    pub fn build(self) -> Box<dyn Classifier> {
        self.build_with(false)
    }

    /// Fresh adapter that preprocesses its features when `preprocess` is set
    pub fn build_with(self, preprocess: bool) -> Box<dyn Classifier> {
        let features = FeatureEncoder::new(preprocess);
        match self {
            ModelKind::LogisticRegression => Box::new(LogisticModel { features, fitted: None }),
            ModelKind::DecisionTree => Box::new(DecisionTreeModel { features, fitted: None }),
            ModelKind::Svm => Box::new(SvmModel { features, fitted: None }),
        }
    }

    /// Hyperparameter names this kind reads during training
    pub fn param_names(self) -> Vec<String> {
        self.default_grid().axes.into_iter().map(|axis| axis.name).collect()
    }

    /// Set one hyperparameter, rejecting names this kind does not read
    pub fn set_param(self, params: &mut ParamSet, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        if !self.param_names().iter().any(|known| known == name) {
            return Err(EvalError::invalid("parameter", format!("{} (not used by {})", name, self.name())));
        }
        params.set(name, value);
        Ok(())
    }

    /// Search space used when no grid is configured
    pub fn default_grid(self) -> HyperparameterGrid {
        match self {
            ModelKind::LogisticRegression => HyperparameterGrid::new()
                .axis(REGULARIZATION, [1e-1, 1e-4, 1e-7])
                .axis(INTERCEPT, [0.0, 1.0, 2.0]),
            ModelKind::DecisionTree => HyperparameterGrid::new()
                .axis(JOIN, [1.0, 5.0, 10.0, 15.0])
                .axis(MAX_HEIGHT, [10.0, 20.0, 40.0]),
            ModelKind::Svm => HyperparameterGrid::new()
                .axis(
                    KERNEL,
                    [
                        Kernel::Gaussian { eps: 2.0 },
                        Kernel::Linear,
                        Kernel::Polynomial { constant: 1.0, degree: 2.0 },
                    ],
                )
                .axis(COMPLEXITY, [1e-10, 1e-7, 1e-4]),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "logistic" | "logistic-regression" | "logreg" => Ok(ModelKind::LogisticRegression),
            "tree" | "decision-tree" | "c45" => Ok(ModelKind::DecisionTree),
            "svm" => Ok(ModelKind::Svm),
            _ => Err(EvalError::invalid("model", s)),
        }
    }
}

/// Feature matrix (one row per record) and 0/1 targets
pub fn feature_matrix(records: &[PatientRecord]) -> (Array2<f64>, Array1<usize>) {
    let mut x = Array2::zeros((records.len(), FEATURE_COUNT));
    for (i, record) in records.iter().enumerate() {
        for (j, value) in record.selected_features().iter().enumerate() {
            x[[i, j]] = *value;
        }
    }
    let y = records.iter().map(|r| r.label.to_binary() as usize).collect();
    (x, y)
}

/// Builds the feature matrix, fitting the scaler on training rows when enabled
#[derive(Debug, Clone, Default)]
pub struct FeatureEncoder {
    preprocess: bool,
    scaler: Option<FeatureScaler>,
}

impl FeatureEncoder {
    pub fn new(preprocess: bool) -> Self {
        Self { preprocess, scaler: None }
    }

    fn fit(&mut self, records: &[PatientRecord]) -> (Array2<f64>, Array1<usize>) {
        let (mut x, y) = feature_matrix(records);
        self.scaler = self.preprocess.then(|| FeatureScaler::fit_transform(&mut x));
        (x, y)
    }

    fn transform(&self, records: &[PatientRecord]) -> Array2<f64> {
        let (mut x, _) = feature_matrix(records);
        if let Some(scaler) = &self.scaler {
            scaler.transform(&mut x);
        }
        x
    }
}

fn labels_from_binary(predicted: &Array1<usize>) -> Vec<Label> {
    predicted.iter().map(|v| Label::from_binary(*v as u8)).collect()
}

/// Logistic regression fitted with a bounded number of optimiser steps
#[derive(Default)]
pub struct LogisticModel {
    features: FeatureEncoder,
    fitted: Option<FittedLogisticRegression<f64, usize>>,
}

impl LogisticModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for LogisticModel {
    fn train(&mut self, records: &[PatientRecord], params: &ParamSet) -> Result<()> {
        let regularization = params.number(REGULARIZATION)?;
        let intercept = params.number(INTERCEPT)?;
        if !(regularization >= 0.0) {
            return Err(EvalError::invalid(REGULARIZATION, regularization));
        }

        let (x, y) = self.features.fit(records);
        let dataset = Dataset::new(x, y);

        // The intercept occupies the last slot of the initial parameter vector.
        let mut initial = Array1::zeros(FEATURE_COUNT + 1);
        initial[FEATURE_COUNT] = intercept;

        let fitted = LogisticRegression::default()
            .alpha(regularization)
            .with_intercept(true)
            .initial_params(initial)
            .max_iterations(LOGISTIC_MAX_ITERATIONS)
            .gradient_tolerance(LOGISTIC_TOLERANCE)
            .fit(&dataset)
            .map_err(|e| EvalError::external("logistic regression", e))?;

        self.fitted = Some(fitted);
        Ok(())
    }

    fn predict(&self, records: &[PatientRecord]) -> Result<Vec<Label>> {
        let fitted = self.fitted.as_ref().ok_or(EvalError::ModelNotFitted("logistic regression"))?;
        let x = self.features.transform(records);
        let predicted: Array1<usize> = fitted.predict(&x);
        Ok(labels_from_binary(&predicted))
    }

    fn kind(&self) -> ModelKind {
        ModelKind::LogisticRegression
    }

    fn description(&self) -> &str {
        "L2-regularised logistic regression, 0.5 probability threshold"
    }
}

/// Decision tree grown with the information-gain (entropy) criterion.
/// Gender is a 0/1 column, so any threshold split on it is a categorical split.
#[derive(Default)]
pub struct DecisionTreeModel {
    features: FeatureEncoder,
    fitted: Option<DecisionTree<f64, usize>>,
}

impl DecisionTreeModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Depth of the fitted tree, if trained
    pub fn depth(&self) -> Option<usize> {
        self.fitted.as_ref().map(|t| t.max_depth())
    }
}

impl Classifier for DecisionTreeModel {
    fn train(&mut self, records: &[PatientRecord], params: &ParamSet) -> Result<()> {
        let join = params.number(JOIN)?;
        let max_height = params.number(MAX_HEIGHT)?;
        if !(join >= 1.0) {
            return Err(EvalError::invalid(JOIN, join));
        }
        if !(max_height >= 1.0) {
            return Err(EvalError::invalid(MAX_HEIGHT, max_height));
        }

        let (x, y) = self.features.fit(records);
        let dataset = Dataset::new(x, y);

        let fitted = DecisionTree::params()
            .split_quality(SplitQuality::Entropy)
            .max_depth(Some(max_height as usize))
            .min_weight_split(join as f32)
            .min_weight_leaf(0.5)
            .fit(&dataset)
            .map_err(|e| EvalError::external("decision tree", e))?;

        self.fitted = Some(fitted);
        Ok(())
    }

    fn predict(&self, records: &[PatientRecord]) -> Result<Vec<Label>> {
        let fitted = self.fitted.as_ref().ok_or(EvalError::ModelNotFitted("decision tree"))?;
        let x = self.features.transform(records);
        let predicted: Array1<usize> = fitted.predict(&x);
        Ok(labels_from_binary(&predicted))
    }

    fn kind(&self) -> ModelKind {
        ModelKind::DecisionTree
    }

    fn description(&self) -> &str {
        "Entropy-split decision tree with minimum split size and height limit"
    }
}

/// Support vector machine solved by sequential minimal optimisation.
/// Disease maps to the positive class `true`, no disease to `false`.
#[derive(Default)]
pub struct SvmModel {
    features: FeatureEncoder,
    fitted: Option<Svm<f64, bool>>,
}

impl SvmModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for SvmModel {
    fn train(&mut self, records: &[PatientRecord], params: &ParamSet) -> Result<()> {
        let kernel = params.kernel(KERNEL)?;
        let complexity = params.number(COMPLEXITY)?;
        if !(complexity > 0.0) {
            return Err(EvalError::invalid(COMPLEXITY, complexity));
        }

        let (x, y) = self.features.fit(records);
        let dataset = Dataset::new(x, y.mapv(|v| v == 1));

        let base = Svm::<f64, bool>::params().pos_neg_weights(complexity, complexity);
        let svm_params = match kernel {
            Kernel::Gaussian { eps } => base.gaussian_kernel(eps),
            Kernel::Linear => base.linear_kernel(),
            Kernel::Polynomial { constant, degree } => base.polynomial_kernel(constant, degree),
        };

        let fitted = svm_params
            .fit(&dataset)
            .map_err(|e| EvalError::external("svm", e))?;

        tracing::debug!("SVM trained with {} kernel: {}", kernel, fitted);
        self.fitted = Some(fitted);
        Ok(())
    }

    fn predict(&self, records: &[PatientRecord]) -> Result<Vec<Label>> {
        let fitted = self.fitted.as_ref().ok_or(EvalError::ModelNotFitted("svm"))?;
        let x = self.features.transform(records);
        let decided: Array1<bool> = fitted.predict(&x);
        Ok(decided
            .iter()
            .map(|d| if *d { Label::Disease } else { Label::NoDisease })
            .collect())
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Svm
    }

    fn description(&self) -> &str {
        "Kernel SVM trained by sequential minimal optimisation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Dataset;

    fn training_records() -> Vec<PatientRecord> {
        Dataset::load_synthetic(120, 3).records().to_vec()
    }

    fn first_params(kind: ModelKind) -> ParamSet {
        kind.default_grid().combinations().remove(0)
    }

    #[test]
    fn test_feature_matrix_shape() {
        let records = training_records();
        let (x, y) = feature_matrix(&records);

        assert_eq!(x.dim(), (120, FEATURE_COUNT));
        assert_eq!(y.len(), 120);
        assert_eq!(x[[0, 0]], records[0].age as f64);
        assert_eq!(y[0], records[0].label.to_binary() as usize);
    }

    #[test]
    fn test_predict_before_train() {
        for kind in ModelKind::ALL {
            let model = kind.build();
            assert!(matches!(
                model.predict(&training_records()),
                Err(EvalError::ModelNotFitted(_))
            ));
        }
    }

    #[test]
    fn test_each_model_trains_and_predicts() {
        let records = training_records();
        for kind in ModelKind::ALL {
            let mut model = kind.build();
            model.train(&records, &first_params(kind)).unwrap();
            let predictions = model.predict(&records).unwrap();
            assert_eq!(predictions.len(), records.len(), "{}", model.name());
        }
    }

    #[test]
    fn test_preprocessed_models_train_and_predict() {
        let records = training_records();
        for kind in ModelKind::ALL {
            let mut model = kind.build_with(true);
            model.train(&records[..90], &first_params(kind)).unwrap();
            let predictions = model.predict(&records[90..]).unwrap();
            assert_eq!(predictions.len(), 30, "{}", model.name());
        }
    }

    #[test]
    fn test_encoder_reuses_training_statistics() {
        let records = training_records();
        let mut encoder = FeatureEncoder::new(true);
        let (train_x, _) = encoder.fit(&records);
        assert!(train_x.column(0).mean().unwrap().abs() < 1e-9);

        // Predicting one row must not refit: the row is scaled, not zeroed.
        let single = encoder.transform(&records[..1]);
        assert_eq!(single.row(0), train_x.row(0));

        let mut raw = FeatureEncoder::new(false);
        let (raw_x, _) = raw.fit(&records);
        assert_eq!(raw_x, feature_matrix(&records).0);
    }

    #[test]
    fn test_set_param_rejects_unknown_names() {
        let mut params = first_params(ModelKind::DecisionTree);
        ModelKind::DecisionTree.set_param(&mut params, JOIN, 5.0).unwrap();
        assert_eq!(params.number(JOIN).unwrap(), 5.0);

        assert!(matches!(
            ModelKind::DecisionTree.set_param(&mut params, "depth", 3.0),
            Err(EvalError::InvalidValue { .. })
        ));
        assert!(ModelKind::LogisticRegression
            .set_param(&mut params, KERNEL, Kernel::Linear)
            .is_err());
        assert_eq!(ModelKind::Svm.param_names(), vec![KERNEL, COMPLEXITY]);
    }

    #[test]
    fn test_tree_fits_training_data() {
        let records = training_records();
        let mut model = DecisionTreeModel::new();
        let params = ParamSet::new().with(JOIN, 2.0).with(MAX_HEIGHT, 10.0);
        model.train(&records, &params).unwrap();

        let predictions = model.predict(&records).unwrap();
        let correct = predictions.iter().zip(&records).filter(|(p, r)| **p == r.label).count();
        assert!(correct as f64 / records.len() as f64 > 0.8);
        assert!(model.depth().unwrap() <= 10);
    }

    #[test]
    fn test_wrong_parameters_rejected() {
        let records = training_records();
        let mut tree = DecisionTreeModel::new();
        assert!(matches!(
            tree.train(&records, &ParamSet::new().with(JOIN, 1.0)),
            Err(EvalError::InvalidValue { .. })
        ));

        let mut svm = SvmModel::new();
        let params = ParamSet::new().with(KERNEL, 1.0).with(COMPLEXITY, 1.0);
        assert!(matches!(svm.train(&records, &params), Err(EvalError::InvalidValue { .. })));
    }

    #[test]
    fn test_model_kind_parsing() {
        assert_eq!("logistic".parse::<ModelKind>().unwrap(), ModelKind::LogisticRegression);
        assert_eq!("Decision_Tree".parse::<ModelKind>().unwrap(), ModelKind::DecisionTree);
        assert_eq!("SVM".parse::<ModelKind>().unwrap(), ModelKind::Svm);
        assert!("forest".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_default_grid_sizes() {
        assert_eq!(ModelKind::LogisticRegression.default_grid().len(), 9);
        assert_eq!(ModelKind::DecisionTree.default_grid().len(), 12);
        assert_eq!(ModelKind::Svm.default_grid().len(), 9);
    }
}
