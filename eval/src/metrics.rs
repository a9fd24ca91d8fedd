// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation metrics for binary classification
//!
//! Implements standard ML metrics:
//! - Confusion Matrix
//! - Accuracy, Precision, Recall, F1-Score
//! - Specificity and Matthews Correlation Coefficient (MCC)
//! - Fold averaging for cross-validation

use crate::datasets::Label;
use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};

/// Confusion matrix for binary classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// True Positives (disease predicted as disease)
    pub tp: usize,
    /// True Negatives (healthy predicted as healthy)
    pub tn: usize,
    /// False Positives (healthy predicted as disease)
    pub fp: usize,
    /// False Negatives (disease predicted as healthy)
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Count outcomes by pairwise comparison of predictions and ground truth
    pub fn from_predictions(predictions: &[Label], ground_truth: &[Label]) -> Result<Self> {
        if predictions.len() != ground_truth.len() {
            return Err(EvalError::LengthMismatch {
                expected: ground_truth.len(),
                actual: predictions.len(),
            });
        }

        let mut matrix = Self::default();

        for (pred, truth) in predictions.iter().zip(ground_truth.iter()) {
            match (pred, truth) {
                (Label::Disease, Label::Disease) => matrix.tp += 1,
                (Label::NoDisease, Label::NoDisease) => matrix.tn += 1,
                (Label::Disease, Label::NoDisease) => matrix.fp += 1,
                (Label::NoDisease, Label::Disease) => matrix.fn_ += 1,
            }
        }

        Ok(matrix)
    }

    /// Total number of samples
    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Accuracy: (TP + TN) / Total
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.tp + self.tn) as f64 / total as f64
    }

    /// Precision: TP / (TP + FP), zero when there are no true positives
    pub fn precision(&self) -> f64 {
        if self.tp == 0 {
            return 0.0;
        }
        self.tp as f64 / (self.tp + self.fp) as f64
    }

    /// Recall (Sensitivity): TP / (TP + FN), zero when there are no true positives
    pub fn recall(&self) -> f64 {
        if self.tp == 0 {
            return 0.0;
        }
        self.tp as f64 / (self.tp + self.fn_) as f64
    }

    /// Specificity: TN / (TN + FP)
    pub fn specificity(&self) -> f64 {
        let denom = self.tn + self.fp;
        if denom == 0 {
            return 0.0;
        }
        self.tn as f64 / denom as f64
    }

    /// F1 Score: 2 * (Precision * Recall) / (Precision + Recall)
    pub fn f1_score(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        let denom = precision + recall;
        if denom == 0.0 {
            return 0.0;
        }
        2.0 * precision * recall / denom
    }

    /// Matthews Correlation Coefficient, in [-1, 1]
    pub fn mcc(&self) -> f64 {
        let tp = self.tp as f64;
        let tn = self.tn as f64;
        let fp = self.fp as f64;
        let fn_ = self.fn_ as f64;

        let numerator = tp * tn - fp * fn_;
        let denominator = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();

        if denominator == 0.0 {
            return 0.0;
        }
        numerator / denominator
    }

    /// Balanced Accuracy: (Sensitivity + Specificity) / 2
    pub fn balanced_accuracy(&self) -> f64 {
        (self.recall() + self.specificity()) / 2.0
    }

    pub fn metrics(&self) -> ClassificationMetrics {
        ClassificationMetrics {
            accuracy: self.accuracy(),
            precision: self.precision(),
            recall: self.recall(),
            f1_score: self.f1_score(),
        }
    }
}

/// The four headline metrics reported for every model
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl ClassificationMetrics {
    pub fn compute(predictions: &[Label], ground_truth: &[Label]) -> Result<Self> {
        Ok(ConfusionMatrix::from_predictions(predictions, ground_truth)?.metrics())
    }

    /// Element-wise mean over folds. An empty slice yields all zeros.
    pub fn mean(folds: &[ClassificationMetrics]) -> Self {
        if folds.is_empty() {
            return Self::default();
        }
        let n = folds.len() as f64;
        Self {
            accuracy: folds.iter().map(|m| m.accuracy).sum::<f64>() / n,
            precision: folds.iter().map(|m| m.precision).sum::<f64>() / n,
            recall: folds.iter().map(|m| m.recall).sum::<f64>() / n,
            f1_score: folds.iter().map(|m| m.f1_score).sum::<f64>() / n,
        }
    }
}

/// Full classification report with all metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub confusion_matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub balanced_accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub mcc: f64,
    pub specificity: f64,
    pub support: usize,
}

impl ClassificationReport {
    pub fn from_confusion_matrix(cm: ConfusionMatrix) -> Self {
        Self {
            accuracy: cm.accuracy(),
            balanced_accuracy: cm.balanced_accuracy(),
            precision: cm.precision(),
            recall: cm.recall(),
            f1_score: cm.f1_score(),
            mcc: cm.mcc(),
            specificity: cm.specificity(),
            support: cm.total(),
            confusion_matrix: cm,
        }
    }

    pub fn from_predictions(predictions: &[Label], ground_truth: &[Label]) -> Result<Self> {
        let cm = ConfusionMatrix::from_predictions(predictions, ground_truth)?;
        Ok(Self::from_confusion_matrix(cm))
    }

    pub fn metrics(&self) -> ClassificationMetrics {
        self.confusion_matrix.metrics()
    }

    /// Format as a human-readable string
    pub fn format(&self) -> String {
        format!(
            r#"Classification Report
=====================
Accuracy:          {:.4} ({:.2}%)
Balanced Accuracy: {:.4} ({:.2}%)
Precision:         {:.4}
Recall:            {:.4}
F1 Score:          {:.4}
MCC:               {:.4}
Specificity:       {:.4}
Support:           {}

Confusion Matrix:
                  Predicted
                  Disease   Healthy
Actual Disease   {:>6}    {:>6}
       Healthy   {:>6}    {:>6}
"#,
            self.accuracy, self.accuracy * 100.0,
            self.balanced_accuracy, self.balanced_accuracy * 100.0,
            self.precision,
            self.recall,
            self.f1_score,
            self.mcc,
            self.specificity,
            self.support,
            self.confusion_matrix.tp, self.confusion_matrix.fn_,
            self.confusion_matrix.fp, self.confusion_matrix.tn,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[u8]) -> Vec<Label> {
        values.iter().map(|v| Label::from_binary(*v)).collect()
    }

    #[test]
    fn test_confusion_matrix_perfect() {
        let truth = labels(&[1, 1, 0, 0]);
        let cm = ConfusionMatrix::from_predictions(&truth, &truth).unwrap();

        assert_eq!(cm.tp, 2);
        assert_eq!(cm.tn, 2);
        assert!((cm.accuracy() - 1.0).abs() < 1e-6);
        assert!((cm.f1_score() - 1.0).abs() < 1e-6);
        assert!((cm.mcc() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_partial_recall_scenario() {
        let truth = labels(&[1, 1, 0, 0]);
        let predictions = labels(&[1, 0, 0, 0]);
        let cm = ConfusionMatrix::from_predictions(&predictions, &truth).unwrap();

        assert_eq!(cm, ConfusionMatrix { tp: 1, tn: 2, fp: 0, fn_: 1 });
        let m = cm.metrics();
        assert!((m.accuracy - 0.75).abs() < 1e-9);
        assert!((m.precision - 1.0).abs() < 1e-9);
        assert!((m.recall - 0.5).abs() < 1e-9);
        assert!((m.f1_score - 2.0 / 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_all_negative_predictions() {
        let truth = labels(&[1, 0, 1, 0]);
        let predictions = labels(&[0, 0, 0, 0]);
        let m = ClassificationMetrics::compute(&predictions, &truth).unwrap();

        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1_score, 0.0);
        assert!((m.accuracy - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_length_mismatch() {
        let result = ConfusionMatrix::from_predictions(&labels(&[1, 0]), &labels(&[1]));
        assert!(matches!(
            result,
            Err(EvalError::LengthMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_mean_over_folds() {
        let folds = [
            ClassificationMetrics { accuracy: 1.0, precision: 0.5, recall: 0.0, f1_score: 0.2 },
            ClassificationMetrics { accuracy: 0.5, precision: 0.5, recall: 1.0, f1_score: 0.4 },
        ];
        let mean = ClassificationMetrics::mean(&folds);

        assert!((mean.accuracy - 0.75).abs() < 1e-9);
        assert!((mean.precision - 0.5).abs() < 1e-9);
        assert!((mean.recall - 0.5).abs() < 1e-9);
        assert!((mean.f1_score - 0.3).abs() < 1e-9);
        assert_eq!(ClassificationMetrics::mean(&[]), ClassificationMetrics::default());
    }

    #[test]
    fn test_classification_report_format() {
        let report = ClassificationReport::from_predictions(&labels(&[1, 1, 0, 0]), &labels(&[1, 0, 0, 0])).unwrap();
        let formatted = report.format();

        assert_eq!(report.support, 4);
        assert!(formatted.contains("Classification Report"));
        assert!(formatted.contains("Confusion Matrix"));
    }
}
