// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Cross-validated grid search
//!
//! Every combination of the grid is trained on k-1 folds and scored on the
//! held-out fold, k times. The combination with the strictly greatest mean F1
//! wins; on ties the one enumerated first is kept, in both sequential and
//! parallel mode.

use crate::classifiers::Classifier;
use crate::datasets::{Label, PatientRecord};
use crate::error::{EvalError, Result};
use crate::folds::FoldSet;
use crate::hyperparams::{HyperparameterGrid, ParamSet};
use crate::metrics::ClassificationMetrics;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Mean cross-validation metrics of one parameter combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub params: ParamSet,
    pub metrics: ClassificationMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchOutcome {
    pub best: EvaluationResult,
    pub combinations_evaluated: usize,
    pub folds: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GridSearch {
    parallel: bool,
}

type FoldSplit<'a> = (Vec<PatientRecord>, &'a [PatientRecord]);

impl GridSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate combinations on the rayon pool instead of one after another
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Partition `records` into `k` folds with `rng`, then search the grid
    pub fn run<F, R>(
        &self,
        make_model: F,
        grid: &HyperparameterGrid,
        records: &[PatientRecord],
        k: usize,
        rng: &mut R,
    ) -> Result<GridSearchOutcome>
    where
        F: Fn() -> Box<dyn Classifier> + Sync,
        R: Rng + ?Sized,
    {
        let folds = FoldSet::partition(records, k, rng)?;
        self.run_with_folds(make_model, grid, &folds)
    }

    /// Search the grid over an existing fold assignment.
    /// The first training or prediction error aborts the whole search.
    pub fn run_with_folds<F>(
        &self,
        make_model: F,
        grid: &HyperparameterGrid,
        folds: &FoldSet<PatientRecord>,
    ) -> Result<GridSearchOutcome>
    where
        F: Fn() -> Box<dyn Classifier> + Sync,
    {
        let combinations = grid.combinations();
        if combinations.is_empty() {
            return Err(EvalError::EmptyGrid);
        }
        let combinations_evaluated = combinations.len();

        let splits: Vec<FoldSplit<'_>> = (0..folds.len()).map(|i| folds.split(i)).collect();

        tracing::info!(
            "Grid search: {} combinations x {} folds{}",
            combinations_evaluated,
            folds.len(),
            if self.parallel { " (parallel)" } else { "" }
        );

        let mut best: Option<EvaluationResult> = None;
        if self.parallel {
            let scored = combinations
                .into_par_iter()
                .map(|params| evaluate_combination(&make_model, params, &splits))
                .collect::<Result<Vec<_>>>()?;
            for result in scored {
                keep_better(&mut best, result);
            }
        } else {
            for params in combinations {
                let result = evaluate_combination(&make_model, params, &splits)?;
                keep_better(&mut best, result);
            }
        }

        let best = best.ok_or(EvalError::EmptyGrid)?;
        tracing::info!(
            "Best parameters: {} (mean F1={:.4}, accuracy={:.4})",
            best.params,
            best.metrics.f1_score,
            best.metrics.accuracy
        );

        Ok(GridSearchOutcome {
            best,
            combinations_evaluated,
            folds: folds.len(),
        })
    }
}

/// Replace the running best only on a strictly greater F1
fn keep_better(best: &mut Option<EvaluationResult>, candidate: EvaluationResult) {
    let replace = match best {
        Some(current) => candidate.metrics.f1_score > current.metrics.f1_score,
        None => true,
    };
    if replace {
        *best = Some(candidate);
    }
}

fn evaluate_combination<F>(make_model: &F, params: ParamSet, splits: &[FoldSplit<'_>]) -> Result<EvaluationResult>
where
    F: Fn() -> Box<dyn Classifier>,
{
    let mut fold_metrics = Vec::with_capacity(splits.len());

    for (training, validation) in splits {
        let mut model = make_model();
        model.train(training, &params)?;
        let predicted = model.predict(validation)?;
        let truth: Vec<Label> = validation.iter().map(|r| r.label).collect();
        fold_metrics.push(ClassificationMetrics::compute(&predicted, &truth)?);
    }

    let metrics = ClassificationMetrics::mean(&fold_metrics);
    tracing::debug!("  {} -> F1={:.4}", params, metrics.f1_score);

    Ok(EvaluationResult { params, metrics })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifiers::{ModelKind, JOIN, MAX_HEIGHT};
    use crate::datasets::Dataset;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Predicts disease when direct bilirubin exceeds the `threshold` parameter
    struct ThresholdClassifier {
        threshold: Option<f64>,
    }

    impl Classifier for ThresholdClassifier {
        fn train(&mut self, _records: &[PatientRecord], params: &ParamSet) -> Result<()> {
            let threshold = params.number("threshold")?;
            if threshold < 0.0 {
                return Err(EvalError::external("threshold", "negative threshold"));
            }
            self.threshold = Some(threshold);
            Ok(())
        }

        fn predict(&self, records: &[PatientRecord]) -> Result<Vec<Label>> {
            let threshold = self.threshold.ok_or(EvalError::ModelNotFitted("threshold"))?;
            Ok(records
                .iter()
                .map(|r| if r.direct_bilirubin > threshold { Label::Disease } else { Label::NoDisease })
                .collect())
        }

        fn kind(&self) -> ModelKind {
            ModelKind::DecisionTree
        }

        fn description(&self) -> &str {
            "test threshold"
        }
    }

    fn threshold_model() -> Box<dyn Classifier> {
        Box::new(ThresholdClassifier { threshold: None })
    }

    fn folds(seed: u64) -> FoldSet<PatientRecord> {
        let dataset = Dataset::load_synthetic(150, 11);
        FoldSet::partition(dataset.records(), 5, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_picks_best_threshold() {
        let grid = HyperparameterGrid::new().axis("threshold", [100.0, 0.15, 0.0]);
        let outcome = GridSearch::new().run_with_folds(threshold_model, &grid, &folds(1)).unwrap();

        assert_eq!(outcome.combinations_evaluated, 3);
        assert_eq!(outcome.folds, 5);
        assert!(outcome.best.metrics.f1_score > 0.0);
        assert_ne!(outcome.best.params.number("threshold").unwrap(), 100.0);
    }

    #[test]
    fn test_ties_keep_first_combination() {
        // Both thresholds are above every value, so both score identically.
        let grid = HyperparameterGrid::new().axis("threshold", [500.0, 900.0]);
        let outcome = GridSearch::new().run_with_folds(threshold_model, &grid, &folds(2)).unwrap();
        assert_eq!(outcome.best.params.number("threshold").unwrap(), 500.0);

        let parallel = GridSearch::new()
            .parallel(true)
            .run_with_folds(threshold_model, &grid, &folds(2))
            .unwrap();
        assert_eq!(parallel.best.params.number("threshold").unwrap(), 500.0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let grid = HyperparameterGrid::new().axis("threshold", [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let folds = folds(3);

        let sequential = GridSearch::new().run_with_folds(threshold_model, &grid, &folds).unwrap();
        let parallel = GridSearch::new().parallel(true).run_with_folds(threshold_model, &grid, &folds).unwrap();
        assert_eq!(sequential.best, parallel.best);
    }

    #[test]
    fn test_training_failure_aborts() {
        let grid = HyperparameterGrid::new().axis("threshold", [0.2, -1.0, 0.4]);
        let result = GridSearch::new().run_with_folds(threshold_model, &grid, &folds(4));
        assert!(matches!(result, Err(EvalError::ExternalLibrary { .. })));
    }

    #[test]
    fn test_empty_grid() {
        let result = GridSearch::new().run_with_folds(threshold_model, &HyperparameterGrid::new(), &folds(5));
        assert!(matches!(result, Err(EvalError::EmptyGrid)));
    }

    #[test]
    fn test_single_combination_is_deterministic() {
        let grid = HyperparameterGrid::new().axis(JOIN, [2.0]).axis(MAX_HEIGHT, [5.0]);
        let folds = folds(6);
        let make = || ModelKind::DecisionTree.build();

        let first = GridSearch::new().run_with_folds(make, &grid, &folds).unwrap();
        let second = GridSearch::new().run_with_folds(make, &grid, &folds).unwrap();
        assert_eq!(first.best, second.best);
    }

    #[test]
    fn test_run_partitions_records() {
        let dataset = Dataset::load_synthetic(40, 8);
        let grid = HyperparameterGrid::new().axis("threshold", [0.3]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let outcome = GridSearch::new()
            .run(threshold_model, &grid, dataset.records(), 4, &mut rng)
            .unwrap();
        assert_eq!(outcome.folds, 4);

        let too_many = GridSearch::new().run(threshold_model, &grid, dataset.records(), 41, &mut rng);
        assert!(matches!(too_many, Err(EvalError::InvalidFolds { .. })));
    }
}
