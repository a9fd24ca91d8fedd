// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Reproducible evaluation pipeline for liver disease classifiers
//!
//! Orchestrates:
//! - Dataset loading (CSV or synthetic)
//! - Seeded train/test split
//! - One fold assignment shared by every model's grid search
//! - Refit on the full training split and scoring on the test split
//! - Model card generation
//! - Results serialization

use crate::classifiers::ModelKind;
use crate::datasets::{Dataset, Label, PatientRecord, FEATURE_NAMES};
use crate::folds::FoldSet;
use crate::grid_search::GridSearch;
use crate::hyperparams::{HyperparameterGrid, ParamSet};
use crate::metrics::{ClassificationMetrics, ClassificationReport};
use crate::model_card::{ModelCard, ModelCardBuilder};
use crate::statistics::{summarize, CorrelationMatrix, FeatureSummary, RecordFilter};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Search space override for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelGrid {
    pub model: ModelKind,
    pub grid: HyperparameterGrid,
}

/// Configuration for the evaluation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Random seed for the split and the fold assignment
    pub seed: u64,
    /// CSV file to load; a synthetic dataset is generated when absent
    pub dataset_path: Option<String>,
    /// Number of records in the synthetic dataset
    pub synthetic_size: usize,
    /// Share of records used for training, in (0, 1)
    pub train_ratio: f64,
    /// Number of cross-validation folds
    pub folds: usize,
    /// Models to tune, in evaluation order
    pub models: Vec<ModelKind>,
    /// Per-model grids replacing the built-in defaults
    pub grids: Vec<ModelGrid>,
    /// Evaluate grid combinations on the rayon pool
    pub parallel: bool,
    /// Z-score features and cap IQR outliers before fitting
    pub preprocess: bool,
    /// Output directory for results
    pub output_dir: String,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            dataset_path: None,
            synthetic_size: 583,
            train_ratio: 0.8,
            folds: 5,
            models: ModelKind::ALL.to_vec(),
            grids: Vec::new(),
            parallel: false,
            preprocess: false,
            output_dir: "eval/results".to_string(),
        }
    }
}

impl EvaluationConfig {
    pub fn load_from_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// The configured grid for `model`, or its default grid
    pub fn grid_for(&self, model: ModelKind) -> HyperparameterGrid {
        self.grids
            .iter()
            .find(|g| g.model == model)
            .map(|g| g.grid.clone())
            .unwrap_or_else(|| model.default_grid())
    }
}

/// Results from tuning and testing a single model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResult {
    pub model: ModelKind,
    pub model_name: String,
    pub model_description: String,
    pub best_params: ParamSet,
    pub cv_metrics: ClassificationMetrics,
    pub combinations_evaluated: usize,
    pub folds: usize,
    pub preprocessed: bool,
    pub test_report: ClassificationReport,
    pub training_samples: usize,
    pub test_samples: usize,
}

/// Complete evaluation results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResults {
    pub config: EvaluationConfig,
    pub dataset_info: DatasetInfo,
    pub model_results: Vec<ModelResult>,
    pub summary: EvaluationSummary,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub id: String,
    pub name: String,
    pub source: String,
    pub total_samples: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    pub label_distribution: HashMap<String, usize>,
    pub feature_summary: Vec<FeatureSummary>,
    pub correlations: CorrelationMatrix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub best_model: String,
    pub best_f1: f64,
    pub best_accuracy: f64,
    pub model_comparison: Vec<ModelComparison>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub model: String,
    pub cv_precision: f64,
    pub cv_recall: f64,
    pub cv_f1: f64,
    pub test_accuracy: f64,
    pub test_precision: f64,
    pub test_recall: f64,
    pub test_f1: f64,
    pub test_mcc: f64,
}

/// Main evaluation pipeline
pub struct EvaluationPipeline {
    config: EvaluationConfig,
    dataset: Option<Dataset>,
}

impl EvaluationPipeline {
    pub fn new(config: EvaluationConfig) -> Self {
        Self {
            config,
            dataset: None,
        }
    }

    /// Use an already loaded dataset instead of the configured source
    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.dataset = Some(dataset);
        self
    }

    /// Load dataset based on configuration
    pub fn load_dataset(&mut self) -> Result<()> {
        let dataset = match self.config.dataset_path {
            Some(ref path) => {
                tracing::info!("Loading liver patient records from {}", path);
                Dataset::load_csv(Path::new(path)).with_context(|| format!("loading dataset {}", path))?
            }
            None => {
                tracing::warn!(
                    "No dataset path provided, using synthetic dataset ({} records, seed={})",
                    self.config.synthetic_size,
                    self.config.seed
                );
                Dataset::load_synthetic(self.config.synthetic_size, self.config.seed)
            }
        };

        tracing::info!("Dataset loaded: {} records", dataset.len());
        self.dataset = Some(dataset);
        Ok(())
    }

    /// Tune one model over `folds`, refit the winner on all of `train` and score it on `test`
    fn evaluate_model(
        &self,
        kind: ModelKind,
        folds: &FoldSet<PatientRecord>,
        train: &[PatientRecord],
        test: &[PatientRecord],
    ) -> Result<ModelResult> {
        let grid = self.config.grid_for(kind);
        let preprocess = self.config.preprocess;
        let outcome = GridSearch::new()
            .parallel(self.config.parallel)
            .run_with_folds(|| kind.build_with(preprocess), &grid, folds)
            .with_context(|| format!("grid search for {}", kind))?;

        let mut model = kind.build_with(preprocess);
        model
            .train(train, &outcome.best.params)
            .with_context(|| format!("refitting {} with {}", kind, outcome.best.params))?;
        let predicted = model.predict(test)?;
        let truth: Vec<Label> = test.iter().map(|r| r.label).collect();
        let test_report = ClassificationReport::from_predictions(&predicted, &truth)?;

        Ok(ModelResult {
            model: kind,
            model_name: model.name().to_string(),
            model_description: model.description().to_string(),
            best_params: outcome.best.params,
            cv_metrics: outcome.best.metrics,
            combinations_evaluated: outcome.combinations_evaluated,
            folds: outcome.folds,
            preprocessed: preprocess,
            test_report,
            training_samples: train.len(),
            test_samples: test.len(),
        })
    }

    /// Generate a model card for a specific model result
    pub fn generate_model_card(result: &ModelResult, dataset_info: &DatasetInfo) -> ModelCard {
        let mut builder = ModelCardBuilder::new(&result.model_name, env!("CARGO_PKG_VERSION"), result.model.name())
            .description(&format!(
                "Liver disease classifier tuned by {}-fold grid search. {}",
                result.folds, result.model_description
            ))
            .organization("Hyperpolymath")
            .hyperparameters(&result.best_params)
            .cross_validation(&result.cv_metrics, result.folds)
            .test_report(&result.test_report)
            .training_datasets(vec![dataset_info.name.clone()])
            .data_sizes(result.training_samples, result.test_samples)
            .label_distribution(dataset_info.label_distribution.clone())
            .features(&FEATURE_NAMES)
            .preprocessing(result.preprocessed);

        if !result.preprocessed && result.model != ModelKind::DecisionTree {
            builder = builder.add_caveat("Trained on unscaled features; this estimator is sensitive to feature ranges");
        }
        if result.cv_metrics.f1_score >= 1.0 {
            builder = builder.add_caveat("Perfect cross-validation F1; check the data for leakage or trivial separability");
        }
        builder.build()
    }

    /// Run the full evaluation pipeline
    pub fn run(&mut self) -> Result<EvaluationResults> {
        if self.dataset.is_none() {
            self.load_dataset()?;
        }
        let dataset = self.dataset.as_ref().context("dataset not loaded")?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let (train, test) = dataset.train_test_split(self.config.train_ratio, &mut rng)?;

        tracing::info!("Split: train={}, test={}", train.len(), test.len());

        let folds = FoldSet::partition(&train, self.config.folds, &mut rng)
            .with_context(|| format!("partitioning {} training records", train.len()))?;
        tracing::debug!(
            "Fold sizes: {:?}",
            folds.folds().iter().map(Vec::len).collect::<Vec<_>>()
        );

        let dataset_info = DatasetInfo {
            id: dataset.config.id.clone(),
            name: dataset.config.name.clone(),
            source: dataset.config.source.clone(),
            total_samples: dataset.len(),
            train_samples: train.len(),
            test_samples: test.len(),
            label_distribution: Dataset::label_distribution(dataset.records())
                .iter()
                .map(|(k, v)| (format!("{:?}", k), *v))
                .collect(),
            feature_summary: summarize(dataset.records(), RecordFilter::default()),
            correlations: CorrelationMatrix::from_records(dataset.records()),
        };

        let mut model_results = Vec::new();
        for &kind in &self.config.models {
            tracing::info!("Evaluating model: {}", kind);
            let result = self.evaluate_model(kind, &folds, &train, &test)?;

            tracing::info!(
                "  {} - CV F1: {:.4}, test accuracy: {:.4}, test F1: {:.4}",
                result.model_name,
                result.cv_metrics.f1_score,
                result.test_report.accuracy,
                result.test_report.f1_score
            );
            model_results.push(result);
        }

        let summary = summarize_results(&model_results);

        Ok(EvaluationResults {
            config: self.config.clone(),
            dataset_info,
            model_results,
            summary,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Fixed-width comparison table for the console
    pub fn format_comparison_table(results: &EvaluationResults) -> String {
        let rule = "-".repeat(118);
        let mut table = String::new();
        table.push_str(&format!("{}\n", rule));
        table.push_str(&format!(
            "{:<20} {:>8} {:>8} {:>8} {:>9} {:>9} {:>9} {:>9} {:>8}  {}\n",
            "Model", "CV Prec", "CV Rec", "CV F1", "Test Acc", "Test Prec", "Test Rec", "Test F1", "MCC", "Best parameters"
        ));
        table.push_str(&format!("{}\n", rule));

        for row in &results.summary.model_comparison {
            let params = results
                .model_results
                .iter()
                .find(|r| r.model_name == row.model)
                .map(|r| r.best_params.to_string())
                .unwrap_or_default();
            table.push_str(&format!(
                "{:<20} {:>8.4} {:>8.4} {:>8.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>8.4}  {}\n",
                row.model,
                row.cv_precision,
                row.cv_recall,
                row.cv_f1,
                row.test_accuracy,
                row.test_precision,
                row.test_recall,
                row.test_f1,
                row.test_mcc,
                params
            ));
        }
        table.push_str(&rule);
        table
    }

    /// Save results to JSON file
    pub fn save_results(results: &EvaluationResults, output_path: &Path) -> Result<()> {
        std::fs::create_dir_all(output_path.parent().unwrap_or(Path::new(".")))?;
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("writing results {}", output_path.display()))?;
        tracing::info!("Results saved to {}", output_path.display());
        Ok(())
    }

    /// Generate a markdown report
    pub fn generate_report(results: &EvaluationResults) -> String {
        let mut report = String::new();

        report.push_str("# Liver Disease Classifier Evaluation Report\n\n");
        report.push_str(&format!("**Generated:** {}\n\n", results.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
        report.push_str(&format!("**Version:** {}\n\n", results.version));

        let info = &results.dataset_info;
        report.push_str("## Dataset\n\n");
        report.push_str(&format!("- **ID:** {}\n", info.id));
        report.push_str(&format!("- **Name:** {}\n", info.name));
        report.push_str(&format!("- **Source:** {}\n", info.source));
        report.push_str(&format!("- **Total Samples:** {}\n", info.total_samples));
        report.push_str(&format!(
            "- **Split Sizes:** Train={}, Test={}\n",
            info.train_samples, info.test_samples
        ));
        let mut labels: Vec<_> = info.label_distribution.iter().collect();
        labels.sort();
        for (label, count) in labels {
            report.push_str(&format!("- **{}:** {}\n", label, count));
        }
        report.push('\n');

        if !info.feature_summary.is_empty() {
            report.push_str("### Feature Statistics\n\n");
            report.push_str("| Feature | Mean | Median | Std Dev | Min | Max |\n");
            report.push_str("|---------|------|--------|---------|-----|-----|\n");
            for f in &info.feature_summary {
                report.push_str(&format!(
                    "| {} | {:.3} | {:.3} | {:.3} | {:.3} | {:.3} |\n",
                    f.name, f.mean, f.median, f.std_dev, f.min, f.max
                ));
            }
            report.push('\n');
        }

        report.push_str("## Summary\n\n");
        report.push_str(&format!(
            "**Best Model:** {} (test F1={:.4}, Accuracy={:.4})\n\n",
            results.summary.best_model, results.summary.best_f1, results.summary.best_accuracy
        ));

        report.push_str("### Model Comparison\n\n");
        report.push_str(
            "| Model | Best Parameters | CV Precision | CV Recall | CV F1 | Test Accuracy | Test Precision | Test Recall | Test F1 | Test MCC |\n",
        );
        report.push_str(
            "|-------|-----------------|--------------|-----------|-------|---------------|----------------|-------------|---------|----------|\n",
        );
        for result in &results.model_results {
            report.push_str(&format!(
                "| {} | {} | {:.4} | {:.4} | {:.4} | {:.4} | {:.4} | {:.4} | {:.4} | {:.4} |\n",
                result.model_name,
                result.best_params,
                result.cv_metrics.precision,
                result.cv_metrics.recall,
                result.cv_metrics.f1_score,
                result.test_report.accuracy,
                result.test_report.precision,
                result.test_report.recall,
                result.test_report.f1_score,
                result.test_report.mcc
            ));
        }

        report.push_str("\n## Detailed Results\n\n");
        for result in &results.model_results {
            report.push_str(&format!("### {}\n\n", result.model_name));
            report.push_str(&format!("*{}*\n\n", result.model_description));
            report.push_str(&format!("- Best parameters: {}\n", result.best_params));
            report.push_str(&format!(
                "- Combinations evaluated: {} ({} folds)\n",
                result.combinations_evaluated, result.folds
            ));
            report.push_str(&format!(
                "- Cross-validation: accuracy={:.4}, precision={:.4}, recall={:.4}, F1={:.4}\n",
                result.cv_metrics.accuracy,
                result.cv_metrics.precision,
                result.cv_metrics.recall,
                result.cv_metrics.f1_score
            ));
            report.push_str(&format!("- Training samples: {}\n", result.training_samples));
            report.push_str(&format!("- Test samples: {}\n\n", result.test_samples));

            report.push_str("#### Test Metrics\n\n");
            report.push_str(&format!("```\n{}\n```\n\n", result.test_report.format()));
        }

        report.push_str("## Configuration\n\n");
        report.push_str(&format!(
            "```json\n{}\n```\n",
            serde_json::to_string_pretty(&results.config).unwrap_or_default()
        ));

        report
    }

    /// Generate and save model cards for all evaluated models
    pub fn save_model_cards(results: &EvaluationResults, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let cards_dir = output_dir.join("model_cards");
        std::fs::create_dir_all(&cards_dir)?;

        let mut saved_paths = Vec::new();

        for result in &results.model_results {
            let card = Self::generate_model_card(result, &results.dataset_info);
            let stem = result.model_name.to_lowercase().replace(' ', "_");

            let md_path = cards_dir.join(format!("{}_model_card.md", stem));
            card.save(&md_path)?;
            saved_paths.push(md_path);

            let json_path = cards_dir.join(format!("{}_model_card.json", stem));
            card.save_json(&json_path)?;
            saved_paths.push(json_path);

            tracing::info!("Model card saved: {}_model_card.md", stem);
        }

        Ok(saved_paths)
    }
}

/// Best model by strictly greater test F1; the first one wins ties
fn summarize_results(results: &[ModelResult]) -> EvaluationSummary {
    let mut best: Option<&ModelResult> = None;
    for result in results {
        if best.map_or(true, |b| result.test_report.f1_score > b.test_report.f1_score) {
            best = Some(result);
        }
    }

    EvaluationSummary {
        best_model: best.map_or("None".to_string(), |b| b.model_name.clone()),
        best_f1: best.map_or(0.0, |b| b.test_report.f1_score),
        best_accuracy: best.map_or(0.0, |b| b.test_report.accuracy),
        model_comparison: results
            .iter()
            .map(|r| ModelComparison {
                model: r.model_name.clone(),
                cv_precision: r.cv_metrics.precision,
                cv_recall: r.cv_metrics.recall,
                cv_f1: r.cv_metrics.f1_score,
                test_accuracy: r.test_report.accuracy,
                test_precision: r.test_report.precision,
                test_recall: r.test_report.recall,
                test_f1: r.test_report.f1_score,
                test_mcc: r.test_report.mcc,
            })
            .collect(),
    }
}
