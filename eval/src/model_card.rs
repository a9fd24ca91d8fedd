// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Model cards for tuned liver-disease classifiers
//!
//! A card documents, for one tuned model:
//! - Model details and the selected hyperparameters
//! - Intended and out-of-scope clinical use
//! - Cross-validation and held-out test metrics
//! - Training data and known caveats

use crate::hyperparams::ParamSet;
use crate::metrics::{ClassificationMetrics, ClassificationReport};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCard {
    pub model_details: ModelDetails,
    pub intended_use: IntendedUse,
    pub metrics: MetricsSection,
    pub data: DataSection,
    pub caveats_and_recommendations: CaveatsAndRecommendations,
    pub card_metadata: CardMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDetails {
    pub name: String,
    pub version: String,
    /// Estimator family, e.g. "Decision Tree"
    pub model_type: String,
    pub description: String,
    pub organization: String,
    pub license: String,
    pub date: DateTime<Utc>,
    /// Library the estimator comes from
    pub framework: String,
    /// Hyperparameters chosen by the grid search, rendered as `name -> value`
    pub hyperparameters: Vec<(String, String)>,
}

impl Default for ModelDetails {
    fn default() -> Self {
        Self {
            name: "Unnamed Model".to_string(),
            version: "0.1.0".to_string(),
            model_type: "Unknown".to_string(),
            description: String::new(),
            organization: String::new(),
            license: "AGPL-3.0-or-later".to_string(),
            date: Utc::now(),
            framework: "Rust + linfa".to_string(),
            hyperparameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntendedUse {
    pub primary_uses: Vec<String>,
    pub primary_users: Vec<String>,
    pub out_of_scope_uses: Vec<String>,
}

impl Default for IntendedUse {
    fn default() -> Self {
        Self {
            primary_uses: vec![
                "Comparing classifier families on liver function test data".to_string(),
                "Teaching and research on hyperparameter selection".to_string(),
            ],
            primary_users: vec!["Researchers and students in medical machine learning".to_string()],
            out_of_scope_uses: vec![
                "Diagnosing individual patients".to_string(),
                "Replacing laboratory or clinical assessment".to_string(),
                "Populations whose test ranges differ from the training data".to_string(),
            ],
        }
    }
}

/// Metric values as reported on the card
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub mcc: Option<f64>,
    pub specificity: Option<f64>,
}

impl From<&ClassificationMetrics> for PerformanceMetrics {
    fn from(metrics: &ClassificationMetrics) -> Self {
        Self {
            accuracy: metrics.accuracy,
            precision: metrics.precision,
            recall: metrics.recall,
            f1_score: metrics.f1_score,
            mcc: None,
            specificity: None,
        }
    }
}

impl From<&ClassificationReport> for PerformanceMetrics {
    fn from(report: &ClassificationReport) -> Self {
        Self {
            accuracy: report.accuracy,
            precision: report.precision,
            recall: report.recall,
            f1_score: report.f1_score,
            mcc: Some(report.mcc),
            specificity: Some(report.specificity),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSection {
    /// Mean over the cross-validation folds of the winning combination
    pub cross_validation: PerformanceMetrics,
    pub folds: usize,
    /// Refit on the full training split, scored on the held-out split
    pub test: Option<PerformanceMetrics>,
}

const NO_SCALING: &str = "No feature scaling";
const SCALED: &str = "Z-score standardisation then IQR outlier capping, fitted on training rows";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSection {
    pub datasets: Vec<String>,
    pub training_size: Option<usize>,
    pub test_size: Option<usize>,
    pub label_distribution: HashMap<String, usize>,
    pub features: Vec<String>,
    pub preprocessing: Vec<String>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            datasets: Vec::new(),
            training_size: None,
            test_size: None,
            label_distribution: HashMap::new(),
            features: Vec::new(),
            preprocessing: vec![
                "Gender encoded as 0 (male) / 1 (female)".to_string(),
                "Blank albumin/globulin ratio replaced by 0.95".to_string(),
                NO_SCALING.to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaveatsAndRecommendations {
    pub caveats: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Default for CaveatsAndRecommendations {
    fn default() -> Self {
        Self {
            caveats: vec![
                "Small dataset (583 patients) drawn from a single region".to_string(),
                "Classes are imbalanced: roughly 70% of records are labelled as disease".to_string(),
                "Hyperparameters were selected by mean F1 only".to_string(),
            ],
            recommendations: vec![
                "Report test metrics alongside cross-validation metrics".to_string(),
                "Re-run with several seeds before comparing close scores".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardMetadata {
    pub schema_version: String,
    pub created: DateTime<Utc>,
}

impl Default for CardMetadata {
    fn default() -> Self {
        Self {
            schema_version: "1.0.0".to_string(),
            created: Utc::now(),
        }
    }
}

impl ModelCard {
    pub fn new(name: &str, version: &str, model_type: &str) -> Self {
        Self {
            model_details: ModelDetails {
                name: name.to_string(),
                version: version.to_string(),
                model_type: model_type.to_string(),
                ..Default::default()
            },
            intended_use: IntendedUse::default(),
            metrics: MetricsSection::default(),
            data: DataSection::default(),
            caveats_and_recommendations: CaveatsAndRecommendations::default(),
            card_metadata: CardMetadata::default(),
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("# Model Card: {}\n\n", self.model_details.name));

        md.push_str("## Model Details\n\n");
        md.push_str(&format!("- **Version:** {}\n", self.model_details.version));
        md.push_str(&format!("- **Type:** {}\n", self.model_details.model_type));
        md.push_str(&format!("- **Framework:** {}\n", self.model_details.framework));
        md.push_str(&format!("- **License:** {}\n", self.model_details.license));
        md.push_str(&format!("- **Date:** {}\n", self.model_details.date.format("%Y-%m-%d")));
        if !self.model_details.description.is_empty() {
            md.push_str(&format!("\n{}\n", self.model_details.description));
        }
        md.push('\n');

        if !self.model_details.hyperparameters.is_empty() {
            md.push_str("### Selected Hyperparameters\n\n");
            md.push_str("| Parameter | Value |\n");
            md.push_str("|-----------|-------|\n");
            for (name, value) in &self.model_details.hyperparameters {
                md.push_str(&format!("| {} | {} |\n", name, value));
            }
            md.push('\n');
        }

        md.push_str("## Intended Use\n\n");
        push_list(&mut md, "### Primary Uses", &self.intended_use.primary_uses);
        push_list(&mut md, "### Primary Users", &self.intended_use.primary_users);
        push_list(&mut md, "### Out-of-Scope Uses", &self.intended_use.out_of_scope_uses);

        md.push_str("## Performance Metrics\n\n");
        md.push_str("| Metric | Cross-validation | Test |\n");
        md.push_str("|--------|------------------|------|\n");
        let cv = &self.metrics.cross_validation;
        let test = self.metrics.test.as_ref();
        let rows = [
            ("Accuracy", Some(cv.accuracy), test.map(|t| t.accuracy)),
            ("Precision", Some(cv.precision), test.map(|t| t.precision)),
            ("Recall", Some(cv.recall), test.map(|t| t.recall)),
            ("F1 Score", Some(cv.f1_score), test.map(|t| t.f1_score)),
            ("MCC", cv.mcc, test.and_then(|t| t.mcc)),
            ("Specificity", cv.specificity, test.and_then(|t| t.specificity)),
        ];
        for (name, cv_value, test_value) in rows {
            md.push_str(&format!("| {} | {} | {} |\n", name, cell(cv_value), cell(test_value)));
        }
        md.push_str(&format!("\n*Cross-validation over {} folds.*\n\n", self.metrics.folds));

        md.push_str("## Training Data\n\n");
        if !self.data.datasets.is_empty() {
            md.push_str("**Datasets:**\n");
            for ds in &self.data.datasets {
                md.push_str(&format!("- {}\n", ds));
            }
        }
        if let Some(size) = self.data.training_size {
            md.push_str(&format!("\n**Training size:** {} records\n", size));
        }
        if let Some(size) = self.data.test_size {
            md.push_str(&format!("**Test size:** {} records\n", size));
        }
        if !self.data.features.is_empty() {
            md.push_str(&format!("\n**Features:** {}\n", self.data.features.join(", ")));
        }
        md.push('\n');
        push_list(&mut md, "**Preprocessing:**", &self.data.preprocessing);

        md.push_str("## Caveats and Recommendations\n\n");
        push_list(&mut md, "### Known Limitations", &self.caveats_and_recommendations.caveats);
        push_list(&mut md, "### Recommendations", &self.caveats_and_recommendations.recommendations);

        md.push_str("---\n\n");
        md.push_str(&format!(
            "*Model Card generated on {} (schema v{})*\n",
            self.card_metadata.created.format("%Y-%m-%d"),
            self.card_metadata.schema_version
        ));

        md
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_markdown())
            .with_context(|| format!("writing model card {}", path.display()))
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing model card {}", path.display()))
    }
}

fn push_list(md: &mut String, heading: &str, items: &[String]) {
    md.push_str(heading);
    md.push_str("\n\n");
    for item in items {
        md.push_str(&format!("- {}\n", item));
    }
    md.push('\n');
}

fn cell(value: Option<f64>) -> String {
    value.map_or("-".to_string(), |v| format!("{:.4}", v))
}

pub struct ModelCardBuilder {
    card: ModelCard,
}

impl ModelCardBuilder {
    pub fn new(name: &str, version: &str, model_type: &str) -> Self {
        Self {
            card: ModelCard::new(name, version, model_type),
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.card.model_details.description = desc.to_string();
        self
    }

    pub fn organization(mut self, org: &str) -> Self {
        self.card.model_details.organization = org.to_string();
        self
    }

    pub fn hyperparameters(mut self, params: &ParamSet) -> Self {
        self.card.model_details.hyperparameters = params
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();
        self
    }

    pub fn cross_validation(mut self, metrics: &ClassificationMetrics, folds: usize) -> Self {
        self.card.metrics.cross_validation = PerformanceMetrics::from(metrics);
        self.card.metrics.folds = folds;
        self
    }

    pub fn test_report(mut self, report: &ClassificationReport) -> Self {
        self.card.metrics.test = Some(PerformanceMetrics::from(report));
        self
    }

    pub fn training_datasets(mut self, datasets: Vec<String>) -> Self {
        self.card.data.datasets = datasets;
        self
    }

    pub fn data_sizes(mut self, training: usize, test: usize) -> Self {
        self.card.data.training_size = Some(training);
        self.card.data.test_size = Some(test);
        self
    }

    pub fn label_distribution(mut self, distribution: HashMap<String, usize>) -> Self {
        self.card.data.label_distribution = distribution;
        self
    }

    pub fn features(mut self, features: &[&str]) -> Self {
        self.card.data.features = features.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Record whether features were standardised and outlier-capped
    pub fn preprocessing(mut self, scaled: bool) -> Self {
        let step = if scaled { SCALED } else { NO_SCALING };
        self.card.data.preprocessing.retain(|p| p != NO_SCALING && p != SCALED);
        self.card.data.preprocessing.push(step.to_string());
        self
    }

    pub fn add_caveat(mut self, caveat: &str) -> Self {
        self.card.caveats_and_recommendations.caveats.push(caveat.to_string());
        self
    }

    pub fn build(self) -> ModelCard {
        self.card
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::{Label, FEATURE_NAMES};

    #[test]
    fn test_model_card_builder() {
        let params = ParamSet::new().with("join", 5.0).with("max_height", 10.0);
        let card = ModelCardBuilder::new("Decision Tree", "1.0.0", "Decision Tree")
            .description("Entropy-split tree")
            .hyperparameters(&params)
            .training_datasets(vec!["Indian Liver Patient Dataset".to_string()])
            .data_sizes(466, 117)
            .features(&FEATURE_NAMES)
            .build();

        assert_eq!(card.model_details.name, "Decision Tree");
        assert_eq!(card.model_details.hyperparameters[0], ("join".to_string(), "5".to_string()));
        assert_eq!(card.data.training_size, Some(466));
        assert_eq!(card.data.features.len(), 7);
    }

    #[test]
    fn test_preprocessing_and_caveats() {
        let card = ModelCardBuilder::new("SVM", "1.0.0", "SVM")
            .preprocessing(true)
            .add_caveat("Trained on a synthetic cohort")
            .build();

        assert_eq!(card.data.preprocessing.last().map(String::as_str), Some(SCALED));
        assert!(!card.data.preprocessing.iter().any(|p| p == NO_SCALING));
        assert_eq!(card.caveats_and_recommendations.caveats.len(), 4);
        assert!(card.to_markdown().contains("- Trained on a synthetic cohort"));

        let unscaled = ModelCardBuilder::new("SVM", "1.0.0", "SVM").preprocessing(false).build();
        assert_eq!(unscaled.data.preprocessing.iter().filter(|p| *p == NO_SCALING).count(), 1);
    }

    #[test]
    fn test_model_card_markdown() {
        let report = ClassificationReport::from_predictions(
            &[Label::Disease, Label::NoDisease],
            &[Label::Disease, Label::NoDisease],
        )
        .unwrap();
        let card = ModelCardBuilder::new("SVM", "1.0.0", "SVM")
            .cross_validation(&report.metrics(), 5)
            .test_report(&report)
            .build();
        let md = card.to_markdown();

        assert!(md.contains("# Model Card: SVM"));
        assert!(md.contains("## Performance Metrics"));
        assert!(md.contains("| F1 Score | 1.0000 | 1.0000 |"));
        assert!(md.contains("| MCC | - | 1.0000 |"));
        assert!(md.contains("## Intended Use"));
    }

    #[test]
    fn test_save_card_files() {
        let dir = tempfile::tempdir().unwrap();
        let card = ModelCard::new("Logistic Regression", "1.0.0", "Logistic Regression");

        let md_path = dir.path().join("card.md");
        let json_path = dir.path().join("card.json");
        card.save(&md_path).unwrap();
        card.save_json(&json_path).unwrap();

        let parsed: ModelCard = serde_json::from_str(&std::fs::read_to_string(json_path).unwrap()).unwrap();
        assert_eq!(parsed.model_details.name, "Logistic Regression");
        assert!(std::fs::read_to_string(md_path).unwrap().starts_with("# Model Card"));
    }
}
