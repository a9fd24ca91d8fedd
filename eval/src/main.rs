// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation pipeline CLI for liver disease classifiers
//!
//! Usage:
//!   liver-eval --path ./data/indian_liver_patient.csv --seed 42
//!   liver-eval --config eval/config.json --models tree,svm --parallel

use anyhow::{Context, Result};
use clap::Parser;
use liver_eval::classifiers::ModelKind;
use liver_eval::pipeline::{EvaluationConfig, EvaluationPipeline};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "liver-eval")]
#[command(about = "Tune and compare liver disease classifiers")]
#[command(version)]
struct Args {
    /// Path to the liver patient CSV (synthetic data when omitted)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of cross-validation folds
    #[arg(short = 'k', long)]
    folds: Option<usize>,

    /// Share of records used for training
    #[arg(long)]
    train_ratio: Option<f64>,

    /// Models to evaluate (comma-separated: logistic, tree, svm)
    #[arg(short, long)]
    models: Option<String>,

    /// Records in the synthetic dataset
    #[arg(long)]
    synthetic_size: Option<usize>,

    /// Evaluate grid combinations in parallel
    #[arg(long)]
    parallel: bool,

    /// Standardise features and cap IQR outliers before fitting
    #[arg(long)]
    preprocess: bool,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format (json, markdown, both)
    #[arg(short, long, default_value = "both")]
    format: String,

    /// Skip model card generation
    #[arg(long)]
    no_model_cards: bool,
}

impl Args {
    fn into_config(self) -> Result<(EvaluationConfig, String, bool)> {
        let mut config = match self.config {
            Some(ref path) => EvaluationConfig::load_from_json(path)?,
            None => EvaluationConfig::default(),
        };

        if let Some(path) = self.path {
            config.dataset_path = Some(path.to_string_lossy().to_string());
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(folds) = self.folds {
            config.folds = folds;
        }
        if let Some(ratio) = self.train_ratio {
            config.train_ratio = ratio;
        }
        if let Some(size) = self.synthetic_size {
            config.synthetic_size = size;
        }
        if let Some(models) = self.models {
            config.models = models
                .split(',')
                .map(|m| m.parse::<ModelKind>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("parsing --models")?;
        }
        if self.parallel {
            config.parallel = true;
        }
        if self.preprocess {
            config.preprocess = true;
        }
        if let Some(output) = self.output {
            config.output_dir = output.to_string_lossy().to_string();
        }

        Ok((config, self.format, !self.no_model_cards))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config, format, model_cards) = Args::parse().into_config()?;

    tracing::info!("Liver Disease Classifier Evaluation");
    tracing::info!("===================================");
    tracing::info!("Dataset: {}", config.dataset_path.as_deref().unwrap_or("synthetic"));
    tracing::info!("Seed: {}", config.seed);
    tracing::info!("Folds: {}, train ratio: {}", config.folds, config.train_ratio);
    tracing::info!("Feature preprocessing: {}", if config.preprocess { "z-score + IQR capping" } else { "none" });

    let output = PathBuf::from(&config.output_dir);
    let mut pipeline = EvaluationPipeline::new(config);
    let results = pipeline.run()?;

    println!("\n{}", "=".repeat(118));
    println!("EVALUATION SUMMARY");
    println!("{}", "=".repeat(118));
    println!(
        "\nBest Model: {} (test F1={:.4}, accuracy={:.4})",
        results.summary.best_model, results.summary.best_f1, results.summary.best_accuracy
    );
    println!("\nModel Comparison:");
    println!("{}", EvaluationPipeline::format_comparison_table(&results));

    std::fs::create_dir_all(&output)
        .with_context(|| format!("creating output directory {}", output.display()))?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let dataset_id = &results.dataset_info.id;

    if format == "json" || format == "both" {
        let json_path = output.join(format!("eval_{}_{}.json", dataset_id, timestamp));
        EvaluationPipeline::save_results(&results, &json_path)?;
        println!("\nJSON results saved to: {}", json_path.display());
    }

    if format == "markdown" || format == "both" {
        let report = EvaluationPipeline::generate_report(&results);
        let md_path = output.join(format!("eval_{}_{}.md", dataset_id, timestamp));
        std::fs::write(&md_path, report)?;
        println!("Markdown report saved to: {}", md_path.display());
    }

    if model_cards {
        let cards = EvaluationPipeline::save_model_cards(&results, &output)?;
        println!("Model cards saved to: {}/model_cards/ ({} files)", output.display(), cards.len());
    }

    println!("\nEvaluation complete!");

    Ok(())
}
