// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Standalone single-model runner
//!
//! Trains one classifier with fixed hyperparameters and scores it on the
//! held-out split, optionally reporting k-fold cross-validation first.

use anyhow::{bail, Context, Result};
use clap::Parser;
use liver_eval::classifiers::{ModelKind, KERNEL};
use liver_eval::datasets::{Dataset, Label};
use liver_eval::grid_search::GridSearch;
use liver_eval::hyperparams::{HyperparameterGrid, Kernel, ParamSet};
use liver_eval::metrics::ClassificationReport;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "run-model")]
#[command(about = "Train and test a single classifier with fixed hyperparameters")]
#[command(version)]
struct Args {
    /// Model to run (logistic, tree, svm)
    #[arg(short, long)]
    model: Option<String>,

    /// Hyperparameter as name=value, repeatable (e.g. --param join=5)
    #[arg(long = "param")]
    params: Vec<String>,

    /// SVM kernel (linear, gaussian[:eps], polynomial[:constant:degree])
    #[arg(long)]
    kernel: Option<String>,

    /// Path to the liver patient CSV (synthetic data when omitted)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Random seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Records in the synthetic dataset
    #[arg(short, long, default_value_t = 583)]
    num_samples: usize,

    /// Share of records used for training
    #[arg(long, default_value_t = 0.8)]
    train_ratio: f64,

    /// Standardise features and cap IQR outliers before fitting
    #[arg(long)]
    preprocess: bool,

    /// Also report k-fold cross-validation on the training split
    #[arg(short = 'k', long)]
    folds: Option<usize>,

    /// List available models and their default grids
    #[arg(long)]
    list: bool,
}

/// Start from the first point of the default grid, then apply overrides.
/// Names the model does not read are rejected.
fn build_params(kind: ModelKind, overrides: &[String], kernel: Option<&str>) -> Result<ParamSet> {
    let mut params = kind
        .default_grid()
        .combinations()
        .into_iter()
        .next()
        .context("default grid is empty")?;

    for entry in overrides {
        let Some((name, value)) = entry.split_once('=') else {
            bail!("expected name=value, got {:?}", entry);
        };
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("parameter {} is not a number", name))?;
        kind.set_param(&mut params, name.trim(), value)?;
    }

    if let Some(kernel) = kernel {
        kind.set_param(&mut params, KERNEL, kernel.parse::<Kernel>()?)?;
    }
    Ok(params)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.list {
        println!("Available models:");
        println!("-----------------");
        for kind in ModelKind::ALL {
            println!("  {}: {}", kind.name(), kind.build().description());
            for axis in kind.default_grid().axes {
                let values: Vec<String> = axis.values.iter().map(|v| v.to_string()).collect();
                println!("      {} in [{}]", axis.name, values.join(", "));
            }
        }
        return Ok(());
    }

    let kind: ModelKind = args
        .model
        .as_deref()
        .context("--model is required unless --list is given")?
        .parse()?;
    let params = build_params(kind, &args.params, args.kernel.as_deref())?;

    let dataset = match args.path {
        Some(ref path) => Dataset::load_csv(path).with_context(|| format!("loading {}", path.display()))?,
        None => {
            tracing::info!("Loading synthetic dataset ({} samples, seed={})", args.num_samples, args.seed);
            Dataset::load_synthetic(args.num_samples, args.seed)
        }
    };

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let (train, test) = dataset.train_test_split(args.train_ratio, &mut rng)?;

    println!("\nDataset: {}", dataset.config.name);
    println!("  Train samples: {}", train.len());
    println!("  Test samples: {}", test.len());

    println!("\nTrain distribution:");
    for (label, count) in &Dataset::label_distribution(&train) {
        println!("  {:?}: {} ({:.1}%)", label, count, *count as f64 / train.len() as f64 * 100.0);
    }

    println!("\n{}", "=".repeat(70));
    println!("{} with {}", kind, params);
    println!("{}", "=".repeat(70));

    if let Some(k) = args.folds {
        let grid = params
            .iter()
            .fold(HyperparameterGrid::new(), |grid, (name, value)| grid.axis(name, [*value]));
        let outcome = GridSearch::new().run(|| kind.build_with(args.preprocess), &grid, &train, k, &mut rng)?;
        let m = outcome.best.metrics;
        println!(
            "\n{}-fold cross-validation: accuracy={:.4}, precision={:.4}, recall={:.4}, F1={:.4}",
            k, m.accuracy, m.precision, m.recall, m.f1_score
        );
    }

    let mut model = kind.build_with(args.preprocess);
    model.train(&train, &params)?;
    let predicted = model.predict(&test)?;
    let truth: Vec<Label> = test.iter().map(|r| r.label).collect();
    let report = ClassificationReport::from_predictions(&predicted, &truth)?;

    println!("\n{}", report.format());

    Ok(())
}
