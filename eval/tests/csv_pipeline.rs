// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

use liver_eval::classifiers::{ModelKind, JOIN, MAX_HEIGHT};
use liver_eval::datasets::{Dataset, Label, DEFAULT_AG_RATIO};
use liver_eval::pipeline::{EvaluationConfig, EvaluationPipeline, ModelGrid};
use liver_eval::{EvalError, HyperparameterGrid};
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str = "Age,Gender,Total_Bilirubin,Direct_Bilirubin,Alkaline_Phosphotase,Alamine_Aminotransferase,Aspartate_Aminotransferase,Total_Protiens,Albumin,Albumin_and_Globulin_Ratio,Dataset";

/// Deterministic rows: every third patient is healthy with low bilirubin
fn patient_rows(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let healthy = i % 3 == 0;
            let gender = if i % 4 == 0 { "Female" } else { "Male" };
            let bilirubin = if healthy { 0.6 + (i % 5) as f64 * 0.1 } else { 2.0 + (i % 7) as f64 * 0.5 };
            let ratio = if i % 10 == 9 { String::new() } else { format!("{:.2}", 0.8 + (i % 4) as f64 * 0.1) };
            format!(
                "{},{},{:.1},{:.2},{},{},{},6.{},3.{},{},{}",
                20 + i % 50,
                gender,
                bilirubin,
                bilirubin * 0.4,
                150 + (i % 9) * 20 + if healthy { 0 } else { 200 },
                20 + i % 30,
                25 + i % 40,
                i % 10,
                i % 9,
                ratio,
                if healthy { 2 } else { 1 }
            )
        })
        .collect()
}

fn write_csv(dir: &Path, rows: &[String]) -> std::path::PathBuf {
    let path = dir.join("indian_liver_patient.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
    path
}

#[test]
fn csv_loads_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(dir.path(), &patient_rows(30));

    let dataset = Dataset::load_csv(&path).unwrap();
    assert_eq!(dataset.len(), 30);
    assert_eq!(dataset.config.source, path.display().to_string());
    assert_eq!(dataset.records()[9].albumin_globulin_ratio, DEFAULT_AG_RATIO);
    assert_eq!(dataset.records()[0].label, Label::NoDisease);
    assert_eq!(dataset.records()[1].label, Label::Disease);
}

#[test]
fn malformed_rows_fail_fast() {
    let dir = TempDir::new().unwrap();

    let mut rows = patient_rows(5);
    rows.push("40,Male,1.0,0.3,200,20,30,6.5,3.1,1.0".to_string());
    let path = write_csv(dir.path(), &rows);
    assert!(matches!(Dataset::load_csv(&path), Err(EvalError::Csv(_))));

    let mut rows = patient_rows(5);
    rows.push("40,Male,1.0,0.3,200,20,30,6.5,3.1,1.0,3".to_string());
    let path = write_csv(dir.path(), &rows);
    assert!(matches!(Dataset::load_csv(&path), Err(EvalError::InvalidValue { .. })));

    assert!(matches!(
        Dataset::load_csv(&dir.path().join("missing.csv")),
        Err(EvalError::Io(_))
    ));
}

#[test]
fn pipeline_runs_from_csv() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(dir.path(), &patient_rows(90));

    let config = EvaluationConfig {
        dataset_path: Some(path.display().to_string()),
        folds: 3,
        models: vec![ModelKind::DecisionTree],
        grids: vec![ModelGrid {
            model: ModelKind::DecisionTree,
            grid: HyperparameterGrid::new().axis(JOIN, [2.0, 5.0]).axis(MAX_HEIGHT, [4.0]),
        }],
        output_dir: dir.path().display().to_string(),
        ..Default::default()
    };

    let results = EvaluationPipeline::new(config).run().unwrap();
    assert_eq!(results.dataset_info.total_samples, 90);
    assert_eq!(results.dataset_info.train_samples, 72);
    assert_eq!(results.dataset_info.label_distribution.get("NoDisease"), Some(&30));

    let tree = &results.model_results[0];
    assert_eq!(tree.combinations_evaluated, 2);
    // Bilirubin separates the classes completely.
    assert!(tree.cv_metrics.f1_score > 0.9);
    assert!(tree.test_report.accuracy > 0.9);

    let json_path = dir.path().join("results.json");
    EvaluationPipeline::save_results(&results, &json_path).unwrap();
    assert!(json_path.exists());
}
