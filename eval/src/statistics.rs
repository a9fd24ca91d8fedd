// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Descriptive statistics over patient records

use crate::datasets::{Gender, Label, PatientRecord};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[middle - 1] + sorted[middle]) / 2.0
    } else {
        sorted[middle]
    }
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    let sum: f64 = values.iter().map(|v| (v - avg).powi(2)).sum();
    (sum / values.len() as f64).sqrt()
}

/// Pearson correlation. Zero when lengths differ, inputs are empty, or either side is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.is_empty() {
        return 0.0;
    }

    let mean_x = mean(x);
    let mean_y = mean(y);
    let (mut sum_xy, mut sum_x2, mut sum_y2) = (0.0, 0.0, 0.0);

    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sum_xy += dx * dy;
        sum_x2 += dx * dx;
        sum_y2 += dy * dy;
    }

    let denom = (sum_x2 * sum_y2).sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    sum_xy / denom
}

/// Percentile `p` (0 to 100) by linear interpolation between closest ranks
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// Tukey fences: `[q1 - 1.5 * iqr, q3 + 1.5 * iqr]`
pub fn iqr_bounds(values: &[f64]) -> (f64, f64) {
    let q1 = percentile(values, 25.0);
    let q3 = percentile(values, 75.0);
    let iqr = q3 - q1;
    (q1 - 1.5 * iqr, q3 + 1.5 * iqr)
}

/// Z-score each value with the population mean and standard deviation.
/// A constant column maps to zeros.
pub fn standardize(values: &[f64]) -> Vec<f64> {
    let avg = mean(values);
    let sd = std_dev(values);
    let sd = if sd > 0.0 { sd } else { 1.0 };
    values.iter().map(|v| (v - avg) / sd).collect()
}

/// Clamp every value into its IQR fences
pub fn cap_outliers(values: &[f64]) -> Vec<f64> {
    let (lower, upper) = iqr_bounds(values);
    values.iter().map(|v| v.clamp(lower, upper)).collect()
}

/// Per-column standardisation followed by outlier capping, fitted on one
/// matrix and replayed on others so training statistics never see test rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    means: Vec<f64>,
    std_devs: Vec<f64>,
    bounds: Vec<(f64, f64)>,
}

impl FeatureScaler {
    pub fn fit(x: &Array2<f64>) -> Self {
        let mut scaler = Self {
            means: Vec::with_capacity(x.ncols()),
            std_devs: Vec::with_capacity(x.ncols()),
            bounds: Vec::with_capacity(x.ncols()),
        };

        for column in x.axis_iter(Axis(1)) {
            let values: Vec<f64> = column.to_vec();
            let sd = std_dev(&values);
            scaler.means.push(mean(&values));
            scaler.std_devs.push(if sd > 0.0 { sd } else { 1.0 });
            scaler.bounds.push(iqr_bounds(&standardize(&values)));
        }
        scaler
    }

    pub fn transform(&self, x: &mut Array2<f64>) {
        for (j, mut column) in x.axis_iter_mut(Axis(1)).enumerate() {
            let (lower, upper) = self.bounds[j];
            column.mapv_inplace(|v| ((v - self.means[j]) / self.std_devs[j]).clamp(lower, upper));
        }
    }

    pub fn fit_transform(x: &mut Array2<f64>) -> Self {
        let scaler = Self::fit(x);
        scaler.transform(x);
        scaler
    }
}

/// Every numeric column z-scored, in file order
pub fn scaled_columns(records: &[PatientRecord], filter: RecordFilter) -> Vec<(&'static str, Array1<f64>)> {
    extract_columns(records, filter)
        .into_iter()
        .map(|(name, values)| (name, Array1::from(standardize(&values))))
        .collect()
}

/// Restrict which records contribute to column extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub gender: Option<Gender>,
    pub label: Option<Label>,
}

impl RecordFilter {
    pub fn matches(&self, record: &PatientRecord) -> bool {
        self.gender.map_or(true, |g| record.gender == g) && self.label.map_or(true, |l| record.label == l)
    }
}

/// Column-wise values of every numeric field, in file order
pub fn extract_columns(records: &[PatientRecord], filter: RecordFilter) -> Vec<(&'static str, Vec<f64>)> {
    let selected: Vec<&PatientRecord> = records.iter().filter(|r| filter.matches(r)).collect();
    let Some(first) = selected.first() else {
        return Vec::new();
    };

    let mut columns: Vec<(&'static str, Vec<f64>)> = first
        .all_fields()
        .iter()
        .map(|(name, _)| (*name, Vec::with_capacity(selected.len())))
        .collect();

    for record in &selected {
        for (column, (_, value)) in columns.iter_mut().zip(record.all_fields()) {
            column.1.push(value);
        }
    }
    columns
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub name: String,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

pub fn summarize(records: &[PatientRecord], filter: RecordFilter) -> Vec<FeatureSummary> {
    extract_columns(records, filter)
        .into_iter()
        .map(|(name, values)| FeatureSummary {
            name: name.to_string(),
            mean: mean(&values),
            median: median(&values),
            std_dev: std_dev(&values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
        .collect()
}

/// Symmetric matrix of pairwise Pearson correlations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn from_records(records: &[PatientRecord]) -> Self {
        let columns = extract_columns(records, RecordFilter::default());
        let n = columns.len();
        let mut values = vec![vec![0.0; n]; n];

        for i in 0..n {
            values[i][i] = 1.0;
            for j in (i + 1)..n {
                let corr = pearson(&columns[i].1, &columns[j].1);
                values[i][j] = corr;
                values[j][i] = corr;
            }
        }

        Self {
            names: columns.iter().map(|(name, _)| name.to_string()).collect(),
            values,
        }
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values[i][j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::Dataset;

    #[test]
    fn test_basic_statistics() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&values) - 5.0).abs() < 1e-9);
        assert!((median(&values) - 4.5).abs() < 1e-9);
        assert!((std_dev(&values) - 2.0).abs() < 1e-9);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_pearson() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&x, &[2.0, 4.0, 6.0, 8.0]) - 1.0).abs() < 1e-9);
        assert!((pearson(&x, &[8.0, 6.0, 4.0, 2.0]) + 1.0).abs() < 1e-9);
        assert_eq!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]), 0.0);
        assert_eq!(pearson(&x, &[1.0]), 0.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 50.0), 3.0);
        assert_eq!(percentile(&values, 100.0), 5.0);
        assert!((percentile(&[4.0, 1.0, 3.0, 2.0], 25.0) - 1.75).abs() < 1e-12);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_iqr_capping_bounds() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        // q1 = 2.25, q3 = 4.75, iqr = 2.5
        let (lower, upper) = iqr_bounds(&values);
        assert!((lower + 1.5).abs() < 1e-12);
        assert!((upper - 8.5).abs() < 1e-12);

        let capped = cap_outliers(&values);
        assert_eq!(&capped[..5], &values[..5]);
        assert!((capped[5] - 8.5).abs() < 1e-12);
    }

    #[test]
    fn test_standardize() {
        let z = standardize(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((z[0] + 1.5).abs() < 1e-12);
        assert!(mean(&z).abs() < 1e-12);
        assert!((std_dev(&z) - 1.0).abs() < 1e-12);
        assert_eq!(standardize(&[3.0, 3.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_scaler_replays_training_statistics() {
        let train = ndarray::array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [4.0, 10.0], [5.0, 10.0]];
        let mut fitted = train.clone();
        let scaler = FeatureScaler::fit_transform(&mut fitted);

        let column: Vec<f64> = fitted.column(0).to_vec();
        assert!(mean(&column).abs() < 1e-12);
        assert!(fitted.column(1).iter().all(|v| *v == 0.0));

        // An extreme unseen value is capped at the training upper fence.
        let mut test = ndarray::array![[1000.0, 10.0]];
        scaler.transform(&mut test);
        let (_, upper) = iqr_bounds(&standardize(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        assert!((test[[0, 0]] - upper).abs() < 1e-12);
    }

    #[test]
    fn test_scaled_columns() {
        let dataset = Dataset::load_synthetic(50, 2);
        let columns = scaled_columns(dataset.records(), RecordFilter::default());
        assert_eq!(columns.len(), 10);
        assert!(columns[0].1.mean().unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_filtered_columns() {
        let dataset = Dataset::load_synthetic(200, 5);
        let filter = RecordFilter { gender: Some(Gender::Female), label: None };
        let columns = extract_columns(dataset.records(), filter);

        let females = dataset.records().iter().filter(|r| r.gender == Gender::Female).count();
        assert_eq!(columns.len(), 10);
        assert_eq!(columns[0].1.len(), females);
        assert!(columns[1].1.iter().all(|g| *g == 1.0));
    }

    #[test]
    fn test_correlation_matrix_symmetric() {
        let dataset = Dataset::load_synthetic(100, 5);
        let matrix = CorrelationMatrix::from_records(dataset.records());

        assert_eq!(matrix.names.len(), 10);
        for i in 0..10 {
            assert_eq!(matrix.values[i][i], 1.0);
            for j in 0..10 {
                assert_eq!(matrix.values[i][j], matrix.values[j][i]);
            }
        }
        // Direct bilirubin is generated as a fraction of total bilirubin.
        assert!(matrix.get("Total Bilirubin", "Direct Bilirubin").unwrap() > 0.5);
    }
}
