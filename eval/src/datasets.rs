// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Loading and splitting of Indian Liver Patient records

use crate::error::{EvalError, Result};
use csv::StringRecord;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Albumin/globulin ratio used when the CSV cell is blank
pub const DEFAULT_AG_RATIO: f64 = 0.95;

/// Enzyme and bilirubin multiplier for synthetic disease cases
const SYNTHETIC_DISEASE_SCALE: f64 = 1.6;

/// Probability that a synthetic label is flipped
const SYNTHETIC_LABEL_NOISE: f64 = 0.1;

/// Number of features fed to every classifier
pub const FEATURE_COUNT: usize = 7;

/// Names of the selected features, in the order of [`PatientRecord::selected_features`]
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Age",
    "Gender",
    "Direct Bilirubin",
    "Alkaline Phosphotase",
    "Aspartate Aminotransferase",
    "Total Proteins",
    "Albumin and Globulin Ratio",
];

/// Binary diagnosis label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    /// Patient without liver disease (CSV value "2")
    NoDisease,
    /// Patient with liver disease (CSV value "1")
    Disease,
}

impl Label {
    /// Convert to numeric value for metrics calculation
    pub fn to_binary(self) -> u8 {
        match self {
            Label::Disease => 1,
            Label::NoDisease => 0,
        }
    }

    /// Create from binary prediction (1 = disease, anything else = no disease)
    pub fn from_binary(value: u8) -> Self {
        if value == 1 {
            Label::Disease
        } else {
            Label::NoDisease
        }
    }

    /// Parse the dataset's label column: "1" is disease, "2" is no disease
    pub fn from_dataset_code(code: &str) -> Result<Self> {
        match code.trim().parse::<i64>() {
            Ok(1) => Ok(Label::Disease),
            Ok(2) => Ok(Label::NoDisease),
            _ => Err(EvalError::invalid("Dataset", code)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Numeric code used as a feature (male = 0, female = 1)
    pub fn code(self) -> u8 {
        match self {
            Gender::Male => 0,
            Gender::Female => 1,
        }
    }
}

impl FromStr for Gender {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(EvalError::invalid("Gender", s)),
        }
    }
}

/// One row of the liver patient dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub age: u32,
    pub gender: Gender,
    pub total_bilirubin: f64,
    pub direct_bilirubin: f64,
    pub alkaline_phosphotase: u32,
    pub alamine_aminotransferase: u32,
    pub aspartate_aminotransferase: u32,
    pub total_proteins: f64,
    pub albumin: f64,
    pub albumin_globulin_ratio: f64,
    pub label: Label,
}

impl PatientRecord {
    /// Feature vector shared by all classifiers. Order matches [`FEATURE_NAMES`].
    pub fn selected_features(&self) -> [f64; FEATURE_COUNT] {
        [
            self.age as f64,
            self.gender.code() as f64,
            self.direct_bilirubin,
            self.alkaline_phosphotase as f64,
            self.aspartate_aminotransferase as f64,
            self.total_proteins,
            self.albumin_globulin_ratio,
        ]
    }

    /// Every numeric column in file order, keyed by column name (label excluded)
    pub fn all_fields(&self) -> [(&'static str, f64); 10] {
        [
            ("Age", self.age as f64),
            ("Gender", self.gender.code() as f64),
            ("Total Bilirubin", self.total_bilirubin),
            ("Direct Bilirubin", self.direct_bilirubin),
            ("Alkaline Phosphotase", self.alkaline_phosphotase as f64),
            ("Alamine Aminotransferase", self.alamine_aminotransferase as f64),
            ("Aspartate Aminotransferase", self.aspartate_aminotransferase as f64),
            ("Total Proteins", self.total_proteins),
            ("Albumin", self.albumin),
            ("Albumin and Globulin Ratio", self.albumin_globulin_ratio),
        ]
    }

    fn from_csv(record: &StringRecord) -> Result<Self> {
        let line = record.position().map_or(0, |p| p.line());
        let cell = |idx: usize| record.get(idx).unwrap_or("");

        let ratio = cell(9);
        let albumin_globulin_ratio = if ratio.is_empty() {
            DEFAULT_AG_RATIO
        } else {
            parse_number(ratio, "Albumin_and_Globulin_Ratio", line)?
        };

        Ok(Self {
            age: parse_number(cell(0), "Age", line)?,
            gender: cell(1).parse()?,
            total_bilirubin: parse_number(cell(2), "Total_Bilirubin", line)?,
            direct_bilirubin: parse_number(cell(3), "Direct_Bilirubin", line)?,
            alkaline_phosphotase: parse_number(cell(4), "Alkaline_Phosphotase", line)?,
            alamine_aminotransferase: parse_number(cell(5), "Alamine_Aminotransferase", line)?,
            aspartate_aminotransferase: parse_number(cell(6), "Aspartate_Aminotransferase", line)?,
            total_proteins: parse_number(cell(7), "Total_Protiens", line)?,
            albumin: parse_number(cell(8), "Albumin", line)?,
            albumin_globulin_ratio,
            label: Label::from_dataset_code(cell(10))?,
        })
    }
}

fn parse_number<T: FromStr>(value: &str, field: &'static str, line: u64) -> Result<T> {
    value.parse().map_err(|_| EvalError::Parse {
        line,
        field,
        value: value.to_string(),
    })
}

/// Descriptive information about a loaded dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source: String,
}

impl DatasetConfig {
    fn ilpd(source: &str) -> Self {
        Self {
            id: "ilpd".to_string(),
            name: "Indian Liver Patient Dataset".to_string(),
            description: "Liver function tests of patients from North East Andhra Pradesh, labelled by diagnosis"
                .to_string(),
            source: source.to_string(),
        }
    }
}

/// A loaded dataset. Records are never modified after loading.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub config: DatasetConfig,
    records: Vec<PatientRecord>,
}

impl Dataset {
    pub fn new(config: DatasetConfig, records: Vec<PatientRecord>) -> Self {
        Self { config, records }
    }

    /// Load the dataset from a CSV file. The first line is skipped as a header.
    pub fn load_csv(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut dataset = Self::from_reader(file)?;
        dataset.config.source = path.display().to_string();
        Ok(dataset)
    }

    /// Parse CSV content from any reader. Fails on the first malformed row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            records.push(PatientRecord::from_csv(&row)?);
        }

        tracing::debug!("Parsed {} patient records", records.len());
        Ok(Self::new(DatasetConfig::ilpd("csv"), records))
    }

    /// Generate a seeded synthetic dataset with liver-test values in realistic ranges.
    /// Disease cases get moderately elevated bilirubin and enzyme levels whose ranges
    /// overlap the healthy ones, and a share of labels is flipped, so no model scores perfectly.
    pub fn load_synthetic(size: usize, seed: u64) -> Self {
        use rand::SeedableRng;
        use rand_chacha::ChaCha8Rng;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let records = (0..size)
            .map(|_| {
                let sick = rng.gen_bool(0.7);
                let scale = if sick { SYNTHETIC_DISEASE_SCALE } else { 1.0 };
                let total_bilirubin = rng.gen_range(0.4..1.2) * scale;
                let total_proteins = rng.gen_range(5.5..8.0);
                let albumin = rng.gen_range(2.5..4.5);

                PatientRecord {
                    age: rng.gen_range(18..80),
                    gender: if rng.gen_bool(0.75) { Gender::Male } else { Gender::Female },
                    total_bilirubin,
                    direct_bilirubin: total_bilirubin * rng.gen_range(0.2..0.5),
                    alkaline_phosphotase: (rng.gen_range(120.0..260.0) * scale) as u32,
                    alamine_aminotransferase: (rng.gen_range(10.0..45.0) * scale) as u32,
                    aspartate_aminotransferase: (rng.gen_range(12.0..50.0) * scale) as u32,
                    total_proteins,
                    albumin,
                    albumin_globulin_ratio: albumin / (total_proteins - albumin),
                    label: if sick ^ rng.gen_bool(SYNTHETIC_LABEL_NOISE) {
                        Label::Disease
                    } else {
                        Label::NoDisease
                    },
                }
            })
            .collect();

        let mut config = DatasetConfig::ilpd("generated");
        config.id = "synthetic".to_string();
        config.name = "Synthetic Liver Patient Dataset".to_string();

        Self::new(config, records)
    }

    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Shuffle a copy of the records and cut it into train and test parts.
    /// The training part holds `floor(train_ratio * n)` records.
    pub fn train_test_split<R: Rng + ?Sized>(
        &self,
        train_ratio: f64,
        rng: &mut R,
    ) -> Result<(Vec<PatientRecord>, Vec<PatientRecord>)> {
        if !(train_ratio > 0.0 && train_ratio < 1.0) {
            return Err(EvalError::invalid("train_ratio", train_ratio));
        }

        let mut shuffled = self.records.clone();
        shuffled.shuffle(rng);

        let split_index = (train_ratio * shuffled.len() as f64) as usize;
        let test = shuffled.split_off(split_index);
        Ok((shuffled, test))
    }

    /// Get label distribution for a set of records
    pub fn label_distribution(records: &[PatientRecord]) -> HashMap<Label, usize> {
        let mut dist = HashMap::new();
        for record in records {
            *dist.entry(record.label).or_insert(0) += 1;
        }
        dist
    }
}
