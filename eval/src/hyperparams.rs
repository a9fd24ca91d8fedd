// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Hyperparameter grids and the parameter combinations they expand to

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kernel function for the SVM
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    /// exp(-||x - y||^2 / eps)
    Gaussian { eps: f64 },
    Linear,
    /// (<x, y> + constant)^degree
    Polynomial { constant: f64, degree: f64 },
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kernel::Gaussian { eps } => write!(f, "Gaussian(eps={})", eps),
            Kernel::Linear => write!(f, "Linear"),
            Kernel::Polynomial { constant, degree } => {
                write!(f, "Polynomial(c={}, d={})", constant, degree)
            }
        }
    }
}

/// Parses `linear`, `gaussian[:eps]` and `polynomial[:constant:degree]`
impl FromStr for Kernel {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split(':');
        let name = parts.next().unwrap_or("").to_lowercase();
        let args = parts
            .map(|p| p.trim().parse::<f64>().map_err(|_| EvalError::invalid("kernel", s)))
            .collect::<Result<Vec<_>>>()?;

        match (name.as_str(), args.as_slice()) {
            ("linear", []) => Ok(Kernel::Linear),
            ("gaussian", []) => Ok(Kernel::Gaussian { eps: 2.0 }),
            ("gaussian", [eps]) if *eps > 0.0 => Ok(Kernel::Gaussian { eps: *eps }),
            ("polynomial", []) => Ok(Kernel::Polynomial { constant: 1.0, degree: 2.0 }),
            ("polynomial", [constant, degree]) => Ok(Kernel::Polynomial {
                constant: *constant,
                degree: *degree,
            }),
            _ => Err(EvalError::invalid("kernel", s)),
        }
    }
}

/// A single candidate value on a grid axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Kernel(Kernel),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{}", v),
            ParamValue::Kernel(k) => write!(f, "{}", k),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<Kernel> for ParamValue {
    fn from(kernel: Kernel) -> Self {
        ParamValue::Kernel(kernel)
    }
}

/// One point of the search space: a value for every axis, in axis order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet(Vec<(String, ParamValue)>);

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.0.push((name.to_string(), value.into()));
        self
    }

    /// Replace the value of `name`, appending it if absent
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) {
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// Numeric parameter, `InvalidValue` if missing or not a number
    pub fn number(&self, name: &str) -> Result<f64> {
        match self.get(name) {
            Some(ParamValue::Number(v)) => Ok(v),
            Some(other) => Err(EvalError::invalid(name, other)),
            None => Err(EvalError::invalid(name, "<missing>")),
        }
    }

    pub fn kernel(&self, name: &str) -> Result<Kernel> {
        match self.get(name) {
            Some(ParamValue::Kernel(k)) => Ok(k),
            Some(other) => Err(EvalError::invalid(name, other)),
            None => Err(EvalError::invalid(name, "<missing>")),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, ParamValue)> {
        self.0.iter()
    }
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Ordered mapping from parameter name to candidate values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterGrid {
    pub axes: Vec<GridAxis>,
}

impl HyperparameterGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis<V: Into<ParamValue>>(mut self, name: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.axes.push(GridAxis {
            name: name.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Number of combinations in the cartesian product
    pub fn len(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(|a| a.values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product in a fixed order: the first axis varies slowest,
    /// the last axis fastest.
    pub fn combinations(&self) -> Vec<ParamSet> {
        if self.is_empty() {
            return Vec::new();
        }

        let mut combos = vec![ParamSet::new()];
        for axis in &self.axes {
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    axis.values
                        .iter()
                        .map(move |value| prefix.clone().with(&axis.name, *value))
                })
                .collect();
        }
        combos
    }
}
