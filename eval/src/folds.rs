// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! K-fold partitioning for cross-validation

use crate::error::{EvalError, Result};
use rand::seq::SliceRandom;
use rand::Rng;

/// A partition of a record set into k disjoint folds
#[derive(Debug, Clone)]
pub struct FoldSet<T> {
    folds: Vec<Vec<T>>,
}

impl<T: Clone> FoldSet<T> {
    /// Shuffle `items` with `rng` and deal them into `k` folds.
    ///
    /// Every fold receives `n / k` items and the first `n % k` folds one extra,
    /// so fold sizes never differ by more than one.
    pub fn partition<R: Rng + ?Sized>(items: &[T], k: usize, rng: &mut R) -> Result<Self> {
        if k == 0 || k > items.len() {
            return Err(EvalError::InvalidFolds {
                folds: k,
                samples: items.len(),
            });
        }

        let mut shuffled = items.to_vec();
        shuffled.shuffle(rng);

        let base = shuffled.len() / k;
        let remainder = shuffled.len() % k;

        let mut folds = Vec::with_capacity(k);
        let mut rest = shuffled.into_iter();
        for i in 0..k {
            let size = if i < remainder { base + 1 } else { base };
            folds.push(rest.by_ref().take(size).collect());
        }

        Ok(Self { folds })
    }

    /// Build from folds that were assigned elsewhere
    pub fn from_folds(folds: Vec<Vec<T>>) -> Result<Self> {
        if folds.is_empty() {
            return Err(EvalError::InvalidFolds { folds: 0, samples: 0 });
        }
        Ok(Self { folds })
    }

    pub fn len(&self) -> usize {
        self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    pub fn folds(&self) -> &[Vec<T>] {
        &self.folds
    }

    /// Training and validation sets for fold `index`: every other fold
    /// concatenated in order, and the fold itself.
    pub fn split(&self, index: usize) -> (Vec<T>, &[T]) {
        let training = self
            .folds
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .flat_map(|(_, fold)| fold.iter().cloned())
            .collect();
        (training, &self.folds[index])
    }

    /// Total number of items across folds
    pub fn total(&self) -> usize {
        self.folds.iter().map(Vec::len).sum()
    }
}
