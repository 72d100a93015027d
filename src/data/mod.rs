//! In-memory dataset handling.
//!
//! A [`Dataset`] owns a row-major feature matrix and a parallel label vector.
//! The harness loads one, optionally shuffles and subsamples it, and carves
//! it into per-entity shards. Binary load/save lives in [`io`].

pub mod io;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::entity::Shard;

pub use io::{load_training, ReadError};

/// Validation errors when assembling a dataset.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("feature buffer holds {got} values, expected {rows} rows x {cols} cols = {expected}")]
    FeatureLenMismatch {
        got: usize,
        rows: usize,
        cols: usize,
        expected: usize,
    },

    #[error("row {row} has label {label}, outside [0, {num_labels})")]
    LabelOutOfRange {
        row: usize,
        label: u32,
        num_labels: u32,
    },

    #[error("number of columns must be positive")]
    NoColumns,
}

/// Rows of real-valued features with integer labels in `[0, num_labels)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Vec<f32>,
    labels: Vec<u32>,
    num_cols: usize,
    num_labels: u32,
}

impl Dataset {
    /// Build a dataset from a row-major feature buffer and parallel labels.
    pub fn new(
        features: Vec<f32>,
        labels: Vec<u32>,
        num_cols: usize,
        num_labels: u32,
    ) -> Result<Self, DataError> {
        if num_cols == 0 {
            return Err(DataError::NoColumns);
        }
        let expected = labels.len() * num_cols;
        if features.len() != expected {
            return Err(DataError::FeatureLenMismatch {
                got: features.len(),
                rows: labels.len(),
                cols: num_cols,
                expected,
            });
        }
        for (row, &label) in labels.iter().enumerate() {
            if label >= num_labels {
                return Err(DataError::LabelOutOfRange {
                    row,
                    label,
                    num_labels,
                });
            }
        }
        Ok(Self {
            features,
            labels,
            num_cols,
            num_labels,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn num_labels(&self) -> u32 {
        self.num_labels
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.features[i * self.num_cols..(i + 1) * self.num_cols]
    }

    pub fn label(&self, i: usize) -> u32 {
        self.labels[i]
    }

    pub fn features(&self) -> &[f32] {
        &self.features
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// A seeded random sample of `fraction` of the rows, in permuted order.
    ///
    /// The permutation is drawn first and the first `n_rows * fraction` rows
    /// of it are kept, so `fraction = 1.0` is a pure shuffle. Fractions
    /// above 1 are clamped.
    pub fn sample(&self, seed: u64, fraction: f64) -> Dataset {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..self.n_rows()).collect();
        order.shuffle(&mut rng);

        let keep = ((self.n_rows() as f64 * fraction) as usize).min(self.n_rows());
        order.truncate(keep);

        let mut features = Vec::with_capacity(keep * self.num_cols);
        let mut labels = Vec::with_capacity(keep);
        for &idx in &order {
            features.extend_from_slice(self.row(idx));
            labels.push(self.labels[idx]);
        }
        Dataset {
            features,
            labels,
            num_cols: self.num_cols,
            num_labels: self.num_labels,
        }
    }

    /// Carve consecutive row blocks into shards with the given sizes.
    ///
    /// # Panics
    /// Panics if the sizes do not sum to the row count.
    pub fn partition(&self, sizes: &[usize]) -> Vec<Shard> {
        assert_eq!(
            sizes.iter().sum::<usize>(),
            self.n_rows(),
            "partition sizes must cover the dataset exactly"
        );
        let mut shards = Vec::with_capacity(sizes.len());
        let mut start = 0;
        for &size in sizes {
            let features =
                self.features[start * self.num_cols..(start + size) * self.num_cols].to_vec();
            let labels = self.labels[start..start + size].to_vec();
            shards.push(
                Shard::new(features, labels, self.num_cols)
                    .expect("shard carved from a valid dataset"),
            );
            start += size;
        }
        shards
    }

    /// Equal shard sizes with the remainder going to the last entity.
    pub fn even_partition_sizes(n_rows: usize, num_entities: usize) -> Vec<usize> {
        assert!(num_entities >= 1);
        let each = n_rows / num_entities;
        let mut sizes = vec![each; num_entities - 1];
        sizes.push(n_rows - each * (num_entities - 1));
        sizes
    }
}
