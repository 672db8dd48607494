//! Gradient boosting training infrastructure.
//!
//! The pieces, bottom to top:
//!
//! - [`GradientBuffer`]: per-sample gradient/hessian storage
//! - [`Loss`] implementations: [`SquaredLoss`], [`PseudoHuberLoss`]
//! - [`Metric`] implementations: [`Rmse`], [`Mae`]
//! - [`BinCuts`] / [`BinnedMatrix`]: feature quantization
//! - [`NodeHistogram`] and greedy split finding
//! - [`TreeGrower`]: depth-wise growth of one tree per round
//! - [`BoostTrainer`]: the boosting loop with [`EarlyStopping`] and a
//!   [`TrainingLogger`]

mod buffer;
mod callback;
mod grower;
mod histogram;
mod logger;
mod loss;
mod metric;
mod quantize;
mod split;
mod trainer;

pub use buffer::GradientBuffer;
pub use callback::EarlyStopping;
pub use grower::{BuildingTree, TreeGrower, TreeParams};
pub use histogram::{FeatureHistogram, NodeHistogram};
pub use logger::{TrainingLogger, Verbosity};
pub use loss::{Loss, PseudoHuberLoss, SquaredLoss};
pub use metric::{Mae, Metric, Rmse};
pub use quantize::{BinCuts, BinnedMatrix, MAX_BINS};
pub use split::{find_best_split, GainParams, SplitInfo};
pub use trainer::{BaseScore, BoostTrainer, EvalSet, TrainOutcome, TrainParams};

use rand::prelude::*;

/// Deterministic shuffled train/validation split.
///
/// Returns `(train_rows, valid_rows)` index sets.
pub fn split_indices(n_rows: usize, valid_fraction: f32, seed: u64) -> (Vec<usize>, Vec<usize>) {
    assert!(
        (0.0..1.0).contains(&valid_fraction),
        "valid_fraction must be in [0, 1), got {valid_fraction}"
    );
    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_valid = ((n_rows as f32) * valid_fraction).round() as usize;
    let n_valid = n_valid.min(n_rows);
    let (valid, train) = indices.split_at(n_valid);
    (train.to_vec(), valid.to_vec())
}

/// Gather selected rows of a row-major matrix into a new matrix.
pub fn gather_rows(matrix: &[f32], n_features: usize, rows: &[usize]) -> Vec<f32> {
    let mut out = Vec::with_capacity(rows.len() * n_features);
    for &row in rows {
        out.extend_from_slice(&matrix[row * n_features..(row + 1) * n_features]);
    }
    out
}

/// Gather selected entries of a label slice.
pub fn gather_labels(labels: &[f32], rows: &[usize]) -> Vec<f32> {
    rows.iter().map(|&row| labels[row]).collect()
}
