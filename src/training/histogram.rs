//! Per-node gradient histograms.
//!
//! For every feature, the grower accumulates gradient and hessian sums per
//! bin over the rows currently in a node; split finding is then a prefix
//! scan over bins instead of a pass over rows.

use rayon::prelude::*;

use super::buffer::GradientBuffer;
use super::quantize::{BinCuts, BinnedMatrix};

/// Gradient/hessian/count sums per bin for one feature.
#[derive(Debug, Clone)]
pub struct FeatureHistogram {
    grad: Vec<f64>,
    hess: Vec<f64>,
    count: Vec<u32>,
}

impl FeatureHistogram {
    fn new(n_bins: usize) -> Self {
        Self {
            grad: vec![0.0; n_bins],
            hess: vec![0.0; n_bins],
            count: vec![0; n_bins],
        }
    }

    #[inline]
    fn add(&mut self, bin: usize, grad: f32, hess: f32) {
        self.grad[bin] += grad as f64;
        self.hess[bin] += hess as f64;
        self.count[bin] += 1;
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.grad.len()
    }

    /// (grad sum, hess sum, count) for one bin.
    #[inline]
    pub fn bin(&self, bin: usize) -> (f64, f64, u32) {
        (self.grad[bin], self.hess[bin], self.count[bin])
    }
}

/// Histograms for every feature over one node's rows.
#[derive(Debug, Clone)]
pub struct NodeHistogram {
    features: Vec<FeatureHistogram>,
}

impl NodeHistogram {
    /// Accumulate histograms for the given rows, one feature per worker.
    pub fn build(
        binned: &BinnedMatrix,
        cuts: &BinCuts,
        buffer: &GradientBuffer,
        rows: &[u32],
    ) -> Self {
        let (grads, hess) = buffer.as_slices();
        let features = (0..binned.n_features())
            .into_par_iter()
            .map(|feature| {
                let mut histogram = FeatureHistogram::new(cuts.n_bins(feature));
                for &row in rows {
                    let row = row as usize;
                    histogram.add(binned.bin(row, feature) as usize, grads[row], hess[row]);
                }
                histogram
            })
            .collect();
        Self { features }
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Histogram for one feature.
    pub fn feature(&self, feature: usize) -> &FeatureHistogram {
        &self.features[feature]
    }
}
