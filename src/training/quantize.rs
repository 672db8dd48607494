//! Feature quantization for histogram-based training.
//!
//! Raw feature values are mapped to small integer bins once, up front; the
//! tree grower then works entirely on bins. Cut points per feature are
//! stored CSR-style: all cut values concatenated, with per-feature offsets.
//!
//! Bin layout per feature, for cuts `t_0 < t_1 < … < t_{k-1}`:
//!
//! - bin 0: missing (NaN)
//! - bin b (1 ≤ b ≤ k+1): values with exactly `b − 1` cuts ≤ v
//!
//! which gives the invariant used for splits: `bin(v) ≤ b ⇔ v < t_{b-1}`.

/// Maximum total bins per feature (fits u8 storage).
pub const MAX_BINS: usize = 256;

// =============================================================================
// BinCuts
// =============================================================================

/// Per-feature cut points.
#[derive(Debug, Clone)]
pub struct BinCuts {
    /// All cut values concatenated, ascending within each feature.
    cut_values: Vec<f32>,
    /// Offsets into `cut_values`; length `n_features + 1`.
    cut_ptrs: Vec<u32>,
}

impl BinCuts {
    /// Find cut points for a row-major feature matrix.
    ///
    /// Features with few distinct values get a cut between every adjacent
    /// pair (exact splits); continuous features get cuts at evenly spaced
    /// quantiles of their distinct values.
    ///
    /// # Panics
    ///
    /// Panics if `max_bins` is not in `3..=MAX_BINS` or the matrix shape is
    /// inconsistent.
    pub fn fit(features: &[f32], n_rows: usize, n_features: usize, max_bins: usize) -> Self {
        assert_eq!(features.len(), n_rows * n_features, "matrix shape mismatch");
        assert!(
            (3..=MAX_BINS).contains(&max_bins),
            "max_bins must be in 3..={MAX_BINS}, got {max_bins}"
        );
        // One bin is reserved for missing and one for the overflow range,
        // leaving max_bins - 2 cut points.
        let max_cuts = max_bins - 2;

        let mut cut_values = Vec::new();
        let mut cut_ptrs = Vec::with_capacity(n_features + 1);
        cut_ptrs.push(0u32);

        let mut column = Vec::with_capacity(n_rows);
        for feature in 0..n_features {
            column.clear();
            column.extend(
                (0..n_rows)
                    .map(|r| features[r * n_features + feature])
                    .filter(|v| !v.is_nan()),
            );
            column.sort_by(|a, b| a.partial_cmp(b).expect("NaN filtered above"));
            column.dedup();

            let distinct = &column[..];
            if distinct.len() >= 2 {
                if distinct.len() - 1 <= max_cuts {
                    for pair in distinct.windows(2) {
                        cut_values.push(midpoint(pair[0], pair[1]));
                    }
                } else {
                    for i in 1..=max_cuts {
                        let pos = i * distinct.len() / (max_cuts + 1);
                        cut_values.push(midpoint(distinct[pos - 1], distinct[pos]));
                    }
                }
            }
            cut_ptrs.push(cut_values.len() as u32);
        }

        Self {
            cut_values,
            cut_ptrs,
        }
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.cut_ptrs.len() - 1
    }

    /// Cut values for one feature, ascending.
    pub fn feature_cuts(&self, feature: usize) -> &[f32] {
        let start = self.cut_ptrs[feature] as usize;
        let end = self.cut_ptrs[feature + 1] as usize;
        &self.cut_values[start..end]
    }

    /// Total bins for one feature, including the missing bin.
    pub fn n_bins(&self, feature: usize) -> usize {
        self.feature_cuts(feature).len() + 2
    }

    /// Map one raw value to its bin.
    pub fn bin_of(&self, feature: usize, value: f32) -> u8 {
        if value.is_nan() {
            return 0;
        }
        let cuts = self.feature_cuts(feature);
        (1 + cuts.partition_point(|&t| t <= value)) as u8
    }

    /// Raw threshold equivalent to "value bins ≤ `bin` go left".
    ///
    /// Valid for `1 ≤ bin ≤ n_cuts`.
    pub fn threshold(&self, feature: usize, bin: u32) -> f32 {
        self.feature_cuts(feature)[(bin - 1) as usize]
    }
}

fn midpoint(lo: f32, hi: f32) -> f32 {
    lo + (hi - lo) * 0.5
}

// =============================================================================
// BinnedMatrix
// =============================================================================

/// Row-major matrix of u8 bins.
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    bins: Vec<u8>,
    n_rows: usize,
    n_features: usize,
}

impl BinnedMatrix {
    /// Quantize a row-major feature matrix against the given cuts.
    pub fn from_matrix(features: &[f32], n_rows: usize, cuts: &BinCuts) -> Self {
        let n_features = cuts.n_features();
        assert_eq!(features.len(), n_rows * n_features, "matrix shape mismatch");

        let mut bins = Vec::with_capacity(features.len());
        for row in 0..n_rows {
            for feature in 0..n_features {
                bins.push(cuts.bin_of(feature, features[row * n_features + feature]));
            }
        }

        Self {
            bins,
            n_rows,
            n_features,
        }
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Bin for one (row, feature) cell.
    #[inline]
    pub fn bin(&self, row: usize, feature: usize) -> u8 {
        self.bins[row * self.n_features + feature]
    }
}
