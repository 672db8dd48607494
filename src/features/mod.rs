//! Feature derivation and the training-time metadata that makes it stable.
//!
//! The contract here is the heart of the system: the feature vector handed
//! to the forest at scoring time must use the exact category vocabulary and
//! column order captured at training time. [`FeatureMeta`] is that capture;
//! it is persisted next to the forest and reloaded by the scorer.
//!
//! Derived columns:
//!
//! - `route_idx` / `stop_idx`: stable codes over the sorted-unique vocabulary,
//!   -1 for categories unseen at training time
//! - `hour`: timestamp hour
//! - `is_peak`: 1 if the hour falls in the morning or evening peak
//! - `route_stop_mean_delay`: historical mean delay for the (route, stop)
//!   pair, backfilled with the global training mean for unseen pairs

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::data::Observation;

// =============================================================================
// Feature layout
// =============================================================================

/// Canonical feature column order. Training and scoring must agree on this.
pub const FEATURE_NAMES: [&str; 11] = [
    "day_of_week",
    "time_of_day",
    "weather_temp",
    "weather_precip",
    "traffic_index",
    "scheduled_minute_of_day",
    "route_idx",
    "stop_idx",
    "hour",
    "is_peak",
    "route_stop_mean_delay",
];

/// Number of feature columns.
pub const N_FEATURES: usize = FEATURE_NAMES.len();

/// Hours counted as peak traffic.
pub const PEAK_HOURS: [u32; 6] = [7, 8, 9, 17, 18, 19];

/// Whether an hour of day falls in the peak window.
#[inline]
pub fn is_peak_hour(hour: u32) -> bool {
    PEAK_HOURS.contains(&hour)
}

// =============================================================================
// CategoryVocab
// =============================================================================

/// A fixed category vocabulary with stable integer codes.
///
/// Codes are positions in the sorted-unique list of identifiers seen at
/// training time. Lookups for identifiers outside the vocabulary return
/// `None`; callers encode those as -1.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryVocab {
    categories: Vec<String>,
}

impl CategoryVocab {
    /// Build a vocabulary from the identifiers in an iterator.
    pub fn fit<'a>(ids: impl Iterator<Item = &'a str>) -> Self {
        let mut categories: Vec<String> = ids.map(str::to_owned).collect();
        categories.sort();
        categories.dedup();
        Self { categories }
    }

    /// Stable code for an identifier, or `None` if unseen.
    pub fn code(&self, id: &str) -> Option<usize> {
        self.categories.binary_search_by(|c| c.as_str().cmp(id)).ok()
    }

    /// The ordered category list.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

// =============================================================================
// PairMeans
// =============================================================================

/// Historical mean delay for one (route, stop) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairMean {
    pub route_id: String,
    pub stop_id: String,
    pub mean_delay: f32,
}

/// Mean delay per (route, stop) pair, captured at training time.
///
/// Entries are kept sorted by (route, stop) so lookups are a binary search
/// and the serialized form is deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairMeans {
    entries: Vec<PairMean>,
}

impl PairMeans {
    /// Compute per-pair label means over labeled observations.
    ///
    /// Rows without a label are ignored.
    pub fn fit(rows: &[Observation]) -> Self {
        let mut sums: Vec<(&str, &str, f64, u32)> = Vec::new();
        let mut sorted: Vec<&Observation> =
            rows.iter().filter(|o| o.delay_min.is_some()).collect();
        sorted.sort_by(|a, b| {
            (a.route_id.as_str(), a.stop_id.as_str()).cmp(&(b.route_id.as_str(), b.stop_id.as_str()))
        });

        for obs in sorted {
            let delay = obs.delay_min.unwrap_or(0.0) as f64;
            let same_pair = sums
                .last()
                .map_or(false, |(route, stop, _, _)| {
                    *route == obs.route_id && *stop == obs.stop_id
                });
            if same_pair {
                let last = sums.last_mut().expect("checked non-empty above");
                last.2 += delay;
                last.3 += 1;
            } else {
                sums.push((obs.route_id.as_str(), obs.stop_id.as_str(), delay, 1));
            }
        }

        let entries = sums
            .into_iter()
            .map(|(route, stop, sum, count)| PairMean {
                route_id: route.to_owned(),
                stop_id: stop.to_owned(),
                mean_delay: (sum / count as f64) as f32,
            })
            .collect();
        Self { entries }
    }

    /// Mean delay for a pair, or `None` if the pair was unseen at fit time.
    pub fn lookup(&self, route_id: &str, stop_id: &str) -> Option<f32> {
        self.entries
            .binary_search_by(|e| {
                (e.route_id.as_str(), e.stop_id.as_str()).cmp(&(route_id, stop_id))
            })
            .ok()
            .map(|i| self.entries[i].mean_delay)
    }

    /// Number of distinct pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// FeatureMeta
// =============================================================================

/// Errors from feature derivation and metadata fitting.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("row {index} has no delay_min label")]
    MissingLabel { index: usize },

    #[error("cannot fit feature metadata on an empty dataset")]
    EmptyDataset,
}

/// Everything the scorer needs to reproduce training-time features.
///
/// Persisted as JSON next to the forest artifact. The `features` list is the
/// authoritative column order; the vocabularies and mean tables make the
/// categorical and aggregate columns reproducible without labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMeta {
    /// Feature names in model column order.
    pub features: Vec<String>,
    /// Route vocabulary captured at training time.
    pub route_vocab: CategoryVocab,
    /// Stop vocabulary captured at training time.
    pub stop_vocab: CategoryVocab,
    /// Historical mean delay per (route, stop) pair.
    pub pair_means: PairMeans,
    /// Global mean delay over the training set, the backfill for unseen pairs.
    pub global_mean_delay: f32,
    /// Best boosting iteration selected by early stopping, if any.
    pub best_iteration: Option<usize>,
}

impl FeatureMeta {
    /// Capture vocabularies and delay statistics from labeled history.
    pub fn fit(rows: &[Observation]) -> Result<Self, FeatureError> {
        if rows.is_empty() {
            return Err(FeatureError::EmptyDataset);
        }

        let labels = labels(rows)?;
        let global_mean_delay =
            (labels.iter().map(|&l| l as f64).sum::<f64>() / labels.len() as f64) as f32;

        Ok(Self {
            features: FEATURE_NAMES.iter().map(|&f| f.to_owned()).collect(),
            route_vocab: CategoryVocab::fit(rows.iter().map(|o| o.route_id.as_str())),
            stop_vocab: CategoryVocab::fit(rows.iter().map(|o| o.stop_id.as_str())),
            pair_means: PairMeans::fit(rows),
            global_mean_delay,
            best_iteration: None,
        })
    }

    /// Number of feature columns.
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Derive the feature vector for one observation, in model column order.
    pub fn derive_row(&self, obs: &Observation) -> [f32; N_FEATURES] {
        let hour = obs.timestamp.hour();
        let route_idx = self
            .route_vocab
            .code(&obs.route_id)
            .map_or(-1.0, |c| c as f32);
        let stop_idx = self
            .stop_vocab
            .code(&obs.stop_id)
            .map_or(-1.0, |c| c as f32);
        let pair_mean = self
            .pair_means
            .lookup(&obs.route_id, &obs.stop_id)
            .unwrap_or(self.global_mean_delay);

        [
            obs.day_of_week as f32,
            obs.time_of_day,
            obs.weather_temp,
            obs.weather_precip,
            obs.traffic_index,
            obs.scheduled_minute_of_day as f32,
            route_idx,
            stop_idx,
            hour as f32,
            if is_peak_hour(hour) { 1.0 } else { 0.0 },
            pair_mean,
        ]
    }

    /// Derive the row-major feature matrix for a batch of observations.
    pub fn derive_matrix(&self, rows: &[Observation]) -> Vec<f32> {
        let mut matrix = Vec::with_capacity(rows.len() * N_FEATURES);
        for obs in rows {
            matrix.extend_from_slice(&self.derive_row(obs));
        }
        matrix
    }
}

/// Extract labels from observations, erroring on the first unlabeled row.
pub fn labels(rows: &[Observation]) -> Result<Vec<f32>, FeatureError> {
    rows.iter()
        .enumerate()
        .map(|(index, o)| o.delay_min.ok_or(FeatureError::MissingLabel { index }))
        .collect()
}
