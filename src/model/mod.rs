//! The trained model artifact: forest + feature metadata.
//!
//! [`DelayModel`] ties the boosted forest to the [`FeatureMeta`] captured
//! when it was fitted. The two are persisted as a pair of JSON files and the
//! loader refuses a forest whose splits reference features the metadata does
//! not describe.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rayon::prelude::*;

use crate::data::Observation;
use crate::features::{self, FeatureError, FeatureMeta, N_FEATURES};
use crate::training::{
    self, BoostTrainer, EvalSet, Loss, Mae, Metric, SquaredLoss, TrainParams,
};
use crate::trees::Forest;

/// Errors from model persistence and fitting.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(
        "model references feature {referenced} but metadata only describes {described} features"
    )]
    Inconsistent { referenced: u32, described: usize },
}

/// Summary of a training run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// MAE over the held-out validation rows, in minutes.
    pub validation_mae: f64,
    /// Best boosting iteration under early stopping.
    pub best_iteration: Option<usize>,
    /// Rounds actually executed.
    pub rounds_run: usize,
    /// Trees kept in the final forest.
    pub n_trees: usize,
}

/// A trained delay model.
#[derive(Debug, Clone)]
pub struct DelayModel {
    forest: Forest,
    meta: FeatureMeta,
}

impl DelayModel {
    /// Fit with the default squared-error loss.
    pub fn fit(
        history: &[Observation],
        params: TrainParams,
        valid_fraction: f32,
        seed: u64,
    ) -> Result<(Self, TrainReport), ModelError> {
        Self::fit_with_loss(history, SquaredLoss, params, valid_fraction, seed)
    }

    /// Fit with an explicit loss function.
    ///
    /// Derives features over `history`, holds out a shuffled validation
    /// fraction, trains with MAE as the tracked metric, and records the best
    /// iteration in the metadata.
    pub fn fit_with_loss<L: Loss>(
        history: &[Observation],
        loss: L,
        params: TrainParams,
        valid_fraction: f32,
        seed: u64,
    ) -> Result<(Self, TrainReport), ModelError> {
        let mut meta = FeatureMeta::fit(history)?;
        let matrix = meta.derive_matrix(history);
        let labels = features::labels(history)?;

        let (train_rows, valid_rows) =
            training::split_indices(history.len(), valid_fraction, seed);
        let train_x = training::gather_rows(&matrix, N_FEATURES, &train_rows);
        let train_y = training::gather_labels(&labels, &train_rows);
        let valid_x = training::gather_rows(&matrix, N_FEATURES, &valid_rows);
        let valid_y = training::gather_labels(&labels, &valid_rows);

        let eval = (!valid_rows.is_empty()).then_some(EvalSet {
            features: &valid_x,
            labels: &valid_y,
        });

        let trainer = BoostTrainer::new(loss, Mae, params);
        let outcome = trainer.train(&train_x, N_FEATURES, &train_y, eval);

        meta.best_iteration = outcome.best_iteration;
        let model = Self {
            forest: outcome.forest,
            meta,
        };

        // Validation MAE of the kept forest (post-truncation under early
        // stopping), so the reported number matches the shipped artifact.
        let validation_mae = if valid_rows.is_empty() {
            let preds = model.predict_matrix(&train_x);
            Mae.evaluate(&preds, &train_y)
        } else {
            let preds = model.predict_matrix(&valid_x);
            Mae.evaluate(&preds, &valid_y)
        };

        let report = TrainReport {
            validation_mae,
            best_iteration: outcome.best_iteration,
            rounds_run: outcome.rounds_run,
            n_trees: model.forest.n_trees(),
        };
        Ok((model, report))
    }

    /// Wrap an existing forest and metadata, checking consistency.
    pub fn from_parts(forest: Forest, meta: FeatureMeta) -> Result<Self, ModelError> {
        if let Some(referenced) = forest.max_feature_index() {
            if referenced as usize >= meta.n_features() {
                return Err(ModelError::Inconsistent {
                    referenced,
                    described: meta.n_features(),
                });
            }
        }
        Ok(Self { forest, meta })
    }

    /// The feature metadata.
    pub fn meta(&self) -> &FeatureMeta {
        &self.meta
    }

    /// The underlying forest.
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Predict raw delay minutes for one observation.
    pub fn predict_row(&self, obs: &Observation) -> f32 {
        self.forest.predict_row(&self.meta.derive_row(obs))
    }

    /// Predict raw delay minutes for a batch of observations.
    pub fn predict(&self, rows: &[Observation]) -> Vec<f32> {
        rows.par_iter().map(|obs| self.predict_row(obs)).collect()
    }

    /// Predict over an already-derived row-major feature matrix.
    pub fn predict_matrix(&self, matrix: &[f32]) -> Vec<f32> {
        matrix
            .par_chunks(self.meta.n_features())
            .map(|row| self.forest.predict_row(row))
            .collect()
    }

    /// Split counts per feature, aligned with `meta().features`.
    pub fn feature_split_counts(&self) -> Vec<(String, u32)> {
        let counts = self.forest.feature_split_counts(self.meta.n_features());
        self.meta
            .features
            .iter()
            .cloned()
            .zip(counts)
            .collect()
    }

    /// Persist the forest and metadata as a pair of JSON files.
    pub fn save(
        &self,
        model_path: impl AsRef<Path>,
        meta_path: impl AsRef<Path>,
    ) -> Result<(), ModelError> {
        let model_file = BufWriter::new(File::create(model_path.as_ref())?);
        serde_json::to_writer(model_file, &self.forest)?;

        let meta_file = BufWriter::new(File::create(meta_path.as_ref())?);
        serde_json::to_writer_pretty(meta_file, &self.meta)?;
        Ok(())
    }

    /// Load a model persisted by [`DelayModel::save`].
    pub fn load(
        model_path: impl AsRef<Path>,
        meta_path: impl AsRef<Path>,
    ) -> Result<Self, ModelError> {
        let model_file = BufReader::new(File::open(model_path.as_ref())?);
        let forest: Forest = serde_json::from_reader(model_file)?;

        let meta_file = BufReader::new(File::open(meta_path.as_ref())?);
        let meta: FeatureMeta = serde_json::from_reader(meta_file)?;

        Self::from_parts(forest, meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::CategoryVocab;
    use crate::synth::{SynthConfig, SynthGenerator};
    use crate::training::Verbosity;
    use crate::trees::{Node, SplitCondition, Tree};

    fn small_history() -> Vec<Observation> {
        let config = SynthConfig {
            days: 3,
            per_hour: 2,
            ..Default::default()
        };
        SynthGenerator::new(config).history()
    }

    fn quick_params() -> TrainParams {
        TrainParams {
            n_rounds: 15,
            verbosity: Verbosity::Silent,
            ..Default::default()
        }
    }

    #[test]
    fn fit_beats_the_constant_baseline() {
        let history = small_history();
        let (model, report) = DelayModel::fit(&history, quick_params(), 0.2, 42).unwrap();

        assert_eq!(model.forest().n_trees(), report.n_trees);
        assert!(report.validation_mae > 0.0);

        // Constant-mean baseline on the same rows.
        let labels: Vec<f32> = history.iter().filter_map(|o| o.delay_min).collect();
        let mean = labels.iter().sum::<f32>() / labels.len() as f32;
        let baseline: Vec<f32> = vec![mean; labels.len()];
        let baseline_mae = Mae.evaluate(&baseline, &labels);

        let preds = model.predict(&history);
        let model_mae = Mae.evaluate(&preds, &labels);
        assert!(
            model_mae < baseline_mae,
            "model MAE {model_mae} not below baseline {baseline_mae}"
        );
    }

    #[test]
    fn save_load_roundtrip_preserves_predictions() {
        let history = small_history();
        let (model, _) = DelayModel::fit(&history, quick_params(), 0.2, 42).unwrap();

        let dir = std::env::temp_dir();
        let model_path = dir.join("delaycast_model_test.json");
        let meta_path = dir.join("delaycast_meta_test.json");

        model.save(&model_path, &meta_path).unwrap();
        let loaded = DelayModel::load(&model_path, &meta_path).unwrap();

        std::fs::remove_file(&model_path).ok();
        std::fs::remove_file(&meta_path).ok();

        assert_eq!(loaded.meta(), model.meta());
        for obs in history.iter().take(20) {
            assert_eq!(loaded.predict_row(obs), model.predict_row(obs));
        }
    }

    #[test]
    fn inconsistent_parts_are_rejected() {
        let history = small_history();
        let meta = FeatureMeta::fit(&history).unwrap();

        // A forest splitting on a feature index past the metadata's range.
        let mut forest = Forest::new(0.0);
        forest.push_tree(Tree::from_nodes(vec![
            Node::Split {
                condition: SplitCondition {
                    feature: N_FEATURES as u32,
                    threshold: 0.0,
                    default_left: false,
                },
                left: 1,
                right: 2,
            },
            Node::Leaf { value: 0.0 },
            Node::Leaf { value: 1.0 },
        ]));

        let err = DelayModel::from_parts(forest, meta).unwrap_err();
        assert!(matches!(err, ModelError::Inconsistent { .. }));
    }

    #[test]
    fn unseen_vocabulary_still_scores() {
        let history = small_history();
        let (model, _) = DelayModel::fit(&history, quick_params(), 0.2, 42).unwrap();

        let mut unseen = history[0].clone();
        unseen.route_id = "R99".to_owned();
        unseen.stop_id = "S99".to_owned();
        unseen.delay_min = None;

        // Prediction must be finite and use the -1/global-mean fallbacks.
        let prediction = model.predict_row(&unseen);
        assert!(prediction.is_finite());
        assert_eq!(CategoryVocab::default().code("R99"), None);
    }
}
