//! The boosting loop.
//!
//! Coordinates quantization, gradient computation, tree growing, prediction
//! updates, metric logging, and early stopping, then freezes the trees into
//! a [`Forest`].

use rayon::prelude::*;

use super::buffer::GradientBuffer;
use super::callback::EarlyStopping;
use super::grower::{TreeGrower, TreeParams};
use super::logger::{TrainingLogger, Verbosity};
use super::loss::Loss;
use super::metric::Metric;
use super::quantize::{BinCuts, BinnedMatrix, MAX_BINS};
use crate::trees::Forest;

/// Strategy for the model's initial output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaseScore {
    /// Whatever the loss considers optimal for a constant model
    /// (the label mean for both losses here).
    FromLoss,
    /// A fixed value.
    Fixed(f32),
    /// Start from zero.
    Zero,
}

/// Parameters for a full training run.
#[derive(Debug, Clone, Copy)]
pub struct TrainParams {
    /// Number of boosting rounds (upper bound under early stopping).
    pub n_rounds: u32,
    /// Per-tree parameters.
    pub tree: TreeParams,
    /// Maximum bins per feature for quantization.
    pub max_bins: usize,
    /// Base score strategy.
    pub base_score: BaseScore,
    /// Rounds without validation improvement before stopping; `None`
    /// disables early stopping.
    pub early_stopping_rounds: Option<u32>,
    /// Log verbosity.
    pub verbosity: Verbosity,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            tree: TreeParams::default(),
            max_bins: MAX_BINS,
            base_score: BaseScore::FromLoss,
            early_stopping_rounds: None,
            verbosity: Verbosity::Info,
        }
    }
}

/// A validation set: row-major features plus labels.
#[derive(Debug, Clone, Copy)]
pub struct EvalSet<'a> {
    pub features: &'a [f32],
    pub labels: &'a [f32],
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// The trained forest, truncated to the best iteration when early
    /// stopping fired.
    pub forest: Forest,
    /// Best boosting iteration (0-based) under early stopping.
    pub best_iteration: Option<usize>,
    /// Validation metric at the best iteration.
    pub best_score: Option<f64>,
    /// Rounds actually executed.
    pub rounds_run: usize,
}

/// Gradient boosting trainer over a loss and an evaluation metric.
pub struct BoostTrainer<L: Loss, M: Metric> {
    loss: L,
    metric: M,
    params: TrainParams,
    logger: TrainingLogger,
}

impl<L: Loss, M: Metric> BoostTrainer<L, M> {
    /// Create a trainer.
    pub fn new(loss: L, metric: M, params: TrainParams) -> Self {
        let logger = TrainingLogger::new(params.verbosity);
        Self {
            loss,
            metric,
            params,
            logger,
        }
    }

    /// Train on a row-major feature matrix.
    ///
    /// # Panics
    ///
    /// Panics if shapes are inconsistent or the training set is empty.
    pub fn train(
        &self,
        features: &[f32],
        n_features: usize,
        labels: &[f32],
        eval: Option<EvalSet<'_>>,
    ) -> TrainOutcome {
        let n_rows = labels.len();
        assert!(n_rows > 0, "training set must not be empty");
        assert_eq!(features.len(), n_rows * n_features, "matrix shape mismatch");
        if let Some(eval) = &eval {
            assert_eq!(
                eval.features.len(),
                eval.labels.len() * n_features,
                "eval matrix shape mismatch"
            );
        }

        let cuts = BinCuts::fit(features, n_rows, n_features, self.params.max_bins);
        let binned = BinnedMatrix::from_matrix(features, n_rows, &cuts);

        let base_score = match self.params.base_score {
            BaseScore::FromLoss => self.loss.init_base_score(labels),
            BaseScore::Fixed(value) => value,
            BaseScore::Zero => 0.0,
        };
        self.logger.info(&format!(
            "training {} rounds on {} rows × {} features (loss {}, base score {:.4})",
            self.params.n_rounds,
            n_rows,
            n_features,
            self.loss.name(),
            base_score
        ));

        let mut predictions = vec![base_score; n_rows];
        let mut eval_predictions: Vec<f32> =
            eval.map(|e| vec![base_score; e.labels.len()]).unwrap_or_default();

        let mut buffer = GradientBuffer::new(n_rows);
        let grower = TreeGrower::new(self.params.tree);
        let mut early_stopping = match (self.params.early_stopping_rounds, &eval) {
            (Some(patience), Some(_)) => Some(EarlyStopping::new(
                patience as usize,
                self.metric.higher_is_better(),
            )),
            _ => None,
        };

        let mut forest = Forest::new(base_score);
        let mut rounds_run = 0usize;

        for round in 0..self.params.n_rounds as usize {
            self.loss.compute_gradients(&predictions, labels, &mut buffer);

            let mut building = grower.grow(&binned, &cuts, &buffer);
            building.apply_learning_rate(self.params.tree.learning_rate);
            self.logger
                .debug(&format!("round {round}: tree with {} nodes", building.n_nodes()));

            predictions
                .par_iter_mut()
                .enumerate()
                .for_each(|(row, pred)| *pred += building.predict_binned(&binned, row));

            let frozen = building.freeze();
            let mut metrics = vec![(
                format!("train-{}", self.metric.name()),
                self.metric.evaluate(&predictions, labels),
            )];

            let mut eval_value = None;
            if let Some(eval) = &eval {
                eval_predictions
                    .par_iter_mut()
                    .zip(eval.features.par_chunks(n_features))
                    .for_each(|(pred, row)| *pred += frozen.predict_row(row));
                let value = self.metric.evaluate(&eval_predictions, eval.labels);
                metrics.push((format!("valid-{}", self.metric.name()), value));
                eval_value = Some(value);
            }

            forest.push_tree(frozen);
            rounds_run = round + 1;
            self.logger.round(round, &metrics);

            if let (Some(stopper), Some(value)) = (&mut early_stopping, eval_value) {
                if stopper.should_stop(value) {
                    self.logger.info(&format!(
                        "early stopping at round {round} (best round {}, {} {:.6})",
                        stopper.best_round(),
                        self.metric.name(),
                        stopper.best_value().unwrap_or(f64::NAN)
                    ));
                    break;
                }
            }
        }

        let (best_iteration, best_score) = match early_stopping {
            Some(stopper) => {
                forest.truncate(stopper.best_round() + 1);
                (Some(stopper.best_round()), stopper.best_value())
            }
            None => (None, None),
        };

        self.logger.info(&format!(
            "training complete: {} trees kept of {} rounds run",
            forest.n_trees(),
            rounds_run
        ));

        TrainOutcome {
            forest,
            best_iteration,
            best_score,
            rounds_run,
        }
    }
}
