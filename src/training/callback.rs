//! Early stopping on a validation metric.

/// Tracks a validation metric across boosting rounds and signals when no
/// improvement has been seen for a patience window.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    higher_is_better: bool,
    best_value: Option<f64>,
    best_round: usize,
    rounds_seen: usize,
}

impl EarlyStopping {
    /// Create a callback that stops after `patience` rounds without
    /// improvement.
    pub fn new(patience: usize, higher_is_better: bool) -> Self {
        Self {
            patience,
            higher_is_better,
            best_value: None,
            best_round: 0,
            rounds_seen: 0,
        }
    }

    /// Record the metric for the round just finished.
    ///
    /// Returns `true` when training should stop.
    pub fn should_stop(&mut self, value: f64) -> bool {
        let improved = match self.best_value {
            None => true,
            Some(best) if self.higher_is_better => value > best,
            Some(best) => value < best,
        };

        if improved {
            self.best_value = Some(value);
            self.best_round = self.rounds_seen;
        }
        self.rounds_seen += 1;

        self.rounds_seen - self.best_round > self.patience
    }

    /// Best metric value observed so far.
    pub fn best_value(&self) -> Option<f64> {
        self.best_value
    }

    /// Round index (0-based) at which the best value was observed.
    pub fn best_round(&self) -> usize {
        self.best_round
    }
}
