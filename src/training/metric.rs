//! Evaluation metrics for regression quality.

/// A scalar quality measure over predictions.
pub trait Metric {
    /// Evaluate the metric; accumulation happens in f64.
    fn evaluate(&self, predictions: &[f32], labels: &[f32]) -> f64;

    /// Whether larger values indicate a better model.
    fn higher_is_better(&self) -> bool;

    /// Short identifier used in log lines.
    fn name(&self) -> &'static str;
}

/// Root mean squared error: √(mean((pred − label)²)).
#[derive(Debug, Clone, Copy, Default)]
pub struct Rmse;

impl Metric for Rmse {
    fn evaluate(&self, predictions: &[f32], labels: &[f32]) -> f64 {
        debug_assert_eq!(predictions.len(), labels.len());
        if predictions.is_empty() {
            return 0.0;
        }

        let mse = predictions
            .iter()
            .zip(labels)
            .map(|(&p, &l)| {
                let diff = p as f64 - l as f64;
                diff * diff
            })
            .sum::<f64>()
            / predictions.len() as f64;
        mse.sqrt()
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "rmse"
    }
}

/// Mean absolute error: mean(|pred − label|).
///
/// The headline number this system reports; delays are judged in minutes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mae;

impl Metric for Mae {
    fn evaluate(&self, predictions: &[f32], labels: &[f32]) -> f64 {
        debug_assert_eq!(predictions.len(), labels.len());
        if predictions.is_empty() {
            return 0.0;
        }

        predictions
            .iter()
            .zip(labels)
            .map(|(&p, &l)| (p as f64 - l as f64).abs())
            .sum::<f64>()
            / predictions.len() as f64
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "mae"
    }
}
