//! Regression loss functions.
//!
//! Both losses fill the gradient buffer from predictions and labels:
//!
//! - [`SquaredLoss`]: standard L2 regression
//! - [`PseudoHuberLoss`]: smooth Huber approximation, bounded gradients for
//!   the occasional incident spike in delay data

use super::buffer::GradientBuffer;

/// A differentiable training objective.
pub trait Loss {
    /// Fill `buffer` with first and second derivatives of the loss with
    /// respect to each prediction.
    fn compute_gradients(&self, preds: &[f32], labels: &[f32], buffer: &mut GradientBuffer);

    /// Initial model output before any trees are added.
    fn init_base_score(&self, labels: &[f32]) -> f32;

    /// Short identifier used in log lines.
    fn name(&self) -> &'static str;
}

/// Mean of a label slice, accumulated in f64.
fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64) as f32
}

// =============================================================================
// Squared error
// =============================================================================

/// Squared error loss: L = 0.5 · (pred − label)².
///
/// grad = pred − label, hess = 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredLoss;

impl Loss for SquaredLoss {
    fn compute_gradients(&self, preds: &[f32], labels: &[f32], buffer: &mut GradientBuffer) {
        debug_assert_eq!(preds.len(), labels.len());
        debug_assert_eq!(preds.len(), buffer.n_samples());

        let (grads, hess) = buffer.as_mut_slices();
        for i in 0..preds.len() {
            grads[i] = preds[i] - labels[i];
        }
        hess.fill(1.0);
    }

    fn init_base_score(&self, labels: &[f32]) -> f32 {
        mean(labels)
    }

    fn name(&self) -> &'static str {
        "squared_error"
    }
}

// =============================================================================
// Pseudo-Huber
// =============================================================================

/// Pseudo-Huber loss: δ² · (√(1 + (r/δ)²) − 1) for residual r.
///
/// Behaves like squared error for small residuals and like absolute error
/// for large ones, so a single 40-minute incident does not dominate a round
/// of gradients.
#[derive(Debug, Clone, Copy)]
pub struct PseudoHuberLoss {
    slope: f32,
}

impl PseudoHuberLoss {
    /// Create with the given transition slope δ.
    ///
    /// # Panics
    ///
    /// Panics if `slope` is not positive.
    pub fn new(slope: f32) -> Self {
        assert!(slope > 0.0, "Pseudo-Huber slope must be positive, got {slope}");
        Self { slope }
    }

    /// The transition slope δ.
    pub fn slope(&self) -> f32 {
        self.slope
    }
}

impl Default for PseudoHuberLoss {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Loss for PseudoHuberLoss {
    fn compute_gradients(&self, preds: &[f32], labels: &[f32], buffer: &mut GradientBuffer) {
        debug_assert_eq!(preds.len(), labels.len());
        debug_assert_eq!(preds.len(), buffer.n_samples());

        let slope_sq = self.slope * self.slope;
        let (grads, hess) = buffer.as_mut_slices();

        for i in 0..preds.len() {
            let r = preds[i] - labels[i];
            let r_sq = r * r;
            let scale_sqrt = (1.0 + r_sq / slope_sq).sqrt();

            grads[i] = r / scale_sqrt;
            hess[i] = slope_sq / ((slope_sq + r_sq) * scale_sqrt);
        }
    }

    fn init_base_score(&self, labels: &[f32]) -> f32 {
        mean(labels)
    }

    fn name(&self) -> &'static str {
        "pseudo_huber"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn squared_gradients() {
        let mut buffer = GradientBuffer::new(3);
        SquaredLoss.compute_gradients(&[1.0, 2.0, 3.0], &[0.5, 2.0, 2.5], &mut buffer);

        assert_relative_eq!(buffer.grad(0), 0.5);
        assert_relative_eq!(buffer.grad(1), 0.0);
        assert_relative_eq!(buffer.grad(2), 0.5);
        for i in 0..3 {
            assert_relative_eq!(buffer.hess(i), 1.0);
        }
    }

    #[test]
    fn squared_base_score_is_label_mean() {
        assert_relative_eq!(SquaredLoss.init_base_score(&[1.0, 2.0, 3.0]), 2.0);
        assert_relative_eq!(SquaredLoss.init_base_score(&[]), 0.0);
    }

    #[test]
    fn pseudo_huber_matches_closed_form() {
        let loss = PseudoHuberLoss::default();
        let mut buffer = GradientBuffer::new(2);
        loss.compute_gradients(&[1.0, 3.0], &[1.0, 1.0], &mut buffer);

        // r = 0: grad 0
        assert_relative_eq!(buffer.grad(0), 0.0);
        // r = 2, δ = 1: grad = 2/√5
        assert_relative_eq!(buffer.grad(1), 2.0 / 5.0f32.sqrt(), epsilon = 1e-6);
        assert!(buffer.hess(1) > 0.0);
    }

    #[test]
    fn pseudo_huber_bounds_outlier_gradient() {
        let loss = PseudoHuberLoss::default();
        let mut buffer = GradientBuffer::new(1);
        loss.compute_gradients(&[100.0], &[0.0], &mut buffer);

        // Squared loss would give grad = 100; here it saturates near δ.
        assert!(buffer.grad(0) < 1.5);
    }

    #[test]
    #[should_panic(expected = "slope must be positive")]
    fn pseudo_huber_rejects_zero_slope() {
        PseudoHuberLoss::new(0.0);
    }
}
