//! Deviation loss.
//!
//! Scores are standardized against a reference sample drawn from N(0, 1).
//! Inliers are pulled toward the reference mean, outliers pushed at least
//! `confidence_margin` standard deviations above it.

use ndarray::Array1;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::{DevNetError, DevNetResult};

/// Mean and standard deviation of one reference draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceStats {
    pub mean: f64,
    pub std: f64,
}

impl ReferenceStats {
    /// Draw `size` standard normal values and summarize them. The standard
    /// deviation uses the unbiased estimator.
    pub fn sample<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Self {
        let draws: Vec<f64> = (0..size).map(|_| rng.sample(StandardNormal)).collect();
        let n = draws.len() as f64;
        let mean = draws.iter().sum::<f64>() / n;
        let var = draws.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        ReferenceStats {
            mean,
            std: var.sqrt(),
        }
    }

    /// Normalized deviation of a raw score.
    pub fn deviation(&self, score: f64) -> f64 {
        (score - self.mean) / self.std
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DeviationLoss {
    confidence_margin: f64,
    /// Size of the reference sample drawn on every evaluation
    ref_size: usize,
}

impl Default for DeviationLoss {
    fn default() -> Self {
        Self {
            confidence_margin: 5.0,
            ref_size: 5000,
        }
    }
}

impl DeviationLoss {
    /// Loss with a custom margin and reference sample size. The reference
    /// needs at least two draws for its standard deviation.
    pub fn new(confidence_margin: f64, ref_size: usize) -> DevNetResult<Self> {
        if ref_size < 2 {
            return Err(DevNetError::configuration(format!(
                "reference sample needs at least 2 draws, got {}",
                ref_size
            )));
        }
        Ok(Self {
            confidence_margin,
            ref_size,
        })
    }

    pub fn confidence_margin(&self) -> f64 {
        self.confidence_margin
    }

    pub fn ref_size(&self) -> usize {
        self.ref_size
    }

    /// Batch loss and its gradient with respect to each score, using a fresh
    /// reference sample.
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        scores: &Array1<f64>,
        labels: &Array1<f64>,
        rng: &mut R,
    ) -> (f64, Array1<f64>) {
        let reference = ReferenceStats::sample(self.ref_size, rng);
        self.evaluate_with(scores, labels, &reference)
    }

    /// Batch loss and gradient against a given reference.
    pub fn evaluate_with(
        &self,
        scores: &Array1<f64>,
        labels: &Array1<f64>,
        reference: &ReferenceStats,
    ) -> (f64, Array1<f64>) {
        let n = scores.len();
        if n == 0 {
            return (0.0, Array1::zeros(0));
        }
        let scale = 1.0 / (n as f64 * reference.std);
        let mut total = 0.0;
        let mut grad = Array1::zeros(n);
        for (i, (&score, &label)) in scores.iter().zip(labels.iter()).enumerate() {
            let dev = reference.deviation(score);
            if label == 1.0 {
                let gap = self.confidence_margin - dev;
                if gap > 0.0 {
                    total += gap;
                    grad[i] = -scale;
                }
            } else {
                total += dev.abs();
                grad[i] = if dev > 0.0 {
                    scale
                } else if dev < 0.0 {
                    -scale
                } else {
                    0.0
                };
            }
        }
        (total / n as f64, grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const UNIT: ReferenceStats = ReferenceStats { mean: 0.0, std: 1.0 };

    #[test]
    fn test_reference_is_standard_normal() {
        let mut rng = StdRng::seed_from_u64(42);
        let r = ReferenceStats::sample(5000, &mut rng);
        assert!(r.mean.abs() < 0.1);
        assert!((r.std - 1.0).abs() < 0.1);
        // drawn fresh each time
        let again = ReferenceStats::sample(5000, &mut rng);
        assert_ne!(r, again);
    }

    #[test]
    fn test_inliers_at_reference_mean_cost_nothing() {
        let loss = DeviationLoss::default();
        let (value, grad) = loss.evaluate_with(&array![0.0, 0.0], &array![0.0, 0.0], &UNIT);
        assert_eq!(value, 0.0);
        assert_eq!(grad, array![0.0, 0.0]);
    }

    #[test]
    fn test_inlier_loss_is_absolute_deviation() {
        let loss = DeviationLoss::default();
        let (value, grad) = loss.evaluate_with(&array![2.0, -1.0], &array![0.0, 0.0], &UNIT);
        assert!((value - 1.5).abs() < 1e-12);
        assert_eq!(grad, array![0.5, -0.5]);
    }

    #[test]
    fn test_outlier_margin() {
        let loss = DeviationLoss::default();
        let (at_mean, _) = loss.evaluate_with(&array![0.0], &array![1.0], &UNIT);
        assert!((at_mean - 5.0).abs() < 1e-12);
        let (past_margin, grad) = loss.evaluate_with(&array![7.0], &array![1.0], &UNIT);
        assert_eq!(past_margin, 0.0);
        assert_eq!(grad, array![0.0]);
        let (below, grad) = loss.evaluate_with(&array![-3.0], &array![1.0], &UNIT);
        assert!((below - 8.0).abs() < 1e-12);
        assert_eq!(grad, array![-1.0]);
    }

    #[test]
    fn test_loss_is_never_negative() {
        let loss = DeviationLoss::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let scores = Array1::from_shape_fn(16, |_| rng.gen_range(-20.0..20.0));
            let labels = Array1::from_shape_fn(16, |i| (i % 2) as f64);
            let (value, _) = loss.evaluate(&scores, &labels, &mut rng);
            assert!(value >= 0.0);
        }
    }

    #[test]
    fn test_gradient_scales_with_reference_std() {
        let loss = DeviationLoss::default();
        let wide = ReferenceStats { mean: 1.0, std: 2.0 };
        let (value, grad) = loss.evaluate_with(&array![3.0, 1.0], &array![0.0, 1.0], &wide);
        // inlier dev 1, outlier dev 0 -> (1 + 5) / 2
        assert!((value - 3.0).abs() < 1e-12);
        assert_eq!(grad, array![0.25, -0.25]);
    }

    #[test]
    fn test_reference_size_must_allow_a_spread() {
        assert!(matches!(
            DeviationLoss::new(5.0, 1),
            Err(DevNetError::Configuration(_))
        ));
        let loss = DeviationLoss::new(3.0, 2).unwrap();
        assert_eq!(loss.ref_size(), 2);
        let mut rng = StdRng::seed_from_u64(8);
        let (value, grad) = loss.evaluate(&array![0.5, 0.1], &array![0.0, 1.0], &mut rng);
        assert!(value.is_finite());
        assert!(grad.iter().all(|g| g.is_finite()));
    }
}
