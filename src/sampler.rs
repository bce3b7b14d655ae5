//! Balanced inlier/outlier batch generation.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::data::matrix::FeatureMatrix;
use crate::error::{DevNetError, DevNetResult};

/// One training batch: dense features and 0/1 labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub features: Array2<f64>,
    pub labels: Array1<f64>,
}

/// Endless stream of training batches.
///
/// Even positions of a batch are drawn (with replacement) from the inliers,
/// odd positions from the outliers. The sampler owns a private generator
/// seeded from a single draw of the caller's generator, so the batch sequence
/// depends only on that draw and not on how many batches are pulled.
/// Sparse training data is densified one batch at a time.
pub struct PairwiseBatchSampler<'a> {
    x: &'a FeatureMatrix,
    outlier_indices: &'a [usize],
    inlier_indices: &'a [usize],
    batch_size: usize,
    nb_batch: usize,
    counter: usize,
    rng: StdRng,
}

impl<'a> PairwiseBatchSampler<'a> {
    pub fn new(
        x: &'a FeatureMatrix,
        outlier_indices: &'a [usize],
        inlier_indices: &'a [usize],
        batch_size: usize,
        nb_batch: usize,
        rng: &mut StdRng,
    ) -> DevNetResult<Self> {
        if batch_size == 0 {
            return Err(DevNetError::configuration("batch size must be positive"));
        }
        if inlier_indices.is_empty() {
            return Err(DevNetError::insufficient_data("no inliers to sample batches from"));
        }
        if batch_size > 1 && outlier_indices.is_empty() {
            return Err(DevNetError::insufficient_data("no outliers to sample batches from"));
        }
        let seed = rng.gen_range(0..i32::MAX as u64);
        Ok(Self {
            x,
            outlier_indices,
            inlier_indices,
            batch_size,
            nb_batch,
            counter: 0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Position within the current epoch. Wraps after `nb_batch` batches and
    /// has no effect on what is drawn.
    pub fn counter(&self) -> usize {
        self.counter
    }

    fn next_batch(&mut self) -> Batch {
        let mut rows = Vec::with_capacity(self.batch_size);
        let mut labels = Array1::zeros(self.batch_size);
        for i in 0..self.batch_size {
            if i % 2 == 0 {
                let sid = self.rng.gen_range(0..self.inlier_indices.len());
                rows.push(self.inlier_indices[sid]);
            } else {
                let sid = self.rng.gen_range(0..self.outlier_indices.len());
                rows.push(self.outlier_indices[sid]);
                labels[i] = 1.0;
            }
        }
        Batch {
            features: self.x.rows_to_dense(&rows),
            labels,
        }
    }
}

impl Iterator for PairwiseBatchSampler<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let batch = self.next_batch();
        self.counter += 1;
        if self.counter >= self.nb_batch {
            self.counter = 0;
        }
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::matrix::CsrMatrix;
    use ndarray::Array2;

    fn fixture() -> (FeatureMatrix, Vec<usize>, Vec<usize>) {
        let x = Array2::from_shape_fn((10, 3), |(r, c)| if c == 0 { r as f64 } else { 0.0 });
        (FeatureMatrix::Dense(x), vec![1, 4], vec![0, 2, 3, 5, 6, 7, 8, 9])
    }

    #[test]
    fn test_batches_are_balanced_and_alternate() {
        let (x, out, inl) = fixture();
        let mut rng = StdRng::seed_from_u64(42);
        let sampler = PairwiseBatchSampler::new(&x, &out, &inl, 16, 5, &mut rng).unwrap();
        for batch in sampler.take(12) {
            assert_eq!(batch.features.nrows(), 16);
            assert_eq!(batch.labels.iter().filter(|&&l| l == 0.0).count(), 8);
            assert_eq!(batch.labels.iter().filter(|&&l| l == 1.0).count(), 8);
            for (i, row) in batch.features.rows().into_iter().enumerate() {
                let source = row[0] as usize;
                if i % 2 == 0 {
                    assert_eq!(batch.labels[i], 0.0);
                    assert!(inl.contains(&source));
                } else {
                    assert_eq!(batch.labels[i], 1.0);
                    assert!(out.contains(&source));
                }
            }
        }
    }

    #[test]
    fn test_fixed_seed_reproduces_sequence() {
        let (x, out, inl) = fixture();
        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        let first: Vec<Batch> = PairwiseBatchSampler::new(&x, &out, &inl, 8, 3, &mut a)
            .unwrap()
            .take(7)
            .collect();
        let second: Vec<Batch> = PairwiseBatchSampler::new(&x, &out, &inl, 8, 3, &mut b)
            .unwrap()
            .take(7)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sampler_draws_once_from_outer_rng() {
        let (x, out, inl) = fixture();
        let mut rng = StdRng::seed_from_u64(1);
        let mut reference = StdRng::seed_from_u64(1);
        let mut sampler = PairwiseBatchSampler::new(&x, &out, &inl, 4, 2, &mut rng).unwrap();
        sampler.next();
        sampler.next();
        sampler.next();
        let _ = reference.gen_range(0..i32::MAX as u64);
        assert_eq!(rng.gen::<u64>(), reference.gen::<u64>());
    }

    #[test]
    fn test_counter_wraps_without_restarting() {
        let (x, out, inl) = fixture();
        let mut rng = StdRng::seed_from_u64(5);
        let mut sampler = PairwiseBatchSampler::new(&x, &out, &inl, 4, 2, &mut rng).unwrap();
        sampler.next();
        assert_eq!(sampler.counter(), 1);
        sampler.next();
        assert_eq!(sampler.counter(), 0);
        // the stream keeps going past the wrap
        assert!(sampler.next().is_some());
        assert_eq!(sampler.counter(), 1);
    }

    #[test]
    fn test_sparse_batches_match_dense() {
        let (x, out, inl) = fixture();
        let sparse = FeatureMatrix::Sparse(CsrMatrix::from_dense(x.to_dense().view()));
        let mut a = StdRng::seed_from_u64(11);
        let mut b = StdRng::seed_from_u64(11);
        let dense_batch = PairwiseBatchSampler::new(&x, &out, &inl, 6, 1, &mut a)
            .unwrap()
            .next()
            .unwrap();
        let sparse_batch = PairwiseBatchSampler::new(&sparse, &out, &inl, 6, 1, &mut b)
            .unwrap()
            .next()
            .unwrap();
        assert_eq!(dense_batch, sparse_batch);
    }

    #[test]
    fn test_empty_pools_are_rejected() {
        let (x, out, _) = fixture();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            PairwiseBatchSampler::new(&x, &out, &[], 4, 1, &mut rng),
            Err(DevNetError::InsufficientData(_))
        ));
        assert!(matches!(
            PairwiseBatchSampler::new(&x, &[], &[0, 2], 4, 1, &mut rng),
            Err(DevNetError::InsufficientData(_))
        ));
    }
}
