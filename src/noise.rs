//! Synthetic contamination of training data.
//!
//! Noise rows are built from pairs of known outliers: a copy of the first
//! outlier with a few features overwritten by those of the second. Appended to
//! the training set with label 0 they play the part of anomalies hiding among
//! the unlabeled data.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use crate::data::matrix::{CsrBuilder, CsrMatrix, FeatureMatrix};
use crate::error::{DevNetError, DevNetResult};

/// Share of features swapped in each noise row, in percent.
pub const SWAP_PERCENT: usize = 5;

/// Number of features copied from the second outlier: `ceil(0.05 * dim)`.
pub fn swap_feature_count(dim: usize) -> usize {
    (dim * SWAP_PERCENT + 99) / 100
}

/// Generate `n_out` noise rows from the rows of `outliers`.
///
/// The result has the same storage format as the input. Dense and sparse
/// inputs holding the same values yield the same rows for the same seed.
pub fn inject_noise(
    outliers: &FeatureMatrix,
    n_out: usize,
    random_seed: u64,
) -> DevNetResult<FeatureMatrix> {
    if n_out > 0 && outliers.nrows() < 2 {
        return Err(DevNetError::insufficient_data(format!(
            "noise injection needs at least 2 outliers, got {}",
            outliers.nrows()
        )));
    }
    let mut rng = StdRng::seed_from_u64(random_seed);
    Ok(match outliers {
        FeatureMatrix::Dense(x) => FeatureMatrix::Dense(inject_noise_dense(x.view(), n_out, &mut rng)),
        FeatureMatrix::Sparse(x) => FeatureMatrix::Sparse(inject_noise_sparse(x, n_out, &mut rng)),
    })
}

/// Draw the two source rows and the swapped feature indices for one noise row.
fn draw_swap(rng: &mut StdRng, n_sample: usize, dim: usize, n_swap: usize) -> (usize, usize, Vec<usize>) {
    let pair = index::sample(rng, n_sample, 2);
    let feats = index::sample(rng, dim, n_swap).into_vec();
    (pair.index(0), pair.index(1), feats)
}

fn inject_noise_dense(seed: ArrayView2<f64>, n_out: usize, rng: &mut StdRng) -> Array2<f64> {
    let (n_sample, dim) = seed.dim();
    let n_swap = swap_feature_count(dim);
    let mut noise = Array2::zeros((n_out, dim));
    for i in 0..n_out {
        let (o1, o2, feats) = draw_swap(rng, n_sample, dim, n_swap);
        let mut row = noise.row_mut(i);
        row.assign(&seed.row(o1));
        for f in feats {
            row[f] = seed[[o2, f]];
        }
    }
    noise
}

fn inject_noise_sparse(seed: &CsrMatrix, n_out: usize, rng: &mut StdRng) -> CsrMatrix {
    let (n_sample, dim) = (seed.nrows(), seed.ncols());
    let n_swap = swap_feature_count(dim);
    // base rows come from CSR, swapped values are looked up by column
    let by_column = seed.to_csc();
    let mut noise = CsrBuilder::new(dim);
    for _ in 0..n_out {
        let (o1, o2, feats) = draw_swap(rng, n_sample, dim, n_swap);
        let (cols, vals) = seed.row(o1);
        let mut row: BTreeMap<usize, f64> =
            cols.iter().copied().zip(vals.iter().copied()).collect();
        for f in feats {
            let v = by_column.get(o2, f);
            if v != 0.0 {
                row.insert(f, v);
            } else {
                row.remove(&f);
            }
        }
        noise.push_row(row);
    }
    noise.build()
}
