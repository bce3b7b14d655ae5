use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

use crate::data::matrix::FeatureMatrix;

/// Rows densified at a time when scoring sparse data.
pub const SCORE_CHUNK_ROWS: usize = 512;

/// A model that maps each feature row to one anomaly score.
pub trait Scorer: Sync {
    /// Score every row of a dense block.
    fn score_block(&self, x: ArrayView2<f64>) -> Array1<f64>;

    /// Score one row.
    fn score_row(&self, x: &[f64]) -> f64 {
        let row = ArrayView1::from(x).insert_axis(Axis(0));
        self.score_block(row)[0]
    }

    /// Score a whole matrix. Sparse matrices are densified in chunks of
    /// [`SCORE_CHUNK_ROWS`] rows, scored in parallel.
    fn score_matrix(&self, x: &FeatureMatrix) -> Array1<f64> {
        match x {
            FeatureMatrix::Dense(dense) => self.score_block(dense.view()),
            FeatureMatrix::Sparse(sparse) => {
                let n = sparse.nrows();
                let starts: Vec<usize> = (0..n).step_by(SCORE_CHUNK_ROWS).collect();
                let chunks: Vec<Array1<f64>> = starts
                    .par_iter()
                    .map(|&start| {
                        let end = (start + SCORE_CHUNK_ROWS).min(n);
                        let rows: Vec<usize> = (start..end).collect();
                        self.score_block(sparse.rows_to_dense(&rows).view())
                    })
                    .collect();
                chunks.iter().flat_map(|c| c.iter().copied()).collect()
            }
        }
    }
}
