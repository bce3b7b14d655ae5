use std::collections::HashSet;

use ndarray::{Array2, ArrayView2, Axis};

use crate::config::DataFormat;
use crate::error::{DevNetError, DevNetResult};

/// Compressed sparse row matrix.
///
/// Row `i` owns `indices[indptr[i]..indptr[i + 1]]` (sorted ascending column
/// indices) and the matching slice of `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    /// Build from raw compressed-row arrays, checking the structural invariants.
    pub fn new(
        nrows: usize,
        ncols: usize,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<f64>,
    ) -> DevNetResult<Self> {
        if indptr.len() != nrows + 1 {
            return Err(DevNetError::shape_mismatch(
                format!("{} row pointers", nrows + 1),
                format!("{}", indptr.len()),
            ));
        }
        if indices.len() != data.len() || indptr[nrows] != data.len() {
            return Err(DevNetError::shape_mismatch(
                format!("{} stored values", indptr[nrows]),
                format!("{} indices and {} values", indices.len(), data.len()),
            ));
        }
        if indptr[0] != 0 || indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(DevNetError::shape_mismatch(
                "row pointers rising from 0",
                format!("{:?}", indptr),
            ));
        }
        for r in 0..nrows {
            let cols = &indices[indptr[r]..indptr[r + 1]];
            if cols.windows(2).any(|w| w[0] >= w[1]) || cols.iter().any(|&c| c >= ncols) {
                return Err(DevNetError::shape_mismatch(
                    format!("sorted column indices below {}", ncols),
                    format!("row {} has {:?}", r, cols),
                ));
            }
        }
        Ok(Self {
            nrows,
            ncols,
            indptr,
            indices,
            data,
        })
    }

    /// An all-zero matrix with `ncols` columns and no rows.
    pub fn empty(ncols: usize) -> Self {
        Self {
            nrows: 0,
            ncols,
            indptr: vec![0],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn from_dense(x: ArrayView2<f64>) -> Self {
        let mut builder = CsrBuilder::new(x.ncols());
        for row in x.rows() {
            builder.push_row(row.iter().copied().enumerate().filter(|&(_, v)| v != 0.0));
        }
        builder.build()
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Column indices and values of one row.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let span = self.indptr[i]..self.indptr[i + 1];
        (&self.indices[span.clone()], &self.data[span])
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        let (cols, vals) = self.row(r);
        match cols.binary_search(&c) {
            Ok(pos) => vals[pos],
            Err(_) => 0.0,
        }
    }

    /// New matrix made of the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let mut builder = CsrBuilder::new(self.ncols);
        for &r in rows {
            let (cols, vals) = self.row(r);
            builder.push_row(cols.iter().copied().zip(vals.iter().copied()));
        }
        builder.build()
    }

    /// Stack `other` below `self`.
    pub fn vstack(&self, other: &CsrMatrix) -> DevNetResult<Self> {
        if self.ncols != other.ncols {
            return Err(DevNetError::shape_mismatch(
                format!("{} columns", self.ncols),
                format!("{} columns", other.ncols),
            ));
        }
        let offset = self.nnz();
        let mut indptr = self.indptr.clone();
        indptr.extend(other.indptr.iter().skip(1).map(|p| p + offset));
        let mut indices = self.indices.clone();
        indices.extend_from_slice(&other.indices);
        let mut data = self.data.clone();
        data.extend_from_slice(&other.data);
        Ok(Self {
            nrows: self.nrows + other.nrows,
            ncols: self.ncols,
            indptr,
            indices,
            data,
        })
    }

    /// Densify only the requested rows.
    pub fn rows_to_dense(&self, rows: &[usize]) -> Array2<f64> {
        let mut out = Array2::zeros((rows.len(), self.ncols));
        for (k, &r) in rows.iter().enumerate() {
            let (cols, vals) = self.row(r);
            for (&c, &v) in cols.iter().zip(vals) {
                out[[k, c]] = v;
            }
        }
        out
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let rows: Vec<usize> = (0..self.nrows).collect();
        self.rows_to_dense(&rows)
    }

    /// Column-compressed copy, for fast lookups by column.
    pub fn to_csc(&self) -> CscMatrix {
        let mut counts = vec![0usize; self.ncols + 1];
        for &c in &self.indices {
            counts[c + 1] += 1;
        }
        for c in 0..self.ncols {
            counts[c + 1] += counts[c];
        }
        let indptr = counts.clone();
        let mut next = counts;
        let mut indices = vec![0usize; self.nnz()];
        let mut data = vec![0.0; self.nnz()];
        // Rows are visited in order, so each column's row indices come out sorted.
        for r in 0..self.nrows {
            let (cols, vals) = self.row(r);
            for (&c, &v) in cols.iter().zip(vals) {
                let slot = next[c];
                indices[slot] = r;
                data[slot] = v;
                next[c] += 1;
            }
        }
        CscMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            indptr,
            indices,
            data,
        }
    }
}

/// Incremental row-by-row construction of a [`CsrMatrix`].
#[derive(Debug)]
pub struct CsrBuilder {
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrBuilder {
    pub fn new(ncols: usize) -> Self {
        Self {
            ncols,
            indptr: vec![0],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Append a row given as `(column, value)` pairs in ascending column order.
    /// Explicit zeros are dropped.
    pub fn push_row(&mut self, entries: impl IntoIterator<Item = (usize, f64)>) {
        for (c, v) in entries {
            debug_assert!(c < self.ncols);
            if v != 0.0 {
                self.indices.push(c);
                self.data.push(v);
            }
        }
        self.indptr.push(self.indices.len());
    }

    pub fn build(self) -> CsrMatrix {
        CsrMatrix {
            nrows: self.indptr.len() - 1,
            ncols: self.ncols,
            indptr: self.indptr,
            indices: self.indices,
            data: self.data,
        }
    }
}

/// Compressed sparse column matrix. Only used for indexed reads.
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix {
    nrows: usize,
    ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CscMatrix {
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        let span = self.indptr[c]..self.indptr[c + 1];
        match self.indices[span.clone()].binary_search(&r) {
            Ok(pos) => self.data[span][pos],
            Err(_) => 0.0,
        }
    }
}

/// Feature matrix of a dataset: rows are samples, columns are features.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureMatrix {
    Dense(Array2<f64>),
    Sparse(CsrMatrix),
}

impl FeatureMatrix {
    pub fn format(&self) -> DataFormat {
        match self {
            FeatureMatrix::Dense(_) => DataFormat::Dense,
            FeatureMatrix::Sparse(_) => DataFormat::Sparse,
        }
    }

    pub fn nrows(&self) -> usize {
        match self {
            FeatureMatrix::Dense(x) => x.nrows(),
            FeatureMatrix::Sparse(x) => x.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            FeatureMatrix::Dense(x) => x.ncols(),
            FeatureMatrix::Sparse(x) => x.ncols(),
        }
    }

    /// Rows at `rows`, in that order, keeping the storage format.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        match self {
            FeatureMatrix::Dense(x) => FeatureMatrix::Dense(x.select(Axis(0), rows)),
            FeatureMatrix::Sparse(x) => FeatureMatrix::Sparse(x.select_rows(rows)),
        }
    }

    /// Drop the rows at `rows`; the remaining rows keep their relative order.
    pub fn remove_rows(&self, rows: &[usize]) -> Self {
        self.select_rows(&retained_rows(self.nrows(), rows))
    }

    /// Stack `other` below `self`. Both matrices must share format and width.
    pub fn vstack(&self, other: &FeatureMatrix) -> DevNetResult<Self> {
        if self.ncols() != other.ncols() {
            return Err(DevNetError::shape_mismatch(
                format!("{} columns", self.ncols()),
                format!("{} columns", other.ncols()),
            ));
        }
        match (self, other) {
            (FeatureMatrix::Dense(a), FeatureMatrix::Dense(b)) => {
                let stacked = ndarray::concatenate(Axis(0), &[a.view(), b.view()])
                    .map_err(|e| DevNetError::shape_mismatch("stackable arrays", e.to_string()))?;
                Ok(FeatureMatrix::Dense(stacked))
            }
            (FeatureMatrix::Sparse(a), FeatureMatrix::Sparse(b)) => {
                Ok(FeatureMatrix::Sparse(a.vstack(b)?))
            }
            _ => Err(DevNetError::shape_mismatch(
                format!("{:?} matrix", self.format()),
                format!("{:?} matrix", other.format()),
            )),
        }
    }

    /// Dense copy of the requested rows; sparse storage is only expanded here.
    pub fn rows_to_dense(&self, rows: &[usize]) -> Array2<f64> {
        match self {
            FeatureMatrix::Dense(x) => x.select(Axis(0), rows),
            FeatureMatrix::Sparse(x) => x.rows_to_dense(rows),
        }
    }

    pub fn to_dense(&self) -> Array2<f64> {
        match self {
            FeatureMatrix::Dense(x) => x.clone(),
            FeatureMatrix::Sparse(x) => x.to_dense(),
        }
    }
}

/// Indices in `0..n` that are not listed in `removed`, ascending.
pub fn retained_rows(n: usize, removed: &[usize]) -> Vec<usize> {
    let removed: HashSet<usize> = removed.iter().copied().collect();
    (0..n).filter(|i| !removed.contains(i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> Array2<f64> {
        array![[1.0, 0.0, 2.0], [0.0, 0.0, 0.0], [0.0, 3.0, 4.0]]
    }

    #[test]
    fn test_dense_sparse_conversion() {
        let dense = sample();
        let csr = CsrMatrix::from_dense(dense.view());
        assert_eq!(csr.nrows(), 3);
        assert_eq!(csr.ncols(), 3);
        assert_eq!(csr.nnz(), 4);
        assert_eq!(csr.to_dense(), dense);
        assert_eq!(csr.get(2, 1), 3.0);
        assert_eq!(csr.get(1, 1), 0.0);
    }

    #[test]
    fn test_csc_lookup_matches_csr() {
        let csr = CsrMatrix::from_dense(sample().view());
        let csc = csr.to_csc();
        for r in 0..3 {
            for c in 0..3 {
                assert_eq!(csc.get(r, c), csr.get(r, c));
            }
        }
    }

    #[test]
    fn test_new_rejects_bad_structure() {
        assert!(CsrMatrix::new(1, 2, vec![0, 2], vec![1, 0], vec![1.0, 2.0]).is_err());
        assert!(CsrMatrix::new(1, 2, vec![0, 1], vec![2], vec![1.0]).is_err());
        assert!(CsrMatrix::new(2, 2, vec![0, 1], vec![0], vec![1.0]).is_err());
        assert!(CsrMatrix::new(1, 2, vec![0, 1], vec![1], vec![1.0]).is_ok());
        // a middle pointer past the stored values
        assert!(matches!(
            CsrMatrix::new(2, 3, vec![0, 5, 1], vec![0], vec![1.0]),
            Err(DevNetError::ShapeMismatch { .. })
        ));
        assert!(CsrMatrix::new(1, 2, vec![1, 1], vec![1], vec![1.0]).is_err());
    }

    #[test]
    fn test_remove_rows_keeps_formats_in_step() {
        let dense = FeatureMatrix::Dense(sample());
        let sparse = FeatureMatrix::Sparse(CsrMatrix::from_dense(sample().view()));
        let d = dense.remove_rows(&[1]);
        let s = sparse.remove_rows(&[1]);
        assert_eq!(d.nrows(), 2);
        assert_eq!(s.nrows(), 2);
        assert_eq!(d.to_dense(), s.to_dense());
        assert_eq!(d.to_dense(), array![[1.0, 0.0, 2.0], [0.0, 3.0, 4.0]]);
    }

    #[test]
    fn test_vstack() {
        let a = FeatureMatrix::Sparse(CsrMatrix::from_dense(sample().view()));
        let b = FeatureMatrix::Sparse(CsrMatrix::from_dense(array![[5.0, 0.0, 0.0]].view()));
        let stacked = a.vstack(&b).unwrap();
        assert_eq!(stacked.nrows(), 4);
        assert_eq!(stacked.to_dense().row(3).to_vec(), vec![5.0, 0.0, 0.0]);

        let dense = FeatureMatrix::Dense(sample());
        assert!(dense.vstack(&b).is_err());
        let narrow = FeatureMatrix::Dense(array![[1.0, 2.0]]);
        assert!(dense.vstack(&narrow).is_err());
    }

    #[test]
    fn test_rows_to_dense_only_selected() {
        let sparse = FeatureMatrix::Sparse(CsrMatrix::from_dense(sample().view()));
        let block = sparse.rows_to_dense(&[2, 0, 2]);
        assert_eq!(block, array![[0.0, 3.0, 4.0], [1.0, 0.0, 2.0], [0.0, 3.0, 4.0]]);
    }
}
