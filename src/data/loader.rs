//! Dataset loaders for the two on-disk formats.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::Array2;

use crate::config::DataFormat;
use crate::data::matrix::{CsrBuilder, FeatureMatrix};
use crate::error::{DevNetError, DevNetResult};

/// Name of the label column in CSV datasets.
pub const LABEL_COLUMN: &str = "class";

/// Feature matrix plus one binary label per row (1 = outlier, 0 = inlier).
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: FeatureMatrix,
    pub labels: Vec<u8>,
}

impl Dataset {
    pub fn n_outliers(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }
}

/// Load a dataset in the requested format.
pub fn load_dataset(path: impl AsRef<Path>, format: DataFormat) -> DevNetResult<Dataset> {
    match format {
        DataFormat::Dense => load_csv(path),
        DataFormat::Sparse => load_libsvm(path),
    }
}

fn to_label(value: f64) -> u8 {
    if value == 1.0 {
        1
    } else {
        0
    }
}

/// Read a CSV file with a header row. The `class` column (or the last column
/// when there is none) holds the labels; every other column is a feature.
pub fn load_csv(path: impl AsRef<Path>) -> DevNetResult<Dataset> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(DevNetError::parse(
            1,
            "expected at least one feature column and a label column",
        ));
    }
    let label_col = headers
        .iter()
        .position(|h| h.trim() == LABEL_COLUMN)
        .unwrap_or(headers.len() - 1);
    let dim = headers.len() - 1;

    let mut values = Vec::new();
    let mut labels = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        // header is line 1
        let line = i + 2;
        if record.len() != headers.len() {
            return Err(DevNetError::parse(
                line,
                format!("expected {} fields, found {}", headers.len(), record.len()),
            ));
        }
        for (col, field) in record.iter().enumerate() {
            let v: f64 = field.trim().parse().map_err(|_| {
                DevNetError::parse(line, format!("invalid number {:?} in column {}", field, col))
            })?;
            if col == label_col {
                labels.push(to_label(v));
            } else {
                values.push(v);
            }
        }
    }

    let x = Array2::from_shape_vec((labels.len(), dim), values)
        .map_err(|e| DevNetError::shape_mismatch(format!("{} x {}", labels.len(), dim), e.to_string()))?;
    Ok(Dataset {
        x: FeatureMatrix::Dense(x),
        labels,
    })
}

/// Read a LIBSVM file (`label idx:value idx:value ...`).
///
/// Indices are taken as 1-based unless an index 0 shows up anywhere in the
/// file, in which case they are 0-based. The width is the largest index seen.
pub fn load_libsvm(path: impl AsRef<Path>) -> DevNetResult<Dataset> {
    let reader = BufReader::new(File::open(path)?);

    let mut rows: Vec<Vec<(usize, f64)>> = Vec::new();
    let mut labels = Vec::new();
    let mut min_index = usize::MAX;
    let mut max_index = 0usize;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = i + 1;
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let mut tokens = content.split_whitespace();
        let label: f64 = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| DevNetError::parse(lineno, "missing or invalid label"))?;

        let mut entries = Vec::new();
        for token in tokens {
            if token.starts_with("qid:") {
                continue;
            }
            let (idx, val) = token
                .split_once(':')
                .ok_or_else(|| DevNetError::parse(lineno, format!("expected idx:value, got {:?}", token)))?;
            let idx: usize = idx
                .parse()
                .map_err(|_| DevNetError::parse(lineno, format!("invalid index {:?}", idx)))?;
            let val: f64 = val
                .parse()
                .map_err(|_| DevNetError::parse(lineno, format!("invalid value {:?}", val)))?;
            min_index = min_index.min(idx);
            max_index = max_index.max(idx);
            entries.push((idx, val));
        }
        entries.sort_by_key(|&(idx, _)| idx);
        if entries.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(DevNetError::parse(lineno, "duplicate feature index"));
        }
        rows.push(entries);
        labels.push(to_label(label));
    }

    let offset = if min_index == 0 { 0 } else { 1 };
    let ncols = if min_index == usize::MAX {
        0
    } else {
        max_index + 1 - offset
    };

    let mut builder = CsrBuilder::new(ncols);
    for entries in rows {
        builder.push_row(entries.into_iter().map(|(idx, v)| (idx - offset, v)));
    }
    Ok(Dataset {
        x: FeatureMatrix::Sparse(builder.build()),
        labels,
    })
}
