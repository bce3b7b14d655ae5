use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{DevNetError, DevNetResult};

/// Row indices of a train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Indices of outlier (label 1) and inlier (label 0) rows, ascending.
pub fn partition_indices(labels: &[u8]) -> (Vec<usize>, Vec<usize>) {
    let mut outliers = Vec::new();
    let mut inliers = Vec::new();
    for (i, &label) in labels.iter().enumerate() {
        if label == 1 {
            outliers.push(i);
        } else {
            inliers.push(i);
        }
    }
    (outliers, inliers)
}

/// Shuffled train/test split that keeps the class proportions of `labels`.
///
/// The test partition holds `ceil(test_size * n)` rows. Each class
/// contributes its proportional share, with leftover slots going to the
/// classes with the largest fractional remainders.
pub fn stratified_split(labels: &[u8], test_size: f64, seed: u64) -> DevNetResult<Split> {
    let n = labels.len();
    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);

    let (outliers, inliers) = partition_indices(labels);
    let classes: Vec<Vec<usize>> = [inliers, outliers]
        .into_iter()
        .filter(|members| !members.is_empty())
        .collect();

    if let Some(smallest) = classes.iter().map(Vec::len).min() {
        if smallest < 2 {
            return Err(DevNetError::insufficient_data(
                "the least populated class has only 1 member, stratified split needs at least 2",
            ));
        }
    }
    if n_test < classes.len() || n_train < classes.len() {
        return Err(DevNetError::insufficient_data(format!(
            "a split of {} train / {} test rows cannot hold all {} classes",
            n_train,
            n_test,
            classes.len()
        )));
    }

    // proportional allocation, largest remainder first
    let mut alloc: Vec<usize> = Vec::with_capacity(classes.len());
    let mut remainders: Vec<(usize, f64)> = Vec::with_capacity(classes.len());
    for (k, members) in classes.iter().enumerate() {
        let exact = members.len() as f64 * n_test as f64 / n as f64;
        alloc.push(exact.floor() as usize);
        remainders.push((k, exact - exact.floor()));
    }
    remainders.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut missing = n_test - alloc.iter().sum::<usize>();
    for &(k, _) in remainders.iter().cycle() {
        if missing == 0 {
            break;
        }
        if alloc[k] < classes[k].len() {
            alloc[k] += 1;
            missing -= 1;
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for (members, &take) in classes.iter().zip(&alloc) {
        let mut shuffled = members.clone();
        shuffled.shuffle(&mut rng);
        test.extend_from_slice(&shuffled[..take]);
        train.extend_from_slice(&shuffled[take..]);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok(Split { train, test })
}
