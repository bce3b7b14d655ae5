//! Ranking metrics for anomaly scores.
//!
//! Both metrics treat higher scores as more anomalous and label 1 as the
//! positive (outlier) class.

use std::cmp::Ordering;

use crate::error::{DevNetError, DevNetResult};

/// AUC-ROC and AUC-PR of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AucPerformance {
    pub auc_roc: f64,
    pub auc_pr: f64,
}

/// Compute both AUC-ROC and AUC-PR (average precision). `scores` and
/// `labels` must have one entry per row.
pub fn auc_performance(scores: &[f64], labels: &[u8]) -> DevNetResult<AucPerformance> {
    if scores.len() != labels.len() {
        return Err(DevNetError::shape_mismatch(
            format!("{} labels", scores.len()),
            format!("{} labels", labels.len()),
        ));
    }
    Ok(AucPerformance {
        auc_roc: auc_roc(scores, labels),
        auc_pr: average_precision(scores, labels),
    })
}

/// Indices sorted by descending score.
fn descending_order(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    order
}

/// Area under the ROC curve via the rank-sum statistic, ties counted half.
/// Returns 0.5 when only one class is present.
fn auc_roc(scores: &[f64], labels: &[u8]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    // ascending ranks, averaged over tie groups
    let mut order = descending_order(scores);
    order.reverse();
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            if labels[k] == 1 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    (rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg as f64)
}

/// Average precision: `sum_k (R_k - R_{k-1}) * P_k` over distinct score
/// thresholds, highest first. Returns 0.0 when there are no positives.
fn average_precision(scores: &[f64], labels: &[u8]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    if n_pos == 0 {
        return 0.0;
    }

    let order = descending_order(scores);
    let mut tp = 0usize;
    let mut seen = 0usize;
    let mut prev_recall = 0.0;
    let mut ap = 0.0;
    let mut i = 0;
    while i < order.len() {
        // consume the whole tie group before taking a point on the curve
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]] == threshold {
            if labels[order[i]] == 1 {
                tp += 1;
            }
            seen += 1;
            i += 1;
        }
        let precision = tp as f64 / seen as f64;
        let recall = tp as f64 / n_pos as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }
    ap
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_perfect_ranking() {
        let scores = [0.9, 0.8, 0.1, 0.2];
        let labels = [1, 1, 0, 0];
        let perf = auc_performance(&scores, &labels).unwrap();
        assert!(close(perf.auc_roc, 1.0));
        assert!(close(perf.auc_pr, 1.0));
    }

    #[test]
    fn test_inverted_ranking() {
        let scores = [0.1, 0.2, 0.9, 0.8];
        let labels = [1, 1, 0, 0];
        assert!(close(auc_roc(&scores, &labels), 0.0));
    }

    #[test]
    fn test_known_values() {
        // sklearn: roc_auc_score([0, 0, 1, 1], [0.1, 0.4, 0.35, 0.8]) == 0.75
        //          average_precision_score(...) == 0.8333...
        let scores = [0.1, 0.4, 0.35, 0.8];
        let labels = [0, 0, 1, 1];
        assert!(close(auc_roc(&scores, &labels), 0.75));
        assert!(close(average_precision(&scores, &labels), 5.0 / 6.0));
    }

    #[test]
    fn test_ties_count_half() {
        let scores = [0.5, 0.5];
        let labels = [1, 0];
        assert!(close(auc_roc(&scores, &labels), 0.5));
        assert!(close(average_precision(&scores, &labels), 0.5));
    }

    #[test]
    fn test_single_class() {
        assert!(close(auc_roc(&[0.1, 0.2], &[0, 0]), 0.5));
        assert!(close(average_precision(&[0.1, 0.2], &[0, 0]), 0.0));
        assert!(close(average_precision(&[0.1, 0.2], &[1, 1]), 1.0));
    }

    #[test]
    fn test_metrics_in_unit_interval() {
        let scores: Vec<f64> = (0..50).map(|i| ((i * 37) % 11) as f64).collect();
        let labels: Vec<u8> = (0..50).map(|i| u8::from(i % 7 == 0)).collect();
        let perf = auc_performance(&scores, &labels).unwrap();
        assert!((0.0..=1.0).contains(&perf.auc_roc));
        assert!((0.0..=1.0).contains(&perf.auc_pr));
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        assert!(matches!(
            auc_performance(&[0.1, 0.2, 0.3], &[1, 0]),
            Err(DevNetError::ShapeMismatch { .. })
        ));
    }
}
