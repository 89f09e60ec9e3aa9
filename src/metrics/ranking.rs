//! Correlation and ranking metrics.

use crate::error::MetricError;

use super::regression::check_lengths;
use super::Result;

/// Indices of `values` sorted from largest to smallest, ties in input order.
fn descending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    order
}

/// Ranks `values` from largest (rank 0) to smallest.
///
/// Tied values share the mean of the ranks they span, so `[5, 5, 1]` ranks
/// as `[0.5, 0.5, 2]`.
pub fn rank_descending(values: &[f64]) -> Vec<f64> {
    let order = descending_order(values);
    let mut ranks = vec![0.0; values.len()];

    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let shared = (start + end - 1) as f64 / 2.0;
        for &index in &order[start..end] {
            ranks[index] = shared;
        }
        start = end;
    }
    ranks
}

/// Ranks `values` from largest (rank 0) to smallest, breaking ties by input
/// order so every rank is distinct.
pub fn ordinal_rank_descending(values: &[f64]) -> Vec<usize> {
    let mut ranks = vec![0; values.len()];
    for (rank, index) in descending_order(values).into_iter().enumerate() {
        ranks[index] = rank;
    }
    ranks
}

/// Pearson correlation coefficient.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> Result<f64> {
    check_lengths(a, b, 2)?;
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        covariance += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return Err(MetricError::ZeroVariance);
    }
    Ok(covariance / (var_a.sqrt() * var_b.sqrt()))
}

/// Spearman rank correlation, with average ranks for ties.
pub fn spearman_correlation(a: &[f64], b: &[f64]) -> Result<f64> {
    check_lengths(a, b, 2)?;
    pearson_correlation(&rank_descending(a), &rank_descending(b))
}
