//! Regression error metrics.

use crate::error::MetricError;

use super::Result;

pub(crate) fn check_lengths(predictions: &[f64], targets: &[f64], min: usize) -> Result<()> {
    if predictions.len() != targets.len() {
        return Err(MetricError::LengthMismatch {
            left: predictions.len(),
            right: targets.len(),
        });
    }
    if predictions.len() < min {
        return Err(MetricError::TooFewValues(min));
    }
    Ok(())
}

/// Root mean squared error.
pub fn rmse(predictions: &[f64], targets: &[f64]) -> Result<f64> {
    check_lengths(predictions, targets, 1)?;
    let sum: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum();
    Ok((sum / predictions.len() as f64).sqrt())
}

/// Mean absolute error.
pub fn mae(predictions: &[f64], targets: &[f64]) -> Result<f64> {
    check_lengths(predictions, targets, 1)?;
    let sum: f64 = predictions.iter().zip(targets).map(|(p, t)| (p - t).abs()).sum();
    Ok(sum / predictions.len() as f64)
}
