//! Evaluation metrics for performance predictions.
//!
//! Regression error ([`rmse`], [`mae`]) and rank agreement
//! ([`pearson_correlation`], [`spearman_correlation`]) between predicted and
//! observed pipeline scores.

pub mod ranking;
pub mod regression;

pub use ranking::{
    ordinal_rank_descending, pearson_correlation, rank_descending, spearman_correlation,
};
pub use regression::{mae, rmse};

use crate::error::MetricError;

/// Result type alias for metric computations.
pub type Result<T> = std::result::Result<T, MetricError>;
