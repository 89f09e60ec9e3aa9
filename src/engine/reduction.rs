//! Reduction of several node outputs into one unit input.

use std::fmt;
use std::str::FromStr;

use ndarray::{concatenate, Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How a node with several upstream dependencies combines their outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionPolicy {
    /// Concatenate along the feature axis.
    Concat,
    /// Element-wise maximum.
    #[default]
    Max,
    /// Element-wise mean.
    Mean,
    /// Element-wise sum.
    Sum,
}

impl ReductionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReductionPolicy::Concat => "concat",
            ReductionPolicy::Max => "max",
            ReductionPolicy::Mean => "mean",
            ReductionPolicy::Sum => "sum",
        }
    }

    pub fn is_concat(&self) -> bool {
        matches!(self, ReductionPolicy::Concat)
    }

    /// Input width a unit needs for a node with `num_inputs` inputs of
    /// `feature_width` each.
    pub fn input_width(&self, num_inputs: usize, feature_width: usize) -> usize {
        match self {
            ReductionPolicy::Concat => num_inputs * feature_width,
            _ => feature_width,
        }
    }

    /// Combines `inputs` row-wise.
    ///
    /// Returns `None` when the inputs cannot be combined: no inputs, differing
    /// row counts, or differing widths under an element-wise policy.
    pub fn combine(&self, inputs: &[ArrayView2<'_, f64>]) -> Option<Array2<f64>> {
        let (first, rest) = inputs.split_first()?;
        if rest.iter().any(|input| input.nrows() != first.nrows()) {
            return None;
        }

        if self.is_concat() {
            return concatenate(Axis(1), inputs).ok();
        }
        if rest.iter().any(|input| input.ncols() != first.ncols()) {
            return None;
        }

        let mut acc = first.to_owned();
        for input in rest {
            match self {
                ReductionPolicy::Max => {
                    Zip::from(&mut acc).and(input).for_each(|a, &b| *a = a.max(b))
                }
                _ => acc += input,
            }
        }
        if *self == ReductionPolicy::Mean {
            acc /= inputs.len() as f64;
        }
        Some(acc)
    }
}

impl fmt::Display for ReductionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReductionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "concat" | "cat" => Ok(ReductionPolicy::Concat),
            "max" => Ok(ReductionPolicy::Max),
            "mean" | "avg" => Ok(ReductionPolicy::Mean),
            "sum" => Ok(ReductionPolicy::Sum),
            _ => Err(ConfigError::UnsupportedReduction(s.to_string())),
        }
    }
}
