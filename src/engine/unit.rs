//! Computation units: the per-primitive functions a DAG is built from.

use std::fmt::Debug;

use ndarray::{Array1, Array2, ArrayView2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};

use crate::error::{ConfigError, ExecutionError};

/// A function from a `rows x input_width` matrix to a `rows x output_width`
/// matrix.
///
/// One unit exists per primitive name and is shared by every step that uses
/// that primitive, across all pipelines.
pub trait ComputationUnit: Debug + Send + Sync {
    /// Human-readable identifier, usually the primitive name.
    fn name(&self) -> &str;

    /// Required input width, or `None` when any width is accepted.
    fn input_width(&self) -> Option<usize>;

    /// Output width for an input of `input_width` columns.
    fn output_width(&self, input_width: usize) -> usize;

    /// Applies the unit to a batch.
    fn forward(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, ExecutionError>;
}

/// Passes its input through unchanged.
#[derive(Debug, Clone)]
pub struct IdentityUnit {
    name: String,
}

impl IdentityUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ComputationUnit for IdentityUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> Option<usize> {
        None
    }

    fn output_width(&self, input_width: usize) -> usize {
        input_width
    }

    fn forward(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, ExecutionError> {
        Ok(input.to_owned())
    }
}

/// Dense affine map `x W + b`.
#[derive(Debug, Clone)]
pub struct LinearUnit {
    name: String,
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl LinearUnit {
    /// Builds a unit from explicit parameters.
    ///
    /// `weights` is `input_width x output_width`; `bias` has `output_width`
    /// entries.
    pub fn from_parts(
        name: impl Into<String>,
        weights: Array2<f64>,
        bias: Array1<f64>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if weights.ncols() != bias.len() {
            return Err(ConfigError::InvalidValue {
                key: name,
                message: format!(
                    "weights have {} outputs but bias has {}",
                    weights.ncols(),
                    bias.len()
                ),
            });
        }
        Ok(Self {
            name,
            weights,
            bias,
        })
    }

    /// Builds a unit with parameters drawn uniformly from
    /// `[-1/sqrt(input_width), 1/sqrt(input_width))`.
    pub fn seeded(
        name: impl Into<String>,
        input_width: usize,
        output_width: usize,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if input_width == 0 || output_width == 0 {
            return Err(ConfigError::InvalidValue {
                key: name,
                message: format!(
                    "unit widths must be positive, got {}x{}",
                    input_width, output_width
                ),
            });
        }

        let bound = 1.0 / (input_width as f64).sqrt();
        let dist = Uniform::new(-bound, bound).map_err(|e| ConfigError::InvalidValue {
            key: name.clone(),
            message: e.to_string(),
        })?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let weights =
            Array2::from_shape_simple_fn((input_width, output_width), || dist.sample(&mut rng));
        let bias = Array1::from_shape_simple_fn(output_width, || dist.sample(&mut rng));

        Ok(Self {
            name,
            weights,
            bias,
        })
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn bias(&self) -> &Array1<f64> {
        &self.bias
    }
}

impl ComputationUnit for LinearUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.weights.nrows())
    }

    fn output_width(&self, _input_width: usize) -> usize {
        self.weights.ncols()
    }

    fn forward(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, ExecutionError> {
        if input.ncols() != self.weights.nrows() {
            return Err(ExecutionError::UnitInputMismatch {
                unit: self.name.clone(),
                expected: self.weights.nrows(),
                found: input.ncols(),
            });
        }
        Ok(input.dot(&self.weights) + &self.bias)
    }
}
