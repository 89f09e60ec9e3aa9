//! Siamese comparison of two pipelines on one dataset.

use ndarray::{concatenate, Array2, ArrayView2, Axis};

use crate::config::DnaConfig;
use crate::data::Instance;
use crate::engine::{ComputationUnit, DagExecutor, LinearUnit, UnitRegistry};
use crate::error::{ExecutionError, ModelError};
use crate::pipeline::Pipeline;

use super::units::{build_registry, linear_unit, Arity, INPUT_UNIT, OUTPUT_UNIT};
use super::Result;

const MODEL_NAME: &str = "PairedDagModel";

#[derive(Debug)]
struct Fitted {
    encoder: LinearUnit,
    registry: UnitRegistry,
    comparator: LinearUnit,
}

/// Compares two pipelines on the same dataset features.
///
/// The features are encoded once; each pipeline's DAG is evaluated on that
/// shared encoding, the two terminal outputs are concatenated, and a
/// comparison unit maps them to `output_width` scores.
#[derive(Debug)]
pub struct PairedDagModel {
    config: DnaConfig,
    executor: DagExecutor,
    fitted: Option<Fitted>,
}

impl PairedDagModel {
    pub fn new(config: &DnaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            executor: DagExecutor::new(config.model.reduction, config.model.activation),
            fitted: None,
        })
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Builds the encoder, one unit per primitive seen in `train`, and the
    /// comparison unit. Returns the number of primitives.
    pub fn fit(&mut self, train: &[Instance]) -> Result<usize> {
        let first = train.first().ok_or(ModelError::EmptyTrainingSet)?;
        let model = &self.config.model;

        let encoder = linear_unit(model, INPUT_UNIT, first.feature_width(), model.hidden_width)?;
        let registry = build_registry(
            train.iter().map(|instance| instance.pipeline().as_ref()),
            model,
            Arity::Graph,
        )?;
        let comparator = linear_unit(model, OUTPUT_UNIT, 2 * model.hidden_width, model.output_width)?;

        let primitives = registry.len();
        tracing::info!(model = MODEL_NAME, instances = train.len(), primitives, "Fitted model");
        self.fitted = Some(Fitted {
            encoder,
            registry,
            comparator,
        });
        Ok(primitives)
    }

    /// Scores `left` against `right` for every row of `features`.
    pub fn compare(
        &self,
        features: ArrayView2<'_, f64>,
        left: &Pipeline,
        right: &Pipeline,
    ) -> Result<Array2<f64>> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| ModelError::NotFitted(MODEL_NAME.to_string()))?;
        fitted.registry.ensure_covers(left)?;
        fitted.registry.ensure_covers(right)?;

        let encoded = self
            .executor
            .activation()
            .apply(fitted.encoder.forward(features)?);
        let left_out = self.executor.evaluate(&fitted.registry, left, encoded.view())?;
        let right_out = self.executor.evaluate(&fitted.registry, right, encoded.view())?;

        let joined = concatenate(Axis(1), &[left_out.view(), right_out.view()]).map_err(|_| {
            ExecutionError::BatchSizeMismatch {
                left: left_out.nrows(),
                right: right_out.nrows(),
            }
        })?;
        Ok(fitted.comparator.forward(joined.view())?)
    }

    /// Scores each `left[i]` against `right[i]` using `left[i]`'s features.
    /// Returns the first output column.
    pub fn predict_pairs(&self, left: &[Instance], right: &[Instance]) -> Result<Vec<f64>> {
        if left.len() != right.len() {
            return Err(ExecutionError::BatchSizeMismatch {
                left: left.len(),
                right: right.len(),
            }
            .into());
        }

        left.iter()
            .zip(right)
            .map(|(l, r)| -> Result<f64> {
                let features = ArrayView2::from_shape((1, l.feature_width()), l.features())
                    .map_err(|_| ExecutionError::BatchSizeMismatch {
                        left: 1,
                        right: l.feature_width(),
                    })?;
                let scores = self.compare(features, l.pipeline(), r.pipeline())?;
                Ok(scores[[0, 0]])
            })
            .collect()
    }
}
