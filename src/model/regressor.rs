//! Pipeline performance regressors.
//!
//! Both regressors encode the dataset features with a shared input unit, run
//! the pipeline's steps over that encoding, and map the result to a score
//! with an output unit. They differ in how steps are composed:
//! [`FlatRegressor`] applies every step to the encoding and reduces the step
//! outputs, [`DagRegressor`] follows the pipeline's own graph.
//!
//! Batches are always grouped by [`PIPELINE_ID_KEY`], whatever
//! `loader.group_key` says, so every row of a batch runs through its own
//! pipeline.

use std::collections::HashSet;

use ndarray::{Array2, ArrayView2};

use crate::batching::GroupedBatchLoader;
use crate::config::{DnaConfig, LoaderConfig, ModelKind};
use crate::data::{Instance, PIPELINE_ID_KEY};
use crate::engine::{ComputationUnit, DagExecutor, LinearUnit, UnitRegistry};
use crate::error::{ConfigError, ModelError};
use crate::metrics::{ordinal_rank_descending, rmse};
use crate::pipeline::Pipeline;

use super::units::{build_registry, linear_unit, Arity, INPUT_UNIT, OUTPUT_UNIT};
use super::Result;

/// Outcome of [`PerformanceModel::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitSummary {
    pub instances: usize,
    pub groups: usize,
    pub batches: usize,
    /// Number of distinct primitives with a computation unit.
    pub primitives: usize,
    /// RMSE of the freshly built model over one pass of the training loader.
    pub train_rmse: f64,
}

/// A prediction together with its rank among the predicted instances.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPrediction {
    pub pipeline_id: String,
    pub prediction: f64,
    /// 0 for the highest prediction.
    pub rank: usize,
}

/// A model that predicts pipeline scores from instances.
pub trait PerformanceModel {
    fn name(&self) -> &str;

    fn is_fitted(&self) -> bool;

    /// Builds the model's units from `train` and scores one training pass.
    fn fit(&mut self, train: &[Instance]) -> Result<FitSummary>;

    /// Predicts one score per instance, in input order.
    fn predict(&self, data: &[Instance]) -> Result<Vec<f64>>;

    /// Predicts and ranks `data`, in input order.
    fn predict_rank(&self, data: &[Instance]) -> Result<Vec<RankedPrediction>> {
        let predictions = self.predict(data)?;
        let ranks = ordinal_rank_descending(&predictions);
        Ok(data
            .iter()
            .zip(predictions)
            .zip(ranks)
            .map(|((instance, prediction), rank)| RankedPrediction {
                pipeline_id: instance.pipeline().id().to_string(),
                prediction,
                rank,
            })
            .collect())
    }

    /// Pipeline ids of the `k` highest-scoring instances, best first.
    fn predict_top_k(&self, data: &[Instance], k: usize) -> Result<Vec<String>> {
        let mut ranked = self.predict_rank(data)?;
        ranked.sort_by_key(|prediction| prediction.rank);
        Ok(ranked
            .into_iter()
            .take(k)
            .map(|prediction| prediction.pipeline_id)
            .collect())
    }
}

#[derive(Debug)]
struct Fitted {
    encoder: LinearUnit,
    registry: UnitRegistry,
    head: LinearUnit,
}

/// State shared by the flat and DAG regressors.
#[derive(Debug)]
struct RegressorCore {
    name: &'static str,
    config: DnaConfig,
    executor: DagExecutor,
    fitted: Option<Fitted>,
}

impl RegressorCore {
    fn new(name: &'static str, kind: ModelKind, config: &DnaConfig) -> std::result::Result<Self, ConfigError> {
        let mut config = config.clone();
        config.model.kind = kind;
        config.validate()?;
        let executor = DagExecutor::new(config.model.reduction, config.model.activation);
        Ok(Self {
            name,
            config,
            executor,
            fitted: None,
        })
    }

    fn arity(&self) -> Arity {
        match self.config.model.kind {
            ModelKind::Flat => Arity::Shared,
            ModelKind::Dag => Arity::Graph,
        }
    }

    fn fitted(&self) -> Result<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or_else(|| ModelError::NotFitted(self.name.to_string()))
    }

    /// Loader settings with the group key pinned to the pipeline id.
    fn loader_config(&self) -> LoaderConfig {
        let loader = &self.config.loader;
        if loader.group_key != PIPELINE_ID_KEY {
            tracing::debug!(
                model = self.name,
                group_key = %loader.group_key,
                "Grouping model batches by pipeline id instead"
            );
        }
        loader.clone().with_group_key(PIPELINE_ID_KEY)
    }

    fn fit(&mut self, train: &[Instance]) -> Result<FitSummary> {
        if train.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        let model = &self.config.model;
        let loader_config = self.loader_config().with_seed(model.loader_seed());
        let mut loader = GroupedBatchLoader::new(train, &loader_config)?;
        if loader.is_empty() {
            tracing::warn!(
                model = self.name,
                instances = train.len(),
                batch_size = loader_config.batch_size,
                "Every training group is smaller than the batch size"
            );
            return Err(ModelError::NoTrainingBatches {
                instances: train.len(),
                batch_size: loader_config.batch_size,
            });
        }

        let encoder = linear_unit(model, INPUT_UNIT, loader.feature_width(), model.hidden_width)?;
        let registry = build_registry(
            train.iter().map(|instance| instance.pipeline().as_ref()),
            model,
            self.arity(),
        )?;
        let head = linear_unit(model, OUTPUT_UNIT, model.hidden_width, model.output_width)?;
        let fitted = Fitted {
            encoder,
            registry,
            head,
        };

        let mut predictions = Vec::with_capacity(train.len());
        let mut targets = Vec::with_capacity(train.len());
        let groups = loader.group_labels().count();
        let batches = loader.len();
        for batch in loader.iter() {
            let output = self.forward(&fitted, &batch.pipeline, batch.features.view())?;
            predictions.extend(output.column(0).iter().copied());
            targets.extend(batch.targets.iter().copied());
        }
        let train_rmse = rmse(&predictions, &targets)?;

        let summary = FitSummary {
            instances: train.len(),
            groups,
            batches,
            primitives: fitted.registry.len(),
            train_rmse,
        };
        tracing::info!(
            model = self.name,
            instances = summary.instances,
            groups = summary.groups,
            batches = summary.batches,
            primitives = summary.primitives,
            train_rmse = summary.train_rmse,
            "Fitted model"
        );

        self.fitted = Some(fitted);
        Ok(summary)
    }

    fn forward(&self, fitted: &Fitted, pipeline: &Pipeline, features: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let activation = self.executor.activation();
        let encoded = activation.apply(fitted.encoder.forward(features)?);
        let hidden = match self.config.model.kind {
            ModelKind::Flat => self.executor.evaluate_flat(&fitted.registry, pipeline, encoded.view())?,
            ModelKind::Dag => self.executor.evaluate(&fitted.registry, pipeline, encoded.view())?,
        };
        Ok(fitted.head.forward(hidden.view())?)
    }

    fn predict_raw(&self, data: &[Instance]) -> Result<Array2<f64>> {
        let fitted = self.fitted()?;
        let mut output = Array2::zeros((data.len(), self.config.model.output_width));
        if data.is_empty() {
            return Ok(output);
        }

        let mut checked = HashSet::new();
        for instance in data {
            if checked.insert(instance.pipeline().id()) {
                fitted.registry.ensure_covers(instance.pipeline())?;
            }
        }

        let loader_config = self.loader_config().with_shuffle(false).with_drop_last(false);
        let mut loader = GroupedBatchLoader::new(data, &loader_config)?;
        for batch in loader.iter() {
            let result = self.forward(fitted, &batch.pipeline, batch.features.view())?;
            for (row, &index) in batch.indices.iter().enumerate() {
                output.row_mut(index).assign(&result.row(row));
            }
        }

        tracing::debug!(model = self.name, instances = data.len(), batches = loader.len(), "Predicted");
        Ok(output)
    }

    fn predict(&self, data: &[Instance]) -> Result<Vec<f64>> {
        Ok(self.predict_raw(data)?.column(0).to_vec())
    }
}

macro_rules! regressor {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name {
            core: RegressorCore,
        }

        impl $name {
            /// Creates an unfitted model; `config.model.kind` is ignored.
            pub fn new(config: &DnaConfig) -> Result<Self> {
                Ok(Self {
                    core: RegressorCore::new(stringify!($name), $kind, config)?,
                })
            }

            pub fn config(&self) -> &DnaConfig {
                &self.core.config
            }

            /// Unit registry, available after fit.
            pub fn registry(&self) -> Option<&UnitRegistry> {
                self.core.fitted.as_ref().map(|fitted| &fitted.registry)
            }

            /// Scores with all `output_width` columns, one row per instance.
            pub fn predict_raw(&self, data: &[Instance]) -> Result<Array2<f64>> {
                self.core.predict_raw(data)
            }
        }

        impl PerformanceModel for $name {
            fn name(&self) -> &str {
                self.core.name
            }

            fn is_fitted(&self) -> bool {
                self.core.fitted.is_some()
            }

            fn fit(&mut self, train: &[Instance]) -> Result<FitSummary> {
                self.core.fit(train)
            }

            fn predict(&self, data: &[Instance]) -> Result<Vec<f64>> {
                self.core.predict(data)
            }
        }
    };
}

regressor!(
    /// Regressor in which every step reads the shared feature encoding and
    /// the step outputs are reduced element-wise.
    ///
    /// Rejects the `concat` reduction, since the reduced width would vary with
    /// pipeline length.
    FlatRegressor,
    ModelKind::Flat
);

regressor!(
    /// Regressor that composes step units along each pipeline's DAG and maps
    /// the terminal step's output to a score.
    DagRegressor,
    ModelKind::Dag
);

/// Builds the regressor selected by `config.model.kind`.
pub fn build_model(config: &DnaConfig) -> Result<Box<dyn PerformanceModel>> {
    Ok(match config.model.kind {
        ModelKind::Flat => Box::new(FlatRegressor::new(config)?),
        ModelKind::Dag => Box::new(DagRegressor::new(config)?),
    })
}
