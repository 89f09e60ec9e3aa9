//! Model drivers built on the batching and execution core.
//!
//! - [`FlatRegressor`]: every step reads the shared feature encoding; step
//!   outputs are reduced element-wise.
//! - [`DagRegressor`]: steps are composed along each pipeline's graph.
//! - [`PairedDagModel`]: two pipelines evaluated on one shared encoding and
//!   compared by a final unit.
//!
//! Models own their [`UnitRegistry`](crate::engine::UnitRegistry), built at
//! fit time with one unit per primitive name. Unit parameters are seeded from
//! the model seed and the primitive name, so they do not depend on the order
//! in which primitives were encountered. Parameter training is left to the
//! caller.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pipeline_dna::config::DnaConfig;
//! use pipeline_dna::data::Instance;
//! use pipeline_dna::model::{DagRegressor, PerformanceModel};
//! use pipeline_dna::pipeline::{Pipeline, Step};
//!
//! let pipeline = Arc::new(Pipeline::new(
//!     "p1",
//!     vec![Step::external("imputer"), Step::from_steps("svc", &[0])],
//! ));
//! let train: Vec<Instance> = (0..6)
//!     .map(|i| Instance::new(format!("d{}", i), vec![i as f64, 1.0], 0.1 * i as f64, Arc::clone(&pipeline)))
//!     .collect();
//!
//! let mut model = DagRegressor::new(&DnaConfig::default()).unwrap();
//! model.fit(&train).unwrap();
//! let top = model.predict_top_k(&train, 2).unwrap();
//! assert_eq!(top, vec!["p1".to_string(), "p1".to_string()]);
//! ```

pub mod paired;
pub mod regressor;
mod units;

pub use paired::PairedDagModel;
pub use regressor::{
    build_model, DagRegressor, FitSummary, FlatRegressor, PerformanceModel, RankedPrediction,
};

use crate::error::ModelError;

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
