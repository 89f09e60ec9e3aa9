//! pipeline-dna: pipeline performance prediction over pipeline graphs.
//!
//! This library groups pipeline-run records into structurally homogeneous
//! batches and evaluates each pipeline's DAG with computation units shared
//! across every pipeline that uses the same primitive.

// Core modules
pub mod batching;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod telemetry;

// Re-export commonly used error types
pub use error::{
    ConfigError, DataError, ExecutionError, GroupingError, LoaderError, MetricError, ModelError,
    StructureError,
};

// Re-export the main entry points
pub use batching::{Batch, GroupedBatchLoader};
pub use config::{DnaConfig, LoaderConfig, ModelConfig, ModelKind};
pub use data::{Instance, Preprocessor, RecordSchema};
pub use engine::{DagExecutor, ReductionPolicy, UnitRegistry};
pub use model::{DagRegressor, FlatRegressor, PairedDagModel, PerformanceModel};
pub use pipeline::{encode_dag, InputRef, Pipeline, Step, StructureKey};
