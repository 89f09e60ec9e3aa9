//! Error types for pipeline-dna operations.
//!
//! Defines error types for every subsystem:
//! - Pipeline structure validation
//! - Record grouping and parsing
//! - Grouped batch loading
//! - DAG execution
//! - Configuration
//! - Model fitting and prediction
//! - Evaluation metrics

use thiserror::Error;

/// Errors raised while validating a pipeline's step graph.
#[derive(Debug, Error)]
pub enum StructureError {
    #[error("Pipeline '{0}' has no steps")]
    EmptyPipeline(String),

    #[error("Pipeline '{pipeline}' step {step} has no inputs")]
    EmptyInputs { pipeline: String, step: usize },

    #[error("Pipeline '{pipeline}' step {step} references step {reference}, which is not an earlier step")]
    ForwardReference {
        pipeline: String,
        step: usize,
        reference: usize,
    },

    #[error("Invalid input reference '{0}': expected an integer, 'inputs.0' or 'steps.N.produce'")]
    InvalidReference(String),
}

/// Errors that can occur while grouping records by a key path.
#[derive(Debug, Error)]
pub enum GroupingError {
    #[error("Record {index} is missing key path '{key_path}'")]
    MissingKey { index: usize, key_path: String },

    #[error("Record {index} has a non-groupable value at key path '{key_path}'")]
    UnhashableValue { index: usize, key_path: String },
}

/// Errors that can occur while parsing and preprocessing records.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: String },

    #[error("Record {index} has an invalid '{field}' field: {message}")]
    InvalidField {
        index: usize,
        field: String,
        message: String,
    },

    #[error("Record {index} is missing metafeature '{feature}'")]
    MissingFeature { index: usize, feature: String },

    #[error("Preprocessor used before fit")]
    NotFitted,

    #[error("Cannot fit on an empty record set")]
    EmptyInput,

    #[error("Structure error: {0}")]
    Structure(#[from] StructureError),

    #[error("Grouping error: {0}")]
    Grouping(#[from] GroupingError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while building a grouped batch loader.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("batch_size must be greater than 0")]
    InvalidBatchSize,

    #[error("Group '{group}' mixes pipeline templates: expected '{expected}', record {index} has '{found}'")]
    MixedTemplates {
        group: String,
        expected: String,
        found: String,
        index: usize,
    },

    #[error("Record {index} has {found} features, expected {expected}")]
    FeatureWidthMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Grouping error: {0}")]
    Grouping(#[from] GroupingError),
}

/// Errors raised while evaluating a pipeline graph.
///
/// Every variant names the pipeline and, where applicable, the step being
/// evaluated when the failure happened.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Pipeline '{pipeline}' step {step} uses primitive '{primitive}' with no registered computation unit")]
    UnknownPrimitive {
        pipeline: String,
        step: usize,
        primitive: String,
    },

    #[error("Pipeline '{pipeline}' has no steps")]
    EmptyPipeline { pipeline: String },

    #[error("Pipeline '{pipeline}' step {step} has no inputs")]
    EmptyInputs { pipeline: String, step: usize },

    #[error("Pipeline '{pipeline}' step {step} references missing step {reference}")]
    InvalidReference {
        pipeline: String,
        step: usize,
        reference: usize,
    },

    #[error("Pipeline '{pipeline}' has a cycle through step {step}")]
    Cycle { pipeline: String, step: usize },

    #[error("Pipeline '{pipeline}' step {step}: unit expects input width {expected}, got {found}")]
    ShapeMismatch {
        pipeline: String,
        step: usize,
        expected: usize,
        found: usize,
    },

    #[error("Pipeline '{pipeline}' step {step}: cannot reduce inputs of widths {widths:?} element-wise")]
    ReductionMismatch {
        pipeline: String,
        step: usize,
        widths: Vec<usize>,
    },

    #[error("Unit '{unit}' expects input width {expected}, got {found}")]
    UnitInputMismatch {
        unit: String,
        expected: usize,
        found: usize,
    },

    #[error("Batch row counts differ: {left} vs {right}")]
    BatchSizeMismatch { left: usize, right: usize },
}

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Unsupported reduction policy '{0}': expected one of concat, max, mean, sum")]
    UnsupportedReduction(String),

    #[error("Unsupported activation '{0}': expected one of identity, relu, tanh, sigmoid")]
    UnsupportedActivation(String),

    #[error("Primitive '{primitive}' appears with {expected} and {found} inputs; concat reduction needs a fixed arity")]
    InconsistentArity {
        primitive: String,
        expected: usize,
        found: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur while fitting or querying a model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{0} used before fit")]
    NotFitted(String),

    #[error("Cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("No training batches: {instances} instances, every group smaller than batch size {batch_size}")]
    NoTrainingBatches { instances: usize, batch_size: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Loader error: {0}")]
    Loader(#[from] LoaderError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Structure error: {0}")]
    Structure(#[from] StructureError),

    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),
}

/// Errors that can occur while computing evaluation metrics.
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("Length mismatch: {left} predictions vs {right} targets")]
    LengthMismatch { left: usize, right: usize },

    #[error("Metric requires at least {0} values")]
    TooFewValues(usize),

    #[error("Correlation is undefined for constant input")]
    ZeroVariance,
}
