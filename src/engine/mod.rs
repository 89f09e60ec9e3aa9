//! DAG execution over shared computation units.
//!
//! Every primitive name maps to one [`ComputationUnit`] held in a
//! [`UnitRegistry`]. A [`DagExecutor`] evaluates a pipeline against that
//! registry in one of two shapes:
//!
//! - [`DagExecutor::evaluate`] composes units along the pipeline's own graph.
//!   A step reading the external input consumes it directly; a step with one
//!   dependency consumes that dependency's value; a step with several
//!   dependencies combines them with the model's [`ReductionPolicy`].
//! - [`DagExecutor::evaluate_flat`] applies every step's unit to the shared
//!   input and reduces all step outputs element-wise.
//!
//! All failures are typed [`ExecutionError`]s naming the pipeline and step.
//!
//! # Example
//!
//! ```
//! use ndarray::array;
//! use pipeline_dna::engine::{Activation, DagExecutor, IdentityUnit, ReductionPolicy, UnitRegistry};
//! use pipeline_dna::pipeline::{Pipeline, Step};
//!
//! let pipeline = Pipeline::new(
//!     "p",
//!     vec![Step::external("a"), Step::from_steps("b", &[0]), Step::from_steps("c", &[0, 1])],
//! );
//! let mut registry = UnitRegistry::new();
//! for name in ["a", "b", "c"] {
//!     registry.register(name, Box::new(IdentityUnit::new(name)));
//! }
//!
//! let executor = DagExecutor::new(ReductionPolicy::Sum, Activation::Identity);
//! let out = executor.evaluate(&registry, &pipeline, array![[1.0, 2.0]].view()).unwrap();
//! assert_eq!(out, array![[2.0, 4.0]]);
//! ```

pub mod activation;
pub mod executor;
pub mod reduction;
pub mod registry;
pub mod unit;

pub use activation::Activation;
pub use executor::DagExecutor;
pub use reduction::ReductionPolicy;
pub use registry::UnitRegistry;
pub use unit::{ComputationUnit, IdentityUnit, LinearUnit};

pub use crate::error::ExecutionError;

/// Result type alias for DAG execution.
pub type Result<T> = std::result::Result<T, ExecutionError>;
