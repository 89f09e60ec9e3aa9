//! Pipeline graphs and their structural keys.
//!
//! A pipeline is a DAG of primitive operations. Each [`Step`] names a
//! primitive and lists its inputs: either the external feature vector
//! ([`InputRef::External`]) or an earlier step ([`InputRef::Step`]). Steps
//! are stored in topological order.
//!
//! # Structure keys
//!
//! Batching needs to know which pipelines share one topology. The
//! [`encode_dag`] function turns the ordered input lists of a pipeline into a
//! [`StructureKey`], ignoring primitive names:
//!
//! ```
//! use pipeline_dna::pipeline::{Pipeline, Step};
//!
//! let pipeline = Pipeline::new(
//!     "p-1",
//!     vec![
//!         Step::external("imputer"),
//!         Step::from_steps("scaler", &[0]),
//!         Step::from_steps("svc", &[0, 1]),
//!     ],
//! );
//! assert_eq!(pipeline.structure_key().as_str(), "[inputs.0][0][0,1]");
//! ```

pub mod step;
pub mod structure;

pub use step::{InputRef, Pipeline, Step, EXTERNAL_INPUT};
pub use structure::{encode_dag, DagStructure, StructureKey};

use crate::error::StructureError;

/// Result type alias for pipeline structure operations.
pub type Result<T> = std::result::Result<T, StructureError>;
