//! Records, instances and grouping.
//!
//! Raw JSON records are parsed with a [`RecordSchema`], vectorised by a fitted
//! [`Preprocessor`] into [`Instance`]s, and partitioned by a dotted key path
//! with [`group_records`]. [`split_by_group`] produces a train/test split in
//! which no group appears on both sides.
//!
//! # Example
//!
//! ```
//! use pipeline_dna::data::{group_records, Preprocessor, RecordSchema, PIPELINE_ID_KEY};
//! use serde_json::json;
//!
//! let records = RecordSchema::default()
//!     .parse_all(&[
//!         json!({"dataset_id": "a", "metafeatures": {"rows": 1.0}, "test_f1_macro": 0.5,
//!                "pipeline": {"id": "p1", "steps": [{"name": "svc", "inputs": ["inputs.0"]}]}}),
//!         json!({"dataset_id": "b", "metafeatures": {"rows": 3.0}, "test_f1_macro": 0.7,
//!                "pipeline": {"id": "p1", "steps": [{"name": "svc", "inputs": ["inputs.0"]}]}}),
//!     ])
//!     .unwrap();
//!
//! let mut preprocessor = Preprocessor::new();
//! let instances = preprocessor.fit_transform(&records).unwrap();
//! let groups = group_records(&instances, PIPELINE_ID_KEY).unwrap();
//! assert_eq!(groups.get("p1"), Some(&[0, 1][..]));
//! ```

pub mod grouping;
pub mod instance;
pub mod preprocess;
pub mod record;
pub mod split;

pub use grouping::{group_records, FieldLookup, GroupIndex, LookupFailure};
pub use instance::{Instance, DATASET_KEY, PIPELINE_ID_KEY, PIPELINE_STRUCTURE_KEY};
pub use preprocess::Preprocessor;
pub use record::{RawRecord, RecordSchema};
pub use split::split_by_group;

use crate::error::DataError;

/// Result type alias for data operations.
pub type Result<T> = std::result::Result<T, DataError>;
