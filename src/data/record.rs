//! Parsing of JSON pipeline-run records.
//!
//! A record carries a dataset identifier, a map of named metafeatures, a
//! pipeline description and the score the pipeline reached on the dataset.
//! Metafeatures stay a name-keyed map here; [`super::Preprocessor`] turns them
//! into fixed-order vectors.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::DataError;
use crate::pipeline::Pipeline;

use super::Result;

/// Field names used to read a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    pub dataset_key: String,
    pub features_key: String,
    pub target_key: String,
    pub pipeline_key: String,
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self {
            dataset_key: "dataset_id".to_string(),
            features_key: "metafeatures".to_string(),
            target_key: "test_f1_macro".to_string(),
            pipeline_key: "pipeline".to_string(),
        }
    }
}

/// A parsed record whose metafeatures have not been vectorised yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub dataset_id: String,
    /// Metafeature values by name; `None` marks an explicit null.
    pub metafeatures: BTreeMap<String, Option<f64>>,
    pub target: f64,
    pub pipeline: Pipeline,
    /// Every other top-level field of the record.
    pub attributes: Map<String, Value>,
}

impl RecordSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the target field name.
    pub fn with_target_key(mut self, key: impl Into<String>) -> Self {
        self.target_key = key.into();
        self
    }

    /// Builder method to set the metafeature field name.
    pub fn with_features_key(mut self, key: impl Into<String>) -> Self {
        self.features_key = key.into();
        self
    }

    /// Builder method to set the dataset identifier field name.
    pub fn with_dataset_key(mut self, key: impl Into<String>) -> Self {
        self.dataset_key = key.into();
        self
    }

    /// Parses a JSON array of records.
    pub fn parse_json_str(&self, text: &str) -> Result<Vec<RawRecord>> {
        let values: Vec<Value> = serde_json::from_str(text)?;
        self.parse_all(&values)
    }

    /// Parses every record, failing on the first malformed one.
    pub fn parse_all(&self, values: &[Value]) -> Result<Vec<RawRecord>> {
        values
            .iter()
            .enumerate()
            .map(|(index, value)| self.parse(index, value))
            .collect()
    }

    /// Parses the record at position `index`.
    pub fn parse(&self, index: usize, value: &Value) -> Result<RawRecord> {
        let object = value.as_object().ok_or_else(|| DataError::InvalidField {
            index,
            field: "<record>".to_string(),
            message: "expected a JSON object".to_string(),
        })?;

        let field = |key: &str| {
            object.get(key).ok_or_else(|| DataError::MissingField {
                index,
                field: key.to_string(),
            })
        };
        let invalid = |key: &str, message: String| DataError::InvalidField {
            index,
            field: key.to_string(),
            message,
        };

        let dataset_id = match field(&self.dataset_key)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => {
                return Err(invalid(
                    &self.dataset_key,
                    "expected a string or number".to_string(),
                ))
            }
        };

        let target = field(&self.target_key)?
            .as_f64()
            .ok_or_else(|| invalid(&self.target_key, "expected a number".to_string()))?;

        let pipeline: Pipeline = serde_json::from_value(field(&self.pipeline_key)?.clone())
            .map_err(|e| invalid(&self.pipeline_key, e.to_string()))?;

        let raw_features = field(&self.features_key)?
            .as_object()
            .ok_or_else(|| invalid(&self.features_key, "expected an object".to_string()))?;
        let mut metafeatures = BTreeMap::new();
        for (name, value) in raw_features {
            let parsed = match value {
                Value::Null => None,
                other => Some(other.as_f64().ok_or_else(|| {
                    invalid(&self.features_key, format!("metafeature '{}' is not a number", name))
                })?),
            };
            metafeatures.insert(name.clone(), parsed);
        }

        let known = [
            &self.dataset_key,
            &self.features_key,
            &self.target_key,
            &self.pipeline_key,
        ];
        let attributes = object
            .iter()
            .filter(|(key, _)| !known.contains(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(RawRecord {
            dataset_id,
            metafeatures,
            target,
            pipeline,
            attributes,
        })
    }
}
