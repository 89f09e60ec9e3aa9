//! Training and evaluation instances.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::pipeline::{Pipeline, StructureKey};

use super::grouping::{json_group_value, render_group_value, FieldLookup, LookupFailure};

/// Key path of the dataset identifier.
pub const DATASET_KEY: &str = "dataset_id";

/// Key path of the pipeline identifier.
pub const PIPELINE_ID_KEY: &str = "pipeline.id";

/// Key path of the pipeline's structure key.
pub const PIPELINE_STRUCTURE_KEY: &str = "pipeline_structure";

/// One example: a dataset's metafeature vector, a pipeline, and the score the
/// pipeline achieved on that dataset.
///
/// The structure key is computed once at construction. Any extra top-level
/// fields of the source record are kept as attributes and stay addressable
/// through [`FieldLookup`].
#[derive(Debug, Clone)]
pub struct Instance {
    dataset_id: String,
    features: Vec<f64>,
    target: f64,
    pipeline: Arc<Pipeline>,
    structure_key: StructureKey,
    attributes: Map<String, Value>,
}

impl Instance {
    pub fn new(
        dataset_id: impl Into<String>,
        features: Vec<f64>,
        target: f64,
        pipeline: impl Into<Arc<Pipeline>>,
    ) -> Self {
        let pipeline = pipeline.into();
        let structure_key = pipeline.structure_key();
        Self {
            dataset_id: dataset_id.into(),
            features,
            target,
            pipeline,
            structure_key,
            attributes: Map::new(),
        }
    }

    /// Attaches extra record fields.
    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub fn feature_width(&self) -> usize {
        self.features.len()
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn structure_key(&self) -> &StructureKey {
        &self.structure_key
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }
}

impl FieldLookup for Instance {
    fn group_value(&self, key_path: &str) -> Result<String, LookupFailure> {
        match key_path {
            DATASET_KEY => Ok(self.dataset_id.clone()),
            PIPELINE_ID_KEY | "pipeline_id" => Ok(self.pipeline.id().to_string()),
            PIPELINE_STRUCTURE_KEY => Ok(self.structure_key.to_string()),
            _ => {
                let (head, rest) = match key_path.split_once('.') {
                    Some((head, rest)) => (head, Some(rest)),
                    None => (key_path, None),
                };
                let value = self.attributes.get(head).ok_or(LookupFailure::Missing)?;
                match rest {
                    Some(rest) => json_group_value(value, rest),
                    None => render_group_value(value),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::group_records;
    use crate::pipeline::Step;
    use serde_json::json;

    fn instance(dataset: &str, pipeline_id: &str) -> Instance {
        let pipeline = Pipeline::new(
            pipeline_id,
            vec![Step::external("imputer"), Step::from_steps("svc", &[0])],
        );
        Instance::new(dataset, vec![0.5, -1.0], 0.8, pipeline)
    }

    #[test]
    fn test_instance_accessors() {
        let inst = instance("d1", "p1");
        assert_eq!(inst.dataset_id(), "d1");
        assert_eq!(inst.feature_width(), 2);
        assert!((inst.target() - 0.8).abs() < f64::EPSILON);
        assert_eq!(inst.pipeline().id(), "p1");
        assert_eq!(inst.structure_key().as_str(), "[inputs.0][0]");
    }

    #[test]
    fn test_known_key_paths() {
        let inst = instance("d1", "p1");
        assert_eq!(inst.group_value(DATASET_KEY).unwrap(), "d1");
        assert_eq!(inst.group_value(PIPELINE_ID_KEY).unwrap(), "p1");
        assert_eq!(
            inst.group_value(PIPELINE_STRUCTURE_KEY).unwrap(),
            "[inputs.0][0]"
        );
    }

    #[test]
    fn test_attribute_key_paths() {
        let mut attributes = Map::new();
        attributes.insert("task".to_string(), json!({"type": "classification"}));
        attributes.insert("fold".to_string(), json!(3));
        let inst = instance("d1", "p1").with_attributes(attributes);

        assert_eq!(inst.group_value("task.type").unwrap(), "classification");
        assert_eq!(inst.group_value("fold").unwrap(), "number:3");
        assert_eq!(inst.group_value("task"), Err(LookupFailure::Unhashable));
        assert_eq!(inst.group_value("nope"), Err(LookupFailure::Missing));
    }

    #[test]
    fn test_group_instances_by_pipeline() {
        let instances = vec![instance("d1", "p1"), instance("d2", "p2"), instance("d3", "p1")];
        let index = group_records(&instances, PIPELINE_ID_KEY).unwrap();
        assert_eq!(index.get("p1"), Some(&[0, 2][..]));
    }
}
