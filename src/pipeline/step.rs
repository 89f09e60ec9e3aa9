//! Pipeline steps and their input references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StructureError;

use super::structure::{encode_dag, DagStructure, StructureKey};

/// String form of the external feature vector reference.
pub const EXTERNAL_INPUT: &str = "inputs.0";

/// A reference from a step to one of its inputs.
///
/// Either the externally supplied feature vector or the output of another
/// step, addressed by its index in the enclosing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInputRef", into = "RawInputRef")]
pub enum InputRef {
    /// The external feature vector.
    External,
    /// The output of the step at this index.
    Step(usize),
}

impl InputRef {
    /// Returns the referenced step index, if this is a step reference.
    pub fn step_index(&self) -> Option<usize> {
        match self {
            InputRef::External => None,
            InputRef::Step(index) => Some(*index),
        }
    }

    /// Returns true for the external feature vector sentinel.
    pub fn is_external(&self) -> bool {
        matches!(self, InputRef::External)
    }
}

impl fmt::Display for InputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputRef::External => f.write_str(EXTERNAL_INPUT),
            InputRef::Step(index) => write!(f, "{}", index),
        }
    }
}

impl FromStr for InputRef {
    type Err = StructureError;

    /// Parses `"inputs.0"`, `"steps.N.produce"` or a bare integer. Step
    /// references must end in `.produce`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == EXTERNAL_INPUT {
            return Ok(InputRef::External);
        }
        if let Ok(index) = s.parse::<usize>() {
            return Ok(InputRef::Step(index));
        }
        s.strip_prefix("steps.")
            .and_then(|rest| rest.strip_suffix(".produce"))
            .and_then(|index| index.parse::<usize>().ok())
            .map(InputRef::Step)
            .ok_or_else(|| StructureError::InvalidReference(s.to_string()))
    }
}

/// Wire form of an input reference: an integer or a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawInputRef {
    Index(usize),
    Name(String),
}

impl TryFrom<RawInputRef> for InputRef {
    type Error = StructureError;

    fn try_from(raw: RawInputRef) -> Result<Self, Self::Error> {
        match raw {
            RawInputRef::Index(index) => Ok(InputRef::Step(index)),
            RawInputRef::Name(name) => name.parse(),
        }
    }
}

impl From<InputRef> for RawInputRef {
    fn from(input: InputRef) -> Self {
        match input {
            InputRef::External => RawInputRef::Name(EXTERNAL_INPUT.to_string()),
            InputRef::Step(index) => RawInputRef::Index(index),
        }
    }
}

/// One primitive operation in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    name: String,
    inputs: Vec<InputRef>,
}

impl Step {
    /// Creates a step applying primitive `name` to `inputs`.
    pub fn new(name: impl Into<String>, inputs: Vec<InputRef>) -> Self {
        Self {
            name: name.into(),
            inputs,
        }
    }

    /// Creates a step that reads the external feature vector.
    pub fn external(name: impl Into<String>) -> Self {
        Self::new(name, vec![InputRef::External])
    }

    /// Creates a step fed by the given earlier steps.
    pub fn from_steps(name: impl Into<String>, steps: &[usize]) -> Self {
        Self::new(name, steps.iter().copied().map(InputRef::Step).collect())
    }

    /// Primitive name; steps sharing a name share one computation unit.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[InputRef] {
        &self.inputs
    }

    /// Returns true if any input is the external feature vector.
    pub fn reads_external(&self) -> bool {
        self.inputs.iter().any(InputRef::is_external)
    }

    /// Indices of the steps this step depends on.
    pub fn dependencies(&self) -> impl Iterator<Item = usize> + '_ {
        self.inputs.iter().filter_map(InputRef::step_index)
    }
}

/// A candidate pipeline: an identifier and its steps in topological order.
///
/// Pipelines are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    id: String,
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(id: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: id.into(),
            steps,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the final step, whose output is the pipeline's output.
    pub fn terminal(&self) -> Option<usize> {
        self.steps.len().checked_sub(1)
    }

    /// The ordered input lists of every step, ignoring primitive names.
    pub fn structure(&self) -> DagStructure {
        self.steps.iter().map(|step| step.inputs.clone()).collect()
    }

    /// Canonical key of this pipeline's edge topology.
    pub fn structure_key(&self) -> StructureKey {
        StructureKey::from(encode_dag(self.steps.iter().map(Step::inputs)))
    }

    /// Primitive names in step order, duplicates included.
    pub fn primitive_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.steps.iter().map(Step::name)
    }

    /// Checks that the pipeline is non-empty, every step has inputs, and
    /// every step only references earlier steps.
    pub fn validate(&self) -> Result<(), StructureError> {
        if self.steps.is_empty() {
            return Err(StructureError::EmptyPipeline(self.id.clone()));
        }

        for (index, step) in self.steps.iter().enumerate() {
            if step.inputs.is_empty() {
                return Err(StructureError::EmptyInputs {
                    pipeline: self.id.clone(),
                    step: index,
                });
            }
            if let Some(reference) = step.dependencies().find(|&r| r >= index) {
                return Err(StructureError::ForwardReference {
                    pipeline: self.id.clone(),
                    step: index,
                    reference,
                });
            }
        }

        Ok(())
    }
}
