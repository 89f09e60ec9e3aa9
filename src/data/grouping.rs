//! Stable grouping of records by a dotted key path.
//!
//! Groups keep the order in which their first member appeared, and each
//! group's index list keeps input order.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::GroupingError;

/// Why a key path could not be resolved on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFailure {
    /// Some segment of the path does not exist.
    Missing,
    /// The path resolves to an object or array, which cannot label a group.
    Unhashable,
}

/// Records whose fields can be addressed by a dot-separated key path.
pub trait FieldLookup {
    /// Resolves `key_path` to the string form of a group label.
    fn group_value(&self, key_path: &str) -> Result<String, LookupFailure>;
}

impl FieldLookup for Value {
    fn group_value(&self, key_path: &str) -> Result<String, LookupFailure> {
        json_group_value(self, key_path)
    }
}

/// Walks `key_path` through nested JSON objects and renders the leaf.
pub(crate) fn json_group_value(value: &Value, key_path: &str) -> Result<String, LookupFailure> {
    let mut current = value;
    for part in key_path.split('.') {
        current = current
            .as_object()
            .and_then(|object| object.get(part))
            .ok_or(LookupFailure::Missing)?;
    }
    render_group_value(current)
}

/// Renders a JSON leaf as a group label.
///
/// Strings are used as they are. Other scalars carry their JSON type, so
/// `1` becomes `number:1` and never shares a group with the string `"1"`.
pub(crate) fn render_group_value(value: &Value) -> Result<String, LookupFailure> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(format!("number:{}", n)),
        Value::Bool(b) => Ok(format!("bool:{}", b)),
        Value::Null => Ok("null:".to_string()),
        Value::Array(_) | Value::Object(_) => Err(LookupFailure::Unhashable),
    }
}

/// Mapping from group label to the ordered indices of its members.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    groups: Vec<(String, Vec<usize>)>,
    positions: HashMap<String, usize>,
}

impl GroupIndex {
    /// Groups `records` by the value found at `key_path`.
    ///
    /// # Errors
    ///
    /// Returns `GroupingError::MissingKey` for the first record lacking the
    /// path, and `GroupingError::UnhashableValue` when the path resolves to
    /// an object or array.
    pub fn build<R: FieldLookup>(records: &[R], key_path: &str) -> Result<Self, GroupingError> {
        let mut index = Self::default();
        for (i, record) in records.iter().enumerate() {
            let label = record.group_value(key_path).map_err(|failure| match failure {
                LookupFailure::Missing => GroupingError::MissingKey {
                    index: i,
                    key_path: key_path.to_string(),
                },
                LookupFailure::Unhashable => GroupingError::UnhashableValue {
                    index: i,
                    key_path: key_path.to_string(),
                },
            })?;
            index.push(label, i);
        }
        Ok(index)
    }

    fn push(&mut self, label: String, record_index: usize) {
        match self.positions.get(&label) {
            Some(&position) => self.groups[position].1.push(record_index),
            None => {
                self.positions.insert(label.clone(), self.groups.len());
                self.groups.push((label, vec![record_index]));
            }
        }
    }

    /// Number of distinct groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Member indices of `label`, in input order.
    pub fn get(&self, label: &str) -> Option<&[usize]> {
        self.positions
            .get(label)
            .map(|&position| self.groups[position].1.as_slice())
    }

    /// Group labels in order of first occurrence.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.iter().map(|(label, _)| label.as_str())
    }

    /// `(label, member indices)` pairs in order of first occurrence.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> + '_ {
        self.groups
            .iter()
            .map(|(label, indices)| (label.as_str(), indices.as_slice()))
    }

    pub fn into_groups(self) -> Vec<(String, Vec<usize>)> {
        self.groups
    }
}

/// Groups `records` by `key_path`. See [`GroupIndex::build`].
pub fn group_records<R: FieldLookup>(
    records: &[R],
    key_path: &str,
) -> Result<GroupIndex, GroupingError> {
    GroupIndex::build(records, key_path)
}
