//! Structural keys for pipeline graphs.
//!
//! A pipeline's structure is the ordered list of each step's input
//! references, independent of primitive names. Pipelines with equal keys have
//! identical edge topology in identical step order. Isomorphic but relabeled
//! graphs may still get different keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::step::InputRef;

/// Edge topology of a pipeline: one input list per step, in step order.
pub type DagStructure = Vec<Vec<InputRef>>;

/// Separator between the references of one node.
const REFERENCE_SEPARATOR: char = ',';

/// Delimiters around each node's reference list.
const NODE_OPEN: char = '[';
const NODE_CLOSE: char = ']';

/// Encodes a DAG topology as a canonical string.
///
/// Each node becomes `[r1,r2,...]` and nodes are concatenated in order. None
/// of the delimiters can occur in a reference's string form, so the encoding
/// is unambiguous: `[[12],[3]]` and `[[1],[23]]` encode to `[12][3]` and
/// `[1][23]`. The empty DAG encodes to the empty string.
pub fn encode_dag<I, N>(dag: I) -> String
where
    I: IntoIterator<Item = N>,
    N: AsRef<[InputRef]>,
{
    let mut encoded = String::new();
    for node in dag {
        encoded.push(NODE_OPEN);
        for (i, reference) in node.as_ref().iter().enumerate() {
            if i > 0 {
                encoded.push(REFERENCE_SEPARATOR);
            }
            encoded.push_str(&reference.to_string());
        }
        encoded.push(NODE_CLOSE);
    }
    encoded
}

/// Canonical string key of a pipeline's edge topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureKey(String);

impl StructureKey {
    /// Computes the key of a DAG structure.
    pub fn of(structure: &[Vec<InputRef>]) -> Self {
        Self(encode_dag(structure))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StructureKey {
    fn from(encoded: String) -> Self {
        Self(encoded)
    }
}

impl fmt::Display for StructureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(nodes: &[&[usize]]) -> DagStructure {
        nodes
            .iter()
            .map(|node| node.iter().copied().map(InputRef::Step).collect())
            .collect()
    }

    #[test]
    fn test_empty_dag_encodes_to_empty_string() {
        let empty: DagStructure = Vec::new();
        assert_eq!(encode_dag(&empty), "");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let dag = vec![
            vec![InputRef::External],
            vec![InputRef::Step(0)],
            vec![InputRef::Step(0), InputRef::Step(1)],
        ];
        assert_eq!(encode_dag(&dag), "[inputs.0][0][0,1]");
        assert_eq!(encode_dag(&dag), encode_dag(dag.clone()));
    }

    #[test]
    fn test_no_collision_on_multi_digit_references() {
        assert_ne!(encode_dag(steps(&[&[12], &[3]])), encode_dag(steps(&[&[1], &[23]])));
    }

    #[test]
    fn test_no_collision_on_node_boundaries() {
        assert_ne!(encode_dag(steps(&[&[1, 2], &[3]])), encode_dag(steps(&[&[1], &[2, 3]])));
    }

    #[test]
    fn test_no_collision_on_node_count() {
        assert_ne!(encode_dag(steps(&[&[0], &[1]])), encode_dag(steps(&[&[0, 1]])));
    }

    #[test]
    fn test_empty_node_differs_from_empty_dag() {
        let one_empty_node: DagStructure = vec![vec![]];
        assert_eq!(encode_dag(&one_empty_node), "[]");
        assert_ne!(encode_dag(&one_empty_node), encode_dag(Vec::<Vec<InputRef>>::new()));
    }

    #[test]
    fn test_node_order_matters() {
        assert_ne!(encode_dag(steps(&[&[0], &[0, 1]])), encode_dag(steps(&[&[0, 1], &[0]])));
    }

    #[test]
    fn test_structure_key_of_matches_encode() {
        let dag = steps(&[&[0], &[1, 0]]);
        let key = StructureKey::of(&dag);
        assert_eq!(key.as_str(), encode_dag(&dag));
        assert_eq!(key.to_string(), "[0][1,0]");
    }
}
