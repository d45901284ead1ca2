//! JSON document form of a graph
//!
//! ```json
//! {
//!   "name": "mlp",
//!   "inputs": ["x"],
//!   "outputs": ["b_out"],
//!   "tensors": { "x": { "shape": [-1, 64], "dtype": "float32" } },
//!   "nodes": [
//!     { "name": "A", "op_type": "MatMulWithBias", "inputs": ["x", "w", "b"], "outputs": ["a_out"] },
//!     { "name": "B", "op_type": "Sigmoid", "inputs": ["a_out"], "outputs": ["b_out"] }
//!   ]
//! }
//! ```

use super::ir::Graph;
use super::node::Node;
use super::tensor::TensorInfo;
use crate::error::{Result, StructuralError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Serializable graph description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Shape/dtype metadata by tensor name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tensors: BTreeMap<String, TensorInfo>,
    /// Nodes in graph order
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl TryFrom<GraphDocument> for Graph {
    type Error = StructuralError;

    fn try_from(doc: GraphDocument) -> std::result::Result<Self, Self::Error> {
        let mut graph = Graph::new(doc.name);
        for input in doc.inputs {
            graph.add_input(input);
        }
        for node in doc.nodes {
            graph.add_node(node)?;
        }
        for output in doc.outputs {
            graph.add_output(output);
        }
        for (name, info) in doc.tensors {
            graph.set_tensor_info(&name, info);
        }
        // documents may list nodes in any order
        graph.ensure_topological()?;
        graph.validate()?;
        Ok(graph)
    }
}

impl From<&Graph> for GraphDocument {
    fn from(graph: &Graph) -> Self {
        GraphDocument {
            name: graph.name().to_string(),
            inputs: graph.inputs().to_vec(),
            outputs: graph.outputs().to_vec(),
            tensors: graph
                .tensors()
                .iter()
                .filter(|t| !t.info.is_empty())
                .map(|t| (t.name.clone(), t.info.clone()))
                .collect(),
            nodes: graph.nodes().to_vec(),
        }
    }
}

impl From<Graph> for GraphDocument {
    fn from(graph: Graph) -> Self {
        GraphDocument::from(&graph)
    }
}

impl Graph {
    /// Parse a graph from its JSON document form and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: GraphDocument = serde_json::from_str(json)?;
        Ok(Graph::try_from(doc)?)
    }

    /// Serialize to the JSON document form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&GraphDocument::from(self))?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
