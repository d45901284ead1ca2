//! Tensor registry
//!
//! Tracks every data edge in a graph by tensor name: its optional shape and element type, the
//! single producing `(node, output slot)` and all consuming `(node, input slot)` pairs. Node
//! references are by name, so reordering the node list never invalidates the registry.

use super::node::Node;
use crate::error::StructuralError;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Tensor element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float32,
    Float16,
    BFloat16,
    Int8,
    UInt8,
    Int32,
    Int64,
    Bool,
}

/// A `(node, slot)` reference into the graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotRef {
    pub node: String,
    pub slot: usize,
}

impl SlotRef {
    pub fn new(node: impl Into<String>, slot: usize) -> Self {
        Self { node: node.into(), slot }
    }
}

/// Shape and element type metadata carried independently of wiring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<DType>,
}

impl TensorInfo {
    pub fn is_empty(&self) -> bool {
        self.shape.is_none() && self.dtype.is_none()
    }
}

/// A data edge between nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub name: String,
    pub info: TensorInfo,
    pub producer: Option<SlotRef>,
    pub consumers: Vec<SlotRef>,
}

impl Tensor {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            info: TensorInfo::default(),
            producer: None,
            consumers: Vec::new(),
        }
    }

    /// True when nothing references the tensor
    pub fn is_detached(&self) -> bool {
        self.producer.is_none() && self.consumers.is_empty()
    }
}

/// Tensor name → tensor mapping for one graph
#[derive(Debug, Clone, Default)]
pub struct TensorRegistry {
    tensors: FxHashMap<String, Tensor>,
}

impl TensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Tensors sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &Tensor> {
        let mut tensors: Vec<_> = self.tensors.values().collect();
        tensors.sort_by(|a, b| a.name.cmp(&b.name));
        tensors.into_iter()
    }

    /// Number of producer → consumer data edges
    pub fn edge_count(&self) -> usize {
        self.tensors
            .values()
            .filter(|t| t.producer.is_some())
            .map(|t| t.consumers.len())
            .sum()
    }

    /// Register a tensor name without wiring, creating it if needed
    pub fn declare(&mut self, name: &str) -> &mut Tensor {
        self.tensors
            .entry(name.to_string())
            .or_insert_with(|| Tensor::new(name))
    }

    pub fn set_info(&mut self, name: &str, info: TensorInfo) {
        self.declare(name).info = info;
    }

    /// Wire a node's inputs and outputs into the registry.
    ///
    /// Fails without touching the registry if any output already has a producer.
    pub fn link_node(&mut self, node: &Node) -> Result<(), StructuralError> {
        for (slot, output) in node.outputs.iter().enumerate() {
            if let Some(producer) = self.tensors.get(output).and_then(|t| t.producer.as_ref()) {
                return Err(StructuralError::DuplicateProducer {
                    tensor: output.clone(),
                    first: producer.node.clone(),
                    second: node.name.clone(),
                });
            }
            if node.outputs[..slot].contains(output) {
                return Err(StructuralError::DuplicateProducer {
                    tensor: output.clone(),
                    first: node.name.clone(),
                    second: node.name.clone(),
                });
            }
        }

        for (slot, output) in node.outputs.iter().enumerate() {
            self.declare(output).producer = Some(SlotRef::new(node.name.as_str(), slot));
        }
        for (slot, input) in node.inputs.iter().enumerate() {
            self.declare(input)
                .consumers
                .push(SlotRef::new(node.name.as_str(), slot));
        }
        Ok(())
    }

    /// Remove every reference the named node holds
    pub fn unlink_node(&mut self, node: &Node) {
        for output in &node.outputs {
            if let Some(tensor) = self.tensors.get_mut(output) {
                if tensor.producer.as_ref().is_some_and(|p| p.node == node.name) {
                    tensor.producer = None;
                }
            }
        }
        for input in &node.inputs {
            if let Some(tensor) = self.tensors.get_mut(input) {
                tensor.consumers.retain(|c| c.node != node.name);
            }
        }
    }

    /// Recompute all wiring from the node list, keeping tensor metadata
    pub fn relink(&mut self, nodes: &[Node]) -> Result<(), StructuralError> {
        for tensor in self.tensors.values_mut() {
            tensor.producer = None;
            tensor.consumers.clear();
        }
        for node in nodes {
            self.link_node(node)?;
        }
        Ok(())
    }

    /// Drop tensors nothing references, except those `keep` selects
    pub fn prune(&mut self, keep: impl Fn(&str) -> bool) {
        self.tensors.retain(|name, t| !t.is_detached() || keep(name));
    }
}
