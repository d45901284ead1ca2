// Operator graph representation
//
// Nodes live in an insertion-ordered list that is kept topologically compatible; tensors are
// tracked by name in a registry. petgraph is used for dependency analysis (cycle detection,
// topological ordering), built on demand from the tensor wiring.

use super::attr::{AttrValue, Attributes};
use super::document::GraphDocument;
use super::node::Node;
use super::tensor::{SlotRef, Tensor, TensorInfo, TensorRegistry};
use crate::error::StructuralError;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Operator graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct Graph {
    name: String,

    /// Nodes in insertion order
    nodes: Vec<Node>,

    /// Node name to position in `nodes`
    name_to_index: FxHashMap<String, usize>,

    tensors: TensorRegistry,

    /// Declared graph input tensors
    inputs: Vec<String>,

    /// Declared graph output tensors
    outputs: Vec<String>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get node by name
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.node_index(name).map(|i| &self.nodes[i])
    }

    pub fn node_at(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Position of a node in insertion order
    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Indices of all nodes with the given operation type, in graph order
    pub fn nodes_of_type(&self, op_type: &str) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.op_type == op_type)
            .map(|(i, _)| i)
            .collect()
    }

    /// Mutable access to a node's attributes.
    ///
    /// Wiring is deliberately not exposed mutably; use the graph's editing methods for that.
    pub fn attributes_mut(&mut self, name: &str) -> Option<&mut Attributes> {
        let index = self.node_index(name)?;
        Some(&mut self.nodes[index].attributes)
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Declare a graph input tensor
    pub fn add_input(&mut self, tensor: impl Into<String>) {
        let tensor = tensor.into();
        self.tensors.declare(&tensor);
        if !self.inputs.contains(&tensor) {
            self.inputs.push(tensor);
        }
    }

    /// Declare a graph output tensor
    pub fn add_output(&mut self, tensor: impl Into<String>) {
        let tensor = tensor.into();
        self.tensors.declare(&tensor);
        if !self.outputs.contains(&tensor) {
            self.outputs.push(tensor);
        }
    }

    pub fn tensors(&self) -> &TensorRegistry {
        &self.tensors
    }

    pub fn tensor(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn set_tensor_info(&mut self, name: &str, info: TensorInfo) {
        self.tensors.set_info(name, info);
    }

    /// Producing `(node, output slot)` of a tensor
    pub fn producer(&self, tensor: &str) -> Option<&SlotRef> {
        self.tensors.get(tensor).and_then(|t| t.producer.as_ref())
    }

    /// Consuming `(node, input slot)` pairs of a tensor
    pub fn consumers(&self, tensor: &str) -> &[SlotRef] {
        self.tensors
            .get(tensor)
            .map(|t| t.consumers.as_slice())
            .unwrap_or(&[])
    }

    /// Append a node at the end of the node list
    pub fn add_node(&mut self, node: Node) -> Result<usize, StructuralError> {
        if self.name_to_index.contains_key(&node.name) {
            return Err(StructuralError::DuplicateNode(node.name));
        }
        self.tensors.link_node(&node)?;

        let index = self.nodes.len();
        self.name_to_index.insert(node.name.clone(), index);
        self.nodes.push(node);
        Ok(index)
    }

    /// Insert a node at `index`, shifting later nodes back
    pub fn insert_node(&mut self, index: usize, node: Node) -> Result<(), StructuralError> {
        if self.name_to_index.contains_key(&node.name) {
            return Err(StructuralError::DuplicateNode(node.name));
        }
        self.tensors.link_node(&node)?;

        let index = index.min(self.nodes.len());
        self.nodes.insert(index, node);
        self.reindex();
        Ok(())
    }

    /// Remove a node by name and return it.
    ///
    /// Consumers of its outputs keep referencing those tensors, which become producer-less.
    pub fn remove_node(&mut self, name: &str) -> Result<Node, StructuralError> {
        let index = self
            .node_index(name)
            .ok_or_else(|| StructuralError::UnknownNode(name.to_string()))?;

        let node = self.nodes.remove(index);
        self.tensors.unlink_node(&node);
        self.reindex();
        self.prune_tensors();
        Ok(node)
    }

    /// Start building a new node
    ///
    /// ```
    /// use graphfuse_compiler::graph::Graph;
    ///
    /// let mut graph = Graph::new("g");
    /// graph.add_op("Sigmoid").name("B").input("a_out").output("b_out").finish()?;
    /// assert_eq!(graph.consumers("a_out").len(), 1);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn add_op(&mut self, op_type: impl Into<String>) -> NewNode<'_> {
        NewNode::new(self, op_type.into())
    }

    /// Derive a node name not used in the graph nor in `reserved`
    pub fn unique_name(&self, base: &str, reserved: &FxHashSet<String>) -> String {
        let taken = |candidate: &str| self.contains_node(candidate) || reserved.contains(candidate);
        if !taken(base) {
            return base.to_string();
        }
        (1..)
            .map(|k| format!("{}_{}", base, k))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Direct consumers of any output of the node at `index`, as `(consumer index, input slot)`
    /// sorted by graph order
    pub fn successors(&self, index: usize) -> Vec<(usize, usize)> {
        let Some(node) = self.nodes.get(index) else {
            return Vec::new();
        };

        let mut result: Vec<(usize, usize)> = node
            .outputs
            .iter()
            .flat_map(|output| self.consumers(output))
            .filter_map(|c| self.node_index(&c.node).map(|i| (i, c.slot)))
            .collect();
        result.sort_unstable();
        result.dedup();
        result
    }

    /// True if the node at `consumer` reads an output of the node at `producer`, at input
    /// `slot` when given
    pub fn consumes(&self, consumer: usize, producer: usize, slot: Option<usize>) -> bool {
        self.successors(producer)
            .iter()
            .any(|&(c, s)| c == consumer && slot.map_or(true, |slot| slot == s))
    }

    /// Build a petgraph dependency graph, one vertex per node in insertion order
    pub fn dependency_graph(&self) -> DiGraph<usize, String> {
        let mut dep = DiGraph::with_capacity(self.nodes.len(), self.tensors.edge_count());
        let ids: Vec<NodeIndex> = (0..self.nodes.len()).map(|i| dep.add_node(i)).collect();

        for tensor in self.tensors.iter() {
            let Some(from) = tensor.producer.as_ref().and_then(|p| self.node_index(&p.node)) else {
                continue;
            };
            for consumer in &tensor.consumers {
                if let Some(to) = self.node_index(&consumer.node) {
                    dep.add_edge(ids[from], ids[to], tensor.name.clone());
                }
            }
        }
        dep
    }

    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.dependency_graph())
    }

    /// Stable topological order: among ready nodes, the earliest inserted comes first
    pub fn topological_order(&self) -> Result<Vec<usize>, StructuralError> {
        let dep = self.dependency_graph();
        let mut in_degree: Vec<usize> = dep
            .node_indices()
            .map(|id| dep.neighbors_directed(id, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(index)) = ready.pop() {
            order.push(index);
            for next in dep.neighbors_directed(NodeIndex::new(index), Direction::Outgoing) {
                let next = next.index();
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() < self.nodes.len() {
            let stuck = in_degree
                .iter()
                .position(|&d| d > 0)
                .map(|i| self.nodes[i].name.clone())
                .unwrap_or_default();
            return Err(StructuralError::Cycle(stuck));
        }
        Ok(order)
    }

    /// Reorder the node list topologically if it is not already
    pub fn ensure_topological(&mut self) -> Result<(), StructuralError> {
        let order = self.topological_order()?;
        if order.iter().enumerate().all(|(pos, &i)| pos == i) {
            return Ok(());
        }

        let mut slots: Vec<Option<Node>> = std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        self.nodes = order.into_iter().filter_map(|i| slots[i].take()).collect();
        self.reindex();
        Ok(())
    }

    /// Check every graph invariant
    pub fn validate(&self) -> Result<(), StructuralError> {
        if self.name_to_index.len() != self.nodes.len() {
            let mut seen = FxHashSet::default();
            if let Some(dup) = self.nodes.iter().find(|n| !seen.insert(n.name.as_str())) {
                return Err(StructuralError::DuplicateNode(dup.name.clone()));
            }
        }

        for node in &self.nodes {
            for tensor in node.inputs.iter().chain(&node.outputs) {
                if !self.tensors.contains(tensor) {
                    return Err(StructuralError::DanglingTensor {
                        node: node.name.clone(),
                        tensor: tensor.clone(),
                    });
                }
            }
        }

        for tensor in self.tensors.iter() {
            let refs = tensor.producer.iter().chain(&tensor.consumers);
            for r in refs {
                if !self.contains_node(&r.node) {
                    return Err(StructuralError::UnknownNode(r.node.clone()));
                }
            }
        }

        for output in &self.outputs {
            if self.producer(output).is_none() && !self.inputs.contains(output) {
                return Err(StructuralError::OrphanedOutput(output.clone()));
            }
        }

        self.topological_order().map(|_| ())
    }

    /// Replace the nodes at `removed` with `new_nodes`, placed where the latest removed node
    /// was, then rewire and restore topological order.
    ///
    /// On error the graph is left inconsistent; callers splice into a copy.
    pub(crate) fn splice(&mut self, removed: &[usize], new_nodes: Vec<Node>) -> Result<(), StructuralError> {
        let removed: FxHashSet<usize> = removed.iter().copied().collect();
        let at = removed.iter().copied().max().unwrap_or(self.nodes.len());

        let freed: Vec<String> = removed
            .iter()
            .filter_map(|&i| self.nodes.get(i))
            .flat_map(|n| n.outputs.iter().cloned())
            .collect();

        let old = std::mem::take(&mut self.nodes);
        let mut new_nodes = Some(new_nodes);
        let mut nodes = Vec::with_capacity(old.len());
        for (i, node) in old.into_iter().enumerate() {
            if i == at {
                nodes.extend(new_nodes.take().into_iter().flatten());
            }
            if !removed.contains(&i) {
                nodes.push(node);
            }
        }
        nodes.extend(new_nodes.take().into_iter().flatten());

        self.nodes = nodes;
        self.reindex();
        if self.name_to_index.len() != self.nodes.len() {
            self.validate()?;
        }
        self.tensors.relink(&self.nodes)?;

        for tensor in &freed {
            if self.producer(tensor).is_some() {
                continue;
            }
            if let Some(consumer) = self.consumers(tensor).first() {
                return Err(StructuralError::OrphanedConsumer {
                    tensor: tensor.clone(),
                    consumer: consumer.node.clone(),
                });
            }
            if self.outputs.contains(tensor) {
                return Err(StructuralError::OrphanedOutput(tensor.clone()));
            }
        }

        self.prune_tensors();
        self.ensure_topological()
    }

    /// Compute graph statistics
    pub fn statistics(&self) -> GraphStatistics {
        let mut op_type_counts: HashMap<String, usize> = HashMap::new();
        for node in &self.nodes {
            *op_type_counts.entry(node.op_type.clone()).or_insert(0) += 1;
        }

        GraphStatistics {
            total_nodes: self.nodes.len(),
            total_edges: self.tensors.edge_count(),
            total_tensors: self.tensors.len(),
            num_inputs: self.inputs.len(),
            num_outputs: self.outputs.len(),
            op_type_counts,
        }
    }

    /// Render the graph in Graphviz DOT format
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        dot.push_str("digraph graphfuse {\n");
        dot.push_str("  rankdir=TB;\n");
        dot.push_str("  node [shape=box, style=rounded];\n");

        for (i, node) in self.nodes.iter().enumerate() {
            let color = match node.op_type.as_str() {
                op if op.starts_with("MatMulWithBias") => "lightgreen",
                "MatMul" | "Gemm" => "lightgreen",
                "Add" | "AddV2" | "Sub" | "Mul" | "Div" => "lightblue",
                "Relu" | "Sigmoid" | "Tanh" | "Gelu" | "GeluTanh" => "lightyellow",
                _ => "white",
            };
            let mut label = format!("{}\\n{}", node.op_type, node.name);
            for (key, value) in node.attributes.iter() {
                label.push_str(&format!("\\n{}={}", key, value));
            }
            dot.push_str(&format!(
                "  node{} [label=\"{}\", fillcolor={}, style=filled];\n",
                i,
                label.replace('"', "\\\""),
                color
            ));
        }

        let dep = self.dependency_graph();
        for edge in dep.raw_edges() {
            dot.push_str(&format!(
                "  node{} -> node{} [label=\"{}\"];\n",
                dep[edge.source()],
                dep[edge.target()],
                edge.weight
            ));
        }

        dot.push_str("}\n");
        dot
    }

    /// Same nodes (names, types, wiring, attributes) in the same order with the same graph
    /// inputs and outputs
    pub fn structurally_eq(&self, other: &Graph) -> bool {
        self.nodes == other.nodes && self.inputs == other.inputs && self.outputs == other.outputs
    }

    fn reindex(&mut self) {
        self.name_to_index.clear();
        for (i, node) in self.nodes.iter().enumerate() {
            self.name_to_index.insert(node.name.clone(), i);
        }
    }

    fn prune_tensors(&mut self) {
        let inputs = &self.inputs;
        let outputs = &self.outputs;
        self.tensors
            .prune(|name| inputs.iter().chain(outputs).any(|t| t == name));
    }
}

/// Builder for adding a node to a graph
pub struct NewNode<'a> {
    graph: &'a mut Graph,
    node: Node,
}

impl<'a> NewNode<'a> {
    fn new(graph: &'a mut Graph, op_type: String) -> Self {
        Self {
            graph,
            node: Node::new(String::new(), op_type),
        }
    }

    /// Set node name. Unnamed nodes get a unique name derived from the op type.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.node.name = name.into();
        self
    }

    /// Append an input tensor
    pub fn input(mut self, tensor: impl Into<String>) -> Self {
        self.node.inputs.push(tensor.into());
        self
    }

    pub fn inputs<I, S>(mut self, tensors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node.inputs.extend(tensors.into_iter().map(Into::into));
        self
    }

    /// Append an output tensor
    pub fn output(mut self, tensor: impl Into<String>) -> Self {
        self.node.outputs.push(tensor.into());
        self
    }

    pub fn outputs<I, S>(mut self, tensors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node.outputs.extend(tensors.into_iter().map(Into::into));
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.node.attributes.set(key, value);
        self
    }

    /// Add the node and return its index
    pub fn finish(mut self) -> Result<usize, StructuralError> {
        if self.node.name.is_empty() {
            self.node.name = self.graph.unique_name(&self.node.op_type, &FxHashSet::default());
        }
        self.graph.add_node(self.node)
    }
}

/// Graph statistics
#[derive(Debug, Clone)]
pub struct GraphStatistics {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub total_tensors: usize,
    pub num_inputs: usize,
    pub num_outputs: usize,
    pub op_type_counts: HashMap<String, usize>,
}

impl std::fmt::Display for GraphStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Graph Statistics:")?;
        writeln!(f, "  Total nodes: {}", self.total_nodes)?;
        writeln!(f, "  Total edges: {}", self.total_edges)?;
        writeln!(f, "  Tensors: {}", self.total_tensors)?;
        writeln!(f, "  Graph inputs: {}", self.num_inputs)?;
        writeln!(f, "  Graph outputs: {}", self.num_outputs)?;
        writeln!(f, "  Operation types:")?;

        let mut sorted_ops: Vec<_> = self.op_type_counts.iter().collect();
        sorted_ops.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (op_type, count) in sorted_ops {
            writeln!(f, "    {}: {}", op_type, count)?;
        }

        Ok(())
    }
}
