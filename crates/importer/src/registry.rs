//! Importer registry
//!
//! Maps operator types to their attribute importers. Built once by `register_all()`; a second
//! importer for the same operator type is rejected.

use crate::error::{ImportError, Result};
use crate::framework::{FrameworkGraph, FrameworkNode};
use crate::ops;
use graphfuse_compiler::graph::{Attributes, Graph, Node};
use rustc_hash::FxHashMap;
use std::sync::OnceLock;
use tracing::debug;

/// Converts one operator's framework attributes into graph attributes
pub trait AttributeImporter: Send + Sync {
    /// Operator type this importer handles
    fn op_type(&self) -> &'static str;

    /// Normalize the descriptor's attributes
    fn import(&self, node: &FrameworkNode) -> Result<Attributes>;
}

#[derive(Default)]
pub struct ImporterRegistry {
    importers: FxHashMap<&'static str, Box<dyn AttributeImporter>>,
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in importer
    pub fn register_all() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(ops::Squeeze)?;
        registry.register(ops::Unsqueeze)?;
        registry.register(ops::Softmax)?;
        registry.register(ops::Transpose)?;
        registry.register(ops::Concat)?;
        registry.register(ops::MatMul)?;
        for op_type in ops::ATTRIBUTE_FREE {
            registry.register(ops::AttributeFree(op_type))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, importer: impl AttributeImporter + 'static) -> Result<()> {
        let op_type = importer.op_type();
        if self.importers.contains_key(op_type) {
            return Err(ImportError::DuplicateImporter(op_type.to_string()));
        }
        self.importers.insert(op_type, Box::new(importer));
        Ok(())
    }

    pub fn get(&self, op_type: &str) -> Option<&dyn AttributeImporter> {
        self.importers.get(op_type).map(|b| b.as_ref())
    }

    pub fn contains(&self, op_type: &str) -> bool {
        self.importers.contains_key(op_type)
    }

    /// Supported operator types, sorted
    pub fn op_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.importers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.importers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.importers.is_empty()
    }

    /// Import a single node
    pub fn import_node(&self, node: &FrameworkNode) -> Result<Node> {
        let importer = self
            .get(&node.op_type)
            .ok_or_else(|| ImportError::UnsupportedOperator {
                framework: node.framework,
                op_type: node.op_type.clone(),
            })?;

        let mut imported = Node::new(node.name.as_str(), node.op_type.as_str())
            .with_inputs(node.inputs.iter().map(String::as_str))
            .with_outputs(node.outputs.iter().map(String::as_str));
        imported.attributes = importer.import(node)?;
        Ok(imported)
    }

    /// Import a whole graph, reordered topologically and validated
    pub fn import_graph(&self, source: &FrameworkGraph) -> Result<Graph> {
        let mut graph = Graph::new(source.name.as_str());
        for input in &source.inputs {
            graph.add_input(input.as_str());
        }
        for node in &source.nodes {
            graph.add_node(self.import_node(node)?)?;
        }
        for output in &source.outputs {
            graph.add_output(output.as_str());
        }

        graph.ensure_topological()?;
        graph.validate()?;
        debug!("Imported graph '{}' with {} node(s)", graph.name(), graph.len());
        Ok(graph)
    }
}

static GLOBAL: OnceLock<Result<ImporterRegistry>> = OnceLock::new();

/// Process-wide registry of the built-in importers
pub fn global() -> Result<&'static ImporterRegistry> {
    GLOBAL
        .get_or_init(ImporterRegistry::register_all)
        .as_ref()
        .map_err(Clone::clone)
}

/// Import one node with the built-in importers
pub fn import_node(node: &FrameworkNode) -> Result<Node> {
    global()?.import_node(node)
}

/// Import a graph with the built-in importers
pub fn import_graph(source: &FrameworkGraph) -> Result<Graph> {
    global()?.import_graph(source)
}
