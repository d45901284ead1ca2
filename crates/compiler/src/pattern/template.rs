//! Pattern templates
//!
//! An [`InTemplate`] describes the sub-graph to find as one or more chains of
//! `(position, type constraint)` entries; each entry must directly consume an output of the
//! entry before it. A position that appears in more than one chain is the same node, which is
//! how branching shapes (two producers converging on a binary op) are expressed.
//!
//! An [`OutTemplate`] describes the replacement: which node types to create, whose name each
//! new node borrows, and where each new node's input and output tensors come from, as
//! `(old position, old slot)` sources.

use crate::error::{ConfigError, SlotSide};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Acceptable operation type(s) for a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeConstraint {
    Exact(String),
    OneOf(Vec<String>),
}

impl TypeConstraint {
    pub fn matches(&self, op_type: &str) -> bool {
        match self {
            TypeConstraint::Exact(t) => t == op_type,
            TypeConstraint::OneOf(set) => set.iter().any(|t| t == op_type),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            TypeConstraint::Exact(_) => false,
            TypeConstraint::OneOf(set) => set.is_empty(),
        }
    }
}

impl From<&str> for TypeConstraint {
    fn from(op_type: &str) -> Self {
        TypeConstraint::Exact(op_type.to_string())
    }
}

impl<const N: usize> From<[&str; N]> for TypeConstraint {
    fn from(set: [&str; N]) -> Self {
        TypeConstraint::OneOf(set.iter().map(|t| t.to_string()).collect())
    }
}

impl From<Vec<String>> for TypeConstraint {
    fn from(set: Vec<String>) -> Self {
        TypeConstraint::OneOf(set)
    }
}

/// One entry in a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternNode {
    pub position: usize,
    pub constraint: TypeConstraint,
    /// Input slot at which this node must consume the previous entry's output
    pub slot: Option<usize>,
}

impl PatternNode {
    pub fn new(position: usize, constraint: impl Into<TypeConstraint>) -> Self {
        Self {
            position,
            constraint: constraint.into(),
            slot: None,
        }
    }

    pub fn at_slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }
}

/// A connected sequence of pattern entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub nodes: Vec<PatternNode>,
}

impl Chain {
    pub fn new(nodes: impl IntoIterator<Item = PatternNode>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }

    /// Linear chain with positions numbered from `first`
    pub fn linear<C: Into<TypeConstraint>>(first: usize, constraints: impl IntoIterator<Item = C>) -> Self {
        Self::new(
            constraints
                .into_iter()
                .enumerate()
                .map(|(i, c)| PatternNode::new(first + i, c)),
        )
    }
}

/// Sub-graph to search for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InTemplate {
    pub chains: Vec<Chain>,
}

impl InTemplate {
    /// Single linear chain, positions 0..N
    ///
    /// ```
    /// use graphfuse_compiler::pattern::InTemplate;
    ///
    /// let pattern = InTemplate::chain(["MatMulWithBias", "Sigmoid"]);
    /// assert_eq!(pattern.num_positions(), 2);
    /// ```
    pub fn chain<C: Into<TypeConstraint>>(constraints: impl IntoIterator<Item = C>) -> Self {
        Self {
            chains: vec![Chain::linear(0, constraints)],
        }
    }

    pub fn branching(chains: impl IntoIterator<Item = Chain>) -> Self {
        Self {
            chains: chains.into_iter().collect(),
        }
    }

    /// Number of distinct positions
    pub fn num_positions(&self) -> usize {
        self.chains
            .iter()
            .flat_map(|c| &c.nodes)
            .map(|n| n.position + 1)
            .max()
            .unwrap_or(0)
    }

    /// Constraint for a position, from its first occurrence
    pub fn constraint(&self, position: usize) -> Option<&TypeConstraint> {
        self.chains
            .iter()
            .flat_map(|c| &c.nodes)
            .find(|n| n.position == position)
            .map(|n| &n.constraint)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chains.is_empty() {
            return Err(ConfigError::EmptyTemplate);
        }

        let mut constraints: FxHashMap<usize, &TypeConstraint> = FxHashMap::default();
        for (chain_idx, chain) in self.chains.iter().enumerate() {
            if chain.nodes.is_empty() {
                return Err(ConfigError::EmptyChain { chain: chain_idx });
            }

            let mut in_chain = FxHashSet::default();
            for entry in &chain.nodes {
                if !in_chain.insert(entry.position) {
                    return Err(ConfigError::RepeatedPosition { chain: chain_idx, position: entry.position });
                }
                if entry.constraint.is_empty() {
                    return Err(ConfigError::EmptyTypeSet { position: entry.position });
                }
                match constraints.get(&entry.position) {
                    Some(existing) if **existing != entry.constraint => {
                        return Err(ConfigError::ConflictingConstraint { position: entry.position });
                    }
                    Some(_) => {}
                    None => {
                        constraints.insert(entry.position, &entry.constraint);
                    }
                }
            }
        }

        if let Some(missing) = (0..self.num_positions()).find(|p| !constraints.contains_key(p)) {
            return Err(ConfigError::MissingPosition(missing));
        }
        Ok(())
    }
}

/// `(old position, old slot)` source of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSource {
    pub position: usize,
    pub slot: usize,
}

impl SlotSource {
    pub fn new(position: usize, slot: usize) -> Self {
        Self { position, slot }
    }
}

impl From<(usize, usize)> for SlotSource {
    fn from((position, slot): (usize, usize)) -> Self {
        Self { position, slot }
    }
}

/// Where a new node's tensors come from and where they land
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotMap {
    pub sources: Vec<SlotSource>,
    /// New-node slot for each source
    pub placement: Vec<usize>,
    /// Declared total slot count of the new node
    pub arity: usize,
}

impl SlotMap {
    pub fn new(sources: Vec<SlotSource>, placement: Vec<usize>, arity: usize) -> Self {
        Self { sources, placement, arity }
    }

    /// Sources placed at slots 0..N in order
    pub fn sequential<S: Into<SlotSource>>(sources: impl IntoIterator<Item = S>, arity: usize) -> Self {
        let sources: Vec<SlotSource> = sources.into_iter().map(Into::into).collect();
        let placement = (0..sources.len()).collect();
        Self { sources, placement, arity }
    }

    fn validate(&self, node: usize, side: SlotSide, positions: usize) -> Result<(), ConfigError> {
        if let Some(src) = self.sources.iter().find(|s| s.position >= positions) {
            return Err(ConfigError::UndeclaredPosition { position: src.position });
        }
        if self.placement.len() != self.sources.len() {
            return Err(ConfigError::PlacementMismatch {
                node,
                side,
                placed: self.placement.len(),
                sources: self.sources.len(),
            });
        }

        let mut filled = FxHashSet::default();
        for &slot in &self.placement {
            if slot >= self.arity {
                return Err(ConfigError::PlacementOutOfRange { node, side, slot, arity: self.arity });
            }
            if !filled.insert(slot) {
                return Err(ConfigError::DuplicatePlacement { node, side, slot });
            }
        }
        if filled.len() != self.arity {
            return Err(ConfigError::ArityMismatch {
                node,
                side,
                expected: self.arity,
                actual: filled.len(),
            });
        }
        Ok(())
    }
}

/// How a new node is named
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeName {
    /// Reuse the name of the node matched at this position
    Borrow(usize),
    /// Fresh name derived from this base, made unique in the graph
    Fresh(String),
}

/// A node created by a rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutNode {
    pub op_type: String,
    pub name: NodeName,
    pub inputs: SlotMap,
    pub outputs: SlotMap,
}

/// Replacement for a matched sub-graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutTemplate {
    pub nodes: Vec<OutNode>,
    /// Matched positions handed back to the rule for attribute work
    pub returns: Vec<usize>,
}

impl OutTemplate {
    /// Check consistency against the template it replaces
    pub fn validate_against(&self, pattern: &InTemplate) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::EmptyOutTemplate);
        }

        let positions = pattern.num_positions();
        let mut borrowed = FxHashSet::default();
        for (idx, node) in self.nodes.iter().enumerate() {
            if let NodeName::Borrow(position) = node.name {
                if position >= positions {
                    return Err(ConfigError::UndeclaredPosition { position });
                }
                if !borrowed.insert(position) {
                    return Err(ConfigError::DuplicateBorrowedName { node: idx, position });
                }
            }
            node.inputs.validate(idx, SlotSide::Input, positions)?;
            node.outputs.validate(idx, SlotSide::Output, positions)?;
        }

        if let Some(&position) = self.returns.iter().find(|&&p| p >= positions) {
            return Err(ConfigError::UndeclaredPosition { position });
        }
        Ok(())
    }
}
