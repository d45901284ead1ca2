//! Error types for the fusion engine

use std::io;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, FusionError>;

/// Errors that can occur while matching, rewriting or dispatching rules
#[derive(Debug, Error)]
pub enum FusionError {
    #[error("Rule configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Structural violation: {0}")]
    Structural(#[from] StructuralError),

    #[error("Attribute hook for rule '{rule}' failed: {reason}")]
    Hook { rule: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A rule's templates are internally inconsistent.
///
/// These are authoring defects: they surface at registration or on first use and are
/// never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("rule '{0}' is registered more than once")]
    DuplicateRule(String),

    #[error("no rule named '{0}' is registered")]
    UnknownRule(String),

    #[error("rule '{0}' declares no template entries")]
    EmptyRule(String),

    #[error("template declares no chains")]
    EmptyTemplate,

    #[error("chain {chain} is empty")]
    EmptyChain { chain: usize },

    #[error("template positions must be contiguous from 0, position {0} is missing")]
    MissingPosition(usize),

    #[error("position {position} is declared with conflicting type constraints")]
    ConflictingConstraint { position: usize },

    #[error("position {position} appears twice in chain {chain}")]
    RepeatedPosition { chain: usize, position: usize },

    #[error("type set for position {position} is empty")]
    EmptyTypeSet { position: usize },

    #[error("out template references undeclared position {position}")]
    UndeclaredPosition { position: usize },

    #[error("out template declares no nodes")]
    EmptyOutTemplate,

    #[error("out node {node} borrows the name of position {position} already borrowed by another node")]
    DuplicateBorrowedName { node: usize, position: usize },

    #[error("out node {node} {side} map places {placed} slot(s) but {sources} source(s) are listed")]
    PlacementMismatch { node: usize, side: SlotSide, placed: usize, sources: usize },

    #[error("out node {node} {side} slot {slot} is out of range for arity {arity}")]
    PlacementOutOfRange { node: usize, side: SlotSide, slot: usize, arity: usize },

    #[error("out node {node} {side} slot {slot} is filled twice")]
    DuplicatePlacement { node: usize, side: SlotSide, slot: usize },

    #[error("out node {node} declares {side} arity {expected} but {actual} slot(s) were populated")]
    ArityMismatch { node: usize, side: SlotSide, expected: usize, actual: usize },

    #[error("matched node '{node}' at position {position} has no {side} slot {slot}")]
    SlotOutOfRange { node: String, position: usize, side: SlotSide, slot: usize },
}

/// A rewrite would break a graph invariant.
///
/// The engine aborts the in-progress rewrite and leaves the graph as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("graph contains a cycle through node '{0}'")]
    Cycle(String),

    #[error("node '{node}' references unknown tensor '{tensor}'")]
    DanglingTensor { node: String, tensor: String },

    #[error("tensor '{tensor}' is produced by both '{first}' and '{second}'")]
    DuplicateProducer { tensor: String, first: String, second: String },

    #[error("node name '{0}' is not unique")]
    DuplicateNode(String),

    #[error("node '{0}' does not exist")]
    UnknownNode(String),

    #[error("tensor '{tensor}' would lose its producer while still consumed by '{consumer}'")]
    OrphanedConsumer { tensor: String, consumer: String },

    #[error("graph output '{0}' has no producer")]
    OrphanedOutput(String),
}

/// Which side of a node a slot reference addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SlotSide {
    Input,
    Output,
}

impl std::fmt::Display for SlotSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotSide::Input => f.write_str("input"),
            SlotSide::Output => f.write_str("output"),
        }
    }
}
