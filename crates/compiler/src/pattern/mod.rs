//! Pattern templates and sub-graph search

pub mod matcher;
pub mod template;

pub use matcher::{search, MatchResult};
pub use template::{Chain, InTemplate, NodeName, OutNode, OutTemplate, PatternNode, SlotMap, SlotSource, TypeConstraint};
