//! Fusion rules, the rule registry and the built-in catalog

pub mod catalog;
pub mod registry;
pub mod rule;

pub use registry::{apply, global, register_all, RuleRegistry};
pub use rule::{AttributeHook, Rule, RuleEntry, RuleOutcome};
