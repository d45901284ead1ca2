//! Rule registry
//!
//! The process-wide registry is built once by [`register_all`] on first access and is
//! read-only afterwards. Building a private [`RuleRegistry`] is also supported, for tests and
//! for drivers that want a custom catalog.

use super::catalog;
use super::rule::{Rule, RuleOutcome};
use crate::error::{ConfigError, Result};
use crate::graph::Graph;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;
use tracing::debug;

static GLOBAL_REGISTRY: OnceLock<std::result::Result<RuleRegistry, ConfigError>> = OnceLock::new();

/// Name → rule mapping, iterated in registration order
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
    by_name: FxHashMap<String, usize>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule. Names must be unique and templates consistent.
    pub fn register(&mut self, rule: Rule) -> std::result::Result<(), ConfigError> {
        if self.by_name.contains_key(rule.name()) {
            return Err(ConfigError::DuplicateRule(rule.name().to_string()));
        }
        rule.validate()?;

        debug!("Registered rule {}", rule.name());
        self.by_name.insert(rule.name().to_string(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.by_name.get(name).map(|&i| &self.rules[i])
    }

    /// Look up a rule, failing for unknown names
    pub fn require(&self, name: &str) -> std::result::Result<&Rule, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::UnknownRule(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(Rule::name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply the named rule to `graph`
    pub fn apply(&self, name: &str, graph: &mut Graph) -> Result<RuleOutcome> {
        self.require(name)?.apply(graph)
    }
}

/// Build a registry holding the whole built-in catalog
pub fn register_all() -> std::result::Result<RuleRegistry, ConfigError> {
    let mut registry = RuleRegistry::new();
    catalog::register_catalog(&mut registry)?;
    Ok(registry)
}

/// The process-wide registry, built on first use
pub fn global() -> std::result::Result<&'static RuleRegistry, ConfigError> {
    GLOBAL_REGISTRY
        .get_or_init(register_all)
        .as_ref()
        .map_err(Clone::clone)
}

/// Apply a rule from the process-wide registry
pub fn apply(rule_name: &str, graph: &mut Graph) -> Result<RuleOutcome> {
    global()?.apply(rule_name, graph)
}
