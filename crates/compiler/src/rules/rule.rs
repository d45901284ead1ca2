//! Fusion rules
//!
//! A rule is a named, ordered list of template entries. An entry with a replacement rewrites
//! every match; an entry without one is a skip guard. Entries run in the order listed: once
//! a guard matches, evaluation stops and nothing further is rewritten. This is what makes
//! running a whole catalog repeatedly converge instead of re-fusing the fused form.

use crate::error::{ConfigError, Result};
use crate::graph::Graph;
use crate::pattern::{search, InTemplate, OutTemplate};
use crate::rewrite::{rewrite, Fusion};
use tracing::{debug, info};

/// Attribute post-processing, called after each rewriting entry that fused something.
///
/// Receives the entry index, the working graph and the fusions that entry produced.
pub type AttributeHook = fn(usize, &mut Graph, &[Fusion]) -> Result<()>;

/// One `(in, out-or-none)` pair of a rule
#[derive(Debug, Clone)]
pub struct RuleEntry {
    pub pattern: InTemplate,
    pub replacement: Option<OutTemplate>,
}

impl RuleEntry {
    pub fn guard(pattern: InTemplate) -> Self {
        Self { pattern, replacement: None }
    }

    pub fn fuse(pattern: InTemplate, replacement: OutTemplate) -> Self {
        Self {
            pattern,
            replacement: Some(replacement),
        }
    }

    pub fn is_guard(&self) -> bool {
        self.replacement.is_none()
    }
}

/// What applying a rule did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Nothing matched; the graph is unchanged
    NoMatch,
    /// A skip guard matched; the graph is unchanged
    AlreadySatisfied,
    /// This many sub-graphs were fused
    Fused(usize),
}

impl RuleOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, RuleOutcome::Fused(n) if *n > 0)
    }
}

/// A named fusion rule
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    entries: Vec<RuleEntry>,
    hook: Option<AttributeHook>,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            hook: None,
        }
    }

    /// Add a skip guard entry
    pub fn guard(mut self, pattern: InTemplate) -> Self {
        self.entries.push(RuleEntry::guard(pattern));
        self
    }

    /// Add a rewriting entry
    pub fn fuse(mut self, pattern: InTemplate, replacement: OutTemplate) -> Self {
        self.entries.push(RuleEntry::fuse(pattern, replacement));
        self
    }

    pub fn with_hook(mut self, hook: AttributeHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[RuleEntry] {
        &self.entries
    }

    /// Check every template of the rule
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.entries.is_empty() {
            return Err(ConfigError::EmptyRule(self.name.clone()));
        }
        for entry in &self.entries {
            entry.pattern.validate()?;
            if let Some(out) = &entry.replacement {
                out.validate_against(&entry.pattern)?;
            }
        }
        Ok(())
    }

    /// Apply the rule to `graph`.
    ///
    /// Works on a copy: on error, and for `NoMatch`/`AlreadySatisfied`, `graph` is untouched.
    pub fn apply(&self, graph: &mut Graph) -> Result<RuleOutcome> {
        let mut working: Option<Graph> = None;
        let mut fused = 0;

        for (idx, entry) in self.entries.iter().enumerate() {
            let current = working.as_ref().unwrap_or(&*graph);
            let matches = search(&entry.pattern, current);

            let Some(replacement) = &entry.replacement else {
                if matches.is_empty() {
                    continue;
                }
                debug!("{}: skip guard {} matched {} time(s)", self.name, idx, matches.len());
                if fused == 0 {
                    return Ok(RuleOutcome::AlreadySatisfied);
                }
                break;
            };

            if matches.is_empty() {
                continue;
            }

            let target = working.get_or_insert_with(|| graph.clone());
            let output = rewrite(&matches, replacement, target)?;
            if let Some(hook) = self.hook {
                hook(idx, target, &output.fusions)?;
            }
            fused += output.len();
        }

        match working {
            Some(result) if fused > 0 => {
                info!("{}: fused {} sub-graph(s)", self.name, fused);
                *graph = result;
                Ok(RuleOutcome::Fused(fused))
            }
            _ => Ok(RuleOutcome::NoMatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FusionError;
    use crate::graph::Graph;
    use crate::pattern::{NodeName, OutNode, SlotMap};

    fn relu_pair() -> Rule {
        Rule::new("DoubleRelu").fuse(
            InTemplate::chain(["Relu", "Relu"]),
            OutTemplate {
                nodes: vec![OutNode {
                    op_type: "Relu".into(),
                    name: NodeName::Borrow(1),
                    inputs: SlotMap::sequential([(0, 0)], 1),
                    outputs: SlotMap::sequential([(1, 0)], 1),
                }],
                returns: vec![],
            },
        )
    }

    fn relus(n: usize) -> Graph {
        let mut graph = Graph::new("relus");
        graph.add_input("t0");
        for i in 0..n {
            graph
                .add_op("Relu")
                .name(format!("r{}", i))
                .input(format!("t{}", i))
                .output(format!("t{}", i + 1))
                .finish()
                .unwrap();
        }
        graph.add_output(format!("t{}", n));
        graph
    }

    #[test]
    fn test_no_match_leaves_graph() {
        let mut graph = relus(1);
        let before = graph.clone();
        assert_eq!(relu_pair().apply(&mut graph).unwrap(), RuleOutcome::NoMatch);
        assert!(graph.structurally_eq(&before));
    }

    #[test]
    fn test_overlapping_chain_fuses_once_per_pass() {
        // r0 -> r1 -> r2: matches (r0,r1) and (r1,r2) overlap at r1
        let mut graph = relus(3);
        assert_eq!(relu_pair().apply(&mut graph).unwrap(), RuleOutcome::Fused(1));
        assert_eq!(graph.len(), 2);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_guard_blocks() {
        let rule = Rule::new("Guarded")
            .guard(InTemplate::chain(["Relu", "Relu", "Relu"]))
            .fuse(relu_pair().entries()[0].pattern.clone(), relu_pair().entries()[0].replacement.clone().unwrap());

        let mut graph = relus(3);
        assert_eq!(rule.apply(&mut graph).unwrap(), RuleOutcome::AlreadySatisfied);
        assert_eq!(graph.len(), 3);

        let mut short = relus(2);
        assert_eq!(rule.apply(&mut short).unwrap(), RuleOutcome::Fused(1));
    }

    #[test]
    fn test_hook_error_rolls_back() {
        fn failing(_: usize, _: &mut Graph, _: &[Fusion]) -> Result<()> {
            Err(FusionError::Hook { rule: "DoubleRelu".into(), reason: "refused".into() })
        }

        let mut graph = relus(2);
        let before = graph.clone();
        let err = relu_pair().with_hook(failing).apply(&mut graph).unwrap_err();
        assert!(matches!(err, FusionError::Hook { .. }));
        assert!(graph.structurally_eq(&before));
    }

    #[test]
    fn test_validate() {
        assert!(relu_pair().validate().is_ok());
        assert_eq!(Rule::new("Empty").validate(), Err(ConfigError::EmptyRule("Empty".into())));
    }
}
