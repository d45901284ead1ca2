// Graph passes
//
// Rules are run through the same pass interface the optimizer drives, so a catalog can be
// mixed with other graph transformations.

mod optimizer;

pub use optimizer::{GraphOptimizer, OptimizationStats, PassStats};

use crate::config::FusionConfig;
use crate::error::Result;
use crate::graph::Graph;
use crate::rules::{self, Rule};

/// Optimization pass trait
///
/// Each pass implements this trait to provide a composable transformation on the graph.
pub trait OptimizationPass {
    /// Get the name of this pass (for logging/debugging)
    fn name(&self) -> &str;

    /// Run the pass on the graph
    ///
    /// Returns `true` if the graph was modified, `false` otherwise.
    /// This is used to determine when to stop fixpoint iteration.
    fn run(&self, graph: &mut Graph) -> Result<bool>;
}

/// Runs one fusion rule as a pass
pub struct RulePass {
    rule: Rule,
}

impl RulePass {
    pub fn new(rule: Rule) -> Self {
        Self { rule }
    }
}

impl OptimizationPass for RulePass {
    fn name(&self) -> &str {
        self.rule.name()
    }

    fn run(&self, graph: &mut Graph) -> Result<bool> {
        Ok(self.rule.apply(graph)?.changed())
    }
}

/// Run the configured rules from the process-wide registry to a fixpoint
pub fn apply_all(graph: &mut Graph, config: &FusionConfig) -> Result<OptimizationStats> {
    let merged = config.merge_with_cli(None, None);
    let registry = rules::global()?;
    let passes: Vec<Box<dyn OptimizationPass>> = merged
        .select_rules(registry)?
        .into_iter()
        .map(|rule| Box::new(RulePass::new(rule.clone())) as Box<dyn OptimizationPass>)
        .collect();

    GraphOptimizer::with_settings(passes, merged.max_passes, merged.verbose).optimize(graph)
}
