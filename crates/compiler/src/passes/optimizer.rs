// Catalog driver
//
// Runs a sequence of passes over a Graph until no pass changes it (fixpoint iteration) or the
// iteration limit is reached. Each pass fully completes before the next one starts, since later
// rules may depend on structure produced by earlier ones.

use super::OptimizationPass;
use crate::error::Result;
use crate::graph::Graph;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Drives fusion passes to a fixpoint
///
/// One iteration runs every pass once, in catalog order. Iterations repeat while some rule
/// still fuses a sub-graph.
pub struct GraphOptimizer {
    /// One pass per enabled rule, in catalog order
    passes: Vec<Box<dyn OptimizationPass>>,

    /// Iteration limit; reaching it leaves `converged` false
    max_iterations: usize,

    /// Log per-rule outcomes and the final stats
    verbose: bool,
}

impl GraphOptimizer {
    /// Up to 10 iterations, quiet
    pub fn new(passes: Vec<Box<dyn OptimizationPass>>) -> Self {
        Self {
            passes,
            max_iterations: 10,
            verbose: false,
        }
    }

    pub fn with_settings(passes: Vec<Box<dyn OptimizationPass>>, max_iterations: usize, verbose: bool) -> Self {
        Self {
            passes,
            max_iterations,
            verbose,
        }
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.max_iterations = max_iterations;
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Fuse until no rule matches
    ///
    /// Stops after the first iteration in which no rule reports a fusion, or at
    /// `max_iterations`. A failing rule aborts the run. Rules that already committed keep
    /// their fusions.
    pub fn optimize(&self, graph: &mut Graph) -> Result<OptimizationStats> {
        let start_time = Instant::now();
        let initial_stats = graph.statistics();

        info!("Fusing '{}' with {} rule(s)", graph.name(), self.passes.len());
        if self.verbose {
            info!("Before fusion:\n{}", initial_stats);
        }

        let mut total_changes = 0;
        let mut iterations = 0;
        let mut converged = false;
        let mut pass_stats: Vec<PassStats> = Vec::new();

        for iteration in 0..self.max_iterations {
            iterations = iteration + 1;
            let mut iteration_changed = false;

            debug!("Fusion iteration {}/{}", iterations, self.max_iterations);

            for pass in &self.passes {
                let pass_start = Instant::now();
                let nodes_before = graph.len();

                let changed = pass.run(graph)?;

                let duration = pass_start.elapsed();
                let nodes_removed = nodes_before.saturating_sub(graph.len());

                if changed {
                    iteration_changed = true;
                    total_changes += 1;
                }
                if self.verbose {
                    debug!(
                        "  {} - fused: {}, nodes removed: {}, time: {:?}",
                        pass.name(),
                        changed,
                        nodes_removed,
                        duration
                    );
                }

                pass_stats.push(PassStats {
                    pass_name: pass.name().to_string(),
                    iteration,
                    changed,
                    nodes_removed,
                    duration,
                });
            }

            if !iteration_changed {
                converged = true;
                info!("No rule matched after {} iteration(s)", iterations);
                break;
            }
        }

        if !converged && !self.passes.is_empty() {
            warn!(
                "Rules still matched after {} iteration(s); stopping",
                self.max_iterations
            );
        }

        let final_stats = graph.statistics();
        let stats = OptimizationStats {
            initial_nodes: initial_stats.total_nodes,
            final_nodes: final_stats.total_nodes,
            nodes_removed: initial_stats.total_nodes.saturating_sub(final_stats.total_nodes),
            initial_edges: initial_stats.total_edges,
            final_edges: final_stats.total_edges,
            iterations,
            converged,
            total_changes,
            duration: start_time.elapsed(),
            pass_stats,
        };

        if self.verbose {
            info!("{}", stats);
        }

        Ok(stats)
    }
}

/// One rule's run within one iteration
#[derive(Debug, Clone)]
pub struct PassStats {
    pub pass_name: String,
    pub iteration: usize,
    pub changed: bool,
    pub nodes_removed: usize,
    pub duration: Duration,
}

/// Totals for a fixpoint run; `total_changes` counts rule runs that fused
#[derive(Debug, Clone)]
pub struct OptimizationStats {
    pub initial_nodes: usize,
    pub final_nodes: usize,
    pub nodes_removed: usize,
    pub initial_edges: usize,
    pub final_edges: usize,
    pub iterations: usize,
    pub converged: bool,
    pub total_changes: usize,
    pub duration: Duration,
    pub pass_stats: Vec<PassStats>,
}

impl std::fmt::Display for OptimizationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Optimization Statistics:")?;
        writeln!(
            f,
            "  Nodes: {} → {} (removed {})",
            self.initial_nodes, self.final_nodes, self.nodes_removed
        )?;
        writeln!(f, "  Edges: {} → {}", self.initial_edges, self.final_edges)?;
        writeln!(
            f,
            "  Iterations: {}{}",
            self.iterations,
            if self.converged { "" } else { " (not converged)" }
        )?;
        writeln!(f, "  Total changes: {}", self.total_changes)?;
        writeln!(f, "  Total time: {:?}", self.duration)?;

        if self.pass_stats.iter().any(|s| s.changed) {
            writeln!(f, "  Fusing rules:")?;
            for stat in self.pass_stats.iter().filter(|s| s.changed) {
                writeln!(
                    f,
                    "    [Iter {}] {} - removed {} node(s) ({:?})",
                    stat.iteration, stat.pass_name, stat.nodes_removed, stat.duration
                )?;
            }
        }

        Ok(())
    }
}
