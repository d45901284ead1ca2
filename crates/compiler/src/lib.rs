//! # graphfuse compiler
//!
//! Pattern-driven operator fusion for inference graphs.
//!
//! ## Overview
//!
//! A fusion rule names a sub-graph shape (a chain or small DAG of typed operator nodes) and
//! the fused node(s) that replace it. The engine finds every occurrence of the shape,
//! rewrites it while keeping all outside consumers wired to the same tensors, and lets the
//! rule fix up attributes afterwards.
//!
//! ```text
//! Graph → search(InTemplate) → rewrite(OutTemplate) → attribute hook → Graph
//! ```
//!
//! Rules may carry skip guards so that running the whole catalog repeatedly reaches a
//! fixpoint instead of re-fusing the fused form.
//!
//! ## Usage
//!
//! ```
//! use graphfuse_compiler::graph::Graph;
//! use graphfuse_compiler::rules::{self, RuleOutcome};
//!
//! let mut graph = Graph::new("mlp");
//! graph.add_input("x");
//! graph.add_op("MatMulWithBias").name("A").inputs(["x", "w", "b"]).output("a").finish()?;
//! graph.add_op("Sigmoid").name("B").input("a").output("y").finish()?;
//! graph.add_output("y");
//!
//! let outcome = rules::apply("MatMulWithBiasSigmoid", &mut graph)?;
//! assert_eq!(outcome, RuleOutcome::Fused(1));
//! assert_eq!(graph.node("B").unwrap().op_type, "MatMulWithBiasSigmoid");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - `graph`: nodes, tensor registry, graph editing and analysis
//! - `pattern`: templates and the sub-graph matcher
//! - `rewrite`: match replacement
//! - `rules`: rules, the registry and the built-in catalog
//! - `passes`: fixpoint driver over a rule catalog
//! - `config`: TOML configuration

pub mod config;
pub mod error;
pub mod graph;
pub mod passes;
pub mod pattern;
pub mod rewrite;
pub mod rules;

pub use config::{ConfigLoadError, FusionConfig, MergedConfig};
pub use error::{ConfigError, FusionError, Result, StructuralError};
pub use graph::{AttrValue, Attributes, Graph, Node};
pub use passes::{apply_all, GraphOptimizer, OptimizationPass, OptimizationStats, RulePass};
pub use rules::{Rule, RuleOutcome, RuleRegistry};
