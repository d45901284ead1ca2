//! # graphfuse
//!
//! Operator fusion for inference graphs: a library API plus the `graphfuse` CLI.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Fuse one rule
//! graphfuse apply --rule MatMulWithBiasSigmoid model.json -o fused.json
//!
//! # Run the whole catalog to a fixpoint
//! graphfuse optimize model.json --stats
//!
//! # Import a framework graph, then inspect it
//! graphfuse import tf_graph.json -o model.json
//! graphfuse info model.json
//! ```
//!
//! ## Library Usage
//!
//! ```
//! use graphfuse::{apply_all, FusionConfig, Graph};
//!
//! let mut graph = Graph::new("mlp");
//! graph.add_input("x");
//! graph.add_op("MatMulWithBias").inputs(["x", "w", "b"]).output("h").finish()?;
//! graph.add_op("Relu").input("h").output("y").finish()?;
//! graph.add_output("y");
//!
//! let stats = apply_all(&mut graph, &FusionConfig::default())?;
//! assert_eq!(stats.nodes_removed, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export everything from the compiler crate
pub use graphfuse_compiler::*;

// Re-export the importer crate
pub use graphfuse_importer as importer;
pub use graphfuse_importer::{
    import_graph, import_node, Framework, FrameworkGraph, FrameworkNode, ImportError, NativeAttr,
};

/// Get the version of graphfuse
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
