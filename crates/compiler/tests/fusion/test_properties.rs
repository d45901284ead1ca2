//! Catalog properties over random layer stacks

use super::*;
use graphfuse_compiler::graph::Graph;
use graphfuse_compiler::{apply_all, FusionConfig};
use proptest::prelude::*;

const FUSABLE: [&str; 5] = ["Sigmoid", "Tanh", "Gelu", "GeluTanh", "Relu"];
const OTHER: [&str; 2] = ["Softmax", "Identity"];

fn activation_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        3 => prop::sample::select(FUSABLE.to_vec()),
        1 => prop::sample::select(OTHER.to_vec()),
    ]
}

fn stack_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(activation_strategy(), 1..8)
}

/// A chain of activations with no matmul for any rule to anchor on
fn activation_chain(activations: &[&str]) -> Graph {
    let mut graph = Graph::new("chain");
    graph.add_input("t0");
    for (i, activation) in activations.iter().enumerate() {
        graph
            .add_op(*activation)
            .input(format!("t{}", i))
            .output(format!("t{}", i + 1))
            .finish()
            .unwrap();
    }
    graph.add_output(format!("t{}", activations.len()));
    graph
}

proptest! {
    #[test]
    fn test_fusion_count_matches_fusable_layers(stack in stack_strategy()) {
        let mut graph = layers(&stack);
        let fusable = stack.iter().filter(|a| FUSABLE.contains(*a)).count();

        let stats = apply_all(&mut graph, &FusionConfig::default()).unwrap();
        prop_assert!(stats.converged);
        prop_assert_eq!(graph.len(), 2 * stack.len() - fusable);
        prop_assert_eq!(stats.nodes_removed, fusable);
    }

    #[test]
    fn test_fused_graph_stays_valid(stack in stack_strategy()) {
        let mut graph = layers(&stack);
        apply_all(&mut graph, &FusionConfig::default()).unwrap();

        prop_assert!(graph.validate().is_ok());
        prop_assert!(!graph.is_cyclic());
        let output = format!("t{}", stack.len());
        prop_assert_eq!(graph.outputs(), &[output.clone()]);
        prop_assert!(graph.producer(&output).is_some());
    }

    #[test]
    fn test_fused_nodes_keep_three_inputs(stack in stack_strategy()) {
        let mut graph = layers(&stack);
        apply_all(&mut graph, &FusionConfig::default()).unwrap();

        for node in graph.nodes().iter().filter(|n| n.op_type.starts_with("MatMulWithBias")) {
            prop_assert_eq!(node.inputs.len(), 3);
            prop_assert_eq!(node.outputs.len(), 1);
        }
    }

    #[test]
    fn test_catalog_is_idempotent(stack in stack_strategy()) {
        let mut graph = layers(&stack);
        apply_all(&mut graph, &FusionConfig::default()).unwrap();
        let fused = graph.clone();

        let stats = apply_all(&mut graph, &FusionConfig::default()).unwrap();
        prop_assert_eq!(stats.total_changes, 0);
        prop_assert!(graph.structurally_eq(&fused));
    }

    #[test]
    fn test_unanchored_chain_is_untouched(stack in stack_strategy()) {
        let mut graph = activation_chain(&stack);
        let before = graph.clone();

        let stats = apply_all(&mut graph, &FusionConfig::default()).unwrap();
        prop_assert_eq!(stats.total_changes, 0);
        prop_assert!(graph.structurally_eq(&before));
    }
}
