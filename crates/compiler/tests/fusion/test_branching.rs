//! Branching templates: residual add

use super::*;
use graphfuse_compiler::graph::{AttrValue, Graph};
use graphfuse_compiler::rules::{self, RuleOutcome};
use graphfuse_compiler::{apply_all, FusionConfig, FusionError, StructuralError};

fn residual_block() -> Graph {
    let mut graph = residual_body("residual");
    graph.add_output("y");
    graph
}

fn residual_block_with_relu() -> Graph {
    let mut graph = residual_body("residual_relu");
    graph.add_op("Relu").name("post").input("y").output("z").finish().unwrap();
    graph.add_output("z");
    graph
}

fn residual_body(name: &str) -> Graph {
    let mut graph = Graph::new(name);
    graph.add_input("x");
    graph
        .add_op("MatMulWithBias")
        .name("skip")
        .inputs(["x", "ws", "bs"])
        .output("s")
        .attr("src0_perm", "0,1")
        .finish()
        .unwrap();
    graph
        .add_op("MatMulWithBias")
        .name("main")
        .inputs(["x", "wm", "bm"])
        .output("m")
        .attr("src1_perm", "1,0")
        .finish()
        .unwrap();
    graph.add_op("AddV2").name("sum").inputs(["s", "m"]).output("y").finish().unwrap();
    graph
}

#[test]
fn test_residual_slots() {
    let mut graph = residual_block();
    assert_eq!(rules::apply("MatMulWithBiasAdd", &mut graph).unwrap(), RuleOutcome::Fused(1));

    assert_eq!(op_types(&graph), vec!["MatMulWithBias", "MatMulWithBiasAdd"]);
    let fused = graph.node("sum").unwrap();
    assert_eq!(fused.inputs, vec!["x", "wm", "bm", "s"]);
    assert_eq!(fused.outputs, vec!["y"]);
    assert_eq!(fused.get_attribute("src1_perm"), Some(&AttrValue::Str("1,0".into())));
    assert_eq!(fused.get_attribute("append_op"), Some(&AttrValue::Str("sum".into())));

    let skip = graph.node("skip").unwrap();
    assert_eq!(skip.get_attribute("src0_perm"), Some(&AttrValue::Str("0,1".into())));
    assert!(skip.get_attribute("append_op").is_none());
    assert!(graph.validate().is_ok());
}

#[test]
fn test_residual_keeps_outside_consumers_of_skip_branch() {
    let mut graph = residual_block();
    graph.add_op("Relu").name("tap").input("s").output("tap_out").finish().unwrap();
    graph.add_output("tap_out");

    rules::apply("MatMulWithBiasAdd", &mut graph).unwrap();

    assert!(graph.consumes(
        graph.node_index("tap").unwrap(),
        graph.node_index("skip").unwrap(),
        Some(0)
    ));
    assert_eq!(graph.producer("s").map(|p| p.node.as_str()), Some("skip"));
    assert!(graph.validate().is_ok());
}

#[test]
fn test_consumed_intermediate_aborts_without_changes() {
    let mut graph = residual_block();
    graph.add_op("Relu").name("tap").input("m").output("tap_out").finish().unwrap();
    graph.add_output("tap_out");
    let before = graph.clone();

    let err = rules::apply("MatMulWithBiasAdd", &mut graph).unwrap_err();
    assert!(matches!(err, FusionError::Structural(StructuralError::OrphanedConsumer { .. })));
    assert!(graph.structurally_eq(&before));
}

#[test]
fn test_fused_residual_is_not_rematched() {
    let mut graph = residual_block_with_relu();
    let stats = apply_all(&mut graph, &FusionConfig::default()).unwrap();

    assert!(stats.converged);
    assert_eq!(op_types(&graph), vec!["MatMulWithBias", "MatMulWithBiasAdd", "Relu"]);
    assert_eq!(graph.node("sum").unwrap().inputs.len(), 4);
    assert!(graph.validate().is_ok());
}
