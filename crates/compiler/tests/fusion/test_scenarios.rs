//! End-to-end rule application

use super::*;
use graphfuse_compiler::graph::AttrValue;
use graphfuse_compiler::rules::{self, RuleOutcome};
use graphfuse_compiler::{apply_all, FusionConfig, FusionError, ConfigError};

#[test]
fn test_scenario_a_fuses_into_named_node() {
    let mut graph = scenario_a();
    let outcome = rules::apply("MatMulWithBiasSigmoid", &mut graph).unwrap();
    assert_eq!(outcome, RuleOutcome::Fused(1));

    assert_eq!(graph.len(), 1);
    let fused = graph.node("B").unwrap();
    assert_eq!(fused.op_type, "MatMulWithBiasSigmoid");
    assert_eq!(fused.inputs, vec!["x", "weight", "bias"]);
    assert_eq!(fused.outputs, vec!["b_out"]);

    let attrs: Vec<_> = fused.attributes.iter().collect();
    assert_eq!(
        attrs,
        vec![
            ("src0_perm", &AttrValue::Str("0,1".into())),
            ("src1_perm", &AttrValue::Str("1,0".into())),
            ("append_op", &AttrValue::Str("sigmoid".into())),
        ]
    );
    assert!(graph.validate().is_ok());
}

#[test]
fn test_scenario_a_without_perms() {
    let mut graph = scenario_a();
    graph.attributes_mut("A").unwrap().clear();

    rules::apply("MatMulWithBiasSigmoid", &mut graph).unwrap();
    let fused = graph.node("B").unwrap();
    assert_eq!(fused.attributes.len(), 1);
    assert_eq!(fused.get_attribute("append_op"), Some(&AttrValue::Str("sigmoid".into())));
}

#[test]
fn test_scenario_b_guard_blocks_rewrite() {
    let mut graph = scenario_b();
    let before = graph.clone();

    let outcome = rules::apply("MatMulWithBiasSigmoid", &mut graph).unwrap();
    assert_eq!(outcome, RuleOutcome::AlreadySatisfied);
    assert!(graph.structurally_eq(&before));
}

#[test]
fn test_rule_is_idempotent() {
    let mut graph = scenario_a();
    rules::apply("MatMulWithBiasSigmoid", &mut graph).unwrap();
    let once = graph.clone();

    assert_eq!(rules::apply("MatMulWithBiasSigmoid", &mut graph).unwrap(), RuleOutcome::NoMatch);
    assert!(graph.structurally_eq(&once));
}

#[test]
fn test_unknown_rule_name() {
    let mut graph = scenario_a();
    let err = rules::apply("FuseEverything", &mut graph).unwrap_err();
    assert!(matches!(err, FusionError::Config(ConfigError::UnknownRule(_))));
}

#[test]
fn test_catalog_fuses_mixed_stack() {
    let mut graph = layers(&["Sigmoid", "Tanh", "GeluTanh", "Relu", "Softmax"]);
    let stats = apply_all(&mut graph, &FusionConfig::default()).unwrap();

    assert_eq!(
        op_types(&graph),
        vec![
            "MatMulWithBiasSigmoid",
            "MatMulWithBiasTanh",
            "MatMulWithBiasGelu",
            "MatMulWithBiasRelu",
            "MatMulWithBias",
            "Softmax",
        ]
    );
    assert!(stats.converged);
    assert_eq!(stats.nodes_removed, 4);
    assert_eq!(graph.producer("t5").map(|p| p.node.as_str()), Some("act4"));
    assert!(graph.validate().is_ok());
}

#[test]
fn test_catalog_second_run_changes_nothing() {
    let mut graph = layers(&["Relu", "Tanh"]);
    apply_all(&mut graph, &FusionConfig::default()).unwrap();
    let fused = graph.clone();

    let stats = apply_all(&mut graph, &FusionConfig::default()).unwrap();
    assert_eq!(stats.total_changes, 0);
    assert_eq!(stats.iterations, 1);
    assert!(graph.structurally_eq(&fused));
}

#[test]
fn test_allow_list_limits_rules() {
    let mut graph = layers(&["Relu", "Tanh"]);
    let config = FusionConfig {
        rules: Some(vec!["MatMulWithBiasTanh".into()]),
        ..Default::default()
    };
    apply_all(&mut graph, &config).unwrap();
    assert_eq!(op_types(&graph), vec!["MatMulWithBias", "Relu", "MatMulWithBiasTanh"]);
}

#[test]
fn test_graph_output_name_survives_fusion() {
    let mut graph = layers(&["Relu"]);
    rules::apply("MatMulWithBiasRelu", &mut graph).unwrap();
    assert_eq!(graph.outputs(), &["t1".to_string()]);
    assert_eq!(graph.producer("t1").map(|p| p.node.as_str()), Some("act0"));
}
