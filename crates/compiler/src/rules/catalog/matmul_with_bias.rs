//! `MatMulWithBias` + activation fusions
//!
//! Each rule folds a `MatMulWithBias` and the activation consuming it into one
//! `MatMulWithBias<Act>` node that borrows the activation's name, so the graph keeps
//! exposing the same output name. The fused node keeps the matmul's transpose attributes and
//! records the activation in `append_op`.

use crate::error::{FusionError, Result};
use crate::graph::{Attributes, Graph};
use crate::pattern::{InTemplate, NodeName, OutNode, OutTemplate, SlotMap, TypeConstraint};
use crate::rewrite::Fusion;
use crate::rules::Rule;

/// Attributes carried from the matmul onto the fused node, in this order
const CARRIED: [&str; 2] = ["src0_perm", "src1_perm"];

fn fused_template(op_type: &str) -> OutTemplate {
    OutTemplate {
        nodes: vec![OutNode {
            op_type: op_type.to_string(),
            name: NodeName::Borrow(1),
            inputs: SlotMap::sequential([(0, 0), (0, 1), (0, 2)], 3),
            outputs: SlotMap::sequential([(1, 0)], 1),
        }],
        returns: vec![0],
    }
}

fn activation_pattern(activation: impl Into<TypeConstraint>) -> InTemplate {
    InTemplate::chain([TypeConstraint::from("MatMulWithBias"), activation.into()])
}

/// Replace each fused node's attributes with the carried matmul attributes followed by
/// `append_op`
pub(crate) fn set_fused_attributes(
    rule: &str,
    graph: &mut Graph,
    fusions: &[Fusion],
    append_op: &str,
) -> Result<()> {
    for fusion in fusions {
        let (Some(new_name), Some(matmul)) = (fusion.new_nodes.last(), fusion.returned.first()) else {
            return Err(FusionError::Hook {
                rule: rule.to_string(),
                reason: "fusion carries no new node or no returned matmul".to_string(),
            });
        };

        let mut attrs = Attributes::new();
        for key in CARRIED {
            if let Some(value) = matmul.get_attribute(key) {
                attrs.set(key, value.clone());
            }
        }
        attrs.set("append_op", append_op);

        let target = graph.attributes_mut(new_name).ok_or_else(|| FusionError::Hook {
            rule: rule.to_string(),
            reason: format!("fused node '{}' is missing", new_name),
        })?;
        *target = attrs;
    }
    Ok(())
}

fn sigmoid_attrs(_entry: usize, graph: &mut Graph, fusions: &[Fusion]) -> Result<()> {
    set_fused_attributes("MatMulWithBiasSigmoid", graph, fusions, "sigmoid")
}

fn tanh_attrs(_entry: usize, graph: &mut Graph, fusions: &[Fusion]) -> Result<()> {
    set_fused_attributes("MatMulWithBiasTanh", graph, fusions, "tanh")
}

fn gelu_attrs(_entry: usize, graph: &mut Graph, fusions: &[Fusion]) -> Result<()> {
    set_fused_attributes("MatMulWithBiasGelu", graph, fusions, "gelu_tanh")
}

fn relu_attrs(_entry: usize, graph: &mut Graph, fusions: &[Fusion]) -> Result<()> {
    set_fused_attributes("MatMulWithBiasRelu", graph, fusions, "relu")
}

/// `MatMulWithBias → Sigmoid`, skipped when the sigmoid feeds a `Mul` (swish is fused
/// elsewhere)
pub fn sigmoid() -> Rule {
    Rule::new("MatMulWithBiasSigmoid")
        .guard(InTemplate::chain(["MatMulWithBias", "Sigmoid", "Mul"]))
        .fuse(activation_pattern("Sigmoid"), fused_template("MatMulWithBiasSigmoid"))
        .with_hook(sigmoid_attrs)
}

pub fn tanh() -> Rule {
    Rule::new("MatMulWithBiasTanh")
        .fuse(activation_pattern("Tanh"), fused_template("MatMulWithBiasTanh"))
        .with_hook(tanh_attrs)
}

pub fn gelu() -> Rule {
    Rule::new("MatMulWithBiasGelu")
        .fuse(activation_pattern(["Gelu", "GeluTanh"]), fused_template("MatMulWithBiasGelu"))
        .with_hook(gelu_attrs)
}

pub fn relu() -> Rule {
    Rule::new("MatMulWithBiasRelu")
        .fuse(activation_pattern("Relu"), fused_template("MatMulWithBiasRelu"))
        .with_hook(relu_attrs)
}
