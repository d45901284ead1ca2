//! Residual add fusion
//!
//! Two `MatMulWithBias` nodes feeding one `AddV2`: the one on the add's right operand absorbs
//! the add and takes the left operand as a fourth, residual input. The left matmul is
//! re-created unchanged.
//!
//! ```text
//!   L:MatMulWithBias   R:MatMulWithBias          L:MatMulWithBias
//!          \               /              =>            |
//!           S:AddV2(l, r)                    S:MatMulWithBiasAdd(x, w, b, l)
//! ```

use crate::error::{FusionError, Result};
use crate::graph::Graph;
use crate::pattern::{Chain, InTemplate, NodeName, OutNode, OutTemplate, PatternNode, SlotMap};
use crate::rewrite::Fusion;
use crate::rules::Rule;

use super::matmul_with_bias::set_fused_attributes;

fn residual_pattern() -> InTemplate {
    InTemplate::branching([
        Chain::new([PatternNode::new(0, "MatMulWithBias"), PatternNode::new(2, "AddV2").at_slot(0)]),
        Chain::new([PatternNode::new(1, "MatMulWithBias"), PatternNode::new(2, "AddV2").at_slot(1)]),
    ])
}

fn residual_template() -> OutTemplate {
    OutTemplate {
        nodes: vec![
            OutNode {
                op_type: "MatMulWithBias".to_string(),
                name: NodeName::Borrow(0),
                inputs: SlotMap::sequential([(0, 0), (0, 1), (0, 2)], 3),
                outputs: SlotMap::sequential([(0, 0)], 1),
            },
            OutNode {
                op_type: "MatMulWithBiasAdd".to_string(),
                name: NodeName::Borrow(2),
                inputs: SlotMap::sequential([(1, 0), (1, 1), (1, 2), (2, 0)], 4),
                outputs: SlotMap::sequential([(2, 0)], 1),
            },
        ],
        returns: vec![1, 0],
    }
}

/// Restore the left matmul's attributes, then tag the fused node
fn residual_attrs(_entry: usize, graph: &mut Graph, fusions: &[Fusion]) -> Result<()> {
    for fusion in fusions {
        let (Some(left), Some(name)) = (fusion.returned.get(1), fusion.new_nodes.first()) else {
            return Err(FusionError::Hook {
                rule: "MatMulWithBiasAdd".to_string(),
                reason: "fusion carries no re-created matmul or no returned left matmul".to_string(),
            });
        };
        let attrs = graph.attributes_mut(name).ok_or_else(|| FusionError::Hook {
            rule: "MatMulWithBiasAdd".to_string(),
            reason: format!("re-created node '{}' is missing", name),
        })?;
        *attrs = left.attributes.clone();
    }
    set_fused_attributes("MatMulWithBiasAdd", graph, fusions, "sum")
}

pub fn residual_add() -> Rule {
    Rule::new("MatMulWithBiasAdd")
        .fuse(residual_pattern(), residual_template())
        .with_hook(residual_attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AttrValue;
    use crate::pattern::MatchResult;
    use crate::rules::RuleOutcome;

    fn residual_graph() -> Graph {
        let mut graph = Graph::new("residual");
        graph.add_input("x");
        graph
            .add_op("MatMulWithBias")
            .name("L")
            .inputs(["x", "w0", "b0"])
            .output("l")
            .attr("src1_perm", "1,0")
            .finish()
            .unwrap();
        graph.add_op("MatMulWithBias").name("R").inputs(["x", "w1", "b1"]).output("r").finish().unwrap();
        graph.add_op("AddV2").name("S").inputs(["l", "r"]).output("s").finish().unwrap();
        graph.add_output("s");
        graph
    }

    #[test]
    fn test_residual_fusion() {
        let mut graph = residual_graph();
        assert_eq!(residual_add().apply(&mut graph).unwrap(), RuleOutcome::Fused(1));

        let names: Vec<_> = graph.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["L", "S"]);

        let left = graph.node("L").unwrap();
        assert_eq!(left.op_type, "MatMulWithBias");
        assert_eq!(left.get_attribute("src1_perm"), Some(&AttrValue::Str("1,0".into())));

        let fused = graph.node("S").unwrap();
        assert_eq!(fused.op_type, "MatMulWithBiasAdd");
        assert_eq!(fused.inputs, vec!["x", "w1", "b1", "l"]);
        assert_eq!(fused.outputs, vec!["s"]);
        assert_eq!(fused.get_attribute("append_op"), Some(&AttrValue::Str("sum".into())));
        assert!(fused.get_attribute("src1_perm").is_none());
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_second_application_is_noop() {
        let mut graph = residual_graph();
        residual_add().apply(&mut graph).unwrap();
        let once = graph.clone();
        assert_eq!(residual_add().apply(&mut graph).unwrap(), RuleOutcome::NoMatch);
        assert!(graph.structurally_eq(&once));
    }

    #[test]
    fn test_hook_rejects_incomplete_fusion() {
        let mut graph = residual_graph();
        let empty = Fusion {
            matched: MatchResult::new(vec!["L".into(), "R".into(), "S".into()]),
            new_nodes: vec![],
            returned: vec![],
        };
        let err = residual_attrs(0, &mut graph, &[empty]).unwrap_err();
        assert!(matches!(err, FusionError::Hook { ref rule, .. } if rule == "MatMulWithBiasAdd"));

        let renamed = Fusion {
            matched: MatchResult::new(vec!["L".into(), "R".into(), "S".into()]),
            new_nodes: vec!["gone".into(), "S".into()],
            returned: vec![graph.node("R").unwrap().clone(), graph.node("L").unwrap().clone()],
        };
        let err = residual_attrs(0, &mut graph, &[renamed]).unwrap_err();
        assert!(matches!(err, FusionError::Hook { ref reason, .. } if reason.contains("'gone'")));
    }
}
