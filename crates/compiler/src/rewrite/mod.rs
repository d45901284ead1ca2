//! Sub-graph rewriting
//!
//! Replaces each matched sub-graph with the nodes an [`OutTemplate`] declares. New nodes take
//! their tensors from the matched nodes' slots, so every consumer outside the match keeps
//! reading the same tensor names and resolves to the new producer. Attributes are not merged
//! here: the caller gets the `returns` selection of old nodes for each match and decides.
//!
//! The rewrite is all-or-nothing across the whole match list: it runs on a copy of the graph
//! and the copy replaces the original only when every match succeeded.

use crate::error::{ConfigError, Result, SlotSide, StructuralError};
use crate::graph::{Graph, Node};
use crate::pattern::{MatchResult, NodeName, OutTemplate, SlotMap};
use rustc_hash::FxHashSet;
use tracing::debug;

/// Result of rewriting one match
#[derive(Debug, Clone)]
pub struct Fusion {
    /// The match that was replaced
    pub matched: MatchResult,
    /// Names of the nodes created, in out-template order
    pub new_nodes: Vec<String>,
    /// Copies of the old nodes selected by `returns`, taken before removal
    pub returned: Vec<Node>,
}

/// Result of a rewrite over a list of matches
#[derive(Debug, Clone, Default)]
pub struct RewriteOutput {
    pub fusions: Vec<Fusion>,
    /// Matches skipped because an earlier match already consumed one of their nodes
    pub skipped: usize,
}

impl RewriteOutput {
    pub fn len(&self) -> usize {
        self.fusions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fusions.is_empty()
    }

    /// All created node names, match by match
    pub fn new_node_names(&self) -> Vec<&str> {
        self.fusions
            .iter()
            .flat_map(|f| f.new_nodes.iter().map(String::as_str))
            .collect()
    }
}

/// Rewrite every match in order.
///
/// A match that shares a node with an earlier rewritten match is skipped. On error the graph
/// is left exactly as it was.
pub fn rewrite(matches: &[MatchResult], template: &OutTemplate, graph: &mut Graph) -> Result<RewriteOutput> {
    let mut working = graph.clone();
    let mut consumed: FxHashSet<String> = FxHashSet::default();
    let mut output = RewriteOutput::default();

    for m in matches {
        if let Some(taken) = m.nodes().iter().find(|n| consumed.contains(*n)) {
            debug!("Skipping overlapping match {:?}: node '{}' already rewritten", m.nodes(), taken);
            output.skipped += 1;
            continue;
        }

        let fusion = rewrite_one(m, template, &mut working)?;
        consumed.extend(m.nodes().iter().cloned());
        output.fusions.push(fusion);
    }

    *graph = working;
    Ok(output)
}

fn rewrite_one(m: &MatchResult, template: &OutTemplate, graph: &mut Graph) -> Result<Fusion> {
    let mut indices = Vec::with_capacity(m.len());
    let mut old: Vec<&Node> = Vec::with_capacity(m.len());
    for name in m.nodes() {
        let index = graph
            .node_index(name)
            .ok_or_else(|| StructuralError::UnknownNode(name.clone()))?;
        indices.push(index);
        old.push(&graph.nodes()[index]);
    }

    let returned = template
        .returns
        .iter()
        .map(|&p| {
            old.get(p)
                .map(|n| (*n).clone())
                .ok_or(ConfigError::UndeclaredPosition { position: p })
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut reserved: FxHashSet<String> = FxHashSet::default();
    let mut new_nodes = Vec::with_capacity(template.nodes.len());
    for (idx, out) in template.nodes.iter().enumerate() {
        let name = match &out.name {
            NodeName::Borrow(p) => old
                .get(*p)
                .map(|n| n.name.clone())
                .ok_or(ConfigError::UndeclaredPosition { position: *p })?,
            NodeName::Fresh(base) => graph.unique_name(base, &reserved),
        };
        reserved.insert(name.clone());

        let mut node = Node::new(name, out.op_type.as_str());
        node.inputs = fill_slots(&out.inputs, &old, idx, SlotSide::Input)?;
        node.outputs = fill_slots(&out.outputs, &old, idx, SlotSide::Output)?;
        new_nodes.push(node);
    }

    let new_names: Vec<String> = new_nodes.iter().map(|n| n.name.clone()).collect();
    graph.splice(&indices, new_nodes)?;

    debug!("Rewrote {:?} into {:?}", m.nodes(), new_names);
    Ok(Fusion {
        matched: m.clone(),
        new_nodes: new_names,
        returned,
    })
}

/// Resolve `(position, slot)` sources into tensor names placed by slot.
///
/// The populated slot count must equal the declared arity.
fn fill_slots(map: &SlotMap, old: &[&Node], node: usize, side: SlotSide) -> Result<Vec<String>> {
    let mut slots: Vec<Option<String>> = vec![None; map.arity];

    for (source, &place) in map.sources.iter().zip(&map.placement) {
        let old_node = old
            .get(source.position)
            .ok_or(ConfigError::UndeclaredPosition { position: source.position })?;
        let tensors = match side {
            SlotSide::Input => &old_node.inputs,
            SlotSide::Output => &old_node.outputs,
        };
        let tensor = tensors.get(source.slot).ok_or_else(|| ConfigError::SlotOutOfRange {
            node: old_node.name.clone(),
            position: source.position,
            side,
            slot: source.slot,
        })?;
        let target = slots.get_mut(place).ok_or(ConfigError::PlacementOutOfRange {
            node,
            side,
            slot: place,
            arity: map.arity,
        })?;
        *target = Some(tensor.clone());
    }

    let filled = slots.iter().filter(|s| s.is_some()).count();
    if filled != map.arity {
        return Err(ConfigError::ArityMismatch {
            node,
            side,
            expected: map.arity,
            actual: filled,
        }
        .into());
    }
    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FusionError;
    use crate::pattern::{search, InTemplate, OutNode};

    fn scenario() -> Graph {
        let mut graph = Graph::new("scenario");
        graph.add_input("x");
        graph
            .add_op("MatMulWithBias")
            .name("A")
            .inputs(["x", "w", "bias"])
            .output("a_out")
            .attr("src1_perm", "1,0")
            .finish()
            .unwrap();
        graph.add_op("Sigmoid").name("B").input("a_out").output("b_out").finish().unwrap();
        graph.add_op("Relu").name("C").input("b_out").output("c_out").finish().unwrap();
        graph.add_output("c_out");
        graph
    }

    fn fused(name: NodeName) -> OutTemplate {
        OutTemplate {
            nodes: vec![OutNode {
                op_type: "MatMulWithBiasSigmoid".into(),
                name,
                inputs: SlotMap::sequential([(0, 0), (0, 1), (0, 2)], 3),
                outputs: SlotMap::sequential([(1, 0)], 1),
            }],
            returns: vec![0],
        }
    }

    #[test]
    fn test_rewrite_preserves_consumers() {
        let mut graph = scenario();
        let matches = search(&InTemplate::chain(["MatMulWithBias", "Sigmoid"]), &graph);
        let output = rewrite(&matches, &fused(NodeName::Borrow(1)), &mut graph).unwrap();

        assert_eq!(output.new_node_names(), vec!["B"]);
        assert_eq!(output.fusions[0].returned[0].name, "A");

        let b = graph.node("B").unwrap();
        assert_eq!(b.op_type, "MatMulWithBiasSigmoid");
        assert_eq!(b.inputs, vec!["x", "w", "bias"]);
        assert_eq!(b.outputs, vec!["b_out"]);
        assert!(b.attributes.is_empty());

        assert_eq!(graph.producer("b_out").map(|p| p.node.as_str()), Some("B"));
        assert_eq!(graph.consumers("b_out")[0].node, "C");
        assert!(graph.node("A").is_none());
        assert!(graph.tensor("a_out").is_none());
        assert_eq!(graph.node_index("C"), Some(1));
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_fresh_names_are_unique() {
        let mut graph = scenario();
        let matches = search(&InTemplate::chain(["MatMulWithBias", "Sigmoid"]), &graph);
        let output = rewrite(&matches, &fused(NodeName::Fresh("C".into())), &mut graph).unwrap();
        assert_eq!(output.new_node_names(), vec!["C_1"]);
    }

    #[test]
    fn test_slot_out_of_range_leaves_graph_unchanged() {
        let mut graph = scenario();
        let before = graph.clone();
        let mut template = fused(NodeName::Borrow(1));
        template.nodes[0].inputs = SlotMap::sequential([(0, 0), (0, 1), (0, 5)], 3);

        let matches = search(&InTemplate::chain(["MatMulWithBias", "Sigmoid"]), &graph);
        let err = rewrite(&matches, &template, &mut graph).unwrap_err();

        assert!(matches!(err, FusionError::Config(ConfigError::SlotOutOfRange { slot: 5, .. })));
        assert!(graph.structurally_eq(&before));
    }

    #[test]
    fn test_arity_mismatch_is_fatal() {
        let mut graph = scenario();
        let mut template = fused(NodeName::Borrow(1));
        template.nodes[0].inputs.arity = 4;

        let matches = search(&InTemplate::chain(["MatMulWithBias", "Sigmoid"]), &graph);
        let err = rewrite(&matches, &template, &mut graph).unwrap_err();
        assert!(matches!(
            err,
            FusionError::Config(ConfigError::ArityMismatch { expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn test_orphaned_consumer_is_structural() {
        let mut graph = scenario();
        graph.add_op("Relu").name("D").input("a_out").output("d_out").finish().unwrap();
        let before = graph.clone();

        let matches = search(&InTemplate::chain(["MatMulWithBias", "Sigmoid"]), &graph);
        let err = rewrite(&matches, &fused(NodeName::Borrow(1)), &mut graph).unwrap_err();

        assert!(matches!(err, FusionError::Structural(StructuralError::OrphanedConsumer { .. })));
        assert!(graph.structurally_eq(&before));
    }

    #[test]
    fn test_overlapping_matches_skipped() {
        let mut graph = Graph::new("fanout");
        graph.add_op("MatMulWithBias").name("A").inputs(["x", "w", "b"]).output("a").finish().unwrap();
        graph.add_op("Sigmoid").name("S").input("a").output("s").finish().unwrap();

        let m = search(&InTemplate::chain(["MatMulWithBias", "Sigmoid"]), &graph);
        let doubled = vec![m[0].clone(), m[0].clone()];
        let output = rewrite(&doubled, &fused(NodeName::Borrow(1)), &mut graph).unwrap();

        assert_eq!(output.len(), 1);
        assert_eq!(output.skipped, 1);
        assert_eq!(graph.len(), 1);
    }
}
