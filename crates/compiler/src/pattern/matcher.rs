//! Sub-graph matcher
//!
//! Exhaustive backtracking search. Chains are bound in order: the head of the first chain is
//! tried against every node of an acceptable type in graph order, and every later entry is
//! tried against the direct consumers of the node bound just before it. Positions shared
//! between chains are bound once; when a later chain reaches an already-bound position, the
//! search only checks the connection (and slot) instead of enumerating.

use super::template::{InTemplate, PatternNode, TypeConstraint};
use crate::graph::Graph;
use rustc_hash::FxHashMap;
use tracing::trace;

/// A complete placement of a template onto graph nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchResult {
    /// Matched node names, indexed by template position
    nodes: Vec<String>,
}

impl MatchResult {
    pub fn new(nodes: Vec<String>) -> Self {
        Self { nodes }
    }

    /// Name of the node bound at `position`
    pub fn node(&self, position: usize) -> Option<&str> {
        self.nodes.get(position).map(String::as_str)
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True if any node is bound in both matches
    pub fn overlaps(&self, other: &MatchResult) -> bool {
        self.nodes.iter().any(|n| other.nodes.contains(n))
    }
}

/// Find every placement of `template` in `graph`.
///
/// Overlapping placements are all reported. Results are ordered by the graph positions of
/// their bound nodes, position 0 first. An empty result means the template does not occur.
pub fn search(template: &InTemplate, graph: &Graph) -> Vec<MatchResult> {
    let positions = template.num_positions();
    if positions == 0 || graph.is_empty() {
        return Vec::new();
    }

    let mut by_type: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
    for (i, node) in graph.nodes().iter().enumerate() {
        by_type.entry(node.op_type.as_str()).or_default().push(i);
    }

    let steps: Vec<(usize, usize)> = template
        .chains
        .iter()
        .enumerate()
        .flat_map(|(c, chain)| (0..chain.nodes.len()).map(move |e| (c, e)))
        .collect();

    let mut search = Search {
        template,
        graph,
        by_type,
        steps,
        bound: vec![None; positions],
        found: Vec::new(),
    };
    search.extend(0);

    let mut found = search.found;
    found.sort_unstable();
    found.dedup();
    trace!("template with {} positions matched {} time(s)", positions, found.len());

    found
        .into_iter()
        .map(|indices| MatchResult::new(indices.into_iter().map(|i| graph.nodes()[i].name.clone()).collect()))
        .collect()
}

struct Search<'a> {
    template: &'a InTemplate,
    graph: &'a Graph,
    by_type: FxHashMap<&'a str, Vec<usize>>,
    /// `(chain, entry)` visiting order
    steps: Vec<(usize, usize)>,
    /// Node index bound at each position
    bound: Vec<Option<usize>>,
    found: Vec<Vec<usize>>,
}

impl Search<'_> {
    fn extend(&mut self, step: usize) {
        let Some(&(chain, entry)) = self.steps.get(step) else {
            if let Some(placement) = self.bound.iter().copied().collect::<Option<Vec<usize>>>() {
                self.found.push(placement);
            }
            return;
        };

        let template = self.template;
        let nodes = &template.chains[chain].nodes;
        let current = &nodes[entry];
        let previous = entry.checked_sub(1).and_then(|e| self.bound[nodes[e].position]);

        if let Some(index) = self.bound[current.position] {
            let connected = match previous {
                Some(prev) => self.graph.consumes(index, prev, current.slot),
                None => true,
            };
            if connected {
                self.extend(step + 1);
            }
            return;
        }

        for candidate in self.candidates(current, previous) {
            if self.bound.contains(&Some(candidate)) {
                continue;
            }
            self.bound[current.position] = Some(candidate);
            self.extend(step + 1);
            self.bound[current.position] = None;
        }
    }

    fn candidates(&self, entry: &PatternNode, previous: Option<usize>) -> Vec<usize> {
        let graph = self.graph;
        let accepts = |i: &usize| {
            graph
                .node_at(*i)
                .is_some_and(|n| entry.constraint.matches(&n.op_type))
        };

        match previous {
            None => {
                let mut heads: Vec<usize> = match &entry.constraint {
                    TypeConstraint::Exact(t) => self.by_type.get(t.as_str()).cloned().unwrap_or_default(),
                    TypeConstraint::OneOf(set) => set
                        .iter()
                        .filter_map(|t| self.by_type.get(t.as_str()))
                        .flatten()
                        .copied()
                        .collect(),
                };
                heads.sort_unstable();
                heads.dedup();
                heads
            }
            Some(prev) => {
                let mut next: Vec<usize> = graph
                    .successors(prev)
                    .into_iter()
                    .filter(|&(_, slot)| entry.slot.map_or(true, |s| s == slot))
                    .map(|(i, _)| i)
                    .filter(accepts)
                    .collect();
                next.dedup();
                next
            }
        }
    }
}
