//! Shared graph builders for the fusion suite

mod test_branching;
mod test_properties;
mod test_scenarios;

use graphfuse_compiler::graph::Graph;

/// `X --MatMulWithBias(A)--> a_out --Sigmoid(B)--> b_out`
pub fn scenario_a() -> Graph {
    let mut graph = Graph::new("scenario_a");
    graph.add_input("x");
    graph
        .add_op("MatMulWithBias")
        .name("A")
        .inputs(["x", "weight", "bias"])
        .output("a_out")
        .attr("src0_perm", "0,1")
        .attr("src1_perm", "1,0")
        .finish()
        .unwrap();
    graph.add_op("Sigmoid").name("B").input("a_out").output("b_out").finish().unwrap();
    graph.add_output("b_out");
    graph
}

/// Scenario A followed by `Mul(b_out, x)`: the gated shape the sigmoid rule must skip
pub fn scenario_b() -> Graph {
    let mut graph = Graph::new("scenario_b");
    graph.add_input("x");
    graph
        .add_op("MatMulWithBias")
        .name("A")
        .inputs(["x", "weight", "bias"])
        .output("a_out")
        .finish()
        .unwrap();
    graph.add_op("Sigmoid").name("B").input("a_out").output("b_out").finish().unwrap();
    graph.add_op("Mul").name("M").inputs(["b_out", "x"]).output("m_out").finish().unwrap();
    graph.add_output("m_out");
    graph
}

/// A stack of `MatMulWithBias → activation` layers
pub fn layers(activations: &[&str]) -> Graph {
    let mut graph = Graph::new("layers");
    graph.add_input("t0");
    for (i, activation) in activations.iter().enumerate() {
        let pre = format!("pre{}", i);
        graph
            .add_op("MatMulWithBias")
            .name(format!("fc{}", i))
            .inputs([format!("t{}", i), format!("w{}", i), format!("b{}", i)])
            .output(pre.as_str())
            .finish()
            .unwrap();
        graph
            .add_op(*activation)
            .name(format!("act{}", i))
            .input(pre.as_str())
            .output(format!("t{}", i + 1))
            .finish()
            .unwrap();
    }
    graph.add_output(format!("t{}", activations.len()));
    graph
}

pub fn op_types(graph: &Graph) -> Vec<&str> {
    graph.nodes().iter().map(|n| n.op_type.as_str()).collect()
}
