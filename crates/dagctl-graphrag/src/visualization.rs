//! Thin, read-only debugging export of the tool graph — not
//! load-bearing. DOT export lives on [`crate::graph::Graph::to_dot`];
//! this adds a Mermaid flowchart variant for contexts that render
//! Markdown instead of Graphviz.

use crate::graph::Graph;
use petgraph::visit::EdgeRef;

pub fn to_mermaid(graph: &Graph) -> String {
    let mut out = String::from("flowchart LR\n");
    for edge in graph.inner().edge_references() {
        let source = &graph.inner()[edge.source()];
        let target = &graph.inner()[edge.target()];
        out.push_str(&format!("  {source:?} -->|{:.2}| {target:?}\n", edge.weight().weight));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeSource, EdgeType};

    #[test]
    fn mermaid_export_includes_every_edge() {
        let mut g = Graph::new();
        g.record_edge("a", "b", EdgeType::Dependency, EdgeSource::Observed);
        let mermaid = to_mermaid(&g);
        assert!(mermaid.contains("\"a\""));
        assert!(mermaid.contains("\"b\""));
    }
}
