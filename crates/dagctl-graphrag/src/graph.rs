//! The weighted directed multigraph over tool ids. Node identity is
//! the full tool selector string
//! (`server:op`); edges record how often one tool has followed another
//! and why. Structured the way `dashflow-memory::kg::NetworkxEntityGraph`
//! wraps petgraph: a `DiGraph` plus a `HashMap<String, NodeIndex>` for
//! name-based lookups, generalized from single-label edges to the
//! weighted/typed/sourced edges this system needs.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeType {
    Dependency,
    Contains,
    Provides,
    Sequence,
}

impl EdgeType {
    /// Base weight contribution before the source modifier
    /// (`weight = edge_type_weight x source_modifier`). Dependency edges
    /// are the strongest signal since they are drawn directly from a
    /// task's `depends_on`; sequence edges (layer fan-out/fan-in, or
    /// consecutive code_execution sub-calls) are the weakest.
    pub fn base_weight(self) -> f64 {
        match self {
            EdgeType::Dependency => 1.0,
            EdgeType::Contains => 0.8,
            EdgeType::Provides => 0.7,
            EdgeType::Sequence => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeSource {
    Observed,
    Inferred,
    Template,
}

impl EdgeSource {
    fn modifier(self) -> f64 {
        match self {
            EdgeSource::Observed => 1.0,
            EdgeSource::Inferred => 0.6,
            EdgeSource::Template => 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEdge {
    pub edge_type: EdgeType,
    pub source: EdgeSource,
    pub weight: f64,
    pub count: u32,
}

impl ToolEdge {
    fn new(edge_type: EdgeType, source: EdgeSource) -> Self {
        let mut edge = Self { edge_type, source, weight: 0.0, count: 0 };
        edge.bump();
        edge
    }

    /// Increments the observation count and recomputes weight, promoting
    /// `inferred -> observed` once count crosses 3.
    fn bump(&mut self) {
        self.count += 1;
        if self.source == EdgeSource::Inferred && self.count >= 3 {
            self.source = EdgeSource::Observed;
        }
        self.weight = (self.edge_type.base_weight() * self.source.modifier()).min(1.0);
    }
}

/// One executed edge observation fed into [`Graph::record_dag_execution`].
pub struct ExecutedEdge {
    pub source_tool: String,
    pub target_tool: String,
    pub edge_type: EdgeType,
    pub source: EdgeSource,
}

/// A single task's placement in the executed run, used to derive
/// layer-based fan-out/fan-in sequence edges and code_execution
/// sub-call sequence edges.
pub struct ExecutedTask {
    pub tool: String,
    pub layer_index: usize,
    /// Ordered tool ids invoked inside this task if it was a
    /// `code_execution` task whose trace fused multiple sub-operations;
    /// empty otherwise.
    pub sub_trace: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct Graph {
    graph: DiGraph<String, ToolEdge>,
    node_map: HashMap<String, NodeIndex>,
    dirty: bool,
}

impl Graph {
    pub fn new() -> Self {
        Self { graph: DiGraph::new(), node_map: HashMap::new(), dirty: true }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn tool_ids(&self) -> Vec<String> {
        self.node_map.keys().cloned().collect()
    }

    pub fn contains_tool(&self, tool: &str) -> bool {
        self.node_map.contains_key(tool)
    }

    pub fn edge(&self, source_tool: &str, target_tool: &str) -> Option<&ToolEdge> {
        let (s, t) = (*self.node_map.get(source_tool)?, *self.node_map.get(target_tool)?);
        self.graph.find_edge(s, t).map(|e| &self.graph[e])
    }

    /// Mark the graph dirty so PageRank/Louvain/hierarchy caches are
    /// recomputed on next read instead of reusing stale results.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn ensure_node(&mut self, tool: &str) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(tool) {
            return idx;
        }
        let idx = self.graph.add_node(tool.to_string());
        self.node_map.insert(tool.to_string(), idx);
        idx
    }

    /// Records or reinforces one directed edge, promoting
    /// inferred -> observed as counts accumulate.
    pub fn record_edge(&mut self, source_tool: &str, target_tool: &str, edge_type: EdgeType, source: EdgeSource) {
        let s = self.ensure_node(source_tool);
        let t = self.ensure_node(target_tool);
        if let Some(edge_idx) = self.graph.find_edge(s, t) {
            self.graph[edge_idx].bump();
        } else {
            self.graph.add_edge(s, t, ToolEdge::new(edge_type, source));
        }
        self.dirty = true;
    }

    /// Folds a completed workflow's tool call graph into edge counts:
    /// dependency edges from the DAG's `depends_on` wiring
    /// (passed as `ExecutedEdge`s by the caller), layer fan-out/fan-in
    /// sequence edges between consecutive layers, and sequence edges
    /// between consecutive sub-calls inside a fused `code_execution`
    /// trace.
    pub fn record_dag_execution(&mut self, dependency_edges: &[ExecutedEdge], tasks: &[ExecutedTask]) {
        for edge in dependency_edges {
            self.record_edge(&edge.source_tool, &edge.target_tool, edge.edge_type, edge.source);
        }

        let max_layer = tasks.iter().map(|t| t.layer_index).max().unwrap_or(0);
        for layer in 0..max_layer {
            let this_layer: Vec<&str> = tasks.iter().filter(|t| t.layer_index == layer).map(|t| t.tool.as_str()).collect();
            let next_layer: Vec<&str> = tasks.iter().filter(|t| t.layer_index == layer + 1).map(|t| t.tool.as_str()).collect();
            for &a in &this_layer {
                for &b in &next_layer {
                    self.record_edge(a, b, EdgeType::Sequence, EdgeSource::Inferred);
                }
            }
        }

        for task in tasks {
            for pair in task.sub_trace.windows(2) {
                self.record_edge(&pair[0], &pair[1], EdgeType::Sequence, EdgeSource::Observed);
            }
        }
    }

    pub fn neighbors_out(&self, tool: &str) -> Vec<(String, &ToolEdge)> {
        let Some(&idx) = self.node_map.get(tool) else { return Vec::new() };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (self.graph[e.target()].clone(), e.weight()))
            .collect()
    }

    pub fn neighbors_in(&self, tool: &str) -> Vec<(String, &ToolEdge)> {
        let Some(&idx) = self.node_map.get(tool) else { return Vec::new() };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (self.graph[e.source()].clone(), e.weight()))
            .collect()
    }

    /// Undirected neighbor set used by Adamic-Adar and Louvain, which
    /// both reason about shared-neighbor structure rather than direction.
    pub fn undirected_neighbors(&self, tool: &str) -> Vec<String> {
        let mut seen: Vec<String> = self.neighbors_out(tool).into_iter().map(|(n, _)| n).collect();
        for (n, _) in self.neighbors_in(tool) {
            if !seen.contains(&n) {
                seen.push(n);
            }
        }
        seen
    }

    pub fn degree(&self, tool: &str) -> usize {
        self.undirected_neighbors(tool).len()
    }

    pub(crate) fn inner(&self) -> &DiGraph<String, ToolEdge> {
        &self.graph
    }

    /// Thin read-only export for debugging: Graphviz DOT source with
    /// edge labels `type/weight`.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph tools {\n");
        for edge in self.graph.edge_references() {
            let source = &self.graph[edge.source()];
            let target = &self.graph[edge.target()];
            let w = edge.weight();
            out.push_str(&format!(
                "  \"{source}\" -> \"{target}\" [label=\"{:?}/{:.2}\"];\n",
                w.edge_type, w.weight
            ));
        }
        out.push('}');
        out
    }
}
