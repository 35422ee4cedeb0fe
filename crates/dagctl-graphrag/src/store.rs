//! Process-wide GraphRAG state behind a single-writer, many-reader,
//! copy-on-write snapshot: readers must never observe a torn write.
//! The post-execution learning step is the sole writer; hybrid search
//! and the SHGAT scorer read a cheaply-cloned `Arc` snapshot that is
//! immutable once published.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::algorithms::{self, louvain, pagerank};
use crate::graph::{ExecutedEdge, ExecutedTask, Graph};
use crate::hypergraph::Hypergraph;
use crate::shgat::ShgatParams;

#[derive(Debug, Clone)]
pub struct GraphRagSnapshot {
    pub graph: Arc<Graph>,
    pub hypergraph: Arc<Hypergraph>,
    pub shgat: Arc<ShgatParams>,
    pub pagerank_scores: Arc<HashMap<String, f64>>,
    pub communities: Arc<HashMap<String, usize>>,
}

pub struct GraphRagStore {
    state: RwLock<Arc<GraphRagSnapshot>>,
}

impl GraphRagStore {
    pub fn new(mut graph: Graph, hypergraph: Hypergraph, shgat: ShgatParams) -> Self {
        let pagerank_scores = pagerank(&graph, 0.85, 1e-4, 100);
        let communities = louvain(&graph, 1.0);
        graph.mark_clean();
        let snapshot = GraphRagSnapshot {
            graph: Arc::new(graph),
            hypergraph: Arc::new(hypergraph),
            shgat: Arc::new(shgat),
            pagerank_scores: Arc::new(pagerank_scores),
            communities: Arc::new(communities),
        };
        Self { state: RwLock::new(Arc::new(snapshot)) }
    }

    /// Cheap `Arc` clone; the returned snapshot is immutable and never
    /// mutated in place, so concurrent reads during a write always see
    /// either the old or the new snapshot in full, never a mix.
    pub fn snapshot(&self) -> Arc<GraphRagSnapshot> {
        self.state.read().clone()
    }

    /// Folds one completed workflow's execution into the graph, then
    /// recomputes PageRank/Louvain if the graph was mutated, caching the
    /// result until the next mutation, and publishes a new snapshot
    /// atomically.
    pub fn record_execution(&self, dependency_edges: &[ExecutedEdge], tasks: &[ExecutedTask]) {
        let previous = self.snapshot();
        let mut graph = (*previous.graph).clone();
        graph.record_dag_execution(dependency_edges, tasks);

        let (pagerank_scores, communities) = if graph.is_dirty() {
            tracing::debug!(node_count = graph.node_count(), "recomputing pagerank and louvain communities");
            let scores = pagerank(&graph, 0.85, 1e-4, 100);
            let communities = louvain(&graph, 1.0);
            graph.mark_clean();
            (scores, communities)
        } else {
            ((*previous.pagerank_scores).clone(), (*previous.communities).clone())
        };

        let next = GraphRagSnapshot {
            graph: Arc::new(graph),
            hypergraph: previous.hypergraph.clone(),
            shgat: previous.shgat.clone(),
            pagerank_scores: Arc::new(pagerank_scores),
            communities: Arc::new(communities),
        };
        *self.state.write() = Arc::new(next);
    }

    /// Publishes a freshly trained `ShgatParams` (the only field the
    /// online training step mutates), leaving graph/hypergraph/caches
    /// untouched.
    pub fn publish_shgat(&self, shgat: ShgatParams) {
        let previous = self.snapshot();
        let next = GraphRagSnapshot {
            graph: previous.graph.clone(),
            hypergraph: previous.hypergraph.clone(),
            shgat: Arc::new(shgat),
            pagerank_scores: previous.pagerank_scores.clone(),
            communities: previous.communities.clone(),
        };
        *self.state.write() = Arc::new(next);
    }

    /// Density of the current graph snapshot, used by adaptive-alpha
    /// hybrid search.
    pub fn density(&self) -> f64 {
        algorithms::density(&self.snapshot().graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeSource, EdgeType};

    #[test]
    fn record_execution_publishes_a_new_snapshot() {
        let store = GraphRagStore::new(Graph::new(), Hypergraph::new(), ShgatParams::new(4, 2, 4, 1));
        let before = store.snapshot();
        store.record_execution(
            &[ExecutedEdge { source_tool: "a".into(), target_tool: "b".into(), edge_type: EdgeType::Dependency, source: EdgeSource::Observed }],
            &[],
        );
        let after = store.snapshot();
        assert!(!Arc::ptr_eq(&before.graph, &after.graph));
        assert!(after.graph.contains_tool("a"));
    }

    #[test]
    fn reader_holding_old_snapshot_is_unaffected_by_a_concurrent_write() {
        let store = GraphRagStore::new(Graph::new(), Hypergraph::new(), ShgatParams::new(4, 2, 4, 1));
        let before = store.snapshot();
        store.record_execution(
            &[ExecutedEdge { source_tool: "x".into(), target_tool: "y".into(), edge_type: EdgeType::Sequence, source: EdgeSource::Inferred }],
            &[],
        );
        assert!(!before.graph.contains_tool("x"));
    }
}
