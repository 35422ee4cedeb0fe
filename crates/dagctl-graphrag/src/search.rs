//! Hybrid node search: ranks candidate tools by mixing embedding-space
//! semantic similarity with graph relatedness, adapting the mix weight
//! to graph density. The embedding provider itself is an external
//! collaborator out of scope here; this module only consumes
//! already-computed embeddings and the tool graph.

use std::collections::HashMap;

use crate::algorithms::{adamic_adar_one_vs_context, adaptive_alpha, density, hybrid_score};
use crate::graph::Graph;
use crate::hypergraph::Hypergraph;

fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a < 1e-12 || norm_b < 1e-12 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Per-node override for `alpha`, used when a caller has a
/// context-specific reason to weight semantic vs. graph signal
/// differently than the global density-derived default.
pub type LocalAlphaCalculator = dyn Fn(&str) -> Option<f64> + Send + Sync;

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub tool_id: String,
    pub score: f64,
    pub semantic: f64,
    pub graph_relatedness: f64,
}

/// Ranks `candidates` against `query_embedding` and `context` (already
/// executed or otherwise relevant tool ids), descending by hybrid score.
pub fn hybrid_node_search(
    graph: &Graph,
    hypergraph: &Hypergraph,
    candidates: &[String],
    query_embedding: &[f64],
    embeddings: &HashMap<String, Vec<f64>>,
    context: &[String],
    local_alpha: Option<&LocalAlphaCalculator>,
) -> Vec<SearchHit> {
    let graph_density = density(graph);

    let mut hits: Vec<SearchHit> = candidates
        .iter()
        .map(|tool_id| {
            let semantic = embeddings.get(tool_id).map(|e| cosine_similarity(query_embedding, e)).unwrap_or(0.0).max(0.0);
            let graph_relatedness = adamic_adar_one_vs_context(graph, tool_id, context);
            let alpha = adaptive_alpha(graph_density, local_alpha.and_then(|f| f(tool_id)));
            let success_rate = hypergraph.capabilities_for_tool(tool_id).iter().map(|c| c.success_rate).fold(None, |acc, r| {
                Some(acc.map_or(r, |a: f64| a.max(r)))
            }).unwrap_or(1.0);
            let score = hybrid_score(semantic, graph_relatedness, alpha, success_rate);
            SearchHit { tool_id: tool_id.clone(), score, semantic, graph_relatedness }
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeSource, EdgeType};

    #[test]
    fn closer_neighbor_to_context_ranks_above_unrelated_candidate() {
        let mut graph = Graph::new();
        graph.record_edge("ctx:op", "near:op", EdgeType::Sequence, EdgeSource::Observed);
        let hypergraph = Hypergraph::new();

        let embeddings = HashMap::new();
        let hits = hybrid_node_search(
            &graph,
            &hypergraph,
            &["near:op".to_string(), "far:op".to_string()],
            &[0.0, 0.0],
            &embeddings,
            &["ctx:op".to_string()],
            None,
        );

        assert_eq!(hits[0].tool_id, "near:op");
    }
}
