//! Graph algorithms over [`Graph`]: weighted PageRank, Louvain community
//! detection, bidirectional Dijkstra, Adamic-Adar similarity, and the
//! hybrid semantic/graph search combinator.

use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::graph::Graph;

/// `scores: tool_id -> [0,1]`, weighted power iteration to convergence
/// tolerance `1e-4`.
pub fn pagerank(graph: &Graph, damping: f64, tolerance: f64, max_iterations: usize) -> HashMap<String, f64> {
    let nodes = graph.tool_ids();
    let n = nodes.len();
    if n == 0 {
        return HashMap::new();
    }

    let mut scores: HashMap<String, f64> = nodes.iter().map(|id| (id.clone(), 1.0 / n as f64)).collect();
    let out_weight_sum: HashMap<String, f64> =
        nodes.iter().map(|id| (id.clone(), graph.neighbors_out(id).iter().map(|(_, e)| e.weight.max(1e-6)).sum())).collect();

    for _ in 0..max_iterations {
        let mut next: HashMap<String, f64> = nodes.iter().map(|id| (id.clone(), (1.0 - damping) / n as f64)).collect();

        for id in &nodes {
            let out_edges = graph.neighbors_out(id);
            let total_out = out_weight_sum.get(id).copied().unwrap_or(0.0);
            if out_edges.is_empty() || total_out <= 0.0 {
                // Dangling node: redistribute its mass evenly (standard
                // PageRank fix for sinks).
                let share = damping * scores[id] / n as f64;
                for entry in next.values_mut() {
                    *entry += share;
                }
                continue;
            }
            let source_score = scores[id];
            for (target, edge) in out_edges {
                *next.get_mut(&target).unwrap() += damping * source_score * (edge.weight.max(1e-6) / total_out);
            }
        }

        let delta: f64 = nodes.iter().map(|id| (next[id] - scores[id]).abs()).sum();
        scores = next;
        if delta < tolerance {
            break;
        }
    }

    // Normalize into [0,1] relative to the max score so downstream
    // consumers get a comparable scale regardless of graph size.
    let max_score = scores.values().cloned().fold(0.0_f64, f64::max).max(1e-9);
    for v in scores.values_mut() {
        *v /= max_score;
    }
    scores
}

/// Modularity-maximizing community labels via a single-pass greedy
/// Louvain aggregation at resolution 1.0 by default. This is the
/// local-moving phase without graph coarsening/recursion, sufficient
/// for the tool graph's scale.
pub fn louvain(graph: &Graph, resolution: f64) -> HashMap<String, usize> {
    let nodes = graph.tool_ids();
    let n = nodes.len();
    if n == 0 {
        return HashMap::new();
    }

    let mut community: HashMap<String, usize> = nodes.iter().enumerate().map(|(i, id)| (id.clone(), i)).collect();
    let total_weight: f64 = nodes.iter().map(|id| graph.neighbors_out(id).iter().map(|(_, e)| e.weight).sum::<f64>()).sum::<f64>().max(1e-9);

    let degree: HashMap<String, f64> = nodes
        .iter()
        .map(|id| (id.clone(), graph.neighbors_out(id).iter().map(|(_, e)| e.weight).sum::<f64>() + graph.neighbors_in(id).iter().map(|(_, e)| e.weight).sum::<f64>()))
        .collect();

    let mut improved = true;
    let mut passes = 0;
    while improved && passes < 20 {
        improved = false;
        passes += 1;
        for id in &nodes {
            let current_community = community[id];
            let mut neighbor_communities: HashSet<usize> = HashSet::new();
            for n_id in graph.undirected_neighbors(id) {
                neighbor_communities.insert(community[&n_id]);
            }
            neighbor_communities.insert(current_community);

            let mut best_community = current_community;
            let mut best_gain = 0.0_f64;
            for &candidate in &neighbor_communities {
                if candidate == current_community {
                    continue;
                }
                let gain = modularity_gain(graph, id, candidate, &community, &degree, total_weight, resolution);
                if gain > best_gain {
                    best_gain = gain;
                    best_community = candidate;
                }
            }
            if best_community != current_community {
                community.insert(id.clone(), best_community);
                improved = true;
            }
        }
    }

    // Relabel communities to a dense 0..k range for a stable, compact
    // result independent of node iteration order.
    let mut relabel: HashMap<usize, usize> = HashMap::new();
    for id in &nodes {
        let raw = community[id];
        let next_id = relabel.len();
        relabel.entry(raw).or_insert(next_id);
    }
    nodes.into_iter().map(|id| (id.clone(), relabel[&community[&id]])).collect()
}

fn modularity_gain(
    graph: &Graph,
    node: &str,
    target_community: usize,
    community: &HashMap<String, usize>,
    degree: &HashMap<String, f64>,
    total_weight: f64,
    resolution: f64,
) -> f64 {
    let k_i = degree.get(node).copied().unwrap_or(0.0);
    let sum_in: f64 = graph
        .undirected_neighbors(node)
        .iter()
        .filter(|n| community.get(*n) == Some(&target_community))
        .map(|n| graph.edge(node, n).map(|e| e.weight).unwrap_or_else(|| graph.edge(n, node).map(|e| e.weight).unwrap_or(0.0)))
        .sum();
    let sum_total: f64 = community.iter().filter(|(_, &c)| c == target_community).map(|(id, _)| degree.get(id).copied().unwrap_or(0.0)).sum();

    sum_in - resolution * (sum_total * k_i) / (2.0 * total_weight)
}

#[derive(PartialEq)]
struct HeapEntry {
    cost: f64,
    node: String,
}

impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse for a min-heap out of BinaryHeap's default max-heap.
        other.cost.partial_cmp(&self.cost).unwrap_or(std::cmp::Ordering::Equal)
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

fn edge_cost(weight: f64) -> f64 {
    1.0 / weight.max(0.1)
}

/// Bidirectional Dijkstra: expands alternately from
/// source and target using `1/max(weight, 0.1)` as edge cost so
/// stronger edges are cheaper to traverse. Returns the shortest path
/// and its total cost, or `None` if unreachable.
pub fn bidirectional_dijkstra(graph: &Graph, source: &str, target: &str) -> Option<(Vec<String>, f64)> {
    if source == target {
        return Some((vec![source.to_string()], 0.0));
    }
    if !graph.contains_tool(source) || !graph.contains_tool(target) {
        return None;
    }

    let mut dist_f: HashMap<String, f64> = HashMap::from([(source.to_string(), 0.0)]);
    let mut dist_b: HashMap<String, f64> = HashMap::from([(target.to_string(), 0.0)]);
    let mut prev_f: HashMap<String, String> = HashMap::new();
    let mut prev_b: HashMap<String, String> = HashMap::new();
    let mut visited_f: HashSet<String> = HashSet::new();
    let mut visited_b: HashSet<String> = HashSet::new();

    let mut heap_f = BinaryHeap::new();
    heap_f.push(HeapEntry { cost: 0.0, node: source.to_string() });
    let mut heap_b = BinaryHeap::new();
    heap_b.push(HeapEntry { cost: 0.0, node: target.to_string() });

    let mut best: Option<(f64, String)> = None;

    while !heap_f.is_empty() || !heap_b.is_empty() {
        if let Some(HeapEntry { cost, node }) = heap_f.pop() {
            if visited_f.insert(node.clone()) {
                if visited_b.contains(&node) {
                    let total = cost + dist_b[&node];
                    if best.as_ref().map_or(true, |(b, _)| total < *b) {
                        best = Some((total, node.clone()));
                    }
                }
                for (next, edge) in graph.neighbors_out(&node) {
                    let next_cost = cost + edge_cost(edge.weight);
                    if next_cost < *dist_f.get(&next).unwrap_or(&f64::INFINITY) {
                        dist_f.insert(next.clone(), next_cost);
                        prev_f.insert(next.clone(), node.clone());
                        heap_f.push(HeapEntry { cost: next_cost, node: next });
                    }
                }
            }
        }
        if let Some(HeapEntry { cost, node }) = heap_b.pop() {
            if visited_b.insert(node.clone()) {
                if visited_f.contains(&node) {
                    let total = cost + dist_f[&node];
                    if best.as_ref().map_or(true, |(b, _)| total < *b) {
                        best = Some((total, node.clone()));
                    }
                }
                for (prev, edge) in graph.neighbors_in(&node) {
                    let next_cost = cost + edge_cost(edge.weight);
                    if next_cost < *dist_b.get(&prev).unwrap_or(&f64::INFINITY) {
                        dist_b.insert(prev.clone(), next_cost);
                        prev_b.insert(prev.clone(), node.clone());
                        heap_b.push(HeapEntry { cost: next_cost, node: prev });
                    }
                }
            }
        }
        if let (Some(f_min), Some(b_min)) = (heap_f.peek(), heap_b.peek()) {
            if let Some((b, _)) = &best {
                if f_min.cost + b_min.cost >= *b {
                    break;
                }
            }
        }
    }

    let (total_cost, meet) = best?;
    let mut path = vec![meet.clone()];
    let mut cur = meet.clone();
    while let Some(p) = prev_f.get(&cur) {
        path.push(p.clone());
        cur = p.clone();
    }
    path.reverse();
    let mut cur = meet;
    while let Some(n) = prev_b.get(&cur) {
        path.push(n.clone());
        cur = n.clone();
    }
    Some((path, total_cost))
}

/// Pairwise Adamic-Adar similarity:
/// `AA(u,v) = sum over shared neighbors w of edge_weight / ln(deg(w))`,
/// skipping neighbors with `deg(w) <= 1`.
pub fn adamic_adar_pairwise(graph: &Graph, u: &str, v: &str) -> f64 {
    let neighbors_u: HashSet<String> = graph.undirected_neighbors(u).into_iter().collect();
    let neighbors_v: HashSet<String> = graph.undirected_neighbors(v).into_iter().collect();

    neighbors_u
        .intersection(&neighbors_v)
        .filter_map(|w| {
            let deg = graph.degree(w);
            if deg <= 1 {
                return None;
            }
            let weight_uw = graph.edge(u, w).or_else(|| graph.edge(w, u)).map(|e| e.weight).unwrap_or(0.0);
            let weight_vw = graph.edge(v, w).or_else(|| graph.edge(w, v)).map(|e| e.weight).unwrap_or(0.0);
            let weight = (weight_uw + weight_vw) / 2.0;
            Some(weight / (deg as f64).ln())
        })
        .sum()
}

/// One-vs-context Adamic-Adar: `1.0` if any context node is
/// a direct neighbor of `u`, else `min(max_pairwise_score / 2, 1)`.
pub fn adamic_adar_one_vs_context(graph: &Graph, u: &str, context: &[String]) -> f64 {
    let neighbors: HashSet<String> = graph.undirected_neighbors(u).into_iter().collect();
    if context.iter().any(|c| neighbors.contains(c)) {
        return 1.0;
    }
    let max_score = context.iter().map(|c| adamic_adar_pairwise(graph, u, c)).fold(0.0_f64, f64::max);
    (max_score / 2.0).min(1.0)
}

/// Reliability factor from a success rate.
pub fn reliability_factor(success_rate: f64) -> f64 {
    if success_rate < 0.5 {
        0.1
    } else if success_rate > 0.9 {
        1.2
    } else {
        1.0
    }
}

/// Adaptive mixing weight: `alpha = max(0.5, 1 - 2*density)`, unless a
/// per-node local-alpha override is supplied.
pub fn adaptive_alpha(density: f64, local_alpha: Option<f64>) -> f64 {
    local_alpha.unwrap_or_else(|| (1.0 - 2.0 * density).max(0.5))
}

/// Combines semantic similarity `s` and graph relatedness `g` into a
/// final hybrid score, capped at `0.95`.
pub fn hybrid_score(semantic: f64, graph_relatedness: f64, alpha: f64, success_rate: f64) -> f64 {
    let combined = alpha * semantic + (1.0 - alpha) * graph_relatedness;
    (combined * reliability_factor(success_rate)).min(0.95)
}

/// Graph density over the tool graph: `|E| / (|V| * (|V|-1))` for a
/// directed simple graph approximation (multi-edges collapsed by
/// counting distinct neighbor pairs).
pub fn density(graph: &Graph) -> f64 {
    let nodes = graph.tool_ids();
    let n = nodes.len();
    if n < 2 {
        return 0.0;
    }
    let edges: usize = nodes.iter().map(|id| graph.neighbors_out(id).len()).sum();
    edges as f64 / (n * (n - 1)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeSource, EdgeType};

    fn chain_graph() -> Graph {
        let mut g = Graph::new();
        g.record_edge("a", "b", EdgeType::Dependency, EdgeSource::Observed);
        g.record_edge("b", "c", EdgeType::Dependency, EdgeSource::Observed);
        g
    }

    #[test]
    fn pagerank_favors_sink_of_a_chain() {
        let g = chain_graph();
        let scores = pagerank(&g, 0.85, 1e-4, 100);
        assert!(scores["c"] >= scores["a"]);
    }

    #[test]
    fn dijkstra_finds_the_only_path() {
        let g = chain_graph();
        let (path, _) = bidirectional_dijkstra(&g, "a", "c").unwrap();
        assert_eq!(path, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn unreachable_pair_returns_none() {
        let mut g = chain_graph();
        g.record_edge("x", "y", EdgeType::Sequence, EdgeSource::Observed);
        assert!(bidirectional_dijkstra(&g, "a", "x").is_none());
    }

    #[test]
    fn reliability_bands_match_their_thresholds() {
        assert_eq!(reliability_factor(0.2), 0.1);
        assert_eq!(reliability_factor(0.95), 1.2);
        assert_eq!(reliability_factor(0.7), 1.0);
    }

    #[test]
    fn hybrid_score_is_capped() {
        let score = hybrid_score(1.0, 1.0, 0.5, 0.95);
        assert!(score <= 0.95);
    }

    #[test]
    fn adamic_adar_contribution_of_a_degree_two_neighbor_is_one_over_ln_two() {
        let mut g = Graph::new();
        g.record_edge("u", "w", EdgeType::Dependency, EdgeSource::Observed);
        g.record_edge("v", "w", EdgeType::Dependency, EdgeSource::Observed);

        let score = adamic_adar_pairwise(&g, "u", "v");
        assert!((score - 1.0 / 2.0_f64.ln()).abs() < 1e-9, "expected 1/ln(2), got {score}");
    }

    #[test]
    fn adamic_adar_is_symmetric() {
        let mut g = Graph::new();
        g.record_edge("u", "w", EdgeType::Dependency, EdgeSource::Observed);
        g.record_edge("v", "w", EdgeType::Sequence, EdgeSource::Inferred);
        g.record_edge("u", "x", EdgeType::Contains, EdgeSource::Template);
        g.record_edge("v", "x", EdgeType::Provides, EdgeSource::Observed);

        assert_eq!(adamic_adar_pairwise(&g, "u", "v"), adamic_adar_pairwise(&g, "v", "u"));
    }
}
