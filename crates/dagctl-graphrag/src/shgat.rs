//! SHGAT: a learned attention scorer over the capability hypergraph.
//! Typed parameter matrices are owned exclusively by the scoring
//! engine rather than shared mutable state, with dense linear algebra
//! following `data-designer-core`'s declared `ndarray` stack,
//! generalized here to hierarchy message-passing and multi-head
//! scoring.
//!
//! The transformer-semantic experimental variant is out of scope; this
//! is the preserve-dim, multi-head attention-over-hierarchy backend.

use std::collections::HashMap;

use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::hypergraph::Hypergraph;

/// A capability's embedding at some hierarchy level. Interpolated levels
/// (padding when `L_max` exceeds what the hierarchy actually produced)
/// are tagged distinctly so callers never mistake them for trained
/// embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HierarchyLevelEmbedding {
    Trained(Vec<f64>),
    Interpolated(Vec<f64>),
}

impl HierarchyLevelEmbedding {
    pub fn values(&self) -> &[f64] {
        match self {
            HierarchyLevelEmbedding::Trained(v) | HierarchyLevelEmbedding::Interpolated(v) => v,
        }
    }
}

#[derive(Debug, Clone)]
struct HeadLevelParams {
    w_child: Array2<f64>,
    w_parent: Array2<f64>,
    a_upward: Array1<f64>,
    a_downward: Array1<f64>,
}

#[derive(Debug, Clone)]
struct HeadScoreParams {
    w_q: Array2<f64>,
    w_k: Array2<f64>,
}

fn random_matrix(rows: usize, cols: usize) -> Array2<f64> {
    let mut rng = rand::thread_rng();
    let scale = (1.0 / (cols.max(1) as f64)).sqrt();
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-scale..scale))
}

fn random_vector(len: usize) -> Array1<f64> {
    let mut rng = rand::thread_rng();
    let scale = (1.0 / (len.max(1) as f64)).sqrt();
    Array1::from_shape_fn(len, |_| rng.gen_range(-scale..scale))
}

fn leaky_relu(x: f64) -> f64 {
    if x > 0.0 { x } else { 0.01 * x }
}

fn elu(x: f64) -> f64 {
    if x > 0.0 { x } else { x.exp() - 1.0 }
}

fn softmax(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum::<f64>().max(1e-12);
    exps.into_iter().map(|e| e / sum).collect()
}

/// Per-level, per-head, per-scoring-head parameter matrices. Owned
/// exclusively by the scorer; persisted as opaque blobs by the caller.
#[derive(Debug, Clone)]
pub struct ShgatParams {
    pub embedding_dim: usize,
    pub num_heads: usize,
    pub head_dim: usize,
    pub l_max: u32,
    pub preserve_dim: bool,
    /// Residual mix `r` for preserve-dim mode (default 0.3).
    pub residual_r: f64,
    levels: Vec<Vec<HeadLevelParams>>,
    score_heads: Vec<HeadScoreParams>,
    w_intent: Array2<f64>,
}

impl ShgatParams {
    pub fn new(embedding_dim: usize, num_heads: usize, head_dim: usize, l_max: u32) -> Self {
        let levels = (0..=l_max)
            .map(|level| {
                let input_dim = if level == 0 { embedding_dim } else { num_heads * head_dim };
                (0..num_heads)
                    .map(|_| HeadLevelParams {
                        w_child: random_matrix(head_dim, input_dim),
                        w_parent: random_matrix(head_dim, input_dim),
                        a_upward: random_vector(2 * head_dim),
                        a_downward: random_vector(2 * head_dim),
                    })
                    .collect()
            })
            .collect();

        let score_heads = (0..num_heads)
            .map(|_| HeadScoreParams { w_q: random_matrix(head_dim, embedding_dim), w_k: random_matrix(head_dim, embedding_dim) })
            .collect();

        Self {
            embedding_dim,
            num_heads,
            head_dim,
            l_max,
            preserve_dim: true,
            residual_r: 0.3,
            levels,
            score_heads,
            w_intent: random_matrix(embedding_dim, embedding_dim),
        }
    }

    /// Two-phase message passing across the hypergraph's hierarchy
    /// levels. `tool_embeddings` seeds level 0; the result maps every
    /// capability id to its propagated embedding at its own hierarchy
    /// level, with levels beyond what the hierarchy produced filled by
    /// linear interpolation between level 0 and the final trained level.
    pub fn propagate(&self, hypergraph: &Hypergraph, tool_embeddings: &HashMap<String, Array1<f64>>) -> HashMap<String, HierarchyLevelEmbedding> {
        let mut result: HashMap<String, HierarchyLevelEmbedding> = HashMap::new();
        if hypergraph.capability_ids().is_empty() {
            return result;
        }

        let max_level = hypergraph.max_hierarchy_level();
        let mut current: HashMap<String, Array1<f64>> = HashMap::new();

        for level in 0..=max_level {
            let caps_at_level: Vec<String> =
                hypergraph.capability_ids().into_iter().filter(|id| hypergraph.get(id).and_then(|c| c.hierarchy_level) == Some(level)).collect();

            for cap_id in &caps_at_level {
                let cap = hypergraph.get(cap_id).expect("capability listed by id exists");
                let child_embeddings: Vec<Array1<f64>> = cap
                    .child_tools
                    .iter()
                    .filter_map(|t| tool_embeddings.get(t).cloned())
                    .chain(cap.child_capabilities.iter().filter_map(|c| current.get(c).cloned()))
                    .collect();

                if child_embeddings.is_empty() {
                    continue;
                }

                let head_level = (level as usize).min(self.levels.len() - 1);
                let propagated = self.aggregate_upward(head_level, &child_embeddings);
                let final_embedding = if self.preserve_dim {
                    self.apply_preserve_dim(&propagated, &child_embeddings[0])
                } else {
                    propagated
                };
                current.insert(cap_id.clone(), final_embedding.clone());
                result.insert(cap_id.clone(), HierarchyLevelEmbedding::Trained(final_embedding.to_vec()));
            }
        }

        if self.l_max as usize > max_level as usize {
            self.interpolate_padding_levels(hypergraph, max_level, tool_embeddings, &mut result);
        }

        result
    }

    /// Downward phase (parent -> child), symmetric to [`Self::propagate`]
    /// but using `a_downward`. Refines each tool's
    /// embedding by attending over the capabilities it directly belongs
    /// to, rather than recomputing the hierarchy from scratch.
    pub fn propagate_downward(
        &self,
        hypergraph: &Hypergraph,
        tool_embeddings: &HashMap<String, Array1<f64>>,
        capability_embeddings: &HashMap<String, HierarchyLevelEmbedding>,
    ) -> HashMap<String, Array1<f64>> {
        let mut refined = HashMap::new();
        for (tool, embedding) in tool_embeddings {
            let parents: Vec<Array1<f64>> = hypergraph
                .capabilities_for_tool(tool)
                .into_iter()
                .filter_map(|cap| capability_embeddings.get(&cap.id))
                .map(|e| resize_to(&Array1::from_vec(e.values().to_vec()), self.head_dim * self.num_heads))
                .collect();
            if parents.is_empty() {
                continue;
            }

            let head_level = 0.min(self.levels.len() - 1);
            let heads = &self.levels[head_level];
            let mut per_head = Vec::with_capacity(heads.len());
            for head in heads {
                let child_proj = head.w_child.dot(embedding);
                let scores: Vec<f64> = parents
                    .iter()
                    .map(|p| {
                        let parent_proj = head.w_parent.dot(&resize_to(p, head.w_parent.shape()[1]));
                        let concat = concat_vectors(&child_proj, &parent_proj);
                        leaky_relu(concat.dot(&head.a_downward))
                    })
                    .collect();
                let weights = softmax(&scores);
                let mut aggregated = Array1::<f64>::zeros(self.head_dim);
                for (w, p) in weights.iter().zip(parents.iter()) {
                    let parent_proj = head.w_parent.dot(&resize_to(p, head.w_parent.shape()[1]));
                    aggregated += &(&parent_proj * *w);
                }
                per_head.push(aggregated.mapv(elu));
            }
            let propagated = concat_all(&per_head);
            refined.insert(tool.clone(), if self.preserve_dim { self.apply_preserve_dim(&propagated, embedding) } else { propagated });
        }
        refined
    }

    fn aggregate_upward(&self, head_level: usize, children: &[Array1<f64>]) -> Array1<f64> {
        let heads = &self.levels[head_level];
        let mut per_head_outputs = Vec::with_capacity(heads.len());

        for head in heads {
            let projected: Vec<Array1<f64>> = children.iter().map(|c| head.w_child.dot(c)).collect();
            // Parent representation seeded as the mean child projection
            // before attention reweights it (there is no prior parent
            // embedding on first pass).
            let parent_seed = mean_vector(&projected);
            let parent_proj = head.w_parent.dot(&parent_seed);

            let scores: Vec<f64> = projected
                .iter()
                .map(|c_proj| {
                    let concat = concat_vectors(c_proj, &parent_proj);
                    leaky_relu(concat.dot(&head.a_upward))
                })
                .collect();
            let weights = softmax(&scores);

            let mut aggregated = Array1::<f64>::zeros(self.head_dim);
            for (w, c_proj) in weights.iter().zip(projected.iter()) {
                aggregated += &(c_proj * *w);
            }
            per_head_outputs.push(aggregated.mapv(elu));
        }

        concat_all(&per_head_outputs)
    }

    fn apply_preserve_dim(&self, propagated: &Array1<f64>, original: &Array1<f64>) -> Array1<f64> {
        let r = self.residual_r;
        let resized_original = resize_to(original, propagated.len());
        let blended = propagated * (1.0 - r) + &resized_original * r;
        l2_normalize(&blended)
    }

    fn interpolate_padding_levels(
        &self,
        hypergraph: &Hypergraph,
        observed_max: u32,
        tool_embeddings: &HashMap<String, Array1<f64>>,
        result: &mut HashMap<String, HierarchyLevelEmbedding>,
    ) {
        for cap_id in hypergraph.capability_ids() {
            let Some(cap) = hypergraph.get(&cap_id) else { continue };
            if cap.hierarchy_level != Some(observed_max) {
                continue;
            }
            let Some(HierarchyLevelEmbedding::Trained(final_level)) = result.get(&cap_id).cloned() else { continue };

            // Level-0 anchor: the mean of the capability's direct tool
            // embeddings, or the zero vector for a pure-capability node
            // with no direct tool children.
            let dim = final_level.len();
            let anchor = level_zero_anchor(cap.child_tools.iter(), tool_embeddings, dim);

            for synthetic_level in (observed_max + 1)..=self.l_max {
                let t = (synthetic_level - observed_max) as f64 / (self.l_max - observed_max).max(1) as f64;
                let interpolated: Vec<f64> = final_level
                    .iter()
                    .zip(anchor.iter())
                    .map(|(trained, zero)| zero * (1.0 - t) + trained * t)
                    .collect();
                result.insert(format!("{cap_id}@L{synthetic_level}"), HierarchyLevelEmbedding::Interpolated(interpolated));
            }
        }
    }

    /// K-head scoring of `intent` against each candidate embedding.
    /// Missing candidate ids resolve to `None` rather than panicking; an
    /// empty candidate list returns an empty vector even on an empty
    /// graph.
    pub fn score(
        &self,
        intent: &Array1<f64>,
        candidate_ids: &[String],
        embeddings: &HashMap<String, Array1<f64>>,
        reliability: &HashMap<String, f64>,
        apply_sigmoid: bool,
    ) -> Vec<(String, Option<f64>)> {
        let projected_intent = if self.preserve_dim { intent.clone() } else { self.w_intent.dot(intent) };

        candidate_ids
            .iter()
            .map(|id| {
                let Some(embedding) = embeddings.get(id) else {
                    return (id.clone(), None);
                };
                let mut total = 0.0;
                for head in &self.score_heads {
                    let q = head.w_q.dot(&projected_intent);
                    let k = head.w_k.dot(embedding);
                    total += q.dot(&k) / (self.head_dim as f64).sqrt();
                }
                let mut logit = total / self.num_heads as f64;
                let r = reliability.get(id).copied().unwrap_or(1.0);
                logit *= r;
                if apply_sigmoid {
                    logit = 1.0 / (1.0 + (-logit).exp());
                }
                (id.clone(), Some(logit))
            })
            .collect()
    }

    /// One online training step. `positive`/`negatives` are candidate
    /// embeddings; contrastive InfoNCE is used when negatives are
    /// supplied, BCE fallback against `outcome` otherwise. Returns the
    /// gradient norm for diagnostics, or `None` if the batch was skipped
    /// due to NaN/Inf.
    pub fn train_step(
        &mut self,
        intent: &Array1<f64>,
        positive: &Array1<f64>,
        negatives: &[Array1<f64>],
        outcome: Option<bool>,
        importance_weight: f64,
        learning_rate: f64,
        l2_lambda: f64,
    ) -> Option<f64> {
        let temperature = 0.1;
        let projected_intent = if self.preserve_dim { intent.clone() } else { self.w_intent.dot(intent) };

        let mut grad_norm_sq = 0.0;
        for head_idx in 0..self.score_heads.len() {
            let head = &self.score_heads[head_idx];
            let q = head.w_q.dot(&projected_intent);
            let k_pos = head.w_k.dot(positive);
            let pos_score = q.dot(&k_pos) / temperature;

            let (loss_grad_on_q, dw_q, dw_k_pos, dw_k_negs) = if !negatives.is_empty() {
                let neg_ks: Vec<Array1<f64>> = negatives.iter().map(|n| head.w_k.dot(n)).collect();
                let neg_scores: Vec<f64> = neg_ks.iter().map(|k| q.dot(k) / temperature).collect();
                let mut all_scores = vec![pos_score];
                all_scores.extend(neg_scores.iter().cloned());
                let probs = softmax(&all_scores);

                // InfoNCE gradient w.r.t. q: sum_i (p_i - y_i) * k_i / temperature
                let mut dq = (&k_pos * (probs[0] - 1.0)) / temperature;
                for (p, k_neg) in probs[1..].iter().zip(neg_ks.iter()) {
                    dq += &((k_neg * *p) / temperature);
                }
                let dw_q = outer(&dq, &projected_intent);
                let dw_k_pos = outer(&(&q * (probs[0] - 1.0) / temperature), positive);
                let dw_k_negs: Vec<Array2<f64>> = probs[1..]
                    .iter()
                    .zip(negatives.iter())
                    .map(|(p, neg)| outer(&(&q * *p / temperature), neg))
                    .collect();
                (dq, dw_q, dw_k_pos, dw_k_negs)
            } else {
                let label = if outcome.unwrap_or(false) { 1.0 } else { 0.0 };
                let prob = 1.0 / (1.0 + (-pos_score).exp());
                let err = prob - label;
                let dq = &k_pos * (err / temperature);
                let dw_q = outer(&dq, &projected_intent);
                let dw_k_pos = outer(&(&q * (err / temperature)), positive);
                (dq, dw_q, dw_k_pos, Vec::new())
            };

            let _ = loss_grad_on_q;

            let head_mut = &mut self.score_heads[head_idx];
            if !is_finite_matrix(&dw_q) || !is_finite_matrix(&dw_k_pos) {
                return None;
            }
            apply_update(&mut head_mut.w_q, &dw_q, importance_weight, learning_rate, l2_lambda);
            apply_update(&mut head_mut.w_k, &dw_k_pos, importance_weight, learning_rate, l2_lambda);
            for dw_neg in &dw_k_negs {
                if !is_finite_matrix(dw_neg) {
                    return None;
                }
                apply_update(&mut head_mut.w_k, dw_neg, importance_weight, learning_rate, l2_lambda);
            }

            grad_norm_sq += frobenius_norm_sq(&dw_q) + frobenius_norm_sq(&dw_k_pos);
        }

        Some(grad_norm_sq.sqrt())
    }
}

fn apply_update(param: &mut Array2<f64>, grad: &Array2<f64>, importance_weight: f64, lr: f64, l2_lambda: f64) {
    let scaled_grad = grad * importance_weight;
    *param -= &(&scaled_grad * lr);
    *param *= 1.0 - lr * l2_lambda;
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((a.len(), b.len()));
    for i in 0..a.len() {
        for j in 0..b.len() {
            out[[i, j]] = a[i] * b[j];
        }
    }
    out
}

fn frobenius_norm_sq(m: &Array2<f64>) -> f64 {
    m.iter().map(|v| v * v).sum()
}

fn is_finite_matrix(m: &Array2<f64>) -> bool {
    m.iter().all(|v| v.is_finite())
}

fn mean_vector(vectors: &[Array1<f64>]) -> Array1<f64> {
    let len = vectors[0].len();
    let mut sum = Array1::<f64>::zeros(len);
    for v in vectors {
        sum += v;
    }
    sum / vectors.len() as f64
}

fn concat_vectors(a: &Array1<f64>, b: &Array1<f64>) -> Array1<f64> {
    let mut out = Array1::<f64>::zeros(a.len() + b.len());
    out.slice_mut(ndarray::s![..a.len()]).assign(a);
    out.slice_mut(ndarray::s![a.len()..]).assign(b);
    out
}

fn concat_all(vectors: &[Array1<f64>]) -> Array1<f64> {
    let total_len: usize = vectors.iter().map(|v| v.len()).sum();
    let mut out = Array1::<f64>::zeros(total_len);
    let mut offset = 0;
    for v in vectors {
        out.slice_mut(ndarray::s![offset..offset + v.len()]).assign(v);
        offset += v.len();
    }
    out
}

/// Mean of the given tools' level-0 embeddings, resized to `dim`, or
/// the zero vector if none of `tools` has one.
fn level_zero_anchor<'a>(tools: impl Iterator<Item = &'a String>, tool_embeddings: &HashMap<String, Array1<f64>>, dim: usize) -> Array1<f64> {
    let found: Vec<Array1<f64>> = tools.filter_map(|t| tool_embeddings.get(t)).map(|v| resize_to(v, dim)).collect();
    if found.is_empty() {
        return Array1::<f64>::zeros(dim);
    }
    let mut sum = Array1::<f64>::zeros(dim);
    for v in &found {
        sum += v;
    }
    sum / found.len() as f64
}

fn resize_to(v: &Array1<f64>, target_len: usize) -> Array1<f64> {
    if v.len() == target_len {
        return v.clone();
    }
    if v.len() > target_len {
        return v.slice(ndarray::s![..target_len]).to_owned();
    }
    let mut out = Array1::<f64>::zeros(target_len);
    out.slice_mut(ndarray::s![..v.len()]).assign(v);
    out
}

fn l2_normalize(v: &Array1<f64>) -> Array1<f64> {
    let norm = v.dot(v).sqrt();
    if norm < 1e-12 {
        return v.clone();
    }
    v / norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::{Capability, Hypergraph};

    #[test]
    fn score_returns_none_for_missing_candidate() {
        let params = ShgatParams::new(4, 2, 4, 1);
        let intent = Array1::from_vec(vec![0.1, 0.2, 0.3, 0.4]);
        let scores = params.score(&intent, &["missing".to_string()], &HashMap::new(), &HashMap::new(), false);
        assert_eq!(scores, vec![("missing".to_string(), None)]);
    }

    #[test]
    fn propagate_on_empty_hypergraph_returns_empty() {
        let params = ShgatParams::new(4, 2, 4, 1);
        let hg = Hypergraph::new();
        assert!(params.propagate(&hg, &HashMap::new()).is_empty());
    }

    #[test]
    fn train_step_returns_finite_gradient_norm() {
        let mut params = ShgatParams::new(4, 2, 4, 1);
        let intent = Array1::from_vec(vec![0.1, -0.2, 0.3, 0.05]);
        let positive = Array1::from_vec(vec![0.2, 0.1, -0.1, 0.3]);
        let negatives = vec![Array1::from_vec(vec![0.5, 0.5, 0.5, 0.5])];
        let norm = params.train_step(&intent, &positive, &negatives, None, 1.0, 0.01, 1e-4).unwrap();
        assert!(norm.is_finite());
    }

    #[test]
    fn propagate_tags_level_zero_as_trained() {
        let params = ShgatParams::new(4, 2, 4, 1);
        let mut hg = Hypergraph::new();
        let mut leaf = Capability::new("leaf");
        leaf.child_tools.push("a:op".into());
        hg.insert(leaf);
        hg.recompute_hierarchy().unwrap();

        let mut tools = HashMap::new();
        tools.insert("a:op".to_string(), Array1::from_vec(vec![0.1, 0.2, 0.3, 0.4]));

        let result = params.propagate(&hg, &tools);
        assert!(matches!(result.get("leaf"), Some(HierarchyLevelEmbedding::Trained(_))));
    }

    #[test]
    fn padding_levels_interpolate_toward_the_final_trained_level_instead_of_echoing_it() {
        let params = ShgatParams::new(4, 2, 4, 2);
        let mut hg = Hypergraph::new();
        let mut leaf = Capability::new("leaf");
        leaf.child_tools.push("a:op".into());
        hg.insert(leaf);
        hg.recompute_hierarchy().unwrap();

        let mut tools = HashMap::new();
        tools.insert("a:op".to_string(), Array1::from_vec(vec![0.1, 0.2, 0.3, 0.4]));

        let result = params.propagate(&hg, &tools);
        let Some(HierarchyLevelEmbedding::Trained(final_level)) = result.get("leaf") else {
            panic!("expected leaf to be trained at its own hierarchy level");
        };
        let Some(HierarchyLevelEmbedding::Interpolated(padded)) = result.get("leaf@L1") else {
            panic!("expected a padded embedding at leaf@L1");
        };

        assert_ne!(padded, final_level, "an intermediate padded level must differ from the final trained level");
    }
}
