//! The GraphRAG learning core (C5): a weighted directed multigraph over
//! tools, a capability hypergraph, graph algorithms (PageRank, Louvain,
//! bidirectional Dijkstra, Adamic-Adar, hybrid search), and the SHGAT
//! attention scorer trained online from execution outcomes.
//!
//! Fed by `dagctl-core` after each workflow completes; otherwise
//! independent. The [`store::GraphRagStore`] gives
//! callers a single-writer, many-reader view so the scheduler's
//! post-execution learning step never blocks concurrent reads from
//! hybrid search or the scorer.

pub mod advisor;
pub mod algorithms;
pub mod error;
pub mod graph;
pub mod hypergraph;
pub mod search;
pub mod shgat;
pub mod store;
pub mod visualization;

pub use advisor::{AdvisorMode, RiskCategory, ThresholdAdvisor};
pub use algorithms::{adamic_adar_one_vs_context, adamic_adar_pairwise, adaptive_alpha, bidirectional_dijkstra, density, hybrid_score, louvain, pagerank, reliability_factor};
pub use error::{GraphRagError, Result};
pub use graph::{EdgeSource, EdgeType, ExecutedEdge, ExecutedTask, Graph, ToolEdge};
pub use hypergraph::{Capability, Hypergraph};
pub use search::{hybrid_node_search, LocalAlphaCalculator, SearchHit};
pub use shgat::{HierarchyLevelEmbedding, ShgatParams};
pub use store::{GraphRagSnapshot, GraphRagStore};
