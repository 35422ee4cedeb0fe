use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphRagError {
    #[error("unknown tool id: {0}")]
    UnknownTool(String),

    #[error("unknown capability id: {0}")]
    UnknownCapability(String),

    #[error("hypergraph cycle detected through capability {0}")]
    HierarchyCycle(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GraphRagError>;
