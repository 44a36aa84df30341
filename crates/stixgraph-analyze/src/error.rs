//! Error types for the stixgraph-analyze crate.
//!
//! Only input and sink failures surface here. Unresolved relationship
//! endpoints and degenerate graphs are absorbed by the builder and scorers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Input error: {0}")]
    Input(#[from] stixgraph_core::CoreError),

    #[error("Graph store unavailable: {0}")]
    SinkUnavailable(#[from] stixgraph_graph::GraphError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzeError>;
