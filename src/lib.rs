//! Ragraph
//!
//! A graph-based retrieval engine. Documents are chunked, an LLM extracts an
//! entity/relation graph from the chunks, the graph is clustered into a
//! hierarchical community tree, communities are summarized, and both chunks
//! and summaries land in vector indices. Four retrieval strategies resolve
//! queries against those indices, from flat chunk similarity to weighted
//! source attribution that ranks original chunks by the summed similarity of
//! every community summary citing them.
//!
//! # Example Usage
//!
//! ```rust
//! use ragraph::graph::{ChunkId, DocumentId, KnowledgeGraph, Provenance};
//!
//! let mut graph = KnowledgeGraph::new();
//! let doc = DocumentId::new("guide");
//! let sources = Provenance::single(ChunkId::new(&doc, 0));
//!
//! let paris = graph.upsert_entity("paris", "Paris", "Capital of France.", &sources);
//! let france = graph.upsert_entity("france", "France", "", &sources);
//! graph.upsert_relation(paris, france, "capital_of", &sources).unwrap();
//!
//! assert_eq!(graph.node_count(), 2);
//! assert_eq!(graph.edge_count(), 1);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod build;
pub mod chunk;
pub mod community;
pub mod config;
pub mod graph;
pub mod index;
pub mod pipeline;
pub mod query;
pub mod services;
pub mod summarize;

// Re-export main types for convenience
pub use build::{BuildReport, GraphBuilder};
pub use chunk::{Chunk, ChunkSet, Chunker, Document, ParagraphChunker};
pub use community::{Community, CommunityDetector, CommunityId, CommunityTree};
pub use config::{ConfigError, EngineConfig};
pub use graph::{
    ChunkId, DocumentId, EdgeId, EntityNode, GraphError, GraphResult, KnowledgeGraph, NodeId,
    Provenance, RelationEdge,
};
pub use index::{Indexer, MemoryVectorStore, VectorPayload, VectorRecord, VectorStore};
pub use pipeline::{IndexedCorpus, IndexingPipeline, PipelineError};
pub use query::{
    QueryDefaults, QueryEngine, QueryError, RetrievalItem, RetrievalMethod, RetrievalRequest,
};
pub use services::{ServiceError, ServiceResult};
pub use summarize::{CommunitySummary, Summarizer, SummaryReport};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.3.0");
    }
}
