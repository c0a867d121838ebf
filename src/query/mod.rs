//! Retrieval request and result types

pub mod engine;

use crate::graph::types::{ChunkId, DocumentId};
use crate::index::IndexError;
use crate::services::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use engine::{QueryDefaults, QueryEngine};

/// The four retrieval strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMethod {
    /// Flat similarity search over raw chunks.
    NaiveRag,
    /// Similarity search over community summaries at one level.
    NaiveGraphRag,
    /// Weighted source attribution: chunks ranked by summed summary weights.
    Garag,
    /// LLM-adjudicated partial answers ranked by confidence.
    GraphRag,
}

impl RetrievalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMethod::NaiveRag => "naiverag",
            RetrievalMethod::NaiveGraphRag => "naivegraphrag",
            RetrievalMethod::Garag => "garag",
            RetrievalMethod::GraphRag => "graphrag",
        }
    }
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrievalMethod {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "naiverag" => Ok(RetrievalMethod::NaiveRag),
            "naivegraphrag" => Ok(RetrievalMethod::NaiveGraphRag),
            "garag" => Ok(RetrievalMethod::Garag),
            "graphrag" => Ok(RetrievalMethod::GraphRag),
            other => Err(QueryError::InvalidRequest(format!(
                "Unknown retrieval method {:?}",
                other
            ))),
        }
    }
}

/// One retrieval call. Optional fields fall back to configured defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub method: RetrievalMethod,
    pub query_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_cutoff: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
}

impl RetrievalRequest {
    pub fn new(method: RetrievalMethod, query_text: impl Into<String>) -> Self {
        RetrievalRequest {
            method,
            query_text: query_text.into(),
            top_k: None,
            confidence_cutoff: None,
            depth: None,
        }
    }
}

/// Reference from a result back to an originating chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    pub chunk: ChunkId,
    pub document: DocumentId,
    pub ordinal: u32,
}

/// One ranked retrieval result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalItem {
    /// Chunk text, summary text, or partial answer depending on the method.
    pub text: String,
    /// Similarity, accumulated weight, or confidence depending on the method.
    pub score: f32,
    /// Summary label, when the result came from a community summary.
    pub label: Option<String>,
    /// Originating chunks, best evidence first.
    pub chunks: Vec<ChunkRef>,
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing_round_trip() {
        for method in [
            RetrievalMethod::NaiveRag,
            RetrievalMethod::NaiveGraphRag,
            RetrievalMethod::Garag,
            RetrievalMethod::GraphRag,
        ] {
            assert_eq!(method.as_str().parse::<RetrievalMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_unknown_method_is_client_error() {
        let err = "pagerank".parse::<RetrievalMethod>().unwrap_err();
        assert!(matches!(err, QueryError::InvalidRequest(_)));
    }
}
