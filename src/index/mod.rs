//! Vector indexing of summaries and chunks
//!
//! Two named indices back retrieval: one over community summaries, one over
//! raw chunks. Record ids are derived from what they describe
//! (`community:<level/index>`, `chunk:<document:ordinal>`), so re-indexing
//! the same corpus overwrites records instead of accumulating duplicates.

pub mod memory;

use crate::chunk::ChunkSet;
use crate::community::CommunityId;
use crate::graph::types::{ChunkId, DocumentId};
use crate::graph::Provenance;
use crate::services::{with_retry, EmbeddingService, RetryPolicy, ServiceError};
use crate::summarize::CommunitySummary;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub use memory::MemoryVectorStore;

/// Batch size for embedding requests.
const EMBED_BATCH: usize = 64;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub type IndexResult<T> = Result<T, IndexError>;

/// What an indexed vector stands for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VectorPayload {
    Summary {
        community: CommunityId,
        level: u32,
        label: String,
        text: String,
        sources: Provenance,
    },
    Chunk {
        chunk: ChunkId,
        document: DocumentId,
        ordinal: u32,
        text: String,
    },
}

impl VectorPayload {
    pub fn text(&self) -> &str {
        match self {
            VectorPayload::Summary { text, .. } => text,
            VectorPayload::Chunk { text, .. } => text,
        }
    }
}

/// One stored vector with its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: VectorPayload,
}

/// One similarity search result. `score` is cosine similarity in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub payload: VectorPayload,
}

/// Storage backend for named vector indices.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite records by id.
    async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> IndexResult<()>;

    /// The `k` most similar records, best first.
    async fn search(&self, index: &str, query: &[f32], k: usize) -> IndexResult<Vec<SearchHit>>;
}

/// Embeds summaries and chunks and writes them to the store.
pub struct Indexer {
    embedder: Arc<dyn EmbeddingService>,
    store: Arc<dyn VectorStore>,
    summary_index: String,
    chunk_index: String,
    retry: RetryPolicy,
}

impl Indexer {
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        store: Arc<dyn VectorStore>,
        summary_index: impl Into<String>,
        chunk_index: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Indexer {
            embedder,
            store,
            summary_index: summary_index.into(),
            chunk_index: chunk_index.into(),
            retry,
        }
    }

    pub fn summary_index(&self) -> &str {
        &self.summary_index
    }

    pub fn chunk_index(&self) -> &str {
        &self.chunk_index
    }

    /// Embed and store every community summary.
    pub async fn index_summaries(
        &self,
        summaries: &IndexMap<CommunityId, CommunitySummary>,
    ) -> IndexResult<usize> {
        let entries: Vec<(String, VectorPayload)> = summaries
            .values()
            .map(|s| {
                (
                    format!("community:{}", s.community),
                    VectorPayload::Summary {
                        community: s.community,
                        level: s.community.level,
                        label: s.label.clone(),
                        text: s.text.clone(),
                        sources: s.sources.clone(),
                    },
                )
            })
            .collect();
        self.index_entries(&self.summary_index, entries).await
    }

    /// Embed and store every chunk.
    pub async fn index_chunks(&self, chunks: &ChunkSet) -> IndexResult<usize> {
        let entries: Vec<(String, VectorPayload)> = chunks
            .iter()
            .map(|c| {
                (
                    format!("chunk:{}", c.id),
                    VectorPayload::Chunk {
                        chunk: c.id.clone(),
                        document: c.document_id.clone(),
                        ordinal: c.ordinal,
                        text: c.text.clone(),
                    },
                )
            })
            .collect();
        self.index_entries(&self.chunk_index, entries).await
    }

    async fn index_entries(
        &self,
        index: &str,
        entries: Vec<(String, VectorPayload)>,
    ) -> IndexResult<usize> {
        let total = entries.len();
        for batch in entries.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch
                .iter()
                .map(|(_, payload)| payload.text().to_string())
                .collect();
            let vectors =
                with_retry(self.retry, "embedding", || self.embedder.embed(&texts)).await?;

            // The model's dimension is part of the index contract.
            let expected = self.embedder.dim();
            for vector in &vectors {
                if vector.len() != expected {
                    return Err(IndexError::DimensionMismatch {
                        expected,
                        got: vector.len(),
                    });
                }
            }

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(vectors)
                .map(|((id, payload), vector)| VectorRecord {
                    id: id.clone(),
                    vector,
                    payload: payload.clone(),
                })
                .collect();
            self.store.upsert(index, records).await?;
        }
        debug!("Indexed {} records into {}", total, index);
        Ok(total)
    }
}
