//! Retrieval strategy dispatch
//!
//! All four strategies share one entry point: validate the request, embed
//! the query once, then resolve against the vector indices. Results are
//! ranked, filtered by the cutoff, and always returned as a (possibly
//! empty) list.

use super::{ChunkRef, QueryError, QueryResult, RetrievalItem, RetrievalMethod, RetrievalRequest};
use crate::chunk::ChunkSet;
use crate::graph::types::ChunkId;
use crate::graph::Provenance;
use crate::index::{SearchHit, VectorPayload, VectorStore};
use crate::services::{with_retry, AnswerService, EmbeddingService, RetryPolicy, ServiceError};
use futures::stream::{self, StreamExt};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Fallback parameters for fields a request leaves unset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefaults {
    pub top_k: usize,
    /// Similarity cutoff for the three similarity-ranked methods, in (0, 1).
    pub confidence_cutoff: f32,
    /// Confidence cutoff for the adjudicated method, integer percent in (0, 100).
    pub adjudication_cutoff: f32,
    pub depth: u32,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        QueryDefaults {
            top_k: 10,
            confidence_cutoff: 0.04,
            adjudication_cutoff: 40.0,
            depth: 1,
        }
    }
}

pub struct QueryEngine {
    embedder: Arc<dyn EmbeddingService>,
    store: Arc<dyn VectorStore>,
    answerer: Arc<dyn AnswerService>,
    chunks: Arc<ChunkSet>,
    summary_index: String,
    chunk_index: String,
    /// Deepest community level present, used to clamp requested depths.
    max_level: u32,
    defaults: QueryDefaults,
    retry: RetryPolicy,
    parallel_limit: usize,
}

impl QueryEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        embedder: Arc<dyn EmbeddingService>,
        store: Arc<dyn VectorStore>,
        answerer: Arc<dyn AnswerService>,
        chunks: Arc<ChunkSet>,
        summary_index: impl Into<String>,
        chunk_index: impl Into<String>,
        max_level: u32,
        defaults: QueryDefaults,
        retry: RetryPolicy,
        parallel_limit: usize,
    ) -> Self {
        QueryEngine {
            embedder,
            store,
            answerer,
            chunks,
            summary_index: summary_index.into(),
            chunk_index: chunk_index.into(),
            max_level,
            defaults,
            retry,
            parallel_limit: parallel_limit.max(1),
        }
    }

    /// Resolve a request into ranked results.
    pub async fn retrieve(&self, request: &RetrievalRequest) -> QueryResult<Vec<RetrievalItem>> {
        let top_k = request.top_k.unwrap_or(self.defaults.top_k);
        if top_k == 0 {
            return Err(QueryError::InvalidRequest("top_k must be > 0".to_string()));
        }

        let cutoff = match request.method {
            RetrievalMethod::GraphRag => {
                let cutoff = request
                    .confidence_cutoff
                    .unwrap_or(self.defaults.adjudication_cutoff);
                if !(0.0..100.0).contains(&cutoff) || cutoff == 0.0 {
                    return Err(QueryError::InvalidRequest(format!(
                        "confidence_cutoff {} outside (0, 100)",
                        cutoff
                    )));
                }
                cutoff
            }
            _ => {
                let cutoff = request
                    .confidence_cutoff
                    .unwrap_or(self.defaults.confidence_cutoff);
                if !(0.0..1.0).contains(&cutoff) || cutoff == 0.0 {
                    return Err(QueryError::InvalidRequest(format!(
                        "confidence_cutoff {} outside (0, 1)",
                        cutoff
                    )));
                }
                cutoff
            }
        };

        // Deeper than the tree goes is clamped, not an error.
        let depth = request.depth.unwrap_or(self.defaults.depth).min(self.max_level);

        let query_vector = self.embed_query(&request.query_text).await?;
        debug!(
            "Retrieving method={} top_k={} cutoff={} depth={}",
            request.method, top_k, cutoff, depth
        );

        match request.method {
            RetrievalMethod::NaiveRag => self.flat(&query_vector, top_k, cutoff).await,
            RetrievalMethod::NaiveGraphRag => {
                self.summary_filtered(&query_vector, top_k, cutoff, depth).await
            }
            RetrievalMethod::Garag => self.weighted_sources(&query_vector, top_k, cutoff).await,
            RetrievalMethod::GraphRag => {
                self.adjudicated(&query_vector, &request.query_text, top_k, cutoff, depth)
                    .await
            }
        }
    }

    async fn embed_query(&self, text: &str) -> QueryResult<Vec<f32>> {
        let texts = vec![text.to_string()];
        let mut vectors =
            with_retry(self.retry, "query embedding", || self.embedder.embed(&texts)).await?;
        if vectors.is_empty() {
            return Err(QueryError::Service(ServiceError::Malformed(
                "embedding service returned no vector for the query".to_string(),
            )));
        }
        Ok(vectors.swap_remove(0))
    }

    /// Flat similarity search over raw chunks.
    async fn flat(
        &self,
        query: &[f32],
        top_k: usize,
        cutoff: f32,
    ) -> QueryResult<Vec<RetrievalItem>> {
        let hits = self.store.search(&self.chunk_index, query, top_k).await?;
        let items = hits
            .into_iter()
            .filter(|hit| hit.score >= cutoff)
            .filter_map(|hit| match hit.payload {
                VectorPayload::Chunk {
                    chunk,
                    document,
                    ordinal,
                    text,
                } => Some(RetrievalItem {
                    text,
                    score: hit.score,
                    label: None,
                    chunks: vec![ChunkRef {
                        chunk,
                        document,
                        ordinal,
                    }],
                }),
                VectorPayload::Summary { .. } => None,
            })
            .collect();
        Ok(items)
    }

    /// Summary similarity search restricted to one community level.
    async fn summary_filtered(
        &self,
        query: &[f32],
        top_k: usize,
        cutoff: f32,
        depth: u32,
    ) -> QueryResult<Vec<RetrievalItem>> {
        // The store has no level filter, so the window grows until enough
        // level-matching hits surface or the index is exhausted; otherwise
        // higher-scoring summaries at other levels could crowd out
        // qualifying results.
        let mut k = top_k.saturating_mul(4);
        loop {
            let hits = self.store.search(&self.summary_index, query, k).await?;
            let exhausted = hits.len() < k;
            let items: Vec<RetrievalItem> = hits
                .into_iter()
                .filter(|hit| hit.score >= cutoff)
                .filter_map(|hit| match hit.payload {
                    VectorPayload::Summary {
                        level,
                        label,
                        text,
                        sources,
                        ..
                    } if level == depth => Some(RetrievalItem {
                        text,
                        score: hit.score,
                        label: Some(label),
                        chunks: self.chunk_refs(&sources),
                    }),
                    _ => None,
                })
                .take(top_k)
                .collect();

            if items.len() >= top_k || exhausted {
                return Ok(items);
            }
            k = k.saturating_mul(2);
        }
    }

    /// Weighted source attribution: every qualifying summary adds its
    /// similarity once to each distinct chunk it cites; chunks are then
    /// ranked by accumulated weight.
    async fn weighted_sources(
        &self,
        query: &[f32],
        top_k: usize,
        cutoff: f32,
    ) -> QueryResult<Vec<RetrievalItem>> {
        let hits = self
            .store
            .search(&self.summary_index, query, top_k * 2)
            .await?;

        let mut weights: FxHashMap<ChunkId, f32> = FxHashMap::default();
        for hit in hits {
            if hit.score < cutoff {
                continue;
            }
            if let VectorPayload::Summary { sources, .. } = hit.payload {
                for chunk in sources.chunk_ids() {
                    *weights.entry(chunk.clone()).or_insert(0.0) += hit.score;
                }
            }
        }

        let mut scored: Vec<(ChunkRef, f32, String)> = weights
            .into_iter()
            .filter_map(|(chunk_id, weight)| {
                let Some(chunk) = self.chunks.get(&chunk_id) else {
                    warn!("Cited chunk {} is not in the corpus", chunk_id);
                    return None;
                };
                Some((
                    ChunkRef {
                        chunk: chunk.id.clone(),
                        document: chunk.document_id.clone(),
                        ordinal: chunk.ordinal,
                    },
                    weight,
                    chunk.text.clone(),
                ))
            })
            .collect();

        // Heaviest first; equal weights resolve by (document, ordinal).
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (&a.0.document, a.0.ordinal).cmp(&(&b.0.document, b.0.ordinal)))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(chunk_ref, weight, text)| RetrievalItem {
                text,
                score: weight,
                label: None,
                chunks: vec![chunk_ref],
            })
            .collect())
    }

    /// LLM-adjudicated retrieval: candidate summaries up to `depth` are
    /// handed to the answer service and ranked by its confidence.
    async fn adjudicated(
        &self,
        query_vector: &[f32],
        query_text: &str,
        top_k: usize,
        cutoff: f32,
        depth: u32,
    ) -> QueryResult<Vec<RetrievalItem>> {
        let hits = self
            .store
            .search(&self.summary_index, query_vector, top_k * 2)
            .await?;
        let candidates: Vec<SearchHit> = hits
            .into_iter()
            .filter(|hit| matches!(&hit.payload, VectorPayload::Summary { level, .. } if *level <= depth))
            .collect();

        let answers: Vec<(usize, SearchHit, _)> = stream::iter(candidates.into_iter().enumerate())
            .map(|(rank, hit)| {
                let answerer = Arc::clone(&self.answerer);
                let retry = self.retry;
                let query = query_text.to_string();
                let summary = hit.payload.text().to_string();
                async move {
                    let result = with_retry(retry, "answer adjudication", || {
                        answerer.answer(&summary, &query)
                    })
                    .await;
                    (rank, hit, result)
                }
            })
            .buffer_unordered(self.parallel_limit)
            .collect()
            .await;

        let mut items: Vec<(usize, u32, RetrievalItem)> = Vec::new();
        for (rank, hit, result) in answers {
            match result {
                Ok(answer) if (answer.confidence as f32) >= cutoff => {
                    if let VectorPayload::Summary { label, sources, .. } = hit.payload {
                        items.push((
                            rank,
                            answer.confidence,
                            RetrievalItem {
                                text: answer.information,
                                score: answer.confidence as f32,
                                label: Some(label),
                                chunks: self.chunk_refs(&sources),
                            },
                        ));
                    }
                }
                Ok(_) => {}
                Err(err @ ServiceError::Unavailable(_)) => return Err(err.into()),
                Err(err) => {
                    // One failed candidate does not sink the query.
                    warn!("Dropping candidate {} after retries: {}", hit.id, err);
                }
            }
        }

        // Confidence descending; equal confidences keep similarity order.
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        items.truncate(top_k);
        Ok(items.into_iter().map(|(_, _, item)| item).collect())
    }

    /// Resolve provenance into chunk references, dropping chunks the corpus
    /// no longer has.
    fn chunk_refs(&self, sources: &Provenance) -> Vec<ChunkRef> {
        sources
            .chunk_ids()
            .filter_map(|id| self.chunks.get(id))
            .map(|chunk| ChunkRef {
                chunk: chunk.id.clone(),
                document: chunk.document_id.clone(),
                ordinal: chunk.ordinal,
            })
            .collect()
    }
}
