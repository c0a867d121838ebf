//! In-process vector store with exact cosine search
//!
//! Scans every record of the index per query. Fine for the corpus sizes the
//! engine targets; the [`VectorStore`] trait is the seam for swapping in an
//! ANN-backed store.

use super::{IndexError, IndexResult, SearchHit, VectorRecord, VectorStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Thread-safe in-memory store of named indices.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    indices: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self, index: &str) -> usize {
        self.indices
            .read()
            .map(|g| g.get(index).map_or(0, |m| m.len()))
            .unwrap_or(0)
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, index: &str, records: Vec<VectorRecord>) -> IndexResult<()> {
        let mut guard = self
            .indices
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let map = guard.entry(index.to_string()).or_default();

        // All records in one index must share a dimension.
        let expected = map
            .values()
            .next()
            .map(|r| r.vector.len())
            .or_else(|| records.first().map(|r| r.vector.len()));
        if let Some(expected) = expected {
            for record in &records {
                if record.vector.len() != expected {
                    return Err(IndexError::DimensionMismatch {
                        expected,
                        got: record.vector.len(),
                    });
                }
            }
        }

        for record in records {
            map.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn search(&self, index: &str, query: &[f32], k: usize) -> IndexResult<Vec<SearchHit>> {
        let guard = self
            .indices
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(map) = guard.get(index) else {
            return Ok(Vec::new());
        };
        if k == 0 || map.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(record) = map.values().next() {
            if record.vector.len() != query.len() {
                return Err(IndexError::DimensionMismatch {
                    expected: record.vector.len(),
                    got: query.len(),
                });
            }
        }

        let mut hits: Vec<SearchHit> = map
            .values()
            .map(|record| SearchHit {
                id: record.id.clone(),
                score: cosine_similarity(query, &record.vector),
                payload: record.payload.clone(),
            })
            .collect();

        // Best first; equal scores fall back to id order so results are stable.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

/// Cosine similarity of two equal-length vectors. Zero vectors score 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
