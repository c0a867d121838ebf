//! Source-chunk provenance tracking
//!
//! Every entity and relation carries the set of chunks that contributed
//! evidence for it, with occurrence counts. Merges are additive unions, so
//! they commute: concurrent extraction workers can contribute in any order
//! and the result is identical.

use crate::graph::types::ChunkId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Occurrence-counted set of source chunks.
///
/// Counts only ever grow; there is no removal operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance(BTreeMap<ChunkId, u32>);

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provenance set containing a single chunk with count 1.
    pub fn single(chunk: ChunkId) -> Self {
        let mut map = BTreeMap::new();
        map.insert(chunk, 1);
        Provenance(map)
    }

    /// Record one more occurrence from `chunk`.
    pub fn record(&mut self, chunk: &ChunkId) {
        *self.0.entry(chunk.clone()).or_insert(0) += 1;
    }

    /// Additive union: counts from `other` are added onto `self`.
    pub fn merge(&mut self, other: &Provenance) {
        for (chunk, count) in &other.0 {
            *self.0.entry(chunk.clone()).or_insert(0) += count;
        }
    }

    /// Distinct chunks referenced, in sorted order.
    pub fn chunk_ids(&self) -> impl Iterator<Item = &ChunkId> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChunkId, u32)> {
        self.0.iter().map(|(c, n)| (c, *n))
    }

    pub fn contains(&self, chunk: &ChunkId) -> bool {
        self.0.contains_key(chunk)
    }

    /// Number of distinct chunks.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all occurrence counts.
    pub fn total(&self) -> u64 {
        self.0.values().map(|c| u64::from(*c)).sum()
    }
}
