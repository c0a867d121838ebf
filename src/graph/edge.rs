//! Relation edge of the knowledge graph

use crate::graph::provenance::Provenance;
use crate::graph::types::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};

/// A directed relation between two entities.
///
/// Re-extracting the same `(from, to, label)` triple does not create a second
/// edge; it increments `weight` and unions the provenance instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationEdge {
    /// Unique identifier for this edge
    pub id: EdgeId,

    /// Source node
    pub from: NodeId,

    /// Target node
    pub to: NodeId,

    /// Relation description, e.g. "is_capital_of"
    pub label: String,

    /// How often this relation was extracted
    pub weight: u32,

    /// Chunks contributing evidence for this relation
    pub sources: Provenance,
}

impl RelationEdge {
    pub fn new(id: EdgeId, from: NodeId, to: NodeId, label: impl Into<String>) -> Self {
        RelationEdge {
            id,
            from,
            to,
            label: label.into(),
            weight: 1,
            sources: Provenance::new(),
        }
    }

    /// Record another sighting of this relation.
    pub fn reinforce(&mut self, sources: &Provenance) {
        self.weight += 1;
        self.sources.merge(sources);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{ChunkId, DocumentId};

    #[test]
    fn test_reinforce() {
        let mut edge = RelationEdge::new(EdgeId::new(1), NodeId::new(1), NodeId::new(2), "knows");
        assert_eq!(edge.weight, 1);

        let chunk = ChunkId::new(&DocumentId::new("doc"), 0);
        edge.reinforce(&Provenance::single(chunk.clone()));
        edge.reinforce(&Provenance::single(chunk));

        assert_eq!(edge.weight, 3);
        assert_eq!(edge.sources.total(), 2);
    }
}
