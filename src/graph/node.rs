//! Entity node of the knowledge graph

use crate::graph::provenance::Provenance;
use crate::graph::types::NodeId;
use serde::{Deserialize, Serialize};

/// An entity extracted from the corpus.
///
/// Nodes carry:
/// - A unique ID
/// - A human-readable label (the entity name as first extracted)
/// - An accumulated description
/// - The provenance of every chunk that mentioned the entity
///
/// A node is never deleted during a run; when extraction resolves a duplicate
/// entity, the duplicate is merged into the existing node instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityNode {
    /// Unique identifier for this node
    pub id: NodeId,

    /// Display label for the entity
    pub label: String,

    /// Accumulated description text
    pub description: String,

    /// Chunks contributing evidence for this entity
    pub sources: Provenance,
}

impl EntityNode {
    pub fn new(id: NodeId, label: impl Into<String>, description: impl Into<String>) -> Self {
        EntityNode {
            id,
            label: label.into(),
            description: description.into(),
            sources: Provenance::new(),
        }
    }

    /// Merge another sighting of the same entity into this node.
    ///
    /// Provenance is unioned; the description grows only when the new text
    /// adds something not already present, so merging the same extraction
    /// twice is a no-op apart from provenance counts.
    pub fn merge(&mut self, description: &str, sources: &Provenance) {
        let description = description.trim();
        if !description.is_empty() && !self.description.contains(description) {
            if self.description.is_empty() {
                self.description = description.to_string();
            } else {
                self.description.push(' ');
                self.description.push_str(description);
            }
        }
        self.sources.merge(sources);
    }
}

impl PartialEq for EntityNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityNode {}

impl std::hash::Hash for EntityNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
