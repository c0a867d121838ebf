//! In-memory knowledge graph storage
//!
//! Holds the entity/relation graph produced by extraction. Entities are
//! keyed by the canonical label key computed by the active
//! [`EntityResolver`](crate::graph::resolve::EntityResolver); inserting a key
//! that already exists merges into the existing node (provenance union), so
//! the upsert operations commute.

use super::edge::RelationEdge;
use super::node::EntityNode;
use super::provenance::Provenance;
use super::types::{EdgeId, NodeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("Invalid edge: endpoint node {0} does not exist")]
    InvalidEndpoint(NodeId),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// In-memory knowledge graph
///
/// Lookup structures:
/// - `nodes`: NodeId -> EntityNode (ordered, for deterministic iteration)
/// - `edges`: EdgeId -> RelationEdge
/// - `key_index`: canonical key -> NodeId (entity deduplication)
/// - `triple_index`: (from, to, label) -> EdgeId (relation deduplication)
/// - `adjacency`: NodeId -> neighbor set, direction ignored (clustering view)
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    nodes: BTreeMap<NodeId, EntityNode>,
    edges: BTreeMap<EdgeId, RelationEdge>,
    key_index: HashMap<String, NodeId>,
    triple_index: HashMap<(NodeId, NodeId, String), EdgeId>,
    adjacency: HashMap<NodeId, BTreeSet<NodeId>>,
    next_node_id: u64,
    next_edge_id: u64,
}

impl KnowledgeGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        KnowledgeGraph {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            key_index: HashMap::new(),
            triple_index: HashMap::new(),
            adjacency: HashMap::new(),
            next_node_id: 1,
            next_edge_id: 1,
        }
    }

    /// Insert an entity sighting, merging into an existing node when the
    /// canonical key is already known. Returns the node id either way.
    pub fn upsert_entity(
        &mut self,
        key: &str,
        label: &str,
        description: &str,
        sources: &Provenance,
    ) -> NodeId {
        if let Some(&id) = self.key_index.get(key) {
            // merge() only grows description and provenance
            if let Some(node) = self.nodes.get_mut(&id) {
                node.merge(description, sources);
            }
            return id;
        }

        let id = NodeId::new(self.next_node_id);
        self.next_node_id += 1;

        let mut node = EntityNode::new(id, label, description.trim());
        node.sources.merge(sources);
        self.nodes.insert(id, node);
        self.key_index.insert(key.to_string(), id);
        self.adjacency.entry(id).or_default();
        id
    }

    /// Insert a relation sighting. A known `(from, to, label)` triple is
    /// reinforced (weight + provenance) instead of duplicated.
    pub fn upsert_relation(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: &str,
        sources: &Provenance,
    ) -> GraphResult<EdgeId> {
        if !self.nodes.contains_key(&from) {
            return Err(GraphError::InvalidEndpoint(from));
        }
        if !self.nodes.contains_key(&to) {
            return Err(GraphError::InvalidEndpoint(to));
        }

        let triple = (from, to, label.to_string());
        if let Some(&id) = self.triple_index.get(&triple) {
            if let Some(edge) = self.edges.get_mut(&id) {
                edge.reinforce(sources);
            }
            return Ok(id);
        }

        let id = EdgeId::new(self.next_edge_id);
        self.next_edge_id += 1;

        let mut edge = RelationEdge::new(id, from, to, label);
        edge.sources.merge(sources);
        self.edges.insert(id, edge);
        self.triple_index.insert(triple, id);
        self.adjacency.entry(from).or_default().insert(to);
        self.adjacency.entry(to).or_default().insert(from);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&EntityNode> {
        self.nodes.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&RelationEdge> {
        self.edges.get(&id)
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &EntityNode> {
        self.nodes.values()
    }

    /// All node ids in order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = &RelationEdge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Neighbors of `id`, ignoring edge direction.
    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency.get(&id).into_iter().flatten().copied()
    }

    /// A read-only view restricted to `members`, used when re-partitioning a
    /// single community.
    pub fn subgraph<'a>(&'a self, members: &'a BTreeSet<NodeId>) -> SubgraphView<'a> {
        SubgraphView {
            graph: self,
            members,
        }
    }
}

/// Induced subgraph over a member set; edges leaving the set are invisible.
#[derive(Clone, Copy)]
pub struct SubgraphView<'a> {
    graph: &'a KnowledgeGraph,
    members: &'a BTreeSet<NodeId>,
}

impl<'a> SubgraphView<'a> {
    pub fn members(&self) -> impl Iterator<Item = NodeId> + 'a {
        self.members.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    /// Neighbors of `id` that are inside the view.
    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + 'a {
        let members = self.members;
        self.graph
            .neighbors(id)
            .filter(move |n| members.contains(n))
    }
}
