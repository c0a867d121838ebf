//! Hierarchical community tree
//!
//! Level 0 holds the single root community covering every node; each deeper
//! level partitions its parents further. At every level the communities that
//! exist there, together with the unsplit communities above, cover the graph
//! exactly once.

use crate::graph::NodeId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Position of a community in the tree: `level/index`, both zero-padded to
/// five digits in the display form (e.g. `00002/00014`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommunityId {
    pub level: u32,
    pub index: u32,
}

impl CommunityId {
    pub fn new(level: u32, index: u32) -> Self {
        CommunityId { level, index }
    }

    pub fn root() -> Self {
        CommunityId { level: 0, index: 0 }
    }
}

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}/{:05}", self.level, self.index)
    }
}

/// One community: a set of entity nodes plus its position in the hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,
    pub parent: Option<CommunityId>,
    pub members: BTreeSet<NodeId>,
    pub children: BTreeSet<CommunityId>,
}

impl Community {
    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }
}

/// The full hierarchy produced by community detection.
#[derive(Debug, Clone, Default)]
pub struct CommunityTree {
    communities: IndexMap<CommunityId, Community>,
    max_level: u32,
    seed: u64,
}

impl CommunityTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty tree that records the clustering seed it will be built with.
    pub fn with_seed(seed: u64) -> Self {
        CommunityTree {
            seed,
            ..Self::default()
        }
    }

    /// The base seed the clustering ran with, kept for reproducibility.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Create the root community over `members`. Must be called before any
    /// `insert_child`.
    pub fn insert_root(&mut self, members: BTreeSet<NodeId>) -> CommunityId {
        let id = CommunityId::root();
        self.communities.insert(
            id,
            Community {
                id,
                parent: None,
                members,
                children: BTreeSet::new(),
            },
        );
        id
    }

    /// Attach a child community under `parent`.
    pub fn insert_child(
        &mut self,
        parent: CommunityId,
        id: CommunityId,
        members: BTreeSet<NodeId>,
    ) {
        if let Some(p) = self.communities.get_mut(&parent) {
            p.children.insert(id);
        }
        self.max_level = self.max_level.max(id.level);
        self.communities.insert(
            id,
            Community {
                id,
                parent: Some(parent),
                members,
                children: BTreeSet::new(),
            },
        );
    }

    pub fn get(&self, id: &CommunityId) -> Option<&Community> {
        self.communities.get(id)
    }

    pub fn root(&self) -> Option<&Community> {
        self.communities.get(&CommunityId::root())
    }

    /// All communities in insertion order (root first, then level by level).
    pub fn communities(&self) -> impl Iterator<Item = &Community> {
        self.communities.values()
    }

    /// Communities sitting exactly at `level`.
    pub fn at_level(&self, level: u32) -> impl Iterator<Item = &Community> {
        self.communities.values().filter(move |c| c.id.level == level)
    }

    /// Deepest level present in the tree.
    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Clamp a requested depth to what the tree actually has.
    pub fn clamp_level(&self, requested: u32) -> u32 {
        requested.min(self.max_level)
    }

    pub fn len(&self) -> usize {
        self.communities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }

    /// Check that the children of every split community partition their
    /// parent exactly. Used by tests and debug assertions.
    pub fn verify_partition(&self) -> bool {
        for community in self.communities.values() {
            if community.children.is_empty() {
                continue;
            }
            let mut covered = BTreeSet::new();
            for child_id in &community.children {
                let Some(child) = self.communities.get(child_id) else {
                    return false;
                };
                for member in &child.members {
                    if !covered.insert(*member) {
                        return false;
                    }
                }
            }
            if covered != community.members {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(ids: &[u64]) -> BTreeSet<NodeId> {
        ids.iter().map(|&i| NodeId::new(i)).collect()
    }

    #[test]
    fn test_community_id_display() {
        assert_eq!(CommunityId::root().to_string(), "00000/00000");
        assert_eq!(CommunityId::new(2, 14).to_string(), "00002/00014");
    }

    #[test]
    fn test_tree_levels_and_clamping() {
        let mut tree = CommunityTree::new();
        let root = tree.insert_root(members(&[1, 2, 3, 4]));
        tree.insert_child(root, CommunityId::new(1, 0), members(&[1, 2]));
        tree.insert_child(root, CommunityId::new(1, 1), members(&[3, 4]));

        assert_eq!(tree.max_level(), 1);
        assert_eq!(tree.clamp_level(6), 1);
        assert_eq!(tree.clamp_level(0), 0);
        assert_eq!(tree.at_level(1).count(), 2);
        assert!(tree.verify_partition());
    }

    #[test]
    fn test_verify_partition_catches_gaps() {
        let mut tree = CommunityTree::new();
        let root = tree.insert_root(members(&[1, 2, 3]));
        // Child misses node 3
        tree.insert_child(root, CommunityId::new(1, 0), members(&[1, 2]));

        assert!(!tree.verify_partition());
    }

    #[test]
    fn test_verify_partition_catches_overlap() {
        let mut tree = CommunityTree::new();
        let root = tree.insert_root(members(&[1, 2, 3]));
        tree.insert_child(root, CommunityId::new(1, 0), members(&[1, 2]));
        tree.insert_child(root, CommunityId::new(1, 1), members(&[2, 3]));

        assert!(!tree.verify_partition());
    }
}
