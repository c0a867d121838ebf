//! Recursive community detection
//!
//! Splits the root community level by level until communities are small
//! enough, the depth cap is hit, or the partitioner stops finding structure.
//! Sibling partitions run in parallel; child ids are assigned afterwards in
//! parent order, so the tree is identical across runs.

use super::cluster::SeededLabelPropagation;
use super::tree::{CommunityId, CommunityTree};
use crate::graph::{KnowledgeGraph, NodeId};
use crate::services::ClusteringService;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub struct CommunityDetector {
    clusterer: Arc<dyn ClusteringService>,
    /// Communities at or below this size are not split further.
    min_size: usize,
    /// Maximum tree depth; level 0 is the root.
    max_depth: u32,
    base_seed: u64,
}

impl CommunityDetector {
    pub fn new(
        clusterer: Arc<dyn ClusteringService>,
        min_size: usize,
        max_depth: u32,
        base_seed: u64,
    ) -> Self {
        CommunityDetector {
            clusterer,
            min_size,
            max_depth,
            base_seed,
        }
    }

    pub fn with_defaults(min_size: usize, max_depth: u32, base_seed: u64) -> Self {
        Self::new(Arc::new(SeededLabelPropagation), min_size, max_depth, base_seed)
    }

    /// Per-community seed, derived from the community's position so that
    /// adding documents elsewhere in the graph does not reshuffle it.
    fn seed_for(&self, id: CommunityId) -> u64 {
        self.base_seed ^ ((u64::from(id.level) << 32) | u64::from(id.index))
    }

    /// Build the full community hierarchy for `graph`.
    pub fn detect(&self, graph: &KnowledgeGraph) -> CommunityTree {
        let mut tree = CommunityTree::with_seed(self.base_seed);
        let all: BTreeSet<NodeId> = graph.node_ids().collect();
        if all.is_empty() {
            return tree;
        }

        let root = tree.insert_root(all.clone());
        let mut frontier: Vec<(CommunityId, BTreeSet<NodeId>)> = vec![(root, all)];

        for level in 0..self.max_depth {
            let splittable: Vec<(CommunityId, BTreeSet<NodeId>)> = frontier
                .into_iter()
                .filter(|(_, members)| members.len() > self.min_size)
                .collect();
            if splittable.is_empty() {
                break;
            }

            // Partition every splittable community at this level in parallel.
            let partitions: Vec<(CommunityId, Vec<Vec<NodeId>>)> = splittable
                .par_iter()
                .map(|(id, members)| {
                    let view = graph.subgraph(members);
                    (*id, self.clusterer.cluster(&view, self.seed_for(*id)))
                })
                .collect();

            // Sequential id assignment keeps child indices deterministic.
            let mut next_index = 0u32;
            let mut next_frontier = Vec::new();
            for (parent, groups) in partitions {
                if groups.len() < 2 {
                    debug!("Community {} did not split, leaving terminal", parent);
                    continue;
                }
                for group in groups {
                    let id = CommunityId::new(level + 1, next_index);
                    next_index += 1;
                    let members: BTreeSet<NodeId> = group.into_iter().collect();
                    tree.insert_child(parent, id, members.clone());
                    next_frontier.push((id, members));
                }
            }

            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        debug_assert!(tree.verify_partition());
        tree
    }
}
