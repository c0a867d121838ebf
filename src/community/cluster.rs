//! Seeded graph partitioning
//!
//! Two-stage split: disconnected components are separated first via
//! union-find; a connected subgraph is then partitioned with seeded
//! label propagation. Both stages are deterministic for a given seed.

use crate::graph::{NodeId, SubgraphView};
use crate::services::ClusteringService;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

const MAX_ITERATIONS: usize = 20;

/// Default partitioner: connected components, then label propagation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeededLabelPropagation;

impl SeededLabelPropagation {
    /// Union-find over the view's members.
    fn components(&self, view: &SubgraphView<'_>) -> Vec<Vec<NodeId>> {
        let nodes: Vec<NodeId> = view.members().collect();
        let index: FxHashMap<NodeId, usize> =
            nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let mut parent: Vec<usize> = (0..nodes.len()).collect();

        fn find(parent: &mut Vec<usize>, i: usize) -> usize {
            if parent[i] != i {
                let root = find(parent, parent[i]);
                parent[i] = root;
            }
            parent[i]
        }

        for (i, &node) in nodes.iter().enumerate() {
            for neighbor in view.neighbors(node) {
                if let Some(&j) = index.get(&neighbor) {
                    let ri = find(&mut parent, i);
                    let rj = find(&mut parent, j);
                    if ri != rj {
                        parent[ri] = rj;
                    }
                }
            }
        }

        // BTreeMap keys the groups by root, giving a stable first ordering;
        // normalize() below fixes the final order.
        let mut groups: BTreeMap<usize, Vec<NodeId>> = BTreeMap::new();
        for (i, &node) in nodes.iter().enumerate() {
            groups.entry(find(&mut parent, i)).or_default().push(node);
        }
        normalize(groups.into_values().collect())
    }

    /// Seeded label propagation on a connected subgraph.
    fn propagate(&self, view: &SubgraphView<'_>, seed: u64) -> Vec<Vec<NodeId>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<NodeId> = view.members().collect();
        let mut labels: FxHashMap<NodeId, NodeId> =
            order.iter().map(|&n| (n, n)).collect();

        for _ in 0..MAX_ITERATIONS {
            order.shuffle(&mut rng);
            let mut changed = false;

            for &node in &order {
                let mut counts: FxHashMap<NodeId, usize> = FxHashMap::default();
                for neighbor in view.neighbors(node) {
                    *counts.entry(labels[&neighbor]).or_insert(0) += 1;
                }
                if counts.is_empty() {
                    continue;
                }
                // Most frequent neighbor label; ties go to the smallest id
                // so the outcome does not depend on hash iteration order.
                let best = counts
                    .iter()
                    .map(|(&label, &count)| (count, std::cmp::Reverse(label)))
                    .max()
                    .map(|(_, std::cmp::Reverse(label))| label)
                    .unwrap_or(node);
                if labels[&node] != best {
                    labels.insert(node, best);
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        let mut groups: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for (node, label) in labels {
            groups.entry(label).or_default().push(node);
        }
        normalize(groups.into_values().collect())
    }
}

impl ClusteringService for SeededLabelPropagation {
    fn cluster(&self, view: &SubgraphView<'_>, seed: u64) -> Vec<Vec<NodeId>> {
        if view.is_empty() {
            return Vec::new();
        }
        let components = self.components(view);
        if components.len() > 1 {
            return components;
        }
        self.propagate(view, seed)
    }
}

/// Sort members within each group, then order groups by their smallest
/// member. Gives partitions a canonical form independent of how they were
/// produced.
fn normalize(mut groups: Vec<Vec<NodeId>>) -> Vec<Vec<NodeId>> {
    for group in &mut groups {
        group.sort();
    }
    groups.sort_by_key(|g| g.first().copied());
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{KnowledgeGraph, Provenance};
    use crate::graph::types::{ChunkId, DocumentId};
    use std::collections::BTreeSet;

    fn prov() -> Provenance {
        Provenance::single(ChunkId::new(&DocumentId::new("doc"), 0))
    }

    /// Two triangles joined by nothing.
    fn two_component_graph() -> (KnowledgeGraph, Vec<NodeId>) {
        let mut graph = KnowledgeGraph::new();
        let ids: Vec<NodeId> = (0..6)
            .map(|i| graph.upsert_entity(&format!("n{}", i), &format!("N{}", i), "", &prov()))
            .collect();
        for &(a, b) in &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)] {
            graph.upsert_relation(ids[a], ids[b], "r", &prov()).unwrap();
        }
        (graph, ids)
    }

    #[test]
    fn test_disconnected_components_split_first() {
        let (graph, ids) = two_component_graph();
        let members: BTreeSet<NodeId> = ids.iter().copied().collect();
        let view = graph.subgraph(&members);

        let groups = SeededLabelPropagation.cluster(&view, 17032025);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec![ids[0], ids[1], ids[2]]);
        assert_eq!(groups[1], vec![ids[3], ids[4], ids[5]]);
    }

    #[test]
    fn test_partition_covers_members_exactly() {
        let (graph, ids) = two_component_graph();
        let members: BTreeSet<NodeId> = ids.iter().copied().collect();
        let view = graph.subgraph(&members);

        let groups = SeededLabelPropagation.cluster(&view, 7);
        let mut seen: Vec<NodeId> = groups.into_iter().flatten().collect();
        seen.sort();

        assert_eq!(seen, ids);
    }

    #[test]
    fn test_same_seed_same_partition() {
        let mut graph = KnowledgeGraph::new();
        let ids: Vec<NodeId> = (0..12)
            .map(|i| graph.upsert_entity(&format!("n{}", i), &format!("N{}", i), "", &prov()))
            .collect();
        // Two dense clusters bridged by a single edge
        for i in 0..6 {
            for j in (i + 1)..6 {
                graph.upsert_relation(ids[i], ids[j], "r", &prov()).unwrap();
                graph
                    .upsert_relation(ids[i + 6], ids[j + 6], "r", &prov())
                    .unwrap();
            }
        }
        graph.upsert_relation(ids[5], ids[6], "r", &prov()).unwrap();

        let members: BTreeSet<NodeId> = ids.iter().copied().collect();
        let view = graph.subgraph(&members);

        let a = SeededLabelPropagation.cluster(&view, 17032025);
        let b = SeededLabelPropagation.cluster(&view, 17032025);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_view() {
        let graph = KnowledgeGraph::new();
        let members = BTreeSet::new();
        let view = graph.subgraph(&members);
        assert!(SeededLabelPropagation.cluster(&view, 1).is_empty());
    }
}
