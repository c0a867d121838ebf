//! Community summarization
//!
//! Walks the community tree deepest level first so that every interior
//! community can be summarized from its children's summaries instead of raw
//! member material. Provenance flows upward with the text: a summary's
//! sources are the union of what it was built from.

use crate::community::{Community, CommunityId, CommunityTree};
use crate::graph::KnowledgeGraph;
use crate::graph::Provenance;
use crate::services::{
    with_retry, RetryPolicy, ServiceError, ServiceResult, SummarizationService,
};
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Titled summary of one community, with the chunks it is grounded in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunitySummary {
    pub community: CommunityId,
    pub label: String,
    pub text: String,
    pub sources: Provenance,
}

/// Outcome of a summarization pass.
#[derive(Debug, Clone, Default)]
pub struct SummaryReport {
    pub summaries: IndexMap<CommunityId, CommunitySummary>,
    /// Communities whose summarization kept failing after retries.
    pub skipped: Vec<CommunityId>,
}

pub struct Summarizer {
    service: Arc<dyn SummarizationService>,
    retry: RetryPolicy,
    parallel_limit: usize,
    /// Input text is truncated to this many characters before the LLM call.
    max_input_chars: usize,
}

impl Summarizer {
    pub fn new(
        service: Arc<dyn SummarizationService>,
        retry: RetryPolicy,
        parallel_limit: usize,
        max_input_chars: usize,
    ) -> Self {
        Summarizer {
            service,
            retry,
            parallel_limit: parallel_limit.max(1),
            max_input_chars,
        }
    }

    /// Summarize every community in `tree`, deepest level first.
    pub async fn summarize_tree(
        &self,
        graph: &KnowledgeGraph,
        tree: &CommunityTree,
    ) -> ServiceResult<SummaryReport> {
        let mut report = SummaryReport::default();
        if tree.is_empty() {
            return Ok(report);
        }

        for level in (0..=tree.max_level()).rev() {
            let communities: Vec<&Community> = tree.at_level(level).collect();
            if communities.is_empty() {
                continue;
            }
            debug!(
                "Summarizing {} communities at level {}",
                communities.len(),
                level
            );

            // Single-child communities inherit the child summary verbatim;
            // everything else needs an LLM call.
            let mut pending = Vec::new();
            for community in &communities {
                if community.children.len() == 1 {
                    let child = community.children.iter().next().copied();
                    if let Some(child_summary) =
                        child.and_then(|c| report.summaries.get(&c)).cloned()
                    {
                        report.summaries.insert(
                            community.id,
                            CommunitySummary {
                                community: community.id,
                                ..child_summary
                            },
                        );
                        continue;
                    }
                }
                let (input, sources) = self.build_input(graph, community, &report);
                pending.push((community.id, input, sources));
            }

            let results: Vec<(CommunityId, Provenance, ServiceResult<_>)> =
                stream::iter(pending)
                    .map(|(id, input, sources)| {
                        let service = Arc::clone(&self.service);
                        let retry = self.retry;
                        async move {
                            let result =
                                with_retry(retry, "summarization", || service.summarize(&input))
                                    .await;
                            (id, sources, result)
                        }
                    })
                    .buffer_unordered(self.parallel_limit)
                    .collect()
                    .await;

            let mut by_id: HashMap<CommunityId, (Provenance, ServiceResult<_>)> = results
                .into_iter()
                .map(|(id, sources, result)| (id, (sources, result)))
                .collect();

            // Record in tree order, not completion order.
            for community in &communities {
                match by_id.remove(&community.id) {
                    Some((sources, Ok(digest))) => {
                        report.summaries.insert(
                            community.id,
                            CommunitySummary {
                                community: community.id,
                                label: digest.label,
                                text: digest.description,
                                sources,
                            },
                        );
                    }
                    Some((_, Err(err @ ServiceError::Unavailable(_)))) => return Err(err),
                    Some((_, Err(err))) => {
                        warn!(
                            "Skipping summary for community {} after retries: {}",
                            community.id, err
                        );
                        report.skipped.push(community.id);
                    }
                    None => {} // handled by the single-child copy above
                }
            }
        }

        Ok(report)
    }

    /// Assemble the LLM input and the provenance that will be attached to
    /// the resulting summary.
    fn build_input(
        &self,
        graph: &KnowledgeGraph,
        community: &Community,
        report: &SummaryReport,
    ) -> (String, Provenance) {
        let child_summaries: Vec<&CommunitySummary> = community
            .children
            .iter()
            .filter_map(|c| report.summaries.get(c))
            .collect();

        // Interior community with all children summarized: condense the
        // child summaries. A skipped child forces the member-line fallback
        // so no member material silently disappears.
        if !community.children.is_empty() && child_summaries.len() == community.children.len() {
            let mut sources = Provenance::new();
            let lines: Vec<String> = child_summaries
                .iter()
                .map(|s| {
                    sources.merge(&s.sources);
                    format!("{}: {}", s.label, s.text)
                })
                .collect();
            return (self.fit_lines(lines), sources);
        }

        // Terminal community (or fallback): describe the members directly,
        // best-evidenced entities first.
        let mut members: Vec<_> = community
            .members
            .iter()
            .filter_map(|id| graph.node(*id))
            .collect();
        members.sort_by_key(|n| (std::cmp::Reverse(n.sources.total()), n.id));

        let mut sources = Provenance::new();
        let lines: Vec<String> = members
            .iter()
            .map(|node| {
                sources.merge(&node.sources);
                if node.description.is_empty() {
                    node.label.clone()
                } else {
                    format!("{}: {}", node.label, node.description)
                }
            })
            .collect();
        (self.fit_lines(lines), sources)
    }

    /// Join lines until the character budget runs out; everything past the
    /// cutoff is dropped.
    fn fit_lines(&self, lines: Vec<String>) -> String {
        let mut out = String::new();
        for line in lines {
            if !out.is_empty() && out.len() + 1 + line.len() > self.max_input_chars {
                break;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&line);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{ChunkId, DocumentId};
    use crate::services::CommunityDigest;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Echoes the first input line as label and counts calls.
    struct EchoSummarizer {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SummarizationService for EchoSummarizer {
        async fn summarize(&self, text: &str) -> ServiceResult<CommunityDigest> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let first = text.lines().next().unwrap_or("").to_string();
            Ok(CommunityDigest {
                label: format!("About {}", first),
                description: text.to_string(),
            })
        }
    }

    fn chunk(n: u32) -> ChunkId {
        ChunkId::new(&DocumentId::new("doc"), n)
    }

    fn setup() -> (KnowledgeGraph, CommunityTree) {
        let mut graph = KnowledgeGraph::new();
        let a = graph.upsert_entity("a", "A", "first", &Provenance::single(chunk(0)));
        let b = graph.upsert_entity("b", "B", "second", &Provenance::single(chunk(1)));
        let c = graph.upsert_entity("c", "C", "third", &Provenance::single(chunk(2)));

        let mut tree = CommunityTree::new();
        let root = tree.insert_root([a, b, c].into_iter().collect());
        tree.insert_child(root, CommunityId::new(1, 0), [a, b].into_iter().collect());
        tree.insert_child(root, CommunityId::new(1, 1), [c].into_iter().collect());
        (graph, tree)
    }

    fn summarizer(service: Arc<dyn SummarizationService>) -> Summarizer {
        Summarizer::new(
            service,
            RetryPolicy {
                max_attempts: 1,
                backoff: std::time::Duration::from_millis(1),
            },
            4,
            4096,
        )
    }

    #[tokio::test]
    async fn test_every_community_gets_a_summary() {
        let (graph, tree) = setup();
        let service = Arc::new(EchoSummarizer {
            calls: AtomicU32::new(0),
        });
        let report = summarizer(service.clone())
            .summarize_tree(&graph, &tree)
            .await
            .unwrap();

        assert_eq!(report.summaries.len(), 3);
        assert!(report.skipped.is_empty());
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_summary_provenance_flows_upward() {
        let (graph, tree) = setup();
        let service = Arc::new(EchoSummarizer {
            calls: AtomicU32::new(0),
        });
        let report = summarizer(service)
            .summarize_tree(&graph, &tree)
            .await
            .unwrap();

        let root = &report.summaries[&CommunityId::root()];
        // Root was built from both child summaries, so it cites all chunks
        assert!(root.sources.contains(&chunk(0)));
        assert!(root.sources.contains(&chunk(1)));
        assert!(root.sources.contains(&chunk(2)));
    }

    #[tokio::test]
    async fn test_single_child_copies_without_llm_call() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.upsert_entity("a", "A", "only", &Provenance::single(chunk(0)));

        let mut tree = CommunityTree::new();
        let root = tree.insert_root([a].into_iter().collect());
        tree.insert_child(root, CommunityId::new(1, 0), [a].into_iter().collect());

        let service = Arc::new(EchoSummarizer {
            calls: AtomicU32::new(0),
        });
        let report = summarizer(service.clone())
            .summarize_tree(&graph, &tree)
            .await
            .unwrap();

        // One call for the child; the root copied it
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        let root_summary = &report.summaries[&CommunityId::root()];
        let child_summary = &report.summaries[&CommunityId::new(1, 0)];
        assert_eq!(root_summary.text, child_summary.text);
        assert_eq!(root_summary.community, CommunityId::root());
    }

    #[tokio::test]
    async fn test_persistent_failure_skips_community() {
        struct AlwaysFails;

        #[async_trait]
        impl SummarizationService for AlwaysFails {
            async fn summarize(&self, _text: &str) -> ServiceResult<CommunityDigest> {
                Err(ServiceError::Transient("down".to_string()))
            }
        }

        let (graph, tree) = setup();
        let report = summarizer(Arc::new(AlwaysFails))
            .summarize_tree(&graph, &tree)
            .await
            .unwrap();

        assert!(report.summaries.is_empty());
        assert_eq!(report.skipped.len(), 3);
    }

    #[test]
    fn test_fit_lines_respects_budget() {
        let s = summarizer(Arc::new(EchoSummarizer {
            calls: AtomicU32::new(0),
        }));
        let short = Summarizer {
            max_input_chars: 10,
            ..s
        };
        let fitted = short.fit_lines(vec!["12345".to_string(), "67890".to_string()]);
        // Second line would push past 10 chars with the separator
        assert_eq!(fitted, "12345");
    }
}
