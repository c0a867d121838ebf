//! Graph construction from chunk extraction
//!
//! Fans chunk extraction out to the LLM with bounded concurrency, then folds
//! the results into the knowledge graph serially in chunk order. The serial
//! fold is what makes graph construction deterministic: node ids depend only
//! on the chunk order, never on response arrival order.

use crate::chunk::ChunkSet;
use crate::graph::types::ChunkId;
use crate::graph::{EntityResolver, KnowledgeGraph, Provenance};
use crate::services::{
    with_retry, ExtractionOutput, ExtractionService, RetryPolicy, ServiceError, ServiceResult,
};
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// What happened during one build pass.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub chunks_processed: usize,
    /// Chunks dropped after the retry budget was spent.
    pub skipped_chunks: Vec<ChunkId>,
    pub nodes: usize,
    pub edges: usize,
}

/// Builds the knowledge graph by running extraction over every chunk.
pub struct GraphBuilder {
    extractor: Arc<dyn ExtractionService>,
    resolver: Arc<dyn EntityResolver>,
    retry: RetryPolicy,
    parallel_limit: usize,
}

impl GraphBuilder {
    pub fn new(
        extractor: Arc<dyn ExtractionService>,
        resolver: Arc<dyn EntityResolver>,
        retry: RetryPolicy,
        parallel_limit: usize,
    ) -> Self {
        GraphBuilder {
            extractor,
            resolver,
            retry,
            parallel_limit: parallel_limit.max(1),
        }
    }

    /// Extract every chunk and merge the results into `graph`.
    ///
    /// Chunks that keep failing after retries are skipped and reported;
    /// only `Unavailable` (misconfiguration) aborts the whole pass.
    pub async fn build(
        &self,
        chunks: &ChunkSet,
        graph: &mut KnowledgeGraph,
    ) -> ServiceResult<BuildReport> {
        let outputs = stream::iter(chunks.iter())
            .map(|chunk| {
                let extractor = Arc::clone(&self.extractor);
                let retry = self.retry;
                let id = chunk.id.clone();
                let text = chunk.text.clone();
                async move {
                    let result = with_retry(retry, "extraction", || extractor.extract(&text)).await;
                    (id, result)
                }
            })
            .buffer_unordered(self.parallel_limit)
            .collect::<Vec<(ChunkId, ServiceResult<ExtractionOutput>)>>()
            .await;

        let mut by_chunk: HashMap<ChunkId, ServiceResult<ExtractionOutput>> =
            outputs.into_iter().collect();

        let mut report = BuildReport::default();
        // Merge in chunk order regardless of completion order.
        for chunk in chunks.iter() {
            match by_chunk.remove(&chunk.id) {
                Some(Ok(output)) => {
                    self.merge_output(graph, &chunk.id, &output);
                    report.chunks_processed += 1;
                }
                Some(Err(err @ ServiceError::Unavailable(_))) => return Err(err),
                Some(Err(err)) => {
                    warn!("Skipping chunk {} after retries: {}", chunk.id, err);
                    report.skipped_chunks.push(chunk.id.clone());
                }
                None => report.skipped_chunks.push(chunk.id.clone()),
            }
        }

        report.nodes = graph.node_count();
        report.edges = graph.edge_count();
        Ok(report)
    }

    fn merge_output(&self, graph: &mut KnowledgeGraph, chunk: &ChunkId, output: &ExtractionOutput) {
        let sources = Provenance::single(chunk.clone());

        for entity in &output.entities {
            let label = entity.label.trim();
            if label.is_empty() {
                continue;
            }
            let key = self.resolver.canonical_key(label);
            graph.upsert_entity(&key, label, entity.description.trim(), &sources);
        }

        for relation in &output.relations {
            let from_key = self.resolver.canonical_key(&relation.from);
            let to_key = self.resolver.canonical_key(&relation.to);
            if from_key == to_key {
                debug!("Dropping self-relation on {:?}", relation.from);
                continue;
            }
            let label = sanitize_relation(&relation.relation);
            if label.is_empty() {
                continue;
            }
            // Relations may cite entities missing from the entities list;
            // they still earn a node, just without a description.
            let from = graph.upsert_entity(&from_key, relation.from.trim(), "", &sources);
            let to = graph.upsert_entity(&to_key, relation.to.trim(), "", &sources);
            // Endpoints were just upserted, so this cannot fail.
            if let Err(err) = graph.upsert_relation(from, to, &label, &sources) {
                warn!("Dropping relation {:?}: {}", label, err);
            }
        }
    }
}

/// Normalize an extracted relation term to lowercase snake_case, dropping
/// anything that is not alphanumeric.
fn sanitize_relation(raw: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    let re = NON_WORD.get_or_init(|| Regex::new(r"[^a-z0-9]+").unwrap());
    re.replace_all(&raw.to_lowercase(), "_")
        .trim_matches('_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkSet, Document, ParagraphChunker};
    use crate::graph::NormalizingResolver;
    use crate::services::{ExtractedEntity, ExtractedRelation};
    use async_trait::async_trait;

    struct FixedExtractor;

    #[async_trait]
    impl ExtractionService for FixedExtractor {
        async fn extract(&self, chunk_text: &str) -> ServiceResult<ExtractionOutput> {
            if chunk_text.contains("Paris") {
                Ok(ExtractionOutput {
                    entities: vec![ExtractedEntity {
                        label: "Paris".to_string(),
                        description: "Capital of France.".to_string(),
                    }],
                    relations: vec![ExtractedRelation {
                        from: "Paris".to_string(),
                        to: "France".to_string(),
                        relation: "Is The Capital Of!".to_string(),
                    }],
                })
            } else {
                Ok(ExtractionOutput::default())
            }
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl ExtractionService for FailingExtractor {
        async fn extract(&self, _chunk_text: &str) -> ServiceResult<ExtractionOutput> {
            Err(ServiceError::Transient("down".to_string()))
        }
    }

    fn chunks(text: &str) -> ChunkSet {
        ChunkSet::from_documents(
            &ParagraphChunker::default(),
            &[Document::new("doc", text)],
        )
    }

    fn builder(extractor: Arc<dyn ExtractionService>) -> GraphBuilder {
        GraphBuilder::new(
            extractor,
            Arc::new(NormalizingResolver),
            RetryPolicy {
                max_attempts: 2,
                backoff: std::time::Duration::from_millis(1),
            },
            4,
        )
    }

    #[tokio::test]
    async fn test_build_merges_extraction_output() {
        let set = chunks("Paris is lovely.\n\nNothing here.");
        let mut graph = KnowledgeGraph::new();
        let report = builder(Arc::new(FixedExtractor))
            .build(&set, &mut graph)
            .await
            .unwrap();

        assert_eq!(report.chunks_processed, 2);
        assert!(report.skipped_chunks.is_empty());
        // Paris plus the France endpoint from the relation
        assert_eq!(report.nodes, 2);
        assert_eq!(report.edges, 1);

        let edge = graph.edges().next().unwrap();
        assert_eq!(edge.label, "is_the_capital_of");
    }

    #[tokio::test]
    async fn test_failed_chunks_are_skipped_not_fatal() {
        let set = chunks("Paris.\n\nBerlin.");
        let mut graph = KnowledgeGraph::new();
        let report = builder(Arc::new(FailingExtractor))
            .build(&set, &mut graph)
            .await
            .unwrap();

        assert_eq!(report.chunks_processed, 0);
        assert_eq!(report.skipped_chunks.len(), 2);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_sanitize_relation() {
        assert_eq!(sanitize_relation("Is The Capital Of!"), "is_the_capital_of");
        assert_eq!(sanitize_relation("  knows  "), "knows");
        assert_eq!(sanitize_relation("!!!"), "");
    }
}
