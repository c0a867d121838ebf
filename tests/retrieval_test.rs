//! Retrieval strategy tests against a hand-built vector store, covering the
//! weighted source attribution law, boundaries, and request validation.

use async_trait::async_trait;
use ragraph::chunk::{ChunkSet, Document, ParagraphChunker};
use ragraph::community::CommunityId;
use ragraph::graph::{ChunkId, DocumentId, Provenance};
use ragraph::index::{MemoryVectorStore, VectorPayload, VectorRecord, VectorStore};
use ragraph::query::{
    QueryDefaults, QueryEngine, QueryError, RetrievalMethod, RetrievalRequest,
};
use ragraph::services::{
    AnswerService, EmbeddingService, PartialAnswer, RetryPolicy, ServiceResult,
};
use std::sync::Arc;
use std::time::Duration;

/// Embeds every text to the same fixed vector. Queries only.
struct ConstEmbedder {
    vector: Vec<f32>,
}

#[async_trait]
impl EmbeddingService for ConstEmbedder {
    fn dim(&self) -> usize {
        self.vector.len()
    }

    async fn embed(&self, texts: &[String]) -> ServiceResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| self.vector.clone()).collect())
    }
}

struct NoopAnswerer;

#[async_trait]
impl AnswerService for NoopAnswerer {
    async fn answer(&self, summary: &str, _query: &str) -> ServiceResult<PartialAnswer> {
        Ok(PartialAnswer {
            confidence: 50,
            information: summary.to_string(),
        })
    }
}

fn chunk_id(doc: &str, ordinal: u32) -> ChunkId {
    ChunkId::new(&DocumentId::new(doc), ordinal)
}

fn summary_record(
    level: u32,
    index: u32,
    vector: Vec<f32>,
    cited: &[(&str, u32)],
) -> VectorRecord {
    let community = CommunityId::new(level, index);
    let mut sources = Provenance::new();
    for (doc, ordinal) in cited {
        sources.record(&chunk_id(doc, *ordinal));
    }
    VectorRecord {
        id: format!("community:{}", community),
        vector,
        payload: VectorPayload::Summary {
            community,
            level,
            label: format!("Summary {}/{}", level, index),
            text: format!("Summary text {}/{}", level, index),
            sources,
        },
    }
}

/// Four chunks `src:0` through `src:3`.
fn corpus() -> Arc<ChunkSet> {
    Arc::new(ChunkSet::from_documents(
        &ParagraphChunker::default(),
        &[Document::new(
            "src",
            "Chunk zero.\n\nChunk one.\n\nChunk two.\n\nChunk three.",
        )],
    ))
}

fn engine(store: Arc<MemoryVectorStore>, chunks: Arc<ChunkSet>, max_level: u32) -> QueryEngine {
    QueryEngine::new(
        Arc::new(ConstEmbedder {
            vector: vec![1.0, 0.0],
        }),
        store,
        Arc::new(NoopAnswerer),
        chunks,
        "summaries",
        "chunks",
        max_level,
        QueryDefaults::default(),
        RetryPolicy {
            max_attempts: 1,
            backoff: Duration::from_millis(1),
        },
        4,
    )
}

/// Summary A scores 0.9 against the query and cites chunks 1 and 2; summary
/// B scores 0.4 and cites chunks 2 and 3.
async fn seed_weighting_scenario(store: &MemoryVectorStore) {
    let a = vec![0.9, (1.0f32 - 0.81).sqrt()];
    let b = vec![0.4, (1.0f32 - 0.16).sqrt()];
    store
        .upsert(
            "summaries",
            vec![
                summary_record(1, 0, a, &[("src", 1), ("src", 2)]),
                summary_record(1, 1, b, &[("src", 2), ("src", 3)]),
            ],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_weighted_attribution_sums_per_citing_summary() {
    let store = Arc::new(MemoryVectorStore::new());
    seed_weighting_scenario(&store).await;
    let engine = engine(store, corpus(), 1);

    let mut request = RetrievalRequest::new(RetrievalMethod::Garag, "anything");
    request.confidence_cutoff = Some(0.3);
    let items = engine.retrieve(&request).await.unwrap();

    assert_eq!(items.len(), 3);
    // Chunk 2 is cited by both summaries: 0.9 + 0.4
    assert_eq!(items[0].chunks[0].chunk, chunk_id("src", 2));
    assert!((items[0].score - 1.3).abs() < 1e-3);
    assert_eq!(items[0].text, "Chunk two.");

    assert_eq!(items[1].chunks[0].chunk, chunk_id("src", 1));
    assert!((items[1].score - 0.9).abs() < 1e-3);

    assert_eq!(items[2].chunks[0].chunk, chunk_id("src", 3));
    assert!((items[2].score - 0.4).abs() < 1e-3);
}

#[tokio::test]
async fn test_weighted_attribution_cutoff_drops_summaries_not_chunks() {
    let store = Arc::new(MemoryVectorStore::new());
    seed_weighting_scenario(&store).await;
    let engine = engine(store, corpus(), 1);

    // Cutoff above summary B's 0.4: only A's citations count
    let mut request = RetrievalRequest::new(RetrievalMethod::Garag, "anything");
    request.confidence_cutoff = Some(0.5);
    let items = engine.retrieve(&request).await.unwrap();

    assert_eq!(items.len(), 2);
    for item in &items {
        assert!((item.score - 0.9).abs() < 1e-3);
    }
    // Equal weights resolve by (document, ordinal) ascending
    assert_eq!(items[0].chunks[0].chunk, chunk_id("src", 1));
    assert_eq!(items[1].chunks[0].chunk, chunk_id("src", 2));
}

#[tokio::test]
async fn test_equal_weights_order_by_document_then_ordinal() {
    let store = Arc::new(MemoryVectorStore::new());
    store
        .upsert(
            "summaries",
            vec![summary_record(
                1,
                0,
                vec![1.0, 0.0],
                &[("zeta", 0), ("alpha", 1), ("alpha", 0)],
            )],
        )
        .await
        .unwrap();

    let chunks = Arc::new(ChunkSet::from_documents(
        &ParagraphChunker::default(),
        &[
            Document::new("alpha", "Alpha zero.\n\nAlpha one."),
            Document::new("zeta", "Zeta zero."),
        ],
    ));
    let engine = engine(store, chunks, 1);

    let mut request = RetrievalRequest::new(RetrievalMethod::Garag, "anything");
    request.confidence_cutoff = Some(0.3);
    let items = engine.retrieve(&request).await.unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].chunks[0].chunk, chunk_id("alpha", 0));
    assert_eq!(items[1].chunks[0].chunk, chunk_id("alpha", 1));
    assert_eq!(items[2].chunks[0].chunk, chunk_id("zeta", 0));
}

#[tokio::test]
async fn test_top_k_beyond_available_returns_all() {
    let store = Arc::new(MemoryVectorStore::new());
    seed_weighting_scenario(&store).await;
    let engine = engine(store, corpus(), 1);

    let mut request = RetrievalRequest::new(RetrievalMethod::Garag, "anything");
    request.confidence_cutoff = Some(0.3);
    request.top_k = Some(50);
    let items = engine.retrieve(&request).await.unwrap();

    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn test_nothing_above_cutoff_returns_empty_list() {
    let store = Arc::new(MemoryVectorStore::new());
    seed_weighting_scenario(&store).await;
    let engine = engine(store, corpus(), 1);

    let mut request = RetrievalRequest::new(RetrievalMethod::Garag, "anything");
    request.confidence_cutoff = Some(0.95);
    let items = engine.retrieve(&request).await.unwrap();
    assert!(items.is_empty());

    // Same boundary for the flat method against an empty chunk index
    let request = RetrievalRequest::new(RetrievalMethod::NaiveRag, "anything");
    let items = engine.retrieve(&request).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_depth_beyond_max_level_clamps() {
    let store = Arc::new(MemoryVectorStore::new());
    seed_weighting_scenario(&store).await;
    // Summaries sit at level 1, which is the deepest level
    let engine = engine(store, corpus(), 1);

    let mut request = RetrievalRequest::new(RetrievalMethod::NaiveGraphRag, "anything");
    request.confidence_cutoff = Some(0.3);
    request.depth = Some(99);
    let items = engine.retrieve(&request).await.unwrap();

    // Clamped to level 1, both summaries qualify, similarity order
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].label.as_deref(), Some("Summary 1/0"));
    assert!(items[0].score > items[1].score);
}

#[tokio::test]
async fn test_level_filter_is_not_starved_by_other_levels() {
    let store = Arc::new(MemoryVectorStore::new());
    // Four level-0 summaries outscore the only level-1 summary, more than
    // the initial search window holds for top_k = 1
    let mut records: Vec<VectorRecord> = (0..4)
        .map(|i| {
            summary_record(
                0,
                i,
                vec![0.9, (1.0f32 - 0.81).sqrt()],
                &[("src", 0)],
            )
        })
        .collect();
    records.push(summary_record(1, 0, vec![0.8, 0.6], &[("src", 1)]));
    store.upsert("summaries", records).await.unwrap();

    let engine = engine(store, corpus(), 1);
    let mut request = RetrievalRequest::new(RetrievalMethod::NaiveGraphRag, "anything");
    request.confidence_cutoff = Some(0.3);
    request.depth = Some(1);
    request.top_k = Some(1);
    let items = engine.retrieve(&request).await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].label.as_deref(), Some("Summary 1/0"));
    assert!((items[0].score - 0.8).abs() < 1e-3);
}

#[tokio::test]
async fn test_summary_filtered_restricts_to_requested_level() {
    let store = Arc::new(MemoryVectorStore::new());
    seed_weighting_scenario(&store).await;
    let engine = engine(store, corpus(), 1);

    // Level 0 has no summaries in this store
    let mut request = RetrievalRequest::new(RetrievalMethod::NaiveGraphRag, "anything");
    request.confidence_cutoff = Some(0.3);
    request.depth = Some(0);
    let items = engine.retrieve(&request).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_invalid_requests_are_client_errors() {
    let store = Arc::new(MemoryVectorStore::new());
    let engine = engine(store, corpus(), 1);

    let mut request = RetrievalRequest::new(RetrievalMethod::NaiveRag, "q");
    request.top_k = Some(0);
    assert!(matches!(
        engine.retrieve(&request).await,
        Err(QueryError::InvalidRequest(_))
    ));

    let mut request = RetrievalRequest::new(RetrievalMethod::NaiveRag, "q");
    request.confidence_cutoff = Some(1.5);
    assert!(matches!(
        engine.retrieve(&request).await,
        Err(QueryError::InvalidRequest(_))
    ));

    // The adjudicated method takes an integer-percent cutoff instead
    let mut request = RetrievalRequest::new(RetrievalMethod::GraphRag, "q");
    request.confidence_cutoff = Some(150.0);
    assert!(matches!(
        engine.retrieve(&request).await,
        Err(QueryError::InvalidRequest(_))
    ));

    let mut request = RetrievalRequest::new(RetrievalMethod::GraphRag, "q");
    request.confidence_cutoff = Some(60.0);
    let items = engine.retrieve(&request).await.unwrap();
    // Valid percent cutoff, empty store: empty result, not an error
    assert!(items.is_empty());
}
