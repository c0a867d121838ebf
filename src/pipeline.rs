//! Indexing pipeline
//!
//! Runs the six indexing stages in order: chunking, flat chunk indexing,
//! graph construction, community detection, summarization, and summary
//! indexing. Per-item failures inside a stage degrade the result (skipped
//! chunks or summaries); store and configuration failures abort the run.

use crate::build::{BuildReport, GraphBuilder};
use crate::chunk::{ChunkSet, Chunker, Document, ParagraphChunker};
use crate::community::{CommunityDetector, CommunityTree};
use crate::config::EngineConfig;
use crate::graph::{KnowledgeGraph, NormalizingResolver};
use crate::index::{IndexError, Indexer, VectorStore};
use crate::services::{
    EmbeddingService, ExtractionService, ServiceError, SummarizationService,
};
use crate::summarize::{SummaryReport, Summarizer};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Everything a finished indexing run produced.
pub struct IndexedCorpus {
    pub chunks: Arc<ChunkSet>,
    pub graph: KnowledgeGraph,
    pub tree: CommunityTree,
    pub summaries: SummaryReport,
    pub build: BuildReport,
}

impl IndexedCorpus {
    /// Deepest community level, for clamping query depths.
    pub fn max_level(&self) -> u32 {
        self.tree.max_level()
    }
}

pub struct IndexingPipeline {
    chunker: Box<dyn Chunker>,
    builder: GraphBuilder,
    detector: CommunityDetector,
    summarizer: Summarizer,
    indexer: Indexer,
}

impl IndexingPipeline {
    /// Wire the pipeline from configuration and the external collaborators.
    pub fn new(
        config: &EngineConfig,
        extractor: Arc<dyn ExtractionService>,
        summarization: Arc<dyn SummarizationService>,
        embedder: Arc<dyn EmbeddingService>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        let retry = config.retry.policy();
        IndexingPipeline {
            chunker: Box::new(ParagraphChunker::default()),
            builder: GraphBuilder::new(
                extractor,
                Arc::new(NormalizingResolver),
                retry,
                config.parallel_limit,
            ),
            detector: CommunityDetector::with_defaults(
                config.min_community_size,
                config.max_community_depth,
                config.clustering_seed,
            ),
            summarizer: Summarizer::new(
                summarization,
                retry,
                config.parallel_limit,
                config.summary_input_chars,
            ),
            indexer: Indexer::new(
                embedder,
                store,
                config.index.summary_index.clone(),
                config.index.chunk_index.clone(),
                retry,
            ),
        }
    }

    /// Replace the default paragraph chunker.
    pub fn with_chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// Index `documents` end to end.
    pub async fn run(&self, documents: &[Document]) -> PipelineResult<IndexedCorpus> {
        info!("Stage 1/6: chunking {} documents", documents.len());
        let chunks = Arc::new(ChunkSet::from_documents(self.chunker.as_ref(), documents));
        info!("Produced {} chunks", chunks.len());

        info!("Stage 2/6: indexing chunk vectors");
        let indexed_chunks = self.indexer.index_chunks(&chunks).await?;
        info!("Indexed {} chunk vectors", indexed_chunks);

        info!("Stage 3/6: building the knowledge graph");
        let mut graph = KnowledgeGraph::new();
        let build = self.builder.build(&chunks, &mut graph).await?;
        info!(
            "Graph has {} nodes, {} edges ({} chunks skipped)",
            build.nodes,
            build.edges,
            build.skipped_chunks.len()
        );

        info!("Stage 4/6: detecting communities");
        let tree = self.detector.detect(&graph);
        info!(
            "Community tree: {} communities, max level {}",
            tree.len(),
            tree.max_level()
        );

        info!("Stage 5/6: summarizing communities");
        let summaries = self.summarizer.summarize_tree(&graph, &tree).await?;
        info!(
            "Summarized {} communities ({} skipped)",
            summaries.summaries.len(),
            summaries.skipped.len()
        );

        info!("Stage 6/6: indexing summary vectors");
        let indexed_summaries = self.indexer.index_summaries(&summaries.summaries).await?;
        info!("Indexed {} summary vectors", indexed_summaries);

        Ok(IndexedCorpus {
            chunks,
            graph,
            tree,
            summaries,
            build,
        })
    }
}
