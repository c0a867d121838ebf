//! External collaborator interfaces
//!
//! Everything the engine cannot compute itself (entity extraction,
//! summarization, query adjudication, embeddings) sits behind a trait here,
//! so that pipelines and retrieval are testable with deterministic stubs.
//! Clustering is included even though it is computed locally: swapping the
//! partitioning algorithm must not touch the community detector.

pub mod remote;
pub mod retry;

use crate::graph::{NodeId, SubgraphView};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use remote::{RemoteEmbeddingClient, RemoteLlmClient};
pub use retry::{with_retry, RetryPolicy};

/// Failure modes of external services.
///
/// `Transient` and `Malformed` are worth retrying; `Unavailable` means the
/// service cannot serve this request at all (bad credentials, unsupported
/// model) and is surfaced immediately.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    /// Timeouts, rate limits, 5xx responses.
    #[error("Transient service failure: {0}")]
    Transient(String),

    /// The service answered, but not in the agreed format.
    #[error("Malformed service response: {0}")]
    Malformed(String),

    /// Misconfiguration or permanent rejection. Not retried.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// One entity mention reported by the extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub label: String,
    pub description: String,
}

/// One relation mention reported by the extractor. `from` and `to` reference
/// entity labels from the same response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRelation {
    pub from: String,
    pub to: String,
    pub relation: String,
}

/// Everything extracted from a single chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionOutput {
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
    #[serde(default)]
    pub relations: Vec<ExtractedRelation>,
}

/// Label and prose description produced for one community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityDigest {
    pub label: String,
    pub description: String,
}

/// Per-summary answer attempt for the adjudicated retrieval method.
///
/// `confidence` is an integer percentage in `[0, 100]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialAnswer {
    pub confidence: u32,
    pub information: String,
}

/// Extracts entities and relations from raw chunk text.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(&self, chunk_text: &str) -> ServiceResult<ExtractionOutput>;
}

/// Condenses community material into a titled summary.
#[async_trait]
pub trait SummarizationService: Send + Sync {
    async fn summarize(&self, text: &str) -> ServiceResult<CommunityDigest>;
}

/// Judges how well a summary answers a query, extracting the relevant part.
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn answer(&self, summary: &str, query: &str) -> ServiceResult<PartialAnswer>;
}

/// Produces fixed-dimension embeddings for text batches.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Dimension of every vector this service returns.
    fn dim(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> ServiceResult<Vec<Vec<f32>>>;
}

/// Partitions a subgraph into disjoint member groups.
///
/// Implementations must be deterministic for a given `seed` and return
/// groups that exactly cover the view's members.
pub trait ClusteringService: Send + Sync {
    fn cluster(&self, view: &SubgraphView<'_>, seed: u64) -> Vec<Vec<NodeId>>;
}
