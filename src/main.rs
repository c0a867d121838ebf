use anyhow::{bail, Context, Result};
use ragraph::chunk::Document;
use ragraph::config::EngineConfig;
use ragraph::index::MemoryVectorStore;
use ragraph::pipeline::IndexingPipeline;
use ragraph::query::{QueryEngine, RetrievalMethod, RetrievalRequest};
use ragraph::services::{
    AnswerService, EmbeddingService, ExtractionService, RemoteEmbeddingClient, RemoteLlmClient,
    SummarizationService,
};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!(
            "Usage: ragraph <docs_dir> <naiverag|naivegraphrag|garag|graphrag> <query...>\n\
             Configuration is read from RAGRAPH_CONFIG (YAML) when set."
        );
    }
    let docs_dir = &args[0];
    let method: RetrievalMethod = args[1].parse()?;
    let query_text = args[2..].join(" ");

    let config = match std::env::var("RAGRAPH_CONFIG") {
        Ok(path) => EngineConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        Err(_) => EngineConfig::default(),
    };

    let documents = load_documents(docs_dir)?;
    if documents.is_empty() {
        bail!("No .txt or .md documents found in {}", docs_dir);
    }
    println!("Indexing {} documents from {}", documents.len(), docs_dir);

    let llm = Arc::new(RemoteLlmClient::new(config.llm.clone())?);
    let embedder: Arc<dyn EmbeddingService> =
        Arc::new(RemoteEmbeddingClient::new(config.embedding.clone())?);
    let store = Arc::new(MemoryVectorStore::new());

    let pipeline = IndexingPipeline::new(
        &config,
        llm.clone() as Arc<dyn ExtractionService>,
        llm.clone() as Arc<dyn SummarizationService>,
        embedder.clone(),
        store.clone(),
    );
    let corpus = pipeline.run(&documents).await?;
    println!(
        "Indexed: {} chunks, {} entities, {} relations, {} communities",
        corpus.chunks.len(),
        corpus.graph.node_count(),
        corpus.graph.edge_count(),
        corpus.tree.len()
    );

    let engine = QueryEngine::new(
        embedder,
        store,
        llm as Arc<dyn AnswerService>,
        corpus.chunks.clone(),
        config.index.summary_index.clone(),
        config.index.chunk_index.clone(),
        corpus.max_level(),
        config.query,
        config.retry.policy(),
        config.parallel_limit,
    );

    let request = RetrievalRequest::new(method, query_text);
    let items = engine.retrieve(&request).await?;

    if items.is_empty() {
        println!("No results cleared the confidence cutoff.");
        return Ok(());
    }
    for (rank, item) in items.iter().enumerate() {
        println!("\n#{} (score {:.4})", rank + 1, item.score);
        if let Some(label) = &item.label {
            println!("  [{}]", label);
        }
        println!("  {}", item.text);
        if !item.chunks.is_empty() {
            let refs: Vec<String> = item.chunks.iter().map(|c| c.chunk.to_string()).collect();
            println!("  sources: {}", refs.join(", "));
        }
    }
    Ok(())
}

/// Read every .txt and .md file in `dir` as one document, named after the
/// file stem. Sorted by path so document ids are stable across runs.
fn load_documents(dir: impl AsRef<Path>) -> Result<Vec<Document>> {
    let dir = dir.as_ref();
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("txt") | Some("md")
            )
        })
        .collect();
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string();
        documents.push(Document::new(id, text));
    }
    Ok(documents)
}
