//! Engine configuration
//!
//! One immutable configuration object, loaded from YAML, threaded through
//! component constructors. Nothing reads configuration from globals.

use crate::query::QueryDefaults;
use crate::services::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Retry budget for external service calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            backoff_ms: 250,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

/// Names of the two vector indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexNames {
    pub summary_index: String,
    pub chunk_index: String,
}

impl Default for IndexNames {
    fn default() -> Self {
        IndexNames {
            summary_index: "community_summaries".to_string(),
            chunk_index: "chunks".to_string(),
        }
    }
}

/// Embedding endpoint settings. The model identity is part of the index:
/// changing `model` or `dim` requires re-indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub api_base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dim: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            api_base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            dim: 1536,
        }
    }
}

/// Chat-completions endpoint settings, shared by extraction, summarization,
/// and answer adjudication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            api_base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Concurrent in-flight calls per external service.
    pub parallel_limit: usize,
    /// Communities at or below this size are not split further.
    pub min_community_size: usize,
    /// Maximum community tree depth; 0 keeps only the root.
    pub max_community_depth: u32,
    /// Base seed for the clustering service; recorded for reproducibility.
    pub clustering_seed: u64,
    /// Character budget for summarization inputs.
    pub summary_input_chars: usize,
    pub retry: RetryConfig,
    pub query: QueryDefaults,
    pub index: IndexNames,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            parallel_limit: 4,
            min_community_size: 20,
            max_community_depth: 6,
            clustering_seed: 17032025,
            summary_input_chars: 14336,
            retry: RetryConfig::default(),
            query: QueryDefaults::default(),
            index: IndexNames::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file and validate it.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.parallel_limit == 0 {
            return Err(ConfigError::Invalid(
                "parallel_limit must be > 0".to_string(),
            ));
        }
        if self.min_community_size == 0 {
            return Err(ConfigError::Invalid(
                "min_community_size must be > 0".to_string(),
            ));
        }
        if self.embedding.dim == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dim must be > 0".to_string(),
            ));
        }
        if self.query.top_k == 0 {
            return Err(ConfigError::Invalid("query.top_k must be > 0".to_string()));
        }
        if !(0.0..1.0).contains(&self.query.confidence_cutoff)
            || self.query.confidence_cutoff == 0.0
        {
            return Err(ConfigError::Invalid(format!(
                "query.confidence_cutoff {} outside (0, 1)",
                self.query.confidence_cutoff
            )));
        }
        if !(0.0..100.0).contains(&self.query.adjudication_cutoff)
            || self.query.adjudication_cutoff == 0.0
        {
            return Err(ConfigError::Invalid(format!(
                "query.adjudication_cutoff {} outside (0, 100)",
                self.query.adjudication_cutoff
            )));
        }
        if self.index.summary_index == self.index.chunk_index {
            return Err(ConfigError::Invalid(
                "summary_index and chunk_index must differ".to_string(),
            ));
        }
        Ok(())
    }
}
