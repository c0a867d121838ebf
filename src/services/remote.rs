//! HTTP clients for OpenAI-compatible embedding and chat endpoints

use super::{
    AnswerService, CommunityDigest, EmbeddingService, ExtractionOutput, ExtractionService,
    PartialAnswer, ServiceError, ServiceResult, SummarizationService,
};
use crate::config::{EmbeddingConfig, LlmConfig};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const EXTRACTION_PROMPT: &str = "Extract the named entities and the relations between them \
from the text. Respond with JSON only: {\"entities\": [{\"label\": ..., \"description\": ...}], \
\"relations\": [{\"from\": ..., \"to\": ..., \"relation\": ...}]}. Relation names are short \
snake_case verbs. Do not invent entities that are not in the text.";

const SUMMARY_PROMPT: &str = "Condense the following material into a short report. Respond \
with JSON only: {\"label\": <a title of at most eight words>, \"description\": <a paragraph \
covering the key entities and how they relate>}.";

const ANSWER_PROMPT: &str = "Given a report and a question, judge how useful the report is \
for answering the question. Respond with JSON only: {\"confidence\": <integer 0-100>, \
\"information\": <the part of the report relevant to the question, or an empty string>}.";

fn status_error(context: &str, status: StatusCode, body: String) -> ServiceError {
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        ServiceError::Transient(format!("{} returned {}: {}", context, status, body))
    } else {
        ServiceError::Unavailable(format!("{} returned {}: {}", context, status, body))
    }
}

/// Strip Markdown code fences some models wrap around JSON payloads.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

fn parse_json<T: serde::de::DeserializeOwned>(context: &str, text: &str) -> ServiceResult<T> {
    serde_json::from_str(strip_fences(text))
        .map_err(|e| ServiceError::Malformed(format!("{}: {} in {:?}", context, e, text)))
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteEmbeddingClient {
    client: Client,
    config: EmbeddingConfig,
}

impl RemoteEmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl EmbeddingService for RemoteEmbeddingClient {
    fn dim(&self) -> usize {
        self.config.dim
    }

    async fn embed(&self, texts: &[String]) -> ServiceResult<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct Request<'a> {
            input: &'a [String],
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            data: Vec<Item>,
        }

        #[derive(Deserialize)]
        struct Item {
            embedding: Vec<f32>,
        }

        let url = format!("{}/embeddings", self.config.api_base_url);
        let mut request = self.client.post(&url).json(&Request {
            input: texts,
            model: &self.config.model,
        });
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ServiceError::Transient(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error("embedding endpoint", status, body));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;

        let vectors: Vec<Vec<f32>> = result.data.into_iter().map(|d| d.embedding).collect();
        if vectors.len() != texts.len() {
            return Err(ServiceError::Malformed(format!(
                "embedding endpoint returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        for vector in &vectors {
            if vector.len() != self.config.dim {
                return Err(ServiceError::Malformed(format!(
                    "embedding dimension {} does not match configured {}",
                    vector.len(),
                    self.config.dim
                )));
            }
        }
        Ok(vectors)
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint, serving
/// extraction, summarization, and answer adjudication with fixed JSON
/// contracts.
pub struct RemoteLlmClient {
    client: Client,
    config: LlmConfig,
}

impl RemoteLlmClient {
    pub fn new(config: LlmConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn chat(&self, system: &str, user: &str) -> ServiceResult<String> {
        #[derive(Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: Vec<Message<'a>>,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Response {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MessageContent,
        }

        #[derive(Deserialize)]
        struct MessageContent {
            content: String,
        }

        let url = format!("{}/chat/completions", self.config.api_base_url);
        let mut request = self.client.post(&url).json(&Request {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        });
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ServiceError::Transient(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error("chat endpoint", status, body));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;
        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ServiceError::Malformed("chat endpoint returned no choices".to_string()))
    }
}

#[async_trait]
impl ExtractionService for RemoteLlmClient {
    async fn extract(&self, chunk_text: &str) -> ServiceResult<ExtractionOutput> {
        let content = self.chat(EXTRACTION_PROMPT, chunk_text).await?;
        parse_json("extraction response", &content)
    }
}

#[async_trait]
impl SummarizationService for RemoteLlmClient {
    async fn summarize(&self, text: &str) -> ServiceResult<CommunityDigest> {
        let content = self.chat(SUMMARY_PROMPT, text).await?;
        parse_json("summary response", &content)
    }
}

#[async_trait]
impl AnswerService for RemoteLlmClient {
    async fn answer(&self, summary: &str, query: &str) -> ServiceResult<PartialAnswer> {
        let user = format!("Report:\n{}\n\nQuestion: {}", summary, query);
        let content = self.chat(ANSWER_PROMPT, &user).await?;
        let answer: PartialAnswer = parse_json("answer response", &content)?;
        if answer.confidence > 100 {
            return Err(ServiceError::Malformed(format!(
                "confidence {} outside 0-100",
                answer.confidence
            )));
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_extraction_json() {
        let text = r#"{"entities": [{"label": "Paris", "description": "A city."}],
                       "relations": [{"from": "Paris", "to": "France", "relation": "capital_of"}]}"#;
        let output: ExtractionOutput = parse_json("test", text).unwrap();
        assert_eq!(output.entities.len(), 1);
        assert_eq!(output.relations[0].relation, "capital_of");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let result: ServiceResult<ExtractionOutput> = parse_json("test", "not json at all");
        assert!(matches!(result, Err(ServiceError::Malformed(_))));
    }

    #[test]
    fn test_status_classification() {
        let transient = status_error("x", StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(matches!(transient, ServiceError::Transient(_)));

        let fatal = status_error("x", StatusCode::UNAUTHORIZED, String::new());
        assert!(matches!(fatal, ServiceError::Unavailable(_)));
    }
}
