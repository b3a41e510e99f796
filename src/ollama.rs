//! Local Ollama adapter.
//!
//! Calls a running Ollama instance (default `http://localhost:11434`):
//! `POST /api/embed` for embeddings, `POST /api/generate` with
//! `stream: false` for answers, and `GET /api/tags` for model listing.
//! Requires the model to be pulled first (e.g. `ollama pull nomic-embed-text`).

use async_trait::async_trait;
use std::time::Duration;

use crate::embedding::EmbeddingService;
use crate::error::{Error, Result, ServiceError};
use crate::generate::GenerationService;

pub const DEFAULT_URL: &str = "http://localhost:11434";

pub struct OllamaClient {
    http: reqwest::Client,
    model: String,
    url: String,
}

impl OllamaClient {
    pub fn new(url: Option<&str>, model: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            model: model.into(),
            url: url.unwrap_or(DEFAULT_URL).trim_end_matches('/').to_string(),
        })
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ServiceError> {
        let response = self
            .http
            .post(format!("{}{}", self.url, path))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                ServiceError::Other(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status("Ollama", status, &body_text));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::Other(format!("invalid Ollama response: {}", e)))
    }

    /// Names of locally available models.
    pub async fn list_models(&self) -> std::result::Result<Vec<String>, ServiceError> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.url))
            .send()
            .await
            .map_err(|e| {
                ServiceError::Other(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status("Ollama", status, &body_text));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ServiceError::Other(format!("invalid Ollama response: {}", e)))?;
        Ok(parse_tags(&json))
    }
}

fn parse_embed_response(json: &serde_json::Value) -> std::result::Result<Vec<f32>, ServiceError> {
    let first = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|e| e.first())
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            ServiceError::Other("invalid Ollama response: missing embeddings array".to_string())
        })?;

    Ok(first
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

fn parse_generate_response(json: &serde_json::Value) -> std::result::Result<String, ServiceError> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| ServiceError::Other("invalid Ollama response: missing response".to_string()))
}

fn parse_tags(json: &serde_json::Value) -> Vec<String> {
    json.get("models")
        .and_then(|m| m.as_array())
        .map(|models| {
            models
                .iter()
                .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl EmbeddingService for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_one(&self, text: &str) -> std::result::Result<Vec<f32>, ServiceError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let json = self.post_json("/api/embed", &body).await?;
        parse_embed_response(&json)
    }
}

#[async_trait]
impl GenerationService for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<String, ServiceError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let json = self.post_json("/api/generate", &body).await?;
        parse_generate_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embed_response() {
        let json = serde_json::json!({"model": "nomic-embed-text", "embeddings": [[0.1, 0.2, 0.3]]});
        let v = parse_embed_response(&json).unwrap();
        assert_eq!(v.len(), 3);
        assert!((v[1] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_parse_embed_response_missing() {
        let json = serde_json::json!({"error": "model not found"});
        assert!(parse_embed_response(&json).is_err());
    }

    #[test]
    fn test_parse_generate_response() {
        let json = serde_json::json!({"response": "Paris.", "done": true});
        assert_eq!(parse_generate_response(&json).unwrap(), "Paris.");
    }

    #[test]
    fn test_parse_tags() {
        let json = serde_json::json!({"models": [{"name": "llama3:latest"}, {"name": "nomic-embed-text"}]});
        assert_eq!(parse_tags(&json), vec!["llama3:latest", "nomic-embed-text"]);
        assert!(parse_tags(&serde_json::json!({})).is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_other_error() {
        let client = OllamaClient::new(Some("http://127.0.0.1:9"), "m", 2).unwrap();
        let err = client.embed_one("hello").await.unwrap_err();
        assert!(matches!(err, ServiceError::Other(_)));
        assert!(err.to_string().contains("connection error"));
    }
}
