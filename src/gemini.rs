//! Google Gemini adapter (embedding, generation, model listing).
//!
//! Talks to the public Generative Language REST API with an API key read
//! from `GOOGLE_API_KEY`:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | embed | `POST models/{model}:embedContent` |
//! | generate | `POST models/{model}:generateContent` |
//! | list models | `GET models` |
//!
//! Non-success responses are classified into [`ServiceError`] here, so the
//! embedding client and response generator never look at HTTP details.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::embedding::EmbeddingService;
use crate::error::{Error, Result, ServiceError};
use crate::generate::GenerationService;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash";
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Read the API key from the environment.
pub fn api_key_from_env() -> Result<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::config(format!(
            "{} must be set to use the gemini provider",
            API_KEY_ENV
        ))),
    }
}

/// HTTP client bound to one Gemini model.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    output_dims: Option<usize>,
}

impl GeminiClient {
    pub fn new(api_key: String, model: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dims: None,
        })
    }

    /// Client using the key from `GOOGLE_API_KEY`.
    pub fn from_env(model: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        Self::new(api_key_from_env()?, model, timeout_secs)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Request a reduced embedding size (`outputDimensionality`).
    pub fn with_output_dims(mut self, dims: Option<usize>) -> Self {
        self.output_dims = dims;
        self
    }

    fn model_url(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        body: &B,
    ) -> std::result::Result<R, ServiceError> {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status("Gemini", status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::Other(format!("invalid Gemini response: {}", e)))
    }

    /// List models available to this API key.
    pub async fn list_models(&self) -> std::result::Result<Vec<ModelInfo>, ServiceError> {
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::from_status("Gemini", status, &body));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| ServiceError::Other(format!("invalid Gemini response: {}", e)))?;
        Ok(list.models)
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// One entry of the model listing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(rename = "supportedGenerationMethods", default)]
    pub supported_methods: Vec<String>,
}

fn answer_text(response: GenerateResponse) -> std::result::Result<String, ServiceError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ServiceError::Other("no text in Gemini response".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl EmbeddingService for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_one(&self, text: &str) -> std::result::Result<Vec<f32>, ServiceError> {
        let request = EmbedRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: vec![Part { text }],
            },
            output_dimensionality: self.output_dims,
        };
        let response: EmbedResponse = self.post(&self.model_url("embedContent"), &request).await?;
        Ok(response.embedding.values)
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<String, ServiceError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };
        let response: GenerateResponse =
            self.post(&self.model_url("generateContent"), &request).await?;
        answer_text(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_request_shape() {
        let request = EmbedRequest {
            model: "models/gemini-embedding-001".to_string(),
            content: Content {
                parts: vec![Part { text: "hello" }],
            },
            output_dimensionality: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "models/gemini-embedding-001");
        assert_eq!(json["content"]["parts"][0]["text"], "hello");
        assert!(json.get("outputDimensionality").is_none());
    }

    #[test]
    fn test_parse_embed_response() {
        let json = r#"{"embedding": {"values": [0.5, -0.25, 1.0]}}"#;
        let parsed: EmbedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.embedding.values, vec![0.5, -0.25, 1.0]);
    }

    #[test]
    fn test_answer_text_joins_parts() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "Hello "}, {"text": "there"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(answer_text(parsed).unwrap(), "Hello there");
    }

    #[test]
    fn test_answer_text_empty_is_error() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(answer_text(parsed), Err(ServiceError::Other(_))));
    }

    #[test]
    fn test_parse_model_list() {
        let json = r#"{"models": [{"name": "models/gemini-2.5-flash", "displayName": "Gemini 2.5 Flash",
            "supportedGenerationMethods": ["generateContent"]}]}"#;
        let parsed: ModelList = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.models.len(), 1);
        assert_eq!(parsed.models[0].supported_methods, vec!["generateContent"]);
    }

    #[test]
    fn test_model_url() {
        let client = GeminiClient::new("k".into(), "gemini-2.5-flash", 5)
            .unwrap()
            .with_base_url("http://localhost:1234/v1beta/");
        assert_eq!(
            client.model_url("generateContent"),
            "http://localhost:1234/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
