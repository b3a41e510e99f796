//! Retrieval-augmented answer generation.
//!
//! [`ResponseGenerator::generate`] turns a question plus retrieved context
//! into an answer string. It never fails: every error path produces a
//! message the caller can display.
//!
//! # Failure Policy
//!
//! | [`ServiceError`] | Behaviour |
//! |------------------|-----------|
//! | `Unavailable` | retry up to `max_retries` attempts, waiting 1s, 2s, 4s, … (at most [`MAX_BACKOFF_SECS`]) |
//! | `QuotaExhausted` | return [`QUOTA_EXHAUSTED_MESSAGE`] at once, no retry |
//! | `Other` | return `"Error generating response: …"` |
//!
//! Successful answers are stored in the shared [`ResponseCache`] and
//! served from it on repeat.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{ResponseCache, DEFAULT_CONTEXT_PREFIX_CHARS};
use crate::error::ServiceError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound on a single backoff wait.
pub const MAX_BACKOFF_SECS: u64 = 32;

/// Returned when the provider reports an exhausted quota.
pub const QUOTA_EXHAUSTED_MESSAGE: &str = "API quota limit reached.

The generation API rejected the request because the quota for this API key \
is exhausted (HTTP 429 / RESOURCE_EXHAUSTED). Retrying now will not help.

Options:
1. Wait for the quota window to reset (free tiers typically reset daily).
2. Upgrade the API plan for higher limits (https://ai.google.dev).
3. Check current usage in the provider console before retrying.";

/// Returned when the provider stays overloaded after every retry.
pub const OVERLOADED_MESSAGE: &str =
    "The AI service is currently overloaded. Please try again in a moment.";

/// An external text-generation API.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-2.5-flash"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// Waits between retry attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// [`Sleeper`] backed by `tokio::time::sleep`.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Build the grounded prompt sent to the generation model.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        r#"You are a helpful AI assistant. Based on the following context from documents, provide a comprehensive and detailed answer to the question.

IMPORTANT INSTRUCTIONS:
- Answer using only the information in the context below
- Include specific details, facts, and information from the context
- If the context does not contain enough information to fully answer the question, say what information is missing
- Format your answer clearly with proper paragraphs and structure
- Be thorough and informative in your response

CONTEXT FROM DOCUMENTS:
{context}

QUESTION: {query}

DETAILED ANSWER:"#
    )
}

/// Wait before retry number `attempt + 1`: `2^attempt` seconds, capped.
fn backoff_delay(attempt: u32) -> Duration {
    let secs = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_secs(secs.min(MAX_BACKOFF_SECS))
}

/// Cached, retrying front end to a [`GenerationService`].
pub struct ResponseGenerator {
    service: Arc<dyn GenerationService>,
    cache: Arc<ResponseCache>,
    sleeper: Arc<dyn Sleeper>,
    max_retries: u32,
    context_prefix_chars: usize,
}

impl ResponseGenerator {
    pub fn new(service: Arc<dyn GenerationService>, cache: Arc<ResponseCache>) -> Self {
        Self {
            service,
            cache,
            sleeper: Arc::new(TokioSleeper),
            max_retries: DEFAULT_MAX_RETRIES,
            context_prefix_chars: DEFAULT_CONTEXT_PREFIX_CHARS,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_context_prefix_chars(mut self, chars: usize) -> Self {
        self.context_prefix_chars = chars;
        self
    }

    pub fn model_name(&self) -> &str {
        self.service.model_name()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Answer `query` from `context`.
    pub async fn generate(&self, query: &str, context: &str) -> String {
        let key = ResponseCache::key(query, context, self.context_prefix_chars);
        if let Some(answer) = self.cache.get(&key) {
            tracing::debug!("using cached response");
            return answer;
        }

        let prompt = build_prompt(query, context);

        for attempt in 0..self.max_retries {
            match self.service.generate(&prompt).await {
                Ok(answer) => {
                    self.cache.insert(key, answer.clone());
                    return answer;
                }
                Err(ServiceError::QuotaExhausted(e)) => {
                    tracing::warn!(error = %e, "generation quota exhausted");
                    return QUOTA_EXHAUSTED_MESSAGE.to_string();
                }
                Err(ServiceError::Unavailable(e)) => {
                    if attempt + 1 < self.max_retries {
                        let delay = backoff_delay(attempt);
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_retries = self.max_retries,
                            delay_secs = delay.as_secs(),
                            error = %e,
                            "generation service overloaded, retrying"
                        );
                        self.sleeper.sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(error = %e, "generation service overloaded, giving up");
                    return OVERLOADED_MESSAGE.to_string();
                }
                Err(ServiceError::Other(e)) => {
                    tracing::warn!(error = %e, "generation failed");
                    return format!("Error generating response: {}", e);
                }
            }
        }

        "Error generating response: maximum retries exceeded.".to_string()
    }
}
