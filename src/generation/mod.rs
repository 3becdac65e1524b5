//! The text-generation collaborator seam.
//!
//! The analytics core treats generation as an opaque collaborator: a prompt
//! string goes in, a string comes out. The HTTP implementation speaks the
//! OpenAI-compatible chat endpoint and deliberately sets no client-side
//! timeout — the upstream request window is allowed to be very long, and the
//! layer above decides what a slow call means.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::IntelError;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("generation response malformed: {0}")]
    Malformed(String),
    #[error("generation disabled: no endpoint configured")]
    Disabled,
}

impl From<GenerationError> for IntelError {
    fn from(err: GenerationError) -> Self {
        IntelError::External {
            service: "text generation",
            message: err.to_string(),
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

// ─── HTTP implementation ──────────────────────────────────────────────────────

pub struct HttpTextGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl HttpTextGenerator {
    pub fn new(endpoint: String, model: String, api_key: Option<String>) -> Self {
        // No .timeout() on the client: upstream generation may legitimately
        // run for minutes and this core must not cut it short.
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
            api_key,
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GenerationError::Malformed("empty choices".to_string()))
    }
}

// ─── Disabled implementation ──────────────────────────────────────────────────

/// Stand-in when no endpoint is configured. Every call fails with
/// [`GenerationError::Disabled`]; callers degrade the same way they would on
/// a transport failure.
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
}
