// Text generation backend.
//
// The gateway only needs "prompt in, text blocks out", so the provider sits
// behind `PhraseGenerator`. `AnthropicClient` is the production
// implementation, talking to the Anthropic Messages API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// Failures of the upstream call. None of these ever consume quota.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("API key is not set")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("upstream response contained no phrases")]
    NoPhrases,
}

#[async_trait]
pub trait PhraseGenerator: Send + Sync {
    // Send `prompt` and return the text blocks of the completion.
    async fn complete(&self, prompt: &str) -> Result<Vec<String>, UpstreamError>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

fn text_blocks(body: MessagesResponse) -> Result<Vec<String>, UpstreamError> {
    let blocks: Vec<String> = body
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect();

    if blocks.is_empty() {
        return Err(UpstreamError::Malformed(
            "response contained no text content".to_string(),
        ));
    }
    Ok(blocks)
}

// Anthropic Messages API client
pub struct AnthropicClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: String,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url,
            // an empty env var counts as unset
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            model,
            max_tokens,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl PhraseGenerator for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<Vec<String>, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or(UpstreamError::MissingApiKey)?;

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.model, url = %self.api_url, "sending completion request");

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .ok()
                .and_then(|envelope| envelope.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            warn!(status = status.as_u16(), %message, "upstream rejected request");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        text_blocks(body)
    }
}
