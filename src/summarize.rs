//! Summarization client
//!
//! Sends a prompt to an Azure OpenAI chat-completions deployment and returns
//! the first choice's message content.
//!
//! ## Failure Policy
//!
//! The client never swallows errors. Every failure is classified into an
//! [`UpstreamError`] and returned; the report pipeline decides to degrade a
//! failed host to [`FALLBACK_SUMMARY`]. There are no retries: a report run
//! makes exactly one request per host.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument, trace};

use crate::config::{LlmConfig, Secret};
use crate::prompt::{Prompt, SYSTEM_MESSAGE};

/// Text used in place of a summary the endpoint failed to produce
pub const FALLBACK_SUMMARY: &str =
    "Sorry, something went wrong while generating the summary and recommendations.";

/// Longest error body kept in an [`UpstreamError::Rejected`]
const MAX_ERROR_BODY: usize = 512;

/// Errors from the summarization endpoint
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Network or transport failure, including timeouts
    #[error("summarization endpoint unavailable: {0}")]
    Unavailable(String),

    /// The endpoint answered with a non-success status
    #[error("summarization endpoint rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The endpoint answered 2xx but the body had no usable completion
    #[error("malformed response from summarization endpoint: {0}")]
    MalformedResponse(String),
}

/// Turns a prompt into summary text
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, prompt: &Prompt) -> Result<String, UpstreamError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for an Azure OpenAI chat-completions endpoint
#[derive(Debug, Clone)]
pub struct AzureOpenAiClient {
    /// HTTP client (reused across requests)
    client: reqwest::Client,
    endpoint: String,
    api_key: Secret,
    temperature: f32,
    max_tokens: u32,
}

impl AzureOpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, UpstreamError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| UpstreamError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Client with default sampling settings and no timeout
    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: Secret::new(api_key),
            temperature: 0.7,
            max_tokens: 1500,
        }
    }

    /// Abort requests that take longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, UpstreamError> {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(self)
    }
}

#[async_trait]
impl Summarizer for AzureOpenAiClient {
    #[instrument(skip_all, fields(records = prompt.included))]
    async fn summarize(&self, prompt: &Prompt) -> Result<String, UpstreamError> {
        let request = ChatRequest {
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.text,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        trace!("posting prompt of {} chars", prompt.text.len());

        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", self.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("summarization request failed: {e}");
                UpstreamError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("failed to read summarization response: {e}");
            UpstreamError::Unavailable(format!("failed to read response body: {e}"))
        })?;

        if !status.is_success() {
            error!("summarization endpoint returned {status}");
            error!("summarization API error response: {body}");
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let completion = extract_completion(&body)?;
        debug!("received summary of {} chars", completion.len());
        Ok(completion)
    }
}

/// Pull the first choice's message content out of a response body
fn extract_completion(body: &str) -> Result<String, UpstreamError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::MalformedResponse(format!("invalid JSON: {e}")))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| UpstreamError::MalformedResponse("response has no choices".to_string()))?;

    choice
        .message
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| {
            UpstreamError::MalformedResponse("first choice has no message content".to_string())
        })
}
