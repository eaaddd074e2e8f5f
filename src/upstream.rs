//! Perplexity chat completions client
//!
//! Sends exactly one request per advisory lookup. Failures are never retried;
//! every transport, status or decoding problem becomes an
//! [`AdvisoryError::Upstream`] carrying enough detail for the client to tell
//! what went wrong.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::config::UpstreamConfig;
use crate::prompt::AdvisoryPrompt;
use crate::{AdvisoryError, Result};

/// Longest slice of a non-JSON error body echoed back to the client
const ERROR_BODY_PREVIEW_CHARS: usize = 200;

const SLOW_CALL_THRESHOLD: Duration = Duration::from_secs(10);

/// Something that can turn an advisory prompt into completion text
#[async_trait]
pub trait AdvisoryProvider: Send + Sync {
    async fn complete(&self, prompt: &AdvisoryPrompt) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for the Perplexity `/chat/completions` endpoint
pub struct PerplexityClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl PerplexityClient {
    /// Create a new client; the key is passed in explicitly so a missing key
    /// is handled by the caller at startup.
    pub fn new(config: &UpstreamConfig, api_key: impl Into<String>) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds.into());

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("advisory-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AdvisoryError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a AdvisoryPrompt) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    fn transport_error(&self, err: &reqwest::Error) -> AdvisoryError {
        if err.is_timeout() {
            error!("Perplexity API timed out after {}s", self.timeout.as_secs());
            AdvisoryError::upstream(format!(
                "Error communicating with Perplexity API: no response within {}s",
                self.timeout.as_secs()
            ))
        } else {
            error!("Error calling Perplexity API: {err}");
            AdvisoryError::upstream(format!("Error communicating with Perplexity API: {err}"))
        }
    }
}

#[async_trait]
impl AdvisoryProvider for PerplexityClient {
    #[instrument(skip(self, prompt), fields(location = %prompt.location, model = %self.model))]
    async fn complete(&self, prompt: &AdvisoryPrompt) -> Result<String> {
        let start_time = Instant::now();
        debug!("Calling Perplexity API at {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "application/json")
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let elapsed = start_time.elapsed();
        if elapsed > SLOW_CALL_THRESHOLD {
            warn!("Slow Perplexity API response: {:.3}s", elapsed.as_secs_f64());
        }

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let text = extract_completion(&body)?;
        info!(
            "Perplexity API answered in {:.3}s ({} chars)",
            elapsed.as_secs_f64(),
            text.len()
        );
        Ok(text)
    }
}

/// Map a non-success provider response to an upstream error
fn status_error(status: StatusCode, body: &str) -> AdvisoryError {
    let preview: String = body.chars().take(ERROR_BODY_PREVIEW_CHARS).collect();
    error!(
        "HTTP error calling Perplexity API: {} - {}",
        status.as_u16(),
        preview
    );

    let mut message = format!("Error from Perplexity API: Status {}", status.as_u16());
    match serde_json::from_str::<Value>(body) {
        Ok(details) => message.push_str(&format!(" - Details: {details}")),
        Err(_) => message.push_str(&format!(" - Body: {preview}")),
    }
    AdvisoryError::upstream_status(status.as_u16(), message)
}

/// Pull `choices[0].message.content` out of a completion response body
fn extract_completion(body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        error!("Perplexity API returned a non-JSON body: {e}");
        malformed_response(None)
    })?;

    let provider_message = value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string);

    let response: ChatCompletionResponse = serde_json::from_value(value).map_err(|e| {
        error!("Unexpected Perplexity API response structure: {e}");
        malformed_response(provider_message.as_deref())
    })?;

    match response.choices.into_iter().next() {
        Some(choice) => Ok(choice.message.content.unwrap_or_default()),
        None => {
            error!("Perplexity API response contained no choices");
            Err(malformed_response(provider_message.as_deref()))
        }
    }
}

fn malformed_response(provider_message: Option<&str>) -> AdvisoryError {
    AdvisoryError::upstream(format!(
        "Could not retrieve advisories. API response was: {}",
        provider_message.unwrap_or("Unknown error")
    ))
}
