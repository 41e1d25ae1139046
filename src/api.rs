//! Generative-text API interaction.
//!
//! The module uses a trait-based design:
//! - [`AskAsync`]: core trait for sending a prompt and receiving text
//! - [`GeminiClient`]: Google Gemini `generateContent` over reqwest
//! - [`RetryAsk`]: decorator that adds the shared [`Backoff`] policy to any
//!   [`AskAsync`] implementation
//!
//! Every failure is mapped to a [`GenerationError`] so the pipeline can report
//! a single "generation failed" condition.

use crate::error::GenerationError;
use crate::retry::Backoff;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

/// A request for generated text.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// Persona and output format, sent as the system instruction.
    pub system: String,
    /// Context block plus the reader's question.
    pub user: String,
}

/// Trait for async text generation.
///
/// Implementors send a prompt to a model and return its reply. This seam lets
/// the pipeline run against a fake generator in tests and lets decorators such
/// as [`RetryAsk`] wrap the real client.
pub trait AskAsync {
    /// Send a prompt to the model and receive its text reply.
    ///
    /// # Arguments
    ///
    /// * `prompt` - System instruction and user turn
    ///
    /// # Returns
    ///
    /// The generated text, or a [`GenerationError`] describing why none was
    /// produced.
    async fn ask(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}

/// Wrapper that retries any [`AskAsync`] implementation with backoff.
pub struct RetryAsk<T> {
    inner: T,
    backoff: Backoff,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Arguments
    ///
    /// * `inner` - The client to wrap
    /// * `retries` - Extra attempts after the first one (0 means a single call)
    /// * `base_delay` - Delay before the first retry, doubled after each failure
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = GeminiClient::new(key, "gemini-2.0-flash", base_url, Duration::from_secs(60))?;
    /// let retry_client = RetryAsk::new(client, 2, Duration::from_millis(500));
    /// ```
    pub fn new(inner: T, retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            backoff: Backoff::new(retries + 1, base_delay),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    #[instrument(level = "info", skip_all)]
    async fn ask(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let t0 = Instant::now();
        let res = self.backoff.run("generate", || self.inner.ask(prompt)).await;
        match &res {
            Ok(text) => info!(
                elapsed_ms_total = t0.elapsed().as_millis(),
                chars = text.chars().count(),
                "Generation succeeded"
            ),
            Err(e) => error!(elapsed_ms_total = t0.elapsed().as_millis(), error = %e, "Generation failed"),
        }
        res
    }
}

/// Client for the Gemini REST API.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Build a client for one model.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Sent as the `x-goog-api-key` header, never logged
    /// * `model` - Model name, e.g. `gemini-2.0-flash`
    /// * `base_url` - API root such as `https://generativelanguage.googleapis.com/v1beta`
    /// * `timeout` - Per-request timeout
    ///
    /// # Returns
    ///
    /// The client, or the reqwest error if the HTTP client could not be built.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.model)
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Map an HTTP failure to the generation error taxonomy.
fn classify_failure(status: StatusCode, body: &str) -> GenerationError {
    let (message, reason) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => (env.error.message, env.error.status),
        Err(_) => (body.chars().take(200).collect(), String::new()),
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => GenerationError::Quota(message),
        // Gemini reports an invalid key as 400 INVALID_ARGUMENT.
        StatusCode::BAD_REQUEST if message.contains("API key") => GenerationError::Auth(message),
        StatusCode::BAD_REQUEST => GenerationError::Malformed(message),
        _ if reason == "RESOURCE_EXHAUSTED" => GenerationError::Quota(message),
        _ => GenerationError::Service {
            status: status.as_u16(),
            message,
        },
    }
}

impl AskAsync for GeminiClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let t0 = Instant::now();
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: &prompt.system }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &prompt.user }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        if !status.is_success() {
            let err = classify_failure(status, &body);
            warn!(elapsed_ms = t0.elapsed().as_millis(), status = status.as_u16(), error = %err, "API call failed");
            return Err(err);
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::Service {
                status: status.as_u16(),
                message: format!("unreadable response body: {e}"),
            })?;
        let text = parsed.text().ok_or(GenerationError::EmptyResponse)?;
        info!(elapsed_ms = t0.elapsed().as_millis(), chars = text.chars().count(), "API call succeeded");
        Ok(text)
    }
}
