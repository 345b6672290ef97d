//! LLM API interaction with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait defining async LLM interaction
//! - [`GeminiClient`]: Google Generative Language `generateContent` backend
//! - [`RetryAsk`]: decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - Exponential backoff starting at the base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to every wait

use rand::{rng, Rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Trait for async LLM interaction.
///
/// Implementors send a prompt and return the model's answer. Decorators such
/// as [`RetryAsk`] wrap another implementor.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    inner: T,
    /// Retries after the first attempt before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

/// Client for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
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
    /// Build a client. Fails early when the key is empty so a run never
    /// spends time collecting articles it cannot analyze.
    pub fn new(api_key: &str, model: &str) -> Result<Self, Box<dyn Error>> {
        if api_key.trim().is_empty() {
            return Err("GOOGLE_API_KEY is not set".into());
        }
        let http = Client::builder()
            .timeout(StdDuration::from_secs(120))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.trim().to_string(),
            model: model.trim_start_matches("models/").to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

impl AskAsync for GeminiClient {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart { text: text.to_string() }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.2,
            },
        };

        let res = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        let dt = t0.elapsed();

        let parsed: GeminiResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => return Err(Box::new(e)),
            Err(_) => return Err(format!("Gemini API returned {status}").into()),
        };

        if let Some(err) = parsed.error {
            warn!(elapsed_ms = dt.as_millis(), %status, error = %err.message, "API call failed");
            return Err(format!("Gemini API error ({status}): {}", err.message).into());
        }
        if !status.is_success() {
            return Err(format!("Gemini API returned {status}").into());
        }

        let candidate = parsed
            .candidates
            .and_then(|c| c.into_iter().next())
            .ok_or("No candidates returned from Gemini")?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
            return Err(format!("Empty Gemini response (finish reason: {reason})").into());
        }
        info!(elapsed_ms = dt.as_millis(), bytes = text.len(), "Gemini answered");
        Ok(text)
    }
}
