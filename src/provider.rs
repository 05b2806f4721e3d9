//! AI provider capability threaded to function bodies through
//! [`FunctionOptions::provider`](crate::function::FunctionOptions::provider).
//!
//! Two implementations ship with the crate:
//!
//! - [`ClaudeProvider`] talks to the Anthropic messages API through an
//!   injectable [`HttpClient`]
//! - [`MockProvider`] answers deterministically, for tests and offline use

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Something that can answer a free-form prompt.
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn query(&self, prompt: &str) -> Result<String>;
}

/// Trait for HTTP communication with external APIs.
///
/// Lets tests swap in a canned client instead of making real requests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body and returns the response text.
    async fn post_json(&self, url: &str, headers: &[(&str, &str)], body: &Value) -> Result<String>;
}

/// Production HTTP client backed by reqwest.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post_json(&self, url: &str, headers: &[(&str, &str)], body: &Value) -> Result<String> {
        let mut request = self.client.post(url);
        for (key, value) in headers {
            request = request.header(*key, *value);
        }
        let response = request.json(body).send().await?;
        Ok(response.text().await?)
    }
}

/// Anthropic messages API provider.
pub struct ClaudeProvider {
    api_key: String,
    model: String,
    http: Box<dyn HttpClient>,
}

impl ClaudeProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_http_client(api_key, model, Box::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(
        api_key: impl Into<String>,
        model: impl Into<String>,
        http: Box<dyn HttpClient>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            http,
        }
    }

    fn extract_text(response_text: &str) -> Result<String> {
        let response: Value = serde_json::from_str(response_text)
            .map_err(|e| anyhow!("Claude API returned invalid JSON: {}", e))?;

        if let Some(message) = response
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
        {
            return Err(anyhow!("Claude API error: {}", message));
        }

        response
            .get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| blocks.first())
            .and_then(|block| block.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                warn!("Failed to extract content from Claude response");
                anyhow!("Claude API response had no text content: {}", response_text)
            })
    }
}

#[async_trait]
impl AiProvider for ClaudeProvider {
    fn name(&self) -> &str {
        "claude"
    }

    async fn query(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": 1500,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });
        let headers = [
            ("x-api-key", self.api_key.as_str()),
            ("content-type", "application/json"),
            ("anthropic-version", API_VERSION),
        ];

        debug!("Querying Claude model {}", self.model);
        let response_text = self.http.post_json(MESSAGES_URL, &headers, &body).await?;
        Self::extract_text(&response_text)
    }
}

/// Deterministic provider that echoes the first line of the prompt.
#[derive(Debug, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AiProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn query(&self, prompt: &str) -> Result<String> {
        let first_line = prompt.lines().next().unwrap_or_default().trim();
        Ok(format!("Mock answer for: {}", first_line))
    }
}
