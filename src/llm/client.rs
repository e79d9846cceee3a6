use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, WikiorgError};

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request structure for the chat completions API
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a serde_json::Value>,
}

/// Response structure from the chat completions API
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client
///
/// The model is fixed at construction; build another client to use another model.
/// Rate limits (429) and server errors (5xx) are retried with exponential backoff.
pub struct ChatClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_retries: usize,
}

impl ChatClient {
    /// Create a new chat client
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer token
    /// * `base_url` - API root, e.g. `https://api.openai.com/v1`
    /// * `model` - Model name, e.g. `gpt-4.1`
    /// * `timeout` - Per-request timeout
    pub fn new(api_key: String, base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WikiorgError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: 0.0,
            max_retries: 3,
        })
    }

    pub fn from_config(config: &Config, api_key: String) -> Result<Self> {
        let client = Self::new(
            api_key,
            &config.llm.base_url,
            &config.llm.model,
            Duration::from_secs(config.llm.request_timeout_secs),
        )?;
        Ok(client
            .with_temperature(config.llm.temperature)
            .with_max_retries(config.llm.max_retries))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Run a completion and return the first choice's text (empty if none)
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: Option<u32>,
        response_format: Option<&serde_json::Value>,
    ) -> Result<String> {
        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.complete_once(messages, max_tokens, response_format).await {
                Ok(text) => {
                    log::debug!(
                        "Chat completion ({}) took {:?} (attempt {})",
                        self.model,
                        start.elapsed(),
                        attempt + 1
                    );
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    log::warn!("Retry {}/{} after error: {}", attempt + 1, self.max_retries, e);
                    tokio::time::sleep(delay).await;
                    delay *= 2; // Exponential backoff
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(WikiorgError::Oracle(format!(
                        "{} after {} attempt(s)",
                        e,
                        attempt + 1
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Single request; retryable failures come back as `Transient`
    async fn complete_once(
        &self,
        messages: &[ChatMessage],
        max_tokens: Option<u32>,
        response_format: Option<&serde_json::Value>,
    ) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens,
            response_format,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| WikiorgError::Transient(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            let message = format!("LLM API error {}: {}", status, body);
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(WikiorgError::Transient(message))
            } else {
                Err(WikiorgError::Oracle(message))
            };
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| WikiorgError::Oracle(format!("Failed to parse response: {}", e)))?;

        Ok(result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}
