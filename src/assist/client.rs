//! HTTP client for the completion service (OpenRouter-compatible)

use crate::config::Config;
use crate::util::truncate;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const MAX_COMPLETION_TOKENS: u32 = 512;

/// Retry policy for rate limits
const MAX_RETRIES: u32 = 2;
const INITIAL_BACKOFF_MS: u64 = 1500;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

/// Client for the optional completion service
pub struct AssistClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl AssistClient {
    /// Build a client from configuration. `None` when no API key is set,
    /// which is a normal, non-error condition.
    pub fn from_config(config: &Config) -> Option<Self> {
        let api_key = config.api_key()?;
        // The request deadline guarantees the enhancement step can never
        // suspend the evaluation unboundedly.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .ok()?;
        Some(Self {
            http,
            api_key,
            model: config.model.clone(),
        })
    }

    /// One chat completion round trip, returning the raw response text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens: MAX_COMPLETION_TOKENS,
            stream: false,
        };

        let mut retry = 0;
        loop {
            let response = self
                .http
                .post(OPENROUTER_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    anyhow::anyhow!("unexpected completion response ({}): {}", e, truncate(&text, 200))
                })?;
                return Ok(parsed
                    .choices
                    .first()
                    .map(|c| c.message.content.clone())
                    .unwrap_or_default());
            }

            if status.as_u16() == 429 && retry < MAX_RETRIES {
                retry += 1;
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(retry - 1);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                continue;
            }

            anyhow::bail!("completion service error {}: {}", status, truncate(&text, 200));
        }
    }
}
